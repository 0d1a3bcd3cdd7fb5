use std::ops::Range;
use std::path::Path;

use plotters::prelude::*;

use crate::error::KiraError;

const PLOT_SIZE: (u32, u32) = (800, 600);

/// Renders an Age vs BMI scatter plot as SVG. The image is drawn into a
/// temporary file next to `destination` and moved into place when complete.
pub fn render_age_bmi(points: &[(f64, f64)], destination: &Path) -> Result<(), KiraError> {
    let parent = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix("kira-odb-plot")
        .suffix(".svg")
        .tempfile_in(parent)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;

    draw_scatter(points, temp.path())?;

    temp.persist(destination)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    tracing::debug!(path = %destination.display(), points = points.len(), "plot written");
    Ok(())
}

fn draw_scatter(points: &[(f64, f64)], path: &Path) -> Result<(), KiraError> {
    let root = SVGBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let ages = padded_range(points.iter().map(|(age, _)| *age));
    let bmis = padded_range(points.iter().map(|(_, bmi)| *bmi));
    let mut chart = ChartBuilder::on(&root)
        .caption("Age vs BMI Plot", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(ages, bmis)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("Age")
        .y_desc("BMI")
        .draw()
        .map_err(plot_error)?;
    chart
        .draw_series(
            points
                .iter()
                .map(|&(age, bmi)| Circle::new((age, bmi), 4, BLUE.filled())),
        )
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}

/// Axis range covering every value with a 5% margin; a single value gets ±1.
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), value| {
        (lo.min(value), hi.max(value))
    });
    let pad = if max > min { (max - min) * 0.05 } else { 1.0 };
    (min - pad)..(max + pad)
}

fn plot_error(err: impl std::fmt::Display) -> KiraError {
    KiraError::Plot(err.to_string())
}

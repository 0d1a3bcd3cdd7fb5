use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, QueryOutput, RunOutcome};
use crate::config::QueryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

/// Plain console output: results as tab-separated rows, progress and
/// diagnostics as they happen.
pub struct TextOutput;

impl TextOutput {
    pub fn print_query(output: &QueryOutput, config: &QueryConfig) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        for line in query_lines(output, config) {
            writeln!(stdout, "{line}")?;
        }
        Ok(())
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => println!("{} ({} ms)", event.message, elapsed.as_millis()),
            None => println!("{}", event.message),
        }
    }
}

/// Lines printed for a query result in text mode.
pub fn query_lines(output: &QueryOutput, config: &QueryConfig) -> Vec<String> {
    match output {
        QueryOutput::SubjectsOverAge(rows) => rows
            .iter()
            .map(|row| format!("{}\t{}", row.subject_id, row.age))
            .collect(),
        QueryOutput::FemalesWithHealthyBmi(rows) | QueryOutput::InsulinResistantSubjects(rows) => {
            rows.clone()
        }
        QueryOutput::VisitsForSubject(rows) | QueryOutput::KeggIdsForPeaks(rows) => {
            rows.iter().map(ToString::to_string).collect()
        }
        QueryOutput::AgeStatistics(summary) => match (summary.min, summary.max, summary.avg) {
            (Some(min), Some(max), Some(avg)) => vec![
                format!("Minimum Age: {min:.2}"),
                format!("Maximum Age: {max:.2}"),
                format!("Average Age: {avg:.2}"),
            ],
            _ => vec!["No valid age data".to_string()],
        },
        QueryOutput::PathwayAnnotationCounts(rows) => rows
            .iter()
            .map(|row| format!("{}\t{}", row.pathway, row.count))
            .collect(),
        QueryOutput::MaxTranscriptAbundance(value) => {
            let value = value.map_or_else(|| "NA".to_string(), |value| format!("{value:?}"));
            vec![format!("Maximum Abundance of {}: {value}", config.transcript)]
        }
        QueryOutput::AgeBmiPlot(plot) => {
            let mut lines = plot
                .rows
                .iter()
                .map(|row| format!("{}\t{}", row.age, row.bmi))
                .collect::<Vec<_>>();
            if plot.plot_path.is_some() {
                lines.push("Age vs BMI data successfully retrieved and plotted.".to_string());
            } else {
                lines.push("No valid Age and BMI data available to plot.".to_string());
            }
            lines
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    /// Prints the results of every step that ran as one JSON document.
    pub fn print_run(outcome: &RunOutcome) -> io::Result<()> {
        Self::print_json(outcome)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

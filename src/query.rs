//! The nine cohort queries.
//!
//! Each query opens its own read-only connection. An empty result is reported
//! through the sink and returned as an empty collection (or `None`), never as
//! an error.

use std::path::PathBuf;

use rusqlite::params_from_iter;
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::QueryConfig;
use crate::domain::Datum;
use crate::error::KiraError;
use crate::plot;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectAge {
    pub subject_id: String,
    pub age: Datum,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeSummary {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
}

impl AgeSummary {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.avg.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathwayCount {
    pub pathway: Datum,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBmi {
    pub age: Datum,
    pub bmi: Datum,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBmiPlot {
    pub rows: Vec<AgeBmi>,
    pub plotted_points: usize,
    pub plot_path: Option<PathBuf>,
}

pub struct CohortQueries<'a> {
    store: &'a Store,
    config: &'a QueryConfig,
}

impl<'a> CohortQueries<'a> {
    pub fn new(store: &'a Store, config: &'a QueryConfig) -> Self {
        Self { store, config }
    }

    /// Query 1. Text ages sort above every number in SQLite, so only numeric
    /// ages are compared.
    pub fn subjects_over_age(&self, sink: &dyn ProgressSink) -> Result<Vec<SubjectAge>, KiraError> {
        let conn = self.store.open_read_only()?;
        let mut stmt = conn.prepare(
            "SELECT SubjectID, Age FROM Subjects
             WHERE typeof(Age) IN ('integer', 'real') AND Age > 70",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SubjectAge {
                    subject_id: row.get(0)?,
                    age: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(report_empty(rows, sink, "No subjects over age 70."))
    }

    /// Query 2, sorted by SubjectID descending.
    pub fn females_with_healthy_bmi(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, KiraError> {
        let conn = self.store.open_read_only()?;
        let mut stmt = conn.prepare(
            "SELECT SubjectID FROM Subjects
             WHERE Sex = 'F' AND BMI BETWEEN 18.5 AND 24.9
             ORDER BY SubjectID DESC",
        )?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(report_empty(rows, sink, "No females with healthy BMI."))
    }

    /// Query 3.
    pub fn visits_for_subject(&self, sink: &dyn ProgressSink) -> Result<Vec<Datum>, KiraError> {
        let conn = self.store.open_read_only()?;
        let mut stmt = conn.prepare("SELECT VisitID FROM Samples WHERE SubjectID = ?1")?;
        let rows = stmt
            .query_map([self.config.visit_subject.as_str()], |row| row.get(0))?
            .collect::<Result<Vec<Datum>, _>>()?;
        let message = format!("No visits found for subject '{}'.", self.config.visit_subject);
        Ok(report_empty(rows, sink, &message))
    }

    /// Query 4.
    pub fn insulin_resistant_subjects(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, KiraError> {
        let conn = self.store.open_read_only()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT S.SubjectID
             FROM Samples AS S
             JOIN Subjects AS Sub ON S.SubjectID = Sub.SubjectID
             WHERE Sub.InsulinStatus = 'IR'",
        )?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(report_empty(
            rows,
            sink,
            "No insulin-resistant subjects with samples found.",
        ))
    }

    /// Query 5.
    pub fn kegg_ids_for_peaks(&self, sink: &dyn ProgressSink) -> Result<Vec<Datum>, KiraError> {
        if self.config.kegg_peaks.is_empty() {
            return Ok(report_empty(Vec::new(), sink, "No peaks configured."));
        }
        let placeholders = vec!["?"; self.config.kegg_peaks.len()].join(", ");
        let sql =
            format!("SELECT DISTINCT KEGG FROM Annotation WHERE PeakID IN ({placeholders})");
        let conn = self.store.open_read_only()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(self.config.kegg_peaks.iter()), |row| {
                row.get(0)
            })?
            .collect::<Result<Vec<Datum>, _>>()?;
        Ok(report_empty(rows, sink, "No KEGG IDs found for specified peaks."))
    }

    /// Query 6 over numeric ages only. Always yields one row; all fields are
    /// `None` when no age is known.
    pub fn age_statistics(&self, sink: &dyn ProgressSink) -> Result<AgeSummary, KiraError> {
        let conn = self.store.open_read_only()?;
        let (min, max, avg): (Datum, Datum, Datum) = conn.query_row(
            "SELECT MIN(Age), MAX(Age), AVG(Age)
             FROM Subjects
             WHERE typeof(Age) IN ('integer', 'real')",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let summary = AgeSummary {
            min: min.as_f64(),
            max: max.as_f64(),
            avg: avg.as_f64(),
        };
        if summary.is_empty() {
            notify(sink, "No valid data found.");
        }
        Ok(summary)
    }

    /// Query 7, most annotated pathway first.
    pub fn pathway_annotation_counts(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<PathwayCount>, KiraError> {
        let conn = self.store.open_read_only()?;
        let mut stmt = conn.prepare(
            "SELECT Pathway, COUNT(*) AS AnnotationCount
             FROM Annotation
             GROUP BY Pathway
             HAVING AnnotationCount >= 10
             ORDER BY AnnotationCount DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PathwayCount {
                    pathway: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(report_empty(
            rows,
            sink,
            "No pathways with at least 10 annotations found.",
        ))
    }

    /// Query 8. Text abundances (e.g. `NA`) are not compared.
    pub fn max_transcript_abundance(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Option<f64>, KiraError> {
        let conn = self.store.open_read_only()?;
        let max: Datum = conn.query_row(
            "SELECT MAX(Abundance)
             FROM TranscriptAbundance
             WHERE TranscriptID = ?1
               AND typeof(Abundance) IN ('integer', 'real')
               AND SampleID IN (SELECT SampleID FROM Samples WHERE SubjectID = ?2)",
            [
                self.config.transcript.as_str(),
                self.config.abundance_subject.as_str(),
            ],
            |row| row.get(0),
        )?;
        let value = max.as_f64();
        if value.is_none() {
            notify(
                sink,
                &format!(
                    "No data found for {} abundance for Subject '{}'.",
                    self.config.transcript, self.config.abundance_subject
                ),
            );
        }
        Ok(value)
    }

    /// Query 9. Returns every row with both values present and renders the
    /// numeric ones as a scatter plot at the configured path.
    pub fn age_bmi_plot(&self, sink: &dyn ProgressSink) -> Result<AgeBmiPlot, KiraError> {
        let rows = {
            let conn = self.store.open_read_only()?;
            let mut stmt = conn.prepare(
                "SELECT Age, BMI FROM Subjects WHERE Age IS NOT NULL AND BMI IS NOT NULL",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(AgeBmi {
                        age: row.get(0)?,
                        bmi: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let points = rows
            .iter()
            .filter_map(|row| Some((row.age.as_f64()?, row.bmi.as_f64()?)))
            .collect::<Vec<_>>();
        tracing::debug!(
            rows = rows.len(),
            points = points.len(),
            "age/BMI rows retrieved"
        );

        if points.is_empty() {
            notify(sink, "No valid Age and BMI data to plot.");
            return Ok(AgeBmiPlot {
                rows,
                plotted_points: 0,
                plot_path: None,
            });
        }

        plot::render_age_bmi(&points, &self.config.plot_path)?;
        notify(
            sink,
            &format!("Plot saved as '{}'", self.config.plot_path.display()),
        );
        Ok(AgeBmiPlot {
            rows,
            plotted_points: points.len(),
            plot_path: Some(self.config.plot_path.clone()),
        })
    }
}

fn report_empty<T>(rows: Vec<T>, sink: &dyn ProgressSink, message: &str) -> Vec<T> {
    if rows.is_empty() {
        notify(sink, message);
    }
    rows
}

fn notify(sink: &dyn ProgressSink, message: &str) {
    tracing::info!("{message}");
    sink.event(ProgressEvent::message(message));
}

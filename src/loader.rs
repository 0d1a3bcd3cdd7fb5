//! File-to-table loaders.
//!
//! Every loader clears its table and refills it inside one transaction. When a
//! load fails part-way (duplicate key, missing column, unreadable row) the
//! transaction is dropped uncommitted, so the table keeps the rows it had
//! before the load started.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use csv::{ReaderBuilder, StringRecord};
use rusqlite::{Transaction, params};
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{SampleId, TableKind};
use crate::error::KiraError;
use crate::store::Store;

const SAMPLE_COLUMN: &str = "SampleID";
const SUBJECT_COLUMNS: [&str; 7] = [
    "SubjectID",
    "Sex",
    "Age",
    "BMI",
    "Race",
    "SSPG",
    "IR_IS_classification",
];
const ANNOTATION_COLUMNS: [&str; 5] = ["PeakID", "Metabolite", "KEGG", "HMDB", "Pathway"];

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub table: TableKind,
    pub source: String,
    pub rows_read: u64,
    pub rows_inserted: u64,
    pub rows_skipped: u64,
    pub elapsed_ms: u128,
}

impl LoadReport {
    fn new(table: TableKind, source: &Path) -> Self {
        Self {
            table,
            source: source.display().to_string(),
            rows_read: 0,
            rows_inserted: 0,
            rows_skipped: 0,
            elapsed_ms: 0,
        }
    }
}

/// Loads `path` into the table matching `table`.
pub fn load_table(
    store: &Store,
    table: TableKind,
    path: &Path,
    sink: &dyn ProgressSink,
) -> Result<LoadReport, KiraError> {
    match table {
        TableKind::Subjects => load_subjects(store, path, sink),
        TableKind::Samples => load_samples(store, path, sink),
        TableKind::TranscriptAbundance
        | TableKind::ProteinAbundance
        | TableKind::MetaboliteAbundance => load_abundance(store, table, path, sink),
        TableKind::Annotation => load_annotations(store, path, sink),
    }
}

pub fn load_subjects(
    store: &Store,
    path: &Path,
    sink: &dyn ProgressSink,
) -> Result<LoadReport, KiraError> {
    let mut file = DelimitedFile::open(path, TableKind::Subjects.delimiter())?;
    let columns = SUBJECT_COLUMNS
        .iter()
        .map(|name| file.require(name))
        .collect::<Result<Vec<_>, KiraError>>()?;

    replace_table(store, TableKind::Subjects, path, sink, |tx, report| {
        let mut stmt = tx.prepare(
            "INSERT INTO Subjects (SubjectID, Sex, Age, BMI, Race, SSPG, InsulinStatus)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        let mut record = StringRecord::new();
        while file.read_next(&mut record)? {
            report.rows_read += 1;
            let values = columns
                .iter()
                .zip(SUBJECT_COLUMNS)
                .map(|(&idx, name)| file.field(&record, idx, name))
                .collect::<Result<Vec<_>, KiraError>>()?;
            let subject_id = values[0];
            stmt.execute(params![
                subject_id,
                values[1],
                missing_as_null(values[2]),
                values[3],
                values[4],
                values[5],
                values[6],
            ])
            .map_err(|err| insert_error(err, TableKind::Subjects, || subject_id.to_string()))?;
            report.rows_inserted += 1;
        }
        Ok(())
    })
}

/// Splits each SampleID into subject and visit. Rows without a usable SampleID
/// are reported and skipped; repeated SampleIDs are ignored.
pub fn load_samples(
    store: &Store,
    path: &Path,
    sink: &dyn ProgressSink,
) -> Result<LoadReport, KiraError> {
    let mut file = DelimitedFile::open(path, TableKind::Samples.delimiter())?;
    let sample_column = file.column(SAMPLE_COLUMN);
    if sample_column.is_none() {
        tracing::warn!(path = %path.display(), "no SampleID column; every row will be skipped");
    }

    replace_table(store, TableKind::Samples, path, sink, |tx, report| {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO Samples (SampleID, SubjectID, VisitID) VALUES (?1, ?2, ?3)",
        )?;
        let mut record = StringRecord::new();
        while file.read_next(&mut record)? {
            report.rows_read += 1;
            let line = line_of(&record);
            let Some(raw) = sample_column.and_then(|idx| record.get(idx)) else {
                report.rows_skipped += 1;
                diagnostic(sink, format!("SampleID not found at line {line}"));
                continue;
            };
            let sample = match raw.parse::<SampleId>() {
                Ok(sample) => sample,
                Err(err) => {
                    report.rows_skipped += 1;
                    diagnostic(sink, format!("line {line}: {err}"));
                    continue;
                }
            };
            let changed =
                stmt.execute(params![sample.as_str(), sample.subject_id(), sample.visit_id()])?;
            report.rows_inserted += changed as u64;
        }
        Ok(())
    })
}

pub fn load_transcripts(
    store: &Store,
    path: &Path,
    sink: &dyn ProgressSink,
) -> Result<LoadReport, KiraError> {
    load_abundance(store, TableKind::TranscriptAbundance, path, sink)
}

pub fn load_proteins(
    store: &Store,
    path: &Path,
    sink: &dyn ProgressSink,
) -> Result<LoadReport, KiraError> {
    load_abundance(store, TableKind::ProteinAbundance, path, sink)
}

pub fn load_metabolites(
    store: &Store,
    path: &Path,
    sink: &dyn ProgressSink,
) -> Result<LoadReport, KiraError> {
    load_abundance(store, TableKind::MetaboliteAbundance, path, sink)
}

/// Pivots a wide matrix (one row per sample, one column per analyte) into one
/// row per sample and analyte.
fn load_abundance(
    store: &Store,
    table: TableKind,
    path: &Path,
    sink: &dyn ProgressSink,
) -> Result<LoadReport, KiraError> {
    let Some(analyte_column) = table.analyte_column() else {
        return Err(KiraError::Database(format!("{table} is not an abundance table")));
    };
    let mut file = DelimitedFile::open(path, table.delimiter())?;
    let sample_column = file.require(SAMPLE_COLUMN)?;
    let analytes = file
        .headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != sample_column)
        .map(|(idx, name)| (idx, name.clone()))
        .collect::<Vec<_>>();

    replace_table(store, table, path, sink, |tx, report| {
        let sql = format!(
            "INSERT INTO {} (SampleID, {analyte_column}, Abundance) VALUES (?1, ?2, ?3)",
            table.table_name()
        );
        let mut stmt = tx.prepare(&sql)?;
        let mut record = StringRecord::new();
        while file.read_next(&mut record)? {
            report.rows_read += 1;
            if record.len() > file.headers.len() {
                return Err(file.malformed(
                    &record,
                    format!(
                        "{} fields for {} columns",
                        record.len(),
                        file.headers.len()
                    ),
                ));
            }
            let sample_id = file.field(&record, sample_column, SAMPLE_COLUMN)?;
            for (idx, analyte) in &analytes {
                stmt.execute(params![sample_id, analyte, record.get(*idx)])
                    .map_err(|err| {
                        insert_error(err, table, || format!("({sample_id}, {analyte})"))
                    })?;
                report.rows_inserted += 1;
            }
        }
        Ok(())
    })
}

pub fn load_annotations(
    store: &Store,
    path: &Path,
    sink: &dyn ProgressSink,
) -> Result<LoadReport, KiraError> {
    let mut file = DelimitedFile::open(path, TableKind::Annotation.delimiter())?;
    let columns = ANNOTATION_COLUMNS
        .iter()
        .map(|name| file.require(name))
        .collect::<Result<Vec<_>, KiraError>>()?;

    replace_table(store, TableKind::Annotation, path, sink, |tx, report| {
        let mut stmt = tx.prepare(
            "INSERT INTO Annotation (PeakID, Metabolite, KEGG, HMDB, Pathway)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut record = StringRecord::new();
        while file.read_next(&mut record)? {
            report.rows_read += 1;
            let values = columns
                .iter()
                .zip(ANNOTATION_COLUMNS)
                .map(|(&idx, name)| file.field(&record, idx, name))
                .collect::<Result<Vec<_>, KiraError>>()?;
            stmt.execute(params![values[0], values[1], values[2], values[3], values[4]])
                .map_err(|err| {
                    insert_error(err, TableKind::Annotation, || {
                        format!("({}, {})", values[0], values[1])
                    })
                })?;
            report.rows_inserted += 1;
        }
        Ok(())
    })
}

/// Runs `fill` between a `DELETE` of the whole table and a single commit.
fn replace_table<F>(
    store: &Store,
    table: TableKind,
    path: &Path,
    sink: &dyn ProgressSink,
    fill: F,
) -> Result<LoadReport, KiraError>
where
    F: FnOnce(&Transaction<'_>, &mut LoadReport) -> Result<(), KiraError>,
{
    sink.event(ProgressEvent::message(format!(
        "phase=Load; {table} from {}",
        path.display()
    )));
    let start = Instant::now();
    let mut report = LoadReport::new(table, path);

    let mut conn = store.open()?;
    let tx = conn.transaction()?;
    tx.execute(&format!("DELETE FROM {}", table.table_name()), [])?;
    if let Err(err) = fill(&tx, &mut report) {
        tracing::warn!(%table, error = %err, "load aborted, table left unchanged");
        return Err(err);
    }
    tx.commit()?;

    let elapsed = start.elapsed();
    report.elapsed_ms = elapsed.as_millis();
    tracing::info!(
        %table,
        rows_read = report.rows_read,
        rows_inserted = report.rows_inserted,
        rows_skipped = report.rows_skipped,
        elapsed_ms = report.elapsed_ms,
        "table loaded"
    );
    sink.event(ProgressEvent::timed(
        format!("{table} table populated successfully."),
        elapsed,
    ));
    Ok(report)
}

fn insert_error(
    err: rusqlite::Error,
    table: TableKind,
    key: impl FnOnce() -> String,
) -> KiraError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            ) =>
        {
            KiraError::DuplicateKey {
                table: table.to_string(),
                key: key(),
            }
        }
        _ => KiraError::from(err),
    }
}

fn diagnostic(sink: &dyn ProgressSink, message: String) {
    tracing::warn!("{message}");
    sink.event(ProgressEvent::message(message));
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|pos| pos.line()).unwrap_or(0)
}

/// Age and similar optional numeric fields use `NA` or an empty cell for "unknown".
fn missing_as_null(value: &str) -> Option<&str> {
    match value.trim() {
        "" | "NA" => None,
        _ => Some(value),
    }
}

struct DelimitedFile {
    path: PathBuf,
    reader: csv::Reader<File>,
    headers: Vec<String>,
}

impl DelimitedFile {
    fn open(path: &Path, delimiter: u8) -> Result<Self, KiraError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(path)
            .map_err(|err| read_error(path, err))?;
        let headers = reader
            .headers()
            .map_err(|err| read_error(path, err))?
            .iter()
            .map(|name| name.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            headers,
        })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    fn require(&self, name: &str) -> Result<usize, KiraError> {
        self.column(name).ok_or_else(|| KiraError::MissingColumn {
            path: self.path.clone(),
            column: name.to_string(),
        })
    }

    fn read_next(&mut self, record: &mut StringRecord) -> Result<bool, KiraError> {
        self.reader
            .read_record(record)
            .map_err(|err| read_error(&self.path, err))
    }

    fn field<'r>(
        &self,
        record: &'r StringRecord,
        idx: usize,
        name: &str,
    ) -> Result<&'r str, KiraError> {
        record
            .get(idx)
            .ok_or_else(|| self.malformed(record, format!("no value for {name}")))
    }

    fn malformed(&self, record: &StringRecord, message: String) -> KiraError {
        KiraError::MalformedRow {
            path: self.path.clone(),
            line: line_of(record),
            message,
        }
    }
}

fn read_error(path: &Path, err: csv::Error) -> KiraError {
    KiraError::InputRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_sentinels_become_null() {
        assert_eq!(missing_as_null("NA"), None);
        assert_eq!(missing_as_null(""), None);
        assert_eq!(missing_as_null(" "), None);
        assert_eq!(missing_as_null("71"), Some("71"));
    }

    #[test]
    fn headers_are_trimmed() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("samples.tsv");
        std::fs::write(&path, "\u{feff}SampleID \tExtra\nA-1\tx\n").unwrap();
        let file = DelimitedFile::open(&path, b'\t').unwrap();
        assert_eq!(file.column("SampleID"), Some(0));
        assert_eq!(file.column("Extra"), Some(1));
    }
}

//! Table layout of the omics store.
//!
//! The statements use plain `CREATE TABLE`. Running them against a database
//! that already holds the schema fails with a table-exists error, which
//! [`create_schema`] reports as [`SchemaOutcome::AlreadyExists`] after rolling
//! back. Existing data is never touched.

use serde::Serialize;

use crate::error::KiraError;
use crate::store::Store;

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE Subjects (
    SubjectID TEXT PRIMARY KEY,
    Sex TEXT,
    Age INTEGER,
    BMI REAL,
    Race TEXT,
    SSPG REAL,
    InsulinStatus TEXT
);

CREATE TABLE Samples (
    SampleID TEXT PRIMARY KEY,
    SubjectID TEXT,
    VisitID INTEGER,
    FOREIGN KEY (SubjectID) REFERENCES Subjects(SubjectID)
);

CREATE TABLE TranscriptAbundance (
    SampleID TEXT,
    TranscriptID TEXT,
    Abundance REAL,
    PRIMARY KEY (SampleID, TranscriptID),
    FOREIGN KEY (SampleID) REFERENCES Samples(SampleID)
);

CREATE TABLE ProteinAbundance (
    SampleID TEXT,
    ProteinID TEXT,
    Abundance REAL,
    PRIMARY KEY (SampleID, ProteinID),
    FOREIGN KEY (SampleID) REFERENCES Samples(SampleID)
);

CREATE TABLE MetaboliteAbundance (
    SampleID TEXT,
    PeakID TEXT,
    Abundance REAL,
    PRIMARY KEY (SampleID, PeakID),
    FOREIGN KEY (SampleID) REFERENCES Samples(SampleID)
);

CREATE TABLE Annotation (
    PeakID TEXT,
    Metabolite TEXT,
    KEGG TEXT,
    HMDB TEXT,
    Pathway TEXT,
    PRIMARY KEY (PeakID, Metabolite)
);
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SchemaOutcome {
    Created,
    AlreadyExists { message: String },
}

/// Creates all six tables in one transaction.
///
/// A table-exists conflict is not an error: the transaction is rolled back and
/// [`SchemaOutcome::AlreadyExists`] is returned. Other SQLite failures are.
pub fn create_schema(store: &Store) -> Result<SchemaOutcome, KiraError> {
    let mut conn = store.open()?;
    match apply_schema(&mut conn) {
        Ok(()) => Ok(SchemaOutcome::Created),
        Err(KiraError::SchemaExists(message)) => Ok(SchemaOutcome::AlreadyExists { message }),
        Err(err) => Err(err),
    }
}

fn apply_schema(conn: &mut rusqlite::Connection) -> Result<(), KiraError> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA_SQL).map_err(|err| {
        let message = err.to_string();
        if message.contains("already exists") {
            KiraError::SchemaExists(message)
        } else {
            KiraError::Database(format!("failed to create tables: {message}"))
        }
    })?;
    tx.commit()?;
    Ok(())
}

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlResult, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

/// The six tables of the store, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    Subjects,
    Samples,
    TranscriptAbundance,
    ProteinAbundance,
    MetaboliteAbundance,
    Annotation,
}

impl TableKind {
    pub const ALL: [TableKind; 6] = [
        TableKind::Subjects,
        TableKind::Samples,
        TableKind::TranscriptAbundance,
        TableKind::ProteinAbundance,
        TableKind::MetaboliteAbundance,
        TableKind::Annotation,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            TableKind::Subjects => "Subjects",
            TableKind::Samples => "Samples",
            TableKind::TranscriptAbundance => "TranscriptAbundance",
            TableKind::ProteinAbundance => "ProteinAbundance",
            TableKind::MetaboliteAbundance => "MetaboliteAbundance",
            TableKind::Annotation => "Annotation",
        }
    }

    /// Field separator of the source file feeding this table.
    pub fn delimiter(&self) -> u8 {
        match self {
            TableKind::Subjects | TableKind::Annotation => b',',
            _ => b'\t',
        }
    }

    /// Analyte column for the wide abundance tables.
    pub fn analyte_column(&self) -> Option<&'static str> {
        match self {
            TableKind::TranscriptAbundance => Some("TranscriptID"),
            TableKind::ProteinAbundance => Some("ProteinID"),
            TableKind::MetaboliteAbundance => Some("PeakID"),
            _ => None,
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table_name())
    }
}

/// A sample identifier of the form `<SubjectID>-<VisitID>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleId {
    raw: String,
    split: usize,
}

impl SampleId {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn subject_id(&self) -> &str {
        &self.raw[..self.split]
    }

    pub fn visit_id(&self) -> &str {
        &self.raw[self.split + 1..]
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for SampleId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let parts = trimmed.split('-').collect::<Vec<_>>();
        let is_valid = parts.len() == 2 && parts.iter().all(|part| !part.is_empty());
        if !is_valid {
            return Err(KiraError::MalformedSampleId(value.to_string()));
        }
        Ok(Self {
            raw: trimmed.to_string(),
            split: parts[0].len(),
        })
    }
}

/// The nine fixed cohort queries, numbered as on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryId {
    SubjectsOverAge,
    FemalesWithHealthyBmi,
    VisitsForSubject,
    InsulinResistantSubjects,
    KeggIdsForPeaks,
    AgeStatistics,
    PathwayAnnotationCounts,
    MaxTranscriptAbundance,
    AgeBmiPlot,
}

impl QueryId {
    pub fn number(&self) -> u8 {
        match self {
            QueryId::SubjectsOverAge => 1,
            QueryId::FemalesWithHealthyBmi => 2,
            QueryId::VisitsForSubject => 3,
            QueryId::InsulinResistantSubjects => 4,
            QueryId::KeggIdsForPeaks => 5,
            QueryId::AgeStatistics => 6,
            QueryId::PathwayAnnotationCounts => 7,
            QueryId::MaxTranscriptAbundance => 8,
            QueryId::AgeBmiPlot => 9,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            QueryId::SubjectsOverAge => "subjects older than 70",
            QueryId::FemalesWithHealthyBmi => "female subjects with a healthy BMI",
            QueryId::VisitsForSubject => "visit ids of one subject",
            QueryId::InsulinResistantSubjects => "insulin-resistant subjects with samples",
            QueryId::KeggIdsForPeaks => "KEGG ids annotated to selected peaks",
            QueryId::AgeStatistics => "minimum, maximum and average age",
            QueryId::PathwayAnnotationCounts => "pathways with at least 10 annotations",
            QueryId::MaxTranscriptAbundance => "maximum transcript abundance for one subject",
            QueryId::AgeBmiPlot => "age vs BMI scatter plot",
        }
    }
}

impl TryFrom<i64> for QueryId {
    type Error = KiraError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(QueryId::SubjectsOverAge),
            2 => Ok(QueryId::FemalesWithHealthyBmi),
            3 => Ok(QueryId::VisitsForSubject),
            4 => Ok(QueryId::InsulinResistantSubjects),
            5 => Ok(QueryId::KeggIdsForPeaks),
            6 => Ok(QueryId::AgeStatistics),
            7 => Ok(QueryId::PathwayAnnotationCounts),
            8 => Ok(QueryId::MaxTranscriptAbundance),
            9 => Ok(QueryId::AgeBmiPlot),
            _ => Err(KiraError::InvalidQuery(value)),
        }
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query {} ({})", self.number(), self.description())
    }
}

/// A single SQLite cell as stored, keeping the store's dynamic typing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Datum {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Numeric value of integer and real cells; text is never coerced.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Integer(value) => Some(*value as f64),
            Datum::Real(value) => Some(*value),
            Datum::Null | Datum::Text(_) => None,
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NA"),
            Datum::Integer(value) => write!(f, "{value}"),
            Datum::Real(value) => write!(f, "{value:?}"),
            Datum::Text(value) => write!(f, "{value}"),
        }
    }
}

impl FromSql for Datum {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Datum::Null,
            ValueRef::Integer(value) => Datum::Integer(value),
            ValueRef::Real(value) => Datum::Real(value),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Datum::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        })
    }
}

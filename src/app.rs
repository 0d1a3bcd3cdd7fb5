use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::config::QueryConfig;
use crate::domain::{Datum, QueryId, TableKind};
use crate::error::KiraError;
use crate::loader::{self, LoadReport};
use crate::query::{AgeBmiPlot, AgeSummary, CohortQueries, PathwayCount, SubjectAge};
use crate::schema::{self, SchemaOutcome};
use crate::store::Store;

pub const INVALID_QUERY_MESSAGE: &str = "Invalid query number. Please choose between 1 and 9.";

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }

    pub fn timed(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            message: message.into(),
            elapsed: Some(elapsed),
        }
    }
}

/// Receives progress messages and user-facing diagnostics.
pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Source files to load; `None` leaves the table as it is.
#[derive(Debug, Clone, Default)]
pub struct LoadPlan {
    pub subjects: Option<PathBuf>,
    pub samples: Option<PathBuf>,
    pub transcripts: Option<PathBuf>,
    pub proteome: Option<PathBuf>,
    pub metabolome: Option<PathBuf>,
    pub annotations: Option<PathBuf>,
}

impl LoadPlan {
    /// Requested loads in table order.
    pub fn entries(&self) -> Vec<(TableKind, &PathBuf)> {
        [
            (TableKind::Subjects, &self.subjects),
            (TableKind::Samples, &self.samples),
            (TableKind::TranscriptAbundance, &self.transcripts),
            (TableKind::ProteinAbundance, &self.proteome),
            (TableKind::MetaboliteAbundance, &self.metabolome),
            (TableKind::Annotation, &self.annotations),
        ]
        .into_iter()
        .filter_map(|(table, path)| path.as_ref().map(|path| (table, path)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    pub reports: Vec<LoadReport>,
}

/// Steps requested on one command line.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub create_schema: bool,
    pub load: Option<LoadPlan>,
    pub query: Option<i64>,
}

/// What each requested step produced. A skipped step, or a query number out
/// of range, leaves its field empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "query", content = "result", rename_all = "snake_case")]
pub enum QueryOutput {
    SubjectsOverAge(Vec<SubjectAge>),
    FemalesWithHealthyBmi(Vec<String>),
    VisitsForSubject(Vec<Datum>),
    InsulinResistantSubjects(Vec<String>),
    KeggIdsForPeaks(Vec<Datum>),
    AgeStatistics(AgeSummary),
    PathwayAnnotationCounts(Vec<PathwayCount>),
    MaxTranscriptAbundance(Option<f64>),
    AgeBmiPlot(AgeBmiPlot),
}

#[derive(Clone)]
pub struct App {
    store: Store,
    config: QueryConfig,
}

impl App {
    pub fn new(store: Store, config: QueryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Runs the requested steps in order: schema, then load, then query.
    pub fn run(
        &self,
        invocation: &Invocation,
        sink: &dyn ProgressSink,
    ) -> Result<RunOutcome, KiraError> {
        let mut outcome = RunOutcome::default();
        if invocation.create_schema {
            outcome.schema = Some(self.create_schema(sink)?);
        }
        if let Some(plan) = &invocation.load {
            outcome.load = Some(self.load(plan, sink)?);
        }
        if let Some(number) = invocation.query {
            outcome.query = self.query_number(number, sink)?;
        }
        Ok(outcome)
    }

    pub fn create_schema(&self, sink: &dyn ProgressSink) -> Result<SchemaOutcome, KiraError> {
        sink.event(ProgressEvent::message(format!(
            "phase=Schema; creating tables in {}",
            self.store.db_path()
        )));
        let outcome = schema::create_schema(&self.store)?;
        match &outcome {
            SchemaOutcome::Created => {
                tracing::info!(db = %self.store.db_path(), "schema created");
                sink.event(ProgressEvent::message("Database structure has been created."));
            }
            SchemaOutcome::AlreadyExists { message } => {
                tracing::warn!(db = %self.store.db_path(), "{message}");
                sink.event(ProgressEvent::message(format!("SQLite error: {message}")));
            }
        }
        Ok(outcome)
    }

    /// Runs the requested loads in table order, stopping at the first failure.
    /// Tables loaded before the failure keep their new contents.
    pub fn load(&self, plan: &LoadPlan, sink: &dyn ProgressSink) -> Result<LoadResult, KiraError> {
        let mut reports = Vec::new();
        for (table, path) in plan.entries() {
            reports.push(loader::load_table(&self.store, table, path, sink)?);
        }
        if reports.is_empty() {
            sink.event(ProgressEvent::message("No input files given; nothing loaded."));
        } else {
            sink.event(ProgressEvent::message("All data loaded successfully."));
        }
        Ok(LoadResult { reports })
    }

    /// Runs query `number` as given on the command line. A number outside
    /// 1-9 is reported through the sink and yields `None`.
    pub fn query_number(
        &self,
        number: i64,
        sink: &dyn ProgressSink,
    ) -> Result<Option<QueryOutput>, KiraError> {
        match QueryId::try_from(number) {
            Ok(id) => self.query(id, sink).map(Some),
            Err(err) => {
                tracing::error!("{err}");
                sink.event(ProgressEvent::message(INVALID_QUERY_MESSAGE));
                Ok(None)
            }
        }
    }

    pub fn query(&self, id: QueryId, sink: &dyn ProgressSink) -> Result<QueryOutput, KiraError> {
        tracing::debug!(query = id.number(), "running {id}");
        let queries = CohortQueries::new(&self.store, &self.config);
        let output = match id {
            QueryId::SubjectsOverAge => QueryOutput::SubjectsOverAge(queries.subjects_over_age(sink)?),
            QueryId::FemalesWithHealthyBmi => {
                QueryOutput::FemalesWithHealthyBmi(queries.females_with_healthy_bmi(sink)?)
            }
            QueryId::VisitsForSubject => {
                QueryOutput::VisitsForSubject(queries.visits_for_subject(sink)?)
            }
            QueryId::InsulinResistantSubjects => {
                QueryOutput::InsulinResistantSubjects(queries.insulin_resistant_subjects(sink)?)
            }
            QueryId::KeggIdsForPeaks => QueryOutput::KeggIdsForPeaks(queries.kegg_ids_for_peaks(sink)?),
            QueryId::AgeStatistics => QueryOutput::AgeStatistics(queries.age_statistics(sink)?),
            QueryId::PathwayAnnotationCounts => {
                QueryOutput::PathwayAnnotationCounts(queries.pathway_annotation_counts(sink)?)
            }
            QueryId::MaxTranscriptAbundance => {
                QueryOutput::MaxTranscriptAbundance(queries.max_transcript_abundance(sink)?)
            }
            QueryId::AgeBmiPlot => QueryOutput::AgeBmiPlot(queries.age_bmi_plot(sink)?),
        };
        Ok(output)
    }
}

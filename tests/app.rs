use std::cell::RefCell;
use std::path::PathBuf;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_omics_db::app::{
    App, INVALID_QUERY_MESSAGE, Invocation, LoadPlan, ProgressEvent, ProgressSink, QueryOutput,
};
use kira_omics_db::config::QueryConfig;
use kira_omics_db::domain::{QueryId, TableKind};
use kira_omics_db::error::KiraError;
use kira_omics_db::output::query_lines;
use kira_omics_db::query::{AgeSummary, SubjectAge};
use kira_omics_db::schema::SchemaOutcome;
use kira_omics_db::store::Store;

#[derive(Default)]
struct RecordingSink {
    messages: RefCell<Vec<String>>,
}

impl RecordingSink {
    fn last(&self) -> Option<String> {
        self.messages.borrow().last().cloned()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.borrow_mut().push(event.message);
    }
}

fn test_app(temp: &tempfile::TempDir) -> App {
    let store = Store::new(Utf8PathBuf::from_path_buf(temp.path().join("omics.db")).unwrap());
    let config = QueryConfig {
        plot_path: temp.path().join("age_bmi.svg"),
        ..QueryConfig::default()
    };
    App::new(store, config)
}

fn write(temp: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = temp.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn create_schema_twice_reports_existing_tables() {
    let temp = tempfile::tempdir().unwrap();
    let app = test_app(&temp);
    let sink = RecordingSink::default();

    assert_eq!(app.create_schema(&sink).unwrap(), SchemaOutcome::Created);
    assert_eq!(
        sink.last().as_deref(),
        Some("Database structure has been created.")
    );

    assert_matches!(
        app.create_schema(&sink).unwrap(),
        SchemaOutcome::AlreadyExists { .. }
    );
    assert!(sink.last().unwrap().starts_with("SQLite error:"));
}

#[test]
fn load_plan_runs_in_table_order() {
    let temp = tempfile::tempdir().unwrap();
    let app = test_app(&temp);
    let sink = RecordingSink::default();
    app.create_schema(&sink).unwrap();

    let plan = LoadPlan {
        annotations: Some(write(
            &temp,
            "annotations.csv",
            "PeakID,Metabolite,KEGG,HMDB,Pathway\nP1,M1,C1,H1,Glycolysis\n",
        )),
        samples: Some(write(&temp, "samples.tsv", "SampleID\nZOZOW1T-1011\n")),
        subjects: Some(write(
            &temp,
            "subjects.csv",
            "SubjectID,Sex,Age,BMI,Race,SSPG,IR_IS_classification\nZOZOW1T,F,54,23.0,C,150,IR\n",
        )),
        ..LoadPlan::default()
    };

    let result = app.load(&plan, &sink).unwrap();
    let tables = result
        .reports
        .iter()
        .map(|report| report.table)
        .collect::<Vec<_>>();
    assert_eq!(
        tables,
        vec![TableKind::Subjects, TableKind::Samples, TableKind::Annotation]
    );
    assert_eq!(sink.last().as_deref(), Some("All data loaded successfully."));

    let status = app.store().status().unwrap();
    assert_eq!(status.table(TableKind::Subjects).unwrap().rows, 1);
    assert_eq!(status.table(TableKind::Samples).unwrap().rows, 1);
    assert_eq!(status.table(TableKind::TranscriptAbundance).unwrap().rows, 0);
}

#[test]
fn empty_load_plan_loads_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let app = test_app(&temp);
    let sink = RecordingSink::default();
    app.create_schema(&sink).unwrap();

    let plan = LoadPlan::default();
    assert!(plan.is_empty());
    let result = app.load(&plan, &sink).unwrap();
    assert!(result.reports.is_empty());
    assert_eq!(
        sink.last().as_deref(),
        Some("No input files given; nothing loaded.")
    );
}

#[test]
fn failed_load_stops_before_later_tables() {
    let temp = tempfile::tempdir().unwrap();
    let app = test_app(&temp);
    let sink = RecordingSink::default();
    app.create_schema(&sink).unwrap();

    let plan = LoadPlan {
        subjects: Some(write(
            &temp,
            "subjects.csv",
            "SubjectID,Sex,Age,BMI,Race,SSPG,IR_IS_classification\nS1,F,40,22.0,C,100,IS\n",
        )),
        samples: Some(temp.path().join("missing.tsv")),
        annotations: Some(write(
            &temp,
            "annotations.csv",
            "PeakID,Metabolite,KEGG,HMDB,Pathway\nP1,M1,C1,H1,Glycolysis\n",
        )),
        ..LoadPlan::default()
    };

    let err = app.load(&plan, &sink).unwrap_err();
    assert_matches!(err, KiraError::InputRead { .. });

    let status = app.store().status().unwrap();
    assert_eq!(status.table(TableKind::Subjects).unwrap().rows, 1);
    assert_eq!(status.table(TableKind::Annotation).unwrap().rows, 0);
}

#[test]
fn query_dispatch_returns_matching_output() {
    let temp = tempfile::tempdir().unwrap();
    let app = test_app(&temp);
    let sink = RecordingSink::default();
    app.create_schema(&sink).unwrap();
    let plan = LoadPlan {
        subjects: Some(write(
            &temp,
            "subjects.csv",
            "SubjectID,Sex,Age,BMI,Race,SSPG,IR_IS_classification\nS1,F,75,22.0,C,100,IS\n",
        )),
        ..LoadPlan::default()
    };
    app.load(&plan, &sink).unwrap();

    assert_matches!(
        app.query(QueryId::SubjectsOverAge, &sink).unwrap(),
        QueryOutput::SubjectsOverAge(rows) if rows.len() == 1
    );
    assert_matches!(
        app.query(QueryId::MaxTranscriptAbundance, &sink).unwrap(),
        QueryOutput::MaxTranscriptAbundance(None)
    );
    assert_matches!(
        app.query(QueryId::AgeBmiPlot, &sink).unwrap(),
        QueryOutput::AgeBmiPlot(plot) if plot.plotted_points == 1
    );
}

#[test]
fn invocation_creates_loads_then_queries() {
    let temp = tempfile::tempdir().unwrap();
    let app = test_app(&temp);
    let sink = RecordingSink::default();
    let invocation = Invocation {
        create_schema: true,
        load: Some(LoadPlan {
            subjects: Some(write(
                &temp,
                "subjects.csv",
                "SubjectID,Sex,Age,BMI,Race,SSPG,IR_IS_classification\nS1,F,75,22.0,C,100,IS\nS2,M,40,27.0,C,100,IR\n",
            )),
            ..LoadPlan::default()
        }),
        query: Some(1),
    };

    let outcome = app.run(&invocation, &sink).unwrap();
    assert_eq!(outcome.schema, Some(SchemaOutcome::Created));
    assert_eq!(outcome.load.unwrap().reports.len(), 1);
    assert_matches!(
        outcome.query,
        Some(QueryOutput::SubjectsOverAge(rows)) if rows.len() == 1 && rows[0].subject_id == "S1"
    );

    let messages = sink.messages.borrow();
    let created = messages
        .iter()
        .position(|msg| msg == "Database structure has been created.")
        .unwrap();
    let loaded = messages
        .iter()
        .position(|msg| msg == "All data loaded successfully.")
        .unwrap();
    assert!(created < loaded);
}

#[test]
fn invalid_query_number_is_reported_not_raised() {
    let temp = tempfile::tempdir().unwrap();
    let app = test_app(&temp);
    let sink = RecordingSink::default();
    app.create_schema(&sink).unwrap();

    for number in [0, 10, -1] {
        assert_eq!(app.query_number(number, &sink).unwrap(), None);
        assert_eq!(sink.last().as_deref(), Some(INVALID_QUERY_MESSAGE));
    }
    assert_eq!(
        INVALID_QUERY_MESSAGE,
        "Invalid query number. Please choose between 1 and 9."
    );

    let outcome = app
        .run(
            &Invocation {
                query: Some(300),
                ..Invocation::default()
            },
            &sink,
        )
        .unwrap();
    assert!(outcome.query.is_none());
    assert!(outcome.schema.is_none());
}

#[test]
fn valid_query_number_runs_the_query() {
    let temp = tempfile::tempdir().unwrap();
    let app = test_app(&temp);
    let sink = RecordingSink::default();
    app.create_schema(&sink).unwrap();

    assert_matches!(
        app.query_number(6, &sink).unwrap(),
        Some(QueryOutput::AgeStatistics(summary)) if summary.is_empty()
    );
}

#[test]
fn text_lines_for_query_results() {
    let config = QueryConfig::default();

    let subjects = QueryOutput::SubjectsOverAge(vec![SubjectAge {
        subject_id: "ZOZOW1T".to_string(),
        age: kira_omics_db::domain::Datum::Integer(71),
    }]);
    assert_eq!(query_lines(&subjects, &config), vec!["ZOZOW1T\t71"]);

    let summary = QueryOutput::AgeStatistics(AgeSummary {
        min: Some(29.0),
        max: Some(75.0),
        avg: Some(52.333333),
    });
    assert_eq!(
        query_lines(&summary, &config),
        vec![
            "Minimum Age: 29.00",
            "Maximum Age: 75.00",
            "Average Age: 52.33",
        ]
    );

    let missing = QueryOutput::MaxTranscriptAbundance(None);
    assert_eq!(
        query_lines(&missing, &config),
        vec!["Maximum Abundance of A1BG: NA"]
    );
    let found = QueryOutput::MaxTranscriptAbundance(Some(12.0));
    assert_eq!(
        query_lines(&found, &config),
        vec!["Maximum Abundance of A1BG: 12.0"]
    );
}

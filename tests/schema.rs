use camino::Utf8PathBuf;
use rusqlite::Connection;

use kira_omics_db::domain::TableKind;
use kira_omics_db::schema::{SchemaOutcome, create_schema};
use kira_omics_db::store::Store;

fn temp_store(temp: &tempfile::TempDir) -> Store {
    Store::new(Utf8PathBuf::from_path_buf(temp.path().join("omics.db")).unwrap())
}

fn columns(conn: &Connection, table: &str) -> Vec<(String, i64)> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .unwrap();
    stmt.query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(5)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn foreign_keys(conn: &Connection, table: &str) -> Vec<(String, String, String)> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA foreign_key_list({table})"))
        .unwrap();
    stmt.query_map([], |row| Ok((row.get(2)?, row.get(3)?, row.get(4)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn creates_all_tables_with_keys() {
    let temp = tempfile::tempdir().unwrap();
    let store = temp_store(&temp);

    assert_eq!(create_schema(&store).unwrap(), SchemaOutcome::Created);

    let status = store.status().unwrap();
    for table in TableKind::ALL {
        let entry = status.table(table).unwrap();
        assert!(entry.exists, "{table} missing");
        assert_eq!(entry.rows, 0);
    }

    let conn = store.open_read_only().unwrap();
    assert_eq!(
        columns(&conn, "Subjects"),
        vec![
            ("SubjectID".to_string(), 1),
            ("Sex".to_string(), 0),
            ("Age".to_string(), 0),
            ("BMI".to_string(), 0),
            ("Race".to_string(), 0),
            ("SSPG".to_string(), 0),
            ("InsulinStatus".to_string(), 0),
        ]
    );
    assert_eq!(
        columns(&conn, "Annotation"),
        vec![
            ("PeakID".to_string(), 1),
            ("Metabolite".to_string(), 2),
            ("KEGG".to_string(), 0),
            ("HMDB".to_string(), 0),
            ("Pathway".to_string(), 0),
        ]
    );
    assert_eq!(
        columns(&conn, "MetaboliteAbundance"),
        vec![
            ("SampleID".to_string(), 1),
            ("PeakID".to_string(), 2),
            ("Abundance".to_string(), 0),
        ]
    );

    assert_eq!(
        foreign_keys(&conn, "Samples"),
        vec![(
            "Subjects".to_string(),
            "SubjectID".to_string(),
            "SubjectID".to_string()
        )]
    );
    for table in ["TranscriptAbundance", "ProteinAbundance", "MetaboliteAbundance"] {
        assert_eq!(
            foreign_keys(&conn, table),
            vec![(
                "Samples".to_string(),
                "SampleID".to_string(),
                "SampleID".to_string()
            )]
        );
    }
}

#[test]
fn second_create_reports_conflict_and_keeps_data() {
    let temp = tempfile::tempdir().unwrap();
    let store = temp_store(&temp);
    create_schema(&store).unwrap();

    {
        let conn = store.open().unwrap();
        conn.execute(
            "INSERT INTO Subjects (SubjectID, Sex, Age) VALUES ('ZOZOW1T', 'F', 54)",
            [],
        )
        .unwrap();
    }

    let outcome = create_schema(&store).unwrap();
    match outcome {
        SchemaOutcome::AlreadyExists { message } => assert!(message.contains("already exists")),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let status = store.status().unwrap();
    assert_eq!(status.table(TableKind::Subjects).unwrap().rows, 1);
}

#[test]
fn status_on_empty_database_reports_no_tables() {
    let temp = tempfile::tempdir().unwrap();
    let store = temp_store(&temp);
    store
        .open()
        .unwrap()
        .execute_batch("PRAGMA user_version = 1;")
        .unwrap();

    let status = store.status().unwrap();
    assert!(status.tables.iter().all(|table| !table.exists));
}

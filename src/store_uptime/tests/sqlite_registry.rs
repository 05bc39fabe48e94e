use store_uptime::job::{JobOutcome, JobRegistry, JobState, RegistryError, ReportId, SqliteRegistry};

use diesel::prelude::*;
use diesel::sql_query;

mod common;
use common::setup_db;

#[tokio::test]
async fn create_get_finish_round_trip() {
    let (db, _conn) = setup_db();
    let registry = SqliteRegistry::new(db.path.clone());

    let job = registry.create().await.unwrap();
    assert_eq!(job.state, JobState::Running);

    let fetched = registry.get(&job.report_id).await.unwrap().unwrap();
    assert_eq!(fetched.report_id, job.report_id);
    assert_eq!(fetched.state, JobState::Running);

    let done = registry
        .finish(
            &job.report_id,
            JobOutcome::Complete {
                output_location: "/tmp/r.csv".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        done.state,
        JobState::Complete {
            output_location: "/tmp/r.csv".into()
        }
    );
    assert!(done.updated_at >= done.created_at);

    let reread = SqliteRegistry::new(db.path.clone())
        .get(&job.report_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reread.state, done.state);
}

#[tokio::test]
async fn terminal_jobs_do_not_transition_again() {
    let (db, _conn) = setup_db();
    let registry = SqliteRegistry::new(db.path.clone());
    let job = registry.create().await.unwrap();

    registry
        .finish(
            &job.report_id,
            JobOutcome::Error {
                message: "boom".into(),
            },
        )
        .await
        .unwrap();
    let err = registry
        .finish(
            &job.report_id,
            JobOutcome::Complete {
                output_location: "x".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyTerminal(_)));

    let state = registry.get(&job.report_id).await.unwrap().unwrap().state;
    assert_eq!(
        state,
        JobState::Error {
            message: "boom".into()
        }
    );
}

#[tokio::test]
async fn unknown_ids() {
    let (db, _conn) = setup_db();
    let registry = SqliteRegistry::new(db.path.clone());
    let id = ReportId::from("not-a-real-id");

    assert!(registry.get(&id).await.unwrap().is_none());
    let err = registry
        .finish(
            &id,
            JobOutcome::Error {
                message: "x".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::UnknownReport(_)));
}

#[tokio::test]
async fn ids_are_unique() {
    let (db, _conn) = setup_db();
    let registry = SqliteRegistry::new(db.path.clone());
    let a = registry.create().await.unwrap();
    let b = registry.create().await.unwrap();
    assert_ne!(a.report_id, b.report_id);
}

#[tokio::test]
async fn complete_row_without_location_is_corrupt() {
    let (db, mut conn) = setup_db();
    sql_query(
        "INSERT INTO report_status (report_id, status, output_location, error_message, created_at, updated_at)
            VALUES ('r1', 'Complete', NULL, NULL, '2024-01-15T12:00:00.000Z', '2024-01-15T12:00:00.000Z');",
    )
    .execute(&mut conn)
    .unwrap();

    let err = SqliteRegistry::new(db.path.clone())
        .get(&ReportId::from("r1"))
        .await
        .unwrap_err();
    match err {
        RegistryError::Corrupt { reason, .. } => {
            assert_eq!(reason, "complete without output_location")
        }
        other => panic!("expected Corrupt, got {other:?}"),
    }
}

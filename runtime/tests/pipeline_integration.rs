//! End-to-end pipeline runs against a scripted page and an in-memory store.

mod common;

use common::*;
use damlog::{AcquisitionError, ContentShapeError, Phase, PipelineError, SyncError};
use damlog_runtime::acquisition::Readiness;
use damlog_runtime::config::DEFAULT_TARGET_URL;
use damlog_runtime::pipeline::RunOptions;
use std::sync::Arc;

const RUN: RunOptions = RunOptions { dry_run: false };

#[tokio::test]
async fn test_carried_date_rows_appended_in_order() {
    let site = FakeSite::serving(page(&[row("03/10", "09:00"), row("", "09:10")]));
    let store = Arc::new(MemoryStore::default());

    let report = pipeline(&site, &store).run_at(now(), RUN).await.unwrap();

    assert_eq!(report.rows_read, 2);
    assert_eq!(report.observed, 2);
    assert_eq!(report.appended, 2);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.fetched_at, FETCHED_AT);
    assert_eq!(report.final_url, DEFAULT_TARGET_URL);
    assert_eq!(
        store.rows(),
        vec![
            stored_row(FETCHED_AT, "2025/03/10 09:00"),
            stored_row(FETCHED_AT, "2025/03/10 09:10"),
        ]
    );
    assert_eq!(store.appends(), 1);
}

#[tokio::test]
async fn test_hour_24_rolls_into_next_day() {
    let site = FakeSite::serving(page(&[row("03/10", "24:00")]));
    let store = Arc::new(MemoryStore::default());

    pipeline(&site, &store).run_at(now(), RUN).await.unwrap();

    assert_eq!(store.keys(), vec!["2025/03/11 00:00"]);
}

#[tokio::test]
async fn test_newest_first_page_is_appended_oldest_first() {
    let site = FakeSite::serving(page(&[
        row("03/10", "09:20"),
        row("", "09:10"),
        row("", "09:00"),
    ]));
    let store = Arc::new(MemoryStore::default());

    pipeline(&site, &store).run_at(now(), RUN).await.unwrap();

    assert_eq!(
        store.keys(),
        vec!["2025/03/10 09:00", "2025/03/10 09:10", "2025/03/10 09:20"]
    );
}

#[tokio::test]
async fn test_second_run_appends_nothing() {
    let site = FakeSite::serving(page(&[row("03/10", "09:00"), row("", "09:10")]));
    let store = Arc::new(MemoryStore::default());
    let pipeline = pipeline(&site, &store);

    pipeline.run_at(now(), RUN).await.unwrap();
    let second = pipeline.run_at(now(), RUN).await.unwrap();

    assert_eq!(second.appended, 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(store.rows().len(), 2);
    // an empty batch is not written at all
    assert_eq!(store.appends(), 1);
    // one browser for both runs, every tab closed
    assert_eq!(site.launches(), 1);
    assert_eq!(site.open_tabs(), 0);
}

#[tokio::test]
async fn test_only_new_rows_appended() {
    let site = FakeSite::serving(page(&[
        row("03/10", "09:00"),
        row("", "09:10"),
        row("", "09:20"),
    ]));
    let store = MemoryStore::with_rows(vec![stored_row(
        "2025-03-10T09:05:00+09:00",
        "2025/03/10 09:00",
    )]);

    let report = pipeline(&site, &store).run_at(now(), RUN).await.unwrap();

    assert_eq!(report.appended, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(
        store.keys(),
        vec!["2025/03/10 09:00", "2025/03/10 09:10", "2025/03/10 09:20"]
    );
}

#[tokio::test]
async fn test_unusable_rows_are_skipped_not_fatal() {
    let site = FakeSite::serving(page(&[
        "<tr><td>欠測</td></tr>".to_string(),
        row("03/10", "09:00"),
        row("", ""),
        row("03/10", "25:00"),
    ]));
    let store = Arc::new(MemoryStore::default());

    let report = pipeline(&site, &store).run_at(now(), RUN).await.unwrap();

    assert_eq!(report.observed, 1);
    assert_eq!(report.skipped, 3);
    assert_eq!(store.keys(), vec!["2025/03/10 09:00"]);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let site = FakeSite::serving(page(&[row("03/10", "09:00"), row("", "09:10")]));
    let store = Arc::new(MemoryStore::default());

    let report = pipeline(&site, &store)
        .run_at(now(), RunOptions { dry_run: true })
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.appended, 2);
    assert!(store.rows().is_empty());
    assert_eq!(store.appends(), 0);
}

#[tokio::test]
async fn test_readiness_reported() {
    let site = FakeSite::serving(page(&[row("03/10", "09:00")]));
    let store = Arc::new(MemoryStore::default());
    let pipeline = pipeline(&site, &store);

    let quiet = pipeline.run_at(now(), RUN).await.unwrap();
    assert_eq!(quiet.readiness, Readiness::GraceElapsed);

    site.set_console(&["boot", "table data-refreshed"]);
    let signalled = pipeline.run_at(now(), RUN).await.unwrap();
    assert_eq!(signalled.readiness, Readiness::Signalled);
}

#[tokio::test]
async fn test_wrong_page_is_shape_error() {
    let site = FakeSite::serving(format!(
        "<html><body><h1>黒部ダム</h1><table><tbody>{}</tbody></table></body></html>",
        row("03/10", "09:00")
    ));
    let store = Arc::new(MemoryStore::default());

    let err = pipeline(&site, &store).run_at(now(), RUN).await.unwrap_err();

    assert_eq!(err.phase(), Phase::Shape);
    assert!(matches!(
        err,
        PipelineError::Shape(ContentShapeError::MarkerMissing { .. })
    ));
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn test_empty_table_is_shape_error() {
    let site = FakeSite::serving(page(&[]));
    let store = Arc::new(MemoryStore::default());

    let err = pipeline(&site, &store).run_at(now(), RUN).await.unwrap_err();

    assert_eq!(err, PipelineError::Shape(ContentShapeError::EmptyGrid));
}

#[tokio::test]
async fn test_store_read_failure_is_sync_error() {
    let site = FakeSite::serving(page(&[row("03/10", "09:00")]));
    let store = Arc::new(MemoryStore::default());
    store.fail_reads(true);

    let err = pipeline(&site, &store).run_at(now(), RUN).await.unwrap_err();

    assert_eq!(err.phase(), Phase::Sync);
    assert!(matches!(
        err,
        PipelineError::Sync(SyncError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_store_write_failure_is_sync_error() {
    let site = FakeSite::serving(page(&[row("03/10", "09:00")]));
    let store = Arc::new(MemoryStore::default());
    store.fail_writes(true);

    let err = pipeline(&site, &store).run_at(now(), RUN).await.unwrap_err();

    assert_eq!(
        err,
        PipelineError::Sync(SyncError::Transport("connection reset".into()))
    );
}

#[tokio::test]
async fn test_browser_that_never_starts_is_acquisition_error() {
    let site = FakeSite::serving(page(&[row("03/10", "09:00")]));
    site.fail_launches(u32::MAX);
    let store = Arc::new(MemoryStore::default());

    let err = pipeline(&site, &store).run_at(now(), RUN).await.unwrap_err();

    assert_eq!(err.phase(), Phase::Acquisition);
    match err {
        PipelineError::Acquisition(AcquisitionError::SessionUnavailable { attempts, reason }) => {
            assert_eq!(attempts, 3);
            assert!(reason.contains("Chromium exited during startup"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(site.launches(), 3);
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn test_browser_recovers_after_failed_launches() {
    let site = FakeSite::serving(page(&[row("03/10", "09:00")]));
    site.fail_launches(2);
    let store = Arc::new(MemoryStore::default());

    pipeline(&site, &store).run_at(now(), RUN).await.unwrap();

    assert_eq!(site.launches(), 3);
    assert_eq!(store.rows().len(), 1);
}

#[tokio::test]
async fn test_navigation_failure_closes_tab() {
    let site = FakeSite::serving(page(&[row("03/10", "09:00")]));
    site.fail_navigation(true);
    let store = Arc::new(MemoryStore::default());
    let pipeline = pipeline(&site, &store);

    let err = pipeline.run_at(now(), RUN).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Acquisition(AcquisitionError::Navigation { .. })
    ));
    assert_eq!(site.open_tabs(), 0);

    // the session survives a failed navigation
    site.fail_navigation(false);
    pipeline.run_at(now(), RUN).await.unwrap();
    assert_eq!(site.launches(), 1);
}

#[tokio::test]
async fn test_concurrent_runs_do_not_double_append() {
    let site = FakeSite::serving(page(&[row("03/10", "09:00"), row("", "09:10")]));
    let store = Arc::new(MemoryStore::default());
    let pipeline = pipeline(&site, &store);

    let (a, b) = tokio::join!(pipeline.run_at(now(), RUN), pipeline.run_at(now(), RUN));

    assert_eq!(a.unwrap().appended + b.unwrap().appended, 2);
    assert_eq!(
        store.keys(),
        vec!["2025/03/10 09:00", "2025/03/10 09:10"]
    );
}

//! Operation lifecycle integration tests.
//!
//! Drives the [`Orchestrator`](trimforge::orchestrator::Orchestrator) end to
//! end with stub transcoder scripts and checks the recorded states, the
//! artifacts left on disk, and the notifications sent.

#![cfg(unix)]

mod common;

use std::collections::HashSet;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{scripts, RecordingNotifier, TestHarness};
use trimforge::orchestrator::EditRequest;
use trimforge_common::{artifacts, Error};
use trimforge_db::OperationState;

fn trim_clip(user: &str) -> EditRequest {
    EditRequest::new(user, "clip.mp4", "00:00:05", "00:00:10")
}

// ---------------------------------------------------------------------------
// Submit -> queued -> finished -> fetch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_finish_fetch() {
    let h = TestHarness::new(scripts::GATED);
    h.register("u1@example.com");
    let source = h.upload("clip.mp4");

    let submission = h.orchestrator.submit(&trim_clip("u1@example.com")).await.unwrap();
    assert!(
        artifacts::is_output_name(&submission.output_ref),
        "unexpected output name {}",
        submission.output_ref
    );

    // Still queued while the transcoder is held.
    h.wait_started(1).await;
    let status = h.orchestrator.status("u1@example.com", None).unwrap();
    assert_eq!(status.id, submission.operation_id);
    assert_eq!(status.state, OperationState::Queued);
    assert_eq!(status.output_ref, submission.output_ref);
    assert_matches!(
        h.orchestrator.fetch_result("u1@example.com", None),
        Err(Error::NotFound { .. })
    );

    h.release();
    assert_eq!(submission.job.wait().await.unwrap(), OperationState::Finished);

    let download = h.orchestrator.fetch_result("u1@example.com", None).unwrap();
    assert_eq!(download.output_ref, submission.output_ref);
    assert!(download.path.exists());
    assert!(!source.exists(), "source must not outlive the attempt");

    let status = h.orchestrator.status("u1@example.com", None).unwrap();
    assert_eq!(status.state, OperationState::Finished);
    assert!(status.completed_at.is_some());
    assert!(status.error_message.is_none());
}

#[tokio::test]
async fn relative_storage_dirs_finish() {
    // Created under the current directory so its path can be given relatively.
    let scratch = tempfile::tempdir_in(".").unwrap();
    let relative = scratch.path().to_path_buf();
    assert!(relative.is_relative());

    let h = TestHarness::with_config(scripts::SUCCEED, RecordingNotifier::default(), |c| {
        c.storage.upload_dir = relative.join("upload");
        c.storage.output_dir = relative.join("output");
    });
    h.register("u1@example.com");
    let source = h.upload("clip.mp4");

    let submission = h.orchestrator.submit(&trim_clip("u1@example.com")).await.unwrap();
    assert_eq!(submission.job.wait().await.unwrap(), OperationState::Finished);

    let download = h.orchestrator.fetch_result("u1@example.com", None).unwrap();
    assert!(download.path.is_absolute());
    assert!(download.path.exists());
    assert!(h.output_path(&submission.output_ref).exists());
    assert!(!source.exists());
}

// ---------------------------------------------------------------------------
// Submit -> failed -> resubmit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failure_is_terminal_and_resubmission_is_new() {
    let h = TestHarness::new(scripts::FAIL);
    h.register("u1@example.com");
    let source = h.upload("clip.mp4");

    let first = h.orchestrator.submit(&trim_clip("u1@example.com")).await.unwrap();
    assert_eq!(first.job.wait().await.unwrap(), OperationState::Failed);
    assert!(!source.exists());
    assert!(!h.output_path(&first.output_ref).exists());

    let status = h.orchestrator.status("u1@example.com", Some(first.operation_id)).unwrap();
    assert_eq!(status.state, OperationState::Failed);
    assert!(status.error_message.unwrap().contains("Invalid data"));
    assert_matches!(
        h.orchestrator.fetch_result("u1@example.com", Some(first.operation_id)),
        Err(Error::NotFound { .. })
    );

    // Failed stays failed; trying again is a new operation.
    h.upload("clip.mp4");
    let second = h.orchestrator.submit(&trim_clip("u1@example.com")).await.unwrap();
    assert_ne!(second.operation_id, first.operation_id);
    assert_ne!(second.output_ref, first.output_ref);
    second.job.wait().await.unwrap();

    let first_again = h.orchestrator.status("u1@example.com", Some(first.operation_id)).unwrap();
    assert_eq!(first_again.state, OperationState::Failed);
}

#[tokio::test]
async fn missing_upload_fails_operation() {
    let h = TestHarness::new(scripts::SUCCEED);
    h.register("u1@example.com");

    let submission = h.orchestrator.submit(&trim_clip("u1@example.com")).await.unwrap();
    assert_eq!(submission.job.wait().await.unwrap(), OperationState::Failed);

    let status = h.orchestrator.status("u1@example.com", None).unwrap();
    assert!(status.error_message.unwrap().contains("missing"));
}

#[tokio::test]
async fn timeout_fails_operation_and_removes_source() {
    let h = TestHarness::with_config(scripts::HANG, RecordingNotifier::default(), |c| {
        c.transcoder.timeout_secs = 1;
    });
    h.register("u1@example.com");
    let source = h.upload("clip.mp4");

    let submission = h.orchestrator.submit(&trim_clip("u1@example.com")).await.unwrap();
    assert_eq!(submission.job.wait().await.unwrap(), OperationState::Failed);
    assert!(!source.exists());

    let status = h.orchestrator.status("u1@example.com", None).unwrap();
    assert!(status.error_message.unwrap().contains("timed out"));
}

#[tokio::test]
async fn unrecordable_finish_fails_operation() {
    let h = TestHarness::new(scripts::SUCCEED);
    let user = h.register("u1@example.com");
    h.orchestrator.store().set_subscription(user, Some(b"sub")).unwrap();
    h.conn()
        .execute_batch(
            "CREATE TRIGGER block_finish BEFORE UPDATE OF state ON operations
             WHEN NEW.state = 'finished'
             BEGIN SELECT RAISE(ABORT, 'db down'); END;",
        )
        .unwrap();
    let source = h.upload("clip.mp4");

    let submission = h.orchestrator.submit(&trim_clip("u1@example.com")).await.unwrap();
    assert_eq!(submission.job.wait().await.unwrap(), OperationState::Failed);

    let status = h.orchestrator.status("u1@example.com", None).unwrap();
    assert_eq!(status.state, OperationState::Failed);
    assert!(status.error_message.unwrap().contains("could not be recorded"));
    assert!(!h.output_path(&submission.output_ref).exists());
    assert!(!source.exists());
    assert!(h.notifier.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_subscription_means_no_notification() {
    let h = TestHarness::new(scripts::SUCCEED);
    h.register("u1@example.com");
    h.upload("clip.mp4");

    let submission = h.orchestrator.submit(&trim_clip("u1@example.com")).await.unwrap();
    assert_eq!(submission.job.wait().await.unwrap(), OperationState::Finished);
    assert!(h.notifier.calls().is_empty());
}

#[tokio::test]
async fn subscriber_is_notified_once() {
    let h = TestHarness::new(scripts::SUCCEED);
    let user = h.register("u1@example.com");
    h.orchestrator
        .store()
        .set_subscription(user, Some(b"{\"endpoint\":\"https://push\"}"))
        .unwrap();
    h.upload("clip.mp4");

    let submission = h.orchestrator.submit(&trim_clip("u1@example.com")).await.unwrap();
    submission.job.wait().await.unwrap();

    let calls = h.notifier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, b"{\"endpoint\":\"https://push\"}".to_vec());
    assert_eq!(calls[0].1.operation_id, submission.operation_id);
    assert_eq!(calls[0].1.output_ref, submission.output_ref);
}

#[tokio::test]
async fn failed_operation_is_not_notified() {
    let h = TestHarness::new(scripts::FAIL);
    let user = h.register("u1@example.com");
    h.orchestrator.store().set_subscription(user, Some(b"sub")).unwrap();
    h.upload("clip.mp4");

    let submission = h.orchestrator.submit(&trim_clip("u1@example.com")).await.unwrap();
    assert_eq!(submission.job.wait().await.unwrap(), OperationState::Failed);
    assert!(h.notifier.calls().is_empty());
}

#[tokio::test]
async fn delivery_failure_does_not_fail_operation() {
    let h = TestHarness::with_config(scripts::SUCCEED, RecordingNotifier::failing(), |_| {});
    let user = h.register("u1@example.com");
    h.orchestrator.store().set_subscription(user, Some(b"sub")).unwrap();
    h.upload("clip.mp4");

    let submission = h.orchestrator.submit(&trim_clip("u1@example.com")).await.unwrap();
    assert_eq!(submission.job.wait().await.unwrap(), OperationState::Finished);
    assert_eq!(h.notifier.calls().len(), 1);
    h.orchestrator.fetch_result("u1@example.com", None).unwrap();
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_transcodes_are_bounded() {
    let h = TestHarness::with_config(scripts::GATED, RecordingNotifier::default(), |c| {
        c.transcoder.max_concurrent_jobs = 1;
    });
    h.register("u1@example.com");
    h.upload("a.mp4");
    h.upload("b.mp4");

    let first = h
        .orchestrator
        .submit(&EditRequest::new("u1@example.com", "a.mp4", "1", "2"))
        .await
        .unwrap();
    let second = h
        .orchestrator
        .submit(&EditRequest::new("u1@example.com", "b.mp4", "1", "2"))
        .await
        .unwrap();

    h.wait_started(1).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.started(), 1, "second transcode ran without a free slot");

    h.release();
    assert_eq!(first.job.wait().await.unwrap(), OperationState::Finished);
    assert_eq!(second.job.wait().await.unwrap(), OperationState::Finished);
}

#[tokio::test]
async fn many_submissions_get_distinct_outputs() {
    let h = TestHarness::with_config(scripts::SUCCEED, RecordingNotifier::default(), |c| {
        c.transcoder.max_concurrent_jobs = 4;
    });
    h.register("u1@example.com");

    let mut submissions = Vec::new();
    for i in 0..12 {
        let name = format!("clip{i}.mp4");
        h.upload(&name);
        let request = EditRequest::new("u1@example.com", name, "00:00:01", "00:00:02");
        submissions.push(h.orchestrator.submit(&request).await.unwrap());
    }

    let outputs: HashSet<String> = submissions.iter().map(|s| s.output_ref.clone()).collect();
    assert_eq!(outputs.len(), submissions.len());

    let last_id = submissions.last().unwrap().operation_id;
    for submission in submissions {
        assert_eq!(submission.job.wait().await.unwrap(), OperationState::Finished);
    }

    // The latest operation is the last one submitted.
    let latest = h.orchestrator.status("u1@example.com", None).unwrap();
    assert_eq!(latest.id, last_id);
    assert_eq!(h.orchestrator.history("u1@example.com", 100).unwrap().len(), 12);
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

#[tokio::test]
async fn results_are_private_to_their_owner() {
    let h = TestHarness::new(scripts::SUCCEED);
    h.register("u1@example.com");
    h.register("u2@example.com");
    h.upload("clip.mp4");

    let submission = h.orchestrator.submit(&trim_clip("u1@example.com")).await.unwrap();
    submission.job.wait().await.unwrap();

    assert_matches!(
        h.orchestrator.fetch_result("u2@example.com", Some(submission.operation_id)),
        Err(Error::NotFound { .. })
    );
    assert_matches!(
        h.orchestrator.status("u2@example.com", None),
        Err(Error::NotFound { .. })
    );
}

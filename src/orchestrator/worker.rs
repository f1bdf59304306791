//! The per-operation worker task.

use std::sync::Arc;
use std::time::Duration;

use trimforge_av::{SourceGuard, TrimJob};
use trimforge_common::{Error, OperationId, Result, UserId};
use trimforge_db::OperationState;

use super::{blocking, Shared};
use crate::notifications::CompletionMessage;

/// Everything a worker needs to drive one operation to a terminal state.
pub(super) struct WorkItem {
    pub operation_id: OperationId,
    pub user_id: UserId,
    pub output_ref: String,
    pub job: TrimJob,
    /// Owns the source artifact until the attempt is over.
    pub source: SourceGuard,
}

/// Attempts per state transition before giving up on the store.
const TRANSITION_ATTEMPTS: u32 = 3;

/// Base delay between transition attempts; multiplied by the attempt number.
const TRANSITION_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
enum Transition {
    Finish,
    Fail(String),
}

/// Run one operation: wait for a transcode slot, trim, then record the
/// outcome.
pub(super) async fn run(shared: Arc<Shared>, item: WorkItem) -> Result<OperationState> {
    let WorkItem {
        operation_id,
        user_id,
        output_ref,
        job,
        source: _source,
    } = item;

    let _permit = shared
        .permits
        .acquire()
        .await
        .map_err(|_| Error::internal("transcode slots closed"))?;

    tracing::info!(
        operation_id = %operation_id,
        user_id = %user_id,
        output_ref = %output_ref,
        "Starting trim"
    );

    let reason = match shared.runner.run(&job).await {
        Ok(()) => match transition(&shared, operation_id, Transition::Finish).await {
            Ok(()) => {
                tracing::info!(operation_id = %operation_id, output_ref = %output_ref, "Trim finished");
                notify_user(&shared, user_id, operation_id, &output_ref).await;
                return Ok(OperationState::Finished);
            }
            Err(e) => {
                tracing::error!(
                    operation_id = %operation_id,
                    error = %e,
                    "Trim finished but could not be recorded"
                );
                format!("finished but could not be recorded: {e}")
            }
        },
        Err(e) => {
            tracing::warn!(operation_id = %operation_id, error = %e, "Trim failed");
            e.to_string()
        }
    };

    remove_partial_output(&job);
    if let Err(e) = transition(&shared, operation_id, Transition::Fail(reason)).await {
        tracing::error!(
            operation_id = %operation_id,
            error = %e,
            "Could not record failure, operation left queued until restart"
        );
        return Err(e);
    }
    Ok(OperationState::Failed)
}

/// Apply a state transition, retrying while the store reports itself
/// unavailable.
async fn transition(shared: &Shared, operation_id: OperationId, to: Transition) -> Result<()> {
    let mut attempt = 1;
    loop {
        let step = to.clone();
        let result = blocking(&shared.store, move |store| {
            match step {
                Transition::Finish => store.mark_finished(operation_id)?,
                Transition::Fail(reason) => store.mark_failed(operation_id, &reason)?,
            }
            Ok(())
        })
        .await;

        match result {
            Err(Error::Store(e)) if e.is_transient() && attempt < TRANSITION_ATTEMPTS => {
                tracing::warn!(
                    operation_id = %operation_id,
                    attempt,
                    error = %e,
                    "Store unavailable, retrying transition"
                );
                tokio::time::sleep(TRANSITION_BACKOFF * attempt).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Best-effort completion notification.
async fn notify_user(shared: &Shared, user_id: UserId, operation_id: OperationId, output_ref: &str) {
    let subscription = match blocking(&shared.store, move |store| {
        Ok(store.get_subscription(user_id)?)
    })
    .await
    {
        Ok(Some(subscription)) => subscription,
        Ok(None) => {
            tracing::debug!(user_id = %user_id, "No push subscription, skipping notification");
            return;
        }
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to load push subscription");
            return;
        }
    };

    let message = CompletionMessage::finished(operation_id, output_ref);
    match shared.notifier.notify(&subscription, &message).await {
        Ok(()) => tracing::debug!(
            operation_id = %operation_id,
            notifier = shared.notifier.name(),
            "Completion notification sent"
        ),
        Err(e) => tracing::warn!(
            operation_id = %operation_id,
            notifier = shared.notifier.name(),
            error = %e,
            "Failed to deliver completion notification"
        ),
    }
}

fn remove_partial_output(job: &TrimJob) {
    match std::fs::remove_file(&job.output) {
        Ok(()) => tracing::debug!(path = %job.output.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %job.output.display(),
            error = %e,
            "Failed to remove partial output"
        ),
    }
}

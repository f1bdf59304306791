//! Operation lifecycle orchestration.
//!
//! The [`Orchestrator`] accepts trim requests, records each as a `queued`
//! operation, and drives it to `finished` or `failed` on a background task:
//!
//! ```text
//! submit ──▶ queued ──▶ runner ok  ──▶ finished ──▶ notify (best effort)
//!                  └──▶ runner err ──▶ failed
//! ```
//!
//! Terminal states are final. A failed operation is never retried; the user
//! submits again and gets a new operation.

pub mod request;
mod worker;

pub use request::EditRequest;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use trimforge_av::{ProcessRunner, SourceGuard, TrimJob};
use trimforge_common::{artifacts, Error, OperationId, Result, UserId};
use trimforge_db::{Operation, OperationState, OperationStore};

use crate::config::Config;
use crate::notifications::Notifier;

/// Reason recorded for operations orphaned by a restart.
pub const INTERRUPTED_REASON: &str = "interrupted by restart";

/// State shared between the orchestrator and its workers.
pub(crate) struct Shared {
    store: OperationStore,
    runner: ProcessRunner,
    notifier: Arc<dyn Notifier>,
    upload_dir: PathBuf,
    output_dir: PathBuf,
    permits: Semaphore,
}

/// Drives trim operations through their lifecycle.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

/// The result of an accepted submission.
#[derive(Debug)]
pub struct Submission {
    pub operation_id: OperationId,
    pub output_ref: String,
    pub job: JobHandle,
}

/// Handle to the background task processing one operation.
#[derive(Debug)]
pub struct JobHandle {
    operation_id: OperationId,
    handle: JoinHandle<Result<OperationState>>,
}

impl JobHandle {
    /// Wait for the operation to reach a terminal state.
    pub async fn wait(self) -> Result<OperationState> {
        self.handle
            .await
            .map_err(|e| Error::internal(format!("worker for operation {} failed: {e}", self.operation_id)))?
    }
}

/// Where a finished operation's output can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRef {
    pub operation_id: OperationId,
    pub output_ref: String,
    pub path: PathBuf,
}

impl Orchestrator {
    /// Build an orchestrator from configuration.
    ///
    /// Relative storage directories are resolved against the current
    /// directory once, here.
    pub fn new(config: &Config, store: OperationStore, notifier: Arc<dyn Notifier>) -> Self {
        let transcoder = &config.transcoder;
        let runner = ProcessRunner::new(transcoder.program.clone())
            .with_leading_args(transcoder.extra_args.iter().cloned())
            .with_timeout(Duration::from_secs(transcoder.timeout_secs));

        Self {
            shared: Arc::new(Shared {
                store,
                runner,
                notifier,
                upload_dir: absolute_dir(&config.storage.upload_dir),
                output_dir: absolute_dir(&config.storage.output_dir),
                permits: Semaphore::new(transcoder.max_concurrent_jobs.max(1)),
            }),
        }
    }

    pub fn store(&self) -> &OperationStore {
        &self.shared.store
    }

    /// Accept a trim request and start processing it in the background.
    ///
    /// Returns once the operation is recorded as `queued`. Must be called
    /// from within a Tokio runtime.
    ///
    /// Once `source_ref` resolves inside the upload directory, the source
    /// artifact is deleted on every path out of this call that does not hand
    /// it to a worker.
    pub async fn submit(&self, request: &EditRequest) -> Result<Submission> {
        let source_path = request::resolve_source(&self.shared.upload_dir, &request.source_ref)?;
        let source = SourceGuard::new(&source_path);

        request::validate_trim_range(&request.trim_start, &request.trim_end)?;
        let email = request.user.clone();
        let user_id = blocking(&self.shared.store, move |store| lookup_user(store, &email)).await?;

        let output_ref = artifacts::new_output_name();
        let operation = {
            let source_ref = request.source_ref.clone();
            let trim_start = request.trim_start.trim().to_string();
            let trim_end = request.trim_end.trim().to_string();
            let output_ref = output_ref.clone();
            blocking(&self.shared.store, move |store| {
                Ok(store.create(user_id, &source_ref, &trim_start, &trim_end, &output_ref)?)
            })
            .await?
        };

        tracing::info!(
            operation_id = %operation.id,
            user_id = %user_id,
            output_ref = %output_ref,
            "Operation queued"
        );

        let item = worker::WorkItem {
            operation_id: operation.id,
            user_id,
            output_ref: output_ref.clone(),
            job: TrimJob {
                source: source_path,
                trim_start: operation.trim_start.clone(),
                trim_end: operation.trim_end.clone(),
                working_dir: self.shared.output_dir.clone(),
                output: self.shared.output_dir.join(&output_ref),
            },
            source,
        };
        let handle = tokio::spawn(worker::run(Arc::clone(&self.shared), item));

        Ok(Submission {
            operation_id: operation.id,
            output_ref,
            job: JobHandle {
                operation_id: operation.id,
                handle,
            },
        })
    }

    /// Locate the output of a finished operation.
    ///
    /// Without an id, the caller's most recent operation is used. Operations
    /// that are not finished, do not exist, or belong to someone else are all
    /// reported as not found.
    pub fn fetch_result(&self, user: &str, operation_id: Option<OperationId>) -> Result<DownloadRef> {
        let operation = self.status(user, operation_id)?;
        if operation.state != OperationState::Finished {
            return Err(Error::not_found("result", operation.id));
        }

        Ok(DownloadRef {
            operation_id: operation.id,
            path: self.shared.output_dir.join(&operation.output_ref),
            output_ref: operation.output_ref,
        })
    }

    /// An operation in any state, including a failure reason.
    pub fn status(&self, user: &str, operation_id: Option<OperationId>) -> Result<Operation> {
        let user_id = self.resolve_user(user)?;
        let store = &self.shared.store;

        let operation = match operation_id {
            Some(id) => store.get_by_id(user_id, id)?,
            None => store.get_latest_for_user(user_id)?,
        };

        operation.ok_or_else(|| match operation_id {
            Some(id) => Error::not_found("operation", id),
            None => Error::not_found("operation", "latest"),
        })
    }

    /// The caller's operations, newest first.
    pub fn history(&self, user: &str, limit: usize) -> Result<Vec<Operation>> {
        let user_id = self.resolve_user(user)?;
        Ok(self.shared.store.list_for_user(user_id, limit)?)
    }

    /// Fail operations left `queued` by a previous process and remove their
    /// source artifacts.
    ///
    /// Call before submitting any work.
    pub fn recover_interrupted(&self) -> Result<Vec<Operation>> {
        let failed = self.shared.store.fail_interrupted(INTERRUPTED_REASON)?;

        for operation in &failed {
            tracing::warn!(
                operation_id = %operation.id,
                user_id = %operation.user_id,
                "Operation interrupted by restart, marked failed"
            );
            if let Ok(path) = request::resolve_source(&self.shared.upload_dir, &operation.source_ref) {
                drop(SourceGuard::new(path));
            }
            let partial = self.shared.output_dir.join(&operation.output_ref);
            if partial.exists() {
                if let Err(e) = std::fs::remove_file(&partial) {
                    tracing::warn!(path = %partial.display(), error = %e, "Failed to remove partial output");
                }
            }
        }

        Ok(failed)
    }

    fn resolve_user(&self, email: &str) -> Result<UserId> {
        lookup_user(&self.shared.store, email)
    }
}

fn lookup_user(store: &OperationStore, email: &str) -> Result<UserId> {
    let email = email.trim();
    if email.is_empty() {
        return Err(Error::validation("user identity is empty"));
    }
    store
        .resolve_user(email)?
        .ok_or_else(|| Error::validation(format!("unknown user: {email}")))
}

/// Run a store call on the blocking thread pool.
pub(crate) async fn blocking<T, F>(store: &OperationStore, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&OperationStore) -> Result<T> + Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| Error::internal(format!("store task failed: {e}")))?
}

fn absolute_dir(dir: &Path) -> PathBuf {
    std::path::absolute(dir).unwrap_or_else(|e| {
        tracing::warn!(path = %dir.display(), error = %e, "Could not resolve storage directory");
        dir.to_path_buf()
    })
}

//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires an [`Orchestrator`] to an in-memory
//! DB, temp upload/output directories, a [`RecordingNotifier`], and a stub
//! transcoder script run through `sh`.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use trimforge::config::{prepare_storage, Config};
use trimforge::notifications::{CompletionMessage, Notifier};
use trimforge::orchestrator::Orchestrator;
use trimforge_common::{NotifyError, UserId};
use trimforge_db::pool::{get_conn, init_memory_pool, DbPool, PooledConnection};
use trimforge_db::OperationStore;

/// Stub transcoder bodies. Each runs as `sh <script> <transcoder args...>`
/// in the output directory; the last argument is the output path.
pub mod scripts {
    /// Writes an empty output file and exits 0.
    pub const SUCCEED: &str = "for last; do :; done\n: > \"$last\"\n";

    /// Complains on stderr and exits 1.
    pub const FAIL: &str = "echo 'Invalid data found when processing input' >&2\nexit 1\n";

    /// Never finishes on its own.
    pub const HANG: &str = "sleep 30\n";

    /// Marks itself started, waits for a `release` file, then succeeds.
    pub const GATED: &str = ": > \"started_$$\"\n\
        while [ ! -f release ]; do sleep 0.05; done\n\
        for last; do :; done\n\
        : > \"$last\"\n";
}

/// Records every notification; optionally fails delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(Vec<u8>, CompletionMessage)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<(Vec<u8>, CompletionMessage)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(
        &self,
        subscription: &[u8],
        message: &CompletionMessage,
    ) -> Result<(), NotifyError> {
        self.calls
            .lock()
            .unwrap()
            .push((subscription.to_vec(), message.clone()));
        if self.fail {
            return Err(NotifyError::delivery_failed("gateway said no"));
        }
        Ok(())
    }
}

/// Test harness wrapping an [`Orchestrator`] backed by an in-memory database.
pub struct TestHarness {
    pub dir: TempDir,
    pub config: Config,
    pub db: DbPool,
    pub orchestrator: Orchestrator,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestHarness {
    /// Create a harness whose transcoder runs `script`.
    pub fn new(script: &str) -> Self {
        Self::with_config(script, RecordingNotifier::default(), |_| {})
    }

    /// Create a harness with a custom notifier and config tweaks.
    pub fn with_config(
        script: &str,
        notifier: RecordingNotifier,
        tweak: impl FnOnce(&mut Config),
    ) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let script_path = dir.path().join("transcoder.sh");
        std::fs::write(&script_path, script).expect("failed to write stub transcoder");

        let mut config = Config::default();
        config.storage.database_path = dir.path().join("unused.db");
        config.storage.upload_dir = dir.path().join("upload");
        config.storage.output_dir = dir.path().join("output");
        config.transcoder.program = PathBuf::from("sh");
        config.transcoder.extra_args = vec![script_path.to_string_lossy().to_string()];
        config.transcoder.timeout_secs = 10;
        tweak(&mut config);
        prepare_storage(&config).expect("failed to create storage dirs");

        let db = init_memory_pool().expect("failed to create in-memory pool");
        let store = OperationStore::new(db.clone());
        let notifier = Arc::new(notifier);
        let orchestrator = Orchestrator::new(&config, store, notifier.clone());

        Self {
            dir,
            config,
            db,
            orchestrator,
            notifier,
        }
    }

    /// A raw connection to the harness database.
    pub fn conn(&self) -> PooledConnection {
        get_conn(&self.db).expect("failed to get db connection")
    }

    /// Register a user.
    pub fn register(&self, email: &str) -> UserId {
        self.orchestrator
            .store()
            .register_user(email, "hash")
            .expect("failed to register user")
    }

    /// Place a source artifact in the upload directory.
    pub fn upload(&self, name: &str) -> PathBuf {
        let path = self.config.storage.upload_dir.join(name);
        std::fs::write(&path, b"fake video bytes").expect("failed to write upload");
        path
    }

    pub fn output_path(&self, output_ref: &str) -> PathBuf {
        self.config.storage.output_dir.join(output_ref)
    }

    /// Let gated transcoders finish.
    pub fn release(&self) {
        std::fs::write(self.config.storage.output_dir.join("release"), b"")
            .expect("failed to write release marker");
    }

    /// How many gated transcoders have started.
    pub fn started(&self) -> usize {
        std::fs::read_dir(&self.config.storage.output_dir)
            .expect("failed to list output dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("started_"))
            .count()
    }

    /// Poll until `count` gated transcoders have started.
    pub async fn wait_started(&self, count: usize) {
        for _ in 0..200 {
            if self.started() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("only {} of {} transcoders started", self.started(), count);
    }
}

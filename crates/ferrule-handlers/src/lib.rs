//! Handlers for bridge commands.
//!
//! Every handler follows the same shape: resolve the path inside the project,
//! take the document's mutex, talk to the host, and update the coordinator
//! only after the host confirmed the save. Failures are logged and returned as
//! an [`Outcome`], never propagated.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ferrule_core::{BridgeError, DocumentKey, ProjectRoot};
use ferrule_host::{Edit, HostEditor};
use ferrule_undo::Coordinator;

pub mod dispatch;
pub mod outcome;
pub mod show;
pub mod undo;
pub mod write;

pub use dispatch::{dispatch, recognize, Report};
pub use outcome::{FileOutcome, Outcome};

/// Everything a handler needs, shared across requests.
pub struct BridgeContext {
    pub project: ProjectRoot,
    pub coordinator: Arc<Coordinator>,
    pub host: Arc<dyn HostEditor>,
    /// Bound on each individual host call.
    pub timeout: Duration,
}

impl BridgeContext {
    /// Build a context with a fresh coordinator subscribed to the host's saves.
    pub fn new(project: ProjectRoot, host: Arc<dyn HostEditor>, timeout: Duration) -> Self {
        let coordinator = Arc::new(Coordinator::new());
        host.subscribe_saves(coordinator.clone());
        Self {
            project,
            coordinator,
            host,
            timeout,
        }
    }

    pub(crate) fn resolve(&self, file: &str) -> Result<DocumentKey, BridgeError> {
        self.project.resolve(file)
    }

    /// Run a host call with the configured timeout.
    pub(crate) async fn bounded<T>(
        &self,
        target: impl fmt::Display,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, BridgeError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(BridgeError::Host),
            Err(_) => Err(BridgeError::TimedOut {
                target: target.to_string(),
                timeout_ms: self.timeout.as_millis(),
            }),
        }
    }

    pub(crate) async fn read(&self, key: &DocumentKey) -> Result<Option<Vec<u8>>, BridgeError> {
        self.bounded(key, self.host.read_file(key.as_path())).await
    }

    pub(crate) async fn apply(
        &self,
        key: &DocumentKey,
        edit: Edit,
        label: Option<&str>,
    ) -> Result<(), BridgeError> {
        if self
            .bounded(key, self.host.apply_edit(key.as_path(), edit, label))
            .await?
        {
            Ok(())
        } else {
            Err(BridgeError::EditRejected(key.clone()))
        }
    }

    /// Save `key` with the document locked, then run `record` if and only if
    /// the host confirmed the save. The lock is released on every path.
    pub(crate) async fn save_and_record(
        &self,
        key: &DocumentKey,
        record: impl FnOnce(&Coordinator),
    ) -> Result<(), BridgeError> {
        let _scope = self.coordinator.suppress_saves(key);
        match self.bounded(key, self.host.save_document(key.as_path())).await {
            Ok(true) => {
                record(&self.coordinator);
                Ok(())
            }
            Ok(false) => Err(BridgeError::SaveFailed {
                key: key.clone(),
                reason: "host reported failure".to_string(),
            }),
            Err(BridgeError::Host(e)) => Err(BridgeError::SaveFailed {
                key: key.clone(),
                reason: e.to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use ferrule_host::FsHost;

    pub struct Fixture {
        _tmp: tempfile::TempDir,
        pub host: Arc<FsHost>,
        pub ctx: BridgeContext,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self::with_timeout(Duration::from_secs(5))
        }

        pub fn with_timeout(timeout: Duration) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let project = ProjectRoot::new(tmp.path()).unwrap();
            let host = Arc::new(FsHost::new());
            let ctx = BridgeContext::new(project, host.clone(), timeout);
            Self { _tmp: tmp, host, ctx }
        }

        /// Canonical path of a project file as a string, the way a client sends it.
        pub fn file(&self, name: &str) -> String {
            self.ctx.project.path().join(name).to_string_lossy().into_owned()
        }

        pub fn key(&self, name: &str) -> DocumentKey {
            self.ctx.project.resolve(name).unwrap()
        }
    }
}

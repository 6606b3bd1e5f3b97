//! Install queue - one worker, strict FIFO.
//!
//! Every unit install goes through a single background task, so installs
//! never overlap no matter how many call sites submit work concurrently.
//! Clone the handle to share the queue; do not spawn a second coordinator
//! for the same namespace.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tokio::sync::{mpsc, oneshot};

use crate::error::InstallError;
use crate::installer::{InstalledUnit, UnitInstaller};
use crate::paths::Namespace;

/// npm-compatible package name, optionally scoped.
const NAME_PATTERN: &str = r"^(@[a-z0-9][a-z0-9._~-]*/)?[a-z0-9~][a-z0-9._~-]*$";

fn name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(NAME_PATTERN).ok()).as_ref()
}

/// Whether `name` is a package name the install tool can be handed safely.
pub fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 214
        && name_pattern().is_some_and(|re| re.is_match(name))
}

/// Work item sent to the queue worker
struct QueuedInstall {
    dir: PathBuf,
    name: String,
    version: String,
    resp: oneshot::Sender<Result<InstalledUnit, InstallError>>,
}

impl fmt::Debug for QueuedInstall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedInstall")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// A handle to the install queue that is Send + Sync and Clone.
#[derive(Clone)]
pub struct DownloadCoordinator {
    sender: mpsc::UnboundedSender<QueuedInstall>,
    namespace: Namespace,
}

impl fmt::Debug for DownloadCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadCoordinator")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// An admitted install; await it with [`PendingInstall::wait`].
#[derive(Debug)]
pub struct PendingInstall {
    name: String,
    rx: oneshot::Receiver<Result<InstalledUnit, InstallError>>,
}

impl PendingInstall {
    /// Package the install is for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the worker to finish this install.
    pub async fn wait(self) -> Result<InstalledUnit, InstallError> {
        self.rx.await.map_err(|_| InstallError::WorkerGone)?
    }
}

impl DownloadCoordinator {
    /// Spawn the queue worker on the current tokio runtime.
    pub fn spawn(namespace: Namespace, installer: Arc<dyn UnitInstaller>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(installer, receiver));
        Self { sender, namespace }
    }

    /// Admit one install. A relative `dir` resolves under the namespace root
    /// and is created if absent. An empty or malformed `name` admits nothing
    /// and yields `None`.
    pub fn enqueue(
        &self,
        dir: &Path,
        name: &str,
        version: &str,
    ) -> Result<Option<PendingInstall>, InstallError> {
        let dir = self.namespace.resolve(dir);
        std::fs::create_dir_all(&dir)?;

        if !is_valid_package_name(name) {
            tracing::debug!("Not queueing install of invalid package name '{name}'");
            return Ok(None);
        }

        let version = if version.is_empty() { "latest" } else { version };
        tracing::debug!("{name} {version} added to the install queue");

        let (resp, rx) = oneshot::channel();
        self.sender
            .send(QueuedInstall {
                dir,
                name: name.to_string(),
                version: version.to_string(),
                resp,
            })
            .map_err(|_| InstallError::WorkerGone)?;

        Ok(Some(PendingInstall {
            name: name.to_string(),
            rx,
        }))
    }
}

/// The worker: one install at a time, in submission order.
async fn run_queue(
    installer: Arc<dyn UnitInstaller>,
    mut receiver: mpsc::UnboundedReceiver<QueuedInstall>,
) {
    while let Some(item) = receiver.recv().await {
        let result = installer.install(&item.dir, &item.name, &item.version).await;
        if let Err(e) = &result {
            tracing::debug!("Queued install of {} failed: {e}", item.name);
        }
        let _ = item.resp.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Timed {
        spans: Mutex<Vec<(String, Instant, Instant)>>,
    }

    #[async_trait]
    impl UnitInstaller for Timed {
        async fn install(
            &self,
            work_dir: &Path,
            name: &str,
            version: &str,
        ) -> Result<InstalledUnit, InstallError> {
            let start = Instant::now();
            tokio::time::sleep(Duration::from_millis(20)).await;
            let end = Instant::now();
            self.spans.lock().unwrap().push((name.to_string(), start, end));
            if name == "broken" {
                return Err(InstallError::ToolFailed {
                    name: name.to_string(),
                    code: Some(1),
                });
            }
            Ok(InstalledUnit {
                name: name.to_string(),
                version: version.to_string(),
                path: work_dir.to_path_buf(),
            })
        }
    }

    #[test]
    fn test_package_names() {
        assert!(is_valid_package_name("demo"));
        assert!(is_valid_package_name("@ide/demo-plugin"));
        assert!(is_valid_package_name("lodash.merge"));
        assert!(!is_valid_package_name(""));
        assert!(!is_valid_package_name("Demo"));
        assert!(!is_valid_package_name("../escape"));
        assert!(!is_valid_package_name("a b"));
    }

    #[test]
    fn test_name_pattern_compiled_once() {
        let first = name_pattern().unwrap();
        let second = name_pattern().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[tokio::test]
    async fn test_queue_runs_in_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let installer = Arc::new(Timed::default());
        let queue = DownloadCoordinator::spawn(Namespace::new(dir.path(), "TEST"), installer.clone());

        let pending: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|n| queue.enqueue(Path::new("Plugin/x"), n, "1.0.0").unwrap().unwrap())
            .collect();
        let results = futures::future::join_all(pending.into_iter().map(PendingInstall::wait)).await;
        assert!(results.iter().all(Result::is_ok));

        let spans = installer.spans.lock().unwrap();
        let names: Vec<_> = spans.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        for pair in spans.windows(2) {
            assert!(pair[0].2 <= pair[1].1, "{} overlapped {}", pair[0].0, pair[1].0);
        }
    }

    #[tokio::test]
    async fn test_relative_dir_resolved_and_created() {
        let dir = tempfile::tempdir().unwrap();
        let ns = Namespace::new(dir.path(), "TEST");
        let queue = DownloadCoordinator::spawn(ns.clone(), Arc::new(Timed::default()));

        let unit = queue
            .enqueue(Path::new("Project/demo/demo@1.0.0"), "demo", "1.0.0")
            .unwrap()
            .unwrap()
            .wait()
            .await
            .unwrap();
        let expected = ns.root().join("Project/demo/demo@1.0.0");
        assert_eq!(unit.path, expected);
        assert!(expected.is_dir());
    }

    #[tokio::test]
    async fn test_invalid_name_admits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let installer = Arc::new(Timed::default());
        let queue = DownloadCoordinator::spawn(Namespace::new(dir.path(), "TEST"), installer.clone());

        assert!(queue.enqueue(Path::new("x"), "", "1.0.0").unwrap().is_none());
        assert!(queue.enqueue(Path::new("x"), "Not Valid", "1.0.0").unwrap().is_none());
        assert!(installer.spans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_stall_queue() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DownloadCoordinator::spawn(
            Namespace::new(dir.path(), "TEST"),
            Arc::new(Timed::default()),
        );

        let first = queue.enqueue(Path::new("x"), "broken", "1.0.0").unwrap().unwrap();
        let second = queue.enqueue(Path::new("x"), "fine", "1.0.0").unwrap().unwrap();
        assert!(matches!(
            first.wait().await,
            Err(InstallError::ToolFailed { code: Some(1), .. })
        ));
        assert_eq!(second.wait().await.unwrap().name, "fine");
    }
}

//! Remote frame acquisition and the sync pass that drives it.

use std::time::Duration;

use async_trait::async_trait;
use methu_store::LocalStore;
use methu_types::{
    config::RemoteConfig, naming::FrameIdentifier, report::SyncReport, FetchError,
};
use tokio::time::sleep;
use tracing::{info, warn};

mod http;

pub use http::HttpFrameSource;

/// Where missing frames come from.
#[async_trait]
pub trait FrameSource: Send + Sync {
    fn url_for(&self, id: &FrameIdentifier) -> String;

    /// Retrieve one frame into `store`, returning the number of bytes
    /// written. Nothing is left at the frame's path on failure.
    async fn fetch(&self, id: &FrameIdentifier, store: &LocalStore) -> Result<u64, FetchError>;
}

/// How often a transient failure is retried within one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &RemoteConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: config.retry_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Reconciles the expected frame set against the local store.
pub struct SyncEngine<S>
where
    S: FrameSource,
{
    source: S,
    store: LocalStore,
    retry: RetryPolicy,
}

impl<S> SyncEngine<S>
where
    S: FrameSource,
{
    pub fn new(source: S, store: LocalStore, retry: RetryPolicy) -> Self {
        Self {
            source,
            store,
            retry,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch every candidate that has no usable local copy, one at a time
    /// and in candidate order. Individual failures are logged and skipped.
    pub async fn sync(&self, candidates: &[FrameIdentifier]) -> SyncReport {
        let missing = self.store.missing(candidates);
        let mut report = SyncReport {
            expected: candidates.len(),
            missing: missing.len(),
            ..SyncReport::default()
        };

        for id in &missing {
            match self.fetch_with_retry(id).await {
                Ok(bytes) => {
                    info!("Downloaded {} ({} bytes)", id, bytes);
                    report.downloaded += 1;
                }
                Err(err) => {
                    warn!("Failed to download {}: {}", id, err);
                    report.failed.push(id.to_string());
                }
            }
        }
        report
    }

    async fn fetch_with_retry(&self, id: &FrameIdentifier) -> Result<u64, FetchError> {
        let mut attempt = 0;
        loop {
            match self.source.fetch(id, &self.store).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(
                        "Retrying {} after transient failure ({}/{}): {}",
                        id, attempt, self.retry.max_retries, err
                    );
                    sleep(self.retry.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        sync::{Arc, Mutex},
    };

    use chrono::NaiveDate;
    use methu_types::naming::{AnchorTime, FrameNaming, SlotConfig};

    use super::*;

    /// Source that records requests and fails for configured names.
    #[derive(Clone, Default)]
    struct ScriptedSource {
        requests: Arc<Mutex<Vec<String>>>,
        failing: Vec<String>,
        transient_failures: Arc<Mutex<u32>>,
    }

    impl ScriptedSource {
        fn requested(&self) -> Vec<String> {
            self.requests.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        fn url_for(&self, id: &FrameIdentifier) -> String {
            format!("mock://{id}")
        }

        async fn fetch(&self, id: &FrameIdentifier, store: &LocalStore) -> Result<u64, FetchError> {
            self.requests.lock().expect("lock").push(id.to_string());
            {
                let mut pending = self.transient_failures.lock().expect("lock");
                if *pending > 0 {
                    *pending -= 1;
                    return Err(FetchError::Timeout {
                        url: self.url_for(id),
                    });
                }
            }
            if self.failing.iter().any(|name| name == id.as_str()) {
                return Err(FetchError::Status {
                    url: self.url_for(id),
                    status: 404,
                });
            }
            fs::write(store.path_for(id), b"frame").map_err(|source| FetchError::Io {
                path: store.path_for(id),
                source,
            })?;
            Ok(5)
        }
    }

    fn twice_daily() -> Vec<FrameIdentifier> {
        FrameNaming::new("dewa", "Szeged", "png", SlotConfig::twice_daily())
            .expect("naming")
            .identifiers(AnchorTime::new(
                NaiveDate::from_ymd_opt(2024, 5, 1).expect("date"),
            ))
    }

    #[tokio::test]
    async fn second_pass_over_full_store_makes_no_requests() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = ScriptedSource::default();
        let engine = SyncEngine::new(source.clone(), LocalStore::new(dir.path()), RetryPolicy::none());
        let ids = twice_daily();

        let first = engine.sync(&ids).await;
        assert_eq!(first.downloaded, 4);
        assert_eq!(source.requested().len(), 4);

        let second = engine.sync(&ids).await;
        assert_eq!(second.downloaded, 0);
        assert_eq!(second.missing, 0);
        assert_eq!(source.requested().len(), 4);
    }

    #[tokio::test]
    async fn empty_file_is_refetched_and_full_file_is_kept() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LocalStore::new(dir.path());
        let ids = twice_daily();
        fs::write(store.path_for(&ids[2]), b"stale but non-empty").expect("write");
        fs::write(store.path_for(&ids[3]), b"").expect("write");

        let source = ScriptedSource::default();
        let engine = SyncEngine::new(source.clone(), store.clone(), RetryPolicy::none());
        let report = engine.sync(&ids).await;

        assert_eq!(report.downloaded, 3);
        assert_eq!(
            source.requested(),
            vec![
                "dewa20240501_0000+Szeged.png",
                "dewa20240501_1200+Szeged.png",
                "dewa20240430_1200+Szeged.png",
            ]
        );
        assert_eq!(
            fs::read(store.path_for(&ids[2])).expect("read"),
            b"stale but non-empty"
        );
    }

    #[tokio::test]
    async fn individual_failures_do_not_stop_the_pass() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ids = twice_daily();
        let source = ScriptedSource {
            failing: vec![ids[1].to_string()],
            ..ScriptedSource::default()
        };
        let engine = SyncEngine::new(source.clone(), LocalStore::new(dir.path()), RetryPolicy::none());

        let report = engine.sync(&ids).await;
        assert_eq!(report.downloaded, 3);
        assert_eq!(report.failed, vec![ids[1].to_string()]);
        assert_eq!(source.requested().len(), 4);
        assert!(!engine.store().is_present(&ids[1]));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_up_to_the_limit() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ids = twice_daily();
        let source = ScriptedSource {
            transient_failures: Arc::new(Mutex::new(2)),
            ..ScriptedSource::default()
        };
        let policy = RetryPolicy {
            max_retries: 2,
            delay: Duration::from_millis(1),
        };
        let engine = SyncEngine::new(source.clone(), LocalStore::new(dir.path()), policy);

        let report = engine.sync(&ids[..1]).await;
        assert_eq!(report.downloaded, 1);
        assert_eq!(source.requested().len(), 3);
    }

    #[tokio::test]
    async fn without_retries_a_transient_failure_is_final() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ids = twice_daily();
        let source = ScriptedSource {
            transient_failures: Arc::new(Mutex::new(1)),
            ..ScriptedSource::default()
        };
        let engine = SyncEngine::new(source.clone(), LocalStore::new(dir.path()), RetryPolicy::none());

        let report = engine.sync(&ids[..1]).await;
        assert_eq!(report.downloaded, 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(source.requested().len(), 1);
    }
}

//! Pipeline wiring naming, sync, and assembly, plus the periodic scheduler.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use methu_fetch::{FrameSource, HttpFrameSource, RetryPolicy, SyncEngine};
use methu_gif::{select_frames, GifAssembler};
use methu_store::LocalStore;
use methu_types::{
    config::{FrameSelection, MethuConfig},
    naming::{AnchorTime, FrameNaming},
    report::{AssemblyReport, SyncReport},
    MethuError, Result,
};
use tokio::task;
use tracing::info;

mod scheduler;

pub use scheduler::{Scheduler, TickOutcome};

/// The two stages a scheduler cycle drives.
#[async_trait]
pub trait TimelapsePipeline: Send + Sync {
    async fn download_images(&self, anchor: AnchorTime) -> SyncReport;
    async fn create_gif(&self, anchor: AnchorTime) -> Result<AssemblyReport>;
}

/// Concrete pipeline over a local store and a remote frame source.
pub struct Pipeline<S>
where
    S: FrameSource,
{
    naming: FrameNaming,
    engine: SyncEngine<S>,
    assembler: GifAssembler,
    selection: FrameSelection,
    artifact: PathBuf,
}

impl Pipeline<HttpFrameSource> {
    pub fn from_config(config: &MethuConfig) -> Result<Self> {
        let source = HttpFrameSource::new(&config.remote)?;
        Self::with_source(source, config)
    }
}

impl<S> Pipeline<S>
where
    S: FrameSource,
{
    pub fn with_source(source: S, config: &MethuConfig) -> Result<Self> {
        let frame_delay = u16::try_from(config.assembly.frame_delay).map_err(|_| {
            MethuError::Configuration(format!(
                "assembly.frame_delay {} does not fit a gif frame delay",
                config.assembly.frame_delay
            ))
        })?;

        Ok(Self {
            naming: config.naming.build()?,
            engine: SyncEngine::new(
                source,
                LocalStore::new(&config.store.images_dir),
                RetryPolicy::from_config(&config.remote),
            ),
            assembler: GifAssembler::new(frame_delay),
            selection: config.assembly.selection,
            artifact: config.store.artifact_path(),
        })
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact
    }

    pub fn images_dir(&self) -> &Path {
        self.engine.store().root()
    }

    pub fn naming(&self) -> &FrameNaming {
        &self.naming
    }
}

#[async_trait]
impl<S> TimelapsePipeline for Pipeline<S>
where
    S: FrameSource,
{
    async fn download_images(&self, anchor: AnchorTime) -> SyncReport {
        let candidates = self.naming.identifiers(anchor);
        let report = self.engine.sync(&candidates).await;
        info!(
            "Sync for {}: {} expected, {} missing, {} downloaded, {} failed",
            anchor.date,
            report.expected,
            report.missing,
            report.downloaded,
            report.failed.len()
        );
        report
    }

    async fn create_gif(&self, anchor: AnchorTime) -> Result<AssemblyReport> {
        let expected = self.naming.identifiers(anchor);
        let images_dir = self.images_dir().to_path_buf();
        let output = self.artifact.clone();
        let assembler = self.assembler;
        let selection = self.selection;

        task::spawn_blocking(move || {
            let frames = select_frames(&images_dir, selection, &expected)?;
            assembler.assemble(&images_dir, &frames, &output)
        })
        .await
        .map_err(|err| MethuError::Other(anyhow::Error::new(err)))?
        .map_err(MethuError::from)
    }
}

/// Assemble every stored frame of `images_dir` into `output`.
pub async fn create_gif(
    frame_delay: u16,
    images_dir: PathBuf,
    output: PathBuf,
) -> Result<AssemblyReport> {
    task::spawn_blocking(move || GifAssembler::new(frame_delay).create_gif(&images_dir, &output))
        .await
        .map_err(|err| MethuError::Other(anyhow::Error::new(err)))?
        .map_err(MethuError::from)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;
    use methu_types::{naming::FrameIdentifier, FetchError};

    use super::*;

    struct OfflineSource;

    #[async_trait]
    impl FrameSource for OfflineSource {
        fn url_for(&self, id: &FrameIdentifier) -> String {
            format!("offline://{id}")
        }

        async fn fetch(
            &self,
            id: &FrameIdentifier,
            _store: &LocalStore,
        ) -> std::result::Result<u64, FetchError> {
            Err(FetchError::Transport {
                url: self.url_for(id),
                message: "offline".into(),
            })
        }
    }

    fn config_in(root: &Path) -> MethuConfig {
        let mut config = MethuConfig::default();
        config.store.images_dir = root.join("images");
        config.store.gifs_dir = root.join("gifs");
        config
    }

    #[tokio::test]
    async fn offline_sync_reports_every_frame_as_failed() {
        let root = tempfile::tempdir().expect("temp dir");
        let config = config_in(root.path());
        fs::create_dir_all(&config.store.images_dir).expect("mkdir");
        let pipeline = Pipeline::with_source(OfflineSource, &config).expect("pipeline");

        let anchor = AnchorTime::new(NaiveDate::from_ymd_opt(2024, 5, 1).expect("date"));
        let report = pipeline.download_images(anchor).await;
        assert_eq!(report.expected, 48);
        assert_eq!(report.downloaded, 0);
        assert_eq!(report.failed.len(), 48);
    }

    #[tokio::test]
    async fn create_gif_without_frames_is_an_assembly_error() {
        let root = tempfile::tempdir().expect("temp dir");
        let config = config_in(root.path());
        fs::create_dir_all(&config.store.images_dir).expect("mkdir");
        fs::create_dir_all(&config.store.gifs_dir).expect("mkdir");

        let err = create_gif(50, config.store.images_dir.clone(), config.store.artifact_path())
            .await
            .expect_err("must fail");
        assert!(matches!(err, MethuError::Assembly(_)));
        assert!(!config.store.artifact_path().exists());
    }
}

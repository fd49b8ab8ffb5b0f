use std::{sync::Arc, time::Duration};

use chrono::Utc;
use methu_types::{
    naming::AnchorTime,
    report::{AssemblyOutcome, CycleReport},
};
use tokio::{
    sync::{watch, Mutex},
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{error, info, warn};

use crate::TimelapsePipeline;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Ran(CycleReport),
    /// Another cycle was still running; this tick was dropped.
    Skipped,
}

/// Fires the sync pass on a fixed interval and rebuilds the timelapse only
/// when that pass acquired something new. Cycles never overlap.
pub struct Scheduler<P>
where
    P: TimelapsePipeline,
{
    pipeline: Arc<P>,
    interval: Duration,
    running: Mutex<()>,
    reports: watch::Sender<Option<CycleReport>>,
}

impl<P> Scheduler<P>
where
    P: TimelapsePipeline,
{
    pub fn new(pipeline: Arc<P>, interval: Duration) -> Self {
        let (reports, _) = watch::channel(None);
        Self {
            pipeline,
            interval,
            running: Mutex::new(()),
            reports,
        }
    }

    pub fn pipeline(&self) -> &Arc<P> {
        &self.pipeline
    }

    /// Receiver for the most recent cycle report.
    pub fn subscribe(&self) -> watch::Receiver<Option<CycleReport>> {
        self.reports.subscribe()
    }

    /// Run one cycle for the current time unless one is already running.
    pub async fn tick(&self) -> TickOutcome {
        self.tick_at(AnchorTime::now()).await
    }

    pub async fn tick_at(&self, anchor: AnchorTime) -> TickOutcome {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Previous cycle still running, skipping tick");
            return TickOutcome::Skipped;
        };
        let report = self.run_cycle(anchor).await;
        self.reports.send_replace(Some(report.clone()));
        TickOutcome::Ran(report)
    }

    async fn run_cycle(&self, anchor: AnchorTime) -> CycleReport {
        let started_at = Utc::now();
        info!("Downloading images, periodic");
        let sync = self.pipeline.download_images(anchor).await;

        let assembly = if sync.downloaded > 0 {
            info!("Creating gif because {} image(s) were downloaded", sync.downloaded);
            match self.pipeline.create_gif(anchor).await {
                Ok(report) => AssemblyOutcome::Built(report),
                Err(err) => {
                    error!("Failed to create gif: {}", err);
                    AssemblyOutcome::Failed {
                        reason: err.to_string(),
                    }
                }
            }
        } else {
            AssemblyOutcome::Debounced
        };

        CycleReport {
            started_at,
            finished_at: Utc::now(),
            anchor_date: anchor.date,
            sync,
            assembly,
        }
    }

    /// Tick forever. The first cycle runs one interval after start; ticks
    /// missed while a cycle was running are dropped rather than bunched.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}

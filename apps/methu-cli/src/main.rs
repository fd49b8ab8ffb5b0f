use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use methu_network::{serve, GalleryState};
use methu_ops::{ensure_structure, init_tracing};
use methu_orchestrator::{Pipeline, Scheduler, TimelapsePipeline};
use methu_types::naming::AnchorTime;
use tracing::{error, info};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config();
    config.validate()?;
    init_tracing(&config.ops)?;

    info!(" --------- Started");
    if cli.check {
        info!("Checking directory structure");
        if !ensure_structure(&config.store.images_dir, &config.store.gifs_dir) {
            bail!("Failed to create directory structure");
        }
    }

    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let scheduler = Arc::new(Scheduler::new(
        pipeline.clone(),
        config.scheduler.interval(),
    ));

    if cli.download {
        info!("Downloading images");
        let report = pipeline.download_images(AnchorTime::now()).await;
        info!("Downloaded {} new image(s)", report.downloaded);
    }
    if cli.gif {
        info!("Creating gif");
        if let Err(err) = pipeline.create_gif(AnchorTime::now()).await {
            error!("{}", err);
        }
    }
    if cli.periodic_download {
        info!(
            "Checking for new images every {}s",
            config.scheduler.interval_secs
        );
        tokio::spawn(scheduler.clone().run());
    }

    if cli.serve {
        info!(" --------- Starting webserver");
        let state = GalleryState::new(
            pipeline.images_dir(),
            pipeline.artifact_path(),
            scheduler.subscribe(),
        );
        serve(&config.server, state).await?;
    } else if cli.periodic_download {
        tokio::signal::ctrl_c().await?;
    }

    info!(" --------- Finished");
    Ok(())
}

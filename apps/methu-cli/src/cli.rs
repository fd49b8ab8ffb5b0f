use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use methu_types::config::{FrameSelection, MethuConfig};

const DEFAULT_CONFIG_PATH: &str = "methu.toml";

/// Downloads met.hu forecast snapshots and serves them as a GIF timelapse.
#[derive(Debug, Parser)]
#[command(name = "methu", version, about)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "METHU_CONFIG")]
    pub config: Option<PathBuf>,

    /// Check (and create) the directory structure.
    #[arg(long, default_value_t = true, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    pub check: bool,

    /// Download missing images once.
    #[arg(long, default_value_t = false, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    pub download: bool,

    /// Generate the gif once.
    #[arg(long, default_value_t = false, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    pub gif: bool,

    /// Start the web server.
    #[arg(long, default_value_t = true, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    pub serve: bool,

    /// Check for new images periodically.
    #[arg(long, default_value_t = true, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    pub periodic_download: bool,

    /// Directory for downloaded images.
    #[arg(long)]
    pub images_dir: Option<PathBuf>,

    /// Directory for generated gifs.
    #[arg(long)]
    pub gif_dir: Option<PathBuf>,

    /// Delay between frames in hundredths of a second.
    #[arg(long)]
    pub frame_time: Option<u32>,

    /// Name of the produced gif file.
    #[arg(long)]
    pub gif_name: Option<String>,

    /// Local address to bind to.
    #[arg(long)]
    pub address: Option<String>,

    /// Local port to bind to.
    #[arg(long)]
    pub port: Option<u16>,

    /// Frames to animate: `all-files` or `anchor-set`.
    #[arg(long, value_parser = parse_selection)]
    pub selection: Option<FrameSelection>,
}

impl Cli {
    /// Configuration from file (or defaults) with flag overrides applied.
    pub fn resolve_config(&self) -> MethuConfig {
        let mut config = load_config(self.config.as_deref());
        self.apply_overrides(&mut config);
        config
    }

    pub fn apply_overrides(&self, config: &mut MethuConfig) {
        if let Some(dir) = &self.images_dir {
            config.store.images_dir = dir.clone();
        }
        if let Some(dir) = &self.gif_dir {
            config.store.gifs_dir = dir.clone();
        }
        if let Some(delay) = self.frame_time {
            config.assembly.frame_delay = delay;
        }
        if let Some(name) = &self.gif_name {
            config.store.gif_name = name.clone();
        }
        if let Some(address) = &self.address {
            config.server.address = address.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(selection) = self.selection {
            config.assembly.selection = selection;
        }
    }
}

fn load_config(explicit: Option<&Path>) -> MethuConfig {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => PathBuf::from(DEFAULT_CONFIG_PATH),
        None => return MethuConfig::default(),
    };
    match MethuConfig::from_file(&path) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            MethuConfig::default()
        }
    }
}

fn parse_selection(raw: &str) -> Result<FrameSelection, String> {
    match raw {
        "all-files" => Ok(FrameSelection::AllFiles),
        "anchor-set" => Ok(FrameSelection::AnchorSet),
        other => Err(format!(
            "unknown selection '{other}', expected all-files or anchor-set"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_daemon_setup() {
        let cli = Cli::try_parse_from(["methu"]).expect("parse");
        assert!(cli.check);
        assert!(!cli.download);
        assert!(!cli.gif);
        assert!(cli.serve);
        assert!(cli.periodic_download);
    }

    #[test]
    fn bare_and_explicit_boolean_flags() {
        let cli = Cli::try_parse_from(["methu", "--download", "--gif", "--serve=false"])
            .expect("parse");
        assert!(cli.download);
        assert!(cli.gif);
        assert!(!cli.serve);
    }

    #[test]
    fn overrides_replace_file_values() {
        let cli = Cli::try_parse_from([
            "methu",
            "--images-dir",
            "/srv/images",
            "--frame-time",
            "25",
            "--gif-name",
            "szeged.gif",
            "--port",
            "9090",
            "--selection",
            "anchor-set",
        ])
        .expect("parse");
        let mut config = MethuConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.store.images_dir, PathBuf::from("/srv/images"));
        assert_eq!(config.assembly.frame_delay, 25);
        assert_eq!(config.store.artifact_path(), PathBuf::from("gifs/szeged.gif"));
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.assembly.selection, FrameSelection::AnchorSet);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_selection_is_rejected() {
        assert!(Cli::try_parse_from(["methu", "--selection", "latest"]).is_err());
    }
}

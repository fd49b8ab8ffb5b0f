use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::naming::{FrameNaming, SlotConfig, DEFAULT_EXTENSION, DEFAULT_LOCATION, DEFAULT_PREFIX};
use crate::{MethuError, Result};

pub const DEFAULT_BASE_URL: &str = "http://met.hu/img/dewa";
pub const DEFAULT_INTERVAL_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub images_dir: PathBuf,
    pub gifs_dir: PathBuf,
    pub gif_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("images"),
            gifs_dir: PathBuf::from("gifs"),
            gif_name: "anim.gif".into(),
        }
    }
}

impl StoreConfig {
    pub fn artifact_path(&self) -> PathBuf {
        self.gifs_dir.join(&self.gif_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: 30,
            max_retries: 0,
            retry_delay_ms: 1_000,
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub prefix: String,
    pub location: String,
    pub extension: String,
    #[serde(flatten)]
    pub slots: SlotConfig,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.into(),
            location: DEFAULT_LOCATION.into(),
            extension: DEFAULT_EXTENSION.into(),
            slots: SlotConfig::default(),
        }
    }
}

impl NamingConfig {
    pub fn build(&self) -> Result<FrameNaming> {
        FrameNaming::new(
            self.prefix.clone(),
            self.location.clone(),
            self.extension.clone(),
            self.slots.clone(),
        )
    }
}

/// Which stored frames go into the timelapse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameSelection {
    /// Every file currently in the images directory.
    #[default]
    AllFiles,
    /// Only the frames expected for the current anchor time.
    AnchorSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Inter-frame delay in hundredths of a second.
    pub frame_delay: u32,
    pub selection: FrameSelection,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            frame_delay: 50,
            selection: FrameSelection::AllFiles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub log_level: String,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethuConfig {
    pub store: StoreConfig,
    pub remote: RemoteConfig,
    pub naming: NamingConfig,
    pub assembly: AssemblyConfig,
    pub scheduler: SchedulerConfig,
    pub server: ServerConfig,
    pub ops: OpsConfig,
}

impl MethuConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            MethuError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            MethuError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.images_dir.as_os_str().is_empty() {
            return Err(MethuError::Configuration(
                "store.images_dir must not be empty".into(),
            ));
        }
        if self.store.gifs_dir.as_os_str().is_empty() {
            return Err(MethuError::Configuration(
                "store.gifs_dir must not be empty".into(),
            ));
        }
        let gif_name = Path::new(&self.store.gif_name);
        if self.store.gif_name.is_empty() || gif_name.file_name() != Some(gif_name.as_os_str()) {
            return Err(MethuError::Configuration(
                "store.gif_name must be a bare file name".into(),
            ));
        }
        if self.remote.base_url.is_empty() {
            return Err(MethuError::Configuration(
                "remote.base_url must not be empty".into(),
            ));
        }
        if self.remote.timeout_secs == 0 {
            return Err(MethuError::Configuration(
                "remote.timeout_secs must be greater than zero".into(),
            ));
        }
        self.naming.slots.validate()?;
        if self.assembly.frame_delay == 0 || self.assembly.frame_delay > u32::from(u16::MAX) {
            return Err(MethuError::Configuration(
                "assembly.frame_delay must be between 1 and 65535 hundredths of a second".into(),
            ));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(MethuError::Configuration(
                "scheduler.interval_secs must be greater than zero".into(),
            ));
        }
        if self.server.port == 0 {
            return Err(MethuError::Configuration(
                "server.port must be a valid port (>0)".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_methu_config_from_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let temp_path = dir.path().join("methu.toml");
        let mut config = MethuConfig::default();
        config.store.images_dir = PathBuf::from("/var/lib/methu/images");
        config.naming.slots = SlotConfig::twice_daily();
        config.assembly.selection = FrameSelection::AnchorSet;
        config.remote.max_retries = 2;

        let doc = toml::to_string(&config).expect("serialize config");
        fs::write(&temp_path, doc).expect("write temp config");

        let loaded = MethuConfig::from_file(&temp_path).expect("load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_falls_back_to_section_defaults() {
        let doc = r#"
            [naming]
            hours = [0, 12]
            include_yesterday = true

            [assembly]
            selection = "anchor-set"
        "#;
        let loaded: MethuConfig = toml::from_str(doc).expect("parse partial config");
        assert_eq!(loaded.naming.slots, SlotConfig::twice_daily());
        assert_eq!(loaded.naming.location, "Szeged");
        assert_eq!(loaded.assembly.selection, FrameSelection::AnchorSet);
        assert_eq!(loaded.assembly.frame_delay, 50);
        assert_eq!(loaded.store.artifact_path(), PathBuf::from("gifs/anim.gif"));
        assert_eq!(loaded.scheduler.interval(), Duration::from_secs(3600));
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = MethuConfig::from_file("/nonexistent/methu.toml").expect_err("must fail");
        assert!(matches!(err, MethuError::Configuration(_)));
    }

    #[test]
    fn validate_configuration_rules() {
        let mut config = MethuConfig::default();
        assert!(config.validate().is_ok());

        config.assembly.frame_delay = 0;
        assert!(config.validate().is_err());
        config.assembly.frame_delay = 70_000;
        assert!(config.validate().is_err());
        config.assembly.frame_delay = 50;

        config.naming.slots.hours = vec![0, 25];
        assert!(config.validate().is_err());
        config.naming.slots.hours = vec![0, 12];

        config.store.gif_name = "nested/anim.gif".into();
        assert!(config.validate().is_err());
        config.store.gif_name = "anim.gif".into();

        config.remote.timeout_secs = 0;
        assert!(config.validate().is_err());
        config.remote.timeout_secs = 10;

        config.scheduler.interval_secs = 0;
        assert!(config.validate().is_err());
        config.scheduler.interval_secs = 3600;

        config.server.port = 0;
        assert!(config.validate().is_err());
        config.server.port = 8080;
        assert!(config.validate().is_ok());
    }
}

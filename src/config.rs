//! Configuration for the default stamp coordinate
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (stamp.toml)
//! - Environment variables (STAMP__*)
//!
//! ## Example config file (stamp.toml):
//! ```toml
//! [coordinate]
//! path = "development"
//! precedence = "path_first"
//! statuses = ["active"]
//! modules = []
//! time = "latest"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::coordinate::{Coordinate, Precedence};
use crate::error::{Result, StampError};
use crate::metadata;
use crate::stamp::{ComponentId, Status, StampTime};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StampConfig {
    /// Process-wide default coordinate
    #[serde(default)]
    pub coordinate: CoordinateConfig,
}

/// A path given either by preset name or by component id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSetting {
    Id(i32),
    Named(String),
}

/// `latest`, or epoch milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSetting {
    Millis(i64),
    Named(String),
}

/// Default coordinate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateConfig {
    #[serde(default = "default_path")]
    pub path: PathSetting,

    /// Additional paths to view from
    #[serde(default)]
    pub also_paths: Vec<PathSetting>,

    #[serde(default)]
    pub precedence: Precedence,

    #[serde(default = "default_statuses")]
    pub statuses: Vec<Status>,

    /// Empty means every module
    #[serde(default)]
    pub modules: Vec<i32>,

    /// Unset means every author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<i32>>,

    #[serde(default = "default_time")]
    pub time: TimeSetting,
}

// Default value functions
fn default_path() -> PathSetting {
    PathSetting::Named("development".to_string())
}

fn default_statuses() -> Vec<Status> {
    vec![Status::Active]
}

fn default_time() -> TimeSetting {
    TimeSetting::Named("latest".to_string())
}

impl Default for CoordinateConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            also_paths: Vec::new(),
            precedence: Precedence::default(),
            statuses: default_statuses(),
            modules: Vec::new(),
            authors: None,
            time: default_time(),
        }
    }
}

impl PathSetting {
    pub fn resolve(&self) -> Result<ComponentId> {
        match self {
            PathSetting::Id(id) => Ok(ComponentId(*id)),
            PathSetting::Named(name) => metadata::path_by_name(name)
                .ok_or_else(|| invalid(format!("unknown path '{}'", name))),
        }
    }
}

impl TimeSetting {
    pub fn resolve(&self) -> Result<StampTime> {
        match self {
            TimeSetting::Millis(millis) => Ok(StampTime(*millis)),
            TimeSetting::Named(name) if name.eq_ignore_ascii_case("latest") => Ok(StampTime::LATEST),
            TimeSetting::Named(name) => name
                .parse::<chrono::DateTime<chrono::Utc>>()
                .map(StampTime::from)
                .map_err(|e| invalid(format!("invalid time '{}': {}", name, e))),
        }
    }
}

fn invalid(message: String) -> StampError {
    StampError::Config(config_crate::ConfigError::Message(message))
}

impl CoordinateConfig {
    /// Build the coordinate these settings describe
    pub fn to_coordinate(&self) -> Result<Coordinate> {
        let mut coordinate = Coordinate::new(self.path.resolve()?, self.time.resolve()?)
            .with_precedence(self.precedence)
            .with_statuses(self.statuses.iter().copied())
            .with_modules(self.modules.iter().copied().map(ComponentId));
        for path in &self.also_paths {
            coordinate = coordinate.also_path(path.resolve()?);
        }
        if let Some(authors) = &self.authors {
            coordinate = coordinate.with_authors(authors.iter().copied().map(ComponentId));
        }
        Ok(coordinate)
    }
}

impl StampConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, optionally adding a required file
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["stamp.toml", ".stamp.toml", "config/stamp.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("org", "terminology", "stamp") {
            let xdg_config = config_dir.config_dir().join("stamp.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (STAMP__COORDINATE__PATH, ...)
        builder = builder.add_source(
            Environment::with_prefix("STAMP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// The process fallback coordinate
    pub fn default_coordinate(&self) -> Result<Coordinate> {
        self.coordinate.to_coordinate()
    }

    /// Build the default coordinate and install it process-wide. Returns
    /// `false` when a fallback was already installed.
    pub fn install_default(&self) -> Result<bool> {
        Ok(crate::coordinate::set_process_default(self.default_coordinate()?))
    }
}

use std::path::{Path, PathBuf};

use cached::proc_macro::cached;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

use crate::{compress::DEFAULT_EXTENSIONS, version::VersionPolicy};

pub const PROJECT_CONFIG_FILE: &str = "fwbuild.toml";

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Unable to read config {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("Failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Load the configuration for `project_dir`.
///
/// An explicit `config_path` must exist and parse. Otherwise the project file
/// and then the user config dir are tried, falling back on defaults.
#[cached(result = true)]
pub fn load_config(
    project_dir: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<Config, ConfigError> {
    if let Some(path) = config_path {
        let data = std::fs::read_to_string(&path).map_err(|error| ConfigError::Read {
            path: path.clone(),
            message: error.to_string(),
        })?;
        let parsed = parse(&path, &data)?;
        return Ok(Config::resolve(parsed, &project_dir));
    }

    let candidates = [
        Some(project_dir.join(PROJECT_CONFIG_FILE)),
        dirs::config_local_dir().map(|dir| dir.join("fwbuild/config.toml")),
    ];

    for path in candidates.into_iter().flatten() {
        let Ok(data) = std::fs::read_to_string(&path) else {
            continue;
        };
        println!("🔧 Loading config from {}", path.to_string_lossy());
        match parse(&path, &data) {
            Ok(parsed) => return Ok(Config::resolve(parsed, &project_dir)),
            Err(error) => {
                eprintln!("💥 {error}");
                break;
            }
        }
    }

    eprintln!("⚠️ Unable to find a usable config file, falling back on default config");
    Ok(Config::resolve(ConfigParsed::default(), &project_dir))
}

fn parse(path: &Path, data: &str) -> Result<ConfigParsed, ConfigError> {
    toml::from_str::<ConfigParsed>(data).map_err(|error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: error.to_string(),
    })
}

#[derive(Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigParsed {
    data_dir: Option<PathBuf>,
    extensions: Option<Vec<String>>,
    header_path: Option<PathBuf>,
    define_name: Option<String>,
    policy: Option<VersionPolicy>,
    log_level: Option<ConfigLogLevel>,
    log_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Getters, Serialize)]
pub struct Config {
    project_dir: PathBuf,
    data_dir: PathBuf,
    extensions: Vec<String>,
    header_path: PathBuf,
    define_name: String,
    policy: VersionPolicy,
    log_level: ConfigLogLevel,
    log_path: Option<PathBuf>,
}

impl Config {
    fn resolve(parsed: ConfigParsed, project_dir: &Path) -> Self {
        let in_project = |path: PathBuf| project_dir.join(path);

        Self {
            project_dir: project_dir.to_path_buf(),
            data_dir: in_project(parsed.data_dir.unwrap_or("data".into())),
            extensions: parsed
                .extensions
                .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()),
            header_path: in_project(
                parsed
                    .header_path
                    .unwrap_or("src/assets/firmware_version.h".into()),
            ),
            define_name: parsed.define_name.unwrap_or("FW_VERSION".into()),
            policy: parsed.policy.unwrap_or_default(),
            log_level: parsed.log_level.unwrap_or_default(),
            log_path: parsed.log_path.map(in_project),
        }
    }

    pub fn with_data_dir(mut self, data_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = self.project_dir.join(dir);
        }
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        if !extensions.is_empty() {
            self.extensions = extensions;
        }
        self
    }

    pub fn with_header_path(mut self, header_path: Option<PathBuf>) -> Self {
        if let Some(path) = header_path {
            self.header_path = self.project_dir.join(path);
        }
        self
    }

    pub fn with_define_name(mut self, define_name: Option<String>) -> Self {
        if let Some(name) = define_name {
            self.define_name = name;
        }
        self
    }

    pub fn with_policy(mut self, policy: Option<VersionPolicy>) -> Self {
        if let Some(policy) = policy {
            self.policy = policy;
        }
        self
    }

    pub fn with_log_level(mut self, log_level: Option<ConfigLogLevel>) -> Self {
        if let Some(level) = log_level {
            self.log_level = level;
        }
        self
    }
}

#[repr(usize)]
#[derive(
    Default, Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ConfigLogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<Level> for ConfigLogLevel {
    fn from(value: Level) -> Self {
        match value {
            Level::ERROR => ConfigLogLevel::Error,
            Level::WARN => ConfigLogLevel::Warn,
            Level::INFO => ConfigLogLevel::Info,
            Level::DEBUG => ConfigLogLevel::Debug,
            Level::TRACE => ConfigLogLevel::Trace,
        }
    }
}

impl From<ConfigLogLevel> for Level {
    fn from(value: ConfigLogLevel) -> Self {
        match value {
            ConfigLogLevel::Error => Level::ERROR,
            ConfigLogLevel::Warn => Level::WARN,
            ConfigLogLevel::Info => Level::INFO,
            ConfigLogLevel::Debug => Level::DEBUG,
            ConfigLogLevel::Trace => Level::TRACE,
        }
    }
}

use std::collections::BTreeMap;
use std::{env, fmt, fs, io, path};

use hostcheck::EngineSettings;
use logger::LogConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timeperiods::TimeperiodSchedule;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("invalid configuration: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("cannot serialize configuration: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no configuration directory available")]
    ConfigPathUnavailable,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineSettings,
    pub logging: LogConfig,
    pub timeperiods: BTreeMap<String, TimeperiodSchedule>,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/hostcheck/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("hostcheck/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_title_2 = write_title_indented(2);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        let engine = &self.engine;
        let exit_spec = &engine.exit_spec;

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Engine")?;
        write_1(f, "Debug", &engine.debug)?;
        write_1(f, "Workers", &engine.workers())?;
        write_1(f, "Run Timeout (s)", &engine.run_timeout_secs)?;
        write_1(f, "Perfdata With Times", &engine.perfdata_with_times)?;
        write_1(f, "State Directory", &engine.state_dir.display())?;
        write_title_2(f, "Exit States")?;
        write_2(f, "Empty Output", &exit_spec.empty_output)?;
        write_2(f, "Missing Sections", &exit_spec.missing_sections)?;
        for (pattern, state) in &exit_spec.specific_missing_sections {
            write_2(f, &format!("Missing '{pattern}'"), state)?;
        }
        write_2(f, "Fetch Failure", &exit_spec.fetch_failure)?;
        write_2(f, "Parse Errors", &exit_spec.parse_errors)?;

        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &format!("{:?}", self.logging.format))?;

        write_title_1(f, "Timeperiods")?;
        for (name, schedule) in &self.timeperiods {
            write_1(f, name, schedule)?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/hostcheck/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        let write_failed = |source| Error::WriteFailed { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }
}

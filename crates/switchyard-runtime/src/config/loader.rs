//! Layered configuration through figment.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. Profile file next to the main file (`switchyard.{profile}.toml`)
//! 3. Main file (`switchyard.toml` or `config.toml`; YAML with `yaml-config`)
//! 4. `SWITCHYARD_*` environment variables, `__` separating sections
//! 5. Values passed to [`ConfigLoader::merge`]
//!
//! `SWITCHYARD_DATABASE__URL=sqlite::memory:` sets `database.url`.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("prod")
//!     .file("/etc/switchyard/switchyard.toml")
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::SwitchyardConfig;

const ENV_PREFIX: &str = "SWITCHYARD_";
const PROFILE_VAR: &str = "SWITCHYARD_PROFILE";
const APP_DIR: &str = "switchyard";
const FILE_STEMS: &[&str] = &["switchyard", "config"];

/// Name of the configuration profile; `prod` and `dev` are aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile(String);

impl Profile {
    pub fn parse(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        Self(match name.as_str() {
            "prod" => "production".to_string(),
            "dev" | "" => "development".to_string(),
            _ => name,
        })
    }

    /// Reads `SWITCHYARD_PROFILE`, defaulting to `development`.
    pub fn from_env() -> Self {
        Self::parse(&std::env::var(PROFILE_VAR).unwrap_or_default())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::parse("dev")
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File formats compiled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl FileFormat {
    const ENABLED: &'static [(FileFormat, &'static [&'static str])] = &[
        #[cfg(feature = "toml-config")]
        (FileFormat::Toml, &["toml"]),
        #[cfg(feature = "yaml-config")]
        (FileFormat::Yaml, &["yaml", "yml"]),
    ];

    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        Self::ENABLED
            .iter()
            .find(|(_, exts)| exts.contains(&ext.as_str()))
            .map(|(format, _)| *format)
    }

    #[allow(unused_variables, unreachable_code)]
    fn merge(self, figment: Figment, path: &Path) -> Figment {
        #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
        use figment::providers::Format;

        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(figment::providers::Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(figment::providers::Yaml::file(path)),
        }
    }
}

/// Finds and layers the configuration sources.
pub struct ConfigLoader {
    profile: Profile,
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
    overrides: Option<SwitchyardConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
            overrides: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to look for configuration files in. Without any,
    /// the current directory and the user config directory are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Uses exactly this file instead of searching. A missing file is an
    /// error.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Values that override every other source.
    pub fn merge(mut self, config: SwitchyardConfig) -> Self {
        self.overrides = Some(config);
        self
    }

    pub fn load(self) -> ConfigResult<SwitchyardConfig> {
        let config: SwitchyardConfig = self.figment()?.extract()?;
        debug!(
            profile = %self.profile,
            database = %config.database.url,
            log_level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(SwitchyardConfig::default()));

        let main = match &self.config_file {
            Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path.clone())),
            Some(path) => Some(path.clone()),
            None => self.discover(),
        };
        match main {
            Some(path) => {
                let format = FileFormat::of(&path).ok_or_else(|| {
                    ConfigError::ParseError(format!(
                        "Unsupported or disabled configuration file format: {}",
                        path.display()
                    ))
                })?;
                if let Some(profile_path) = self.profile_file(&path) {
                    debug!(path = %profile_path.display(), "Loading profile configuration");
                    figment = format.merge(figment, &profile_path);
                }
                info!(path = %path.display(), "Loading configuration file");
                figment = format.merge(figment, &path);
            }
            None => warn!("No configuration file found, using defaults"),
        }

        if self.load_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }
        if let Some(overrides) = &self.overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }
        Ok(figment)
    }

    /// The first `{stem}.{ext}` that exists, by search path, then stem,
    /// then format.
    fn discover(&self) -> Option<PathBuf> {
        let mut roots = self.search_paths.clone();
        if roots.is_empty() {
            roots.extend(std::env::current_dir().ok());
            roots.extend(dirs::config_dir().map(|d| d.join(APP_DIR)));
        }
        roots
            .iter()
            .flat_map(|dir| {
                FILE_STEMS.iter().flat_map(move |stem| {
                    FileFormat::ENABLED
                        .iter()
                        .flat_map(|(_, exts)| exts.iter())
                        .map(move |ext| dir.join(format!("{stem}.{ext}")))
                })
            })
            .find(|path| path.is_file())
    }

    /// `switchyard.toml` → `switchyard.{profile}.toml`, if it exists.
    fn profile_file(&self, main: &Path) -> Option<PathBuf> {
        let stem = main.file_stem()?.to_str()?;
        let ext = main.extension()?.to_str()?;
        let path = main.with_file_name(format!("{stem}.{}.{ext}", self.profile));
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogLevel;
    use figment::Jail;

    #[test]
    fn defaults_without_any_source() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config, SwitchyardConfig::default());
            assert_eq!(config.database.max_connections, 4);
            assert!(!config.relay.allow_reversed_stacks);
            Ok(())
        });
    }

    #[test]
    fn file_profile_and_env_are_layered() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "switchyard.toml",
                r#"
                [bot]
                name = "Nadybot"

                [logging]
                level = "warn"
                "#,
            )?;
            jail.create_file(
                "switchyard.production.toml",
                r#"
                [bot]
                name = "Prodbot"
                dimension = 6
                "#,
            )?;
            jail.set_env("SWITCHYARD_LOGGING__LEVEL", "debug");
            jail.set_env("SWITCHYARD_RELAY__ALLOW_REVERSED_STACKS", "true");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .profile("prod")
                .load()
                .unwrap();
            // The main file wins over the profile file.
            assert_eq!(config.bot.name, "Nadybot");
            assert_eq!(config.bot.dimension, 6);
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert!(config.relay.allow_reversed_stacks);
            Ok(())
        });
    }

    #[test]
    fn config_toml_is_found_too() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[database]\nmax_connections = 9\n")?;
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.database.max_connections, 9);
            Ok(())
        });
    }

    #[test]
    fn overrides_win() {
        Jail::expect_with(|jail| {
            jail.set_env("SWITCHYARD_DATABASE__URL", "sqlite://other.db");
            let mut overrides = SwitchyardConfig::default();
            overrides.database.url = "sqlite::memory:".into();
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(overrides)
                .load()
                .unwrap();
            assert_eq!(config.database.url, "sqlite::memory:");
            Ok(())
        });
    }

    #[test]
    fn explicit_file_must_exist() {
        let err = ConfigLoader::new()
            .file("/nonexistent/switchyard.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("switchyard.ini", "")?;
            let err = ConfigLoader::new()
                .file(jail.directory().join("switchyard.ini"))
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::ParseError(_)));
            Ok(())
        });
    }

    #[test]
    fn bad_values_are_parse_errors() {
        Jail::expect_with(|jail| {
            jail.create_file("switchyard.toml", "[logging]\nlevel = \"loud\"\n")?;
            let err = ConfigLoader::new()
                .file(jail.directory().join("switchyard.toml"))
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::ParseError(_)));
            Ok(())
        });
    }

    #[test]
    fn profile_names() {
        assert_eq!(Profile::parse("PROD").as_str(), "production");
        assert_eq!(Profile::parse("dev"), Profile::default());
        assert_eq!(Profile::parse(" Staging ").as_str(), "staging");
    }
}

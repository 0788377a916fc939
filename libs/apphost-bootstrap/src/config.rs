//! Layered application configuration.
//!
//! Precedence (lowest to highest): built-in defaults, YAML file, environment
//! (`APP__` prefix, `__` as the nesting separator), CLI overrides.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;
use crate::paths;

/// Prefix for environment overrides, e.g. `APP__SERVER__BIND_ADDR`.
pub const ENV_PREFIX: &str = "APP__";

const DEFAULT_HOME_SUBDIR: &str = ".apphost";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Process home directory; `~` is expanded and the result must be absolute.
    pub home_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8087)),
            home_dir: format!("~/{DEFAULT_HOME_SUBDIR}"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// Per-module sections, parsed by each module into its own typed config.
    pub modules: BTreeMap<String, serde_json::Value>,
}

/// CLI values that override the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub verbose: u8,
}

impl AppConfig {
    /// Load defaults, then the YAML file (if any), then `APP__*` environment
    /// variables, and normalise `server.home_dir` (creating it).
    ///
    /// # Errors
    /// Fails on unreadable or invalid configuration and on home-dir errors.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Self = figment
            .extract()
            .context("failed to load application configuration")?;
        config.normalize_home_dir()?;
        Ok(config)
    }

    fn normalize_home_dir(&mut self) -> Result<()> {
        let home = paths::resolve_home_dir(Some(&self.server.home_dir), DEFAULT_HOME_SUBDIR, true)
            .with_context(|| format!("invalid server.home_dir '{}'", self.server.home_dir))?;
        self.server.home_dir = home.to_string_lossy().into_owned();
        Ok(())
    }

    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(port) = cli.port {
            self.server.bind_addr.set_port(port);
        }
        match cli.verbose {
            0 => {}
            1 => "info".clone_into(&mut self.logging.level),
            2 => "debug".clone_into(&mut self.logging.level),
            _ => "trace".clone_into(&mut self.logging.level),
        }
    }

    #[must_use]
    pub fn home_dir(&self) -> PathBuf {
        PathBuf::from(&self.server.home_dir)
    }

    /// Parse the named module section into `T`; a missing section yields `T::default()`.
    ///
    /// # Errors
    /// Fails when the section does not deserialize into `T`.
    pub fn module_config<T>(&self, module: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.modules.get(module) {
            Some(value) => serde_json::from_value(value.clone())
                .with_context(|| format!("invalid configuration for module '{module}'")),
            None => Ok(T::default()),
        }
    }

    /// Render the effective configuration as pretty JSON.
    ///
    /// # Errors
    /// Fails only if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to render configuration")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn yaml_and_env_layers_merge() {
        let home = tempfile::tempdir().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  bind_addr: \"0.0.0.0:9000\"\n  home_dir: \"{}\"\nmodules:\n  tenant_host:\n    data_root: apps",
            home.path().display()
        )
        .unwrap();

        temp_env::with_var("APP__LOGGING__LEVEL", Some("debug"), || {
            let cfg = AppConfig::load_or_default(Some(file.path())).unwrap();
            assert_eq!(cfg.server.bind_addr.port(), 9000);
            assert_eq!(cfg.logging.level, "debug");
            assert_eq!(cfg.modules["tenant_host"]["data_root"], "apps");
        });
    }

    #[test]
    fn cli_overrides_win() {
        let mut cfg = AppConfig::default();
        cfg.apply_cli_overrides(&CliOverrides {
            port: Some(7777),
            verbose: 2,
        });
        assert_eq!(cfg.server.bind_addr.port(), 7777);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        answer: u32,
    }

    #[test]
    fn missing_module_section_uses_defaults() {
        let cfg = AppConfig::default();
        let parsed: Sample = cfg.module_config("absent").unwrap();
        assert_eq!(parsed, Sample::default());
    }

    #[test]
    fn module_section_is_parsed() {
        let mut cfg = AppConfig::default();
        cfg.modules
            .insert("sample".to_owned(), serde_json::json!({ "answer": 42 }));
        let parsed: Sample = cfg.module_config("sample").unwrap();
        assert_eq!(parsed.answer, 42);
    }
}

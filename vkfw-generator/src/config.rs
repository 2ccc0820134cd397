use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail};

pub const DEFAULT_SPEC_PATH: &str = "/usr/share/vulkan/registry/vk.xml";

/// Environment variable with the log level (`error` ... `trace`, or `off`).
pub const LOG_LEVEL_VAR: &str = "VKFW_GEN_LOG";

pub const MARKER_PREFIX: &str = "/* VKFW_GEN_";

#[derive(Debug)]
pub struct Config {
    pub spec_path: PathBuf,
    pub api: String,
    /// Files whose marker regions get regenerated, relative to the working
    /// directory.
    pub targets: Vec<PathBuf>,
    pub marker_prefix: String,
    pub log_level: log::LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec_path: PathBuf::from(DEFAULT_SPEC_PATH),
            api: "vulkan".to_string(),
            targets: vec![
                PathBuf::from("core/vk_functions.cc"),
                PathBuf::from("include/VKFW/vk_functions.h"),
            ],
            marker_prefix: MARKER_PREFIX.to_string(),
            log_level: log::LevelFilter::Info,
        }
    }
}

impl Config {
    /// `args` excludes the program name.
    pub fn from_args<I>(args: I, log_level: Option<&str>) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();

        let mut args = args.into_iter();
        if let Some(spec_path) = args.next() {
            config.spec_path = PathBuf::from(spec_path);
        }
        if let Some(extra) = args.next() {
            bail!("unexpected argument {extra:?} (usage: vkfw-generator [path/to/vk.xml])");
        }

        if let Some(level) = log_level {
            config.log_level = log::LevelFilter::from_str(level)
                .map_err(|err| anyhow!("invalid {LOG_LEVEL_VAR} value {level:?}: {err}"))?;
        }

        Ok(config)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let log_level = std::env::var(LOG_LEVEL_VAR).ok();
        Self::from_args(std::env::args().skip(1), log_level.as_deref())
    }
}

#[test]
fn test_config_defaults() {
    let config = Config::from_args(Vec::new(), None).unwrap();
    assert_eq!(config.spec_path, PathBuf::from(DEFAULT_SPEC_PATH));
    assert_eq!(config.api, "vulkan");
    assert_eq!(config.targets.len(), 2);
    assert_eq!(config.log_level, log::LevelFilter::Info);
}

#[test]
fn test_config_from_args() {
    let config = Config::from_args(vec!["registry/vk.xml".to_string()], Some("debug")).unwrap();
    assert_eq!(config.spec_path, PathBuf::from("registry/vk.xml"));
    assert_eq!(config.log_level, log::LevelFilter::Debug);

    assert!(Config::from_args(vec!["a".to_string(), "b".to_string()], None).is_err());
    assert!(Config::from_args(Vec::new(), Some("loud")).is_err());
}

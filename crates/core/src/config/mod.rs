use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::transport::{CongestionControlAlgorithm, CongestionControlConfig, LiaError};

/// Command line / environment overrides.
///
/// Precedence is arguments and environment first, then the TOML file given
/// with `--config`, then built-in defaults.
#[derive(clap::Parser, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Path to a TOML configuration file.
    #[arg(long, env = "LIA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Congestion control algorithm (`lia` or `reno`).
    #[arg(long, env = "LIA_ALGORITHM")]
    pub algorithm: Option<CongestionControlAlgorithm>,

    /// Initial congestion window of new subflows, in packets.
    #[arg(long, env = "LIA_INITIAL_CWND")]
    pub initial_cwnd: Option<u32>,

    /// Initial slow start threshold of new subflows, in packets.
    #[arg(long, env = "LIA_INITIAL_SSTHRESH")]
    pub initial_ssthresh: Option<u32>,

    /// Hard ceiling on every subflow's congestion window, in packets.
    #[arg(long, env = "LIA_CWND_CLAMP")]
    pub cwnd_clamp: Option<u32>,

    #[arg(long, env = "LIA_LOG_LEVEL")]
    pub log_level: Option<LevelFilter>,
}

impl ConfigArgs {
    /// Merges the arguments over the configuration file (if any) and the
    /// defaults, then validates the result.
    pub fn build(self) -> Result<Config, LiaError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        let cc = &mut config.congestion_control;
        if let Some(algorithm) = self.algorithm {
            cc.algorithm = algorithm;
        }
        if let Some(cwnd) = self.initial_cwnd {
            cc.initial_cwnd = cwnd;
        }
        if let Some(ssthresh) = self.initial_ssthresh {
            cc.initial_ssthresh = ssthresh;
        }
        if let Some(clamp) = self.cwnd_clamp {
            cc.cwnd_clamp = clamp;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        config.congestion_control.validate()?;
        tracing::debug!(
            algorithm = %config.congestion_control.algorithm,
            log_level = %config.log_level,
            "Configuration built"
        );
        Ok(config)
    }
}

/// Complete crate configuration.
///
/// ```toml
/// log-level = "debug"
///
/// [congestion-control]
/// algorithm = "lia"
/// cwnd-clamp = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(with = "serde_log_level_filter", default = "default_log_level")]
    pub log_level: LevelFilter,
    #[serde(default)]
    pub congestion_control: CongestionControlConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            congestion_control: CongestionControlConfig::default(),
        }
    }
}

fn default_log_level() -> LevelFilter {
    LevelFilter::INFO
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LiaError> {
        let path = path.as_ref();
        tracing::debug!(path = ?path, "Reading configuration file");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, LiaError> {
        let config: Self =
            toml::from_str(content).map_err(|e| LiaError::Config(e.message().to_string()))?;
        config.congestion_control.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, LiaError> {
        toml::to_string(self).map_err(|e| LiaError::Config(e.to_string()))
    }

    pub fn algorithm(&self) -> CongestionControlAlgorithm {
        self.congestion_control.algorithm
    }
}

mod serde_log_level_filter {
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::level_filters::LevelFilter;

    pub fn serialize<S>(level: &LevelFilter, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level = match level.into_level() {
            None => "off",
            Some(level) => level.as_str(),
        };
        serializer.serialize_str(&level.to_ascii_lowercase())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<LevelFilter, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level = String::deserialize(deserializer)?;
        level
            .trim()
            .parse::<LevelFilter>()
            .map_err(|_| serde::de::Error::custom(format!("unknown log level: {level}")))
    }
}

/// Installs the process-wide `tracing` subscriber. Only the first call has
/// any effect.
///
/// `RUST_LOG` directives take precedence over `level`. Setting
/// `LIA_DISABLE_LOGS` skips installation entirely.
pub fn set_logger(level: Option<LevelFilter>) -> anyhow::Result<()> {
    static LOGGER_SET: AtomicBool = AtomicBool::new(false);
    if LOGGER_SET
        .compare_exchange(
            false,
            true,
            std::sync::atomic::Ordering::Release,
            std::sync::atomic::Ordering::SeqCst,
        )
        .is_err()
    {
        return Ok(());
    }

    #[cfg(feature = "trace")]
    tracer::init_tracer(level)?;
    #[cfg(not(feature = "trace"))]
    let _ = level;

    Ok(())
}

#[cfg(feature = "trace")]
mod tracer {
    use tracing::level_filters::LevelFilter;

    pub fn init_tracer(level: Option<LevelFilter>) -> anyhow::Result<()> {
        if std::env::var("LIA_DISABLE_LOGS").is_ok() {
            return Ok(());
        }

        let default_filter = if cfg!(any(test, debug_assertions)) {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        let filter_layer = tracing_subscriber::EnvFilter::builder()
            .with_default_directive(level.unwrap_or(default_filter).into())
            .from_env_lossy();

        tracing_subscriber::fmt()
            .with_env_filter(filter_layer)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed tracing initialization: {e}"))
    }
}

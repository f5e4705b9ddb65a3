use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};

pub const ENV_LOG_LEVEL: &str = "LCOD_LOG_LEVEL";
pub const ENV_SHUFFLE_SEED: &str = "LCOD_SHUFFLE_SEED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            other => Err(anyhow!("unsupported log level: {other}")),
        }
    }
}

/// Runtime settings shared by every context a registry hands out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelConfig {
    /// Entries below this level are dropped by the log contracts.
    #[serde(default)]
    pub log_level: LogLevel,
    /// Fixed seed for shuffle orderings. `None` seeds from entropy.
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
}

impl KernelConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = KernelConfig::default();
        if let Some(level) = non_empty_var(ENV_LOG_LEVEL) {
            config.log_level = level
                .parse()
                .with_context(|| format!("invalid {ENV_LOG_LEVEL}"))?;
        }
        if let Some(seed) = non_empty_var(ENV_SHUFFLE_SEED) {
            let seed = seed
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{ENV_SHUFFLE_SEED} must be an unsigned integer"))?;
            config.shuffle_seed = Some(seed);
        }
        Ok(config)
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.log_level
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

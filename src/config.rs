use crate::consistency::WarmupSettings;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// When visits pick up a changed user or location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Propagation {
    /// Affected visits are rewritten before the write returns.
    Immediate,
    /// Touched ids are queued and reconciled by the warmup scheduler once
    /// writes have been quiet for the quiescence window.
    #[default]
    Batched,
}

/// What happens when a visit references a missing user or location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum IntegrityPolicy {
    /// Log the violation and abort the process.
    #[default]
    Abort,
    /// Log the violation and reject the offending write.
    Reject,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "travelsdb", version, about = "Users, locations and visits over HTTP with denormalized visit views")]
pub struct AppConfig {
    #[arg(long, env = "TRAVELSDB_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "TRAVELSDB_PORT", default_value_t = 80)]
    pub port: u16,

    /// Directory holding the snapshot files and the optional options.txt
    #[arg(long, env = "TRAVELSDB_DATA_DIR", default_value = "/tmp/data")]
    pub data_dir: PathBuf,

    #[arg(long, env = "TRAVELSDB_PROPAGATION", value_enum, default_value_t = Propagation::Batched)]
    pub propagation: Propagation,

    #[arg(long, env = "TRAVELSDB_INTEGRITY", value_enum, default_value_t = IntegrityPolicy::Abort)]
    pub integrity: IntegrityPolicy,

    /// Write inactivity before the warmup pass runs
    #[arg(long, env = "TRAVELSDB_QUIESCENCE_MS", default_value_t = 3000)]
    pub quiescence_ms: u64,

    /// How often the warmup scheduler checks for quiescence
    #[arg(long, env = "TRAVELSDB_WARMUP_PERIOD_MS", default_value_t = 500)]
    pub warmup_period_ms: u64,
}

impl AppConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn warmup(&self) -> WarmupSettings {
        WarmupSettings {
            period: Duration::from_millis(self.warmup_period_ms),
            quiescence: Duration::from_millis(self.quiescence_ms),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
            data_dir: PathBuf::from("/tmp/data"),
            propagation: Propagation::default(),
            integrity: IntegrityPolicy::default(),
            quiescence_ms: 3000,
            warmup_period_ms: 500,
        }
    }
}

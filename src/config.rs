use std::path::PathBuf;
use std::time::Duration;

pub const ENV_WORKSPACE: &str = "ROLLCALLD_WORKSPACE";
pub const ENV_SWEEP_INTERVAL_MS: &str = "ROLLCALLD_SWEEP_INTERVAL_MS";
pub const ENV_RNG_SEED: &str = "ROLLCALLD_RNG_SEED";

const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;
const MIN_SWEEP_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    pub workspace: Option<PathBuf>,
    pub sweep_interval: Duration,
    /// Fixed seed for code generation and participation draws.
    pub rng_seed: Option<u64>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
            rng_seed: None,
        }
    }
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Unparseable values fall back to defaults with a warning rather than
    /// refusing to start.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(ws) = lookup(ENV_WORKSPACE).filter(|v| !v.trim().is_empty()) {
            cfg.workspace = Some(PathBuf::from(ws.trim()));
        }

        if let Some(raw) = lookup(ENV_SWEEP_INTERVAL_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => {
                    cfg.sweep_interval = Duration::from_millis(ms.max(MIN_SWEEP_INTERVAL_MS));
                }
                Err(e) => {
                    log::warn!("ignoring {ENV_SWEEP_INTERVAL_MS}={raw:?}: {e}");
                }
            }
        }

        if let Some(raw) = lookup(ENV_RNG_SEED) {
            match raw.trim().parse::<u64>() {
                Ok(seed) => cfg.rng_seed = Some(seed),
                Err(e) => log::warn!("ignoring {ENV_RNG_SEED}={raw:?}: {e}"),
            }
        }

        cfg
    }
}

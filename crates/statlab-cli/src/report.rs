use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rand_pcg::Pcg32;
use serde::Serialize;
use statlab_synth::seeded_rng;

use crate::util;

/// JSON envelope written by every subcommand.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Report<T> {
    pub(crate) command: &'static str,
    pub(crate) generated_at: DateTime<Utc>,
    /// Seed of the random source the dataset was generated from.
    pub(crate) seed: u64,
    pub(crate) result: T,
}

/// Per-invocation state shared by the subcommands.
#[derive(Debug)]
pub(crate) struct RunContext {
    seed: u64,
    rng: Pcg32,
    output: Option<PathBuf>,
}

impl RunContext {
    pub(crate) fn new(seed: u64, output: Option<PathBuf>) -> Self {
        Self {
            seed,
            rng: seeded_rng(seed),
            output,
        }
    }

    pub(crate) fn rng(&mut self) -> &mut Pcg32 {
        &mut self.rng
    }

    pub(crate) fn emit<T>(self, command: &'static str, result: T) -> anyhow::Result<()>
    where
        T: Serialize,
    {
        let report = Report {
            command,
            generated_at: Utc::now(),
            seed: self.seed,
            result,
        };
        match &self.output {
            Some(path) => tracing::info!(command, seed = self.seed, path = %path.display(), "writing report"),
            None => tracing::debug!(command, seed = self.seed, "writing report to stdout"),
        }
        util::save_json(&report, self.output.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rand::Rng as _;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = RunContext::new(9, None);
        let mut b = RunContext::new(9, None);
        assert_eq!(a.rng().random::<u64>(), b.rng().random::<u64>());
    }

    #[test]
    fn test_emit_writes_envelope() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.json");
        RunContext::new(42, Some(path.clone()))
            .emit("demo", [1, 2, 3])
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["command"], "demo");
        assert_eq!(value["seed"], 42);
        assert_eq!(value["result"], serde_json::json!([1, 2, 3]));
        assert!(value["generated_at"].is_string());
    }
}

use super::RepairError;
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_CONCURRENCY: usize = 16;

/// Tuning knobs of a repair run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningOptions {
    concurrency: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRunningOptions {
    #[serde(default = "default_concurrency")]
    concurrency: usize,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl RunningOptions {
    /// Options with the given number of identities in flight
    pub fn new(concurrency: usize) -> Result<Self, RepairError> {
        if concurrency == 0 {
            return Err(RepairError::InvalidOptions(
                "concurrency must be strictly positive".to_string(),
            ));
        }
        Ok(Self { concurrency })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

impl Default for RunningOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl<'de> Deserialize<'de> for RunningOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawRunningOptions::deserialize(deserializer)?;
        Self::new(raw.concurrency).map_err(serde::de::Error::custom)
    }
}

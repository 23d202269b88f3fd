use std::time::Duration;

pub const DEFAULT_BROADCAST_CHANNEL_SIZE: usize = 100;
pub const DEFAULT_CONFIRM_POLL_SECS: u64 = 10;
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_MAX_GAS_BUDGET: u64 = 200_000_000;
pub const DEFAULT_REQUEST_TYPE: &str = "WaitForEffectsCert";

/// Configuration for one transaction manager instance.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TxmConfig {
    /// Capacity of the submission hand-off queue. A full queue blocks
    /// `enqueue` callers rather than dropping work.
    pub broadcast_channel_size: usize,
    /// Base confirmer poll period; the actual firing interval is jittered.
    pub confirm_poll_secs: u64,
    pub max_retry_attempts: u32,
    /// Hard cap on any fee escalation.
    pub max_gas_budget: u64,
    /// Percentage applied on a gas bump, normalized to 100 (120 = +20%).
    pub gas_bump_percent: u64,
    /// Gateway finality-wait mode attached to every submission.
    pub request_type: String,
}

impl Default for TxmConfig {
    fn default() -> Self {
        Self {
            broadcast_channel_size: DEFAULT_BROADCAST_CHANNEL_SIZE,
            confirm_poll_secs: DEFAULT_CONFIRM_POLL_SECS,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            max_gas_budget: DEFAULT_MAX_GAS_BUDGET,
            gas_bump_percent: crate::gas::DEFAULT_GAS_BUMP_PERCENT,
            request_type: DEFAULT_REQUEST_TYPE.to_string(),
        }
    }
}

impl TxmConfig {
    pub fn confirm_poll_period(&self) -> Duration {
        Duration::from_secs(self.confirm_poll_secs)
    }
}

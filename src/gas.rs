//! Fee budget management: dry-run estimation through the gateway and a
//! fixed-percentage bump for resubmissions. Fee markets on the target ledger
//! move in a narrow range, so a bounded percentage escalation with a hard cap
//! is sufficient and avoids fee spirals.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::TxmError;
use crate::gateway::ChainGateway;

/// Fixed percentage increase applied during a gas bump, normalized to 100.
pub const DEFAULT_GAS_BUMP_PERCENT: u64 = 120;
const PERCENT_NORMALIZATION: u64 = 100;

#[async_trait]
pub trait ManagesGas: Send + Sync {
    /// Estimates the fee budget for a payload via a gateway dry run. Not
    /// free, but much cheaper than a real submission.
    async fn estimate_gas_budget(&self, payload: &[u8]) -> Result<u64, TxmError>;

    /// Computes a bumped budget for a resubmission, capped at the lesser of
    /// `max_budget` and the manager-wide maximum. Fails with `AtMaxBudget`
    /// when `current_limit` already meets the cap; the caller must treat
    /// that as terminal.
    fn bump_gas(&self, current_limit: u64, max_budget: u64) -> Result<u64, TxmError>;

    fn max_gas_budget(&self) -> u64;
}

pub struct FixedBumpGasManager {
    gateway: Arc<dyn ChainGateway>,
    max_gas_budget: u64,
    bump_percent: u64,
}

impl FixedBumpGasManager {
    pub fn new(gateway: Arc<dyn ChainGateway>, max_gas_budget: u64, bump_percent: u64) -> Self {
        let bump_percent = if bump_percent == 0 {
            DEFAULT_GAS_BUMP_PERCENT
        } else {
            bump_percent
        };
        Self {
            gateway,
            max_gas_budget,
            bump_percent,
        }
    }
}

#[async_trait]
impl ManagesGas for FixedBumpGasManager {
    async fn estimate_gas_budget(&self, payload: &[u8]) -> Result<u64, TxmError> {
        self.gateway
            .estimate_gas(payload)
            .await
            .map_err(|err| TxmError::EstimationFailed(err.to_string()))
    }

    fn bump_gas(&self, current_limit: u64, max_budget: u64) -> Result<u64, TxmError> {
        let cap = max_budget.min(self.max_gas_budget);
        if current_limit >= cap {
            return Err(TxmError::AtMaxBudget);
        }
        let bumped = current_limit
            .saturating_mul(self.bump_percent)
            .checked_div(PERCENT_NORMALIZATION)
            .unwrap_or(current_limit);
        let bumped = bumped.min(cap);
        debug!(current_limit, bumped, cap, "Computed gas bump");
        Ok(bumped)
    }

    fn max_gas_budget(&self) -> u64 {
        self.max_gas_budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockChainGateway;

    fn manager(max_gas_budget: u64) -> FixedBumpGasManager {
        FixedBumpGasManager::new(Arc::new(MockChainGateway::new()), max_gas_budget, 0)
    }

    #[test]
    fn bump_applies_twenty_percent() {
        let bumped = manager(200_000_000)
            .bump_gas(1_000_000, 20_000_000)
            .expect("bump");
        assert_eq!(bumped, 1_200_000);
    }

    #[test]
    fn bump_is_capped_at_max_budget() {
        let bumped = manager(200_000_000)
            .bump_gas(1_300_000, 1_500_000)
            .expect("bump");
        assert_eq!(bumped, 1_500_000);
    }

    #[test]
    fn bump_at_max_is_terminal() {
        let err = manager(200_000_000)
            .bump_gas(1_500_000, 1_500_000)
            .expect_err("at max");
        assert!(matches!(err, TxmError::AtMaxBudget));
    }

    #[test]
    fn manager_wide_cap_wins_when_lower() {
        let bumped = manager(1_100_000)
            .bump_gas(1_000_000, 20_000_000)
            .expect("bump");
        assert_eq!(bumped, 1_100_000);
    }

    #[tokio::test]
    async fn estimation_failure_is_wrapped() {
        let mut gateway = MockChainGateway::new();
        gateway
            .expect_estimate_gas()
            .returning(|_| Err(TxmError::Network("gateway unreachable".to_string())));
        let manager = FixedBumpGasManager::new(Arc::new(gateway), 200_000_000, 0);

        let err = manager
            .estimate_gas_budget(&[1, 2, 3])
            .await
            .expect_err("estimation should fail");
        assert!(matches!(err, TxmError::EstimationFailed(_)));
    }

    #[tokio::test]
    async fn estimation_returns_gateway_value() {
        let mut gateway = MockChainGateway::new();
        gateway.expect_estimate_gas().returning(|_| Ok(4_200_000));
        let manager = FixedBumpGasManager::new(Arc::new(gateway), 200_000_000, 0);

        let budget = manager.estimate_gas_budget(&[]).await.expect("estimate");
        assert_eq!(budget, 4_200_000);
    }
}

//! Phase Table
//!
//! Nine progression tiers. Each tier has a display rate (paisa per 100
//! steps) and the lifetime step count needed to enter it. The accrual
//! multiplier is derived from the tier number alone, in one place:
//! [`multiplier_for_tier`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::TIER_BONUS_TENTHS;
use crate::error::{CoreError, CoreResult};

/// Highest tier
pub const MAX_TIER: u8 = 9;

/// One row of the rate schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTier {
    pub tier: u8,
    /// Paisa per 100 steps shown to the user
    pub rate_numerator: u32,
    /// Lifetime steps needed to enter this tier
    pub step_threshold: u64,
}

const DEFAULT_TIERS: [PhaseTier; MAX_TIER as usize] = [
    tier_row(1, 1, 0),
    tier_row(2, 2, 50_000),
    tier_row(3, 3, 150_000),
    tier_row(4, 5, 300_000),
    tier_row(5, 7, 500_000),
    tier_row(6, 10, 1_000_000),
    tier_row(7, 15, 2_000_000),
    tier_row(8, 20, 3_500_000),
    tier_row(9, 30, 5_000_000),
];

const fn tier_row(tier: u8, rate_numerator: u32, step_threshold: u64) -> PhaseTier {
    PhaseTier {
        tier,
        rate_numerator,
        step_threshold,
    }
}

/// Accrual multiplier for a tier: `1.0 + 0.1 * (tier - 1)`
pub fn multiplier_for_tier(tier: u8) -> CoreResult<Decimal> {
    if tier == 0 || tier > MAX_TIER {
        return Err(CoreError::UnknownTier { tier, max: MAX_TIER });
    }
    let bonus_tenths = Decimal::from(TIER_BONUS_TENTHS * u32::from(tier - 1));
    Ok(Decimal::ONE + bonus_tenths / Decimal::TEN)
}

/// Result of re-evaluating a tier after new steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierAdvance {
    pub from: u8,
    pub to: u8,
}

impl TierAdvance {
    pub fn advanced(&self) -> bool {
        self.to > self.from
    }
}

/// Immutable, ordered rate schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTable {
    tiers: Vec<PhaseTier>,
}

impl PhaseTable {
    /// Build a table, checking tier numbering and strict monotonicity
    pub fn new(tiers: Vec<PhaseTier>) -> CoreResult<Self> {
        let table = Self { tiers };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.tiers.len() != MAX_TIER as usize {
            return Err(CoreError::InvalidPhaseTable {
                tier: 0,
                reason: format!("expected {} tiers, got {}", MAX_TIER, self.tiers.len()),
            });
        }

        for (idx, tier) in self.tiers.iter().enumerate() {
            let expected = idx as u8 + 1;
            if tier.tier != expected {
                return Err(CoreError::InvalidPhaseTable {
                    tier: tier.tier,
                    reason: format!("expected tier number {}", expected),
                });
            }
            if idx == 0 {
                if tier.step_threshold != 0 {
                    return Err(CoreError::InvalidPhaseTable {
                        tier: 1,
                        reason: "tier 1 must start at zero steps".to_string(),
                    });
                }
                continue;
            }
            let prev = &self.tiers[idx - 1];
            if tier.step_threshold <= prev.step_threshold {
                return Err(CoreError::InvalidPhaseTable {
                    tier: tier.tier,
                    reason: "step thresholds must strictly increase".to_string(),
                });
            }
            if tier.rate_numerator <= prev.rate_numerator {
                return Err(CoreError::InvalidPhaseTable {
                    tier: tier.tier,
                    reason: "rates must strictly increase".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn tiers(&self) -> &[PhaseTier] {
        &self.tiers
    }

    pub fn get(&self, tier: u8) -> CoreResult<&PhaseTier> {
        if tier == 0 {
            return Err(CoreError::UnknownTier { tier, max: MAX_TIER });
        }
        self.tiers
            .get(usize::from(tier - 1))
            .ok_or(CoreError::UnknownTier { tier, max: MAX_TIER })
    }

    /// Display rate for a tier (paisa per 100 steps)
    pub fn rate_for_tier(&self, tier: u8) -> CoreResult<u32> {
        self.get(tier).map(|t| t.rate_numerator)
    }

    /// Steps still needed to enter the next tier, `None` at the top tier
    pub fn steps_to_next_tier(&self, tier: u8, lifetime_steps: u64) -> Option<u64> {
        let next = self.tiers.get(usize::from(tier))?;
        Some(next.step_threshold.saturating_sub(lifetime_steps))
    }

    /// Re-evaluate a tier one step at a time until no further threshold
    /// is crossed. Never moves down.
    pub fn advance(&self, current_tier: u8, lifetime_steps: u64) -> TierAdvance {
        let from = current_tier.clamp(1, MAX_TIER);
        let mut to = from;
        while to < MAX_TIER {
            match self.tiers.get(usize::from(to)) {
                Some(next) if lifetime_steps >= next.step_threshold => to += 1,
                _ => break,
            }
        }
        TierAdvance { from, to }
    }
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self {
            tiers: DEFAULT_TIERS.to_vec(),
        }
    }
}

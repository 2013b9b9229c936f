//! Punch Accumulator
//!
//! Pure balance arithmetic. No I/O: the service turns a plan into one
//! conditional member update plus its ledger entries.

use shared::models::{MAX_PUNCHES, REWARD_THRESHOLD};
use std::fmt;
use std::str::FromStr;

/// What happens when an add would push the balance past the card size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Clamp at a full card and discard the excess
    #[default]
    Cap,
    /// Redeem the full card on the spot and carry the excess into a new one
    Rollover,
}

impl OverflowPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cap => "cap",
            Self::Rollover => "rollover",
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cap" => Ok(Self::Cap),
            "rollover" => Ok(Self::Rollover),
            other => Err(format!("unknown overflow policy '{other}' (expected cap|rollover)")),
        }
    }
}

/// Carry-over produced by an implicit redemption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rollover {
    /// Punches that start the next card
    pub carried: i64,
    /// Excess beyond a second full card, dropped
    pub discarded: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddPlan {
    pub new_balance: i64,
    /// Punches credited to the lifetime total and written to the ledger
    pub actual_added: i64,
    pub reward_ready: bool,
    /// Set when the add also redeems a full card
    pub rollover: Option<Rollover>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovePlan {
    pub new_balance: i64,
    /// Requested amount, recorded as-is (negated) in the ledger
    pub requested: i64,
}

/// Plan an add of `delta` punches to a card holding `current`.
///
/// `delta` must be positive; callers validate before planning.
pub fn plan_add(current: i64, delta: i64, policy: OverflowPolicy) -> AddPlan {
    let current = current.clamp(0, MAX_PUNCHES);
    let raw = current + delta;

    if raw <= MAX_PUNCHES || policy == OverflowPolicy::Cap {
        let new_balance = raw.min(MAX_PUNCHES);
        return AddPlan {
            new_balance,
            actual_added: new_balance - current,
            reward_ready: new_balance >= REWARD_THRESHOLD,
            rollover: None,
        };
    }

    let overshoot = raw - REWARD_THRESHOLD;
    let carried = overshoot.min(MAX_PUNCHES);
    let discarded = overshoot - carried;
    AddPlan {
        new_balance: carried,
        actual_added: delta - discarded,
        reward_ready: carried >= REWARD_THRESHOLD,
        rollover: Some(Rollover { carried, discarded }),
    }
}

/// Plan a manual removal of `delta` punches; floors at zero
pub fn plan_remove(current: i64, delta: i64) -> RemovePlan {
    RemovePlan {
        new_balance: (current - delta).max(0),
        requested: delta,
    }
}

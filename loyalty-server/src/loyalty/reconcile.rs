//! Ledger Reconciler
//!
//! Replays a member's ledger and compares the result with the cached row.

use serde::{Deserialize, Serialize};
use shared::models::{HistoryAction, LoyaltyHistory, LoyaltyMember, REWARD_THRESHOLD};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub member_id: i64,
    pub replayed_balance: i64,
    pub replayed_total_punches: i64,
    pub replayed_total_redeemed: i64,
    pub cached_balance: i64,
    pub cached_total_punches: i64,
    pub cached_total_redeemed: i64,
    pub entries: usize,
    pub consistent: bool,
}

/// Replay `history` (oldest first) against `member`
pub fn replay(member: &LoyaltyMember, history: &[LoyaltyHistory]) -> Reconciliation {
    let mut balance = 0i64;
    let mut total_punches = 0i64;
    let mut total_redeemed = 0i64;

    for entry in history {
        let delta = entry.punch_count.unwrap_or(0);
        match entry.action {
            HistoryAction::Punch => {
                balance += delta;
                total_punches += delta;
            }
            HistoryAction::Adjustment => balance = (balance + delta).max(0),
            HistoryAction::Redeem => {
                // Full card resets to zero; a rollover keeps its carry-over
                balance = (balance - REWARD_THRESHOLD).max(0);
                total_redeemed += 1;
            }
        }
    }

    let consistent = balance == member.punches
        && total_punches == member.total_punches
        && total_redeemed == member.total_redeemed;

    Reconciliation {
        member_id: member.id,
        replayed_balance: balance,
        replayed_total_punches: total_punches,
        replayed_total_redeemed: total_redeemed,
        cached_balance: member.punches,
        cached_total_punches: member.total_punches,
        cached_total_redeemed: member.total_redeemed,
        entries: history.len(),
        consistent,
    }
}

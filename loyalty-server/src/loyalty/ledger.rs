//! Ledger Recorder
//!
//! Builds the history entries that accompany each balance change. Always
//! called on the transaction that updates the member row.

use super::accumulator::{AddPlan, RemovePlan};
use crate::db::repository::{RepoResult, history};
use shared::models::{HistoryAction, LoyaltyHistory};
use sqlx::SqliteConnection;

pub const FIRST_VISIT_NOTE: &str = "First visit";

/// Record the implicit first punch of a new member
pub async fn record_first_visit(
    conn: &mut SqliteConnection,
    member_id: i64,
    now: i64,
) -> RepoResult<LoyaltyHistory> {
    history::append(
        conn,
        member_id,
        HistoryAction::Punch,
        Some(1),
        Some(FIRST_VISIT_NOTE),
        now,
    )
    .await
}

/// Record an add: one punch entry, plus a redeem entry on rollover
pub async fn record_add(
    conn: &mut SqliteConnection,
    member_id: i64,
    plan: &AddPlan,
    now: i64,
) -> RepoResult<Vec<LoyaltyHistory>> {
    let mut entries = Vec::with_capacity(2);
    let punch_note = plan
        .rollover
        .filter(|r| r.discarded > 0)
        .map(|r| format!("{} excess punches discarded", r.discarded));
    entries.push(
        history::append(
            &mut *conn,
            member_id,
            HistoryAction::Punch,
            Some(plan.actual_added),
            punch_note.as_deref(),
            now,
        )
        .await?,
    );

    if let Some(rollover) = plan.rollover {
        let note = rollover_note(rollover.carried);
        entries.push(
            history::append(
                &mut *conn,
                member_id,
                HistoryAction::Redeem,
                None,
                Some(&note),
                now,
            )
            .await?,
        );
    }
    Ok(entries)
}

/// Record a manual removal; the delta is the requested amount, negated
pub async fn record_removal(
    conn: &mut SqliteConnection,
    member_id: i64,
    plan: &RemovePlan,
    reason: Option<&str>,
    now: i64,
) -> RepoResult<LoyaltyHistory> {
    let note = removal_note(plan.requested, reason);
    history::append(
        conn,
        member_id,
        HistoryAction::Adjustment,
        Some(-plan.requested),
        Some(&note),
        now,
    )
    .await
}

pub async fn record_redeem(
    conn: &mut SqliteConnection,
    member_id: i64,
    note: Option<&str>,
    now: i64,
) -> RepoResult<LoyaltyHistory> {
    history::append(conn, member_id, HistoryAction::Redeem, None, note, now).await
}

pub fn rollover_note(carried: i64) -> String {
    format!("Reward redeemed, {carried} {} carried over", plural(carried))
}

pub fn removal_note(requested: i64, reason: Option<&str>) -> String {
    let base = format!("Removed {requested} {}", plural(requested));
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{base}: {reason}"),
        None => base,
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 { "punch" } else { "punches" }
}

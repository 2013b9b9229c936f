//! Stats Aggregator
//!
//! Read-only rollups over the member set and the full ledger, computed in
//! memory.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use shared::models::{HistoryAction, HistoryWithMember, LoyaltyHistory, LoyaltyMember};
use std::collections::HashMap;

use crate::utils::time::month_range_millis;

pub const TOP_MEMBERS: usize = 10;
pub const RECENT_ACTIVITY: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopMember {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub total_punches: i64,
    pub total_redeemed: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyStats {
    pub total_members: i64,
    /// Sum of punch deltas this calendar month
    pub punches_this_month: i64,
    pub redemptions_this_month: i64,
    pub top_members: Vec<TopMember>,
    pub recent_activity: Vec<HistoryWithMember>,
}

/// Aggregate stats for the calendar month containing `now` (business zone)
pub fn aggregate(
    members: &[LoyaltyMember],
    history: &[LoyaltyHistory],
    now: i64,
    tz: Tz,
) -> LoyaltyStats {
    let (month_start, month_end) = month_range_millis(now, tz);
    let in_month = |h: &&LoyaltyHistory| h.created_at >= month_start && h.created_at < month_end;

    let punches_this_month = history
        .iter()
        .filter(in_month)
        .filter(|h| h.action == HistoryAction::Punch)
        .filter_map(|h| h.punch_count)
        .sum();
    let redemptions_this_month = history
        .iter()
        .filter(in_month)
        .filter(|h| h.action == HistoryAction::Redeem)
        .count() as i64;

    let mut ranked: Vec<&LoyaltyMember> = members.iter().collect();
    ranked.sort_by(|a, b| b.total_punches.cmp(&a.total_punches).then(a.id.cmp(&b.id)));
    let top_members = ranked
        .into_iter()
        .take(TOP_MEMBERS)
        .map(|m| TopMember {
            id: m.id,
            name: m.name.clone(),
            phone: m.phone.clone(),
            total_punches: m.total_punches,
            total_redeemed: m.total_redeemed,
        })
        .collect();

    let by_id: HashMap<i64, &LoyaltyMember> = members.iter().map(|m| (m.id, m)).collect();
    let mut newest: Vec<&LoyaltyHistory> = history.iter().collect();
    newest.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    let recent_activity = newest
        .into_iter()
        .filter_map(|h| {
            by_id.get(&h.member_id).map(|m| HistoryWithMember {
                id: h.id,
                member_id: h.member_id,
                member_name: m.name.clone(),
                member_phone: m.phone.clone(),
                action: h.action,
                punch_count: h.punch_count,
                note: h.note.clone(),
                created_at: h.created_at,
            })
        })
        .take(RECENT_ACTIVITY)
        .collect();

    LoyaltyStats {
        total_members: members.len() as i64,
        punches_this_month,
        redemptions_this_month,
        top_members,
        recent_activity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TZ: Tz = chrono_tz::America::Chicago;

    fn millis(s: &str) -> i64 {
        chrono::DateTime::parse_from_rfc3339(s)
            .unwrap()
            .timestamp_millis()
    }

    fn member(id: i64, name: &str, total_punches: i64) -> LoyaltyMember {
        LoyaltyMember {
            id,
            phone: format!("817555{:04}", id),
            name: name.to_string(),
            email: None,
            punches: 0,
            total_punches,
            total_redeemed: 0,
            created_at: 0,
            last_visit: 0,
        }
    }

    fn entry(id: i64, member_id: i64, action: HistoryAction, count: Option<i64>, at: i64) -> LoyaltyHistory {
        LoyaltyHistory {
            id,
            member_id,
            action,
            punch_count: count,
            note: None,
            created_at: at,
        }
    }

    #[test]
    fn test_monthly_totals_only_count_current_month() {
        let members = vec![member(1, "Jane", 12)];
        let now = millis("2024-05-20T12:00:00-05:00");
        let history = vec![
            entry(1, 1, HistoryAction::Punch, Some(4), millis("2024-04-30T23:00:00-05:00")),
            entry(2, 1, HistoryAction::Punch, Some(3), millis("2024-05-01T00:30:00-05:00")),
            entry(3, 1, HistoryAction::Adjustment, Some(-2), millis("2024-05-02T10:00:00-05:00")),
            entry(4, 1, HistoryAction::Punch, Some(5), millis("2024-05-10T10:00:00-05:00")),
            entry(5, 1, HistoryAction::Redeem, None, millis("2024-05-10T10:00:00-05:00")),
            entry(6, 1, HistoryAction::Redeem, None, millis("2024-04-10T10:00:00-05:00")),
        ];

        let stats = aggregate(&members, &history, now, TZ);
        assert_eq!(stats.total_members, 1);
        assert_eq!(stats.punches_this_month, 8);
        assert_eq!(stats.redemptions_this_month, 1);
    }

    #[test]
    fn test_top_members_sorted_and_capped() {
        let members: Vec<LoyaltyMember> = (1..=12).map(|i| member(i, "Guest", i * 3)).collect();
        let stats = aggregate(&members, &[], 0, TZ);
        assert_eq!(stats.top_members.len(), TOP_MEMBERS);
        assert_eq!(stats.top_members[0].id, 12);
        assert_eq!(stats.top_members[0].total_punches, 36);
        assert_eq!(stats.top_members[9].id, 3);
    }

    #[test]
    fn test_recent_activity_newest_first_with_names() {
        let members = vec![member(1, "Jane", 1), member(2, "Bob", 1)];
        let history: Vec<LoyaltyHistory> = (1..=20)
            .map(|i| entry(i, if i % 2 == 0 { 2 } else { 1 }, HistoryAction::Punch, Some(1), i * 1000))
            .collect();

        let stats = aggregate(&members, &history, 0, TZ);
        assert_eq!(stats.recent_activity.len(), RECENT_ACTIVITY);
        assert_eq!(stats.recent_activity[0].id, 20);
        assert_eq!(stats.recent_activity[0].member_name, "Bob");
        assert_eq!(stats.recent_activity[1].member_name, "Jane");
    }

    #[test]
    fn test_empty_store() {
        let stats = aggregate(&[], &[], 0, TZ);
        assert_eq!(stats.total_members, 0);
        assert_eq!(stats.punches_this_month, 0);
        assert!(stats.top_members.is_empty());
        assert!(stats.recent_activity.is_empty());
    }
}

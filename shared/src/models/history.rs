//! Loyalty History (ledger) Model

use serde::{Deserialize, Serialize};

/// Ledger action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum HistoryAction {
    /// Punches granted
    Punch,
    /// Reward handed out, balance reset
    Redeem,
    /// Manual correction by staff
    Adjustment,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Punch => "punch",
            Self::Redeem => "redeem",
            Self::Adjustment => "adjustment",
        }
    }
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable ledger entry
///
/// `punch_count` is positive for punches, negative for adjustments and
/// `None` for redemptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct LoyaltyHistory {
    pub id: i64,
    pub member_id: i64,
    pub action: HistoryAction,
    pub punch_count: Option<i64>,
    pub note: Option<String>,
    pub created_at: i64,
}

/// Ledger entry joined with the owning member's display fields (activity feed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct HistoryWithMember {
    pub id: i64,
    pub member_id: i64,
    pub member_name: String,
    pub member_phone: String,
    pub action: HistoryAction,
    pub punch_count: Option<i64>,
    pub note: Option<String>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&HistoryAction::Adjustment).unwrap(),
            "\"adjustment\""
        );
        let action: HistoryAction = serde_json::from_str("\"redeem\"").unwrap();
        assert_eq!(action, HistoryAction::Redeem);
    }

    #[test]
    fn test_action_display() {
        assert_eq!(HistoryAction::Punch.to_string(), "punch");
    }
}

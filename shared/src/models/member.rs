//! Loyalty Member Model

use serde::{Deserialize, Serialize};

/// Highest punch balance a card can hold
pub const MAX_PUNCHES: i64 = 9;

/// Punches required for one free reward
pub const REWARD_THRESHOLD: i64 = 9;

/// Loyalty member entity (one customer's punch card)
///
/// `punches` stays within `0..=MAX_PUNCHES` after every committed operation;
/// `total_punches` and `total_redeemed` never decrease.
/// Serialized with an extra `display_phone` for the admin UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "MemberView")]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct LoyaltyMember {
    pub id: i64,
    /// Canonical 10-digit phone, unique across members
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub punches: i64,
    pub total_punches: i64,
    pub total_redeemed: i64,
    pub created_at: i64,
    pub last_visit: i64,
}

/// Wire shape of [`LoyaltyMember`]
#[derive(Serialize)]
struct MemberView {
    id: i64,
    phone: String,
    display_phone: String,
    name: String,
    email: Option<String>,
    punches: i64,
    total_punches: i64,
    total_redeemed: i64,
    created_at: i64,
    last_visit: i64,
}

impl From<LoyaltyMember> for MemberView {
    fn from(m: LoyaltyMember) -> Self {
        Self {
            display_phone: m.display_phone(),
            id: m.id,
            phone: m.phone,
            name: m.name,
            email: m.email,
            punches: m.punches,
            total_punches: m.total_punches,
            total_redeemed: m.total_redeemed,
            created_at: m.created_at,
            last_visit: m.last_visit,
        }
    }
}

impl LoyaltyMember {
    /// Phone rendered as `(XXX) XXX-XXXX`
    pub fn display_phone(&self) -> String {
        crate::phone::format(&self.phone)
    }

    /// Card is full and a reward can be handed out
    pub fn is_reward_ready(&self) -> bool {
        self.punches >= REWARD_THRESHOLD
    }
}

/// Create member payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberCreate {
    pub phone: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Phone correction payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneUpdate {
    pub phone: String,
}

/// Email update payload (`null` clears the email)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailUpdate {
    pub email: Option<String>,
}

/// Name update payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameUpdate {
    pub name: String,
}

/// Add punches payload
///
/// `current_punches` / `current_total` are the caller's view of the member;
/// the write is rejected if the stored row no longer matches them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPunches {
    pub current_punches: i64,
    pub current_total: i64,
    pub delta: i64,
}

/// Manual removal payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovePunches {
    pub current_punches: i64,
    pub delta: i64,
    /// Optional rationale, appended to the adjustment note
    #[serde(default)]
    pub reason: Option<String>,
}

/// Redeem payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemReward {
    pub current_total_redeemed: i64,
    /// Staff override: hand out a reward before the card is full
    #[serde(default)]
    pub goodwill: bool,
}

/// Result of an add operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunchOutcome {
    pub member: LoyaltyMember,
    pub new_balance: i64,
    /// Punches actually credited (may be less than requested)
    pub actual_added: i64,
    /// Card is full after this add; staff decides when to redeem
    pub reward_ready: bool,
    /// Set when the add overshot the card and an implicit redemption happened
    pub carried_over: Option<i64>,
}

/// Result of a manual removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentOutcome {
    pub member: LoyaltyMember,
    pub new_balance: i64,
    /// Requested removal, recorded as the negative ledger delta
    pub requested: i64,
}

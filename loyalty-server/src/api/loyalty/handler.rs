//! Loyalty API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::models::{
    AddPunches, AdjustmentOutcome, EmailUpdate, HistoryWithMember, LoyaltyHistory, LoyaltyMember,
    MemberCreate, NameUpdate, PhoneUpdate, PunchOutcome, REWARD_THRESHOLD, RedeemReward,
    RemovePunches,
};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::loyalty::service::GOODWILL_NOTE;
use crate::loyalty::{LoyaltyStats, Reconciliation};
use crate::utils::validation::{
    MAX_NOTE_LEN, MAX_QUERY_LEN, validate_add_delta, validate_balance, validate_optional_text,
    validate_positive_delta,
};
use crate::utils::{AppError, AppResult};

pub const DEFAULT_HISTORY_LIMIT: i64 = 15;
pub const MAX_HISTORY_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// GET /api/loyalty/members
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<LoyaltyMember>>> {
    let members = state.loyalty.list_all().await?;
    Ok(Json(members))
}

/// GET /api/loyalty/members/search?q=xxx
pub async fn search(
    State(state): State<ServerState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<LoyaltyMember>>> {
    if query.q.len() > MAX_QUERY_LEN {
        return Err(AppError::validation(format!(
            "query is too long (max {MAX_QUERY_LEN})"
        )));
    }
    let members = state.loyalty.search(&query.q).await?;
    Ok(Json(members))
}

/// GET /api/loyalty/members/:id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<LoyaltyMember>> {
    let member = state.loyalty.get(id).await?;
    Ok(Json(member))
}

/// POST /api/loyalty/members
pub async fn create(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Json(payload): Json<MemberCreate>,
) -> AppResult<Json<LoyaltyMember>> {
    let member = state
        .loyalty
        .create(&payload.phone, &payload.name, payload.email.as_deref())
        .await?;
    tracing::info!(operator = %current_user.id, member_id = member.id, "Member created");
    Ok(Json(member))
}

/// PUT /api/loyalty/members/:id/phone
pub async fn update_phone(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<PhoneUpdate>,
) -> AppResult<Json<LoyaltyMember>> {
    let member = state.loyalty.update_phone(id, &payload.phone).await?;
    tracing::info!(operator = %current_user.id, member_id = id, "Member phone corrected");
    Ok(Json(member))
}

/// PUT /api/loyalty/members/:id/email
pub async fn update_email(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<EmailUpdate>,
) -> AppResult<Json<LoyaltyMember>> {
    let member = state
        .loyalty
        .update_email(id, payload.email.as_deref())
        .await?;
    tracing::info!(operator = %current_user.id, member_id = id, "Member email updated");
    Ok(Json(member))
}

/// PUT /api/loyalty/members/:id/name
pub async fn update_name(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<NameUpdate>,
) -> AppResult<Json<LoyaltyMember>> {
    let member = state.loyalty.update_name(id, &payload.name).await?;
    tracing::info!(operator = %current_user.id, member_id = id, "Member name updated");
    Ok(Json(member))
}

/// DELETE /api/loyalty/members/:id
pub async fn delete(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<bool>> {
    state.loyalty.delete(id).await?;
    tracing::info!(operator = %current_user.id, member_id = id, "Member deleted");
    Ok(Json(true))
}

/// POST /api/loyalty/members/:id/punches
pub async fn add_punches(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<AddPunches>,
) -> AppResult<Json<PunchOutcome>> {
    validate_add_delta(payload.delta)?;
    validate_balance(payload.current_punches)?;

    let outcome = state
        .loyalty
        .add_punches(id, payload.current_punches, payload.current_total, payload.delta)
        .await?;
    tracing::info!(
        operator = %current_user.id,
        member_id = id,
        delta = payload.delta,
        "Punches granted"
    );
    Ok(Json(outcome))
}

/// POST /api/loyalty/members/:id/adjustments
pub async fn remove_punches(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<RemovePunches>,
) -> AppResult<Json<AdjustmentOutcome>> {
    validate_positive_delta(payload.delta)?;
    validate_balance(payload.current_punches)?;
    validate_optional_text(&payload.reason, "reason", MAX_NOTE_LEN)?;

    let outcome = state
        .loyalty
        .remove_punches(
            id,
            payload.current_punches,
            payload.delta,
            payload.reason.as_deref(),
        )
        .await?;
    tracing::info!(
        operator = %current_user.id,
        member_id = id,
        delta = payload.delta,
        "Punches removed"
    );
    Ok(Json(outcome))
}

/// POST /api/loyalty/members/:id/redeem
///
/// Refused unless the card is full or the request is a goodwill redemption.
pub async fn redeem(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<RedeemReward>,
) -> AppResult<Json<LoyaltyMember>> {
    let member = state.loyalty.get(id).await?;
    let card_full = member.is_reward_ready();
    if !card_full && !payload.goodwill {
        return Err(AppError::reward_not_ready(member.punches, REWARD_THRESHOLD));
    }

    let note = (!card_full).then_some(GOODWILL_NOTE);
    let updated = state
        .loyalty
        .redeem(id, payload.current_total_redeemed, Some(member.punches), note)
        .await?;
    tracing::info!(
        operator = %current_user.id,
        member_id = id,
        goodwill = !card_full,
        "Reward handed out"
    );
    Ok(Json(updated))
}

/// GET /api/loyalty/members/:id/history
pub async fn member_history(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<LoyaltyHistory>>> {
    let entries = state.loyalty.member_history(id).await?;
    Ok(Json(entries))
}

/// GET /api/loyalty/members/:id/reconcile
pub async fn reconcile(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Reconciliation>> {
    let result = state.loyalty.reconcile(id).await?;
    Ok(Json(result))
}

/// GET /api/loyalty/history?limit=N
pub async fn recent_history(
    State(state): State<ServerState>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<HistoryWithMember>>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(AppError::with_message(
            shared::error::ErrorCode::ValueOutOfRange,
            format!("limit must be between 1 and {MAX_HISTORY_LIMIT}"),
        ));
    }
    let entries = state.loyalty.recent_history(limit).await?;
    Ok(Json(entries))
}

/// GET /api/loyalty/stats
pub async fn stats(State(state): State<ServerState>) -> AppResult<Json<LoyaltyStats>> {
    let stats = state.loyalty.stats().await?;
    Ok(Json(stats))
}

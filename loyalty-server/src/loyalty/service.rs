//! Loyalty Service
//!
//! Every mutating operation is one transaction: a conditional member update
//! (matching the caller's view of the row) plus its ledger entries. Transient
//! store failures are retried with exponential backoff; the conditional
//! update makes a retry after an unacknowledged commit fail as stale instead
//! of applying twice.

use std::future::Future;

use chrono_tz::Tz;
use shared::models::{
    AdjustmentOutcome, HistoryWithMember, LoyaltyHistory, LoyaltyMember, PunchOutcome,
};
use shared::util::{now_millis, snowflake_id};
use sqlx::SqlitePool;

use super::accumulator::{self, OverflowPolicy};
use super::ledger;
use super::reconcile::{self, Reconciliation};
use super::stats::{self, LoyaltyStats};
use crate::core::config::RetryPolicy;
use crate::db::repository::member::{BalanceChange, ExpectedState};
use crate::db::repository::{RepoError, RepoResult, history, member};
use crate::utils::validation::{
    MAX_NAME_LEN, normalize_email, validate_phone, validate_positive_delta, validate_required_text,
};
use crate::utils::{AppError, AppResult};

/// Search results are capped at this many members
pub const SEARCH_LIMIT: i64 = 10;

/// Fewer query digits than this skip the store entirely
pub const SEARCH_MIN_DIGITS: usize = 3;

pub const GOODWILL_NOTE: &str = "Goodwill redemption";

#[derive(Debug, Clone)]
pub struct LoyaltyService {
    pool: SqlitePool,
    policy: OverflowPolicy,
    retry: RetryPolicy,
    timezone: Tz,
}

impl LoyaltyService {
    pub fn new(pool: SqlitePool, policy: OverflowPolicy, retry: RetryPolicy, timezone: Tz) -> Self {
        Self {
            pool,
            policy,
            retry,
            timezone,
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Phone-or-name substring search; short queries return nothing
    pub async fn search(&self, query: &str) -> AppResult<Vec<LoyaltyMember>> {
        let digits = shared::phone::normalize(query);
        if digits.len() < SEARCH_MIN_DIGITS {
            return Ok(Vec::new());
        }
        let name = query.trim();
        let pool = &self.pool;
        let digits = digits.as_str();
        self.with_retry("search", move || async move {
            member::search(pool, digits, name, SEARCH_LIMIT).await
        })
        .await
        .map_err(AppError::from)
    }

    pub async fn get(&self, member_id: i64) -> AppResult<LoyaltyMember> {
        let pool = &self.pool;
        self.with_retry("get_member", move || async move {
            member::find_by_id(pool, member_id).await
        })
        .await?
        .ok_or_else(|| AppError::member_not_found(member_id))
    }

    /// Every member, most recent visit first
    pub async fn list_all(&self) -> AppResult<Vec<LoyaltyMember>> {
        let pool = &self.pool;
        self.with_retry("list_members", move || async move { member::find_all(pool).await })
            .await
            .map_err(AppError::from)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create a member with the implicit first punch
    pub async fn create(
        &self,
        phone: &str,
        name: &str,
        email: Option<&str>,
    ) -> AppResult<LoyaltyMember> {
        let phone = validate_phone(phone)?;
        let name = name.trim();
        validate_required_text(name, "name", MAX_NAME_LEN)?;
        let email = normalize_email(email)?;

        let phone_ref = phone.as_str();
        let email_ref = email.as_deref();
        let result = self
            .with_retry("create_member", move || async move {
                let id = snowflake_id();
                let now = now_millis();
                let mut tx = self.pool.begin().await?;
                let created = member::insert(&mut *tx, id, phone_ref, name, email_ref, now).await?;
                ledger::record_first_visit(&mut *tx, id, now).await?;
                tx.commit().await?;
                Ok(created)
            })
            .await;
        let created = match result {
            Ok(created) => created,
            Err(e) => return Err(self.phone_clash(&phone, e).await),
        };

        tracing::info!(member_id = created.id, "Loyalty member created");
        Ok(created)
    }

    pub async fn update_phone(&self, member_id: i64, phone: &str) -> AppResult<LoyaltyMember> {
        let phone = validate_phone(phone)?;
        let pool = &self.pool;
        let phone_ref = phone.as_str();
        let result = self
            .with_retry("update_phone", move || async move {
                member::update_phone(pool, member_id, phone_ref).await
            })
            .await;
        let updated = match result {
            Ok(updated) => updated,
            Err(RepoError::NotFound(_)) => return Err(AppError::member_not_found(member_id)),
            Err(e) => return Err(self.phone_clash(&phone, e).await),
        };
        tracing::info!(member_id, "Member phone updated");
        Ok(updated)
    }

    /// Blank email clears the field
    pub async fn update_email(
        &self,
        member_id: i64,
        email: Option<&str>,
    ) -> AppResult<LoyaltyMember> {
        let email = normalize_email(email)?;
        let pool = &self.pool;
        let email_ref = email.as_deref();
        let updated = self
            .with_retry("update_email", move || async move {
                member::update_email(pool, member_id, email_ref).await
            })
            .await
            .map_err(|e| member_error(member_id, e))?;
        tracing::info!(member_id, "Member email updated");
        Ok(updated)
    }

    pub async fn update_name(&self, member_id: i64, name: &str) -> AppResult<LoyaltyMember> {
        let name = name.trim();
        validate_required_text(name, "name", MAX_NAME_LEN)?;
        let pool = &self.pool;
        let updated = self
            .with_retry("update_name", move || async move {
                member::update_name(pool, member_id, name).await
            })
            .await
            .map_err(|e| member_error(member_id, e))?;
        tracing::info!(member_id, "Member name updated");
        Ok(updated)
    }

    /// Irreversible; the member's ledger goes with it
    pub async fn delete(&self, member_id: i64) -> AppResult<()> {
        let pool = &self.pool;
        let deleted = self
            .with_retry("delete_member", move || async move {
                member::delete(pool, member_id).await
            })
            .await?;
        if !deleted {
            return Err(AppError::member_not_found(member_id));
        }
        tracing::info!(member_id, "Loyalty member deleted");
        Ok(())
    }

    // ========================================================================
    // Balance changes
    // ========================================================================

    /// Add punches under the configured overflow policy
    pub async fn add_punches(
        &self,
        member_id: i64,
        current_punches: i64,
        current_total: i64,
        delta: i64,
    ) -> AppResult<PunchOutcome> {
        validate_positive_delta(delta)?;
        let plan = accumulator::plan_add(current_punches, delta, self.policy);
        let expected = ExpectedState {
            punches: Some(current_punches),
            total_punches: Some(current_total),
            total_redeemed: None,
        };

        let updated = self
            .with_retry("add_punches", move || async move {
                let now = now_millis();
                let change = BalanceChange {
                    punches: plan.new_balance,
                    add_total_punches: plan.actual_added,
                    add_total_redeemed: i64::from(plan.rollover.is_some()),
                    visit_at: Some(now),
                };
                let mut tx = self.pool.begin().await?;
                let updated = member::apply_balance(&mut *tx, member_id, expected, change).await?;
                ledger::record_add(&mut *tx, member_id, &plan, now).await?;
                tx.commit().await?;
                Ok(updated)
            })
            .await
            .map_err(|e| stale_error(member_id, e, expected))?;

        tracing::info!(
            member_id,
            delta,
            actual_added = plan.actual_added,
            new_balance = plan.new_balance,
            rollover = plan.rollover.is_some(),
            "Punches added"
        );

        Ok(PunchOutcome {
            member: updated,
            new_balance: plan.new_balance,
            actual_added: plan.actual_added,
            reward_ready: plan.reward_ready,
            carried_over: plan.rollover.map(|r| r.carried),
        })
    }

    /// Manual correction; floors at zero and leaves lifetime totals alone
    pub async fn remove_punches(
        &self,
        member_id: i64,
        current_punches: i64,
        delta: i64,
        reason: Option<&str>,
    ) -> AppResult<AdjustmentOutcome> {
        validate_positive_delta(delta)?;
        let plan = accumulator::plan_remove(current_punches, delta);
        let expected = ExpectedState {
            punches: Some(current_punches),
            ..Default::default()
        };

        let updated = self
            .with_retry("remove_punches", move || async move {
                let now = now_millis();
                let change = BalanceChange {
                    punches: plan.new_balance,
                    add_total_punches: 0,
                    add_total_redeemed: 0,
                    visit_at: None,
                };
                let mut tx = self.pool.begin().await?;
                let updated = member::apply_balance(&mut *tx, member_id, expected, change).await?;
                ledger::record_removal(&mut *tx, member_id, &plan, reason, now).await?;
                tx.commit().await?;
                Ok(updated)
            })
            .await
            .map_err(|e| stale_error(member_id, e, expected))?;

        tracing::info!(
            member_id,
            delta,
            new_balance = plan.new_balance,
            "Punches removed"
        );

        Ok(AdjustmentOutcome {
            member: updated,
            new_balance: plan.new_balance,
            requested: plan.requested,
        })
    }

    /// Reset the card and count one reward
    ///
    /// Unconditional: whether the card must be full is the caller's decision.
    /// `seen_punches` is the balance that decision was based on; a card that
    /// changed since then fails as stale.
    pub async fn redeem(
        &self,
        member_id: i64,
        current_total_redeemed: i64,
        seen_punches: Option<i64>,
        note: Option<&str>,
    ) -> AppResult<LoyaltyMember> {
        let expected = ExpectedState {
            punches: seen_punches,
            total_redeemed: Some(current_total_redeemed),
            ..Default::default()
        };

        let updated = self
            .with_retry("redeem", move || async move {
                let now = now_millis();
                let change = BalanceChange {
                    punches: 0,
                    add_total_punches: 0,
                    add_total_redeemed: 1,
                    visit_at: Some(now),
                };
                let mut tx = self.pool.begin().await?;
                let updated = member::apply_balance(&mut *tx, member_id, expected, change).await?;
                ledger::record_redeem(&mut *tx, member_id, note, now).await?;
                tx.commit().await?;
                Ok(updated)
            })
            .await
            .map_err(|e| stale_error(member_id, e, expected))?;

        tracing::info!(
            member_id,
            total_redeemed = updated.total_redeemed,
            "Reward redeemed"
        );
        Ok(updated)
    }

    // ========================================================================
    // Ledger reads
    // ========================================================================

    /// Newest entries across all members
    pub async fn recent_history(&self, limit: i64) -> AppResult<Vec<HistoryWithMember>> {
        let pool = &self.pool;
        self.with_retry("recent_history", move || async move {
            history::find_recent(pool, limit).await
        })
        .await
        .map_err(AppError::from)
    }

    /// One member's ledger, newest first
    pub async fn member_history(&self, member_id: i64) -> AppResult<Vec<LoyaltyHistory>> {
        self.get(member_id).await?;
        let pool = &self.pool;
        self.with_retry("member_history", move || async move {
            history::find_by_member(pool, member_id).await
        })
        .await
        .map_err(AppError::from)
    }

    /// Replay the member's ledger against the cached row
    pub async fn reconcile(&self, member_id: i64) -> AppResult<Reconciliation> {
        let current = self.get(member_id).await?;
        let pool = &self.pool;
        let entries = self
            .with_retry("reconcile", move || async move {
                history::find_by_member_chronological(pool, member_id).await
            })
            .await?;

        let result = reconcile::replay(&current, &entries);
        if !result.consistent {
            tracing::warn!(
                member_id,
                cached_balance = result.cached_balance,
                replayed_balance = result.replayed_balance,
                "Ledger does not reconcile with member row"
            );
        }
        Ok(result)
    }

    /// Rollups for the current month in the business time zone
    pub async fn stats(&self) -> AppResult<LoyaltyStats> {
        let pool = &self.pool;
        let members = self
            .with_retry("stats_members", move || async move { member::find_all(pool).await })
            .await?;
        let entries = self
            .with_retry("stats_history", move || async move { history::find_all(pool).await })
            .await?;
        Ok(stats::aggregate(&members, &entries, now_millis(), self.timezone))
    }

    /// Phone uniqueness failure, naming the member that already holds it
    async fn phone_clash(&self, phone: &str, err: RepoError) -> AppError {
        let duplicate = matches!(err, RepoError::Duplicate { .. });
        let mut error = phone_error(phone, err);
        if duplicate && let Ok(Some(holder)) = member::find_by_phone(&self.pool, phone).await {
            error = error.with_detail("existing_member_id", holder.id);
        }
        error
    }

    // ========================================================================
    // Retry
    // ========================================================================

    /// Run `op`, retrying transient failures with exponential backoff
    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut f: F) -> RepoResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RepoResult<T>>,
    {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1;

        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retry.attempts => {
                    tracing::warn!(
                        op,
                        attempt,
                        max_attempts = self.retry.attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Store operation failed, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.retry.max_delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn member_error(member_id: i64, err: RepoError) -> AppError {
    match err {
        RepoError::NotFound(_) => AppError::member_not_found(member_id),
        RepoError::Stale(_) => AppError::stale_member(member_id),
        other => other.into(),
    }
}

fn stale_error(member_id: i64, err: RepoError, expected: ExpectedState) -> AppError {
    match err {
        RepoError::Stale(_) => {
            let mut e = AppError::stale_member(member_id);
            if let Some(p) = expected.punches {
                e = e.with_detail("expected_punches", p);
            }
            if let Some(t) = expected.total_punches {
                e = e.with_detail("expected_total_punches", t);
            }
            if let Some(r) = expected.total_redeemed {
                e = e.with_detail("expected_total_redeemed", r);
            }
            e
        }
        other => member_error(member_id, other),
    }
}

fn phone_error(phone: &str, err: RepoError) -> AppError {
    match err {
        RepoError::Duplicate {
            message,
            store_code,
        } => AppError::phone_taken(phone)
            .with_detail("store_code", store_code.unwrap_or_default())
            .with_detail("store_message", message),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use shared::error::ErrorCode;
    use shared::models::HistoryAction;
    use std::time::Duration;

    async fn service_with(policy: OverflowPolicy) -> LoyaltyService {
        let db = DbService::in_memory().await.unwrap();
        LoyaltyService::new(
            db.pool,
            policy,
            RetryPolicy {
                attempts: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
            },
            chrono_tz::America::Chicago,
        )
    }

    async fn service() -> LoyaltyService {
        service_with(OverflowPolicy::Cap).await
    }

    /// Member at `punches` with `total` lifetime punches
    async fn member_at(svc: &LoyaltyService, phone: &str, punches: i64, total: i64) -> LoyaltyMember {
        let m = svc.create(phone, "Jane", None).await.unwrap();
        let mut tx = svc.pool.begin().await.unwrap();
        sqlx::query("UPDATE loyalty_members SET punches = ?, total_punches = ? WHERE id = ?")
            .bind(punches)
            .bind(total)
            .bind(m.id)
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        svc.get(m.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_records_first_visit() {
        let svc = service().await;
        let m = svc
            .create("(817) 555-1234", "  Jane  ", Some("jane@example.com"))
            .await
            .unwrap();
        assert_eq!(m.phone, "8175551234");
        assert_eq!(m.name, "Jane");
        assert_eq!(m.punches, 1);
        assert_eq!(m.total_punches, 1);

        let history = svc.member_history(m.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, HistoryAction::Punch);
        assert_eq!(history[0].punch_count, Some(1));
        assert_eq!(history[0].note.as_deref(), Some(ledger::FIRST_VISIT_NOTE));
    }

    #[tokio::test]
    async fn test_create_duplicate_phone_leaves_no_partial_member() {
        let svc = service().await;
        let first = svc.create("8175551234", "Jane", None).await.unwrap();
        let err = svc.create("817-555-1234", "Jane", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PhoneAlreadyExists);
        let details = err.details.unwrap();
        assert!(details.contains_key("store_code"));
        assert!(details.contains_key("store_message"));
        assert_eq!(details["existing_member_id"], first.id);

        assert_eq!(svc.list_all().await.unwrap().len(), 1);
        assert_eq!(svc.recent_history(100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_phone() {
        let svc = service().await;
        let err = svc.create("555-1234", "Jane", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPhone);
    }

    #[tokio::test]
    async fn test_add_caps_then_redeem() {
        let svc = service().await;
        let m = member_at(&svc, "8175551234", 7, 20).await;

        let outcome = svc.add_punches(m.id, 7, 20, 5).await.unwrap();
        assert_eq!(outcome.new_balance, 9);
        assert_eq!(outcome.actual_added, 2);
        assert!(outcome.reward_ready);
        assert!(outcome.carried_over.is_none());
        assert_eq!(outcome.member.total_punches, 22);

        let redeemed = svc.redeem(m.id, 0, None, None).await.unwrap();
        assert_eq!(redeemed.punches, 0);
        assert_eq!(redeemed.total_redeemed, 1);
        assert_eq!(redeemed.total_punches, 22);

        let history = svc.member_history(m.id).await.unwrap();
        assert_eq!(history[0].action, HistoryAction::Redeem);
        assert!(history[0].punch_count.is_none());
        assert_eq!(history[1].action, HistoryAction::Punch);
        assert_eq!(history[1].punch_count, Some(2));
    }

    #[tokio::test]
    async fn test_remove_floors_and_records_requested_delta() {
        let svc = service().await;
        let m = member_at(&svc, "8175551234", 3, 3).await;

        let outcome = svc
            .remove_punches(m.id, 3, 10, Some("entered twice"))
            .await
            .unwrap();
        assert_eq!(outcome.new_balance, 0);
        assert_eq!(outcome.requested, 10);
        assert_eq!(outcome.member.total_punches, 3);
        assert_eq!(outcome.member.last_visit, m.last_visit);

        let history = svc.member_history(m.id).await.unwrap();
        assert_eq!(history[0].action, HistoryAction::Adjustment);
        assert_eq!(history[0].punch_count, Some(-10));
        assert_eq!(
            history[0].note.as_deref(),
            Some("Removed 10 punches: entered twice")
        );
    }

    #[tokio::test]
    async fn test_stale_add_writes_nothing() {
        let svc = service().await;
        let m = svc.create("8175551234", "Jane", None).await.unwrap();

        let err = svc.add_punches(m.id, 4, 1, 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::StaleMemberState);
        assert_eq!(err.details.unwrap()["expected_punches"], 4);

        let after = svc.get(m.id).await.unwrap();
        assert_eq!(after.punches, 1);
        assert_eq!(svc.member_history(m.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_identical_add_is_stale() {
        let svc = service().await;
        let m = svc.create("8175551234", "Jane", None).await.unwrap();
        svc.add_punches(m.id, 1, 1, 2).await.unwrap();
        let err = svc.add_punches(m.id, 1, 1, 2).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::StaleMemberState);
        assert_eq!(svc.get(m.id).await.unwrap().punches, 3);
    }

    #[tokio::test]
    async fn test_stale_redeem() {
        let svc = service().await;
        let m = svc.create("8175551234", "Jane", None).await.unwrap();
        svc.redeem(m.id, 0, None, Some(GOODWILL_NOTE)).await.unwrap();
        let err = svc.redeem(m.id, 0, None, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::StaleMemberState);
    }

    #[tokio::test]
    async fn test_redeem_rejects_card_changed_after_read() {
        let svc = service().await;
        let m = svc.create("8175551234", "Jane", None).await.unwrap();
        svc.add_punches(m.id, 1, 1, 8).await.unwrap();
        let seen = svc.get(m.id).await.unwrap();
        assert!(seen.is_reward_ready());

        // Another session takes punches off before the reward is handed out
        svc.remove_punches(m.id, 9, 5, None).await.unwrap();

        let err = svc
            .redeem(m.id, seen.total_redeemed, Some(seen.punches), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::StaleMemberState);
        assert_eq!(err.details.unwrap()["expected_punches"], 9);

        let after = svc.get(m.id).await.unwrap();
        assert_eq!(after.punches, 4);
        assert_eq!(after.total_redeemed, 0);
        let top = &svc.member_history(m.id).await.unwrap()[0];
        assert_eq!(top.action, HistoryAction::Adjustment);
    }

    #[tokio::test]
    async fn test_operations_on_missing_member() {
        let svc = service().await;
        assert_eq!(
            svc.add_punches(42, 0, 0, 1).await.unwrap_err().code,
            ErrorCode::MemberNotFound
        );
        assert_eq!(
            svc.update_name(42, "Nobody").await.unwrap_err().code,
            ErrorCode::MemberNotFound
        );
        assert_eq!(
            svc.delete(42).await.unwrap_err().code,
            ErrorCode::MemberNotFound
        );
        assert_eq!(
            svc.member_history(42).await.unwrap_err().code,
            ErrorCode::MemberNotFound
        );
    }

    #[tokio::test]
    async fn test_rollover_writes_punch_and_redeem() {
        let svc = service_with(OverflowPolicy::Rollover).await;
        let m = member_at(&svc, "8175551234", 7, 20).await;

        let outcome = svc.add_punches(m.id, 7, 20, 5).await.unwrap();
        assert_eq!(outcome.new_balance, 3);
        assert_eq!(outcome.actual_added, 5);
        assert_eq!(outcome.carried_over, Some(3));
        assert_eq!(outcome.member.punches, 3);
        assert_eq!(outcome.member.total_punches, 25);
        assert_eq!(outcome.member.total_redeemed, 1);

        let history = svc.member_history(m.id).await.unwrap();
        assert_eq!(history[0].action, HistoryAction::Redeem);
        assert_eq!(
            history[0].note.as_deref(),
            Some("Reward redeemed, 3 punches carried over")
        );
        assert_eq!(history[1].action, HistoryAction::Punch);
        assert_eq!(history[1].punch_count, Some(5));
    }

    #[tokio::test]
    async fn test_search_guard_and_matches() {
        let svc = service().await;
        svc.create("8175551234", "Jane Doe", None).await.unwrap();
        svc.create("2145559876", "Bob", None).await.unwrap();

        assert!(svc.search("81").await.unwrap().is_empty());
        assert!(svc.search("Jane").await.unwrap().is_empty());

        let hits = svc.search("817").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Jane Doe");

        let hits = svc.search("(214) 555").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Bob");
    }

    #[tokio::test]
    async fn test_contact_updates() {
        let svc = service().await;
        let m = svc.create("8175551234", "Jane", None).await.unwrap();
        let other = svc.create("2145559876", "Bob", None).await.unwrap();

        let m2 = svc.update_phone(m.id, "972.555.0000").await.unwrap();
        assert_eq!(m2.phone, "9725550000");

        let err = svc.update_phone(other.id, "9725550000").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PhoneAlreadyExists);
        assert_eq!(err.details.unwrap()["existing_member_id"], m.id);

        let m3 = svc.update_email(m.id, Some("jane@example.com")).await.unwrap();
        assert_eq!(m3.email.as_deref(), Some("jane@example.com"));
        let m4 = svc.update_email(m.id, Some("")).await.unwrap();
        assert!(m4.email.is_none());

        let m5 = svc.update_name(m.id, " Jane D. ").await.unwrap();
        assert_eq!(m5.name, "Jane D.");
        assert!(svc.update_name(m.id, "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_cascades_history() {
        let svc = service().await;
        let m = svc.create("8175551234", "Jane", None).await.unwrap();
        svc.add_punches(m.id, 1, 1, 3).await.unwrap();
        svc.delete(m.id).await.unwrap();
        assert!(svc.list_all().await.unwrap().is_empty());
        assert!(svc.recent_history(100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_after_mixed_operations() {
        for policy in [OverflowPolicy::Cap, OverflowPolicy::Rollover] {
            let svc = service_with(policy).await;
            let mut m = svc.create("8175551234", "Jane", None).await.unwrap();
            for delta in [4, 6, 3] {
                m = svc
                    .add_punches(m.id, m.punches, m.total_punches, delta)
                    .await
                    .unwrap()
                    .member;
            }
            m = svc
                .remove_punches(m.id, m.punches, 2, None)
                .await
                .unwrap()
                .member;
            m = svc
                .redeem(m.id, m.total_redeemed, Some(m.punches), None)
                .await
                .unwrap();
            svc.add_punches(m.id, m.punches, m.total_punches, 20)
                .await
                .unwrap();

            let r = svc.reconcile(m.id).await.unwrap();
            assert!(r.consistent, "{policy}: {r:?}");
        }
    }

    #[tokio::test]
    async fn test_stats_counts_this_month() {
        let svc = service().await;
        let m = svc.create("8175551234", "Jane", None).await.unwrap();
        svc.add_punches(m.id, 1, 1, 8).await.unwrap();
        svc.redeem(m.id, 0, None, None).await.unwrap();

        let stats = svc.stats().await.unwrap();
        assert_eq!(stats.total_members, 1);
        assert_eq!(stats.punches_this_month, 9);
        assert_eq!(stats.redemptions_this_month, 1);
        assert_eq!(stats.top_members[0].id, m.id);
        assert_eq!(stats.recent_activity.len(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_attempts() {
        let svc = service().await;
        let mut calls = 0;
        let result: RepoResult<()> = svc
            .with_retry("test", || {
                calls += 1;
                async { Err(RepoError::Transient("database is locked".into())) }
            })
            .await;
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_retry_recovers_and_skips_non_transient() {
        let svc = service().await;
        let mut calls = 0;
        let result = svc
            .with_retry("test", || {
                calls += 1;
                let n = calls;
                async move {
                    if n < 2 {
                        Err(RepoError::Transient("busy".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);

        let mut calls = 0;
        let result: RepoResult<()> = svc
            .with_retry("test", || {
                calls += 1;
                async { Err(RepoError::Stale("changed".into())) }
            })
            .await;
        assert!(matches!(result, Err(RepoError::Stale(_))));
        assert_eq!(calls, 1);
    }
}

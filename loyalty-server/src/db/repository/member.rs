//! Loyalty Member Repository

use super::{RepoError, RepoResult, contains_pattern};
use shared::models::LoyaltyMember;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};

/// Extended result code for a primary key clash (the phone index reports 2067)
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";

const MEMBER_SELECT: &str = "SELECT id, phone, name, email, punches, total_punches, total_redeemed, created_at, last_visit FROM loyalty_members";

pub async fn find_all(pool: &SqlitePool) -> RepoResult<Vec<LoyaltyMember>> {
    let sql = format!("{} ORDER BY last_visit DESC, id DESC", MEMBER_SELECT);
    let rows = sqlx::query_as::<_, LoyaltyMember>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> RepoResult<Option<LoyaltyMember>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{} WHERE id = ?", MEMBER_SELECT);
    let row = sqlx::query_as::<_, LoyaltyMember>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn find_by_phone(pool: &SqlitePool, phone: &str) -> RepoResult<Option<LoyaltyMember>> {
    let sql = format!("{} WHERE phone = ?", MEMBER_SELECT);
    let row = sqlx::query_as::<_, LoyaltyMember>(&sql)
        .bind(phone)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Substring match on phone digits OR name (case-insensitive), storage order
pub async fn search(
    pool: &SqlitePool,
    phone_digits: &str,
    name_fragment: &str,
    limit: i64,
) -> RepoResult<Vec<LoyaltyMember>> {
    let sql = format!(
        "{} WHERE phone LIKE ?1 ESCAPE '\\' OR name LIKE ?2 ESCAPE '\\' LIMIT ?3",
        MEMBER_SELECT
    );
    let rows = sqlx::query_as::<_, LoyaltyMember>(&sql)
        .bind(contains_pattern(phone_digits))
        .bind(contains_pattern(name_fragment))
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Insert a member holding its first punch
pub async fn insert(
    conn: &mut SqliteConnection,
    id: i64,
    phone: &str,
    name: &str,
    email: Option<&str>,
    now: i64,
) -> RepoResult<LoyaltyMember> {
    sqlx::query(
        "INSERT INTO loyalty_members (id, phone, name, email, punches, total_punches, total_redeemed, created_at, last_visit) VALUES (?1, ?2, ?3, ?4, 1, 1, 0, ?5, ?5)",
    )
    .bind(id)
    .bind(phone)
    .bind(name)
    .bind(email)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| match RepoError::from(e) {
        // Generated id already taken: a fresh id on retry resolves it
        RepoError::Duplicate {
            message,
            store_code,
        } if store_code.as_deref() == Some(SQLITE_CONSTRAINT_PRIMARYKEY) => {
            RepoError::Transient(message)
        }
        other => other,
    })?;

    find_by_id(&mut *conn, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create member".into()))
}

/// Caller's view of the member row; `None` fields are not checked
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectedState {
    pub punches: Option<i64>,
    pub total_punches: Option<i64>,
    pub total_redeemed: Option<i64>,
}

/// New balance plus lifetime increments
#[derive(Debug, Clone, Copy)]
pub struct BalanceChange {
    pub punches: i64,
    pub add_total_punches: i64,
    pub add_total_redeemed: i64,
    /// `None` leaves `last_visit` untouched (manual corrections)
    pub visit_at: Option<i64>,
}

/// Conditional balance update (compare-and-swap on `expected`).
///
/// Fails with [`RepoError::Stale`] when the row exists but no longer matches,
/// [`RepoError::NotFound`] when it is gone.
pub async fn apply_balance(
    conn: &mut SqliteConnection,
    id: i64,
    expected: ExpectedState,
    change: BalanceChange,
) -> RepoResult<LoyaltyMember> {
    let rows = sqlx::query(
        "UPDATE loyalty_members SET punches = ?1, total_punches = total_punches + ?2, total_redeemed = total_redeemed + ?3, last_visit = COALESCE(?4, last_visit) WHERE id = ?5 AND (?6 IS NULL OR punches = ?6) AND (?7 IS NULL OR total_punches = ?7) AND (?8 IS NULL OR total_redeemed = ?8)",
    )
    .bind(change.punches)
    .bind(change.add_total_punches)
    .bind(change.add_total_redeemed)
    .bind(change.visit_at)
    .bind(id)
    .bind(expected.punches)
    .bind(expected.total_punches)
    .bind(expected.total_redeemed)
    .execute(&mut *conn)
    .await?;

    if rows.rows_affected() == 0 {
        return match find_by_id(&mut *conn, id).await? {
            Some(_) => Err(RepoError::Stale(format!("Member {id} changed"))),
            None => Err(RepoError::NotFound(format!("Member {id} not found"))),
        };
    }

    find_by_id(&mut *conn, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Member {id} not found")))
}

pub async fn update_phone(pool: &SqlitePool, id: i64, phone: &str) -> RepoResult<LoyaltyMember> {
    let rows = sqlx::query("UPDATE loyalty_members SET phone = ? WHERE id = ?")
        .bind(phone)
        .bind(id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Member {id} not found")));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Member {id} not found")))
}

pub async fn update_email(
    pool: &SqlitePool,
    id: i64,
    email: Option<&str>,
) -> RepoResult<LoyaltyMember> {
    let rows = sqlx::query("UPDATE loyalty_members SET email = ? WHERE id = ?")
        .bind(email)
        .bind(id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Member {id} not found")));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Member {id} not found")))
}

pub async fn update_name(pool: &SqlitePool, id: i64, name: &str) -> RepoResult<LoyaltyMember> {
    let rows = sqlx::query("UPDATE loyalty_members SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Member {id} not found")));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Member {id} not found")))
}

/// Hard delete; the foreign key cascade removes the member's ledger
pub async fn delete(pool: &SqlitePool, id: i64) -> RepoResult<bool> {
    let rows = sqlx::query("DELETE FROM loyalty_members WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(rows.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    async fn test_pool() -> SqlitePool {
        DbService::in_memory().await.unwrap().pool
    }

    async fn seed(pool: &SqlitePool, id: i64, phone: &str, name: &str) -> LoyaltyMember {
        let mut conn = pool.acquire().await.unwrap();
        insert(&mut conn, id, phone, name, None, 1000).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_starts_with_one_punch() {
        let pool = test_pool().await;
        let m = seed(&pool, 1, "8175551234", "Jane").await;
        assert_eq!(m.punches, 1);
        assert_eq!(m.total_punches, 1);
        assert_eq!(m.total_redeemed, 0);
        assert_eq!(m.created_at, 1000);
        assert_eq!(m.last_visit, 1000);
    }

    #[tokio::test]
    async fn test_insert_duplicate_phone() {
        let pool = test_pool().await;
        seed(&pool, 1, "8175551234", "Jane").await;
        let mut conn = pool.acquire().await.unwrap();
        let err = insert(&mut conn, 2, "8175551234", "Janet", None, 2000)
            .await
            .unwrap_err();
        match err {
            RepoError::Duplicate { store_code, .. } => {
                assert!(store_code.is_some());
            }
            other => panic!("expected Duplicate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_insert_id_clash_is_retryable_not_duplicate() {
        let pool = test_pool().await;
        seed(&pool, 1, "8175551234", "Jane").await;
        let mut conn = pool.acquire().await.unwrap();
        let err = insert(&mut conn, 1, "2145550000", "Ravi", None, 2000)
            .await
            .unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
        drop(conn);
        assert!(find_by_phone(&pool, "2145550000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_check_constraint_rejects_out_of_range_balance() {
        let pool = test_pool().await;
        seed(&pool, 1, "8175551234", "Jane").await;
        let mut conn = pool.acquire().await.unwrap();
        let err = apply_balance(
            &mut conn,
            1,
            ExpectedState::default(),
            BalanceChange {
                punches: 10,
                add_total_punches: 9,
                add_total_redeemed: 0,
                visit_at: Some(2000),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Constraint { .. }));
    }

    #[tokio::test]
    async fn test_apply_balance_checks_expected_state() {
        let pool = test_pool().await;
        seed(&pool, 1, "8175551234", "Jane").await;
        let mut conn = pool.acquire().await.unwrap();

        let change = BalanceChange {
            punches: 3,
            add_total_punches: 2,
            add_total_redeemed: 0,
            visit_at: Some(2000),
        };
        let stale = ExpectedState {
            punches: Some(4),
            ..Default::default()
        };
        let err = apply_balance(&mut conn, 1, stale, change).await.unwrap_err();
        assert!(matches!(err, RepoError::Stale(_)));

        let fresh = ExpectedState {
            punches: Some(1),
            total_punches: Some(1),
            total_redeemed: None,
        };
        let m = apply_balance(&mut conn, 1, fresh, change).await.unwrap();
        assert_eq!(m.punches, 3);
        assert_eq!(m.total_punches, 3);
        assert_eq!(m.last_visit, 2000);
    }

    #[tokio::test]
    async fn test_apply_balance_without_visit_keeps_last_visit() {
        let pool = test_pool().await;
        seed(&pool, 1, "8175551234", "Jane").await;
        let mut conn = pool.acquire().await.unwrap();
        let m = apply_balance(
            &mut conn,
            1,
            ExpectedState::default(),
            BalanceChange {
                punches: 0,
                add_total_punches: 0,
                add_total_redeemed: 0,
                visit_at: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(m.punches, 0);
        assert_eq!(m.last_visit, 1000);
    }

    #[tokio::test]
    async fn test_apply_balance_missing_member() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let err = apply_balance(
            &mut conn,
            99,
            ExpectedState::default(),
            BalanceChange {
                punches: 1,
                add_total_punches: 1,
                add_total_redeemed: 0,
                visit_at: Some(1),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_search_matches_phone_or_name() {
        let pool = test_pool().await;
        seed(&pool, 1, "8175551234", "Jane Doe").await;
        seed(&pool, 2, "2145559876", "Bob Smith").await;
        seed(&pool, 3, "9725550000", "Carla 817 Fan").await;

        let by_phone = search(&pool, "817", "817", 10).await.unwrap();
        let ids: Vec<i64> = by_phone.iter().map(|m| m.id).collect();
        assert_eq!(by_phone.len(), 2);
        assert!(ids.contains(&1));
        assert!(ids.contains(&3));

        let by_name = search(&pool, "000000000000", "bob", 10).await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, 2);
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let pool = test_pool().await;
        for i in 0..15 {
            seed(&pool, i + 1, &format!("81755500{:02}", i), "Guest").await;
        }
        let rows = search(&pool, "8175550", "8175550", 10).await.unwrap();
        assert_eq!(rows.len(), 10);
    }

    #[tokio::test]
    async fn test_search_wildcards_are_literal() {
        let pool = test_pool().await;
        seed(&pool, 1, "8175551234", "Jane").await;
        let rows = search(&pool, "555", "%", 10).await.unwrap();
        // Phone matches, the bare '%' name fragment matches nothing by itself
        assert_eq!(rows.len(), 1);
        let rows = search(&pool, "999", "_", 10).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_update_fields() {
        let pool = test_pool().await;
        seed(&pool, 1, "8175551234", "Jane").await;

        let m = update_phone(&pool, 1, "2145550000").await.unwrap();
        assert_eq!(m.phone, "2145550000");
        let m = update_email(&pool, 1, Some("jane@example.com")).await.unwrap();
        assert_eq!(m.email.as_deref(), Some("jane@example.com"));
        let m = update_email(&pool, 1, None).await.unwrap();
        assert!(m.email.is_none());
        let m = update_name(&pool, 1, "Jane D.").await.unwrap();
        assert_eq!(m.name, "Jane D.");

        assert!(matches!(
            update_name(&pool, 42, "Nobody").await,
            Err(RepoError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_phone_to_taken_number() {
        let pool = test_pool().await;
        seed(&pool, 1, "8175551234", "Jane").await;
        seed(&pool, 2, "2145550000", "Bob").await;
        let err = update_phone(&pool, 2, "8175551234").await.unwrap_err();
        assert!(matches!(err, RepoError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_delete() {
        let pool = test_pool().await;
        seed(&pool, 1, "8175551234", "Jane").await;
        assert!(delete(&pool, 1).await.unwrap());
        assert!(!delete(&pool, 1).await.unwrap());
        assert!(find_by_id(&pool, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_all_orders_by_last_visit() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        insert(&mut conn, 1, "8175551234", "Early", None, 1000).await.unwrap();
        insert(&mut conn, 2, "2145550000", "Late", None, 5000).await.unwrap();
        drop(conn);

        let all = find_all(&pool).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Late");
        assert_eq!(all[1].name, "Early");
    }

    #[tokio::test]
    async fn test_find_by_phone() {
        let pool = test_pool().await;
        seed(&pool, 1, "8175551234", "Jane").await;
        assert_eq!(
            find_by_phone(&pool, "8175551234").await.unwrap().unwrap().id,
            1
        );
        assert!(find_by_phone(&pool, "0000000000").await.unwrap().is_none());
    }
}

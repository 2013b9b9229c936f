//! Loyalty History Repository
//!
//! Append-only: entries are inserted with their member write and only ever
//! removed by the member delete cascade.

use super::{RepoError, RepoResult};
use shared::models::{HistoryAction, HistoryWithMember, LoyaltyHistory};
use sqlx::{SqliteConnection, SqlitePool};

const HISTORY_SELECT: &str =
    "SELECT id, member_id, action, punch_count, note, created_at FROM loyalty_history";

/// Append a ledger entry; ids follow insertion order
pub async fn append(
    conn: &mut SqliteConnection,
    member_id: i64,
    action: HistoryAction,
    punch_count: Option<i64>,
    note: Option<&str>,
    created_at: i64,
) -> RepoResult<LoyaltyHistory> {
    let result = sqlx::query(
        "INSERT INTO loyalty_history (member_id, action, punch_count, note, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(member_id)
    .bind(action)
    .bind(punch_count)
    .bind(note)
    .bind(created_at)
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    let sql = format!("{} WHERE id = ?", HISTORY_SELECT);
    sqlx::query_as::<_, LoyaltyHistory>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to append history entry".into()))
}

/// One member's ledger, newest first
pub async fn find_by_member(pool: &SqlitePool, member_id: i64) -> RepoResult<Vec<LoyaltyHistory>> {
    let sql = format!(
        "{} WHERE member_id = ? ORDER BY created_at DESC, id DESC",
        HISTORY_SELECT
    );
    let rows = sqlx::query_as::<_, LoyaltyHistory>(&sql)
        .bind(member_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// One member's ledger, oldest first (replay order)
pub async fn find_by_member_chronological(
    pool: &SqlitePool,
    member_id: i64,
) -> RepoResult<Vec<LoyaltyHistory>> {
    let sql = format!(
        "{} WHERE member_id = ? ORDER BY created_at ASC, id ASC",
        HISTORY_SELECT
    );
    let rows = sqlx::query_as::<_, LoyaltyHistory>(&sql)
        .bind(member_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Latest entries across all members, with member display fields
pub async fn find_recent(pool: &SqlitePool, limit: i64) -> RepoResult<Vec<HistoryWithMember>> {
    let rows = sqlx::query_as::<_, HistoryWithMember>(
        "SELECT h.id, h.member_id, m.name AS member_name, m.phone AS member_phone, h.action, h.punch_count, h.note, h.created_at FROM loyalty_history h JOIN loyalty_members m ON m.id = h.member_id ORDER BY h.created_at DESC, h.id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Full ledger, oldest first
pub async fn find_all(pool: &SqlitePool) -> RepoResult<Vec<LoyaltyHistory>> {
    let sql = format!("{} ORDER BY created_at ASC, id ASC", HISTORY_SELECT);
    let rows = sqlx::query_as::<_, LoyaltyHistory>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

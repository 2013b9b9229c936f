use rand::Rng;

/// Ids count milliseconds from 2024-01-01 00:00:00 UTC
const ID_EPOCH_MS: i64 = 1_704_067_200_000;
const TIMESTAMP_MASK: i64 = (1 << 41) - 1;
const RANDOM_BITS: u32 = 12;

/// Current UTC timestamp (milliseconds)
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// New member id.
///
/// 41 bits of time above 12 random bits, so ids stay below
/// `Number.MAX_SAFE_INTEGER` for the admin UI and sort by creation time.
pub fn snowflake_id() -> i64 {
    let random = rand::thread_rng().gen_range(0..(1 << RANDOM_BITS));
    compose_id(now_millis(), random)
}

fn compose_id(at_ms: i64, random: i64) -> i64 {
    let ts = (at_ms - ID_EPOCH_MS) & TIMESTAMP_MASK;
    (ts << RANDOM_BITS) | (random & ((1 << RANDOM_BITS) - 1))
}

use uuid::Uuid;

/// Generate a time-ordered entity ID.
///
/// UUIDv7 embeds a millisecond timestamp in the high bits, so IDs sort
/// by creation time and newest-first listings are a reverse sort on
/// the ID itself.
pub fn db_id() -> Uuid {
    Uuid::now_v7()
}

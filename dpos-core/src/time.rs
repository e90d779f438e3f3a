//! Millisecond UNIX timestamps, used for block times and message logging.

pub type Timestamp = i64;

/// Generates a timestamp the same way the node does, for block proposal and
/// log timestamps alike.
pub fn get_timestamp() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Timestamp
}

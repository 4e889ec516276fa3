use uuid::Uuid;

/// Timestamp-ordered identifier used for confirmed rows and for the
/// placeholder ids carried by pending-create rows.
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

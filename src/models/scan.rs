use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Created at most once per booking; its existence is the sole authority for
/// "already checked in".
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScanRecord {
    pub booking_id: Uuid,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyTicketInput {
    pub booking_id: Uuid,
}

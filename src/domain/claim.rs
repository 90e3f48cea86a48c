use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueClaim {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub claimant_id: Uuid,
    pub status: ClaimStatus,
    /// Serialized [`crate::domain::ClaimSubmission`] snapshot with
    /// credential material stripped. Kept for the admin review workflow.
    pub submission_snapshot: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

impl ClaimStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ClaimStatus::Pending => "Pending",
            ClaimStatus::Approved => "Approved",
            ClaimStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(ClaimStatus::Pending),
            "Approved" => Some(ClaimStatus::Approved),
            "Rejected" => Some(ClaimStatus::Rejected),
            _ => None,
        }
    }
}

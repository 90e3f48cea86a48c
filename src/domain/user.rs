use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    User,
    VenueManager,
    Admin,
}

impl UserRole {
    /// The role a user is promoted to after their first paid submission.
    /// Promotion is monotonic: `User` moves up, `VenueManager` stays,
    /// `Admin` is never touched by the payment flow.
    pub fn promoted_for_paid_action(self) -> UserRole {
        match self {
            UserRole::User => UserRole::VenueManager,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::User => "User",
            UserRole::VenueManager => "VenueManager",
            UserRole::Admin => "Admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "User" => Some(UserRole::User),
            "VenueManager" => Some(UserRole::VenueManager),
            "Admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current submission schema version. Bump when the payload shape
/// changes; decoding rejects versions it does not know.
pub const SUBMISSION_VERSION: u32 = 1;

/// Versioned wrapper around the submission stored on a payment record.
/// The version travels with the data so records written before a schema
/// change fail loudly instead of deserializing into the wrong shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionEnvelope {
    pub version: u32,
    pub submission: Submission,
}

impl SubmissionEnvelope {
    pub fn new(submission: Submission) -> Self {
        Self {
            version: SUBMISSION_VERSION,
            submission,
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decode a stored envelope, rejecting unknown schema versions.
    pub fn decode(raw: &str) -> Result<Self, SubmissionDecodeError> {
        let envelope: SubmissionEnvelope =
            serde_json::from_str(raw).map_err(SubmissionDecodeError::Malformed)?;
        if envelope.version != SUBMISSION_VERSION {
            return Err(SubmissionDecodeError::UnknownVersion(envelope.version));
        }
        Ok(envelope)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionDecodeError {
    #[error("malformed submission payload: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("unknown submission schema version {0}")]
    UnknownVersion(u32),
}

/// What the paying user asked for: a brand-new listing or a claim on an
/// existing one. The two branches are mutually exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Submission {
    New(NewVenueSubmission),
    Claim(ClaimSubmission),
}

impl Submission {
    pub fn mode(&self) -> SubmissionMode {
        match self {
            Submission::New(_) => SubmissionMode::New,
            Submission::Claim(_) => SubmissionMode::Claim,
        }
    }

    pub fn user(&self) -> &UserFields {
        match self {
            Submission::New(s) => &s.user,
            Submission::Claim(s) => &s.user,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    New,
    Claim,
}

impl std::fmt::Display for SubmissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionMode::New => write!(f, "new"),
            SubmissionMode::Claim => write!(f, "claim"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVenueSubmission {
    pub venue: VenueFields,
    pub user: UserFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<TrackingMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimSubmission {
    pub venue_id: Uuid,
    pub user: UserFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<TrackingMeta>,
}

impl ClaimSubmission {
    /// Copy of the submission safe to persist on the claim row:
    /// credential material is stripped, everything else is kept for the
    /// admin review workflow.
    pub fn snapshot(&self) -> ClaimSubmission {
        let mut copy = self.clone();
        copy.user.password = None;
        copy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueFields {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
}

/// Identity half of a submission. Either `user_id` points at an
/// authenticated account, or `email` (+ `password` for fresh
/// registrations) drives find-or-create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub address: String,
    pub district: Option<String>,
    pub capacity: Option<i64>,
    pub venue_type: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub paid: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub subscription_reference: Option<String>,
    pub manager_id: Uuid,
    pub status: VenueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VenueStatus {
    Pending,
    Published,
    Hidden,
    Draft,
    Active,
}

impl VenueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VenueStatus::Pending => "Pending",
            VenueStatus::Published => "Published",
            VenueStatus::Hidden => "Hidden",
            VenueStatus::Draft => "Draft",
            VenueStatus::Active => "Active",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(VenueStatus::Pending),
            "Published" => Some(VenueStatus::Published),
            "Hidden" => Some(VenueStatus::Hidden),
            "Draft" => Some(VenueStatus::Draft),
            "Active" => Some(VenueStatus::Active),
            _ => None,
        }
    }
}

/// Derive a URL slug from a venue name: fold diacritics to ASCII,
/// lowercase, join alphanumeric runs with single hyphens, and suffix
/// with the first 8 hex chars of a fresh UUID. The random suffix keeps
/// slugs unique without a retry loop.
pub fn derive_slug(name: &str) -> String {
    let base = name
        .to_lowercase()
        .chars()
        .map(|c| if fold_diacritic(c).is_ascii_alphanumeric() { fold_diacritic(c) } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", base, &suffix[..8])
}

// Covers Czech plus the common Latin accents seen in listing names.
fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ą' => 'a',
        'č' | 'ç' | 'ć' => 'c',
        'ď' => 'd',
        'é' | 'è' | 'ê' | 'ë' | 'ě' | 'ę' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ľ' | 'ĺ' | 'ł' => 'l',
        'ň' | 'ñ' | 'ń' => 'n',
        'ó' | 'ò' | 'ô' | 'ö' | 'ő' => 'o',
        'ř' => 'r',
        'š' | 'ś' => 's',
        'ť' => 't',
        'ú' | 'ù' | 'û' | 'ü' | 'ů' | 'ű' => 'u',
        'ý' | 'ÿ' => 'y',
        'ž' | 'ź' | 'ż' => 'z',
        other => other,
    }
}

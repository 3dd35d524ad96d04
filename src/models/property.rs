use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inquiry counters maintained by the listings side; absent counts read as 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInquiries {
    pub whatsapp: Option<u64>,
    pub email: Option<u64>,
    pub calls: Option<u64>,
}

impl PropertyInquiries {
    pub fn total(&self) -> u64 {
        self.whatsapp.unwrap_or(0) + self.email.unwrap_or(0) + self.calls.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub location: String,
    pub status: String,
    pub price: f64,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub inquiries: PropertyInquiries,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProperty {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub location: String,
    pub status: String,
    pub price: f64,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub inquiries: PropertyInquiries,
}

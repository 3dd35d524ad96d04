use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::AgentAnalytics;

/// A real-estate agent and the analytics embedded in their record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Absent until the first interaction is recorded
    pub analytics: Option<AgentAnalytics>,
    /// Bumped on every analytics save
    pub analytics_revision: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAgent {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

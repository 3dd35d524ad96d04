//! Row shapes shared by the SQL backends

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::analytics::AgentAnalytics;
use crate::models::{Agent, Property, PropertyInquiries};

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).with_context(|| format!("timestamp {secs} out of range"))
}

fn count(value: Option<i64>) -> Option<u64> {
    value.map(|v| v.max(0) as u64)
}

#[derive(Debug, FromRow)]
pub(crate) struct AgentRow {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub analytics: Option<String>,
    pub analytics_revision: i64,
    pub created_at: i64,
}

impl TryFrom<AgentRow> for Agent {
    type Error = anyhow::Error;

    fn try_from(row: AgentRow) -> Result<Self> {
        let analytics = row
            .analytics
            .as_deref()
            .map(serde_json::from_str::<AgentAnalytics>)
            .transpose()
            .with_context(|| format!("corrupt analytics document for agent {}", row.id))?;

        Ok(Agent {
            created_at: timestamp(row.created_at)?,
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            analytics,
            analytics_revision: row.analytics_revision,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PropertyRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub location: String,
    pub status: String,
    pub price: f64,
    pub thumbnail: Option<String>,
    pub created_at: i64,
    pub inquiries_whatsapp: Option<i64>,
    pub inquiries_email: Option<i64>,
    pub inquiries_calls: Option<i64>,
}

impl TryFrom<PropertyRow> for Property {
    type Error = anyhow::Error;

    fn try_from(row: PropertyRow) -> Result<Self> {
        Ok(Property {
            created_at: timestamp(row.created_at)?,
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            location: row.location,
            status: row.status,
            price: row.price,
            thumbnail: row.thumbnail,
            inquiries: PropertyInquiries {
                whatsapp: count(row.inquiries_whatsapp),
                email: count(row.inquiries_email),
                calls: count(row.inquiries_calls),
            },
        })
    }
}

pub(crate) fn now_secs() -> i64 {
    Utc::now().timestamp()
}

pub(crate) fn optional_count(value: Option<u64>) -> Option<i64> {
    value.map(|v| i64::try_from(v).unwrap_or(i64::MAX))
}

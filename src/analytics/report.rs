//! Analytics reporter: derives the read model from an agent's counters and
//! their property listings. Never writes.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::analytics::clock::Clock;
use crate::analytics::error::AnalyticsError;
use crate::analytics::models::{AgentAnalytics, ChannelCounters, Counter, InteractionType};
use crate::config::AnalyticsConfig;
use crate::models::Property;
use crate::storage::Storage;

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    /// Number of history entries projected into `recent_interactions`
    pub recent_limit: usize,
    /// Trailing window covered by `daily_analytics`
    pub daily_window: Duration,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            recent_limit: 10,
            daily_window: Duration::days(30),
        }
    }
}

impl From<&AnalyticsConfig> for ReportOptions {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            recent_limit: config.recent_limit,
            daily_window: Duration::try_days(config.daily_window_days)
                .unwrap_or(Duration::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub summary: ReportSummary,
    pub property_analytics: Vec<PropertyAnalytics>,
    pub recent_interactions: Vec<RecentInteraction>,
    pub daily_analytics: Vec<DailyAnalytics>,
    pub properties_by_status: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub profile_views: Counter,
    pub interactions: ChannelCounters,
    pub total_interactions: Counter,
    pub total_properties: usize,
    pub total_property_inquiries: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyAnalytics {
    pub id: String,
    pub title: String,
    pub location: String,
    pub status: String,
    pub price: f64,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub inquiries: InquiryRollup,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InquiryRollup {
    pub whatsapp: u64,
    pub email: u64,
    pub calls: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentInteraction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InteractionType,
    pub timestamp: DateTime<Utc>,
    pub ip: Option<String>,
    pub property_id: Option<String>,
}

/// Per-day event counts, dates are UTC calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAnalytics {
    pub date: NaiveDate,
    pub views: u64,
    pub whatsapp: u64,
    pub email: u64,
    pub phone: u64,
}

impl DailyAnalytics {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            views: 0,
            whatsapp: 0,
            email: 0,
            phone: 0,
        }
    }

    fn count(&mut self, kind: InteractionType) {
        match kind {
            InteractionType::View => self.views += 1,
            InteractionType::Whatsapp => self.whatsapp += 1,
            InteractionType::Email => self.email += 1,
            InteractionType::Phone => self.phone += 1,
        }
    }
}

fn property_rollup(property: &Property) -> PropertyAnalytics {
    let inquiries = &property.inquiries;
    PropertyAnalytics {
        id: property.id.clone(),
        title: property.title.clone(),
        location: property.location.clone(),
        status: property.status.clone(),
        price: property.price,
        thumbnail: property.thumbnail.clone(),
        created_at: property.created_at,
        inquiries: InquiryRollup {
            whatsapp: inquiries.whatsapp.unwrap_or(0),
            email: inquiries.email.unwrap_or(0),
            calls: inquiries.calls.unwrap_or(0),
            total: inquiries.total(),
        },
    }
}

/// Bucket events newer than `now - window` by UTC date, ascending.
/// Days without events are omitted.
pub fn daily_series(
    analytics: &AgentAnalytics,
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<DailyAnalytics> {
    // Windows reaching past the representable range include everything
    let cutoff = now
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut days: BTreeMap<NaiveDate, DailyAnalytics> = BTreeMap::new();

    for event in analytics.last_interactions.iter().filter(|e| e.timestamp > cutoff) {
        let date = event.timestamp.date_naive();
        days.entry(date)
            .or_insert_with(|| DailyAnalytics::empty(date))
            .count(event.kind);
    }

    days.into_values().collect()
}

/// Build the report from an analytics snapshot and the agent's properties
pub fn build_report(
    analytics: &AgentAnalytics,
    properties: &[Property],
    now: DateTime<Utc>,
    options: &ReportOptions,
) -> AnalyticsReport {
    let property_analytics: Vec<PropertyAnalytics> =
        properties.iter().map(property_rollup).collect();

    let total_property_inquiries: u64 = property_analytics.iter().map(|p| p.inquiries.total).sum();

    let recent_interactions = analytics
        .last_interactions
        .iter()
        .take(options.recent_limit)
        .map(|event| RecentInteraction {
            id: event.id.clone(),
            kind: event.kind,
            timestamp: event.timestamp,
            ip: event.ip.clone(),
            property_id: event.property_id.clone(),
        })
        .collect();

    let mut properties_by_status = BTreeMap::new();
    for property in properties {
        *properties_by_status.entry(property.status.clone()).or_insert(0) += 1;
    }

    AnalyticsReport {
        summary: ReportSummary {
            profile_views: analytics.profile_views,
            interactions: analytics.interactions,
            total_interactions: analytics.interactions.combined(),
            total_properties: properties.len(),
            total_property_inquiries,
        },
        property_analytics,
        recent_interactions,
        daily_analytics: daily_series(analytics, now, options.daily_window),
        properties_by_status,
    }
}

/// Loads an agent's properties and shapes the report
#[derive(Clone)]
pub struct AnalyticsReporter {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    options: ReportOptions,
}

impl AnalyticsReporter {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>, config: &AnalyticsConfig) -> Self {
        Self {
            storage,
            clock,
            options: ReportOptions::from(config),
        }
    }

    /// On-demand report for a stored agent
    ///
    /// Agents that never recorded an interaction report the zero state.
    pub async fn report(&self, agent_id: &str) -> Result<AnalyticsReport, AnalyticsError> {
        let agent = self
            .storage
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| AnalyticsError::AgentNotFound(agent_id.to_string()))?;

        let analytics = agent.analytics.unwrap_or_else(AgentAnalytics::new);
        self.build(agent_id, &analytics).await
    }

    /// Report for a known analytics snapshot; fails as a whole if the
    /// property fetch fails
    pub async fn build(
        &self,
        agent_id: &str,
        analytics: &AgentAnalytics,
    ) -> Result<AnalyticsReport, AnalyticsError> {
        let properties = self.storage.list_properties_by_owner(agent_id).await?;
        Ok(build_report(analytics, &properties, self.clock.now(), &self.options))
    }
}

//! Data models for agent profile analytics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::analytics::error::AnalyticsError;

/// A recordable interaction against an agent's public profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    View,
    Whatsapp,
    Email,
    Phone,
}

impl InteractionType {
    pub const ALL: [InteractionType; 4] = [
        InteractionType::View,
        InteractionType::Whatsapp,
        InteractionType::Email,
        InteractionType::Phone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::View => "view",
            InteractionType::Whatsapp => "whatsapp",
            InteractionType::Email => "email",
            InteractionType::Phone => "phone",
        }
    }

    /// Contact channel for click-through interactions, `None` for profile views
    pub fn channel(&self) -> Option<Channel> {
        match self {
            InteractionType::View => None,
            InteractionType::Whatsapp => Some(Channel::Whatsapp),
            InteractionType::Email => Some(Channel::Email),
            InteractionType::Phone => Some(Channel::Phone),
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(InteractionType::View),
            "whatsapp" => Ok(InteractionType::Whatsapp),
            "email" => Ok(InteractionType::Email),
            "phone" => Ok(InteractionType::Phone),
            other => Err(AnalyticsError::InvalidInteractionType(other.to_string())),
        }
    }
}

/// Contact channels counted under `interactions`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Whatsapp,
    Email,
    Phone,
}

/// Running totals for one counter pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub unique: u64,
}

impl Counter {
    /// Bump `total` always and `unique` only for first-seen interactions
    pub fn bump(&mut self, unique: bool) {
        self.total += 1;
        if unique {
            self.unique += 1;
        }
    }
}

/// Per-channel counters; every channel is always present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCounters {
    #[serde(default)]
    pub whatsapp: Counter,
    #[serde(default)]
    pub email: Counter,
    #[serde(default)]
    pub phone: Counter,
}

impl ChannelCounters {
    pub fn get(&self, channel: Channel) -> &Counter {
        match channel {
            Channel::Whatsapp => &self.whatsapp,
            Channel::Email => &self.email,
            Channel::Phone => &self.phone,
        }
    }

    pub fn get_mut(&mut self, channel: Channel) -> &mut Counter {
        match channel {
            Channel::Whatsapp => &mut self.whatsapp,
            Channel::Email => &mut self.email,
            Channel::Phone => &mut self.phone,
        }
    }

    /// Sum of all channel counters
    pub fn combined(&self) -> Counter {
        Counter {
            total: self.whatsapp.total + self.email.total + self.phone.total,
            unique: self.whatsapp.unique + self.email.unique + self.phone.unique,
        }
    }
}

/// A single recorded interaction kept in the bounded history log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: InteractionType,

    pub timestamp: DateTime<Utc>,

    /// Originating network address
    #[serde(default)]
    pub ip: Option<String>,

    #[serde(default)]
    pub property_id: Option<String>,

    /// Audit only, not used in aggregation
    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub referrer: Option<String>,
}

impl InteractionEvent {
    pub fn new(
        kind: InteractionType,
        timestamp: DateTime<Utc>,
        property_id: Option<String>,
        context: &RequestContext,
    ) -> Self {
        Self {
            id: crate::models::generate_id(),
            kind,
            timestamp,
            ip: context.ip.clone(),
            property_id,
            user_agent: context.user_agent.clone(),
            referrer: context.referrer.clone(),
        }
    }
}

/// Analytics embedded in an agent record
///
/// Counters are monotonic ledgers over the agent's whole history while
/// `last_interactions` is a bounded most-recent-first log, so the two may
/// diverge once old events are evicted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAnalytics {
    #[serde(default)]
    pub profile_views: Counter,

    #[serde(default)]
    pub interactions: ChannelCounters,

    #[serde(default)]
    pub last_interactions: Vec<InteractionEvent>,
}

impl AgentAnalytics {
    /// Zero state used the first time an agent's analytics are touched
    pub fn new() -> Self {
        Self::default()
    }
}

/// Best-effort request metadata supplied by the transport layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl RequestContext {
    pub fn from_ip(ip: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interaction_types() {
        for kind in InteractionType::ALL {
            assert_eq!(kind.as_str().parse::<InteractionType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let err = "click".parse::<InteractionType>().unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidInteractionType(ref t) if t == "click"));
        assert!("VIEW".parse::<InteractionType>().is_err());
    }

    #[test]
    fn test_zero_state() {
        let analytics = AgentAnalytics::new();
        assert_eq!(analytics.profile_views, Counter::default());
        assert_eq!(analytics.interactions.combined(), Counter::default());
        assert!(analytics.last_interactions.is_empty());
    }

    #[test]
    fn test_partial_document_fills_missing_channels() {
        let analytics: AgentAnalytics = serde_json::from_str(
            r#"{"profileViews":{"total":4},"interactions":{"email":{"total":2,"unique":1}}}"#,
        )
        .unwrap();

        assert_eq!(analytics.profile_views, Counter { total: 4, unique: 0 });
        assert_eq!(analytics.interactions.email, Counter { total: 2, unique: 1 });
        assert_eq!(analytics.interactions.phone, Counter::default());
        assert!(analytics.last_interactions.is_empty());
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = InteractionEvent {
            id: "abc".to_string(),
            kind: InteractionType::Whatsapp,
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            ip: Some("1.1.1.1".to_string()),
            property_id: Some("p1".to_string()),
            user_agent: None,
            referrer: None,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "whatsapp");
        assert_eq!(value["propertyId"], "p1");
        assert_eq!(value["timestamp"], "1970-01-01T00:00:00Z");
    }
}

//! Event recorder: dedup check, counter update and bounded history append
//!
//! The state transition itself is the pure [`apply_interaction`]; the
//! [`EventRecorder`] wraps it with the load / persist cycle against storage.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::analytics::clock::Clock;
use crate::analytics::error::AnalyticsError;
use crate::analytics::models::{AgentAnalytics, InteractionEvent, InteractionType, RequestContext};
use crate::analytics::report::{AnalyticsReport, AnalyticsReporter};
use crate::config::{AnalyticsConfig, WriteMode};
use crate::storage::{Storage, StorageError};

/// Tunables for the state transition
#[derive(Debug, Clone, Copy)]
pub struct RecordPolicy {
    /// Lookback used to decide whether an interaction is a repeat
    pub dedup_window: Duration,
    /// Maximum length of `last_interactions`
    pub history_limit: usize,
}

impl Default for RecordPolicy {
    fn default() -> Self {
        Self {
            dedup_window: Duration::minutes(60),
            history_limit: 50,
        }
    }
}

impl From<&AnalyticsConfig> for RecordPolicy {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            dedup_window: Duration::try_minutes(config.dedup_window_mins)
                .unwrap_or(Duration::MAX),
            history_limit: config.history_limit,
        }
    }
}

/// Result of applying one interaction to an analytics state
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Repeated view inside the window; nothing changes
    Duplicate,
    /// The next state to persist
    Recorded(AgentAnalytics),
}

/// Whether `history` holds an event of the same type from the same address
/// newer than `now - window`. Two absent addresses count as the same address.
pub fn find_recent_duplicate<'a>(
    history: &'a [InteractionEvent],
    kind: InteractionType,
    ip: Option<&str>,
    now: DateTime<Utc>,
    window: Duration,
) -> Option<&'a InteractionEvent> {
    let cutoff = now
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    history.iter().find(|event| {
        event.kind == kind && event.ip.as_deref() == ip && event.timestamp > cutoff
    })
}

/// Compute the next analytics state for `event`
///
/// Views short-circuit entirely on a recent duplicate. Contact-channel clicks
/// are always logged and always bump `total`; a duplicate only suppresses the
/// `unique` increment.
pub fn apply_interaction(
    current: &AgentAnalytics,
    event: InteractionEvent,
    now: DateTime<Utc>,
    policy: &RecordPolicy,
) -> RecordOutcome {
    let is_duplicate = find_recent_duplicate(
        &current.last_interactions,
        event.kind,
        event.ip.as_deref(),
        now,
        policy.dedup_window,
    )
    .is_some();

    if event.kind == InteractionType::View && is_duplicate {
        return RecordOutcome::Duplicate;
    }

    let mut next = current.clone();
    match event.kind.channel() {
        None => next.profile_views.bump(!is_duplicate),
        Some(channel) => next.interactions.get_mut(channel).bump(!is_duplicate),
    }

    next.last_interactions.insert(0, event);
    next.last_interactions.truncate(policy.history_limit);

    RecordOutcome::Recorded(next)
}

/// Records interactions for agents and returns the refreshed report
#[derive(Clone)]
pub struct EventRecorder {
    storage: Arc<dyn Storage>,
    reporter: AnalyticsReporter,
    clock: Arc<dyn Clock>,
    policy: RecordPolicy,
    write_mode: WriteMode,
    max_attempts: u32,
}

impl EventRecorder {
    pub fn new(
        storage: Arc<dyn Storage>,
        reporter: AnalyticsReporter,
        clock: Arc<dyn Clock>,
        config: &AnalyticsConfig,
    ) -> Self {
        Self {
            storage,
            reporter,
            clock,
            policy: RecordPolicy::from(config),
            write_mode: config.write_mode,
            max_attempts: config.cas_max_retries.saturating_add(1),
        }
    }

    pub fn reporter(&self) -> &AnalyticsReporter {
        &self.reporter
    }

    /// Record one interaction of `kind` for `agent_id`
    ///
    /// The type is validated before anything is read, so a rejected request
    /// never touches storage.
    pub async fn record(
        &self,
        agent_id: &str,
        kind: Option<&str>,
        property_id: Option<String>,
        context: RequestContext,
    ) -> Result<AnalyticsReport, AnalyticsError> {
        let kind: InteractionType = kind
            .ok_or(AnalyticsError::MissingInteractionType)?
            .parse()?;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let agent = self
                .storage
                .get_agent(agent_id)
                .await?
                .ok_or_else(|| AnalyticsError::AgentNotFound(agent_id.to_string()))?;
            let current = agent.analytics.unwrap_or_else(AgentAnalytics::new);

            let now = self.clock.now();
            let event = InteractionEvent::new(kind, now, property_id.clone(), &context);

            let next = match apply_interaction(&current, event, now, &self.policy) {
                RecordOutcome::Duplicate => {
                    debug!(
                        agent_id,
                        ip = ?context.ip,
                        "repeated profile view inside dedup window, skipping"
                    );
                    return self.reporter.build(agent_id, &current).await;
                }
                RecordOutcome::Recorded(next) => next,
            };

            let expected_revision = match self.write_mode {
                WriteMode::LastWriteWins => None,
                WriteMode::CompareAndSwap => Some(agent.analytics_revision),
            };

            match self
                .storage
                .save_agent_analytics(agent_id, &next, expected_revision)
                .await
            {
                Ok(_) => return self.reporter.build(agent_id, &next).await,
                Err(StorageError::Conflict) if attempt < self.max_attempts => {
                    warn!(agent_id, attempt, "analytics revision moved underneath us, retrying");
                }
                Err(StorageError::Conflict) => {
                    return Err(AnalyticsError::Contention {
                        agent_id: agent_id.to_string(),
                        attempts: attempt,
                    });
                }
                Err(StorageError::NotFound) => {
                    return Err(AnalyticsError::AgentNotFound(agent_id.to_string()));
                }
                Err(StorageError::Other(e)) => return Err(AnalyticsError::Storage(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::models::Counter;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn event(kind: InteractionType, ip: &str, at: DateTime<Utc>) -> InteractionEvent {
        InteractionEvent::new(kind, at, None, &RequestContext::from_ip(ip))
    }

    fn record(
        state: &AgentAnalytics,
        kind: InteractionType,
        ip: &str,
        at: DateTime<Utc>,
    ) -> AgentAnalytics {
        match apply_interaction(state, event(kind, ip, at), at, &RecordPolicy::default()) {
            RecordOutcome::Recorded(next) => next,
            RecordOutcome::Duplicate => state.clone(),
        }
    }

    #[test]
    fn test_repeated_view_short_circuits() {
        let state = AgentAnalytics::new();
        let state = record(&state, InteractionType::View, "1.1.1.1", t0());
        assert_eq!(state.profile_views, Counter { total: 1, unique: 1 });
        assert_eq!(state.last_interactions.len(), 1);

        let outcome = apply_interaction(
            &state,
            event(InteractionType::View, "1.1.1.1", t0() + Duration::minutes(10)),
            t0() + Duration::minutes(10),
            &RecordPolicy::default(),
        );
        assert_eq!(outcome, RecordOutcome::Duplicate);
    }

    #[test]
    fn test_repeated_click_still_counts_total() {
        let state = record(&AgentAnalytics::new(), InteractionType::View, "1.1.1.1", t0());
        let at = t0() + Duration::minutes(1);
        let state = record(&state, InteractionType::Whatsapp, "1.1.1.1", at);
        assert_eq!(state.interactions.whatsapp, Counter { total: 1, unique: 1 });
        assert_eq!(state.last_interactions.len(), 2);

        let at = t0() + Duration::minutes(2);
        let state = record(&state, InteractionType::Whatsapp, "1.1.1.1", at);
        assert_eq!(state.interactions.whatsapp, Counter { total: 2, unique: 1 });
        assert_eq!(state.last_interactions.len(), 3);
        assert_eq!(state.profile_views, Counter { total: 1, unique: 1 });
    }

    #[test]
    fn test_window_expiry() {
        let state = record(&AgentAnalytics::new(), InteractionType::View, "1.1.1.1", t0());
        let state = record(&state, InteractionType::View, "1.1.1.1", t0() + Duration::minutes(61));
        assert_eq!(state.profile_views, Counter { total: 2, unique: 2 });
        assert_eq!(state.last_interactions.len(), 2);
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let state = record(&AgentAnalytics::new(), InteractionType::Email, "1.1.1.1", t0());
        let state = record(&state, InteractionType::Email, "1.1.1.1", t0() + Duration::minutes(60));
        assert_eq!(state.interactions.email, Counter { total: 2, unique: 2 });
    }

    #[test]
    fn test_dedup_keys_on_ip_and_type() {
        let state = record(&AgentAnalytics::new(), InteractionType::View, "1.1.1.1", t0());
        let state = record(&state, InteractionType::View, "2.2.2.2", t0());
        assert_eq!(state.profile_views, Counter { total: 2, unique: 2 });

        let state = record(&state, InteractionType::Phone, "1.1.1.1", t0());
        let state = record(&state, InteractionType::Email, "1.1.1.1", t0());
        assert_eq!(state.interactions.phone, Counter { total: 1, unique: 1 });
        assert_eq!(state.interactions.email, Counter { total: 1, unique: 1 });
    }

    #[test]
    fn test_absent_addresses_match_each_other() {
        let anonymous =
            |at| InteractionEvent::new(InteractionType::View, at, None, &RequestContext::default());
        let policy = RecordPolicy::default();

        let first = apply_interaction(&AgentAnalytics::new(), anonymous(t0()), t0(), &policy);
        let state = match first {
            RecordOutcome::Recorded(next) => next,
            RecordOutcome::Duplicate => panic!("first view must be recorded"),
        };
        let outcome = apply_interaction(&state, anonymous(t0()), t0(), &policy);
        assert_eq!(outcome, RecordOutcome::Duplicate);
    }

    #[test]
    fn test_history_is_bounded_most_recent_first() {
        let mut state = AgentAnalytics::new();
        for i in 0..51 {
            let ip = format!("10.0.0.{i}");
            state = record(&state, InteractionType::View, &ip, t0() + Duration::seconds(i));
        }

        assert_eq!(state.last_interactions.len(), 50);
        assert_eq!(state.last_interactions[0].ip.as_deref(), Some("10.0.0.50"));
        assert_eq!(state.last_interactions[49].ip.as_deref(), Some("10.0.0.1"));
        // Counters keep the full history even after eviction
        assert_eq!(state.profile_views, Counter { total: 51, unique: 51 });
    }

    #[test]
    fn test_unique_never_exceeds_total() {
        let mut state = AgentAnalytics::new();
        let kinds = InteractionType::ALL;
        for i in 0..200i64 {
            let kind = kinds[(i % 4) as usize];
            let ip = format!("10.0.0.{}", i % 3);
            state = record(&state, kind, &ip, t0() + Duration::minutes(i * 7));
        }

        assert!(state.profile_views.unique <= state.profile_views.total);
        let channels = &state.interactions;
        for counter in [channels.whatsapp, channels.email, channels.phone] {
            assert!(counter.unique <= counter.total);
        }
    }

    #[test]
    fn test_input_state_is_not_mutated() {
        let before = record(&AgentAnalytics::new(), InteractionType::Phone, "1.1.1.1", t0());
        let snapshot = before.clone();
        let _ = record(&before, InteractionType::Phone, "1.1.1.1", t0());
        assert_eq!(before, snapshot);
    }
}

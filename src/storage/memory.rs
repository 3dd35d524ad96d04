use crate::analytics::AgentAnalytics;
use crate::models::{Agent, NewAgent, NewProperty, Property};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Process-local storage backed by concurrent maps
///
/// Every analytics save happens under the agent's shard lock, so a
/// conditional save is a true compare-and-swap.
#[derive(Default)]
pub struct MemoryStorage {
    agents: DashMap<String, Agent>,
    properties: DashMap<String, Property>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn create_agent(&self, agent: &NewAgent) -> StorageResult<Agent> {
        match self.agents.entry(agent.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict),
            Entry::Vacant(slot) => {
                let created = Agent {
                    id: agent.id.clone(),
                    name: agent.name.clone(),
                    email: agent.email.clone(),
                    phone: agent.phone.clone(),
                    analytics: None,
                    analytics_revision: 0,
                    created_at: Utc::now(),
                };
                slot.insert(created.clone());
                Ok(created)
            }
        }
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>> {
        Ok(self.agents.get(id).map(|entry| entry.value().clone()))
    }

    async fn list_agents(&self) -> Result<Vec<Agent>> {
        let mut agents: Vec<Agent> = self
            .agents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        agents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(agents)
    }

    async fn save_agent_analytics(
        &self,
        agent_id: &str,
        analytics: &AgentAnalytics,
        expected_revision: Option<i64>,
    ) -> StorageResult<i64> {
        let mut agent = self.agents.get_mut(agent_id).ok_or(StorageError::NotFound)?;

        if let Some(expected) = expected_revision {
            if agent.analytics_revision != expected {
                return Err(StorageError::Conflict);
            }
        }

        agent.analytics = Some(analytics.clone());
        agent.analytics_revision += 1;
        Ok(agent.analytics_revision)
    }

    async fn create_property(&self, property: &NewProperty) -> StorageResult<Property> {
        match self.properties.entry(property.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict),
            Entry::Vacant(slot) => {
                let created = Property {
                    id: property.id.clone(),
                    owner_id: property.owner_id.clone(),
                    title: property.title.clone(),
                    location: property.location.clone(),
                    status: property.status.clone(),
                    price: property.price,
                    thumbnail: property.thumbnail.clone(),
                    created_at: Utc::now(),
                    inquiries: property.inquiries,
                };
                slot.insert(created.clone());
                Ok(created)
            }
        }
    }

    async fn list_properties_by_owner(&self, owner_id: &str) -> Result<Vec<Property>> {
        let mut properties: Vec<Property> = self
            .properties
            .iter()
            .filter(|entry| entry.value().owner_id == owner_id)
            .map(|entry| entry.value().clone())
            .collect();
        properties.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(properties)
    }
}

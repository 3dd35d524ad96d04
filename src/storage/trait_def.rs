use crate::analytics::AgentAnalytics;
use crate::models::{Agent, NewAgent, NewProperty, Property};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Duplicate id on insert, or a stale revision on a conditional save
    #[error("conflicting write")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Insert a new agent with no analytics
    async fn create_agent(&self, agent: &NewAgent) -> StorageResult<Agent>;

    /// Get an agent by id
    async fn get_agent(&self, id: &str) -> Result<Option<Agent>>;

    /// List all agents, oldest first
    async fn list_agents(&self) -> Result<Vec<Agent>>;

    /// Replace an agent's analytics document in a single write
    ///
    /// With `expected_revision` set, the write only applies if the stored
    /// revision still matches and fails with `StorageError::Conflict`
    /// otherwise. Returns the new revision.
    async fn save_agent_analytics(
        &self,
        agent_id: &str,
        analytics: &AgentAnalytics,
        expected_revision: Option<i64>,
    ) -> StorageResult<i64>;

    /// Insert a new property listing
    async fn create_property(&self, property: &NewProperty) -> StorageResult<Property>;

    /// All properties owned by an agent, oldest first
    async fn list_properties_by_owner(&self, owner_id: &str) -> Result<Vec<Property>>;
}

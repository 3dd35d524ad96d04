use crate::analytics::AgentAnalytics;
use crate::models::{Agent, NewAgent, NewProperty, Property};
use crate::storage::rows::{now_secs, optional_count, AgentRow, PropertyRow};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

const AGENT_COLUMNS: &str =
    "id, name, email, phone, analytics, analytics_revision, created_at";

const PROPERTY_COLUMNS: &str = "id, owner_id, title, location, status, price, thumbnail, \
     created_at, inquiries_whatsapp, inquiries_email, inquiries_calls";

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn agent_exists(&self, agent_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM agents WHERE id = $1)")
            .bind(agent_id)
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                phone TEXT,
                analytics TEXT,
                analytics_revision BIGINT NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS properties (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL REFERENCES agents(id),
                title TEXT NOT NULL,
                location TEXT NOT NULL,
                status TEXT NOT NULL,
                price DOUBLE PRECISION NOT NULL,
                thumbnail TEXT,
                created_at BIGINT NOT NULL,
                inquiries_whatsapp BIGINT,
                inquiries_email BIGINT,
                inquiries_calls BIGINT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_properties_owner ON properties(owner_id)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_agent(&self, agent: &NewAgent) -> StorageResult<Agent> {
        let result = sqlx::query(
            r#"
            INSERT INTO agents (id, name, email, phone, analytics_revision, created_at)
            VALUES ($1, $2, $3, $4, 0, $5)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&agent.id)
        .bind(&agent.name)
        .bind(&agent.email)
        .bind(&agent.phone)
        .bind(now_secs())
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        self.get_agent(&agent.id)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>> {
        let row = sqlx::query_as::<_, AgentRow>(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Agent::try_from).transpose()
    }

    async fn list_agents(&self) -> Result<Vec<Agent>> {
        let rows = sqlx::query_as::<_, AgentRow>(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(Agent::try_from).collect()
    }

    async fn save_agent_analytics(
        &self,
        agent_id: &str,
        analytics: &AgentAnalytics,
        expected_revision: Option<i64>,
    ) -> StorageResult<i64> {
        let document = serde_json::to_string(analytics).map_err(|e| StorageError::Other(e.into()))?;

        let revision: Option<i64> = match expected_revision {
            None => sqlx::query_scalar(
                r#"
                UPDATE agents
                SET analytics = $1, analytics_revision = analytics_revision + 1
                WHERE id = $2
                RETURNING analytics_revision
                "#,
            )
            .bind(&document)
            .bind(agent_id)
            .fetch_optional(self.pool.as_ref())
            .await,
            Some(expected) => sqlx::query_scalar(
                r#"
                UPDATE agents
                SET analytics = $1, analytics_revision = analytics_revision + 1
                WHERE id = $2 AND analytics_revision = $3
                RETURNING analytics_revision
                "#,
            )
            .bind(&document)
            .bind(agent_id)
            .bind(expected)
            .fetch_optional(self.pool.as_ref())
            .await,
        }
        .map_err(|e| StorageError::Other(e.into()))?;

        if let Some(revision) = revision {
            return Ok(revision);
        }

        // Nothing updated: either the agent is gone or the revision moved on
        if expected_revision.is_some() && self.agent_exists(agent_id).await? {
            Err(StorageError::Conflict)
        } else {
            Err(StorageError::NotFound)
        }
    }

    async fn create_property(&self, property: &NewProperty) -> StorageResult<Property> {
        let result = sqlx::query(
            r#"
            INSERT INTO properties (id, owner_id, title, location, status, price, thumbnail,
                                    created_at, inquiries_whatsapp, inquiries_email,
                                    inquiries_calls)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&property.id)
        .bind(&property.owner_id)
        .bind(&property.title)
        .bind(&property.location)
        .bind(&property.status)
        .bind(property.price)
        .bind(&property.thumbnail)
        .bind(now_secs())
        .bind(optional_count(property.inquiries.whatsapp))
        .bind(optional_count(property.inquiries.email))
        .bind(optional_count(property.inquiries.calls))
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        let row = sqlx::query_as::<_, PropertyRow>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1"
        ))
        .bind(&property.id)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        Ok(Property::try_from(row)?)
    }

    async fn list_properties_by_owner(&self, owner_id: &str) -> Result<Vec<Property>> {
        let rows = sqlx::query_as::<_, PropertyRow>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE owner_id = $1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(owner_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(Property::try_from).collect()
    }
}

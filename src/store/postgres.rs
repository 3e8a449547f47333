use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Postgres, Row, Transaction};

use crate::model::{
    EntityDetail, InstanceProperties, InstanceStatus, Relationship, TypeRegistry,
};
use crate::store::{MetadataRepository, RepositoryError, RepositoryResult};

const ENTITY_COLUMNS: &str = "guid, type_name, status, properties, metadata_collection_name, \
     created_by, updated_by, create_time, update_time, version";

const RELATIONSHIP_COLUMNS: &str = "guid, type_name, end1_guid, end2_guid, status, properties, \
     created_by, updated_by, create_time, update_time, version";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS entities (
        guid TEXT PRIMARY KEY,
        type_name TEXT NOT NULL,
        uniqueness_root TEXT NOT NULL,
        qualified_name TEXT,
        status TEXT NOT NULL,
        properties JSONB NOT NULL,
        metadata_collection_name TEXT,
        created_by TEXT NOT NULL,
        updated_by TEXT,
        create_time TIMESTAMPTZ NOT NULL,
        update_time TIMESTAMPTZ,
        version BIGINT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS entities_qualified_name_idx ON entities (uniqueness_root, qualified_name)",
    r#"
    CREATE TABLE IF NOT EXISTS relationships (
        guid TEXT PRIMARY KEY,
        type_name TEXT NOT NULL,
        end1_guid TEXT NOT NULL REFERENCES entities (guid) ON DELETE CASCADE,
        end2_guid TEXT NOT NULL REFERENCES entities (guid) ON DELETE CASCADE,
        status TEXT NOT NULL,
        properties JSONB NOT NULL,
        created_by TEXT NOT NULL,
        updated_by TEXT,
        create_time TIMESTAMPTZ NOT NULL,
        update_time TIMESTAMPTZ,
        version BIGINT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS relationships_end1_idx ON relationships (end1_guid)",
    "CREATE INDEX IF NOT EXISTS relationships_end2_idx ON relationships (end2_guid)",
];

/// Repository backed by two PostgreSQL tables with JSONB property bags.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    registry: TypeRegistry,
    purge_supported: bool,
}

impl PostgresRepository {
    /// Create a new PostgreSQL repository with the given database URL
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        purge_supported: bool,
    ) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self {
            pool,
            registry: TypeRegistry::open_metadata(),
            purge_supported,
        })
    }

    /// Create the entity and relationship tables if they are missing
    pub async fn migrate(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to create repository tables")?;
        }
        log::info!("Repository tables ready");
        Ok(())
    }

    async fn lock_qualified_name(
        tx: &mut Transaction<'_, Postgres>,
        root: &str,
        qualified_name: &str,
    ) -> RepositoryResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("{}/{}", root, qualified_name))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn check_unique(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        type_name: &str,
        properties: &InstanceProperties,
        ignore_guid: Option<&str>,
    ) -> RepositoryResult<()> {
        let Some(qualified_name) = properties.qualified_name() else {
            return Ok(());
        };
        let root = self.registry.uniqueness_root(type_name);
        Self::lock_qualified_name(tx, &root, qualified_name).await?;

        let clash: Option<String> = sqlx::query_scalar(
            "SELECT type_name FROM entities WHERE uniqueness_root = $1 AND qualified_name = $2 \
             AND status <> 'DELETED' AND guid <> $3 LIMIT 1",
        )
        .bind(&root)
        .bind(qualified_name)
        .bind(ignore_guid.unwrap_or(""))
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(existing_type) = clash {
            return Err(RepositoryError::DuplicateQualifiedName {
                type_name: existing_type,
                qualified_name: qualified_name.to_string(),
            });
        }
        Ok(())
    }

    async fn live_entity_type(
        tx: &mut Transaction<'_, Postgres>,
        guid: &str,
    ) -> RepositoryResult<String> {
        let type_name: Option<String> = sqlx::query_scalar(
            "SELECT type_name FROM entities WHERE guid = $1 AND status <> 'DELETED'",
        )
        .bind(guid)
        .fetch_optional(&mut **tx)
        .await?;
        type_name.ok_or_else(|| RepositoryError::EntityNotKnown(guid.to_string()))
    }

    async fn fetch_relationship(&self, guid: &str) -> RepositoryResult<Option<Relationship>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM relationships WHERE guid = $1",
            RELATIONSHIP_COLUMNS
        ))
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(relationship_from_row).transpose()
    }
}

fn parse_status(value: &str) -> RepositoryResult<InstanceStatus> {
    InstanceStatus::parse(value)
        .ok_or_else(|| RepositoryError::Storage(anyhow::anyhow!("unknown status '{}'", value)))
}

fn parse_properties(value: serde_json::Value) -> RepositoryResult<InstanceProperties> {
    serde_json::from_value(value)
        .context("Failed to deserialize instance properties")
        .map_err(RepositoryError::Storage)
}

fn properties_json(properties: &InstanceProperties) -> RepositoryResult<serde_json::Value> {
    serde_json::to_value(properties)
        .context("Failed to serialize instance properties")
        .map_err(RepositoryError::Storage)
}

fn entity_from_row(row: &PgRow) -> RepositoryResult<EntityDetail> {
    Ok(EntityDetail {
        guid: row.get("guid"),
        type_name: row.get("type_name"),
        status: parse_status(row.get("status"))?,
        properties: parse_properties(row.get("properties"))?,
        metadata_collection_name: row.get("metadata_collection_name"),
        created_by: row.get("created_by"),
        updated_by: row.get("updated_by"),
        create_time: row.get::<DateTime<Utc>, _>("create_time"),
        update_time: row.get::<Option<DateTime<Utc>>, _>("update_time"),
        version: row.get("version"),
    })
}

fn relationship_from_row(row: &PgRow) -> RepositoryResult<Relationship> {
    Ok(Relationship {
        guid: row.get("guid"),
        type_name: row.get("type_name"),
        end1_guid: row.get("end1_guid"),
        end2_guid: row.get("end2_guid"),
        status: parse_status(row.get("status"))?,
        properties: parse_properties(row.get("properties"))?,
        created_by: row.get("created_by"),
        updated_by: row.get("updated_by"),
        create_time: row.get::<DateTime<Utc>, _>("create_time"),
        update_time: row.get::<Option<DateTime<Utc>>, _>("update_time"),
        version: row.get("version"),
    })
}

#[async_trait::async_trait]
impl MetadataRepository for PostgresRepository {
    fn type_registry(&self) -> &TypeRegistry {
        &self.registry
    }

    fn supports_purge(&self) -> bool {
        self.purge_supported
    }

    async fn add_entity(
        &self,
        user_id: &str,
        type_name: &str,
        properties: InstanceProperties,
        status: InstanceStatus,
        metadata_collection_name: Option<String>,
    ) -> RepositoryResult<EntityDetail> {
        self.registry.validate_entity_type(type_name)?;
        let mut tx = self.pool.begin().await?;
        self.check_unique(&mut tx, type_name, &properties, None).await?;

        let entity = EntityDetail::new(user_id, type_name, properties, status, metadata_collection_name);
        sqlx::query(
            "INSERT INTO entities (guid, type_name, uniqueness_root, qualified_name, status, properties, \
             metadata_collection_name, created_by, updated_by, create_time, update_time, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(&entity.guid)
        .bind(&entity.type_name)
        .bind(self.registry.uniqueness_root(type_name))
        .bind(entity.qualified_name())
        .bind(entity.status.as_str())
        .bind(properties_json(&entity.properties)?)
        .bind(&entity.metadata_collection_name)
        .bind(&entity.created_by)
        .bind(&entity.updated_by)
        .bind(entity.create_time)
        .bind(entity.update_time)
        .bind(entity.version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(entity)
    }

    async fn update_entity_properties(
        &self,
        user_id: &str,
        guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<EntityDetail> {
        let mut tx = self.pool.begin().await?;
        let type_name = Self::live_entity_type(&mut tx, guid).await?;
        self.check_unique(&mut tx, &type_name, &properties, Some(guid))
            .await?;

        let row = sqlx::query(&format!(
            "UPDATE entities SET properties = $2, qualified_name = $3, updated_by = $4, \
             update_time = $5, version = version + 1 WHERE guid = $1 RETURNING {}",
            ENTITY_COLUMNS
        ))
        .bind(guid)
        .bind(properties_json(&properties)?)
        .bind(properties.qualified_name())
        .bind(user_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        entity_from_row(&row)
    }

    async fn update_entity_status(
        &self,
        user_id: &str,
        guid: &str,
        status: InstanceStatus,
    ) -> RepositoryResult<EntityDetail> {
        let row = sqlx::query(&format!(
            "UPDATE entities SET status = $2, updated_by = $3, update_time = $4, version = version + 1 \
             WHERE guid = $1 AND status <> 'DELETED' RETURNING {}",
            ENTITY_COLUMNS
        ))
        .bind(guid)
        .bind(status.as_str())
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => entity_from_row(&row),
            None => Err(RepositoryError::EntityNotKnown(guid.to_string())),
        }
    }

    async fn get_entity(&self, guid: &str) -> RepositoryResult<Option<EntityDetail>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM entities WHERE guid = $1",
            ENTITY_COLUMNS
        ))
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(entity_from_row).transpose()
    }

    async fn find_entities_by_property(
        &self,
        type_name: &str,
        property_name: &str,
        value: &serde_json::Value,
    ) -> RepositoryResult<Vec<EntityDetail>> {
        self.registry.validate_entity_type(type_name)?;
        let rows = sqlx::query(&format!(
            "SELECT {} FROM entities WHERE type_name = ANY($1) AND status <> 'DELETED' \
             AND properties -> $2 = $3 ORDER BY create_time",
            ENTITY_COLUMNS
        ))
        .bind(self.registry.subtypes_of(type_name))
        .bind(property_name)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entity_from_row).collect()
    }

    async fn add_relationship(
        &self,
        user_id: &str,
        type_name: &str,
        end1_guid: &str,
        end2_guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<Relationship> {
        let mut tx = self.pool.begin().await?;
        let end1_type = Self::live_entity_type(&mut tx, end1_guid).await?;
        let end2_type = Self::live_entity_type(&mut tx, end2_guid).await?;
        self.registry
            .validate_relationship_ends(type_name, &end1_type, &end2_type)?;

        let relationship = Relationship::new(user_id, type_name, end1_guid, end2_guid, properties);
        sqlx::query(
            "INSERT INTO relationships (guid, type_name, end1_guid, end2_guid, status, properties, \
             created_by, updated_by, create_time, update_time, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&relationship.guid)
        .bind(&relationship.type_name)
        .bind(&relationship.end1_guid)
        .bind(&relationship.end2_guid)
        .bind(relationship.status.as_str())
        .bind(properties_json(&relationship.properties)?)
        .bind(&relationship.created_by)
        .bind(&relationship.updated_by)
        .bind(relationship.create_time)
        .bind(relationship.update_time)
        .bind(relationship.version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(relationship)
    }

    async fn update_relationship_properties(
        &self,
        user_id: &str,
        guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<Relationship> {
        let row = sqlx::query(&format!(
            "UPDATE relationships SET properties = $2, updated_by = $3, update_time = $4, \
             version = version + 1 WHERE guid = $1 AND status <> 'DELETED' RETURNING {}",
            RELATIONSHIP_COLUMNS
        ))
        .bind(guid)
        .bind(properties_json(&properties)?)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => relationship_from_row(&row),
            None => Err(RepositoryError::RelationshipNotKnown(guid.to_string())),
        }
    }

    async fn get_relationships_for_entity(
        &self,
        guid: &str,
        type_name: Option<&str>,
    ) -> RepositoryResult<Vec<Relationship>> {
        if self.get_entity(guid).await?.is_none() {
            return Err(RepositoryError::EntityNotKnown(guid.to_string()));
        }
        let rows = sqlx::query(&format!(
            "SELECT {} FROM relationships WHERE (end1_guid = $1 OR end2_guid = $1) \
             AND status <> 'DELETED' AND ($2::TEXT IS NULL OR type_name = $2) ORDER BY create_time",
            RELATIONSHIP_COLUMNS
        ))
        .bind(guid)
        .bind(type_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(relationship_from_row).collect()
    }

    async fn delete_entity(&self, user_id: &str, guid: &str) -> RepositoryResult<EntityDetail> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "UPDATE entities SET status = 'DELETED', updated_by = $2, update_time = $3, \
             version = version + 1 WHERE guid = $1 AND status <> 'DELETED' RETURNING {}",
            ENTITY_COLUMNS
        ))
        .bind(guid)
        .bind(user_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::EntityNotKnown(guid.to_string()))?;

        sqlx::query(
            "UPDATE relationships SET status = 'DELETED', updated_by = $2, update_time = $3, \
             version = version + 1 WHERE (end1_guid = $1 OR end2_guid = $1) AND status <> 'DELETED'",
        )
        .bind(guid)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        entity_from_row(&row)
    }

    async fn purge_entity(&self, guid: &str) -> RepositoryResult<()> {
        if !self.purge_supported {
            return Err(RepositoryError::FunctionNotSupported("purge_entity".to_string()));
        }
        let entity = self
            .get_entity(guid)
            .await?
            .ok_or_else(|| RepositoryError::EntityNotKnown(guid.to_string()))?;
        if !entity.is_deleted() {
            return Err(RepositoryError::NotDeleted(guid.to_string()));
        }

        // relationships go with it through ON DELETE CASCADE
        sqlx::query("DELETE FROM entities WHERE guid = $1")
            .bind(guid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_relationship(
        &self,
        user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Relationship> {
        let row = sqlx::query(&format!(
            "UPDATE relationships SET status = 'DELETED', updated_by = $2, update_time = $3, \
             version = version + 1 WHERE guid = $1 AND status <> 'DELETED' RETURNING {}",
            RELATIONSHIP_COLUMNS
        ))
        .bind(guid)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => relationship_from_row(&row),
            None => Err(RepositoryError::RelationshipNotKnown(guid.to_string())),
        }
    }

    async fn purge_relationship(&self, guid: &str) -> RepositoryResult<()> {
        if !self.purge_supported {
            return Err(RepositoryError::FunctionNotSupported(
                "purge_relationship".to_string(),
            ));
        }
        let relationship = self
            .fetch_relationship(guid)
            .await?
            .ok_or_else(|| RepositoryError::RelationshipNotKnown(guid.to_string()))?;
        if relationship.status != InstanceStatus::Deleted {
            return Err(RepositoryError::NotDeleted(guid.to_string()));
        }

        sqlx::query("DELETE FROM relationships WHERE guid = $1")
            .bind(guid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

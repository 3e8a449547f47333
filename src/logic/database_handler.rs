use std::collections::HashSet;

use crate::error::{OmasError, OmasResult};
use crate::logic::{RegistrationHandler, RepositoryHelper};
use crate::model::type_names::{
    ASSET_SCHEMA_TYPE, ATTRIBUTE_FOR_SCHEMA, DATABASE, DATA_CONTENT_FOR_DATA_SET,
    DEPLOYED_DATABASE_SCHEMA, NESTED_SCHEMA_ATTRIBUTE, RELATIONAL_COLUMN,
    RELATIONAL_DB_SCHEMA_TYPE, RELATIONAL_TABLE,
};
use crate::model::{
    Database, DatabaseSchema, DeleteSemantic, Guid, InstanceProperties, RelationalColumn,
    RelationalTable, UpdateSemantic, QUALIFIED_NAME,
};
use crate::store::MetadataRepository;

/// Writes Database → DeployedDatabaseSchema → RelationalDBSchemaType →
/// RelationalTable → RelationalColumn.
pub struct DatabaseHandler<R> {
    helper: RepositoryHelper<R>,
    registration: RegistrationHandler<R>,
}

impl<R> Clone for DatabaseHandler<R> {
    fn clone(&self) -> Self {
        Self {
            helper: self.helper.clone(),
            registration: self.registration.clone(),
        }
    }
}

fn database_properties(database: &Database) -> InstanceProperties {
    InstanceProperties::new()
        .with(QUALIFIED_NAME, Some(database.qualified_name.as_str()))
        .with("name", database.display_name.as_deref())
        .with("description", database.description.as_deref())
        .with("type", database.database_type.as_deref())
        .with("version", database.database_version.as_deref())
        .with("instance", database.database_instance.as_deref())
        .with("importedFrom", database.database_imported_from.as_deref())
}

fn database_schema_properties(schema: &DatabaseSchema) -> InstanceProperties {
    InstanceProperties::new()
        .with(QUALIFIED_NAME, Some(schema.qualified_name.as_str()))
        .with("name", schema.display_name.as_deref())
        .with("description", schema.description.as_deref())
}

fn table_properties(table: &RelationalTable) -> InstanceProperties {
    InstanceProperties::new()
        .with(QUALIFIED_NAME, Some(table.qualified_name.as_str()))
        .with("displayName", table.display_name.as_deref())
        .with("description", table.description.as_deref())
}

fn column_properties(column: &RelationalColumn) -> InstanceProperties {
    InstanceProperties::new()
        .with(QUALIFIED_NAME, Some(column.qualified_name.as_str()))
        .with("displayName", column.display_name.as_deref())
        .with("description", column.description.as_deref())
        .with("position", column.position)
        .with("dataType", column.data_type.as_deref())
        .with("defaultValue", column.default_value.as_deref())
        .with("isNullable", column.nullable)
        .with("isPrimaryKey", column.primary_key)
}

/// Qualified name of the schema type hanging off a deployed database schema.
fn schema_type_qualified_name(database_schema_qualified_name: &str) -> String {
    format!("{}#schemaType", database_schema_qualified_name)
}

impl<R: MetadataRepository + 'static> DatabaseHandler<R> {
    pub fn new(helper: RepositoryHelper<R>, registration: RegistrationHandler<R>) -> Self {
        Self {
            helper,
            registration,
        }
    }

    pub async fn upsert_database(
        &self,
        user_id: &str,
        database: &Database,
        external_source_name: Option<&str>,
    ) -> OmasResult<Guid> {
        if database.qualified_name.trim().is_empty() {
            return Err(OmasError::invalid_parameter(
                QUALIFIED_NAME,
                "a database needs a qualified name",
            ));
        }
        self.registration
            .validate_external_source(external_source_name)
            .await?;

        let (database_guid, outcome) = self
            .helper
            .upsert_entity(
                user_id,
                DATABASE,
                database_properties(database),
                self.helper.metadata_collection(external_source_name),
            )
            .await?;
        log::info!("Database {} {:?} ({})", database.qualified_name, outcome, database_guid);

        let mut keep = HashSet::new();
        if let Some(schema) = &database.database_schema {
            let schema_guid = self
                .upsert_database_schema(user_id, &database_guid, schema, external_source_name)
                .await?;
            keep.insert(schema_guid);
        }
        self.helper
            .reconcile_children(
                user_id,
                &database_guid,
                DATA_CONTENT_FOR_DATA_SET,
                &keep,
                UpdateSemantic::Replace,
                DeleteSemantic::Soft,
            )
            .await?;

        self.registration
            .link_to_external_source(user_id, external_source_name, &database_guid)
            .await?;
        Ok(database_guid)
    }

    async fn upsert_database_schema(
        &self,
        user_id: &str,
        database_guid: &str,
        schema: &DatabaseSchema,
        external_source_name: Option<&str>,
    ) -> OmasResult<Guid> {
        if schema.qualified_name.trim().is_empty() {
            return Err(OmasError::invalid_parameter(
                "databaseSchema.qualifiedName",
                "a database schema needs a qualified name",
            ));
        }
        let collection = self.helper.metadata_collection(external_source_name);
        let (schema_guid, _) = self
            .helper
            .upsert_entity(user_id, DEPLOYED_DATABASE_SCHEMA, database_schema_properties(schema), collection)
            .await?;
        self.helper
            .upsert_relationship(
                user_id,
                DATA_CONTENT_FOR_DATA_SET,
                database_guid,
                &schema_guid,
                InstanceProperties::new(),
            )
            .await?;

        let schema_type_guid = self
            .ensure_schema_type(user_id, &schema_guid, &schema.qualified_name, collection)
            .await?;

        let mut keep = HashSet::new();
        for table in &schema.tables {
            let table_guid = self
                .upsert_table_under(user_id, &schema_type_guid, table, collection)
                .await?;
            keep.insert(table_guid);
        }
        self.helper
            .reconcile_children(
                user_id,
                &schema_type_guid,
                ATTRIBUTE_FOR_SCHEMA,
                &keep,
                UpdateSemantic::Replace,
                DeleteSemantic::Soft,
            )
            .await?;
        Ok(schema_guid)
    }

    async fn ensure_schema_type(
        &self,
        user_id: &str,
        schema_guid: &str,
        schema_qualified_name: &str,
        collection: Option<&str>,
    ) -> OmasResult<Guid> {
        let qualified_name = schema_type_qualified_name(schema_qualified_name);
        let (schema_type_guid, _) = self
            .helper
            .upsert_entity(
                user_id,
                RELATIONAL_DB_SCHEMA_TYPE,
                InstanceProperties::new().with(QUALIFIED_NAME, Some(qualified_name.as_str())),
                collection,
            )
            .await?;
        self.helper
            .upsert_relationship(
                user_id,
                ASSET_SCHEMA_TYPE,
                schema_guid,
                &schema_type_guid,
                InstanceProperties::new(),
            )
            .await?;
        Ok(schema_type_guid)
    }

    async fn upsert_table_under(
        &self,
        user_id: &str,
        schema_type_guid: &str,
        table: &RelationalTable,
        collection: Option<&str>,
    ) -> OmasResult<Guid> {
        if table.qualified_name.trim().is_empty() {
            return Err(OmasError::invalid_parameter(
                "relationalTable.qualifiedName",
                "a relational table needs a qualified name",
            ));
        }
        let (table_guid, _) = self
            .helper
            .upsert_entity(user_id, RELATIONAL_TABLE, table_properties(table), collection)
            .await?;
        self.helper
            .upsert_relationship(
                user_id,
                ATTRIBUTE_FOR_SCHEMA,
                schema_type_guid,
                &table_guid,
                InstanceProperties::new(),
            )
            .await?;

        let mut keep = HashSet::new();
        for column in &table.columns {
            let (column_guid, _) = self
                .helper
                .upsert_entity(user_id, RELATIONAL_COLUMN, column_properties(column), collection)
                .await?;
            self.helper
                .upsert_relationship(
                    user_id,
                    NESTED_SCHEMA_ATTRIBUTE,
                    &table_guid,
                    &column_guid,
                    InstanceProperties::new().with("position", column.position),
                )
                .await?;
            keep.insert(column_guid);
        }
        self.helper
            .reconcile_children(
                user_id,
                &table_guid,
                NESTED_SCHEMA_ATTRIBUTE,
                &keep,
                UpdateSemantic::Replace,
                DeleteSemantic::Soft,
            )
            .await?;
        Ok(table_guid)
    }

    /// Upsert one table into an existing deployed database schema.
    pub async fn upsert_relational_table(
        &self,
        user_id: &str,
        database_schema_qualified_name: &str,
        table: &RelationalTable,
        external_source_name: Option<&str>,
    ) -> OmasResult<Guid> {
        self.registration
            .validate_external_source(external_source_name)
            .await?;
        let schema = self
            .helper
            .require_entity_by_qualified_name(
                DEPLOYED_DATABASE_SCHEMA,
                database_schema_qualified_name,
                "databaseSchemaQualifiedName",
            )
            .await?;
        let collection = self.helper.metadata_collection(external_source_name);
        let schema_type_guid = self
            .ensure_schema_type(user_id, &schema.guid, database_schema_qualified_name, collection)
            .await?;
        self.upsert_table_under(user_id, &schema_type_guid, table, collection)
            .await
    }

    pub async fn remove_database(
        &self,
        user_id: &str,
        guid: Option<&str>,
        qualified_name: Option<&str>,
        semantic: DeleteSemantic,
    ) -> OmasResult<()> {
        let target = self.helper.resolve_target(DATABASE, guid, qualified_name).await?;
        self.helper.remove_entity(user_id, &target.guid, semantic).await
    }

    pub async fn remove_database_schema(
        &self,
        user_id: &str,
        guid: Option<&str>,
        qualified_name: Option<&str>,
        semantic: DeleteSemantic,
    ) -> OmasResult<()> {
        let target = self
            .helper
            .resolve_target(DEPLOYED_DATABASE_SCHEMA, guid, qualified_name)
            .await?;
        self.helper.remove_entity(user_id, &target.guid, semantic).await
    }

    pub async fn remove_relational_table(
        &self,
        user_id: &str,
        guid: Option<&str>,
        qualified_name: Option<&str>,
        semantic: DeleteSemantic,
    ) -> OmasResult<()> {
        let target = self
            .helper
            .resolve_target(RELATIONAL_TABLE, guid, qualified_name)
            .await?;
        self.helper.remove_entity(user_id, &target.guid, semantic).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRepository;
    use std::sync::Arc;

    fn handler() -> DatabaseHandler<InMemoryRepository> {
        let helper = RepositoryHelper::new(Arc::new(InMemoryRepository::default()));
        DatabaseHandler::new(helper.clone(), RegistrationHandler::new(helper))
    }

    fn column(qn: &str, position: i32) -> RelationalColumn {
        RelationalColumn {
            qualified_name: qn.to_string(),
            position: Some(position),
            data_type: Some("INTEGER".to_string()),
            ..Default::default()
        }
    }

    fn table(qn: &str, columns: Vec<RelationalColumn>) -> RelationalTable {
        RelationalTable {
            qualified_name: qn.to_string(),
            columns,
            ..Default::default()
        }
    }

    fn database(tables: Vec<RelationalTable>) -> Database {
        Database {
            qualified_name: "pg::sales".to_string(),
            database_type: Some("PostgreSQL".to_string()),
            database_schema: Some(DatabaseSchema {
                qualified_name: "pg::sales::public".to_string(),
                tables,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn database_tree_is_written_and_reconciled() {
        let handler = handler();
        handler
            .upsert_database(
                "u",
                &database(vec![
                    table("pg::sales::public::orders", vec![column("pg::sales::public::orders::id", 0), column("pg::sales::public::orders::amount", 1)]),
                    table("pg::sales::public::customers", vec![column("pg::sales::public::customers::id", 0)]),
                ]),
                None,
            )
            .await
            .unwrap();

        let orders = handler
            .helper
            .find_entity_by_qualified_name(RELATIONAL_TABLE, "pg::sales::public::orders")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            handler.helper.outgoing(&orders.guid, NESTED_SCHEMA_ATTRIBUTE).await.unwrap().len(),
            2
        );

        handler
            .upsert_database(
                "u",
                &database(vec![table("pg::sales::public::orders", vec![column("pg::sales::public::orders::id", 0)])]),
                None,
            )
            .await
            .unwrap();

        assert!(handler
            .helper
            .find_entity_by_qualified_name(RELATIONAL_TABLE, "pg::sales::public::customers")
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            handler.helper.outgoing(&orders.guid, NESTED_SCHEMA_ATTRIBUTE).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn tables_can_be_added_to_an_existing_schema() {
        let handler = handler();
        handler.upsert_database("u", &database(vec![]), None).await.unwrap();

        let table_guid = handler
            .upsert_relational_table(
                "u",
                "pg::sales::public",
                &table("pg::sales::public::refunds", vec![column("pg::sales::public::refunds::id", 0)]),
                None,
            )
            .await
            .unwrap();

        let err = handler
            .upsert_relational_table("u", "pg::unknown", &table("x", vec![]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OmasError::InvalidParameter { .. }));

        handler
            .remove_relational_table("u", Some(table_guid.as_str()), None, DeleteSemantic::Soft)
            .await
            .unwrap();
        assert!(handler
            .helper
            .find_entity_by_qualified_name(RELATIONAL_COLUMN, "pg::sales::public::refunds::id")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn removing_the_database_removes_the_whole_tree() {
        let handler = handler();
        handler
            .upsert_database(
                "u",
                &database(vec![table("pg::sales::public::orders", vec![column("pg::sales::public::orders::id", 0)])]),
                None,
            )
            .await
            .unwrap();

        handler
            .remove_database("u", None, Some("pg::sales"), DeleteSemantic::Soft)
            .await
            .unwrap();
        assert_eq!(handler.helper.repository().active_entity_count(), 0);
    }
}

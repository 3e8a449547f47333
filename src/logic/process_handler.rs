use std::collections::HashSet;

use crate::error::{OmasError, OmasResult};
use crate::logic::{
    fan_out, run_concurrently, PortHandler, RegistrationHandler, RepositoryHelper,
    SchemaTypeHandler,
};
use crate::model::type_names::{DATA_FLOW, PROCESS, PROCESS_HIERARCHY, PROCESS_PORT, REFERENCEABLE};
use crate::model::{
    DataFlow, DeleteSemantic, FanOutResponse, Guid, InstanceProperties, InstanceStatus, Process,
    QUALIFIED_NAME,
};
use crate::store::MetadataRepository;

pub struct ProcessHandler<R> {
    helper: RepositoryHelper<R>,
    ports: PortHandler<R>,
    schema_types: SchemaTypeHandler<R>,
    registration: RegistrationHandler<R>,
}

impl<R> Clone for ProcessHandler<R> {
    fn clone(&self) -> Self {
        Self {
            helper: self.helper.clone(),
            ports: self.ports.clone(),
            schema_types: self.schema_types.clone(),
            registration: self.registration.clone(),
        }
    }
}

fn process_properties(process: &Process) -> InstanceProperties {
    InstanceProperties::new()
        .with(QUALIFIED_NAME, Some(process.qualified_name.as_str()))
        .with("name", process.name.as_deref())
        .with("displayName", process.display_name.as_deref())
        .with("description", process.description.as_deref())
        .with("owner", process.owner.as_deref())
        .with("formula", process.formula.as_deref())
        .with("implementationLanguage", process.implementation_language.as_deref())
}

impl<R: MetadataRepository + 'static> ProcessHandler<R> {
    pub fn new(
        helper: RepositoryHelper<R>,
        ports: PortHandler<R>,
        schema_types: SchemaTypeHandler<R>,
        registration: RegistrationHandler<R>,
    ) -> Self {
        Self {
            helper,
            ports,
            schema_types,
            registration,
        }
    }

    /// Upsert a process with its ports, lineage mappings and parents. A new
    /// process stays in DRAFT until everything below it has been written.
    pub async fn upsert_process(
        &self,
        user_id: &str,
        process: &Process,
        external_source_name: Option<&str>,
    ) -> OmasResult<Guid> {
        if process.qualified_name.trim().is_empty() {
            return Err(OmasError::invalid_parameter(
                QUALIFIED_NAME,
                "a process needs a qualified name",
            ));
        }
        self.registration
            .validate_external_source(external_source_name)
            .await?;

        let (process_guid, outcome) = self
            .helper
            .upsert_entity_with_status(
                user_id,
                PROCESS,
                process_properties(process),
                InstanceStatus::Draft,
                self.helper.metadata_collection(external_source_name),
            )
            .await?;
        log::info!("Process {} {:?} ({})", process.qualified_name, outcome, process_guid);

        let mut keep: HashSet<Guid> = HashSet::new();

        // port implementations are independent of each other
        let ports = self.ports.clone();
        let user = user_id.to_string();
        let source = external_source_name.map(str::to_string);
        let parent = process_guid.clone();
        let outcomes = run_concurrently(process.port_implementations.clone(), move |port| {
            let ports = ports.clone();
            let user = user.clone();
            let source = source.clone();
            let parent = parent.clone();
            async move {
                ports
                    .upsert_port_implementation(&user, &port, Some(&parent), source.as_deref())
                    .await
            }
        })
        .await;
        for outcome in outcomes {
            keep.insert(outcome?);
        }

        // aliases may delegate to the implementations written above
        for alias in &process.port_aliases {
            let alias_guid = self
                .ports
                .upsert_port_alias(user_id, alias, Some(&process_guid), external_source_name)
                .await?;
            keep.insert(alias_guid);
        }

        self.helper
            .reconcile_children(
                user_id,
                &process_guid,
                PROCESS_PORT,
                &keep,
                process.update_semantic,
                DeleteSemantic::Soft,
            )
            .await?;

        for mapping in &process.lineage_mappings {
            self.schema_types.add_lineage_mapping(user_id, mapping).await?;
        }

        for parent in &process.parent_processes {
            let parent_entity = self
                .helper
                .require_entity_by_qualified_name(PROCESS, &parent.qualified_name, "parentProcesses")
                .await?;
            if parent_entity.guid == process_guid {
                return Err(OmasError::invalid_parameter(
                    "parentProcesses",
                    "a process cannot be its own parent",
                ));
            }
            self.helper
                .upsert_relationship(
                    user_id,
                    PROCESS_HIERARCHY,
                    &parent_entity.guid,
                    &process_guid,
                    InstanceProperties::new().with(
                        "containmentType",
                        Some(parent.process_containment_type.as_str()),
                    ),
                )
                .await?;
        }

        self.registration
            .link_to_external_source(user_id, external_source_name, &process_guid)
            .await?;
        self.helper
            .set_status(user_id, &process_guid, InstanceStatus::Active)
            .await?;
        Ok(process_guid)
    }

    /// Upsert several processes; each one succeeds or fails on its own.
    pub async fn upsert_processes(
        &self,
        user_id: &str,
        processes: Vec<Process>,
        external_source_name: Option<&str>,
    ) -> FanOutResponse {
        let handler = self.clone();
        let user = user_id.to_string();
        let source = external_source_name.map(str::to_string);
        fan_out(
            processes,
            |p| p.qualified_name.clone(),
            move |process| {
                let handler = handler.clone();
                let user = user.clone();
                let source = source.clone();
                async move {
                    handler
                        .upsert_process(&user, &process, source.as_deref())
                        .await
                }
            },
        )
        .await
    }

    pub async fn add_data_flow(&self, user_id: &str, data_flow: &DataFlow) -> OmasResult<Guid> {
        let supplier = self
            .helper
            .require_entity_by_qualified_name(REFERENCEABLE, &data_flow.data_supplier, "dataSupplier")
            .await?;
        let consumer = self
            .helper
            .require_entity_by_qualified_name(REFERENCEABLE, &data_flow.data_consumer, "dataConsumer")
            .await?;
        self.helper
            .upsert_relationship(
                user_id,
                DATA_FLOW,
                &supplier.guid,
                &consumer.guid,
                InstanceProperties::new()
                    .with("formula", data_flow.formula.as_deref())
                    .with("description", data_flow.description.as_deref()),
            )
            .await
    }

    pub async fn add_data_flows(&self, user_id: &str, data_flows: Vec<DataFlow>) -> FanOutResponse {
        let handler = self.clone();
        let user = user_id.to_string();
        fan_out(
            data_flows,
            |f| format!("{} -> {}", f.data_supplier, f.data_consumer),
            move |data_flow| {
                let handler = handler.clone();
                let user = user.clone();
                async move { handler.add_data_flow(&user, &data_flow).await }
            },
        )
        .await
    }

    /// Remove a process together with its ports and their schema types.
    pub async fn remove_process(
        &self,
        user_id: &str,
        guid: Option<&str>,
        qualified_name: Option<&str>,
        semantic: DeleteSemantic,
    ) -> OmasResult<()> {
        let target = self.helper.resolve_target(PROCESS, guid, qualified_name).await?;
        log::info!("Removing process {} ({:?})", target.guid, semantic);
        self.helper.remove_entity(user_id, &target.guid, semantic).await
    }
}

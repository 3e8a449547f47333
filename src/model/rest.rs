use crate::model::{
    DataFlow, DataView, Database, DeleteSemantic, EventType, Guid, LineageMapping, PortAlias,
    PortImplementation, Process, RelationalTable, Report, SchemaType, SoftwareServerCapability,
    Topic,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequestBody {
    pub software_server_capability: SoftwareServerCapability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessesRequestBody {
    pub external_source_name: Option<String>,
    pub processes: Vec<Process>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortImplementationRequestBody {
    pub external_source_name: Option<String>,
    pub process_qualified_name: Option<String>,
    pub port_implementation: PortImplementation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortAliasRequestBody {
    pub external_source_name: Option<String>,
    pub process_qualified_name: Option<String>,
    pub port_alias: PortAlias,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTypeRequestBody {
    pub external_source_name: Option<String>,
    pub schema_type: SchemaType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageMappingsRequestBody {
    pub external_source_name: Option<String>,
    pub lineage_mappings: Vec<LineageMapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFlowsRequestBody {
    pub external_source_name: Option<String>,
    pub data_flows: Vec<DataFlow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseRequestBody {
    pub external_source_name: Option<String>,
    pub database: Database,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationalTableRequestBody {
    pub external_source_name: Option<String>,
    #[serde(default)]
    pub database_schema_qualified_name: String,
    pub relational_table: RelationalTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRequestBody {
    pub external_source_name: Option<String>,
    pub topic: Topic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeRequestBody {
    pub external_source_name: Option<String>,
    #[serde(default)]
    pub topic_qualified_name: String,
    pub event_type: EventType,
}

/// Identifies the instance to remove by GUID or by qualified name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequestBody {
    pub external_source_name: Option<String>,
    pub guid: Option<Guid>,
    pub qualified_name: Option<String>,
    #[serde(default)]
    pub delete_semantic: DeleteSemantic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindRequestBody {
    pub type_name: Option<String>,
    #[serde(default)]
    pub qualified_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequestBody {
    pub registration_qualified_name: Option<String>,
    pub report: Report,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataViewRequestBody {
    pub registration_qualified_name: Option<String>,
    pub data_view: DataView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GUIDResponse {
    #[serde(rename = "relatedHTTPCode")]
    pub related_http_code: u16,
    pub guid: Guid,
}

impl GUIDResponse {
    pub fn new(guid: Guid) -> Self {
        Self {
            related_http_code: 200,
            guid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GUIDListResponse {
    #[serde(rename = "relatedHTTPCode")]
    pub related_http_code: u16,
    pub guids: Vec<Guid>,
}

impl GUIDListResponse {
    pub fn new(guids: Vec<Guid>) -> Self {
        Self {
            related_http_code: 200,
            guids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoidResponse {
    #[serde(rename = "relatedHTTPCode")]
    pub related_http_code: u16,
}

impl Default for VoidResponse {
    fn default() -> Self {
        Self {
            related_http_code: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub identifier: String,
    pub exception_class_name: String,
    pub error_message: String,
}

/// Result of a batch whose items succeed or fail independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanOutResponse {
    #[serde(rename = "relatedHTTPCode")]
    pub related_http_code: u16,
    pub guids: Vec<Guid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_items: Vec<FailedItem>,
}

impl FanOutResponse {
    pub fn has_failures(&self) -> bool {
        !self.failed_items.is_empty()
    }
}

/// Error body returned for every failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FFDCResponse {
    #[serde(rename = "relatedHTTPCode")]
    pub related_http_code: u16,
    pub exception_class_name: String,
    pub exception_error_message: String,
    pub exception_user_action: String,
}

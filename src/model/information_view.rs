//! Information View beans: reports and data views published by BI tools.

use serde::{Deserialize, Serialize};

/// Reference to an existing schema element a derived column reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(default)]
    pub qualified_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default)]
    pub id: String,
    pub qualified_name: Option<String>,
    pub report_name: Option<String>,
    pub author: Option<String>,
    pub report_url: Option<String>,
    pub created_time: Option<String>,
    pub last_modified_time: Option<String>,
    pub last_modifier: Option<String>,
    #[serde(default)]
    pub report_elements: Vec<ReportElement>,
}

impl Report {
    pub fn resolved_qualified_name(&self) -> String {
        match &self.qualified_name {
            Some(qn) if !qn.is_empty() => qn.clone(),
            _ => format!(
                "report::{}",
                self.report_url.as_deref().unwrap_or(self.id.as_str())
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReportElement {
    #[serde(rename_all = "camelCase")]
    Section {
        name: String,
        #[serde(default)]
        elements: Vec<ReportElement>,
    },
    #[serde(rename_all = "camelCase")]
    Column {
        name: String,
        formula: Option<String>,
        aggregating_function: Option<String>,
        #[serde(default)]
        sources: Vec<Source>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataView {
    #[serde(default)]
    pub id: String,
    pub qualified_name: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub endpoint_address: Option<String>,
    pub created_time: Option<String>,
    pub last_modified_time: Option<String>,
    #[serde(default)]
    pub elements: Vec<DataViewElement>,
}

impl DataView {
    pub fn resolved_qualified_name(&self) -> String {
        match &self.qualified_name {
            Some(qn) if !qn.is_empty() => qn.clone(),
            _ => match &self.endpoint_address {
                Some(address) => format!("dataView::{}.{}", address, self.id),
                None => format!("dataView::{}", self.id),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DataViewElement {
    #[serde(rename_all = "camelCase")]
    Table {
        name: String,
        comment: Option<String>,
        #[serde(default)]
        elements: Vec<DataViewElement>,
    },
    #[serde(rename_all = "camelCase")]
    Column {
        name: String,
        comment: Option<String>,
        data_type: Option<String>,
        formula: Option<String>,
        #[serde(default)]
        sources: Vec<Source>,
    },
}

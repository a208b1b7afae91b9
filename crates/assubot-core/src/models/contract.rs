use serde::{Deserialize, Serialize};

/// Lifecycle of the asynchronous summary job.
///
/// `Pending -> Ongoing -> (Success | Failed)`, and `Failed -> Ongoing` on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SummarizeStatus {
    #[default]
    Pending,
    Ongoing,
    Success,
    Failed,
}

impl SummarizeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummarizeStatus::Pending => "pending",
            SummarizeStatus::Ongoing => "ongoing",
            SummarizeStatus::Success => "success",
            SummarizeStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SummarizeStatus::Success | SummarizeStatus::Failed)
    }

    /// Whether a summary job may be started from this state
    pub fn can_start(&self) -> bool {
        matches!(self, SummarizeStatus::Pending | SummarizeStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDocument {
    pub id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guarantee {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summarize_status: SummarizeStatus,
    #[serde(default)]
    pub documents: Vec<ContractDocument>,
    #[serde(default)]
    pub guarantees: Vec<Guarantee>,
    #[serde(default)]
    pub insurer: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Arguments of the contract list query. Serialized as the cache key args,
/// so field order and naming must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListContractsArgs {
    pub page: u32,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl Default for ListContractsArgs {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            status: None,
            search: None,
        }
    }
}

impl ListContractsArgs {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string()), ("limit", self.limit.to_string())];
        if let Some(status) = &self.status {
            pairs.push(("status", status.clone()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractPage {
    pub items: Vec<Contract>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub total_contracts: u64,
    pub summarized_contracts: u64,
    pub pending_contracts: u64,
    pub credit_balance: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub file_key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitContractRequest {
    pub name: String,
    pub file_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contract_from_minimal_json() {
        let contract: Contract = serde_json::from_value(json!({"id": "c1"})).unwrap();
        assert_eq!(contract.summarize_status, SummarizeStatus::Pending);
        assert!(contract.documents.is_empty());
    }

    #[test]
    fn test_summarize_status_transitions() {
        assert!(SummarizeStatus::Pending.can_start());
        assert!(SummarizeStatus::Failed.can_start());
        assert!(!SummarizeStatus::Ongoing.can_start());
        assert!(!SummarizeStatus::Success.can_start());
        assert!(SummarizeStatus::Failed.is_terminal());
        assert!(!SummarizeStatus::Ongoing.is_terminal());
    }

    #[test]
    fn test_list_args_serialization_is_stable() {
        let args = ListContractsArgs {
            status: Some("active".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&args).unwrap(),
            r#"{"page":1,"limit":20,"status":"active"}"#
        );
    }
}

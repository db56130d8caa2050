//! Contract with the remote ZIA management API.
//!
//! Tools only ever talk to these traits. The binaries inject an HTTP-backed
//! implementation (see [`crate::http_client`]); tests inject a recording spy.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zia_mcp_core::{PortDefinition, RemoteOutcome};

/// Opaque query parameters, passed through to the remote API untouched.
pub type QueryParams = Vec<(String, String)>;

/// A remote configuration object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(Map<String, Value>);

impl Resource {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Objects are taken as-is; any other JSON value is wrapped under `value`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            other => {
                let mut fields = Map::new();
                fields.insert("value".to_string(), other);
                Self(fields)
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn to_mapping(&self) -> Map<String, Value> {
        self.0.clone()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("unsupported service '{0}'; only 'zia' is available")]
    UnsupportedService(String),
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Fields for creating or replacing a network service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkServiceDraft {
    pub name: String,
    pub description: Option<String>,
    /// `None` leaves existing port ranges untouched on update.
    pub ports: Option<Vec<PortDefinition>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkServiceGroupDraft {
    pub name: String,
    pub description: Option<String>,
    pub service_ids: Option<Vec<String>>,
}

/// Fields for creating or updating a URL category. Unset lists are omitted
/// from the request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlCategoryDraft {
    pub configured_name: String,
    pub super_category: Option<String>,
    pub description: Option<String>,
    pub custom_category: Option<bool>,
    pub urls: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub ip_ranges: Option<Vec<String>>,
    pub db_categorized_urls: Option<Vec<String>>,
    pub keywords_retaining_parent_category: Option<Vec<String>>,
    pub ip_ranges_retaining_parent_category: Option<Vec<String>>,
}

#[async_trait]
pub trait CloudAppControlApi: Send + Sync {
    async fn list_available_actions(
        &self,
        rule_type: &str,
        cloud_apps: &[String],
    ) -> RemoteOutcome<Vec<String>>;
}

#[async_trait]
pub trait DeviceManagementApi: Send + Sync {
    async fn list_device_groups(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>>;
    async fn list_devices(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>>;
    async fn list_devices_lite(&self) -> RemoteOutcome<Vec<Resource>>;
}

#[async_trait]
pub trait CloudFirewallApi: Send + Sync {
    async fn list_network_apps(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>>;
    async fn get_network_app(&self, app_id: &str) -> RemoteOutcome<Resource>;

    async fn list_network_services(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>>;
    async fn get_network_service(&self, service_id: &str) -> RemoteOutcome<Resource>;
    async fn add_network_service(&self, draft: &NetworkServiceDraft) -> RemoteOutcome<Resource>;
    async fn update_network_service(
        &self,
        service_id: &str,
        draft: &NetworkServiceDraft,
    ) -> RemoteOutcome<Resource>;
    async fn delete_network_service(&self, service_id: &str) -> RemoteOutcome<()>;

    async fn list_network_svc_groups(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>>;
    async fn get_network_svc_group(&self, group_id: &str) -> RemoteOutcome<Resource>;
    async fn add_network_svc_group(
        &self,
        draft: &NetworkServiceGroupDraft,
    ) -> RemoteOutcome<Resource>;
    async fn update_network_svc_group(
        &self,
        group_id: &str,
        draft: &NetworkServiceGroupDraft,
    ) -> RemoteOutcome<Resource>;
    async fn delete_network_svc_group(&self, group_id: &str) -> RemoteOutcome<()>;
}

#[async_trait]
pub trait UrlCategoriesApi: Send + Sync {
    async fn list_categories(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>>;
    /// Categorizes at most one batch of URLs. Callers split larger inputs.
    async fn lookup(&self, urls: &[String]) -> RemoteOutcome<Vec<Value>>;
    async fn get_category(&self, category_id: &str) -> RemoteOutcome<Resource>;
    async fn add_url_category(&self, draft: &UrlCategoryDraft) -> RemoteOutcome<Resource>;
    async fn update_url_category(
        &self,
        category_id: &str,
        draft: &UrlCategoryDraft,
    ) -> RemoteOutcome<Resource>;
    async fn add_urls_to_category(
        &self,
        category_id: &str,
        configured_name: &str,
        urls: &[String],
    ) -> RemoteOutcome<Resource>;
    async fn delete_urls_from_category(
        &self,
        category_id: &str,
        configured_name: &str,
        urls: &[String],
    ) -> RemoteOutcome<Resource>;
    async fn delete_category(&self, category_id: &str) -> RemoteOutcome<()>;
}

/// A session handle grouping the API namespaces of one service.
pub trait ZiaClient: Send + Sync {
    fn cloud_app_control(&self) -> &dyn CloudAppControlApi;
    fn device_management(&self) -> &dyn DeviceManagementApi;
    fn cloud_firewall(&self) -> &dyn CloudFirewallApi;
    fn url_categories(&self) -> &dyn UrlCategoriesApi;
}

/// Produces a client for a service selector and authentication mode.
/// Called once per tool invocation.
pub trait ClientResolver: Send + Sync {
    fn get_client(&self, service: &str, use_legacy: bool) -> Result<Arc<dyn ZiaClient>, ClientError>;
}

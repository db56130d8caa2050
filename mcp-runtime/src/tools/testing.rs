//! Recording spy client for tool tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use zia_mcp_core::{RemoteError, RemoteOutcome};

use super::ToolContext;
use crate::client::{
    ClientError, ClientResolver, CloudAppControlApi, CloudFirewallApi, DeviceManagementApi,
    NetworkServiceDraft, NetworkServiceGroupDraft, QueryParams, Resource, UrlCategoriesApi,
    UrlCategoryDraft, ZiaClient,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub op: &'static str,
    pub args: Value,
}

#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<RecordedCall>>,
    resolutions: Mutex<Vec<(String, bool)>>,
    failure: Mutex<Option<String>>,
}

impl RecordingClient {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, op: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn resolutions(&self) -> Vec<(String, bool)> {
        self.resolutions.lock().unwrap().clone()
    }

    /// Every subsequent operation reports this remote error.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    fn record<T>(&self, op: &'static str, args: Value, payload: T) -> RemoteOutcome<T> {
        self.calls.lock().unwrap().push(RecordedCall { op, args });
        match self.failure.lock().unwrap().clone() {
            Some(message) => RemoteOutcome::failed(RemoteError::new(message)),
            None => RemoteOutcome::ok(payload),
        }
    }
}

fn query_json(query: &QueryParams) -> Value {
    let map: Map<String, Value> = query
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    Value::Object(map)
}

fn resource(value: Value) -> Resource {
    Resource::from_value(value)
}

fn listing(kind: &str) -> Vec<Resource> {
    vec![
        resource(json!({ "id": 1, "name": format!("{kind}-1") })),
        resource(json!({ "id": 2, "name": format!("{kind}-2") })),
    ]
}

fn ports_json(draft: &NetworkServiceDraft) -> Value {
    match &draft.ports {
        Some(ports) => serde_json::to_value(ports).unwrap(),
        None => Value::Null,
    }
}

#[async_trait]
impl CloudAppControlApi for RecordingClient {
    async fn list_available_actions(
        &self,
        rule_type: &str,
        cloud_apps: &[String],
    ) -> RemoteOutcome<Vec<String>> {
        self.record(
            "list_available_actions",
            json!({ "rule_type": rule_type, "cloud_apps": cloud_apps }),
            vec!["ALLOW_STREAMING_VIEW_LISTEN".to_string(), "BLOCK_STREAMING_UPLOAD".to_string()],
        )
    }
}

#[async_trait]
impl DeviceManagementApi for RecordingClient {
    async fn list_device_groups(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>> {
        self.record("list_device_groups", query_json(query), listing("group"))
    }

    async fn list_devices(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>> {
        self.record("list_devices", query_json(query), listing("device"))
    }

    async fn list_devices_lite(&self) -> RemoteOutcome<Vec<Resource>> {
        self.record("list_devices_lite", Value::Null, listing("device"))
    }
}

#[async_trait]
impl CloudFirewallApi for RecordingClient {
    async fn list_network_apps(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>> {
        self.record("list_network_apps", query_json(query), listing("app"))
    }

    async fn get_network_app(&self, app_id: &str) -> RemoteOutcome<Resource> {
        self.record("get_network_app", json!(app_id), resource(json!({ "id": app_id })))
    }

    async fn list_network_services(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>> {
        self.record("list_network_services", query_json(query), listing("service"))
    }

    async fn get_network_service(&self, service_id: &str) -> RemoteOutcome<Resource> {
        self.record(
            "get_network_service",
            json!(service_id),
            resource(json!({ "id": service_id })),
        )
    }

    async fn add_network_service(&self, draft: &NetworkServiceDraft) -> RemoteOutcome<Resource> {
        self.record(
            "add_network_service",
            json!({ "name": draft.name, "description": draft.description, "ports": ports_json(draft) }),
            resource(json!({ "id": 1001, "name": draft.name })),
        )
    }

    async fn update_network_service(
        &self,
        service_id: &str,
        draft: &NetworkServiceDraft,
    ) -> RemoteOutcome<Resource> {
        self.record(
            "update_network_service",
            json!({ "id": service_id, "name": draft.name, "ports": ports_json(draft) }),
            resource(json!({ "id": service_id, "name": draft.name })),
        )
    }

    async fn delete_network_service(&self, service_id: &str) -> RemoteOutcome<()> {
        self.record("delete_network_service", json!(service_id), ())
    }

    async fn list_network_svc_groups(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>> {
        self.record("list_network_svc_groups", query_json(query), listing("group"))
    }

    async fn get_network_svc_group(&self, group_id: &str) -> RemoteOutcome<Resource> {
        self.record(
            "get_network_svc_group",
            json!(group_id),
            resource(json!({ "id": group_id })),
        )
    }

    async fn add_network_svc_group(
        &self,
        draft: &NetworkServiceGroupDraft,
    ) -> RemoteOutcome<Resource> {
        self.record(
            "add_network_svc_group",
            json!({ "name": draft.name, "service_ids": draft.service_ids }),
            resource(json!({ "id": 2001, "name": draft.name })),
        )
    }

    async fn update_network_svc_group(
        &self,
        group_id: &str,
        draft: &NetworkServiceGroupDraft,
    ) -> RemoteOutcome<Resource> {
        self.record(
            "update_network_svc_group",
            json!({ "id": group_id, "name": draft.name, "service_ids": draft.service_ids }),
            resource(json!({ "id": group_id, "name": draft.name })),
        )
    }

    async fn delete_network_svc_group(&self, group_id: &str) -> RemoteOutcome<()> {
        self.record("delete_network_svc_group", json!(group_id), ())
    }
}

#[async_trait]
impl UrlCategoriesApi for RecordingClient {
    async fn list_categories(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>> {
        self.record("list_categories", query_json(query), listing("category"))
    }

    /// URLs prefixed with `raw:` come back as bare strings.
    async fn lookup(&self, urls: &[String]) -> RemoteOutcome<Vec<Value>> {
        let results = urls
            .iter()
            .map(|url| match url.strip_prefix("raw:") {
                Some(rest) => json!(rest),
                None => json!({ "url": url, "urlClassifications": ["NEWS_AND_MEDIA"] }),
            })
            .collect();
        self.record("lookup", json!(urls), results)
    }

    async fn get_category(&self, category_id: &str) -> RemoteOutcome<Resource> {
        self.record(
            "get_category",
            json!(category_id),
            resource(json!({ "id": category_id })),
        )
    }

    async fn add_url_category(&self, draft: &UrlCategoryDraft) -> RemoteOutcome<Resource> {
        self.record(
            "add_url_category",
            draft_json(None, draft),
            resource(json!({ "id": "CUSTOM_01", "configuredName": draft.configured_name })),
        )
    }

    async fn update_url_category(
        &self,
        category_id: &str,
        draft: &UrlCategoryDraft,
    ) -> RemoteOutcome<Resource> {
        self.record(
            "update_url_category",
            draft_json(Some(category_id), draft),
            resource(json!({ "id": category_id, "configuredName": draft.configured_name })),
        )
    }

    async fn add_urls_to_category(
        &self,
        category_id: &str,
        configured_name: &str,
        urls: &[String],
    ) -> RemoteOutcome<Resource> {
        self.record(
            "add_urls_to_category",
            json!({ "id": category_id, "configured_name": configured_name, "urls": urls }),
            resource(json!({ "id": category_id, "urls": urls })),
        )
    }

    async fn delete_urls_from_category(
        &self,
        category_id: &str,
        configured_name: &str,
        urls: &[String],
    ) -> RemoteOutcome<Resource> {
        self.record(
            "delete_urls_from_category",
            json!({ "id": category_id, "configured_name": configured_name, "urls": urls }),
            resource(json!({ "id": category_id, "urls": [] })),
        )
    }

    async fn delete_category(&self, category_id: &str) -> RemoteOutcome<()> {
        self.record("delete_category", json!(category_id), ())
    }
}

fn draft_json(id: Option<&str>, draft: &UrlCategoryDraft) -> Value {
    json!({
        "id": id,
        "configured_name": draft.configured_name,
        "super_category": draft.super_category,
        "description": draft.description,
        "custom_category": draft.custom_category,
        "urls": draft.urls,
        "keywords": draft.keywords,
        "ip_ranges": draft.ip_ranges,
    })
}

impl ZiaClient for RecordingClient {
    fn cloud_app_control(&self) -> &dyn CloudAppControlApi {
        self
    }

    fn device_management(&self) -> &dyn DeviceManagementApi {
        self
    }

    fn cloud_firewall(&self) -> &dyn CloudFirewallApi {
        self
    }

    fn url_categories(&self) -> &dyn UrlCategoriesApi {
        self
    }
}

struct RecordingResolver {
    client: Arc<RecordingClient>,
    available: bool,
}

impl ClientResolver for RecordingResolver {
    fn get_client(&self, service: &str, use_legacy: bool) -> Result<Arc<dyn ZiaClient>, ClientError> {
        self.client
            .resolutions
            .lock()
            .unwrap()
            .push((service.to_string(), use_legacy));
        if !self.available {
            return Err(ClientError::MissingCredentials("no credentials in test".into()));
        }
        let client: Arc<dyn ZiaClient> = self.client.clone();
        Ok(client)
    }
}

/// Context over a fresh spy, with no pacing delay.
pub fn recording_context() -> (ToolContext, Arc<RecordingClient>) {
    let client = Arc::new(RecordingClient::default());
    let resolver = Arc::new(RecordingResolver {
        client: client.clone(),
        available: true,
    });
    let ctx = ToolContext::new(resolver).with_url_lookup_delay(Duration::ZERO);
    (ctx, client)
}

pub fn unavailable_context() -> ToolContext {
    let resolver = Arc::new(RecordingResolver {
        client: Arc::new(RecordingClient::default()),
        available: false,
    });
    ToolContext::new(resolver).with_url_lookup_delay(Duration::ZERO)
}

pub fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

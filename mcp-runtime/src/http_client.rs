//! reqwest-backed implementation of the client contract.
//!
//! Thin by intent: one HTTP request per operation, no retries, no token
//! refresh. Credentials are taken as issued from [`ZiaSettings`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value, json};
use url::Url;
use zia_mcp_core::validate::{PortDirection, PortProtocol};
use zia_mcp_core::{PortDefinition, RemoteError, RemoteOutcome, ResponseMetadata};

use crate::client::{
    ClientError, ClientResolver, CloudAppControlApi, CloudFirewallApi, DeviceManagementApi,
    NetworkServiceDraft, NetworkServiceGroupDraft, QueryParams, Resource, UrlCategoriesApi,
    UrlCategoryDraft, ZiaClient,
};
use crate::util::{
    ACCESS_TOKEN_ENV, LEGACY_CLOUD_ENV, LEGACY_SESSION_ENV, ZiaSettings, client,
};

pub const SUPPORTED_SERVICE: &str = "zia";

#[derive(Debug, Clone)]
pub struct HttpClientResolver {
    settings: ZiaSettings,
}

impl HttpClientResolver {
    pub fn new(settings: ZiaSettings) -> Self {
        Self { settings }
    }

    pub fn from_env() -> Self {
        Self::new(ZiaSettings::from_env())
    }

    fn connection(&self, use_legacy: bool) -> Result<(Url, Auth), ClientError> {
        if use_legacy {
            let base = self.settings.legacy_base_url.as_deref().ok_or_else(|| {
                ClientError::MissingCredentials(format!(
                    "legacy mode needs {LEGACY_CLOUD_ENV} or a legacy base URL"
                ))
            })?;
            let session = self.settings.legacy_session.clone().ok_or_else(|| {
                ClientError::MissingCredentials(format!(
                    "legacy mode needs a session cookie in {LEGACY_SESSION_ENV}"
                ))
            })?;
            Ok((parse_base_url(base)?, Auth::Session(session)))
        } else {
            let token = self.settings.access_token.clone().ok_or_else(|| {
                ClientError::MissingCredentials(format!(
                    "set {ACCESS_TOKEN_ENV} or store an access_token in the credentials file"
                ))
            })?;
            Ok((
                parse_base_url(&self.settings.oneapi_base_url)?,
                Auth::Bearer(token),
            ))
        }
    }
}

impl ClientResolver for HttpClientResolver {
    fn get_client(&self, service: &str, use_legacy: bool) -> Result<Arc<dyn ZiaClient>, ClientError> {
        if !service.trim().eq_ignore_ascii_case(SUPPORTED_SERVICE) {
            return Err(ClientError::UnsupportedService(service.to_string()));
        }
        let (base_url, auth) = self.connection(use_legacy)?;
        tracing::debug!(base_url = %base_url, use_legacy, "resolved ZIA client");
        let handle: Arc<dyn ZiaClient> = Arc::new(HttpZiaClient {
            http: client(self.settings.timeout)?,
            base_url,
            auth,
        });
        Ok(handle)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw.trim()).map_err(|e| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "URL cannot carry a path".to_string(),
        });
    }
    Ok(url)
}

#[derive(Debug, Clone)]
enum Auth {
    Bearer(String),
    Session(String),
}

pub struct HttpZiaClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Auth,
}

impl HttpZiaClient {
    fn endpoint(&self, segments: &[&str], query: &[(String, String)]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| RemoteError::new("base URL cannot carry a path"))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        if !query.is_empty() {
            let mut qp = url.query_pairs_mut();
            for (k, v) in query {
                qp.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(String, String)],
        body: Option<Value>,
    ) -> RemoteOutcome<Value> {
        let url = match self.endpoint(segments, query) {
            Ok(url) => url,
            Err(err) => return RemoteOutcome::failed(err),
        };
        tracing::debug!(%method, path = url.path(), "sending ZIA API request");

        let mut request = self.http.request(method, url);
        request = match &self.auth {
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Session(session) => {
                request.header(reqwest::header::COOKIE, format!("JSESSIONID={session}"))
            }
        };
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return RemoteOutcome::failed(RemoteError::new(format!(
                    "request to ZIA API failed: {e}"
                )));
            }
        };
        let status = response.status().as_u16();
        let metadata = ResponseMetadata { status };
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return RemoteOutcome::failed(
                    RemoteError::new(format!("failed to read ZIA API response body: {e}"))
                        .with_status(status),
                )
                .with_metadata(metadata);
            }
        };
        let body = parse_response_body(&bytes);

        if status >= 400 {
            return RemoteOutcome::failed(
                RemoteError::new(error_message(status, &body)).with_status(status),
            )
            .with_metadata(metadata);
        }
        RemoteOutcome::ok(body).with_metadata(metadata)
    }
}

#[async_trait]
impl CloudAppControlApi for HttpZiaClient {
    async fn list_available_actions(
        &self,
        rule_type: &str,
        cloud_apps: &[String],
    ) -> RemoteOutcome<Vec<String>> {
        let outcome = self
            .send(
                Method::POST,
                &["webApplicationRules", rule_type, "availableActions"],
                &[],
                Some(json!({ "cloudApps": cloud_apps })),
            )
            .await;
        map_payload(outcome, into_strings)
    }
}

#[async_trait]
impl DeviceManagementApi for HttpZiaClient {
    async fn list_device_groups(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>> {
        let outcome = self.send(Method::GET, &["deviceGroups"], query, None).await;
        map_payload(outcome, into_resources)
    }

    async fn list_devices(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>> {
        let outcome = self
            .send(Method::GET, &["deviceGroups", "devices"], query, None)
            .await;
        map_payload(outcome, into_resources)
    }

    async fn list_devices_lite(&self) -> RemoteOutcome<Vec<Resource>> {
        let outcome = self
            .send(Method::GET, &["deviceGroups", "devices", "lite"], &[], None)
            .await;
        map_payload(outcome, into_resources)
    }
}

#[async_trait]
impl CloudFirewallApi for HttpZiaClient {
    async fn list_network_apps(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>> {
        let outcome = self
            .send(Method::GET, &["networkApplications"], query, None)
            .await;
        map_payload(outcome, into_resources)
    }

    async fn get_network_app(&self, app_id: &str) -> RemoteOutcome<Resource> {
        let outcome = self
            .send(Method::GET, &["networkApplications", app_id], &[], None)
            .await;
        map_payload(outcome, into_resource)
    }

    async fn list_network_services(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>> {
        let outcome = self.send(Method::GET, &["networkServices"], query, None).await;
        map_payload(outcome, into_resources)
    }

    async fn get_network_service(&self, service_id: &str) -> RemoteOutcome<Resource> {
        let outcome = self
            .send(Method::GET, &["networkServices", service_id], &[], None)
            .await;
        map_payload(outcome, into_resource)
    }

    async fn add_network_service(&self, draft: &NetworkServiceDraft) -> RemoteOutcome<Resource> {
        let body = network_service_body(draft, None);
        let outcome = self
            .send(Method::POST, &["networkServices"], &[], Some(body))
            .await;
        map_payload(outcome, into_resource)
    }

    async fn update_network_service(
        &self,
        service_id: &str,
        draft: &NetworkServiceDraft,
    ) -> RemoteOutcome<Resource> {
        let body = network_service_body(draft, Some(service_id));
        let outcome = self
            .send(Method::PUT, &["networkServices", service_id], &[], Some(body))
            .await;
        map_payload(outcome, into_resource)
    }

    async fn delete_network_service(&self, service_id: &str) -> RemoteOutcome<()> {
        let outcome = self
            .send(Method::DELETE, &["networkServices", service_id], &[], None)
            .await;
        map_payload(outcome, |_| Ok(()))
    }

    async fn list_network_svc_groups(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>> {
        let outcome = self
            .send(Method::GET, &["networkServiceGroups"], query, None)
            .await;
        map_payload(outcome, into_resources)
    }

    async fn get_network_svc_group(&self, group_id: &str) -> RemoteOutcome<Resource> {
        let outcome = self
            .send(Method::GET, &["networkServiceGroups", group_id], &[], None)
            .await;
        map_payload(outcome, into_resource)
    }

    async fn add_network_svc_group(
        &self,
        draft: &NetworkServiceGroupDraft,
    ) -> RemoteOutcome<Resource> {
        let body = network_service_group_body(draft, None);
        let outcome = self
            .send(Method::POST, &["networkServiceGroups"], &[], Some(body))
            .await;
        map_payload(outcome, into_resource)
    }

    async fn update_network_svc_group(
        &self,
        group_id: &str,
        draft: &NetworkServiceGroupDraft,
    ) -> RemoteOutcome<Resource> {
        let body = network_service_group_body(draft, Some(group_id));
        let outcome = self
            .send(Method::PUT, &["networkServiceGroups", group_id], &[], Some(body))
            .await;
        map_payload(outcome, into_resource)
    }

    async fn delete_network_svc_group(&self, group_id: &str) -> RemoteOutcome<()> {
        let outcome = self
            .send(Method::DELETE, &["networkServiceGroups", group_id], &[], None)
            .await;
        map_payload(outcome, |_| Ok(()))
    }
}

#[async_trait]
impl UrlCategoriesApi for HttpZiaClient {
    async fn list_categories(&self, query: &QueryParams) -> RemoteOutcome<Vec<Resource>> {
        let outcome = self.send(Method::GET, &["urlCategories"], query, None).await;
        map_payload(outcome, into_resources)
    }

    async fn lookup(&self, urls: &[String]) -> RemoteOutcome<Vec<Value>> {
        let outcome = self
            .send(Method::POST, &["urlLookup"], &[], Some(json!(urls)))
            .await;
        map_payload(outcome, |body| match body {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(format!("expected a JSON array from urlLookup, got {other}")),
        })
    }

    async fn get_category(&self, category_id: &str) -> RemoteOutcome<Resource> {
        let outcome = self
            .send(Method::GET, &["urlCategories", category_id], &[], None)
            .await;
        map_payload(outcome, into_resource)
    }

    async fn add_url_category(&self, draft: &UrlCategoryDraft) -> RemoteOutcome<Resource> {
        let body = url_category_body(draft, None);
        let outcome = self
            .send(Method::POST, &["urlCategories"], &[], Some(body))
            .await;
        map_payload(outcome, into_resource)
    }

    async fn update_url_category(
        &self,
        category_id: &str,
        draft: &UrlCategoryDraft,
    ) -> RemoteOutcome<Resource> {
        let body = url_category_body(draft, Some(category_id));
        let outcome = self
            .send(Method::PUT, &["urlCategories", category_id], &[], Some(body))
            .await;
        map_payload(outcome, into_resource)
    }

    async fn add_urls_to_category(
        &self,
        category_id: &str,
        configured_name: &str,
        urls: &[String],
    ) -> RemoteOutcome<Resource> {
        self.change_category_urls(category_id, configured_name, urls, "ADD_TO_LIST")
            .await
    }

    async fn delete_urls_from_category(
        &self,
        category_id: &str,
        configured_name: &str,
        urls: &[String],
    ) -> RemoteOutcome<Resource> {
        self.change_category_urls(category_id, configured_name, urls, "REMOVE_FROM_LIST")
            .await
    }

    async fn delete_category(&self, category_id: &str) -> RemoteOutcome<()> {
        let outcome = self
            .send(Method::DELETE, &["urlCategories", category_id], &[], None)
            .await;
        map_payload(outcome, |_| Ok(()))
    }
}

impl HttpZiaClient {
    async fn change_category_urls(
        &self,
        category_id: &str,
        configured_name: &str,
        urls: &[String],
        action: &str,
    ) -> RemoteOutcome<Resource> {
        let body = json!({
            "id": category_id,
            "configuredName": configured_name,
            "urls": urls,
        });
        let query = vec![("action".to_string(), action.to_string())];
        let outcome = self
            .send(Method::PUT, &["urlCategories", category_id], &query, Some(body))
            .await;
        map_payload(outcome, into_resource)
    }
}

impl ZiaClient for HttpZiaClient {
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

fn parse_response_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).to_string()))
}

/// ZIA errors usually arrive as `{"code": ..., "message": ...}`.
fn error_message(status: u16, body: &Value) -> String {
    let code = body.get("code").and_then(Value::as_str);
    let message = body.get("message").and_then(Value::as_str);
    match (code, message) {
        (Some(code), Some(message)) => format!("{code}: {message} (HTTP {status})"),
        (None, Some(message)) | (Some(message), None) => format!("{message} (HTTP {status})"),
        (None, None) => match body {
            Value::String(text) if !text.trim().is_empty() => format!("{} (HTTP {status})", text.trim()),
            _ => format!("HTTP {status}"),
        },
    }
}

fn map_payload<T>(
    outcome: RemoteOutcome<Value>,
    convert: impl FnOnce(Value) -> Result<T, String>,
) -> RemoteOutcome<T> {
    let RemoteOutcome {
        payload,
        metadata,
        error,
    } = outcome;
    let (payload, error) = match (payload, error) {
        (_, Some(error)) => (None, Some(error)),
        (Some(body), None) => match convert(body) {
            Ok(converted) => (Some(converted), None),
            Err(message) => {
                let mut error = RemoteError::new(message);
                error.status = metadata.map(|m| m.status);
                (None, Some(error))
            }
        },
        (None, None) => (None, None),
    };
    RemoteOutcome {
        payload,
        metadata,
        error,
    }
}

fn into_resource(body: Value) -> Result<Resource, String> {
    match body {
        Value::Object(fields) => Ok(Resource::new(fields)),
        Value::Null => Err("ZIA API returned an empty body".to_string()),
        other => Ok(Resource::from_value(other)),
    }
}

fn into_resources(body: Value) -> Result<Vec<Resource>, String> {
    match body {
        Value::Array(items) => Ok(items.into_iter().map(Resource::from_value).collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(format!("expected a JSON array, got {other}")),
    }
}

fn into_strings(body: Value) -> Result<Vec<String>, String> {
    let items = match body {
        Value::Array(items) => items,
        other => return Err(format!("expected a JSON array of strings, got {other}")),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(text) => Ok(text),
            other => Err(format!("expected a string action, got {other}")),
        })
        .collect()
}

/// Numeric identifiers are sent as JSON numbers, anything else verbatim.
fn id_value(id: &str) -> Value {
    id.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(id.to_string()))
}

fn port_number(port: &str) -> Value {
    port.parse::<u32>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(port.to_string()))
}

fn port_field(direction: PortDirection, protocol: PortProtocol) -> &'static str {
    match (direction, protocol) {
        (PortDirection::Src, PortProtocol::Tcp) => "srcTcpPorts",
        (PortDirection::Src, PortProtocol::Udp) => "srcUdpPorts",
        (PortDirection::Dest, PortProtocol::Tcp) => "destTcpPorts",
        (PortDirection::Dest, PortProtocol::Udp) => "destUdpPorts",
    }
}

fn network_service_body(draft: &NetworkServiceDraft, id: Option<&str>) -> Value {
    let mut body = Map::new();
    if let Some(id) = id {
        body.insert("id".into(), id_value(id));
    }
    body.insert("name".into(), json!(draft.name));
    body.insert("type".into(), json!("CUSTOM"));
    if let Some(description) = &draft.description {
        body.insert("description".into(), json!(description));
    }
    if let Some(ports) = &draft.ports {
        // A supplied port list replaces all four ranges, so unused ones are sent empty.
        for field in ["srcTcpPorts", "destTcpPorts", "srcUdpPorts", "destUdpPorts"] {
            body.insert(field.into(), Value::Array(Vec::new()));
        }
        for port in ports {
            if let Some(Value::Array(ranges)) = body.get_mut(port_field(port.direction, port.protocol)) {
                ranges.push(port_range(port));
            }
        }
    }
    Value::Object(body)
}

fn port_range(port: &PortDefinition) -> Value {
    let mut range = json!({ "start": port_number(&port.start) });
    if let Some(end) = &port.end {
        range["end"] = port_number(end);
    }
    range
}

fn network_service_group_body(draft: &NetworkServiceGroupDraft, id: Option<&str>) -> Value {
    let mut body = Map::new();
    if let Some(id) = id {
        body.insert("id".into(), id_value(id));
    }
    body.insert("name".into(), json!(draft.name));
    if let Some(description) = &draft.description {
        body.insert("description".into(), json!(description));
    }
    if let Some(service_ids) = &draft.service_ids {
        let services: Vec<Value> = service_ids
            .iter()
            .map(|id| json!({ "id": id_value(id) }))
            .collect();
        body.insert("services".into(), Value::Array(services));
    }
    Value::Object(body)
}

fn url_category_body(draft: &UrlCategoryDraft, id: Option<&str>) -> Value {
    let mut body = Map::new();
    if let Some(id) = id {
        body.insert("id".into(), json!(id));
    }
    body.insert("configuredName".into(), json!(draft.configured_name));
    let scalars = [
        ("superCategory", draft.super_category.as_ref().map(|v| json!(v))),
        ("description", draft.description.as_ref().map(|v| json!(v))),
        ("customCategory", draft.custom_category.map(Value::Bool)),
    ];
    let lists = [
        ("urls", &draft.urls),
        ("keywords", &draft.keywords),
        ("ipRanges", &draft.ip_ranges),
        ("dbCategorizedUrls", &draft.db_categorized_urls),
        (
            "keywordsRetainingParentCategory",
            &draft.keywords_retaining_parent_category,
        ),
        (
            "ipRangesRetainingParentCategory",
            &draft.ip_ranges_retaining_parent_category,
        ),
    ];
    for (key, value) in scalars {
        if let Some(value) = value {
            body.insert(key.into(), value);
        }
    }
    for (key, value) in lists {
        if let Some(items) = value {
            body.insert(key.into(), json!(items));
        }
    }
    Value::Object(body)
}

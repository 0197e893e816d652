//! Api middleware: HTTP calls described by `meta.api`
//!
//! ```ignore
//! store.dispatch(
//!     StateAction::new("FETCH_USER").with_meta("api", json!({"url": "/users/7"})),
//! );
//! // FETCH_USER_REQUEST is reduced before dispatch returns; the response
//! // arrives later as FETCH_USER_SUCCESS or FETCH_USER_FAILURE.
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{Chain, Middleware};
use crate::action::{Payload, StateAction};
use crate::error::ApiFailure;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How the response body is decoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    /// Base64 string
    Blob,
    /// Base64 string
    ArrayBuffer,
}

/// The `meta.api` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    #[serde(default)]
    pub response_type: ResponseType,
    #[serde(default)]
    pub with_credentials: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Client-wide api settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Prefix for relative request urls
    pub base_url: Option<String>,
    /// Bearer token sent on requests with `withCredentials`
    pub credentials: Option<String>,
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            credentials: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ApiConfig {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn credentials(mut self, token: impl Into<String>) -> Self {
        self.credentials = Some(token.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            None => url.to_string(),
        }
    }
}

/// Performs `meta.api` requests on the tokio runtime
///
/// The original action is replaced by `<TYPE>_REQUEST` (carrying the
/// original payload) and exactly one of `<TYPE>_SUCCESS` / `<TYPE>_FAILURE`.
/// Derived actions keep the original meta minus `api`.
#[derive(Debug, Clone)]
pub struct ApiMiddleware {
    client: reqwest::Client,
    config: ApiConfig,
}

impl Default for ApiMiddleware {
    fn default() -> Self {
        Self::new(ApiConfig::default())
    }
}

impl ApiMiddleware {
    pub fn new(config: ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }
}

fn derive(action: &StateAction, suffix: &str) -> StateAction {
    let mut derived = action.derived(suffix);
    derived.meta.remove("api");
    derived
}

impl<S> Middleware<S> for ApiMiddleware {
    fn handle(&mut self, action: StateAction, chain: &mut Chain<'_, S>) {
        let Some(spec) = action.meta.get("api").cloned() else {
            chain.next(action);
            return;
        };

        let mut request_action = derive(&action, "REQUEST");
        if let Payload::Value(payload) = &action.payload {
            request_action.payload = Payload::Value(payload.clone());
        }
        chain.dispatch(request_action);

        let failure = derive(&action, "FAILURE");
        let request = match serde_json::from_value::<ApiRequest>(spec) {
            Ok(request) => request,
            Err(e) => {
                warn!(action = %action.kind, error = %e, "Invalid meta.api");
                let reason = ApiFailure::InvalidRequest(e.to_string());
                chain.dispatch(failure.with_payload(reason.to_payload()));
                return;
            }
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(action = %action.kind, "No async runtime for api request");
            let reason = ApiFailure::Network("no async runtime available".to_string());
            chain.dispatch(failure.with_payload(reason.to_payload()));
            return;
        };

        let success = derive(&action, "SUCCESS");
        let dispatcher = chain.dispatcher();
        let client = self.client.clone();
        let config = self.config.clone();
        debug!(action = %action.kind, url = %request.url, method = %request.method, "Api request");
        handle.spawn(async move {
            let terminal = match perform(&client, &config, &request).await {
                Ok(data) => success.with_payload(data),
                Err(e) => {
                    debug!(action = %failure.kind, error = %e, "Api request failed");
                    failure.with_payload(e.to_payload())
                }
            };
            dispatcher.dispatch(terminal);
        });
    }
}

async fn perform(
    client: &reqwest::Client,
    config: &ApiConfig,
    request: &ApiRequest,
) -> Result<Value, ApiFailure> {
    let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
        .map_err(|_| ApiFailure::InvalidRequest(format!("unknown method {}", request.method)))?;
    let mut builder = client.request(method, config.resolve(&request.url));

    if !request.params.is_empty() {
        let query: Vec<(&str, String)> = request
            .params
            .iter()
            .map(|(key, value)| (key.as_str(), query_value(value)))
            .collect();
        builder = builder.query(&query);
    }
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if request.with_credentials {
        if let Some(token) = &config.credentials {
            builder = builder.bearer_auth(token);
        }
    }
    builder = match &request.body {
        None | Some(Value::Null) => builder,
        Some(Value::String(text)) => builder.body(text.clone()),
        Some(body) => builder.json(body),
    };

    let response = builder
        .send()
        .await
        .map_err(|e| ApiFailure::Network(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let text = response.text().await.unwrap_or_default();
        let data = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        return Err(ApiFailure::Status {
            status: status.as_u16(),
            status_text,
            data,
        });
    }

    match request.response_type {
        ResponseType::Json => {
            let text = response
                .text()
                .await
                .map_err(|e| ApiFailure::Network(e.to_string()))?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(|e| ApiFailure::Decode(e.to_string()))
        }
        ResponseType::Text => response
            .text()
            .await
            .map(Value::String)
            .map_err(|e| ApiFailure::Network(e.to_string())),
        ResponseType::Blob | ResponseType::ArrayBuffer => {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ApiFailure::Network(e.to_string()))?;
            Ok(Value::String(
                base64::engine::general_purpose::STANDARD.encode(bytes),
            ))
        }
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use serde_json::json;

    type Log = Vec<(String, Option<Value>)>;

    fn log(state: &Log, action: &StateAction) -> Option<Log> {
        let mut next = state.clone();
        next.push((action.kind.clone(), action.payload_value().cloned()));
        Some(next)
    }

    fn kinds(store: &Store<Log>) -> Vec<String> {
        store.state().iter().map(|(k, _)| k.clone()).collect()
    }

    fn store(config: ApiConfig) -> Store<Log> {
        Store::new(Log::new())
            .with_reducer("log", log)
            .with_middleware(ApiMiddleware::new(config))
    }

    #[tokio::test]
    async fn test_success_dispatches_request_then_success() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/users/7"))
            .and(wiremock::matchers::query_param("expand", "true"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_raw(json!({"id": 7, "name": "Ada"}).to_string(), "application/json"),
            )
            .mount(&server)
            .await;

        let mut store = store(ApiConfig::default().base_url(server.uri()));
        store.dispatch(
            StateAction::new("FETCH_USER")
                .with_payload(7)
                .with_meta("api", json!({"url": "/users/7", "params": {"expand": true}})),
        );
        assert_eq!(kinds(&store), vec!["FETCH_USER_REQUEST"]);
        assert_eq!(store.state()[0].1, Some(json!(7)));

        assert!(store.next_async().await);
        assert_eq!(kinds(&store), vec!["FETCH_USER_REQUEST", "FETCH_USER_SUCCESS"]);
        assert_eq!(store.state()[1].1, Some(json!({"id": 7, "name": "Ada"})));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!store.process_pending());
    }

    #[tokio::test]
    async fn test_http_error_dispatches_single_failure() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/save"))
            .respond_with(
                wiremock::ResponseTemplate::new(500)
                    .set_body_raw(json!({"error": "boom"}).to_string(), "application/json"),
            )
            .mount(&server)
            .await;

        let mut store = store(ApiConfig::default().base_url(server.uri()));
        store.dispatch(
            StateAction::new("SAVE")
                .with_meta("api", json!({"url": "/save", "method": "post", "body": {"a": 1}})),
        );
        store.next_async().await;

        assert_eq!(kinds(&store), vec!["SAVE_REQUEST", "SAVE_FAILURE"]);
        let payload = store.state()[1].1.clone().unwrap();
        assert_eq!(payload["status"], 500);
        assert_eq!(payload["statusText"], "Internal Server Error");
        assert_eq!(payload["data"], json!({"error": "boom"}));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!store.process_pending());
    }

    #[tokio::test]
    async fn test_credentials_and_text_response() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/me"))
            .and(wiremock::matchers::header("authorization", "Bearer secret"))
            .and(wiremock::matchers::header("x-client", "morpheo"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let mut store = store(
            ApiConfig::default()
                .base_url(server.uri())
                .credentials("secret"),
        );
        store.dispatch(StateAction::new("ME").with_meta(
            "api",
            json!({
                "url": "/me",
                "headers": {"x-client": "morpheo"},
                "responseType": "text",
                "withCredentials": true
            }),
        ));
        store.next_async().await;

        assert_eq!(kinds(&store), vec!["ME_REQUEST", "ME_SUCCESS"]);
        assert_eq!(store.state()[1].1, Some(json!("hello")));
    }

    #[tokio::test]
    async fn test_blob_response_is_base64() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(vec![1_u8, 2, 3]))
            .mount(&server)
            .await;

        let mut store = store(ApiConfig::default());
        store.dispatch(StateAction::new("FILE").with_meta(
            "api",
            json!({"url": format!("{}/file", server.uri()), "responseType": "blob"}),
        ));
        store.next_async().await;

        assert_eq!(store.state()[1].1, Some(json!("AQID")));
    }

    #[tokio::test]
    async fn test_network_error_is_failure() {
        let mut store = store(ApiConfig::default().timeout(Duration::from_secs(2)));
        store.dispatch(
            StateAction::new("PING").with_meta("api", json!({"url": "http://127.0.0.1:1/ping"})),
        );
        store.next_async().await;

        assert_eq!(kinds(&store), vec!["PING_REQUEST", "PING_FAILURE"]);
        let payload = store.state()[1].1.clone().unwrap();
        assert!(payload["message"].as_str().unwrap().starts_with("request failed"));
    }

    #[test]
    fn test_invalid_meta_fails_synchronously() {
        let mut store = store(ApiConfig::default());
        store.dispatch(StateAction::new("BAD").with_meta("api", json!({"method": "GET"})));

        assert_eq!(kinds(&store), vec!["BAD_REQUEST", "BAD_FAILURE"]);
        let payload = store.state()[1].1.clone().unwrap();
        assert!(payload["message"]
            .as_str()
            .unwrap()
            .starts_with("invalid api request"));
    }

    #[test]
    fn test_without_runtime_fails_immediately() {
        let mut store = store(ApiConfig::default());
        store.dispatch(StateAction::new("LOAD").with_meta("api", json!({"url": "/x"})));
        assert_eq!(kinds(&store), vec!["LOAD_REQUEST", "LOAD_FAILURE"]);
    }

    #[test]
    fn test_actions_without_meta_pass_through() {
        let mut store = store(ApiConfig::default());
        store.dispatch(StateAction::new("LOCAL"));
        assert_eq!(kinds(&store), vec!["LOCAL"]);
    }

    #[test]
    fn test_resolve_url() {
        let config = ApiConfig::default().base_url("http://api.test/v1/");
        assert_eq!(config.resolve("/users"), "http://api.test/v1/users");
        assert_eq!(config.resolve("https://other.test/x"), "https://other.test/x");
    }
}

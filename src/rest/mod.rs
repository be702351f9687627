//! Single-shot REST calls.
//!
//! An [`ApiRequest`] describes one call: method, endpoint template, path and query parameters
//! and an optional body. [`crate::Client::send_request`] resolves it against the current
//! [`Config`] snapshot, sends it, and maps any failure onto the error taxonomy.
//!
//! ```no_run
//! use netlayer::{ApiRequest, Client, Config};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct Login<'a> {
//!     username: &'a str,
//!     password: &'a str,
//! }
//!
//! #[derive(Deserialize)]
//! struct Session {
//!     token: String,
//! }
//!
//! # async fn example() -> netlayer::Result<()> {
//! let config = Config::builder()
//!     .rest_base_url("https://api.example.com")
//!     .socket_base_url("wss://ws.example.com")
//!     .build();
//! let client = Client::new(config)?;
//!
//! let request = ApiRequest::post("/auth/{tenant}/login")
//!     .path_param("tenant", "acme")
//!     .json(&Login { username: "ada", password: "hunter2" });
//! let session: Session = client.send_request(request).await?;
//! client.set_bearer_token(session.token);
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "multipart")]
pub mod upload;

use std::collections::HashMap;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Result;
use crate::config::Config;
use crate::exception::ExceptionHandler;
use crate::serde_helpers;
#[cfg(feature = "multipart")]
use upload::Upload;

/// Structured error body some servers return on non-`2xx` responses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

#[derive(Debug)]
enum Body {
    Json(serde_json::Result<String>),
    #[cfg(feature = "multipart")]
    Multipart(Upload),
}

/// Description of a single REST call.
#[derive(Debug)]
pub struct ApiRequest {
    method: Method,
    endpoint: String,
    path_params: HashMap<String, String>,
    query: Vec<(String, String)>,
    body: Option<Body>,
}

impl ApiRequest {
    /// `endpoint` is appended to the configured REST base URL and may contain `{name}`
    /// placeholders filled by [`Self::path_param`].
    #[must_use]
    pub fn new<S: Into<String>>(method: Method, endpoint: S) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            path_params: HashMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get<S: Into<String>>(endpoint: S) -> Self {
        Self::new(Method::GET, endpoint)
    }

    #[must_use]
    pub fn post<S: Into<String>>(endpoint: S) -> Self {
        Self::new(Method::POST, endpoint)
    }

    #[must_use]
    pub fn put<S: Into<String>>(endpoint: S) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    #[must_use]
    pub fn patch<S: Into<String>>(endpoint: S) -> Self {
        Self::new(Method::PATCH, endpoint)
    }

    #[must_use]
    pub fn delete<S: Into<String>>(endpoint: S) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn path_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.path_params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn path_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.path_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn query_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn query_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Repeats `key` once per value, e.g. `ids=1&ids=2`.
    #[must_use]
    pub fn query_values<K, I, V>(mut self, key: K, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let key = key.into();
        self.query.extend(
            values
                .into_iter()
                .map(|value| (key.clone(), value.to_string())),
        );
        self
    }

    /// Encodes `body` as the JSON payload. An encoding failure is reported when the request is
    /// sent.
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        self.body = Some(Body::Json(serde_json::to_string(body)));
        self
    }

    /// Sends `upload` as a `multipart/form-data` body.
    #[cfg(feature = "multipart")]
    #[must_use]
    pub fn upload(mut self, upload: Upload) -> Self {
        self.body = Some(Body::Multipart(upload));
        self
    }
}

/// Substitutes `{name}` placeholders in `endpoint`.
///
/// Placeholders without a matching parameter are left as they are, unless `strict` is set, in
/// which case the name of the first unresolved placeholder is returned as the error.
pub(crate) fn resolve_path(
    endpoint: &str,
    params: &HashMap<String, String>,
    strict: bool,
) -> std::result::Result<String, String> {
    let mut resolved = String::with_capacity(endpoint.len());
    let mut rest = endpoint;

    while let Some((head, tail)) = rest.split_once('{') {
        resolved.push_str(head);
        let Some((name, after)) = tail.split_once('}') else {
            resolved.push('{');
            rest = tail;
            break;
        };

        match params.get(name) {
            Some(value) => resolved.push_str(value),
            None if strict => return Err(name.to_owned()),
            None => {
                resolved.push('{');
                resolved.push_str(name);
                resolved.push('}');
            }
        }
        rest = after;
    }
    resolved.push_str(rest);

    Ok(resolved)
}

/// Sends `request` and returns the response if its status is `2xx`.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(method = %request.method, endpoint = %request.endpoint, status_code)
)]
pub(crate) async fn execute(
    client: &ReqwestClient,
    config: &Config,
    exceptions: &ExceptionHandler,
    request: ApiRequest,
) -> Result<Response> {
    let logging = config.logging_enabled();
    let ApiRequest {
        method,
        endpoint,
        path_params,
        query,
        body,
    } = request;

    let path = resolve_path(&endpoint, &path_params, config.strict_path_params()).map_err(
        |name| exceptions.validation(format!("no value for path parameter `{name}` in `{endpoint}`")),
    )?;
    let url = Url::parse(&format!("{}{path}", config.rest_base_url()))
        .map_err(|e| exceptions.unknown(e))?;
    let headers = config
        .request_headers()
        .map_err(|e| exceptions.unknown(e))?;

    let mut builder = client.request(method.clone(), url).headers(headers);
    if !query.is_empty() {
        builder = builder.query(&query);
    }
    match body {
        Some(Body::Json(Ok(json))) => {
            builder = builder
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(json);
        }
        Some(Body::Json(Err(e))) => return Err(exceptions.handle_decode(e)),
        #[cfg(feature = "multipart")]
        Some(Body::Multipart(upload)) => {
            builder = builder.multipart(upload.into_form().map_err(|e| exceptions.unknown(e))?);
        }
        None => {}
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => {
            if logging {
                tracing::warn!(method = %method, path = %path, error = %e, "request could not be sent");
            }
            return Err(exceptions.handle_network(e));
        }
    };
    let status_code = response.status();
    tracing::Span::current().record("status_code", status_code.as_u16());

    if status_code.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let api_message = match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(error) => error.message,
        Err(e) => {
            if logging {
                tracing::debug!(error = %e, "cannot decode error response");
            }
            None
        }
    };

    if logging {
        tracing::warn!(
            status = %status_code,
            method = %method,
            path = %path,
            message = ?api_message,
            "API request failed"
        );
    }

    Err(exceptions.handle_http(status_code, method, path, api_message.as_deref()))
}

/// Reads the body of a successful `response` and decodes it as `T`.
pub(crate) async fn decode<T: DeserializeOwned>(
    response: Response,
    config: &Config,
    exceptions: &ExceptionHandler,
) -> Result<T> {
    let text = response
        .text()
        .await
        .map_err(|e| exceptions.handle_network(e))?;

    serde_helpers::decode(&text, config.logging_enabled()).map_err(|e| exceptions.handle_decode(e))
}

//! Fetch transport seam and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use feedshelf_core::{DataSource, PrefetchConfig};

use crate::error::TransportError;

/// Performs the fetch described by a [`DataSource`].
///
/// Implementations must return [`TransportError::Cancelled`] promptly once
/// `cancel` fires; the scheduler cancels the token when its input changes.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, source: &DataSource, cancel: &CancellationToken) -> Result<Value, TransportError>;
}

/// [`Transport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl HttpTransport {
    /// Create a transport. Relative URL templates are joined onto `base_url`.
    pub fn new(base_url: Option<&str>, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = base_url
            .map(|raw| Url::parse(raw).map_err(|e| TransportError::Url(format!("{raw}: {e}"))))
            .transpose()?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &PrefetchConfig) -> Result<Self, TransportError> {
        Self::new(config.base_url.as_deref(), config.fetch_timeout())
    }

    /// Expand the template, resolve against the base URL and append query parameters.
    pub fn build_url(&self, source: &DataSource) -> Result<Url, TransportError> {
        let expanded = expand_template(&source.url, &source.options.path_variables)?;
        let mut url = match Url::parse(&expanded) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base_url.as_ref().ok_or_else(|| {
                    TransportError::Url(format!("relative URL without base: {expanded}"))
                })?;
                base.join(&expanded)
                    .map_err(|e| TransportError::Url(format!("{expanded}: {e}")))?
            }
            Err(e) => return Err(TransportError::Url(format!("{expanded}: {e}"))),
        };

        if !source.options.request_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &source.options.request_params {
                match value {
                    Value::Array(values) => {
                        for v in values.iter().filter_map(param_string) {
                            pairs.append_pair(key, &v);
                        }
                    }
                    other => {
                        if let Some(v) = param_string(other) {
                            pairs.append_pair(key, &v);
                        }
                    }
                }
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, source: &DataSource, cancel: &CancellationToken) -> Result<Value, TransportError> {
        let url = self.build_url(source)?;
        let method_name = source.method_or_default();
        let method = reqwest::Method::from_bytes(method_name.as_bytes())
            .map_err(|_| TransportError::Url(format!("invalid HTTP method: {method_name}")))?;

        let mut request = self.client.request(method, url.clone());
        for (key, value) in &source.options.headers {
            if let Some(value) = param_string(value) {
                request = request.header(key.as_str(), value);
            }
        }
        if let Some(body) = &source.options.request_body {
            request = request.json(body);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = send_json(request) => result,
        };

        tracing::debug!(url = %url, ok = result.is_ok(), "data source fetched");
        result
    }
}

async fn send_json(request: reqwest::RequestBuilder) -> Result<Value, TransportError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status(status.as_u16()));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| TransportError::Decode(e.to_string()))
}

/// Expand `{name}` placeholders. Undefined variables expand to nothing.
pub fn expand_template(template: &str, vars: &serde_json::Map<String, Value>) -> Result<String, TransportError> {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            result.push(ch);
            continue;
        }
        let mut name = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            name.push(c);
        }
        if !closed {
            return Err(TransportError::Url(format!("unclosed template expression in: {template}")));
        }
        if let Some(value) = vars.get(name.trim()).and_then(param_string) {
            result.push_str(&urlencoding::encode(&value));
        }
    }

    Ok(result)
}

fn param_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedshelf_core::DataSourceOptions;
    use serde_json::json;

    fn vars(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn source(url: &str, options: DataSourceOptions) -> DataSource {
        DataSource {
            url: url.to_string(),
            method: None,
            options,
        }
    }

    #[test]
    fn expands_and_encodes_variables() {
        let out = expand_template("/users/{id}/files/{name}", &vars(json!({"id": 42, "name": "a b/c"}))).unwrap();
        assert_eq!(out, "/users/42/files/a%20b%2Fc");
    }

    #[test]
    fn undefined_variable_expands_to_nothing() {
        let out = expand_template("/x/{missing}/y", &vars(json!({}))).unwrap();
        assert_eq!(out, "/x//y");
    }

    #[test]
    fn unclosed_expression_is_an_error() {
        assert!(matches!(
            expand_template("/x/{oops", &vars(json!({}))),
            Err(TransportError::Url(_))
        ));
    }

    #[test]
    fn relative_url_joins_base_and_appends_query() {
        let transport = HttpTransport::new(Some("https://feed.example.com"), Duration::from_secs(1)).unwrap();
        let options = DataSourceOptions {
            path_variables: vars(json!({"user": "u1"})),
            request_params: vars(json!({"limit": 5, "tag": ["a", "b"], "skip": null})),
            ..Default::default()
        };
        let url = transport.build_url(&source("/api/{user}/events", options)).unwrap();
        assert_eq!(url.path(), "/api/u1/events");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("limit".to_string(), "5".to_string())));
        assert!(query.contains(&("tag".to_string(), "a".to_string())));
        assert!(query.contains(&("tag".to_string(), "b".to_string())));
        assert!(!query.iter().any(|(k, _)| k == "skip"));
    }

    #[test]
    fn absolute_url_ignores_base() {
        let transport = HttpTransport::new(Some("https://feed.example.com"), Duration::from_secs(1)).unwrap();
        let url = transport
            .build_url(&source("https://other.example.com/x", DataSourceOptions::default()))
            .unwrap();
        assert_eq!(url.host_str(), Some("other.example.com"));
    }

    #[test]
    fn relative_url_without_base_is_an_error() {
        let transport = HttpTransport::new(None, Duration::from_secs(1)).unwrap();
        assert!(matches!(
            transport.build_url(&source("/api/x", DataSourceOptions::default())),
            Err(TransportError::Url(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let transport = HttpTransport::new(Some("http://127.0.0.1:9"), Duration::from_secs(1)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = transport
            .fetch(&source("/never", DataSourceOptions::default()), &cancel)
            .await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }
}

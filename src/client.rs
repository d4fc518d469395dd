use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::{
    header::{HeaderName, HeaderValue, ACCEPT},
    multipart::{Form, Part},
    Method,
};
use serde_json::Value;

use crate::{
    errors::{Error, Result, TransportError, TransportErrorKind},
    http::{parse_api_error_parts, request_id_from_headers, HeaderList, RequestOptions},
    kind::WorkflowKind,
    machine::{MachineOptions, WorkflowMachine},
    packager::{MultipartPart, TransportBody},
    telemetry::{HttpRequestMetrics, MetricsCallbacks, RequestContext, Telemetry},
    transport::{BoxFuture, Transport},
    DEFAULT_BASE_URL, DEFAULT_CLIENT_HEADER, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    REQUEST_ID_HEADER,
};

/// Environment variable overriding the service origin.
pub const BASE_URL_ENV: &str = "CONSTRUCTAI_BASE_URL";
/// Environment variable overriding the request timeout, in whole seconds.
pub const TIMEOUT_ENV: &str = "CONSTRUCTAI_TIMEOUT_SECS";

const CLIENT_HEADER: &str = "X-ConstructAI-Client";

#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Service origin (defaults to `http://localhost:8000`).
    pub base_url: Option<String>,
    pub client_header: Option<String>,
    pub http_client: Option<reqwest::Client>,
    /// Override the connect timeout (defaults to 5s).
    pub connect_timeout: Option<Duration>,
    /// Override the request timeout (defaults to 120s).
    pub timeout: Option<Duration>,
    /// Default extra headers applied to all requests.
    pub default_headers: Option<HeaderList>,
    /// Optional metrics callbacks (HTTP latency).
    pub metrics: Option<MetricsCallbacks>,
}

impl Config {
    /// Defaults overlaid with `CONSTRUCTAI_BASE_URL` and
    /// `CONSTRUCTAI_TIMEOUT_SECS` when they are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Config::default();
        if let Some(base) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            cfg.base_url = Some(base.trim().to_string());
        }
        if let Some(raw) = lookup(TIMEOUT_ENV).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{TIMEOUT_ENV} must be whole seconds, got {raw:?}")))?;
            if secs == 0 {
                return Err(Error::Config(format!("{TIMEOUT_ENV} must be greater than zero")));
            }
            cfg.timeout = Some(Duration::from_secs(secs));
        }
        Ok(cfg)
    }
}

/// HTTP transport for the analysis service.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: reqwest::Url,
    client_header: Option<String>,
    http: reqwest::Client,
    request_timeout: Duration,
    default_headers: Option<HeaderList>,
    telemetry: Telemetry,
}

impl Client {
    pub fn new(cfg: Config) -> Result<Self> {
        let base_source = cfg
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base = base_source.trim_end_matches('/').to_string();
        let base_url = reqwest::Url::parse(&base)
            .map_err(|err| Error::Config(format!("invalid base url: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("invalid base url: {base}")));
        }

        let connect_timeout = cfg.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let request_timeout = cfg.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http = match cfg.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .connect_timeout(connect_timeout)
                .build()
                .map_err(|err| {
                    TransportError::new(TransportErrorKind::Connect, "failed to build http client")
                        .with_source(err)
                })?,
        };

        let client_header = cfg
            .client_header
            .filter(|s| !s.trim().is_empty())
            .or_else(|| Some(DEFAULT_CLIENT_HEADER.to_string()));

        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url,
                client_header,
                http,
                request_timeout,
                default_headers: cfg.default_headers,
                telemetry: Telemetry::new(cfg.metrics),
            }),
        })
    }

    /// Client built from [`Config::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }

    pub fn base_url(&self) -> &str {
        self.inner.base_url.as_str()
    }

    /// A fresh workflow instance submitting through this client.
    pub fn workflow(&self, kind: WorkflowKind) -> WorkflowMachine<Client> {
        self.workflow_with_options(kind, MachineOptions::default())
    }

    pub fn workflow_with_options(
        &self,
        kind: WorkflowKind,
        options: MachineOptions,
    ) -> WorkflowMachine<Client> {
        WorkflowMachine::with_options(kind, self.clone(), options)
    }

    /// POST a packaged body to the workflow's endpoint and return the raw
    /// JSON report.
    pub async fn post(
        &self,
        kind: WorkflowKind,
        body: TransportBody,
        options: RequestOptions,
    ) -> Result<Value> {
        let inner = &self.inner;
        let path = kind.path();
        let mut builder = inner.request(Method::POST, &path)?;
        let accept_json = Some("application/json");
        builder = match body {
            TransportBody::Json(map) => builder.json(&Value::Object(map)),
            TransportBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };
        builder = inner.with_headers(
            builder,
            options.request_id.as_deref(),
            &options.headers,
            accept_json,
        )?;
        builder = inner.with_timeout(builder, options.timeout);

        let ctx = RequestContext::new(kind, Method::POST.as_str())
            .with_request_id(options.request_id.clone());
        inner.execute_json(builder, ctx).await
    }
}

impl Transport for Client {
    fn send(
        &self,
        kind: WorkflowKind,
        body: TransportBody,
        options: RequestOptions,
    ) -> BoxFuture<'_, Result<Value>> {
        Box::pin(self.post(kind, body, options))
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("request_timeout", &self.inner.request_timeout)
            .finish()
    }
}

fn build_form(parts: Vec<MultipartPart>) -> Result<Form> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            MultipartPart::Text { name, value } => form.text(name, value),
            MultipartPart::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                let file = Part::bytes(bytes)
                    .file_name(filename)
                    .mime_str(&content_type)
                    .map_err(|err| Error::Config(format!("invalid content type: {err}")))?;
                form.part(name, file)
            }
        };
    }
    Ok(form)
}

fn apply_header_list(
    mut builder: reqwest::RequestBuilder,
    headers: &HeaderList,
) -> Result<reqwest::RequestBuilder> {
    for entry in headers.iter() {
        if !entry.is_valid() {
            continue;
        }
        let name = HeaderName::from_bytes(entry.key.trim().as_bytes())
            .map_err(|err| Error::Config(format!("invalid header name: {err}")))?;
        let val = HeaderValue::from_str(entry.value.trim())
            .map_err(|err| Error::Config(format!("invalid header value: {err}")))?;
        builder = builder.header(name, val);
    }
    Ok(builder)
}

impl ClientInner {
    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let mut url = self.base_url.clone();
        let joined = format!("{}{}", url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        Ok(self.http.request(method, url))
    }

    fn with_headers(
        &self,
        mut builder: reqwest::RequestBuilder,
        request_id: Option<&str>,
        headers: &HeaderList,
        accept: Option<&str>,
    ) -> Result<reqwest::RequestBuilder> {
        if let Some(accept) = accept {
            builder = builder.header(ACCEPT, accept);
        }
        if let Some(req_id) = request_id {
            if !req_id.trim().is_empty() {
                builder = builder.header(REQUEST_ID_HEADER, req_id);
            }
        }
        if let Some(client_header) = self.client_header.as_deref() {
            builder = builder.header(CLIENT_HEADER, client_header);
        }
        if let Some(defaults) = &self.default_headers {
            builder = apply_header_list(builder, defaults)?;
        }
        builder = apply_header_list(builder, headers)?;
        Ok(builder)
    }

    fn with_timeout(
        &self,
        builder: reqwest::RequestBuilder,
        timeout: Option<Duration>,
    ) -> reqwest::RequestBuilder {
        builder.timeout(timeout.unwrap_or(self.request_timeout))
    }

    async fn execute_json(
        &self,
        builder: reqwest::RequestBuilder,
        ctx: RequestContext,
    ) -> Result<Value> {
        #[cfg(feature = "tracing")]
        {
            use tracing::Instrument;
            let span = tracing::debug_span!(
                "constructai.http",
                workflow = %ctx.kind,
                method = %ctx.method,
                path = %ctx.path,
            );
            return self.send_and_parse(builder, ctx).instrument(span).await;
        }
        #[cfg(not(feature = "tracing"))]
        self.send_and_parse(builder, ctx).await
    }

    async fn send_and_parse(
        &self,
        builder: reqwest::RequestBuilder,
        ctx: RequestContext,
    ) -> Result<Value> {
        let start = Instant::now();
        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(err) => {
                if self.telemetry.http_enabled() {
                    self.telemetry.record_http(HttpRequestMetrics {
                        latency: start.elapsed(),
                        status: None,
                        error: Some(err.to_string()),
                        context: ctx.clone(),
                    });
                }
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %err, "transport error");
                return Err(to_transport_error(err));
            }
        };

        let status = resp.status();
        let headers = resp.headers().clone();
        let mut http_ctx = ctx;
        if http_ctx.request_id.is_none() {
            http_ctx.request_id = request_id_from_headers(&headers);
        }
        if self.telemetry.http_enabled() {
            self.telemetry.record_http(HttpRequestMetrics {
                latency: start.elapsed(),
                status: Some(status.as_u16()),
                error: (!status.is_success()).then(|| format!("http {}", status.as_u16())),
                context: http_ctx.clone(),
            });
        }

        if !status.is_success() {
            #[cfg(feature = "tracing")]
            tracing::warn!(status = %status, "request failed; returning error");
            let body = resp.text().await.unwrap_or_default();
            let status_text = status.canonical_reason().unwrap_or("request failed");
            return Err(parse_api_error_parts(
                status.as_u16(),
                status_text,
                request_id_from_headers(&headers).or(http_ctx.request_id),
                body,
            ));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            status = %status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request completed"
        );
        let bytes = resp.bytes().await.map_err(to_transport_error)?;
        let parsed = serde_json::from_slice::<Value>(&bytes).map_err(Error::Serialization)?;
        Ok(parsed)
    }
}

fn to_transport_error(err: reqwest::Error) -> Error {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_request() {
        TransportErrorKind::Request
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, err.to_string())
        .with_source(err)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_base_url_and_timeout() {
        let cfg = Config::from_lookup(lookup(&[
            (BASE_URL_ENV, "https://site-ai.example.com/"),
            (TIMEOUT_ENV, "30"),
        ]))
        .unwrap();
        assert_eq!(cfg.base_url.as_deref(), Some("https://site-ai.example.com/"));
        assert_eq!(cfg.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn env_rejects_bad_timeout() {
        let err = Config::from_lookup(lookup(&[(TIMEOUT_ENV, "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains(TIMEOUT_ENV)));
        let err = Config::from_lookup(lookup(&[(TIMEOUT_ENV, "0")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn defaults_to_local_service() {
        let client = Client::new(Config::default()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/");
        assert_eq!(client.inner.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn endpoint_paths_extend_base_path() {
        let client = Client::new(Config {
            base_url: Some("https://example.com/prefix/".into()),
            ..Default::default()
        })
        .unwrap();
        let req = client
            .inner
            .request(Method::POST, &WorkflowKind::SiteAssistant.path())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(req.url().as_str(), "https://example.com/prefix/api/site-assistant");
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let err = Client::new(Config {
            base_url: Some("not a url".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

use std::time::Duration;

use serde_json::Value;

use crate::errors::{APIError, Error, FieldError};
#[cfg(feature = "client")]
use crate::REQUEST_ID_HEADER;

/// Per-call options for a workflow submission.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub request_id: Option<String>,
    pub headers: HeaderList,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HeaderEntry::new(key.into(), value.into()));
        self
    }

    /// Override the overall request timeout for this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Structured header list with validation.
#[derive(Clone, Debug, Default)]
pub struct HeaderList(Vec<HeaderEntry>);

impl HeaderList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a header entry.
    ///
    /// # Panics
    /// Panics if the header key or value is empty or contains only whitespace.
    pub fn push(&mut self, entry: HeaderEntry) {
        assert!(
            entry.is_valid(),
            "Invalid header: key and value must be non-empty (got key={:?}, value={:?})",
            entry.key,
            entry.value
        );
        self.0.push(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(key: String, value: String) -> Self {
        Self { key, value }
    }

    pub fn is_valid(&self) -> bool {
        !(self.key.trim().is_empty() || self.value.trim().is_empty())
    }
}

/// Request id echoed by the server, if any.
#[cfg(feature = "client")]
pub(crate) fn request_id_from_headers(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Build an [`Error::Api`] from a non-success response.
///
/// Understands FastAPI's `{"detail": ...}` envelope (a string, or a list of
/// `{loc, msg}` items for request validation failures) as well as the generic
/// `{"error": {...}}` and `{"message": ...}` shapes.
pub(crate) fn parse_api_error_parts(
    status: u16,
    status_text: &str,
    request_id: Option<String>,
    body: String,
) -> Error {
    if body.trim().is_empty() {
        return APIError {
            status,
            code: None,
            message: status_text.to_string(),
            request_id,
            fields: Vec::new(),
            raw_body: None,
        }
        .into();
    }

    if let Ok(value) = serde_json::from_str::<Value>(&body) {
        if let Some(detail) = value.get("detail") {
            let (message, fields) = match detail {
                Value::String(s) => (s.clone(), Vec::new()),
                Value::Array(items) => {
                    let fields = detail_fields(items);
                    let message = fields
                        .first()
                        .map(|f| f.message.clone())
                        .unwrap_or_else(|| status_text.to_string());
                    (message, fields)
                }
                other => (other.to_string(), Vec::new()),
            };
            return APIError {
                status,
                code: None,
                message,
                request_id,
                fields,
                raw_body: Some(body),
            }
            .into();
        }

        let envelope = value
            .get("error")
            .filter(|v| v.is_object())
            .unwrap_or(&value);
        if let Some(message) = envelope.get("message").and_then(|v| v.as_str()) {
            let code = envelope
                .get("code")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            return APIError {
                status,
                code,
                message: message.to_string(),
                request_id,
                fields: Vec::new(),
                raw_body: Some(body.clone()),
            }
            .into();
        }
    }

    APIError {
        status,
        code: None,
        message: body.clone(),
        request_id,
        fields: Vec::new(),
        raw_body: Some(body),
    }
    .into()
}

fn detail_fields(items: &[Value]) -> Vec<FieldError> {
    items
        .iter()
        .filter_map(|item| {
            let message = item.get("msg").and_then(|v| v.as_str())?.to_string();
            let field = item
                .get("loc")
                .and_then(|v| v.as_array())
                .and_then(|loc| loc.last())
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            Some(FieldError { field, message })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(err: Error) -> APIError {
        match err {
            Error::Api(api) => api,
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn parses_fastapi_string_detail() {
        let err = api(parse_api_error_parts(
            500,
            "Internal Server Error",
            None,
            r#"{"detail":"AI analysis failed: upstream timeout"}"#.into(),
        ));
        assert_eq!(err.status, 500);
        assert_eq!(err.message, "AI analysis failed: upstream timeout");
    }

    #[test]
    fn parses_fastapi_validation_detail() {
        let body = r#"{"detail":[{"loc":["body","labour_count"],"msg":"value is not a valid integer","type":"type_error.integer"}]}"#;
        let err = api(parse_api_error_parts(
            422,
            "Unprocessable Entity",
            Some("req_1".into()),
            body.into(),
        ));
        assert_eq!(err.message, "value is not a valid integer");
        assert_eq!(err.fields[0].field.as_deref(), Some("labour_count"));
        assert_eq!(err.request_id.as_deref(), Some("req_1"));
    }

    #[test]
    fn falls_back_to_status_text_and_raw_body() {
        let err = api(parse_api_error_parts(502, "Bad Gateway", None, String::new()));
        assert_eq!(err.message, "Bad Gateway");

        let err = api(parse_api_error_parts(502, "Bad Gateway", None, "<html>".into()));
        assert_eq!(err.message, "<html>");
    }

    #[test]
    fn parses_generic_error_envelope() {
        let err = api(parse_api_error_parts(
            429,
            "Too Many Requests",
            None,
            r#"{"error":{"code":"rate_limit","message":"slow down"}}"#.into(),
        ));
        assert_eq!(err.code.as_deref(), Some("rate_limit"));
        assert_eq!(err.to_string(), "rate_limit (429): slow down");
    }

    #[test]
    #[should_panic(expected = "Invalid header")]
    fn header_list_panics_on_whitespace_only() {
        let mut list = HeaderList::new();
        list.push(HeaderEntry::new("   ".to_string(), "value".to_string()));
    }

    #[test]
    fn request_options_collect_headers() {
        let opts = RequestOptions::default()
            .with_request_id("req_7")
            .with_header("X-Site", "north-block")
            .with_timeout(Duration::from_secs(3));
        assert_eq!(opts.headers.iter().count(), 1);
        assert_eq!(opts.request_id.as_deref(), Some("req_7"));
        assert_eq!(opts.timeout, Some(Duration::from_secs(3)));
    }
}

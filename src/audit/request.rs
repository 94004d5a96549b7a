//! Request context and payload capture
//!
//! The web layer fills a [`RequestContext`] when a request completes. Payloads
//! are stored only for enabled directions and configured content types; JSON
//! bodies lose their ignored keys and have masked keys redacted at any depth.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;
use tracing::debug;

use crate::config::settings::{RequestData, RequestSettings};
use crate::config::PayloadDirection;
use crate::models::{PayloadEncoding, PayloadRecord, RequestEvent};

use super::diff::REDACTED;

/// A request or response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Payload {
    pub fn new(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// Media type without parameters, lower-cased
    pub fn media_type(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }
}

/// What the request lifecycle knows about a completed request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub method: String,
    /// Path without the query string
    pub uri: String,
    pub query: Option<String>,
    pub status: u16,
    /// Application owning the resolved route
    pub application: Option<String>,
    pub ip: Option<String>,
    pub request: Option<Payload>,
    pub response: Option<Payload>,
}

impl RequestContext {
    /// A request; a query string in `uri` is split off
    pub fn new(method: impl Into<String>, uri: &str, status: u16) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) if !query.is_empty() => (path, Some(query.to_string())),
            Some((path, _)) => (path, None),
            None => (uri, None),
        };

        Self {
            method: method.into().to_uppercase(),
            uri: path.to_string(),
            query,
            status,
            ..Self::default()
        }
    }

    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn request_payload(mut self, payload: Payload) -> Self {
        self.request = Some(payload);
        self
    }

    pub fn response_payload(mut self, payload: Payload) -> Self {
        self.response = Some(payload);
        self
    }

    /// Build the event payload according to the request settings
    pub fn to_event(&self, user: Option<&str>, settings: &RequestSettings) -> RequestEvent {
        let data = &settings.data;
        let capture = |direction: PayloadDirection, payload: &Option<Payload>| {
            payload
                .as_ref()
                .filter(|_| data.enabled.contains(&direction))
                .filter(|p| data.content_types.contains(&p.media_type()))
                .map(|p| capture_payload(p, data))
        };

        RequestEvent {
            user: user.map(str::to_string),
            method: self.method.clone(),
            uri: self.uri.clone(),
            query: self.query.clone().filter(|_| data.query),
            status: self.status,
            application: self.application.clone(),
            ip: self.ip.clone().filter(|_| settings.ip),
            request: capture(PayloadDirection::Request, &self.request),
            response: capture(PayloadDirection::Response, &self.response),
        }
    }
}

/// Stored in place of a JSON body that fails to parse
pub const UNPARSEABLE: &str = "<UNPARSEABLE>";

/// Store a body as JSON, text or base64, in that order of preference
pub fn capture_payload(payload: &Payload, data: &RequestData) -> PayloadRecord {
    let content_type = payload.media_type();

    if content_type.ends_with("json") {
        return match serde_json::from_slice::<Value>(&payload.body) {
            Ok(mut value) => {
                scrub(&mut value, data);
                PayloadRecord {
                    content_type,
                    encoding: PayloadEncoding::Json,
                    content: value,
                }
            }
            // Masking cannot be applied to a body that does not parse
            Err(e) => {
                debug!(%content_type, error = %e, "Discarding unparseable JSON payload");
                PayloadRecord {
                    content_type,
                    encoding: PayloadEncoding::Text,
                    content: Value::String(UNPARSEABLE.to_string()),
                }
            }
        };
    }

    match std::str::from_utf8(&payload.body) {
        Ok(text) => PayloadRecord {
            content_type,
            encoding: PayloadEncoding::Text,
            content: Value::String(text.to_string()),
        },
        Err(_) => PayloadRecord {
            content_type,
            encoding: PayloadEncoding::Base64,
            content: Value::String(STANDARD.encode(&payload.body)),
        },
    }
}

/// Drop ignored keys and redact masked keys at any depth
fn scrub(value: &mut Value, data: &RequestData) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !data.ignore.contains(&key.to_lowercase()));
            for (key, child) in map.iter_mut() {
                if data.mask.contains(&key.to_lowercase()) {
                    *child = Value::String(REDACTED.to_string());
                } else {
                    scrub(child, data);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                scrub(item, data);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(json: &str) -> RequestSettings {
        crate::config::Settings::from_json_str(json).unwrap().request
    }

    #[test]
    fn test_query_split() {
        let ctx = RequestContext::new("get", "/orders?page=2", 200);
        assert_eq!(ctx.method, "GET");
        assert_eq!(ctx.uri, "/orders");
        assert_eq!(ctx.query.as_deref(), Some("page=2"));

        let bare = RequestContext::new("GET", "/orders?", 200);
        assert_eq!(bare.query, None);
    }

    #[test]
    fn test_query_and_ip_gated() {
        let ctx = RequestContext::new("GET", "/orders?page=2", 200).ip("10.0.0.1");

        let event = ctx.to_event(None, &settings("{}"));
        assert_eq!(event.query, None);
        assert_eq!(event.ip.as_deref(), Some("10.0.0.1"));

        let event = ctx.to_event(
            Some("alice"),
            &settings(r#"{"request": {"ip": false, "data": {"query": true}}}"#),
        );
        assert_eq!(event.query.as_deref(), Some("page=2"));
        assert_eq!(event.ip, None);
        assert_eq!(event.user.as_deref(), Some("alice"));
    }

    #[test]
    fn test_payload_capture_requires_enabled_direction() {
        let body = json!({"user": "alice", "password": "hunter2"}).to_string();
        let ctx = RequestContext::new("POST", "/login", 302)
            .request_payload(Payload::new("application/json; charset=utf-8", body));

        assert!(ctx.to_event(None, &settings("{}")).request.is_none());

        let event = ctx.to_event(
            None,
            &settings(r#"{"request": {"data": {"enabled": ["request"]}}}"#),
        );
        let record = event.request.unwrap();
        assert_eq!(record.encoding, PayloadEncoding::Json);
        assert_eq!(record.content["password"], json!(REDACTED));
        assert_eq!(record.content["user"], json!("alice"));
    }

    #[test]
    fn test_content_type_filter() {
        let ctx = RequestContext::new("POST", "/upload", 201)
            .request_payload(Payload::new("image/png", vec![0x89, 0x50]));
        let event = ctx.to_event(
            None,
            &settings(r#"{"request": {"data": {"enabled": ["request"]}}}"#),
        );
        assert!(event.request.is_none());
    }

    #[test]
    fn test_nested_scrub() {
        let data: RequestData = serde_json::from_value(json!({
            "ignore": ["csrf"],
            "mask": ["token"]
        }))
        .unwrap();
        let body = json!({"csrf": "x", "items": [{"token": "t", "id": 1}]}).to_string();

        let record = capture_payload(&Payload::new("application/json", body), &data);
        assert!(record.content.get("csrf").is_none());
        assert_eq!(record.content["items"][0]["token"], json!(REDACTED));
        assert_eq!(record.content["items"][0]["id"], json!(1));
    }

    #[test]
    fn test_text_and_binary_bodies() {
        let data = RequestData::default();

        let text = capture_payload(&Payload::new("text/plain", "hello"), &data);
        assert_eq!(text.encoding, PayloadEncoding::Text);
        assert_eq!(text.content, json!("hello"));

        let binary = capture_payload(
            &Payload::new("application/octet-stream", vec![0xff, 0xfe]),
            &data,
        );
        assert_eq!(binary.encoding, PayloadEncoding::Base64);
        assert_eq!(binary.content, json!("//4="));
    }

    #[test]
    fn test_unparseable_json_not_stored() {
        let data = RequestData::default();
        let body = r#"{"password": "hunter2", "#;

        let record = capture_payload(&Payload::new("application/json", body), &data);
        assert_eq!(record.encoding, PayloadEncoding::Text);
        assert_eq!(record.content, json!(UNPARSEABLE));

        let binary = capture_payload(&Payload::new("application/json", vec![0xff, 0xfe]), &data);
        assert_eq!(binary.content, json!(UNPARSEABLE));
    }

    #[test]
    fn test_mask_ignores_key_case() {
        let body = json!({"Password": "hunter2", "CSRF": "x", "user": "alice"}).to_string();
        let ctx = RequestContext::new("POST", "/login", 302)
            .request_payload(Payload::new("application/json", body));

        let event = ctx.to_event(
            None,
            &settings(r#"{"request": {"data": {"enabled": ["request"], "ignore": ["csrf"]}}}"#),
        );
        let record = event.request.unwrap();
        assert_eq!(record.content["Password"], json!(REDACTED));
        assert!(record.content.get("CSRF").is_none());
        assert_eq!(record.content["user"], json!("alice"));
    }
}

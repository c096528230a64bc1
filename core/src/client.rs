//! Stateless HTTP request builder and response parser for the Scoutnet group API.
//!
//! # Design
//! `ScoutnetClient` holds the endpoint, the group's API id and one optional
//! key per API. Each operation is split into a `build_*` method that produces
//! an `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`;
//! the caller executes the round-trip in between.
//!
//! Scoutnet wraps every member field in an envelope such as
//! `{"value": "Ada", "raw_value": "Ada"}`. The `decode_*` functions strip that
//! envelope so downstream code sees plain `field -> value` records. They are
//! public so stored payloads (see [`crate::snapshot`]) decode the same way as
//! live responses.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiKind, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::ListSummary;
use crate::validate::RawRecord;

pub const DEFAULT_API_ENDPOINT: &str = "https://www.scoutnet.se/api";

/// Synchronous, stateless client for the Scoutnet group API.
#[derive(Debug, Clone)]
pub struct ScoutnetClient {
    endpoint: String,
    api_id: String,
    memberlist_key: Option<String>,
    customlists_key: Option<String>,
}

impl ScoutnetClient {
    /// A client for `api_id` with no keys. `endpoint` defaults to
    /// [`DEFAULT_API_ENDPOINT`].
    pub fn new(api_id: &str, endpoint: Option<&str>) -> Self {
        Self {
            endpoint: endpoint
                .unwrap_or(DEFAULT_API_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
            api_id: api_id.to_string(),
            memberlist_key: None,
            customlists_key: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let mut client = Self::new(&config.api_id, Some(&config.endpoint));
        client.memberlist_key = config.memberlist_key.clone();
        client.customlists_key = config.customlists_key.clone();
        client
    }

    pub fn with_memberlist_key(mut self, key: &str) -> Self {
        self.memberlist_key = Some(key.to_string());
        self
    }

    pub fn with_customlists_key(mut self, key: &str) -> Self {
        self.customlists_key = Some(key.to_string());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn build_memberlist(&self) -> Result<HttpRequest> {
        self.authorized_get(ApiKind::Memberlist, format!("{}/group/memberlist", self.endpoint))
    }

    pub fn build_customlists(&self) -> Result<HttpRequest> {
        self.authorized_get(ApiKind::Customlists, format!("{}/group/customlists", self.endpoint))
    }

    /// URL of a single list's members. Scoutnet also hands this out as the
    /// `link` of each list summary.
    pub fn list_url(&self, list_id: u64) -> String {
        format!("{}/group/customlists?list_id={list_id}", self.endpoint)
    }

    pub fn build_list_members(&self, summary: &ListSummary) -> Result<HttpRequest> {
        let link = summary
            .link
            .as_deref()
            .ok_or(ApiError::MissingListLink(summary.id))?;
        self.authorized_get(ApiKind::Customlists, link.to_string())
    }

    pub fn parse_memberlist(&self, response: HttpResponse) -> Result<Vec<RawRecord>> {
        let payload = parse_json(&response)?;
        let records = decode_member_envelope(&payload)?;
        tracing::debug!(count = records.len(), "Fetched members");
        Ok(records)
    }

    pub fn parse_customlists(&self, response: HttpResponse) -> Result<Vec<ListSummary>> {
        let payload = parse_json(&response)?;
        let summaries = decode_customlists(&payload)?;
        tracing::debug!(count = summaries.len(), "Fetched custom list index");
        Ok(summaries)
    }

    pub fn parse_list_members(&self, response: HttpResponse) -> Result<Vec<RawRecord>> {
        let payload = parse_json(&response)?;
        decode_member_envelope(&payload)
    }

    /// Check the status and return the raw JSON body, for callers that want
    /// to keep the payload (e.g. in a snapshot) before decoding it.
    pub fn parse_raw(&self, response: HttpResponse) -> Result<Value> {
        parse_json(&response)
    }

    fn authorized_get(&self, kind: ApiKind, url: String) -> Result<HttpRequest> {
        let key = match kind {
            ApiKind::Memberlist => self.memberlist_key.as_deref(),
            ApiKind::Customlists => self.customlists_key.as_deref(),
        }
        .ok_or(ApiError::MissingApiKey(kind))?;
        let credentials = STANDARD.encode(format!("{}:{key}", self.api_id));
        Ok(HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: vec![
                ("authorization".to_string(), format!("Basic {credentials}")),
                ("accept".to_string(), "application/json".to_string()),
            ],
        })
    }
}

/// Unwrap `{"data": {key: {field: {"value": v}}}}` into one raw record per
/// member, in payload order. Fields without a `value` are dropped.
pub fn decode_member_envelope(payload: &Value) -> Result<Vec<RawRecord>> {
    let data = payload
        .get("data")
        .ok_or_else(|| ApiError::DeserializationError("missing \"data\" member".to_string()))?;
    entries(data, "data")?
        .map(|(key, entry)| -> Result<RawRecord> {
            let fields = entry.as_object().ok_or_else(|| {
                ApiError::DeserializationError(format!("member {key} is not an object"))
            })?;
            Ok(fields
                .iter()
                .filter_map(|(name, wrapped)| {
                    wrapped
                        .as_object()
                        .and_then(|w| w.get("value"))
                        .map(|value| (name.clone(), value.clone()))
                })
                .collect())
        })
        .collect()
}

/// Decode the customlists index into list summaries, in payload order.
pub fn decode_customlists(payload: &Value) -> Result<Vec<ListSummary>> {
    entries(payload, "customlists")?
        .map(|(key, entry)| {
            serde_json::from_value::<ListSummary>(entry.clone()).map_err(|e| {
                ApiError::DeserializationError(format!("custom list {key}: {e}"))
            })
        })
        .collect()
}

/// Iterate a keyed object. An empty JSON array stands in for an empty object,
/// which is how the upstream PHP serializer renders empty maps.
fn entries<'a>(
    value: &'a Value,
    what: &str,
) -> Result<Box<dyn Iterator<Item = (&'a str, &'a Value)> + 'a>> {
    match value {
        Value::Object(map) => Ok(Box::new(map.iter().map(|(k, v)| (k.as_str(), v)))),
        Value::Array(items) if items.is_empty() => Ok(Box::new(std::iter::empty())),
        other => Err(ApiError::DeserializationError(format!(
            "{what} is not an object: {other}"
        ))),
    }
}

fn parse_json(response: &HttpResponse) -> Result<Value> {
    check_status(response, 200)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, expected: u16) -> Result<()> {
    match response.status {
        status if status == expected => Ok(()),
        404 => Err(ApiError::NotFound),
        status @ (401 | 403) => Err(ApiError::Unauthorized { status }),
        status => Err(ApiError::HttpError {
            status,
            body: response.body.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn client() -> ScoutnetClient {
        ScoutnetClient::new("123", Some("http://localhost:3000/api"))
            .with_memberlist_key("member-key")
            .with_customlists_key("lists-key")
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_memberlist_produces_authorized_request() {
        let req = client().build_memberlist().unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/api/group/memberlist");
        // base64("123:member-key")
        assert_eq!(req.header("Authorization"), Some("Basic MTIzOm1lbWJlci1rZXk="));
    }

    #[test]
    fn build_customlists_uses_its_own_key() {
        let req = client().build_customlists().unwrap();
        assert_eq!(req.url, "http://localhost:3000/api/group/customlists");
        // base64("123:lists-key")
        assert_eq!(req.header("authorization"), Some("Basic MTIzOmxpc3RzLWtleQ=="));
    }

    #[test]
    fn missing_key_is_reported_per_api() {
        let client = ScoutnetClient::new("123", None).with_customlists_key("k");
        let err = client.build_memberlist().unwrap_err();
        assert!(matches!(err, ApiError::MissingApiKey(ApiKind::Memberlist)));
        assert!(client.build_customlists().is_ok());
    }

    #[test]
    fn default_endpoint_and_trailing_slash() {
        assert_eq!(ScoutnetClient::new("1", None).endpoint(), DEFAULT_API_ENDPOINT);
        let client = ScoutnetClient::new("1", Some("http://localhost:3000/api/"));
        assert_eq!(
            client.list_url(42),
            "http://localhost:3000/api/group/customlists?list_id=42"
        );
    }

    #[test]
    fn build_list_members_follows_link() {
        let summary = ListSummary {
            id: 7,
            title: None,
            description: None,
            link: Some("http://localhost:3000/api/group/customlists?list_id=7".to_string()),
            aliases: Vec::new(),
        };
        let req = client().build_list_members(&summary).unwrap();
        assert_eq!(req.url, "http://localhost:3000/api/group/customlists?list_id=7");

        let unlinked = ListSummary { link: None, ..summary };
        let err = client().build_list_members(&unlinked).unwrap_err();
        assert!(matches!(err, ApiError::MissingListLink(7)));
    }

    #[test]
    fn parse_memberlist_unwraps_value_envelopes() {
        let body = json!({
            "data": {
                "3001": {
                    "member_no": {"value": "3001"},
                    "first_name": {"value": "Astrid", "raw_value": "Astrid"},
                    "sex": {"raw_value": "2"},
                    "unit": "not-an-envelope"
                },
                "3002": {"member_no": {"value": "3002"}}
            }
        });
        let records = client().parse_memberlist(HttpResponse::ok(body.to_string())).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["member_no"], json!("3001"));
        assert_eq!(records[0]["first_name"], json!("Astrid"));
        assert!(!records[0].contains_key("sex"));
        assert!(!records[0].contains_key("unit"));
        assert_eq!(records[1]["member_no"], json!("3002"));
    }

    #[test]
    fn parse_memberlist_accepts_empty_array_data() {
        let records = client().parse_memberlist(HttpResponse::ok(r#"{"data":[]}"#)).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn parse_memberlist_rejects_bad_shapes() {
        for body in [r#"{"members":{}}"#, r#"{"data":"x"}"#, r#"{"data":{"1":"x"}}"#, "not json"] {
            let err = client().parse_memberlist(HttpResponse::ok(body)).unwrap_err();
            assert!(matches!(err, ApiError::DeserializationError(_)), "{body}");
        }
    }

    #[test]
    fn parse_customlists_decodes_summaries_in_order() {
        let body = json!({
            "20": {"id": "20", "title": "Leaders", "aliases": {"1": "leaders@example.org"}},
            "10": {"id": 10, "title": "Parents", "aliases": []}
        });
        let lists = client().parse_customlists(HttpResponse::ok(body.to_string())).unwrap();
        let ids: Vec<_> = lists.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![20, 10]);
        assert_eq!(lists[0].aliases, vec!["leaders@example.org"]);
    }

    #[test]
    fn status_codes_map_to_errors() {
        let c = client();
        assert!(matches!(c.parse_memberlist(response(404, "")).unwrap_err(), ApiError::NotFound));
        assert!(matches!(
            c.parse_memberlist(response(401, "")).unwrap_err(),
            ApiError::Unauthorized { status: 401 }
        ));
        assert!(matches!(
            c.parse_customlists(response(403, "")).unwrap_err(),
            ApiError::Unauthorized { status: 403 }
        ));
        assert!(matches!(
            c.parse_list_members(response(500, "boom")).unwrap_err(),
            ApiError::HttpError { status: 500, .. }
        ));
    }

    #[test]
    fn parse_raw_keeps_payload() {
        let value = client().parse_raw(HttpResponse::ok(r#"{"data":{}}"#)).unwrap();
        assert_eq!(value, json!({"data": {}}));
    }
}

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// API id and the per-API keys the server accepts.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub api_id: String,
    pub memberlist_key: String,
    pub customlists_key: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            api_id: "1234".to_string(),
            memberlist_key: "member-secret".to_string(),
            customlists_key: "lists-secret".to_string(),
        }
    }
}

impl Credentials {
    fn authorizes(&self, headers: &HeaderMap, key: &str) -> bool {
        let expected = format!("Basic {}", STANDARD.encode(format!("{}:{key}", self.api_id)));
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }
}

/// Canned payloads served by the mock.
#[derive(Clone, Debug)]
pub struct Fixture {
    pub credentials: Credentials,
    pub memberlist: Value,
    pub customlists: Value,
    pub lists: HashMap<u64, Value>,
}

impl Fixture {
    /// A small group. `base_url` is the `/api` root the server is reachable
    /// at; list links point back into it.
    ///
    /// Under the Scoutnet field layout with region SE, members 3001 and 3005
    /// validate; 3002 has a malformed email, 3003 a malformed mobile number
    /// and the fourth entry lacks a member number.
    pub fn sample(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let memberlist = json!({
            "data": {
                "3001": member(&[
                    ("member_no", json!("3001")),
                    ("first_name", json!("Astrid")),
                    ("last_name", json!("Lindgren")),
                    ("date_of_birth", json!("1907-11-14")),
                    ("group", json!("Vimmerby Scoutkår")),
                    ("email", json!("Astrid@Example.se")),
                    ("contact_mobile_phone", json!("070-123 45 67")),
                ]),
                "3002": member(&[
                    ("member_no", json!("3002")),
                    ("first_name", json!("Sven")),
                    ("last_name", json!("Hedin")),
                    ("email", json!("not-an-email")),
                ]),
                "3003": member(&[
                    ("member_no", json!("3003")),
                    ("first_name", json!("Selma")),
                    ("last_name", json!("Lagerlöf")),
                    ("contact_mobile_phone", json!("notaphone")),
                ]),
                "3004": member(&[
                    ("member_no", json!("")),
                    ("first_name", json!("Ghost")),
                ]),
                "3005": member(&[
                    ("member_no", json!("3005")),
                    ("first_name", json!("Greta")),
                    ("last_name", json!("Garbo")),
                    ("contact_home_phone", json!("08-123 456 78")),
                ]),
            }
        });
        let customlists = json!({
            "10": {
                "id": "10",
                "title": "Ledare",
                "description": "Alla ledare",
                "link": format!("{base_url}/group/customlists?list_id=10"),
                "aliases": {"1": "ledare@example.se"}
            },
            "20": {
                "id": "20",
                "title": "Utan alias",
                "description": "",
                "link": format!("{base_url}/group/customlists?list_id=20"),
                "aliases": []
            }
        });
        let lists = HashMap::from([
            (
                10,
                json!({
                    "data": {
                        "3001": member(&[
                            ("member_no", json!("3001")),
                            ("first_name", json!("Astrid")),
                            ("last_name", json!("Lindgren")),
                            ("email", json!("astrid@example.se")),
                            ("extra_emails", json!(["Mamma@Example.se"])),
                        ]),
                        "3005": member(&[
                            ("member_no", json!("3005")),
                            ("first_name", json!("Greta")),
                            ("last_name", json!("Garbo")),
                            ("email", json!("greta@example.se")),
                            ("extra_emails", json!([])),
                        ]),
                    }
                }),
            ),
            (20, json!({"data": []})),
        ]);
        Self {
            credentials: Credentials::default(),
            memberlist,
            customlists,
            lists,
        }
    }
}

/// Wrap plain values in Scoutnet's `{"value", "raw_value"}` field envelope.
fn member(fields: &[(&str, Value)]) -> Value {
    let map = fields
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                json!({"value": value, "raw_value": value}),
            )
        })
        .collect::<serde_json::Map<_, _>>();
    Value::Object(map)
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub list_id: Option<u64>,
}

pub type Db = Arc<Fixture>;

pub fn app(fixture: Fixture) -> Router {
    let db: Db = Arc::new(fixture);
    Router::new()
        .route("/api/group/memberlist", get(memberlist))
        .route("/api/group/customlists", get(customlists))
        .with_state(db)
}

pub async fn run(listener: TcpListener, fixture: Fixture) -> Result<(), std::io::Error> {
    axum::serve(listener, app(fixture)).await
}

async fn memberlist(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    if !db.credentials.authorizes(&headers, &db.credentials.memberlist_key) {
        tracing::debug!("Rejected memberlist credentials");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(db.memberlist.clone()))
}

async fn customlists(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, StatusCode> {
    if !db.credentials.authorizes(&headers, &db.credentials.customlists_key) {
        tracing::debug!("Rejected customlists credentials");
        return Err(StatusCode::UNAUTHORIZED);
    }
    match query.list_id {
        Some(id) => db.lists.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND),
        None => Ok(Json(db.customlists.clone())),
    }
}

//! Domain types produced from Scoutnet payloads.
//!
//! # Design
//! `MemberRecord` and `ListMember` are only ever built by the validator, so
//! their fields are private and exposed through accessors: once a value
//! exists its invariants hold. `ListSummary` is a plain serde DTO since the
//! customlists payload carries no data that needs checking beyond its shape.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One validated member.
///
/// `identifier` is never empty, `email` (when present) and every entry of
/// `alt_emails` are lowercased syntactically valid addresses, and every entry
/// of `phones` is in E.164 form. Fields the validator does not interpret are
/// carried in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberRecord {
    identifier: String,
    name: String,
    email: Option<String>,
    alt_emails: Vec<String>,
    phones: Vec<String>,
    extra: Map<String, Value>,
}

impl MemberRecord {
    pub(crate) fn new(
        identifier: String,
        name: String,
        email: Option<String>,
        alt_emails: Vec<String>,
        phones: Vec<String>,
        extra: Map<String, Value>,
    ) -> Self {
        Self {
            identifier,
            name,
            email,
            alt_emails,
            phones,
            extra,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Secondary addresses, in field order.
    pub fn alt_emails(&self) -> &[String] {
        &self.alt_emails
    }

    pub fn phones(&self) -> &[String] {
        &self.phones
    }

    /// Upstream fields not mapped onto a typed attribute, in payload order.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// A member of a custom mailing list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListMember {
    member_no: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    extra_emails: Vec<String>,
}

impl ListMember {
    pub(crate) fn new(
        member_no: String,
        first_name: String,
        last_name: String,
        email: Option<String>,
        extra_emails: Vec<String>,
    ) -> Self {
        Self {
            member_no,
            first_name,
            last_name,
            email,
            extra_emails,
        }
    }

    pub fn member_no(&self) -> &str {
        &self.member_no
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn display_name(&self) -> String {
        [self.first_name.as_str(), self.last_name.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn extra_emails(&self) -> &[String] {
        &self.extra_emails
    }
}

/// One entry of the customlists index.
///
/// Scoutnet encodes an empty alias table as `[]` and a populated one as an
/// object keyed by alias id; both decode into a flat list of alias values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSummary {
    #[serde(deserialize_with = "lenient_id")]
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "alias_values")]
    pub aliases: Vec<String>,
}

/// A custom mailing list, optionally with its resolved members.
///
/// `members` and `recipients` are `None` when the list was assembled without
/// fetching member data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailingList {
    pub id: u64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub members: Option<Vec<ListMember>>,
    pub recipients: Option<Vec<String>>,
}

impl MailingList {
    pub fn has_aliases(&self) -> bool {
        !self.aliases.is_empty()
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Number(u64),
        Text(String),
    }

    match IdRepr::deserialize(deserializer)? {
        IdRepr::Number(n) => Ok(n),
        IdRepr::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn alias_values<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AliasRepr {
        Table(Map<String, Value>),
        List(Vec<Value>),
    }

    let values: Vec<Value> = match Option::<AliasRepr>::deserialize(deserializer)? {
        Some(AliasRepr::Table(table)) => table.into_iter().map(|(_, v)| v).collect(),
        Some(AliasRepr::List(list)) => list,
        None => Vec::new(),
    };
    Ok(values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        })
        .collect())
}

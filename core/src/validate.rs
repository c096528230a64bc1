//! Batch validation of raw member records.
//!
//! # Design
//! Upstream payloads are decoded into `serde_json::Value` exactly once at the
//! boundary (see [`crate::client`]); this module turns those loosely typed
//! maps into [`MemberRecord`]s. A batch never aborts on bad data: each raw
//! record yields either one `MemberRecord` or one or more
//! [`ValidationError`]s, never both and never neither.
//!
//! Check order per record:
//! 1. Identifier. If it cannot be extracted as a non-empty string the record
//!    gets a single `missing_required_field` error and nothing else is
//!    examined.
//! 2. Email, when present and non-empty.
//! 3. Each configured alternate email field, when present and non-empty.
//! 4. Each configured phone field, when present.
//!
//! Every failing field after the identifier contributes its own error, so a
//! record with a bad email and a bad phone reports both.

use std::fmt;
use std::str::FromStr;

use phonenumber::{country, Mode};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::MemberRecord;

/// A raw record as received from upstream: field name to arbitrary JSON.
pub type RawRecord = Map<String, Value>;

/// Why a field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    MissingRequiredField,
    MalformedEmail,
    MalformedPhone,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::MissingRequiredField => "missing_required_field",
            ReasonCode::MalformedEmail => "malformed_email",
            ReasonCode::MalformedPhone => "malformed_phone",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field-level failure.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error(
    "record {}: field {field} is {reason} (got {raw_value})",
    .record_id.as_deref().unwrap_or("<unknown>")
)]
pub struct ValidationError {
    pub record_id: Option<String>,
    pub field: String,
    pub raw_value: Value,
    pub reason: ReasonCode,
}

impl ValidationError {
    pub fn new(reason: ReasonCode, field: impl Into<String>, raw_value: Value) -> Self {
        Self {
            record_id: None,
            field: field.into(),
            raw_value,
            reason,
        }
    }

    /// Attach the owning record's identifier.
    pub fn for_record(mut self, record_id: Option<&str>) -> Self {
        self.record_id = record_id.map(str::to_string);
        self
    }

    /// Relabel the field, keeping reason and raw value.
    pub fn in_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

#[derive(Debug, Error)]
#[error("unknown region code {0:?}")]
pub struct UnknownRegion(pub String);

/// ISO 3166-1 alpha-2 region whose numbering plan applies to phone numbers
/// written without a country code.
#[derive(Debug, Clone)]
pub struct Region {
    id: country::Id,
    code: String,
}

impl Region {
    pub fn new(code: &str) -> Result<Self, UnknownRegion> {
        let code = code.trim().to_ascii_uppercase();
        let id = code
            .parse::<country::Id>()
            .map_err(|_| UnknownRegion(code.clone()))?;
        Ok(Self { id, code })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub(crate) fn id(&self) -> country::Id {
        self.id
    }
}

/// Sweden, the home region of the Scoutnet service.
impl Default for Region {
    fn default() -> Self {
        Self {
            id: country::Id::SE,
            code: "SE".to_string(),
        }
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Region {}

impl FromStr for Region {
    type Err = UnknownRegion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::new(s)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// How strictly phone numbers are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PhonePolicy {
    /// Accept anything the numbering-plan parser can turn into a number.
    #[default]
    Parseable,
    /// Additionally require the number to be assignable in its region.
    Strict,
}

/// Raw field names that feed each `MemberRecord` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    pub identifier: String,
    /// Joined with a single space, empty parts skipped.
    pub name: Vec<String>,
    pub email: String,
    /// Secondary address fields, validated like `email`.
    pub alt_emails: Vec<String>,
    pub phones: Vec<String>,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            identifier: "id".to_string(),
            name: vec!["name".to_string()],
            email: "email".to_string(),
            alt_emails: Vec::new(),
            phones: vec!["phone".to_string()],
        }
    }
}

impl FieldNames {
    /// Field layout of the Scoutnet memberlist API.
    pub fn scoutnet() -> Self {
        Self {
            identifier: "member_no".to_string(),
            name: vec!["first_name".to_string(), "last_name".to_string()],
            email: "email".to_string(),
            alt_emails: vec!["contact_alt_email".to_string()],
            phones: vec![
                "contact_mobile_phone".to_string(),
                "contact_home_phone".to_string(),
                "contact_telephone_home".to_string(),
            ],
        }
    }

    fn is_mapped(&self, key: &str) -> bool {
        key == self.identifier
            || key == self.email
            || self.name.iter().any(|f| f == key)
            || self.alt_emails.iter().any(|f| f == key)
            || self.phones.iter().any(|f| f == key)
    }
}

/// Result of validating a batch; both sequences follow input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub valid: Vec<MemberRecord>,
    pub errors: Vec<ValidationError>,
    /// Number of input records that produced errors instead of a record.
    pub rejected: usize,
}

impl BatchOutcome {
    /// Number of input records accounted for.
    pub fn total(&self) -> usize {
        self.valid.len() + self.rejected
    }

    pub fn into_parts(self) -> (Vec<MemberRecord>, Vec<ValidationError>) {
        (self.valid, self.errors)
    }
}

/// Converts raw records into `MemberRecord`s.
///
/// Immutable after construction and safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct RecordValidator {
    region: Region,
    policy: PhonePolicy,
    fields: FieldNames,
}

impl RecordValidator {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            ..Self::default()
        }
    }

    pub fn with_phone_policy(mut self, policy: PhonePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_fields(mut self, fields: FieldNames) -> Self {
        self.fields = fields;
        self
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn fields(&self) -> &FieldNames {
        &self.fields
    }

    pub fn validate_email(&self, raw: &str) -> Result<String, ValidationError> {
        validate_email(raw)
    }

    pub fn validate_phone(&self, raw: &str) -> Result<String, ValidationError> {
        validate_phone_with(raw, &self.region, self.policy)
    }

    pub fn validate_batch<'a, I>(&self, raw_records: I) -> BatchOutcome
    where
        I: IntoIterator<Item = &'a RawRecord>,
    {
        let mut outcome = BatchOutcome::default();
        for raw in raw_records {
            match self.validate_record(raw) {
                Ok(record) => outcome.valid.push(record),
                Err(errors) => {
                    tracing::debug!(
                        record_id = ?errors.first().and_then(|e| e.record_id.as_deref()),
                        errors = errors.len(),
                        "Rejected member record"
                    );
                    outcome.rejected += 1;
                    outcome.errors.extend(errors);
                }
            }
        }
        tracing::info!(
            valid = outcome.valid.len(),
            rejected = outcome.rejected,
            errors = outcome.errors.len(),
            "Validated member batch"
        );
        outcome
    }

    /// Validate one record. On failure the returned vector is never empty.
    pub fn validate_record(
        &self,
        raw: &RawRecord,
    ) -> Result<MemberRecord, Vec<ValidationError>> {
        let fields = &self.fields;
        let Some(identifier) = extract_identifier(raw.get(&fields.identifier)) else {
            let raw_id = raw.get(&fields.identifier).cloned().unwrap_or(Value::Null);
            return Err(vec![ValidationError::new(
                ReasonCode::MissingRequiredField,
                fields.identifier.as_str(),
                raw_id,
            )]);
        };

        let mut errors = Vec::new();

        let email = match check_email_field(raw.get(&fields.email)) {
            Ok(email) => email,
            Err(err) => {
                errors.push(err.in_field(fields.email.as_str()).for_record(Some(&identifier)));
                None
            }
        };

        let mut alt_emails = Vec::new();
        for field in &fields.alt_emails {
            match check_email_field(raw.get(field)) {
                Ok(alt) => alt_emails.extend(alt),
                Err(err) => errors.push(err.in_field(field.as_str()).for_record(Some(&identifier))),
            }
        }

        let mut phones = Vec::new();
        for field in &fields.phones {
            let Some(value) = raw.get(field) else {
                continue;
            };
            match self.check_phone_field(value) {
                Ok(canonical) => phones.extend(canonical),
                Err(offending) => errors.push(
                    ValidationError::new(ReasonCode::MalformedPhone, field.as_str(), offending)
                        .for_record(Some(&identifier)),
                ),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let name = join_name(raw, &fields.name);
        let extra: Map<String, Value> = raw
            .iter()
            .filter(|(key, _)| !fields.is_mapped(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(MemberRecord::new(identifier, name, email, alt_emails, phones, extra))
    }

    /// Canonicalize every entry of one phone field. On failure returns the
    /// offending raw value: the scalar itself, or the list of bad entries.
    fn check_phone_field(&self, value: &Value) -> Result<Vec<String>, Value> {
        match value {
            Value::Array(entries) => {
                let mut canonical = Vec::new();
                let mut offending = Vec::new();
                for entry in entries {
                    match self.check_phone_entry(entry) {
                        Ok(Some(phone)) => canonical.push(phone),
                        Ok(None) => {}
                        Err(()) => offending.push(entry.clone()),
                    }
                }
                if offending.is_empty() {
                    Ok(canonical)
                } else {
                    Err(Value::Array(offending))
                }
            }
            scalar => match self.check_phone_entry(scalar) {
                Ok(phone) => Ok(phone.into_iter().collect()),
                Err(()) => Err(scalar.clone()),
            },
        }
    }

    fn check_phone_entry(&self, entry: &Value) -> Result<Option<String>, ()> {
        let text = match entry {
            Value::Null => return Ok(None),
            Value::String(s) if s.trim().is_empty() => return Ok(None),
            Value::String(s) => s.clone(),
            Value::Number(n) if n.is_u64() || n.is_i64() => n.to_string(),
            _ => return Err(()),
        };
        self.validate_phone(&text).map(Some).map_err(|_| ())
    }
}

/// Validate an email address and return it lowercased.
///
/// Accepts `local@domain` with exactly one `@`, a non-empty local part, a
/// domain containing at least one dot with no empty labels, and no embedded
/// whitespace. Surrounding whitespace is ignored.
pub fn validate_email(raw: &str) -> Result<String, ValidationError> {
    let malformed = || ValidationError::new(ReasonCode::MalformedEmail, "email", Value::from(raw));
    let candidate = raw.trim();
    if candidate.chars().any(char::is_whitespace) {
        return Err(malformed());
    }
    let (local, domain) = candidate.split_once('@').ok_or_else(malformed)?;
    if local.is_empty() || domain.contains('@') || !is_valid_domain(domain) {
        return Err(malformed());
    }
    Ok(candidate.to_lowercase())
}

/// Normalize a phone number to E.164, reading numbers without a country
/// code under `default_region`'s numbering plan.
pub fn validate_phone(raw: &str, default_region: &Region) -> Result<String, ValidationError> {
    validate_phone_with(raw, default_region, PhonePolicy::Parseable)
}

pub fn validate_phone_with(
    raw: &str,
    default_region: &Region,
    policy: PhonePolicy,
) -> Result<String, ValidationError> {
    let malformed = || ValidationError::new(ReasonCode::MalformedPhone, "phone", Value::from(raw));
    let number =
        phonenumber::parse(Some(default_region.id()), raw.trim()).map_err(|_| malformed())?;
    if policy == PhonePolicy::Strict && !phonenumber::is_valid(&number) {
        return Err(malformed());
    }
    Ok(number.format().mode(Mode::E164).to_string())
}

fn is_valid_domain(domain: &str) -> bool {
    domain.contains('.')
        && domain
            .split('.')
            .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'))
}

/// A non-empty trimmed string, or an integer rendered in decimal.
pub(crate) fn extract_identifier(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
        _ => None,
    }
}

/// `Ok(None)` when the field is absent, null or blank.
pub(crate) fn check_email_field(value: Option<&Value>) -> Result<Option<String>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => validate_email(s).map(Some),
        Some(other) => Err(ValidationError::new(
            ReasonCode::MalformedEmail,
            "email",
            other.clone(),
        )),
    }
}

pub(crate) fn string_field(raw: &RawRecord, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn join_name(raw: &RawRecord, parts: &[String]) -> String {
    parts
        .iter()
        .map(|key| string_field(raw, key))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

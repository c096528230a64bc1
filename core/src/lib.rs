//! Client core and record validator for the Scoutnet group API.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern), then turns the loosely typed
//! member payloads into validated [`MemberRecord`]s.
//!
//! # Design
//! - `ScoutnetClient` is stateless: endpoint, API id and per-API keys.
//! - Upstream JSON is decoded once, at the boundary, into raw
//!   `field -> serde_json::Value` records.
//! - `RecordValidator::validate_batch` never aborts on bad data. Each raw
//!   record yields either one `MemberRecord` or its `ValidationError`s.
//! - Phone numbers are normalized to E.164 with libphonenumber metadata via
//!   the `phonenumber` crate; numbers without a country code are read in the
//!   validator's default region.
//!
//! # Example
//!
//! ```rust,ignore
//! use scoutnet_core::{ClientConfig, FieldNames, RecordValidator, ScoutnetClient};
//!
//! let config = ClientConfig::from_env()?;
//! let client = ScoutnetClient::from_config(&config);
//! let request = client.build_memberlist()?;
//! let response = execute(request); // host performs the HTTP call
//! let raw = client.parse_memberlist(response)?;
//!
//! let validator = RecordValidator::new(config.default_region).with_fields(FieldNames::scoutnet());
//! let outcome = validator.validate_batch(&raw);
//! for error in &outcome.errors {
//!     eprintln!("{error}");
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod lists;
pub mod snapshot;
pub mod types;
pub mod validate;

pub use client::{ScoutnetClient, DEFAULT_API_ENDPOINT};
pub use config::ClientConfig;
pub use error::{ApiError, ApiKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use lists::{assemble_list, collect_lists, ListSelection};
pub use snapshot::Snapshot;
pub use types::{ListMember, ListSummary, MailingList, MemberRecord};
pub use validate::{
    validate_email, validate_phone, validate_phone_with, BatchOutcome, FieldNames, PhonePolicy,
    RawRecord, ReasonCode, RecordValidator, Region, ValidationError,
};

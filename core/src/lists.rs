//! Custom mailing lists: member validation and list assembly.
//!
//! A list is assembled from its customlists summary plus, optionally, the
//! member payload fetched from the summary's `link`. Recipients are the
//! sorted, de-duplicated union of every member's primary and extra emails.
//! Lists without any alias have no mail address to deliver to and are
//! dropped by [`collect_lists`].

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde_json::Value;

use crate::types::{ListMember, ListSummary, MailingList};
use crate::validate::{
    check_email_field, extract_identifier, string_field, validate_email, RawRecord, ReasonCode,
    ValidationError,
};

const MEMBER_NO: &str = "member_no";
const EXTRA_EMAILS: &str = "extra_emails";

/// Which summaries to fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSelection {
    /// Stop after this many selected lists.
    pub limit: Option<usize>,
    /// Only these list ids. Empty means all.
    pub list_ids: BTreeSet<u64>,
}

impl ListSelection {
    pub fn select<'a>(&self, summaries: &'a [ListSummary]) -> Vec<&'a ListSummary> {
        summaries
            .iter()
            .filter(|s| self.list_ids.is_empty() || self.list_ids.contains(&s.id))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Validate list members. Each raw record yields a member or errors, in
/// input order; a repeated `member_no` keeps its first occurrence.
pub fn validate_list_members(raw_members: &[RawRecord]) -> (Vec<ListMember>, Vec<ValidationError>) {
    let mut members = Vec::new();
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for raw in raw_members {
        match validate_list_member(raw) {
            Ok(member) => {
                if seen.insert(member.member_no().to_string()) {
                    members.push(member);
                }
            }
            Err(errs) => errors.extend(errs),
        }
    }
    (members, errors)
}

fn validate_list_member(raw: &RawRecord) -> Result<ListMember, Vec<ValidationError>> {
    let Some(member_no) = extract_identifier(raw.get(MEMBER_NO)) else {
        return Err(vec![ValidationError::new(
            ReasonCode::MissingRequiredField,
            MEMBER_NO,
            raw.get(MEMBER_NO).cloned().unwrap_or(Value::Null),
        )]);
    };

    let mut errors = Vec::new();
    let email = check_email_field(raw.get("email")).unwrap_or_else(|err| {
        errors.push(err.for_record(Some(&member_no)));
        None
    });
    let extra_emails = check_extra_emails(raw.get(EXTRA_EMAILS)).unwrap_or_else(|offending| {
        errors.push(
            ValidationError::new(ReasonCode::MalformedEmail, EXTRA_EMAILS, offending)
                .for_record(Some(&member_no)),
        );
        Vec::new()
    });
    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ListMember::new(
        member_no,
        string_field(raw, "first_name"),
        string_field(raw, "last_name"),
        email,
        extra_emails,
    ))
}

/// Lowercased extra addresses, or the offending entries.
fn check_extra_emails(value: Option<&Value>) -> Result<Vec<String>, Value> {
    let entries: &[Value] = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(single) => std::slice::from_ref(single),
    };
    let mut emails = Vec::new();
    let mut offending = Vec::new();
    for entry in entries {
        match entry {
            Value::String(s) if s.trim().is_empty() => {}
            Value::String(s) => match validate_email(s) {
                Ok(email) => emails.push(email),
                Err(_) => offending.push(entry.clone()),
            },
            _ => offending.push(entry.clone()),
        }
    }
    if offending.is_empty() {
        Ok(emails)
    } else {
        Err(Value::Array(offending))
    }
}

/// Build a `MailingList` from its summary and, when fetched, its raw members.
pub fn assemble_list(
    summary: &ListSummary,
    raw_members: Option<&[RawRecord]>,
) -> (MailingList, Vec<ValidationError>) {
    let title = summary.title.clone();
    let aliases: Vec<String> = summary
        .aliases
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let (members, recipients, errors) = match raw_members {
        Some(raw) => {
            let (members, errors) = validate_list_members(raw);
            let mut recipients = BTreeSet::new();
            for member in &members {
                tracing::debug!(
                    member_no = member.member_no(),
                    email = ?member.email(),
                    list = ?title,
                    "Adding member to list"
                );
                recipients.extend(member.email().map(str::to_string));
                recipients.extend(member.extra_emails().iter().cloned());
            }
            (Some(members), Some(recipients.into_iter().collect()), errors)
        }
        None => (None, None, Vec::new()),
    };

    let list = MailingList {
        id: summary.id,
        title,
        description: summary.description.clone(),
        aliases,
        members,
        recipients,
    };
    (list, errors)
}

/// Keep lists that have at least one alias, keyed by list id.
pub fn collect_lists<I>(lists: I) -> BTreeMap<u64, MailingList>
where
    I: IntoIterator<Item = MailingList>,
{
    let mut kept = BTreeMap::new();
    for list in lists {
        match &list.members {
            Some(members) => tracing::debug!(
                id = list.id,
                title = ?list.title,
                members = members.len(),
                "Fetched list"
            ),
            None => tracing::debug!(id = list.id, title = ?list.title, "Fetched list"),
        }
        if list.has_aliases() {
            tracing::debug!(id = list.id, title = ?list.title, "Including list");
            kept.insert(list.id, list);
        } else {
            tracing::debug!(id = list.id, title = ?list.title, "Excluding list");
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    fn summary(id: u64, aliases: &[&str]) -> ListSummary {
        ListSummary {
            id,
            title: Some(format!("List {id}")),
            description: None,
            link: Some(format!("http://localhost/api/group/customlists?list_id={id}")),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn selection_filters_by_id_then_limits() {
        let summaries: Vec<_> = (1..=5).map(|id| summary(id, &[])).collect();
        let all = ListSelection::default().select(&summaries);
        assert_eq!(all.len(), 5);

        let selection = ListSelection {
            limit: Some(2),
            list_ids: [2, 4, 5].into_iter().collect(),
        };
        let ids: Vec<_> = selection.select(&summaries).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn recipients_are_sorted_unique_lowercase() {
        let members = vec![
            raw(json!({"member_no": 2, "first_name": "B", "last_name": "Two",
                       "email": "Zed@Example.org", "extra_emails": ["a@example.org"]})),
            raw(json!({"member_no": "1", "first_name": "A", "last_name": "One",
                       "email": "a@example.org", "extra_emails": []})),
            raw(json!({"member_no": 3, "first_name": "C", "last_name": "Three",
                       "extra_emails": null})),
        ];
        let (list, errors) = assemble_list(
            &summary(9, &["list@example.org", "list@example.org", "alias@example.org"]),
            Some(members.as_slice()),
        );
        assert!(errors.is_empty());
        assert_eq!(list.aliases, vec!["alias@example.org", "list@example.org"]);
        assert_eq!(
            list.recipients.unwrap(),
            vec!["a@example.org", "zed@example.org"]
        );
        let numbers: Vec<_> = list
            .members
            .unwrap()
            .iter()
            .map(|m| m.member_no().to_string())
            .collect();
        assert_eq!(numbers, vec!["2", "1", "3"]);
    }

    #[test]
    fn unfetched_list_has_no_members_or_recipients() {
        let (list, errors) = assemble_list(&summary(4, &["x@example.org"]), None);
        assert!(errors.is_empty());
        assert!(list.members.is_none());
        assert!(list.recipients.is_none());
        assert_eq!(list.title.as_deref(), Some("List 4"));
    }

    #[test]
    fn invalid_members_are_reported_not_listed() {
        let members = vec![
            raw(json!({"first_name": "No number"})),
            raw(json!({
                "member_no": 5,
                "email": "broken",
                "extra_emails": ["ok@example.org", "also broken"]
            })),
            raw(json!({"member_no": 6, "email": "six@example.org"})),
        ];
        let (valid, errors) = validate_list_members(&members);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].member_no(), "6");
        let fields: Vec<_> = errors.iter().map(|e| (e.field.as_str(), e.reason)).collect();
        assert_eq!(
            fields,
            vec![
                ("member_no", ReasonCode::MissingRequiredField),
                ("email", ReasonCode::MalformedEmail),
                ("extra_emails", ReasonCode::MalformedEmail),
            ]
        );
        assert_eq!(errors[2].raw_value, json!(["also broken"]));
        assert_eq!(errors[1].record_id.as_deref(), Some("5"));
    }

    #[test]
    fn duplicate_member_numbers_keep_first() {
        let members = vec![
            raw(json!({"member_no": 7, "first_name": "First"})),
            raw(json!({"member_no": "7", "first_name": "Second"})),
        ];
        let (valid, _) = validate_list_members(&members);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].first_name(), "First");
    }

    #[test]
    fn collect_lists_drops_lists_without_aliases() {
        let lists = vec![
            assemble_list(&summary(1, &[]), None).0,
            assemble_list(&summary(2, &["two@example.org"]), None).0,
        ];
        let kept = collect_lists(lists);
        assert_eq!(kept.keys().copied().collect::<Vec<_>>(), vec![2]);
    }
}

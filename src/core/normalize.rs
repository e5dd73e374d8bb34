//! Input normalization: turns loosely-typed rows from the applications file
//! into [`ApplicationRecord`]s. Bad rows are dropped with a warning, never fatal.

use crate::domain::model::{ApplicationRecord, RawRecord};
use serde_json::Value;
use std::collections::BTreeSet;

/// Permissive syntactic check: contains `@` and `.`, no whitespace.
pub fn is_email_like(candidate: &str) -> bool {
    let candidate = candidate.trim();
    candidate.contains('@') && candidate.contains('.') && !candidate.chars().any(char::is_whitespace)
}

/// Trims, filters and deduplicates address candidates into sorted order.
pub fn coerce_email_list<'a, I>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .map(str::trim)
        .filter(|candidate| is_email_like(candidate))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Accepts an array of strings or a comma/semicolon separated string.
/// Anything else yields no addresses.
pub fn coerce_emails(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => coerce_email_list(items.iter().filter_map(Value::as_str)),
        Some(Value::String(joined)) => coerce_email_list(joined.split([',', ';'])),
        _ => Vec::new(),
    }
}

// null 與缺漏欄位一樣視為空字串，其他非字串值使用 JSON 表示
fn coerce_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

fn flatten(raw: Vec<RawRecord>) -> Vec<RawRecord> {
    let mut flat = Vec::with_capacity(raw.len());
    for item in raw {
        match item {
            Value::Array(nested) => flat.extend(nested),
            other => flat.push(other),
        }
    }
    flat
}

fn missing_fields(company: &str, role: &str, emails: &[String]) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if company.is_empty() {
        missing.push("company");
    }
    if role.is_empty() {
        missing.push("role");
    }
    if emails.is_empty() {
        missing.push("emails");
    }
    missing
}

pub fn normalize_applications(raw: Vec<RawRecord>) -> Vec<ApplicationRecord> {
    let flat = flatten(raw);
    let input_rows = flat.len();
    let mut cleaned = Vec::with_capacity(input_rows);

    for (index, item) in flat.into_iter().enumerate() {
        let Value::Object(fields) = &item else {
            tracing::warn!(
                "⚠️ Skipping non-object application at index {}: {}",
                index,
                item
            );
            continue;
        };

        let company = coerce_text(fields.get("company"));
        let role = coerce_text(fields.get("role"));
        let emails = coerce_emails(fields.get("emails"));

        let missing = missing_fields(&company, &role, &emails);
        if !missing.is_empty() {
            tracing::warn!(
                "⚠️ Skipping row {} due to missing {} -> company='{}', role='{}', emails={:?}",
                index,
                missing.join(", "),
                company,
                role,
                emails
            );
            continue;
        }

        cleaned.push(ApplicationRecord {
            company,
            role,
            emails,
        });
    }

    tracing::debug!(
        "Normalized {} of {} application rows",
        cleaned.len(),
        input_rows
    );
    cleaned
}

/// Re-applies the normalization rules to already-typed records.
/// Idempotent on the output of [`normalize_applications`].
pub fn revalidate(records: Vec<ApplicationRecord>) -> Vec<ApplicationRecord> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let company = record.company.trim().to_string();
            let role = record.role.trim().to_string();
            let emails = coerce_email_list(record.emails.iter().map(String::as_str));

            let missing = missing_fields(&company, &role, &emails);
            if missing.is_empty() {
                Some(ApplicationRecord {
                    company,
                    role,
                    emails,
                })
            } else {
                tracing::warn!(
                    "⚠️ Skipping record {} due to missing {}",
                    index,
                    missing.join(", ")
                );
                None
            }
        })
        .collect()
}

//! CSV import: parsing, column mapping and candidate construction.

use crate::errors::AppError;
use crate::models::{CandidateRecord, INDUSTRY_OPTIONS, SIZE_OPTIONS};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// A lead field the user must map to a CSV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequiredField {
    pub key: &'static str,
    pub label: &'static str,
}

pub const REQUIRED_FIELDS: [RequiredField; 10] = [
    RequiredField { key: "contact", label: "Contact Name" },
    RequiredField { key: "company", label: "Company" },
    RequiredField { key: "title", label: "Job Title" },
    RequiredField { key: "industry", label: "Industry" },
    RequiredField { key: "companySize", label: "Company Size" },
    RequiredField { key: "email", label: "Email" },
    RequiredField { key: "website", label: "Website" },
    RequiredField { key: "pageViews", label: "Page Views" },
    RequiredField { key: "downloads", label: "Downloads" },
    RequiredField { key: "webinarAttended", label: "Webinar Attended (yes/no)" },
];

/// One data row, keyed by header name in header order.
///
/// Rows shorter than the header line simply lack the trailing keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CsvRow {
    fields: Vec<(String, String)>,
}

impl CsvRow {
    fn insert(&mut self, header: &str, value: String) {
        // Duplicate headers: the later column wins, position stays with the first.
        if let Some(slot) = self.fields.iter_mut().find(|(h, _)| h == header) {
            slot.1 = value;
        } else {
            self.fields.push((header.to_string(), value));
        }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

/// Required-field key to source column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping(BTreeMap<String, String>);

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, column: impl Into<String>) {
        self.0.insert(key.into(), column.into());
    }

    pub fn with(mut self, key: impl Into<String>, column: impl Into<String>) -> Self {
        self.insert(key, column);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Required keys that are missing or mapped to an empty column.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .iter()
            .filter(|field| self.get(field.key).map_or(true, |c| c.trim().is_empty()))
            .map(|field| field.key)
            .collect()
    }
}

fn parse_line(line: &str, line_number: usize) -> Result<Vec<String>, AppError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(AppError::CsvParse(format!(
            "unterminated quoted field on line {}",
            line_number
        )));
    }

    fields.push(current);
    Ok(fields.into_iter().map(|f| f.trim().to_string()).collect())
}

/// Parses delimited text into headers plus rows keyed by header.
///
/// Both `\n` and `\r\n` line endings are accepted. Blank lines are skipped.
/// Commas inside double quotes do not split, and `""` inside quotes is a
/// literal quote. Every field is trimmed.
pub fn parse_csv(text: &str) -> Result<CsvTable, AppError> {
    let text = text.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Err(AppError::CsvParse("the file is empty".to_string()));
    }

    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header_line) = lines
        .next()
        .ok_or_else(|| AppError::CsvParse("missing header row".to_string()))?;
    let headers = parse_line(header_line, 1)?;
    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::CsvParse("header row has no column names".to_string()));
    }

    let mut rows = Vec::new();
    for (idx, line) in lines {
        let values = parse_line(line, idx + 1)?;
        let mut row = CsvRow::default();
        for (header, value) in headers.iter().zip(values) {
            row.insert(header, value);
        }
        rows.push(row);
    }

    tracing::debug!("Parsed CSV with {} column(s) and {} row(s)", headers.len(), rows.len());
    Ok(CsvTable { headers, rows })
}

fn separator_regex() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[_\-\s]+").expect("separator regex is valid"))
}

/// Lowercases and strips underscores, hyphens and whitespace, so
/// `Company_Size`, `company size` and `CompanySize` compare equal.
pub fn normalize_header(raw: &str) -> String {
    separator_regex()
        .replace_all(&raw.trim().to_lowercase(), "")
        .into_owned()
}

/// Pre-selects a column for every required field.
///
/// A header matches when its normalized form equals the field's key or label.
/// Fields with no matching header fall back to the first header.
pub fn suggest_mapping(headers: &[String]) -> ColumnMapping {
    let mut mapping = ColumnMapping::new();
    let Some(first) = headers.first() else {
        return mapping;
    };

    for field in REQUIRED_FIELDS.iter() {
        let key = normalize_header(field.key);
        let label = normalize_header(field.label);
        let matched = headers.iter().find(|h| {
            let normalized = normalize_header(h);
            normalized == key || normalized == label
        });
        mapping.insert(field.key, matched.unwrap_or(first).clone());
    }
    mapping
}

/// Rejects a mapping unless every required field has a column.
pub fn validate_mapping(mapping: &ColumnMapping) -> Result<(), AppError> {
    let missing = mapping.missing_keys();
    if missing.is_empty() {
        return Ok(());
    }
    tracing::warn!("Import blocked: unmapped field(s) {:?}", missing);
    Err(AppError::Mapping(format!(
        "Please map all required fields. Missing: {}",
        missing.join(", ")
    )))
}

/// Resolves the value for one required field from one row.
///
/// Tries the mapped column exactly, then any header equal after
/// normalization, then the first non-empty value in the row.
pub fn resolve_value(row: &CsvRow, mapping: &ColumnMapping, key: &str, row_number: usize) -> String {
    let Some(mapped) = mapping.get(key).filter(|m| !m.is_empty()) else {
        tracing::debug!("Row {}: no mapping for key '{}'", row_number, key);
        return String::new();
    };

    if let Some(value) = row.get(mapped).filter(|v| !v.is_empty()) {
        return value.to_string();
    }

    let normalized_mapped = normalize_header(mapped);
    if let Some((header, value)) = row
        .iter()
        .find(|(h, v)| !v.is_empty() && normalize_header(h) == normalized_mapped)
    {
        tracing::debug!(
            "Row {}: key='{}' mapped='{}' resolved via normalized header '{}'",
            row_number,
            key,
            mapped,
            header
        );
        return value.to_string();
    }

    if let Some((header, value)) = row.iter().find(|(_, v)| !v.is_empty()) {
        tracing::debug!(
            "Row {}: key='{}' mapped='{}' fell back to first non-empty column '{}'",
            row_number,
            key,
            mapped,
            header
        );
        return value.to_string();
    }

    tracing::debug!("Row {}: key='{}' has no value", row_number, key);
    String::new()
}

/// Matches free text against an enumerated option set, case-insensitively.
/// Unmatched values pass through trimmed.
pub fn normalize_option(raw: &str, options: &[&str]) -> String {
    let trimmed = raw.trim();
    options
        .iter()
        .find(|opt| opt.eq_ignore_ascii_case(trimmed))
        .map(|opt| opt.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Parses the leading integer of a value, the way a lenient form field would:
/// `"12 visits"` is 12, `"abc"` and negatives are 0.
pub fn parse_count(raw: &str) -> u32 {
    let trimmed = raw.trim_start();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if unsigned.starts_with('-') {
        return 0;
    }
    let digits: String = unsigned.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse().unwrap_or(u32::MAX)
}

fn optional(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Turns parsed rows into unscored candidates using the mapping.
pub fn build_candidates(table: &CsvTable, mapping: &ColumnMapping) -> Vec<CandidateRecord> {
    table
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let row_number = idx + 1;
            let get = |key: &str| resolve_value(row, mapping, key, row_number);

            CandidateRecord {
                contact: get("contact"),
                company: get("company"),
                title: get("title"),
                industry: normalize_option(&get("industry"), &INDUSTRY_OPTIONS),
                company_size: normalize_option(&get("companySize"), &SIZE_OPTIONS),
                email: optional(get("email")),
                website: optional(get("website")),
                page_views: parse_count(&get("pageViews")),
                downloads: parse_count(&get("downloads")),
                webinar_attended: get("webinarAttended").trim().eq_ignore_ascii_case("yes"),
            }
        })
        .collect()
}

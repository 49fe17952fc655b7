// src/types/resume_data.rs
//! Resume record structures shared by the store, the renderers and the AI proxy

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::utils::is_truthy;

// ===== Resume JSON Structure =====

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResumeData {
    pub personal_info: PersonalInfo,
    pub work_experience: Vec<WorkExperience>,
    pub education: Vec<Education>,
    #[serde(deserialize_with = "deserialize_skills")]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub full_name: String,
    pub job_title: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub linkedin: String,
    pub website: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkExperience {
    pub company: String,
    pub position: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub current: bool,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    pub institution: String,
    pub degree: String,
    pub field_of_study: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub gpa: String,
}

// ===== Field fallbacks =====

/// Canonical key followed by the spellings older forms and imports use, in priority order
type FieldMap = &'static [(&'static str, &'static [&'static str])];

const RESUME_FIELDS: FieldMap = &[
    ("personalInfo", &["personal_info", "personal"]),
    ("workExperience", &["work_experience", "experience"]),
    ("education", &[]),
    ("skills", &[]),
];

const PERSONAL_FIELDS: FieldMap = &[
    ("fullName", &["full_name", "name"]),
    ("jobTitle", &["job_title", "title"]),
    ("email", &[]),
    ("phone", &["phoneNumber", "phone_number"]),
    ("location", &["address"]),
    ("linkedin", &[]),
    ("website", &["portfolio"]),
    ("summary", &["professionalSummary", "professional_summary"]),
];

const EXPERIENCE_FIELDS: FieldMap = &[
    ("company", &["employer"]),
    ("position", &["role", "title"]),
    ("location", &[]),
    ("startDate", &["start_date"]),
    ("endDate", &["end_date"]),
    ("current", &["isCurrent", "is_current"]),
    ("description", &[]),
];

const EDUCATION_FIELDS: FieldMap = &[
    ("institution", &["school"]),
    ("degree", &[]),
    ("fieldOfStudy", &["field_of_study", "field", "major"]),
    ("location", &[]),
    ("startDate", &["start_date"]),
    ("endDate", &["end_date", "graduationDate", "graduation_date"]),
    ("gpa", &[]),
];

/// Rebuild an object under canonical keys. The first non-null spelling wins and
/// nulls are dropped so the field falls back to its default.
fn canonical_object(mut map: Map<String, Value>, fields: FieldMap) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, fallbacks) in fields {
        let mut found = None;
        for name in std::iter::once(*key).chain(fallbacks.iter().copied()) {
            match map.remove(name) {
                Some(Value::Null) | None => {}
                Some(value) => {
                    found = Some(value);
                    break;
                }
            }
        }
        if let Some(value) = found {
            out.insert(key.to_string(), value);
        }
    }
    out
}

/// Entries hold text and one flag; numbers become text and `"true"` becomes a flag
fn canonical_entry(value: Value, fields: FieldMap) -> Value {
    let map = match value {
        Value::Object(map) => map,
        other => return other,
    };
    let entry = canonical_object(map, fields)
        .into_iter()
        .map(|(key, value)| {
            let value = match (key.as_str(), value) {
                ("current", Value::String(s)) => Value::Bool(is_truthy(&s)),
                ("current", value) => value,
                (_, Value::Number(n)) => Value::String(n.to_string()),
                (_, value) => value,
            };
            (key, value)
        })
        .collect();
    Value::Object(entry)
}

fn canonical_list(value: Value, fields: FieldMap) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|item| !item.is_null())
                .map(|item| canonical_entry(item, fields))
                .collect(),
        ),
        other => other,
    }
}

fn canonical_resume(value: Value) -> Value {
    let map = match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return other,
    };

    let mut resume = canonical_object(map, RESUME_FIELDS);
    if let Some(info) = resume.remove("personalInfo") {
        resume.insert("personalInfo".to_string(), canonical_entry(info, PERSONAL_FIELDS));
    }
    if let Some(list) = resume.remove("workExperience") {
        resume.insert("workExperience".to_string(), canonical_list(list, EXPERIENCE_FIELDS));
    }
    if let Some(list) = resume.remove("education") {
        resume.insert("education".to_string(), canonical_list(list, EDUCATION_FIELDS));
    }
    Value::Object(resume)
}

/// A single validation problem, addressed by a dotted path into the record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Skills arrive as a string list, a list of `{ "name": .. }` objects, or one
/// comma/newline separated string depending on which form produced them.
fn deserialize_skills<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let raw: Vec<String> = match value {
        Value::Null => Vec::new(),
        Value::String(s) => s.split([',', '\n', ';']).map(str::to_string).collect(),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Object(map) => map
                    .get("name")
                    .or_else(|| map.get("skill"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "skills must be a list or a string, got {}",
                other
            )))
        }
    };
    Ok(dedup_skills(raw))
}

/// Trim, drop blanks and remove case-insensitive duplicates, keeping the first spelling
pub fn dedup_skills<I, S>(skills: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    skills
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_lowercase()))
        .collect()
}

// ===== Dates =====

/// Parse the partial dates the forms produce (`YYYY-MM`, `YYYY-MM-DD`, `YYYY`)
pub fn parse_partial_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", input), "%Y-%m-%d") {
        return Some(date);
    }
    if input.len() == 4 && input.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(&format!("{}-01-01", input), "%Y-%m-%d").ok();
    }
    None
}

/// Human form of a stored date: `2021-03` becomes `Mar 2021`, free text is kept
pub fn display_date(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.to_string();
    }
    match parse_partial_date(trimmed) {
        Some(date) => date.format("%b %Y").to_string(),
        None => trimmed.to_string(),
    }
}

/// `start - end` with `Present` for ongoing entries; empty when nothing is known
pub fn display_range(start: &str, end: &str, current: bool) -> String {
    let start = display_date(start);
    let end = if current {
        "Present".to_string()
    } else {
        display_date(end)
    };

    match (start.is_empty(), end.is_empty()) {
        (true, true) => String::new(),
        (false, true) => start,
        (true, false) => end,
        (false, false) => format!("{} - {}", start, end),
    }
}

fn dates_out_of_order(start: &str, end: &str) -> bool {
    match (parse_partial_date(start), parse_partial_date(end)) {
        (Some(s), Some(e)) => e < s,
        _ => false,
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

// ===== Record operations =====

impl ResumeData {
    /// Parse a loosely shaped JSON document coming from the forms or an import
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(canonical_resume(value))
    }

    pub fn validate(&self) -> Vec<FieldIssue> {
        let mut issues = Vec::new();
        let info = &self.personal_info;

        if info.full_name.trim().is_empty() {
            issues.push(FieldIssue::new(
                "personalInfo.fullName",
                "Full name is required",
            ));
        }

        if !info.email.trim().is_empty() && !is_plausible_email(info.email.trim()) {
            issues.push(FieldIssue::new(
                "personalInfo.email",
                "Email address is not valid",
            ));
        }

        for (i, exp) in self.work_experience.iter().enumerate() {
            if exp.current && !exp.end_date.trim().is_empty() {
                issues.push(FieldIssue::new(
                    format!("workExperience[{}].endDate", i),
                    "A current position cannot have an end date",
                ));
            } else if dates_out_of_order(&exp.start_date, &exp.end_date) {
                issues.push(FieldIssue::new(
                    format!("workExperience[{}].endDate", i),
                    "End date is before start date",
                ));
            }
        }

        for (i, edu) in self.education.iter().enumerate() {
            if dates_out_of_order(&edu.start_date, &edu.end_date) {
                issues.push(FieldIssue::new(
                    format!("education[{}].endDate", i),
                    "End date is before start date",
                ));
            }
        }

        issues
    }

    /// Share of the four form steps that hold data, as a percentage
    pub fn completeness(&self) -> u8 {
        let steps = [
            !self.personal_info.full_name.trim().is_empty()
                && !self.personal_info.email.trim().is_empty(),
            !self.work_experience.is_empty(),
            !self.education.is_empty(),
            !self.skills.is_empty(),
        ];
        let done = steps.iter().filter(|s| **s).count();
        (done * 100 / steps.len()) as u8
    }

    pub fn default_title(&self) -> String {
        let name = self.personal_info.full_name.trim();
        if name.is_empty() {
            "Untitled Resume".to_string()
        } else {
            format!("{} Resume", name)
        }
    }
}

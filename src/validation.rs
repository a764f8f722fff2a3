//! Form input model and validation
//!
//! [`validate`] is a pure function: it never touches the network or the
//! orchestrator state, and it reports every offending field in one pass so the
//! presentation layer can highlight all of them at once.

use regex::Regex;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::error::ValidationErrors;
use crate::types::DeliveryMethod;

/// Question set holding the five general questions
pub const GENERAL_SET: &str = "general";
/// Question set (and key) holding the free-text personal description
pub const ADDITIONAL_INFO: &str = "additional-info";
/// Field key used for email address errors
pub const EMAIL_FIELD: &str = "email";

/// Technology question sets and the maximum number of answers each accepts
const TECHNOLOGY_SETS: &[(&str, usize)] = &[
    ("languages", 42),
    ("databases", 30),
    ("cloud-development", 42),
    ("web-frameworks", 28),
    ("dev-ides", 27),
    ("llms", 17),
    ("doc-and-collab", 25),
    ("operating-systems", 15),
];

const GENERAL_KEYS: &[&str] = &[
    "job-level",
    "job-boards",
    "deep-mode",
    "cover-letter-num",
    "cover-letter-style",
];

const JOB_LEVELS: &[&str] = &["Expert-level", "Expert", "Intermediate", "Entry", "Intern"];
const ADJACENT_JOB_LEVELS: &[[&str; 2]] = &[
    ["Expert-level", "Intermediate"],
    ["Expert", "Intermediate"],
    ["Intermediate", "Entry"],
    ["Entry", "Intern"],
];
const JOB_BOARDS: &[&str] = &["Duunitori", "Jobly", "Indeed"];
const DEEP_MODE: &[&str] = &["Yes", "No"];
const COVER_LETTER_STYLES: &[&str] = &["Professional", "Friendly", "Confident", "Funny"];

const MAX_SLIDER_LEVEL: i64 = 7;
const MAX_TEXT_FIELD_LEN: usize = 50;
const MAX_ADDITIONAL_INFO_LEN: usize = 3000;
const COVER_LETTER_RANGE: std::ops::RangeInclusive<i64> = 1..=10;

// The pattern is a literal; compilation cannot fail at runtime.
#[allow(clippy::expect_used)]
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email pattern is valid")
});

/// One answer value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Slider level or count
    Level(i64),
    /// Free text
    Text(String),
    /// Multi-select options
    Choices(Vec<String>),
}

impl FieldValue {
    /// Build a choice list from string slices
    pub fn choices<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::Choices(options.into_iter().map(Into::into).collect())
    }

    fn is_blank(&self) -> bool {
        match self {
            FieldValue::Level(_) => false,
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::Choices(options) => options.iter().all(|o| o.trim().is_empty()),
        }
    }

    fn normalized(&self) -> Self {
        match self {
            FieldValue::Level(level) => FieldValue::Level(*level),
            FieldValue::Text(text) => FieldValue::Text(text.trim().to_string()),
            FieldValue::Choices(options) => {
                let mut seen: Vec<String> = Vec::with_capacity(options.len());
                for option in options {
                    let option = option.trim();
                    if !option.is_empty() && !seen.iter().any(|s| s == option) {
                        seen.push(option.to_string());
                    }
                }
                FieldValue::Choices(seen)
            }
        }
    }
}

/// Normalized form submission
///
/// Answers are grouped by question set, then keyed by question key. On the
/// wire each set becomes an array of single-key objects, which is the shape
/// the backend's start endpoint expects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "WireRequest")]
pub struct JobRequest {
    /// Question set -> question key -> value
    pub answers: BTreeMap<String, BTreeMap<String, FieldValue>>,
    /// How the generated documents are delivered
    pub delivery_method: DeliveryMethod,
    /// Address for email delivery
    pub email: Option<String>,
}

impl JobRequest {
    /// Create an empty request with the given delivery method
    pub fn new(delivery_method: DeliveryMethod) -> Self {
        Self {
            delivery_method,
            ..Default::default()
        }
    }

    /// Add (or replace) one answer
    pub fn answer(
        mut self,
        set: impl Into<String>,
        key: impl Into<String>,
        value: FieldValue,
    ) -> Self {
        self.answers
            .entry(set.into())
            .or_default()
            .insert(key.into(), value);
        self
    }

    /// Set the email address for email delivery
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Look up one answer
    pub fn get(&self, set: &str, key: &str) -> Option<&FieldValue> {
        self.answers.get(set).and_then(|fields| fields.get(key))
    }

    /// Every (set, key) pair in the request
    pub fn keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.answers.iter().flat_map(|(set, fields)| {
            fields.keys().map(move |key| (set.as_str(), key.as_str()))
        })
    }
}

impl Serialize for JobRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = 1 + usize::from(self.email.is_some());
        let mut map = serializer.serialize_map(Some(self.answers.len() + extra))?;
        for (set, fields) in &self.answers {
            map.serialize_entry(set, &QuestionItems(fields))?;
        }
        map.serialize_entry("delivery_method", &self.delivery_method)?;
        if let Some(email) = &self.email {
            map.serialize_entry("email", email)?;
        }
        map.end()
    }
}

struct QuestionItems<'a>(&'a BTreeMap<String, FieldValue>);

impl Serialize for QuestionItems<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (key, value) in self.0 {
            seq.serialize_element(&SingleEntry(key, value))?;
        }
        seq.end()
    }
}

struct SingleEntry<'a>(&'a str, &'a FieldValue);

impl Serialize for SingleEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.0, self.1)?;
        map.end()
    }
}

#[derive(Deserialize)]
struct WireRequest {
    #[serde(default)]
    delivery_method: Option<DeliveryMethod>,
    #[serde(default)]
    email: Option<String>,
    #[serde(flatten)]
    sets: BTreeMap<String, Vec<BTreeMap<String, FieldValue>>>,
}

impl From<WireRequest> for JobRequest {
    fn from(wire: WireRequest) -> Self {
        let answers = wire
            .sets
            .into_iter()
            .map(|(set, items)| (set, items.into_iter().flatten().collect()))
            .collect();
        Self {
            answers,
            delivery_method: wire.delivery_method.unwrap_or_default(),
            email: wire.email,
        }
    }
}

/// Validate and normalize a raw submission
///
/// Returns the normalized request (trimmed text, de-duplicated choices, numeric
/// cover-letter counts) with exactly the submitted keys, or every violated field.
pub fn validate(raw: &JobRequest) -> Result<JobRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut normalized = JobRequest {
        answers: BTreeMap::new(),
        delivery_method: raw.delivery_method,
        email: raw.email.as_ref().map(|e| e.trim().to_string()),
    };

    for (set, fields) in &raw.answers {
        let mut out = BTreeMap::new();
        for (key, value) in fields {
            let value = value.normalized();
            let value = match set.as_str() {
                GENERAL_SET => check_general(key, value, &mut errors),
                ADDITIONAL_INFO => check_additional_info(key, value, &mut errors),
                other if technology_limit(other).is_some() => {
                    check_technology(key, value, &mut errors)
                }
                _ => value,
            };
            out.insert(key.clone(), value);
        }

        if set != GENERAL_SET && set != ADDITIONAL_INFO {
            match technology_limit(set) {
                Some(limit) if fields.len() > limit => {
                    errors.add(set.as_str(), format!("at most {limit} answers allowed"));
                }
                Some(_) => {}
                None => errors.add(set.as_str(), "unknown question set"),
            }
        }
        normalized.answers.insert(set.clone(), out);
    }

    for key in GENERAL_KEYS {
        let present = raw.get(GENERAL_SET, key).is_some_and(|v| !v.is_blank());
        if !present && !errors.contains(key) {
            errors.add(*key, "is required");
        }
    }

    let has_info = raw
        .get(ADDITIONAL_INFO, ADDITIONAL_INFO)
        .is_some_and(|v| !v.is_blank());
    if !has_info && !errors.contains(ADDITIONAL_INFO) {
        errors.add(ADDITIONAL_INFO, "is required");
    }

    if normalized.delivery_method == DeliveryMethod::Email {
        match normalized.email.as_deref() {
            None | Some("") => errors.add(EMAIL_FIELD, "is required for email delivery"),
            Some(email) if !EMAIL_RE.is_match(email) => {
                errors.add(EMAIL_FIELD, "is not a valid email address");
            }
            Some(_) => {}
        }
    }

    if errors.is_empty() {
        Ok(normalized)
    } else {
        Err(errors)
    }
}

fn technology_limit(set: &str) -> Option<usize> {
    TECHNOLOGY_SETS
        .iter()
        .find(|(name, _)| *name == set)
        .map(|(_, limit)| *limit)
}

fn check_general(key: &str, value: FieldValue, errors: &mut ValidationErrors) -> FieldValue {
    if value.is_blank() {
        // Reported once by the required-key pass
        return value;
    }
    match key {
        "job-level" => {
            if let Some(options) = expect_choices(key, &value, errors) {
                check_options(key, options, JOB_LEVELS, 2, errors);
                if options.len() == 2
                    && !ADJACENT_JOB_LEVELS.iter().any(|pair| {
                        pair.contains(&options[0].as_str()) && pair.contains(&options[1].as_str())
                    })
                {
                    errors.add(key, "two selected levels must be adjacent");
                }
            }
            value
        }
        "job-boards" => {
            if let Some(options) = expect_choices(key, &value, errors) {
                check_options(key, options, JOB_BOARDS, JOB_BOARDS.len(), errors);
            }
            value
        }
        "cover-letter-style" => {
            if let Some(options) = expect_choices(key, &value, errors) {
                check_options(key, options, COVER_LETTER_STYLES, 2, errors);
            }
            value
        }
        "deep-mode" => {
            match &value {
                FieldValue::Text(text) if DEEP_MODE.contains(&text.as_str()) => {}
                _ => errors.add(key, "must be Yes or No"),
            }
            value
        }
        "cover-letter-num" => {
            let count = match &value {
                FieldValue::Level(n) => Some(*n),
                FieldValue::Text(text) => text.parse::<i64>().ok(),
                FieldValue::Choices(_) => None,
            };
            match count {
                Some(n) if COVER_LETTER_RANGE.contains(&n) => FieldValue::Level(n),
                Some(n) => {
                    errors.add(key, format!("must be between 1 and 10, got {n}"));
                    value
                }
                None => {
                    errors.add(key, "must be a number between 1 and 10");
                    value
                }
            }
        }
        _ => {
            errors.add(key, "unknown general question");
            value
        }
    }
}

fn check_technology(key: &str, value: FieldValue, errors: &mut ValidationErrors) -> FieldValue {
    if key.starts_with("text-field") {
        match &value {
            FieldValue::Text(text) if text.chars().count() > MAX_TEXT_FIELD_LEN => {
                errors.add(key, format!("must be at most {MAX_TEXT_FIELD_LEN} characters"));
            }
            FieldValue::Text(_) => {}
            _ => errors.add(key, "must be text"),
        }
    } else {
        match &value {
            FieldValue::Level(level) if (0..=MAX_SLIDER_LEVEL).contains(level) => {}
            _ => errors.add(key, format!("must be a level between 0 and {MAX_SLIDER_LEVEL}")),
        }
    }
    value
}

fn check_additional_info(key: &str, value: FieldValue, errors: &mut ValidationErrors) -> FieldValue {
    if key != ADDITIONAL_INFO {
        errors.add(key, "unknown field in additional-info");
        return value;
    }
    match &value {
        FieldValue::Text(text) if text.is_empty() => errors.add(key, "is required"),
        FieldValue::Text(text) if text.chars().count() > MAX_ADDITIONAL_INFO_LEN => {
            errors.add(
                key,
                format!("must be at most {MAX_ADDITIONAL_INFO_LEN} characters"),
            );
        }
        FieldValue::Text(_) => {}
        _ => errors.add(key, "must be text"),
    }
    value
}

fn expect_choices<'a>(
    key: &str,
    value: &'a FieldValue,
    errors: &mut ValidationErrors,
) -> Option<&'a [String]> {
    match value {
        FieldValue::Choices(options) => Some(options),
        _ => {
            errors.add(key, "must be a list of options");
            None
        }
    }
}

fn check_options(
    key: &str,
    options: &[String],
    allowed: &[&str],
    max: usize,
    errors: &mut ValidationErrors,
) {
    if options.len() > max {
        errors.add(key, format!("must contain at most {max} options"));
    }
    for option in options {
        if !allowed.contains(&option.as_str()) {
            errors.add(key, format!("invalid option: {option}"));
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> JobRequest {
        JobRequest::new(DeliveryMethod::Download)
            .answer(GENERAL_SET, "job-level", FieldValue::choices(["Expert", "Intermediate"]))
            .answer(GENERAL_SET, "job-boards", FieldValue::choices(["Duunitori", "Jobly"]))
            .answer(GENERAL_SET, "deep-mode", FieldValue::Text("Yes".into()))
            .answer(GENERAL_SET, "cover-letter-num", FieldValue::Level(3))
            .answer(GENERAL_SET, "cover-letter-style", FieldValue::choices(["Professional"]))
            .answer("languages", "python", FieldValue::Level(7))
            .answer("languages", "text-field1", FieldValue::Text("  Zig ".into()))
            .answer(
                ADDITIONAL_INFO,
                ADDITIONAL_INFO,
                FieldValue::Text("Backend developer with five years of Rust.".into()),
            )
    }

    #[test]
    fn valid_request_passes_with_exactly_the_submitted_keys() {
        let raw = valid_request();
        let normalized = validate(&raw).unwrap();

        let raw_keys: Vec<_> = raw.keys().collect();
        let normalized_keys: Vec<_> = normalized.keys().collect();
        assert_eq!(raw_keys, normalized_keys);
        assert_eq!(
            normalized.get("languages", "text-field1"),
            Some(&FieldValue::Text("Zig".into()))
        );
    }

    #[test]
    fn every_missing_required_field_is_reported() {
        let raw = JobRequest::new(DeliveryMethod::Download);
        let errors = validate(&raw).unwrap_err();

        for key in GENERAL_KEYS {
            assert!(errors.contains(key), "missing {key}");
        }
        assert!(errors.contains(ADDITIONAL_INFO));
        assert_eq!(errors.len(), GENERAL_KEYS.len() + 1);
    }

    #[test]
    fn each_single_missing_field_is_reported_without_others() {
        let base = valid_request();
        let mut all_keys: Vec<(String, String)> = GENERAL_KEYS
            .iter()
            .map(|k| (GENERAL_SET.to_string(), k.to_string()))
            .collect();
        all_keys.push((ADDITIONAL_INFO.to_string(), ADDITIONAL_INFO.to_string()));

        for (set, key) in all_keys {
            let mut raw = base.clone();
            raw.answers.get_mut(&set).unwrap().remove(&key);
            let errors = validate(&raw).unwrap_err();
            assert!(errors.contains(&key), "{key} should be reported");
            assert_eq!(errors.len(), 1, "only {key} should fail: {errors}");
        }
    }

    #[test]
    fn whitespace_only_values_count_as_missing() {
        let raw = valid_request()
            .answer(GENERAL_SET, "deep-mode", FieldValue::Text("   ".into()))
            .answer(ADDITIONAL_INFO, ADDITIONAL_INFO, FieldValue::Text("\n\t".into()))
            .answer(GENERAL_SET, "job-boards", FieldValue::choices([" "]));
        let errors = validate(&raw).unwrap_err();
        assert_eq!(errors.messages("deep-mode"), ["is required"]);
        assert_eq!(errors.messages(ADDITIONAL_INFO), ["is required"]);
        assert_eq!(errors.messages("job-boards"), ["is required"]);
    }

    #[test]
    fn email_delivery_requires_valid_address() {
        let mut raw = valid_request();
        raw.delivery_method = DeliveryMethod::Email;
        let errors = validate(&raw).unwrap_err();
        assert!(errors.contains(EMAIL_FIELD));

        for bad in ["not-an-email", "a@b", "a b@example.com", "@example.com"] {
            let raw = raw.clone().with_email(bad);
            let errors = validate(&raw).unwrap_err();
            assert!(errors.contains(EMAIL_FIELD), "{bad} should be rejected");
        }

        let ok = raw.with_email("  jane.doe@example.fi ");
        let normalized = validate(&ok).unwrap();
        assert_eq!(normalized.email.as_deref(), Some("jane.doe@example.fi"));
    }

    #[test]
    fn download_delivery_ignores_email() {
        let raw = valid_request().with_email("garbage");
        assert!(validate(&raw).is_ok());
    }

    #[test]
    fn job_level_rules() {
        let raw = valid_request().answer(
            GENERAL_SET,
            "job-level",
            FieldValue::choices(["Expert", "Entry"]),
        );
        let errors = validate(&raw).unwrap_err();
        assert_eq!(
            errors.messages("job-level"),
            ["two selected levels must be adjacent"]
        );

        let raw = valid_request().answer(
            GENERAL_SET,
            "job-level",
            FieldValue::choices(["Entry", "Intern", "Senior"]),
        );
        let errors = validate(&raw).unwrap_err();
        assert!(
            errors
                .messages("job-level")
                .contains(&"must contain at most 2 options".to_string())
        );
        assert!(
            errors
                .messages("job-level")
                .contains(&"invalid option: Senior".to_string())
        );

        let raw = valid_request().answer(GENERAL_SET, "job-level", FieldValue::Level(2));
        let errors = validate(&raw).unwrap_err();
        assert_eq!(errors.messages("job-level"), ["must be a list of options"]);
    }

    #[test]
    fn cover_letter_count_accepts_numeric_text() {
        let raw = valid_request().answer(
            GENERAL_SET,
            "cover-letter-num",
            FieldValue::Text(" 5 ".into()),
        );
        let normalized = validate(&raw).unwrap();
        assert_eq!(
            normalized.get(GENERAL_SET, "cover-letter-num"),
            Some(&FieldValue::Level(5))
        );

        let raw = valid_request().answer(GENERAL_SET, "cover-letter-num", FieldValue::Level(11));
        let errors = validate(&raw).unwrap_err();
        assert!(errors.contains("cover-letter-num"));
    }

    #[test]
    fn technology_answers_are_range_checked() {
        let raw = valid_request()
            .answer("databases", "postgres", FieldValue::Level(8))
            .answer("llms", "text-field1", FieldValue::Text("x".repeat(51)))
            .answer("hobbies", "chess", FieldValue::Level(3));
        let errors = validate(&raw).unwrap_err();
        assert!(errors.contains("postgres"));
        assert!(errors.contains("text-field1"));
        assert!(errors.contains("hobbies"));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn duplicate_choices_are_collapsed() {
        let raw = valid_request().answer(
            GENERAL_SET,
            "job-boards",
            FieldValue::choices(["Jobly", " Jobly", "Indeed"]),
        );
        let normalized = validate(&raw).unwrap();
        assert_eq!(
            normalized.get(GENERAL_SET, "job-boards"),
            Some(&FieldValue::choices(["Jobly", "Indeed"]))
        );
    }

    #[test]
    fn serializes_to_backend_shape() {
        let request = validate(&valid_request().with_email("a@b.fi")).unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["delivery_method"], "download");
        assert_eq!(json["email"], "a@b.fi");
        let general = json["general"].as_array().unwrap();
        assert_eq!(general.len(), 5);
        assert!(general.iter().all(|item| item.as_object().unwrap().len() == 1));
        assert_eq!(json["languages"][0]["python"], 7);
        assert_eq!(json[ADDITIONAL_INFO][0][ADDITIONAL_INFO].as_str().unwrap().len(), 42);
    }

    #[test]
    fn deserializes_from_backend_shape() {
        let json = r#"{
            "general": [{"job-level": ["Entry"]}, {"deep-mode": "No"}],
            "languages": [{"rust": 6}, {"text-field1": "Gleam"}],
            "delivery_method": "email",
            "email": "dev@example.com"
        }"#;
        let request: JobRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.delivery_method, DeliveryMethod::Email);
        assert_eq!(request.get("languages", "rust"), Some(&FieldValue::Level(6)));
        assert_eq!(
            request.get(GENERAL_SET, "job-level"),
            Some(&FieldValue::choices(["Entry"]))
        );
    }
}

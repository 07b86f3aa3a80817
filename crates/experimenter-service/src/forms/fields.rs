//! Field-level cleaning shared by every form.

use std::str::FromStr;

use chrono::NaiveDate;
use experimenter_core::error::FormErrors;
use reqwest::Url;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_URL: &str = "Enter a valid URL.";
pub const INVALID_DATE: &str = "Enter a valid date.";
pub const INVALID_JSON: &str = "This is not valid JSON.";
pub const INVALID_BUGZILLA_URL: &str = "Please provide a valid Bugzilla URL";

pub const BUGZILLA_BASE_URL: &str = "https://bugzilla.mozilla.org/";

/// Multiple-choice key selecting every option.
pub const ALL_KEY: &str = "__all__";

pub fn invalid_choice(value: &str) -> String {
    format!("Select a valid choice. {value} is not one of the available choices.")
}

pub fn min_value(min: i64) -> String {
    format!("Ensure this value is greater than or equal to {min}.")
}

pub fn max_value(max: i64) -> String {
    format!("Ensure this value is less than or equal to {max}.")
}

pub fn max_length(max: usize, actual: usize) -> String {
    format!("Ensure this value has at most {max} characters (it has {actual}).")
}

/// Trimmed text, with blank input treated as absent.
pub fn text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn required_text(errors: &mut FormErrors, field: &str, value: Option<String>) -> Option<String> {
    let value = text(value);
    if value.is_none() {
        errors.add(field, REQUIRED);
    }
    value
}

/// Parse a choice field. `Ok(None)` when blank.
pub fn choice<T: FromStr>(
    errors: &mut FormErrors,
    field: &str,
    value: Option<String>,
    required: bool,
) -> Option<T> {
    match text(value) {
        None => {
            if required {
                errors.add(field, REQUIRED);
            }
            None
        }
        Some(v) => match v.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                errors.add(field, invalid_choice(&v));
                None
            }
        },
    }
}

/// Integer within `min..=max`. Blank input is `None`.
pub fn integer(
    errors: &mut FormErrors,
    field: &str,
    value: Option<i64>,
    min: i64,
    max: i64,
) -> Option<u32> {
    let value = value?;
    if value < min {
        errors.add(field, min_value(min));
        return None;
    }
    if value > max {
        errors.add(field, max_value(max));
        return None;
    }
    u32::try_from(value).ok()
}

/// `YYYY-MM-DD`.
pub fn date(errors: &mut FormErrors, field: &str, value: Option<String>) -> Option<NaiveDate> {
    let value = text(value)?;
    match NaiveDate::parse_from_str(&value, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            errors.add(field, INVALID_DATE);
            None
        }
    }
}

pub fn is_valid_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

pub fn url(errors: &mut FormErrors, field: &str, value: Option<String>, required: bool) -> Option<String> {
    let value = if required {
        required_text(errors, field, value)?
    } else {
        text(value)?
    };
    if !is_valid_url(&value) {
        errors.add(field, INVALID_URL);
        return None;
    }
    Some(value)
}

/// A URL that must point at Mozilla's Bugzilla.
pub fn bugzilla_url(
    errors: &mut FormErrors,
    field: &str,
    value: Option<String>,
    required: bool,
) -> Option<String> {
    let value = url(errors, field, value, required)?;
    if !value.contains(BUGZILLA_BASE_URL) {
        errors.add(field, INVALID_BUGZILLA_URL);
        return None;
    }
    Some(value)
}

pub fn is_valid_json(value: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(value).is_ok()
}

/// Free text that, when present, must parse as JSON.
pub fn json(errors: &mut FormErrors, field: &str, value: Option<String>) -> Option<String> {
    let value = text(value)?;
    if !is_valid_json(&value) {
        errors.add(field, INVALID_JSON);
        return None;
    }
    Some(value)
}

/// Multiple choice where the `__all__` key means no restriction.
pub fn all_or_subset(
    errors: &mut FormErrors,
    field: &str,
    values: Vec<String>,
    known: &[String],
) -> Vec<String> {
    if values.iter().any(|v| v == ALL_KEY) {
        return Vec::new();
    }
    let mut selected = Vec::new();
    for value in values {
        if !known.contains(&value) {
            errors.add(field, invalid_choice(&value));
        } else if !selected.contains(&value) {
            selected.push(value);
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bugzilla_urls() {
        let mut errors = FormErrors::new();
        assert!(
            bugzilla_url(
                &mut errors,
                "u",
                Some("https://bugzilla.mozilla.org/show_bug.cgi?id=1".into()),
                true
            )
            .is_some()
        );
        assert!(errors.is_empty());

        bugzilla_url(&mut errors, "u", Some("https://example.com/".into()), true);
        assert_eq!(errors.get("u").unwrap(), [INVALID_BUGZILLA_URL]);

        let mut errors = FormErrors::new();
        bugzilla_url(&mut errors, "u", Some("not a url".into()), true);
        assert_eq!(errors.get("u").unwrap(), [INVALID_URL]);

        let mut errors = FormErrors::new();
        assert!(bugzilla_url(&mut errors, "u", Some("  ".into()), false).is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn all_key_resets_selection() {
        let known = vec!["en-US".to_string(), "de".to_string()];
        let mut errors = FormErrors::new();
        let picked = all_or_subset(
            &mut errors,
            "locales",
            vec!["de".into(), "__all__".into()],
            &known,
        );
        assert!(picked.is_empty());

        let picked = all_or_subset(&mut errors, "locales", vec!["de".into(), "xx".into()], &known);
        assert_eq!(picked, vec!["de".to_string()]);
        assert!(errors.has("locales"));
    }

    #[test]
    fn integer_bounds() {
        let mut errors = FormErrors::new();
        assert_eq!(integer(&mut errors, "n", Some(5), 1, 10), Some(5));
        assert_eq!(integer(&mut errors, "n", Some(0), 1, 10), None);
        assert_eq!(errors.get("n").unwrap(), [min_value(1)]);
        assert_eq!(integer(&mut errors, "m", None, 1, 10), None);
        assert!(!errors.has("m"));
    }

    #[test]
    fn json_values() {
        let mut errors = FormErrors::new();
        assert!(json(&mut errors, "v", Some("{\"a\": 1}".into())).is_some());
        assert!(json(&mut errors, "v", Some("{nope".into())).is_none());
        assert_eq!(errors.get("v").unwrap(), [INVALID_JSON]);
    }
}

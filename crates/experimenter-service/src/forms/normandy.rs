use experimenter_core::error::{ExperimenterResult, FormErrors};
use serde::Deserialize;
use serde_json::Value;

use super::fields;

pub const ENTER_WHOLE_NUMBER: &str = "Enter a whole number.";

/// Recipe id assigned by the delivery service. Accepts a JSON number or
/// a numeric string, as a text input would submit it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NormandyIdForm {
    pub normandy_id: Option<Value>,
}

impl NormandyIdForm {
    /// Submitted value as text, for echoing back to the user.
    pub fn raw(&self) -> String {
        match &self.normandy_id {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    pub fn clean(&self) -> ExperimenterResult<u64> {
        let mut errors = FormErrors::new();
        let parsed = match &self.normandy_id {
            None | Some(Value::Null) => {
                errors.add("normandy_id", fields::REQUIRED);
                None
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                errors.add("normandy_id", fields::REQUIRED);
                None
            }
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            Some(Value::Number(n)) => n.as_i64(),
            Some(_) => None,
        };

        match parsed {
            Some(id) if id >= 1 => errors.finish(id.unsigned_abs()),
            Some(_) => {
                errors.add("normandy_id", fields::min_value(1));
                errors.finish(0)
            }
            None => {
                if errors.is_empty() {
                    errors.add("normandy_id", ENTER_WHOLE_NUMBER);
                }
                errors.finish(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(value: Value) -> NormandyIdForm {
        NormandyIdForm {
            normandy_id: Some(value),
        }
    }

    #[test]
    fn accepts_numbers_and_numeric_strings() {
        assert_eq!(form(json!(1234)).clean().unwrap(), 1234);
        assert_eq!(form(json!(" 42 ")).clean().unwrap(), 42);
    }

    #[test]
    fn rejects_non_numbers() {
        assert!(form(json!("abc")).clean().is_err());
        assert!(form(json!(1.5)).clean().is_err());
        assert!(form(json!(0)).clean().is_err());
        assert!(NormandyIdForm::default().clean().is_err());
    }

    #[test]
    fn raw_value_is_echoed() {
        assert_eq!(form(json!("abc")).raw(), "abc");
        assert_eq!(form(json!(7)).raw(), "7");
    }
}

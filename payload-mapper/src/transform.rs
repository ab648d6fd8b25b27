//! Appliers for the named [`TransformationPrimitive`] variants that a
//! [`FieldMapRule`](payment_core_types::FieldMapRule) may attach to a copy.

use chrono::NaiveDate;
use payment_core_types::{CoreError, TransformationPrimitive};
use serde_json::Value;

use crate::error::{Error, Result};

/// Apply `primitive` to `value`, returning the transformed value.
///
/// `Encrypt`/`Decrypt` are reversible placeholders (base64) rather than a
/// real cipher: payload-mapper only reshapes data, it never owns key
/// material. A dedicated crate would take that over if the system grew one.
pub fn apply(primitive: &TransformationPrimitive, value: &Value) -> Result<Value> {
    match primitive {
        TransformationPrimitive::Uppercase => Ok(Value::String(as_str(value)?.to_uppercase())),
        TransformationPrimitive::Trim => Ok(Value::String(as_str(value)?.trim().to_string())),
        TransformationPrimitive::Mask { visible_suffix } => {
            Ok(Value::String(mask(as_str(value)?, *visible_suffix)))
        }
        TransformationPrimitive::DateFormat { format } => {
            Ok(Value::String(reformat_date(as_str(value)?, format)?))
        }
        TransformationPrimitive::NumberFormat { decimals } => {
            Ok(Value::String(format_number(value, *decimals)?))
        }
        TransformationPrimitive::Encrypt => Ok(Value::String(encode(as_str(value)?))),
        TransformationPrimitive::Decrypt => Ok(Value::String(decode(as_str(value)?)?)),
    }
}

fn as_str(value: &Value) -> Result<&str> {
    value.as_str().ok_or_else(|| {
        Error::Core(CoreError::TypeCoercionError(format!(
            "expected a string, got {}",
            value
        )))
    })
}

fn mask(s: &str, visible_suffix: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= visible_suffix {
        return s.to_string();
    }
    let masked_len = chars.len() - visible_suffix;
    let mut out = String::with_capacity(chars.len());
    out.extend(std::iter::repeat('*').take(masked_len));
    out.extend(&chars[masked_len..]);
    out
}

fn reformat_date(s: &str, format: &str) -> Result<String> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.format(format).to_string());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.format(format).to_string());
    }
    Err(Error::Core(CoreError::TypeCoercionError(format!(
        "value `{}` is not a recognized date",
        s
    ))))
}

fn format_number(value: &Value, decimals: u32) -> Result<String> {
    let n = value.as_f64().ok_or_else(|| {
        Error::Core(CoreError::TypeCoercionError(format!(
            "expected a number, got {}",
            value
        )))
    })?;
    Ok(format!("{:.*}", decimals as usize, n))
}

fn encode(s: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(s.as_bytes())
}

fn decode(s: &str) -> Result<String> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(s.as_bytes())
        .map_err(|e| Error::Core(CoreError::TypeCoercionError(format!("invalid ciphertext: {}", e))))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::Core(CoreError::TypeCoercionError(format!("ciphertext is not utf-8: {}", e))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uppercase_transforms_ascii() {
        let out = apply(&TransformationPrimitive::Uppercase, &json!("wire_domestic")).unwrap();
        assert_eq!(out, json!("WIRE_DOMESTIC"));
    }

    #[test]
    fn trim_removes_surrounding_whitespace() {
        let out = apply(&TransformationPrimitive::Trim, &json!("  alice  ")).unwrap();
        assert_eq!(out, json!("alice"));
    }

    #[test]
    fn mask_keeps_only_the_visible_suffix() {
        let out = apply(
            &TransformationPrimitive::Mask { visible_suffix: 4 },
            &json!("4111111111111234"),
        )
        .unwrap();
        assert_eq!(out, json!("************1234"));
    }

    #[test]
    fn mask_is_a_no_op_when_value_is_shorter_than_the_suffix() {
        let out = apply(&TransformationPrimitive::Mask { visible_suffix: 8 }, &json!("12")).unwrap();
        assert_eq!(out, json!("12"));
    }

    #[test]
    fn date_format_reflows_iso_date() {
        let out = apply(
            &TransformationPrimitive::DateFormat {
                format: "%d/%m/%Y".to_string(),
            },
            &json!("2026-07-28"),
        )
        .unwrap();
        assert_eq!(out, json!("28/07/2026"));
    }

    #[test]
    fn number_format_pads_decimals() {
        let out = apply(&TransformationPrimitive::NumberFormat { decimals: 2 }, &json!(7)).unwrap();
        assert_eq!(out, json!("7.00"));
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let cipher = apply(&TransformationPrimitive::Encrypt, &json!("secret-account")).unwrap();
        let plain = apply(&TransformationPrimitive::Decrypt, &cipher).unwrap();
        assert_eq!(plain, json!("secret-account"));
    }

    #[test]
    fn decrypt_rejects_malformed_ciphertext() {
        assert!(apply(&TransformationPrimitive::Decrypt, &json!("not-base64!!")).is_err());
    }

    #[test]
    fn non_string_input_is_a_type_coercion_error() {
        assert!(apply(&TransformationPrimitive::Uppercase, &json!(42)).is_err());
    }
}

use serde::Deserialize;
use serde_json::Value;

use super::VisionError;
use crate::pipeline::extraction::fields::{extract_date, extract_time, DEFAULT_CURRENCY};
use crate::pipeline::extraction::FieldSet;

/// Fields and flags recovered from a vision model response.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionFields {
    pub is_valid_receipt: bool,
    pub is_legible: bool,
    pub fields: FieldSet,
}

/// Parse the model's free-form answer into receipt fields.
pub fn parse_vision_response(response: &str) -> Result<VisionFields, VisionError> {
    let json_str = extract_json_object(response)?;
    parse_vision_json(json_str)
}

/// Locate the JSON object in a model answer.
///
/// Fenced blocks are preferred (an optional `json` language tag is dropped);
/// the result is then narrowed to the span from the first `{` to the last `}`.
pub fn extract_json_object(response: &str) -> Result<&str, VisionError> {
    let mut candidate = response.trim();

    if candidate.contains("```") {
        if let Some(block) = candidate
            .split("```")
            .map(|part| {
                let part = part.trim();
                part.strip_prefix("json").map(str::trim).unwrap_or(part)
            })
            .find(|part| part.starts_with('{'))
        {
            candidate = block;
        }
    }

    let start = candidate.find('{').ok_or(VisionError::NoJsonFound)?;
    let end = candidate.rfind('}').ok_or(VisionError::NoJsonFound)?;
    if end < start {
        return Err(VisionError::NoJsonFound);
    }
    Ok(&candidate[start..=end])
}

/// Raw schema as the model emits it. Values stay untyped: models mix numbers,
/// strings and `"null"` freely.
#[derive(Debug, Default, Deserialize)]
struct RawVisionResponse {
    es_recibo_valido: Option<Value>,
    imagen_legible: Option<Value>,
    medio_pago: Option<Value>,
    banco: Option<Value>,
    nombre_pagador: Option<Value>,
    nombre_receptor: Option<Value>,
    monto: Option<Value>,
    moneda: Option<Value>,
    fecha: Option<Value>,
    hora: Option<Value>,
    codigo_operacion: Option<Value>,
    ultimos_4_digitos: Option<Value>,
    celular_emisor: Option<Value>,
}

fn parse_vision_json(json_str: &str) -> Result<VisionFields, VisionError> {
    let raw: RawVisionResponse = serde_json::from_str(json_str)
        .map_err(|e| VisionError::MalformedJson(e.to_string()))?;

    let is_valid_receipt = raw.es_recibo_valido.as_ref().and_then(lenient_bool).unwrap_or(false);
    // An omitted legibility flag follows validity.
    let is_legible = raw
        .imagen_legible
        .as_ref()
        .and_then(lenient_bool)
        .unwrap_or(is_valid_receipt);

    let amount = raw.monto.as_ref().and_then(lenient_amount);
    let currency = raw
        .moneda
        .as_ref()
        .and_then(lenient_string)
        .map(|c| c.to_uppercase())
        .or_else(|| amount.map(|_| DEFAULT_CURRENCY.to_string()));

    let fields = FieldSet {
        bank: raw.banco.as_ref().and_then(lenient_string),
        payment_method: raw.medio_pago.as_ref().and_then(lenient_string),
        amount,
        currency,
        operation_code: raw.codigo_operacion.as_ref().and_then(lenient_string),
        date: raw
            .fecha
            .as_ref()
            .and_then(lenient_string)
            .and_then(|d| extract_date(&d)),
        time: raw
            .hora
            .as_ref()
            .and_then(lenient_string)
            .and_then(|t| extract_time(&t)),
        phone: raw.celular_emisor.as_ref().and_then(lenient_string),
        last_digits: raw.ultimos_4_digitos.as_ref().and_then(lenient_string),
        payer_name: raw.nombre_pagador.as_ref().and_then(lenient_string),
        receiver_name: raw.nombre_receptor.as_ref().and_then(lenient_string),
    };

    Ok(VisionFields {
        is_valid_receipt,
        is_legible,
        fields,
    })
}

// ──────────────────────────────────────────────
// Lenient value coercion
// ──────────────────────────────────────────────

/// Text from a string or number; blank and `"null"` are absent.
fn lenient_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.is_empty() || s.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(s)
    }
}

/// Amount from a number or a string such as `"S/ 25,50"`.
fn lenient_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
                .collect::<String>()
                .replace(',', ".");
            cleaned.trim_matches('.').parse::<f64>().ok()?
        }
        _ => return None,
    };
    if amount.is_finite() && amount > 0.0 {
        Some((amount * 100.0).round() / 100.0)
    } else {
        None
    }
}

fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "si" | "sí" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_with_chatter() {
        let response =
            "Here you go:\n```json\n{\"es_recibo_valido\": true, \"monto\": 25.5}\n```\nThanks";
        let parsed = parse_vision_response(response).unwrap();
        assert!(parsed.is_valid_receipt);
        assert_eq!(parsed.fields.amount, Some(25.5));
        assert_eq!(parsed.fields.currency.as_deref(), Some("PEN"));
    }

    #[test]
    fn bare_json_with_prefix_and_suffix() {
        let response = "Resultado: {\"es_recibo_valido\": false} fin";
        assert_eq!(
            extract_json_object(response).unwrap(),
            "{\"es_recibo_valido\": false}"
        );
        let parsed = parse_vision_response(response).unwrap();
        assert!(!parsed.is_valid_receipt);
        assert!(!parsed.is_legible);
    }

    #[test]
    fn fence_without_language_tag() {
        let response = "```\n{\"banco\": \"BCP\"}\n```";
        let parsed = parse_vision_response(response).unwrap();
        assert_eq!(parsed.fields.bank.as_deref(), Some("BCP"));
    }

    #[test]
    fn no_braces_is_an_error() {
        let err = parse_vision_response("I cannot read this image").unwrap_err();
        assert!(matches!(err, VisionError::NoJsonFound));
    }

    #[test]
    fn broken_json_is_an_error() {
        let err = parse_vision_response("{\"monto\": 25.5,,}").unwrap_err();
        assert!(matches!(err, VisionError::MalformedJson(_)));
    }

    #[test]
    fn full_schema_is_mapped() {
        let response = r#"{
            "es_recibo_valido": true,
            "imagen_legible": true,
            "medio_pago": "Plin",
            "banco": "Interbank",
            "nombre_pagador": "Ana Torres",
            "nombre_receptor": null,
            "monto": "S/ 80,00",
            "moneda": "pen",
            "fecha": "2024-05-06",
            "hora": "9:41",
            "codigo_operacion": 55667788,
            "ultimos_4_digitos": "null",
            "celular_emisor": "987654321"
        }"#;
        let parsed = parse_vision_response(response).unwrap();
        let f = parsed.fields;
        assert_eq!(f.payment_method.as_deref(), Some("Plin"));
        assert_eq!(f.bank.as_deref(), Some("Interbank"));
        assert_eq!(f.payer_name.as_deref(), Some("Ana Torres"));
        assert!(f.receiver_name.is_none());
        assert_eq!(f.amount, Some(80.0));
        assert_eq!(f.currency.as_deref(), Some("PEN"));
        assert_eq!(f.date.as_deref(), Some("2024-05-06"));
        assert_eq!(f.time.as_deref(), Some("09:41:00"));
        assert_eq!(f.operation_code.as_deref(), Some("55667788"));
        assert!(f.last_digits.is_none());
        assert_eq!(f.phone.as_deref(), Some("987654321"));
    }

    #[test]
    fn placeholder_dates_are_dropped() {
        let parsed = parse_vision_response(r#"{"fecha": "YYYY-MM-DD", "hora": "HH:MM:SS"}"#).unwrap();
        assert!(parsed.fields.date.is_none());
        assert!(parsed.fields.time.is_none());
    }

    #[test]
    fn zero_amount_is_absent() {
        let parsed = parse_vision_response(r#"{"monto": 0.00}"#).unwrap();
        assert!(parsed.fields.amount.is_none());
        assert!(parsed.fields.currency.is_none());
    }

    #[test]
    fn string_booleans_are_accepted() {
        let parsed =
            parse_vision_response(r#"{"es_recibo_valido": "true", "imagen_legible": "no"}"#).unwrap();
        assert!(parsed.is_valid_receipt);
        assert!(!parsed.is_legible);
    }
}

use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Maximum characters of raw text carried on a result.
pub const RAW_TEXT_MAX_CHARS: usize = 500;

/// Tesseract page segmentation modes used by the recognition driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSegMode {
    /// `--psm 3`: fully automatic page segmentation.
    Auto,
    /// `--psm 6`: assume a single uniform block of text.
    UniformBlock,
}

impl PageSegMode {
    pub fn as_arg(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::UniformBlock => "6",
        }
    }
}

/// Text produced by one recognition pass, with the settings that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    pub text: String,
    pub lang: &'static str,
    pub psm: PageSegMode,
}

/// OCR engine abstraction (allows mocking in tests).
pub trait OcrEngine {
    /// Recognize text in an encoded (PNG) image.
    fn recognize(
        &self,
        image_bytes: &[u8],
        lang: &str,
        psm: PageSegMode,
    ) -> Result<String, ExtractionError>;

    /// Whether the engine can run at all on this host.
    fn is_available(&self) -> bool {
        true
    }
}

/// Deterministic confidence grade of a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConfidenceTier {
    None,
    Low,
    Medium,
    High,
    VisionFallback,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::None => "none",
            ConfidenceTier::Low => "low",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::High => "high",
            ConfidenceTier::VisionFallback => "vision-fallback",
        }
    }
}

/// Which path produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    Ocr,
    VisionFallback,
    Failed,
}

/// Payment fields found on a receipt. Every field is independently optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldSet {
    pub bank: Option<String>,
    #[serde(rename = "medio_pago")]
    pub payment_method: Option<String>,
    #[serde(rename = "monto")]
    pub amount: Option<f64>,
    #[serde(rename = "moneda")]
    pub currency: Option<String>,
    #[serde(rename = "codigo_operacion")]
    pub operation_code: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(rename = "fecha")]
    pub date: Option<String>,
    /// `HH:MM:SS`
    #[serde(rename = "hora")]
    pub time: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    #[serde(rename = "ultimos_digitos")]
    pub last_digits: Option<String>,
    #[serde(rename = "nombre_pagador")]
    pub payer_name: Option<String>,
    #[serde(rename = "nombre_receptor")]
    pub receiver_name: Option<String>,
}

/// Final record returned for one receipt image. Built once, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionResult {
    pub confidence: ConfidenceTier,
    pub extraction_method: ExtractionMethod,
    #[serde(flatten)]
    pub fields: FieldSet,
    #[serde(rename = "es_recibo_valido")]
    pub is_valid_receipt: bool,
    #[serde(rename = "imagen_legible")]
    pub is_legible: bool,
    pub raw_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    /// Record for a request the pipeline could not process.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            confidence: ConfidenceTier::None,
            extraction_method: ExtractionMethod::Failed,
            fields: FieldSet::default(),
            is_valid_receipt: false,
            is_legible: false,
            raw_text: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn has_amount(&self) -> bool {
        self.fields.amount.is_some()
    }
}

/// Truncate to at most `RAW_TEXT_MAX_CHARS` characters (not bytes).
pub fn truncate_raw_text(text: &str) -> String {
    match text.char_indices().nth(RAW_TEXT_MAX_CHARS) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(ConfidenceTier::VisionFallback).unwrap(),
            "vision-fallback"
        );
        assert_eq!(serde_json::to_value(ConfidenceTier::High).unwrap(), "high");
        assert_eq!(ConfidenceTier::Medium.as_str(), "medium");
    }

    #[test]
    fn result_serializes_as_flat_record() {
        let result = ExtractionResult {
            confidence: ConfidenceTier::High,
            extraction_method: ExtractionMethod::Ocr,
            fields: FieldSet {
                bank: Some("Yape".into()),
                payment_method: Some("Yape".into()),
                amount: Some(50.0),
                currency: Some("PEN".into()),
                ..Default::default()
            },
            is_valid_receipt: true,
            is_legible: true,
            raw_text: "Yape S/ 50.00".into(),
            error: None,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["confidence"], "high");
        assert_eq!(json["extraction_method"], "ocr");
        assert_eq!(json["bank"], "Yape");
        assert_eq!(json["medio_pago"], "Yape");
        assert_eq!(json["monto"], 50.0);
        assert_eq!(json["moneda"], "PEN");
        assert!(json["codigo_operacion"].is_null());
        assert_eq!(json["es_recibo_valido"], true);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failed_record_carries_error() {
        let result = ExtractionResult::failed("decode error");
        assert_eq!(result.confidence, ConfidenceTier::None);
        assert_eq!(result.extraction_method, ExtractionMethod::Failed);
        assert!(!result.is_valid_receipt);
        assert!(!result.has_amount());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"], "decode error");
        assert_eq!(json["extraction_method"], "failed");
    }

    #[test]
    fn truncation_counts_characters() {
        let long = "ñ".repeat(RAW_TEXT_MAX_CHARS + 20);
        let truncated = truncate_raw_text(&long);
        assert_eq!(truncated.chars().count(), RAW_TEXT_MAX_CHARS);
        assert_eq!(truncate_raw_text("short"), "short");
    }

    #[test]
    fn psm_args() {
        assert_eq!(PageSegMode::UniformBlock.as_arg(), "6");
        assert_eq!(PageSegMode::Auto.as_arg(), "3");
    }
}

//! Deterministic confidence grading of textual extraction results.

use super::fields::extract_fields;
use super::types::{
    truncate_raw_text, ConfidenceTier, ExtractionMethod, ExtractionResult, FieldSet,
};

/// Trimmed text longer than this is considered legible.
pub const LEGIBLE_MIN_CHARS: usize = 30;

/// Below this, OCR output is almost certainly noise.
pub const VERY_SHORT_TEXT_CHARS: usize = 10;

/// Tier from field presence alone.
///
/// | bank | amount | operation | tier   |
/// |------|--------|-----------|--------|
/// | yes  | yes    | yes       | high   |
/// | yes  | yes    | no        | medium |
/// | any  | yes    | any       | low    |
/// | -    | no     | -         | none   |
pub fn classify_tier(has_bank: bool, has_amount: bool, has_operation: bool) -> ConfidenceTier {
    match (has_bank, has_amount, has_operation) {
        (true, true, true) => ConfidenceTier::High,
        (true, true, false) => ConfidenceTier::Medium,
        (_, true, _) => ConfidenceTier::Low,
        _ => ConfidenceTier::None,
    }
}

pub fn is_valid_tier(tier: ConfidenceTier) -> bool {
    matches!(tier, ConfidenceTier::High | ConfidenceTier::Medium)
}

pub fn is_legible(text: &str) -> bool {
    text.trim().chars().count() > LEGIBLE_MIN_CHARS
}

/// Grade a set of extracted fields.
pub fn classify_fields(fields: &FieldSet) -> ConfidenceTier {
    classify_tier(
        fields.bank.is_some(),
        fields.amount.is_some(),
        fields.operation_code.is_some(),
    )
}

/// Extract fields from recognized text and build the textual result.
pub fn classify_text(text: &str) -> ExtractionResult {
    let trimmed_len = text.trim().chars().count();
    if trimmed_len < VERY_SHORT_TEXT_CHARS {
        tracing::warn!(chars = trimmed_len, "OCR produced very little text");
    }

    let fields = extract_fields(text);
    let tier = classify_fields(&fields);

    tracing::info!(
        bank = fields.bank.as_deref().unwrap_or("-"),
        amount = ?fields.amount,
        operation = fields.operation_code.as_deref().unwrap_or("-"),
        confidence = tier.as_str(),
        "OCR classification"
    );

    ExtractionResult {
        confidence: tier,
        extraction_method: ExtractionMethod::Ocr,
        is_valid_receipt: is_valid_tier(tier),
        is_legible: is_legible(text),
        raw_text: truncate_raw_text(text),
        fields,
        error: None,
    }
}

//! Text recognition: the Tesseract CLI engine and the two-pass driver.

use std::io::Write;
use std::process::Command;
use std::sync::Mutex;

use super::types::{OcrEngine, PageSegMode, RecognizedText};
use super::ExtractionError;

/// First pass: Spanish, single uniform block. Suits app screenshots.
pub const PRIMARY_LANG: &str = "spa";
/// Second pass: Spanish + English, automatic segmentation. Suits photos of printed vouchers.
pub const FALLBACK_LANG: &str = "spa+eng";

/// A first pass shorter than this (trimmed, in characters) triggers the second pass.
pub const MIN_PRIMARY_CHARS: usize = 20;

/// Run recognition with the two-pass strategy.
///
/// Only the last executed pass is returned; the two outputs are never merged.
pub fn recognize_text(
    engine: &dyn OcrEngine,
    image_bytes: &[u8],
) -> Result<RecognizedText, ExtractionError> {
    let text = engine.recognize(image_bytes, PRIMARY_LANG, PageSegMode::UniformBlock)?;
    let primary_len = text.trim().chars().count();
    if primary_len >= MIN_PRIMARY_CHARS {
        return Ok(RecognizedText {
            text,
            lang: PRIMARY_LANG,
            psm: PageSegMode::UniformBlock,
        });
    }

    tracing::debug!(primary_len, "Short OCR output, retrying with automatic segmentation");
    let text = engine.recognize(image_bytes, FALLBACK_LANG, PageSegMode::Auto)?;
    Ok(RecognizedText {
        text,
        lang: FALLBACK_LANG,
        psm: PageSegMode::Auto,
    })
}

// ═══════════════════════════════════════════════════════════
// Tesseract CLI engine
// ═══════════════════════════════════════════════════════════

/// Shells out to the `tesseract` binary. Language data is resolved by
/// Tesseract itself (`TESSDATA_PREFIX` is honoured when set).
pub struct TesseractCli {
    command: String,
}

impl TesseractCli {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(
        &self,
        image_bytes: &[u8],
        lang: &str,
        psm: PageSegMode,
    ) -> Result<String, ExtractionError> {
        let mut input = tempfile::Builder::new()
            .prefix("voucher-ocr-")
            .suffix(".png")
            .tempfile()?;
        input.write_all(image_bytes)?;
        input.flush()?;

        let output = Command::new(&self.command)
            .arg(input.path())
            .arg("stdout")
            .args(["-l", lang, "--psm", psm.as_arg()])
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExtractionError::OcrUnavailable(format!("'{}' not found", self.command))
                } else {
                    ExtractionError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::OcrProcessing(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

// ═══════════════════════════════════════════════════════════
// Mock engine
// ═══════════════════════════════════════════════════════════

/// Mock OCR engine for testing. Returns scripted texts in order; the last
/// one repeats once the script is exhausted. Records every `(lang, psm)` call.
pub struct MockOcrEngine {
    texts: Vec<String>,
    calls: Mutex<Vec<(String, PageSegMode)>>,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self::with_passes(&[text])
    }

    pub fn with_passes(texts: &[&str]) -> Self {
        Self {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, PageSegMode)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(
        &self,
        _image_bytes: &[u8],
        lang: &str,
        psm: PageSegMode,
    ) -> Result<String, ExtractionError> {
        let mut calls = self
            .calls
            .lock()
            .map_err(|_| ExtractionError::OcrProcessing("mock lock poisoned".into()))?;
        let idx = calls.len().min(self.texts.len().saturating_sub(1));
        calls.push((lang.to_string(), psm));
        Ok(self.texts.get(idx).cloned().unwrap_or_default())
    }
}

/// Engine that always fails, for error propagation tests.
pub struct FailingOcrEngine;

impl OcrEngine for FailingOcrEngine {
    fn recognize(
        &self,
        _image_bytes: &[u8],
        _lang: &str,
        _psm: PageSegMode,
    ) -> Result<String, ExtractionError> {
        Err(ExtractionError::OcrProcessing("engine crashed".into()))
    }

    fn is_available(&self) -> bool {
        false
    }
}

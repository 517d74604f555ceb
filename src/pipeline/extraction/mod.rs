pub mod types;
pub mod preprocess;
pub mod ocr;
pub mod fields;
pub mod confidence;
pub mod orchestrator;

pub use types::*;
pub use preprocess::*;
pub use ocr::*;
pub use confidence::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),
}

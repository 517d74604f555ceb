pub mod ollama_types;
pub mod ollama;
pub mod prompt;
pub mod parser;
pub mod fallback;

pub use ollama_types::*;
pub use ollama::*;
pub use prompt::*;
pub use parser::*;
pub use fallback::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Ollama is not running at {0}")]
    OllamaConnection(String),

    #[error("Ollama returned error (status {status}): {body}")]
    OllamaError { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("No JSON object in model response")]
    NoJsonFound,

    #[error("Malformed JSON in model response: {0}")]
    MalformedJson(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

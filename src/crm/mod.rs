//! WispHub CRM client: customer lookup, pending debt, payment registration.

pub mod retry;
pub mod types;
pub mod transport;
pub mod client;

pub use retry::*;
pub use types::*;
pub use transport::*;
pub use client::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrmError {
    #[error("WispHub is not reachable at {0}")]
    Connection(String),

    #[error("WispHub request timed out")]
    Timeout,

    #[error("WispHub returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

//! HTTP surface of the voucher service.
//!
//! `GET /health`, `POST /analyze` (multipart upload) and
//! `POST /analyze/base64` (JSON body). Every analysis runs the extraction
//! pipeline on a blocking worker and answers with the flat result record.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::service_router;
pub use server::{start_server, ServiceServer};
pub use types::ApiContext;

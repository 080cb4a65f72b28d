//! Pipeline stages.
//!
//! A [`StageHandler`] runs one invocation end to end: it resolves the
//! request, fetches the source image, applies its transform, and delivers
//! the result either to the store or inline. Every invocation yields a
//! [`StageResult`](crate::types::StageResult), including failed ones.
//! [`IngestHandler`] is the entry point that places new images where the
//! chain starts.

mod handler;
mod ingest;
pub mod kind;

pub use handler::StageHandler;
pub use ingest::{ingest_key, IngestHandler};
pub use kind::StageKind;

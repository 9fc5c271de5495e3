//! # KBO Load - Streaming Bulk CSV Loader
//!
//! This crate ingests the BCE/KBO CSV export into Postgres as fast as the
//! network and storage allow: a single reader thread owns the CSV decoder
//! and chunks rows onto a bounded channel, a pool of writer workers each
//! hold a dedicated driver connection and stream chunks into the store via
//! `COPY FROM STDIN`, and an orchestrator wires the two together per file.
//!
//! ## Pipeline
//!
//! `file -> Chunker -> bounded channel -> Worker Pool -> Bulk-Load Driver -> store`
//!
//! Backpressure is intentional: the Chunker blocks on channel send once the
//! pool is saturated, which caps memory regardless of file size.

pub mod chunker;
pub mod driver;
pub mod orchestrator;
pub mod pool;

pub use chunker::{Chunker, RowChunk};
pub use driver::BulkLoadDriver;
pub use orchestrator::LoaderOrchestrator;
pub use pool::WorkerPool;

/// Rows per `COPY` chunk handed from the Chunker to a worker.
pub const INGEST_CHUNK: usize = 200_000;

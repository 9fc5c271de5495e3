//! # KBO Core - Shared Types and Guards
//!
//! This crate provides the foundational types, error taxonomy, and identifier
//! validation used throughout the KBO ingestion and enrichment pipeline. It
//! mirrors the role a `core` crate plays in a multi-crate pipeline workspace:
//! nothing here talks to Postgres, Redis, or the filesystem directly, but
//! every other crate in the workspace depends on it.
//!
//! ## Key Components
//!
//! - **Error taxonomy**: [`KboError`], the single typed error enum every
//!   other crate returns from fallible operations.
//! - **Identifier Guard**: [`identifier`], the allow-list and regex check
//!   that every dynamic SQL identifier must pass through before it is
//!   formatted into a query string.
//! - **Domain model**: [`model`], the row-ish types shared between the load
//!   and query sides (`EnterpriseId`, `HydratedCompany`, pagination `Meta`).
//! - **Configuration**: [`config`], environment-variable based config with
//!   fail-fast startup validation.

pub mod config;
pub mod error;
pub mod identifier;
pub mod model;

pub use error::KboError;
pub use model::{EnterpriseId, HydratedCompany};

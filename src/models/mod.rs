//! Core data models for the upload ingestion service.
//!
//! `FileRecord` maps to the `files` table via `sqlx::FromRow` and serializes
//! as the JSON returned by the retrieval endpoint.

pub mod file;
pub mod upload;

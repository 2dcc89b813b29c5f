//! Ingestion pipeline stages and the service that orchestrates them.

pub mod blob_store;
pub mod classifier;
pub mod file_repository;
pub mod ingest_service;
pub mod path_allocator;

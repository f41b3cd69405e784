//! Request and Response models for the pool server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::PutItemRequest;
pub use responses::{
    ClearResponse, CommitResponse, DeleteResponse, ErrorResponse, HealthResponse, ItemResponse,
    SaveResponse, StatsResponse,
};

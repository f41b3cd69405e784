//! API Module
//!
//! HTTP handlers and routing exposing a cache pool over REST.
//!
//! # Endpoints
//! - `GET /items/:key` - Resolve an item
//! - `PUT /items/:key` - Save or defer an item
//! - `DELETE /items/:key` - Delete an item
//! - `DELETE /items` - Clear the pool
//! - `POST /commit` - Commit deferred items
//! - `GET /stats` - Pool statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

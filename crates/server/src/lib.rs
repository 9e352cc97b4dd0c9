//! Cocktails Server - HTTP REST API for the cocktail catalogue
//!
//! This crate exposes the `cocktails` item service and media store over
//! HTTP. It supports:
//!
//! - **Listing**: Paginated listing with `$in`-style field filters
//! - **Search**: Relevance-ranked text search over cocktail names
//! - **Editing**: Create, partially update, and delete cocktails
//! - **Images**: Upload, overwrite, and delete images on the media host
//! - **Health & Metrics**: Liveness/readiness probes and Prometheus-compatible metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics
//! - `GET /metadata` - Server version and uptime
//! - `GET /api/get-items` - List cocktails
//! - `GET /api/search` - Search cocktails
//! - `POST /api/add` - Create a cocktail
//! - `PUT /api/edit` - Update a cocktail
//! - `DELETE /api/delete` - Delete a cocktail
//! - `POST /api/upload-image` - Upload an image
//! - `POST /api/edit-image` - Overwrite an image
//! - `DELETE /api/delete-image` - Delete an image

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;

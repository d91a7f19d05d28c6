//! Version 1 of the HTTP API.

pub mod routes;

pub use routes::{paths, v1_router, V1_PREFIX};

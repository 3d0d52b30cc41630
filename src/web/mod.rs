//! HTTP surface: routes under `/api/v1/contas` plus a health probe.

pub mod server;
pub mod types;

pub use server::{AppState, router, start_server};

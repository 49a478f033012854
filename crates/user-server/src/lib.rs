//! User Server
//!
//! HTTP service exposing CRUD operations on users, backed by a single
//! `users` table in PostgreSQL (or SQLite for local runs).

pub mod config;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod storage;

use std::sync::Arc;
use storage::UserStore;

pub use routes::router;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

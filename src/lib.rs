//! # Zettelkit
//!
//! A collaborative workspace server, usable both as a standalone binary and
//! as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! zettelkit = "0.1"
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::PathBuf;
//! use zettelkit::auth::PasswordService;
//! use zettelkit::config::ServerConfig;
//! use zettelkit::server::{AppState, bootstrap, create_router};
//! use zettelkit::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let passwords = PasswordService::new();
//! bootstrap(&store, &passwords).unwrap();
//!
//! let state = Arc::new(AppState {
//!     store: Arc::new(store),
//!     config,
//!     passwords,
//! });
//! let router = create_router(state);
//! // Serve with axum...
//! ```

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;

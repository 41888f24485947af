//! Synchronous client core for the TripShare photo-sharing service.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). The host implements
//! `Transport` for the actual round trip and `Shell` for navigation and
//! messages; the core owns configuration, session persistence and the
//! login/logout facade.
//!
//! # Design
//! - `TripShareClient` is stateless: it holds only `base_url`. Authorized
//!   builders take the `Session` explicitly.
//! - `Api` binds a client, a transport and a session and runs one
//!   build/execute/parse round trip per call.
//! - Server records (groups, photos, users) are opaque `serde_json::Value`s.
//! - `App` owns the live session and is the only place errors become
//!   user-visible text.

pub mod api;
pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod storage;
pub mod types;

pub use api::Api;
pub use app::{App, Page, Shell};
pub use client::TripShareClient;
pub use config::{Config, RuntimeEnv, DEFAULT_API_BASE_URL};
pub use error::{ApiError, ConfigError, ErrorKind, StorageError, TransportError};
pub use http::{HttpBody, HttpMethod, HttpRequest, HttpResponse, MultipartForm, PartContent, Transport};
pub use session::SessionStore;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::{DayCount, LoginForm, LoginResponse, PhotoFile, Session, SignupForm};

//! Core library for the CBT portal client.
//!
//! - [`auth`]: the injectable [`SessionStore`] and its durable storage backends
//! - [`api`]: the authenticated [`ApiClient`] with transparent token refresh,
//!   the auth service and typed CRUD resources
//! - [`guard`]: declarative role-based route guarding
//! - [`models`]: request/response types shared with the backend
//! - [`config`]: configuration file and environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;

pub use api::{ApiClient, ApiError, AuthService};
pub use auth::{Session, SessionStore};
pub use config::Config;
pub use guard::{GuardDecision, RouteGuard};

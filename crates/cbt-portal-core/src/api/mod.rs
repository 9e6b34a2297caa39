//! REST API client module for the CBT portal backend.
//!
//! `ApiClient` attaches bearer credentials from the shared `SessionStore`
//! and transparently refreshes an expired access token once per call.
//! `AuthService` and the typed `Resource` collections sit on top of it.

mod client;
mod refresh;
pub mod auth;
pub mod error;
pub mod resources;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::AuthService;
pub use client::ApiClient;
pub use error::ApiError;
pub use resources::{Courses, Departments, Programs, Resource, Users};
pub use transport::{ApiResponse, PendingRequest, ReqwestTransport, Transport};

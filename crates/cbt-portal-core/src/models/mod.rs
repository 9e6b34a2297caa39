//! Data models exchanged with the CBT portal backend.
//!
//! - `User`, `Role`, `UserUpdate`: identity and profile
//! - Auth payloads: `LoginRequest`, `LoginResponse`, `TokenPair`, ...
//! - Academic resources: `Course`, `Department`, `Program` and the `Page` envelope

pub mod academic;
pub mod auth;
pub mod user;

pub use academic::{
    Course, CourseEnrollment, CourseInput, CourseStats, CourseUpdate, Department,
    DepartmentInput, DepartmentStats, DepartmentUpdate, EnrollmentRequest, ListParams, Page,
    Program, ProgramEnrollmentRequest, ProgramInput, ProgramStats, ProgramUpdate,
    UserEnrollment,
};
pub use auth::{
    ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse, RefreshRequest,
    RegisterRequest, TokenPair,
};
pub use user::{Role, User, UserUpdate};

use serde::{Deserialize, Deserializer};

/// Treat an explicit JSON `null` the same as a missing key.
///
/// Used on non-optional record fields; the backend sends `null` for unset
/// columns (`matric_number` for staff, `last_login` before first login).
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

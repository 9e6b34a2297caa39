//! Portal user identity and role.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Portal role. Determines which dashboard a user may enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Lecturer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Lecturer => "lecturer",
            Role::Admin => "admin",
        }
    }

    /// Landing dashboard for this role
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Student => "/dashboard/student",
            Role::Lecturer => "/dashboard/lecturer",
            Role::Admin => "/dashboard/admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity record returned by login/register and `/users/me`.
///
/// Every field has a default so that partial records from older
/// backends (or persisted sessions) still deserialize. An explicit `null`
/// reads as the default too.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(default)]
pub struct User {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub middle_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub full_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub matric_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub phone_number: String,
    pub role: Role,
    #[serde(deserialize_with = "null_as_default")]
    pub program_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub program_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub department_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub department_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub level: String,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_verified: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub updated_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub last_login: String,
    #[serde(deserialize_with = "null_as_default")]
    pub enrolled_courses_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub completed_assessments_count: u32,
}

impl User {
    /// Name for display: the backend's `full_name` when present, else first + last.
    pub fn display_name(&self) -> String {
        if !self.full_name.trim().is_empty() {
            return self.full_name.clone();
        }
        let joined = format!("{} {}", self.first_name, self.last_name);
        let joined = joined.trim();
        if joined.is_empty() {
            self.email.clone()
        } else {
            joined.to_string()
        }
    }
}

/// Partial profile update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matric_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl UserUpdate {
    /// Merge the present fields into `user`.
    pub fn apply_to(&self, user: &mut User) {
        fn merge(target: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                target.clone_from(v);
            }
        }

        merge(&mut user.first_name, &self.first_name);
        merge(&mut user.last_name, &self.last_name);
        merge(&mut user.middle_name, &self.middle_name);
        merge(&mut user.phone_number, &self.phone_number);
        merge(&mut user.department_id, &self.department_id);
        merge(&mut user.level, &self.level);
        merge(&mut user.matric_number, &self.matric_number);
        if self.profile_picture.is_some() {
            user.profile_picture.clone_from(&self.profile_picture);
        }
        if self.bio.is_some() {
            user.bio.clone_from(&self.bio);
        }
    }
}

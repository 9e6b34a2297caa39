//! Courses, departments, programs and the paginated list envelope.
//!
//! Records are `#[serde(default)]` throughout; list views only need a
//! handful of fields and the backend omits the rest on some routes.

use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Paginated list envelope. The backend names the item array after the
/// resource (`courses`, `departments`, ...) or `data` for users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(
        default = "Vec::new",
        alias = "courses",
        alias = "departments",
        alias = "programs",
        alias = "users",
        alias = "data"
    )]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub pages: u64,
}

/// Query parameters accepted by the list endpoints.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub department_id: Option<String>,
    pub role: Option<String>,
    pub active_only: Option<bool>,
    pub available_only: Option<bool>,
}

impl ListParams {
    pub fn page(skip: u64, limit: u64) -> Self {
        Self {
            skip: Some(skip),
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                query.push((key.to_string(), v));
            }
        };
        push("skip", self.skip.map(|v| v.to_string()));
        push("limit", self.limit.map(|v| v.to_string()));
        push("search", self.search.clone());
        push("department_id", self.department_id.clone());
        push("role", self.role.clone());
        push("active_only", self.active_only.map(|v| v.to_string()));
        push("available_only", self.available_only.map(|v| v.to_string()));
        query
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Course {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub department_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub program_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub credits: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub level: String,
    #[serde(deserialize_with = "null_as_default")]
    pub semester: String,
    #[serde(deserialize_with = "null_as_default")]
    pub course_coordinator_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub prerequisites: String,
    #[serde(deserialize_with = "null_as_default")]
    pub course_outline: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_available: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub department_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub program_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub coordinator_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub total_enrolled_students: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub total_assessments: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseInput {
    pub name: String,
    pub code: String,
    pub description: String,
    pub department_id: String,
    pub program_id: String,
    pub credits: u32,
    pub level: String,
    pub semester: String,
    pub course_coordinator_id: String,
    pub prerequisites: String,
    pub course_outline: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_coordinator_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentRequest {
    pub course_id: String,
    pub semester_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CourseEnrollment {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub student_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub course_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub semester_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub enrollment_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub course_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub semester_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CourseStats {
    #[serde(deserialize_with = "null_as_default")]
    pub total_courses: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub active_courses: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub available_courses: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_enrollments: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_assessments: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Department {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub hod_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub hod_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub total_programs: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub total_courses: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub students_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub lecturers_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DepartmentStats {
    #[serde(deserialize_with = "null_as_default")]
    pub total_departments: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub active_departments: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_courses: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_students: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_lecturers: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepartmentInput {
    pub name: String,
    pub code: String,
    pub description: String,
    pub hod_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepartmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hod_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Program {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub department_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub department_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub duration_years: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub level: String,
    #[serde(deserialize_with = "null_as_default")]
    pub total_credits: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub program_coordinator_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub coordinator_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_accepting_enrollments: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub total_enrolled_students: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub total_courses: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProgramStats {
    #[serde(deserialize_with = "null_as_default")]
    pub total_programs: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub active_programs: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub accepting_enrollments: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_enrollments: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_courses: u64,
}

/// Admission of a student into a program
#[derive(Debug, Clone, Serialize)]
pub struct ProgramEnrollmentRequest {
    pub user_id: String,
    pub admission_number: String,
}

/// A course enrollment as listed under `/users/{id}/enrollments`, with
/// results once they are published.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserEnrollment {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub course_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub course_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub course_code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub semester_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub semester_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub enrollment_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_active: bool,
    pub final_grade: Option<String>,
    pub final_score: Option<f64>,
    pub gpa_points: Option<f64>,
    pub attendance_percentage: Option<f64>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramInput {
    pub name: String,
    pub code: String,
    pub description: String,
    pub department_id: String,
    pub duration_years: u32,
    pub level: String,
    pub total_credits: u32,
    pub program_coordinator_id: String,
    pub admission_requirements: String,
    pub program_outline: String,
    pub career_prospects: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_coordinator_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_accepting_enrollments: Option<bool>,
}

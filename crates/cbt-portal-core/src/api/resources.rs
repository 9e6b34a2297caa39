//! Typed CRUD access to the portal's collections.

use std::marker::PhantomData;

use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::{ApiClient, ApiError};
use crate::models::{
    Course, CourseEnrollment, CourseInput, CourseStats, CourseUpdate, Department,
    DepartmentInput, DepartmentStats, DepartmentUpdate, EnrollmentRequest, ListParams,
    MessageResponse, Page, Program, ProgramEnrollmentRequest, ProgramInput, ProgramStats,
    ProgramUpdate, RegisterRequest, User, UserEnrollment, UserUpdate,
};

/// A REST collection: list/get/create/update/delete of `T`, created from
/// `C` and updated from `U`.
pub struct Resource<T, C, U> {
    client: ApiClient,
    /// Collection path, as the backend routes it (with trailing slash where required)
    collection: &'static str,
    _types: PhantomData<fn() -> (T, C, U)>,
}

pub type Courses = Resource<Course, CourseInput, CourseUpdate>;
pub type Departments = Resource<Department, DepartmentInput, DepartmentUpdate>;
pub type Programs = Resource<Program, ProgramInput, ProgramUpdate>;
pub type Users = Resource<User, RegisterRequest, UserUpdate>;

impl<T, C, U> Resource<T, C, U>
where
    T: DeserializeOwned,
    C: Serialize,
    U: Serialize,
{
    pub fn new(client: ApiClient, collection: &'static str) -> Self {
        Self {
            client,
            collection,
            _types: PhantomData,
        }
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.collection.trim_end_matches('/'), id)
    }

    pub async fn list(&self, params: &ListParams) -> Result<Page<T>, ApiError> {
        self.client
            .get_with_query(self.collection, params.to_query())
            .await
    }

    pub async fn get(&self, id: &str) -> Result<T, ApiError> {
        self.client.get(&self.item_path(id)).await
    }

    pub async fn create(&self, input: &C) -> Result<T, ApiError> {
        self.client.post(self.collection, input).await
    }

    pub async fn update(&self, id: &str, changes: &U) -> Result<T, ApiError> {
        self.client.put(&self.item_path(id), changes).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&self.item_path(id)).await
    }
}

impl Courses {
    pub async fn enroll(
        &self,
        course_id: &str,
        semester_id: &str,
    ) -> Result<CourseEnrollment, ApiError> {
        let body = EnrollmentRequest {
            course_id: course_id.to_string(),
            semester_id: semester_id.to_string(),
        };
        self.client
            .post(&format!("{}/enroll", self.item_path(course_id)), &body)
            .await
    }

    pub async fn stats(&self) -> Result<CourseStats, ApiError> {
        self.client.get("/courses/stats/overview").await
    }

    /// Courses the current student is enrolled in
    pub async fn my_enrolled(&self, params: &ListParams) -> Result<Page<Course>, ApiError> {
        self.client
            .get_with_query("/courses/my/enrolled", params.to_query())
            .await
    }

    /// Courses the current lecturer coordinates
    pub async fn my_coordinated(&self, params: &ListParams) -> Result<Page<Course>, ApiError> {
        self.client
            .get_with_query("/courses/my/coordinated", params.to_query())
            .await
    }
}

impl Departments {
    pub async fn stats(&self) -> Result<DepartmentStats, ApiError> {
        self.client.get("/departments/stats/overview").await
    }
}

impl Programs {
    pub async fn by_department(&self, department_id: &str) -> Result<Vec<Program>, ApiError> {
        self.client
            .get(&format!("/programs/department/{}", department_id))
            .await
    }

    pub async fn stats(&self) -> Result<ProgramStats, ApiError> {
        self.client.get("/programs/stats").await
    }

    /// Students admitted into a program. Records are passed through as-is.
    pub async fn enrollments(
        &self,
        program_id: &str,
        params: &ListParams,
    ) -> Result<Vec<Value>, ApiError> {
        self.client
            .get_with_query(
                &format!("{}/enrollments", self.item_path(program_id)),
                params.to_query(),
            )
            .await
    }

    pub async fn enroll_student(
        &self,
        program_id: &str,
        user_id: &str,
        admission_number: &str,
    ) -> Result<Value, ApiError> {
        let body = ProgramEnrollmentRequest {
            user_id: user_id.to_string(),
            admission_number: admission_number.to_string(),
        };
        self.client
            .post(&format!("{}/enroll", self.item_path(program_id)), &body)
            .await
    }
}

impl Users {
    pub async fn enrollments(&self, id: &str) -> Result<Vec<UserEnrollment>, ApiError> {
        self.client
            .get(&format!("{}/enrollments", self.item_path(id)))
            .await
    }

    /// Aggregate user counts. The backend's shape varies, so it stays JSON.
    pub async fn stats(&self) -> Result<Value, ApiError> {
        self.client.get("/users/stats/overview").await
    }

    pub async fn activate(&self, id: &str) -> Result<MessageResponse, ApiError> {
        self.toggle(id, "activate").await
    }

    pub async fn deactivate(&self, id: &str) -> Result<MessageResponse, ApiError> {
        self.toggle(id, "deactivate").await
    }

    async fn toggle(&self, id: &str, action: &str) -> Result<MessageResponse, ApiError> {
        let path = format!("{}/{}", self.item_path(id), action);
        self.client.request(self.client.build(Method::POST, &path)).await
    }
}

impl ApiClient {
    pub fn courses(&self) -> Courses {
        Resource::new(self.clone(), "/courses/")
    }

    pub fn departments(&self) -> Departments {
        Resource::new(self.clone(), "/departments/")
    }

    pub fn programs(&self) -> Programs {
        Resource::new(self.clone(), "/programs/")
    }

    pub fn users(&self) -> Users {
        Resource::new(self.clone(), "/users")
    }
}

//! Student entity model.

use serde::{Deserialize, Serialize};

use examdist_core::types::id::{CourseId, StudentId};

/// A student enrolled in a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Student {
    /// Unique student identifier.
    pub id: StudentId,
    /// The course the student is enrolled in.
    pub course_id: CourseId,
    /// Display name.
    pub name: String,
    /// Student number, checked against requests.
    pub number: String,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
}

impl Student {
    /// Check if the student is enrolled in the given course.
    pub fn is_enrolled_in(&self, course_id: CourseId) -> bool {
        self.course_id == course_id
    }
}

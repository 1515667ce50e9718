//! Course entity model.

use serde::{Deserialize, Serialize};

use examdist_core::types::id::{CourseId, UserId};

/// A course owned by an instructor; students and exams belong to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Course {
    /// Unique course identifier.
    pub id: CourseId,
    /// The instructor account that owns the course and receives notifications.
    pub owner_id: UserId,
    /// Course name.
    pub name: String,
}

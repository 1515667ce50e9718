//! Validates a student's document request before anything is allocated.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use examdist_core::error::AppError;
use examdist_core::result::AppResult;
use examdist_core::types::id::{ExamId, StudentId};
use examdist_database::store::AllocationStore;
use examdist_entity::{Exam, Student};

/// A student's request for their exam documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    /// The requesting student.
    pub student_id: StudentId,
    /// The student number the student typed in.
    pub student_number: String,
    /// The exam code the student typed in.
    pub authentication_code: String,
    /// The exam being taken.
    pub exam_id: ExamId,
}

/// Checks credentials, enrollment, and the exam window.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    store: Arc<dyn AllocationStore>,
}

impl AccessGuard {
    /// Creates a guard reading from `store`.
    pub fn new(store: Arc<dyn AllocationStore>) -> Self {
        Self { store }
    }

    /// Verify a request at time `now`, returning the exam and student on success.
    pub async fn verify(
        &self,
        request: &AssignRequest,
        now: DateTime<Utc>,
    ) -> AppResult<(Exam, Student)> {
        let exam = self
            .store
            .find_exam(request.exam_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Exam {} not found", request.exam_id)))?;
        let student = self
            .store
            .find_student(request.student_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Student {} not found", request.student_id))
            })?;

        if exam.authentication_code != request.authentication_code {
            warn!(exam_id = %exam.id, student_id = %student.id, "Wrong exam authentication code");
            return Err(AppError::authentication("Authentication code does not match"));
        }
        if student.number != request.student_number {
            warn!(exam_id = %exam.id, student_id = %student.id, "Wrong student number");
            return Err(AppError::authentication("Student number does not match"));
        }

        if !student.is_enrolled_in(exam.course_id) {
            return Err(AppError::authorization(format!(
                "Student {} is not enrolled in the course of exam {}",
                student.id, exam.id
            )));
        }

        if !exam.is_open_at(now) {
            debug!(
                exam_id = %exam.id,
                start = %exam.start,
                end = %exam.ends_at(),
                %now,
                "Exam window closed"
            );
            return Err(AppError::authorization(format!("Exam {} is not open", exam.name)));
        }

        Ok((exam, student))
    }
}

//! Seed data: a JSON roster of courses, exams, questions, documents, and students.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use examdist_core::error::AppError;
use examdist_core::result::AppResult;
use examdist_entity::{AllocationRecord, Course, Document, Exam, Question, Student};

use crate::memory::MemoryAllocationStore;

/// A complete roster that can populate a [`MemoryAllocationStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    /// Courses.
    #[serde(default)]
    pub courses: Vec<Course>,
    /// Exams; each references a course.
    #[serde(default)]
    pub exams: Vec<Exam>,
    /// Questions; each references an exam.
    #[serde(default)]
    pub questions: Vec<Question>,
    /// Candidate documents; each references a question.
    #[serde(default)]
    pub documents: Vec<Document>,
    /// Students; each references a course.
    #[serde(default)]
    pub students: Vec<Student>,
    /// Allocation records issued before this roster was exported.
    #[serde(default)]
    pub allocations: Vec<AllocationRecord>,
}

impl SeedData {
    /// Parse seed data from a JSON string.
    pub fn from_json_str(json: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read seed data from a JSON file.
    pub async fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::with_source(
                examdist_core::ErrorKind::Storage,
                format!("Failed to read seed file '{}'", path.display()),
                e,
            )
        })?;
        Self::from_json_str(&json)
    }
}

impl MemoryAllocationStore {
    /// Build a store populated from seed data.
    ///
    /// Entities are inserted parents first, so a roster referencing an
    /// unknown parent is rejected with `NotFound`.
    pub async fn from_seed(seed: SeedData) -> AppResult<Self> {
        let store = Self::new();
        let counts = (
            seed.courses.len(),
            seed.exams.len(),
            seed.questions.len(),
            seed.documents.len(),
            seed.students.len(),
            seed.allocations.len(),
        );

        for course in seed.courses {
            store.insert_course(course).await;
        }
        for exam in seed.exams {
            store.insert_exam(exam).await?;
        }
        for question in seed.questions {
            store.insert_question(question).await?;
        }
        for document in seed.documents {
            store.insert_document(document).await?;
        }
        for student in seed.students {
            store.insert_student(student).await?;
        }
        for record in seed.allocations {
            store.insert_record(record).await;
        }

        info!(
            courses = counts.0,
            exams = counts.1,
            questions = counts.2,
            documents = counts.3,
            students = counts.4,
            allocations = counts.5,
            "Memory store seeded"
        );
        Ok(store)
    }
}

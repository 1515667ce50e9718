//! Notification payload.

use serde::{Deserialize, Serialize};

use examdist_core::types::id::ExamId;
use examdist_entity::{Course, Document, Exam, Student};

/// Sent to a course owner each time a student receives exam documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedMessage {
    /// Course name.
    pub course_name: String,
    /// Exam identifier.
    pub exam_id: ExamId,
    /// Exam name.
    pub exam_name: String,
    /// Student name.
    pub student_name: String,
    /// Comma-separated public file names of the delivered documents.
    pub document_names: String,
    /// How many times this student has received the exam's documents.
    pub num_downloads: u32,
}

impl AllocatedMessage {
    /// Build the message for one delivery.
    pub fn new(
        course: &Course,
        exam: &Exam,
        student: &Student,
        documents: &[Document],
        num_downloads: u32,
    ) -> Self {
        let document_names = documents
            .iter()
            .map(|d| d.public_file_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            course_name: course.name.clone(),
            exam_id: exam.id,
            exam_name: exam.name.clone(),
            student_name: student.name.clone(),
            document_names,
            num_downloads,
        }
    }
}

//! Allocation store trait.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use examdist_core::result::AppResult;
use examdist_core::types::id::{CourseId, DocumentId, ExamId, QuestionId, StudentId};
use examdist_entity::{AllocationRecord, Course, Document, Exam, Question, Student};

/// Everything the allocation core reads from and writes to persistent storage.
///
/// Implementations must be thread-safe. Only [`persist_allocations`] writes;
/// it must commit the whole batch or nothing.
///
/// [`persist_allocations`]: AllocationStore::persist_allocations
#[async_trait]
pub trait AllocationStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find an exam by ID.
    async fn find_exam(&self, exam_id: ExamId) -> AppResult<Option<Exam>>;

    /// Find a student by ID.
    async fn find_student(&self, student_id: StudentId) -> AppResult<Option<Student>>;

    /// Find a course by ID.
    async fn find_course(&self, course_id: CourseId) -> AppResult<Option<Course>>;

    /// Number of students enrolled in a course.
    async fn count_students_in_course(&self, course_id: CourseId) -> AppResult<u64>;

    /// Questions of an exam, in position order.
    async fn questions_for_exam(&self, exam_id: ExamId) -> AppResult<Vec<Question>>;

    /// Candidate documents of a question, in insertion order.
    async fn documents_for_question(&self, question_id: QuestionId) -> AppResult<Vec<Document>>;

    /// Existing records for a document, deduplicated by (student, document).
    async fn allocation_records_for_document(
        &self,
        document_id: DocumentId,
    ) -> AppResult<Vec<AllocationRecord>>;

    /// Every record against any document of the exam's questions.
    async fn allocation_records_for_exam(&self, exam_id: ExamId)
    -> AppResult<Vec<AllocationRecord>>;

    /// Whether the student already holds any document of the exam.
    async fn has_any_allocation(&self, student_id: StudentId, exam_id: ExamId) -> AppResult<bool>;

    /// Documents previously handed to the student for the exam, in question order.
    async fn existing_documents_for(
        &self,
        student_id: StudentId,
        exam_id: ExamId,
    ) -> AppResult<Vec<Document>>;

    /// Record that `documents` were handed to the student.
    ///
    /// All-or-nothing. Pairs the student already holds are not duplicated.
    async fn persist_allocations(
        &self,
        student_id: StudentId,
        ip_address: &str,
        downloaded_at: DateTime<Utc>,
        documents: &[Document],
    ) -> AppResult<()>;
}

/// Drop records that repeat an earlier (student, document) pair, keeping the first.
pub fn dedup_records(records: Vec<AllocationRecord>) -> Vec<AllocationRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert(record.key()))
        .collect()
}

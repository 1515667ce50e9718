//! PostgreSQL implementation of [`AllocationStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use examdist_core::error::{AppError, ErrorKind};
use examdist_core::result::AppResult;
use examdist_core::types::id::{
    AllocationRecordId, CourseId, DocumentId, ExamId, QuestionId, StudentId,
};
use examdist_entity::{AllocationRecord, Course, Document, Exam, Question, Student};

use crate::store::{AllocationStore, dedup_records};

const EXAM_COLUMNS: &str =
    "id, course_id, name, start, duration_minutes, authentication_code, is_limited_access";
const DOCUMENT_COLUMNS: &str = "d.id, d.question_id, d.public_file_name, d.url";
const RECORD_COLUMNS: &str = "r.id, r.student_id, r.document_id, r.ip_address, r.downloaded_at";

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Persistence, context, e)
}

/// Allocation store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgAllocationStore {
    pool: PgPool,
}

impl PgAllocationStore {
    /// Create a new store on an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AllocationStore for PgAllocationStore {
    async fn find_exam(&self, exam_id: ExamId) -> AppResult<Option<Exam>> {
        sqlx::query_as::<_, Exam>(&format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1"))
            .bind(exam_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find exam"))
    }

    async fn find_student(&self, student_id: StudentId) -> AppResult<Option<Student>> {
        sqlx::query_as::<_, Student>(
            "SELECT id, course_id, name, number, email FROM students WHERE id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to find student"))
    }

    async fn find_course(&self, course_id: CourseId) -> AppResult<Option<Course>> {
        sqlx::query_as::<_, Course>("SELECT id, owner_id, name FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find course"))
    }

    async fn count_students_in_course(&self, course_id: CourseId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students WHERE course_id = $1")
            .bind(course_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to count students"))?;
        Ok(count.max(0) as u64)
    }

    async fn questions_for_exam(&self, exam_id: ExamId) -> AppResult<Vec<Question>> {
        sqlx::query_as::<_, Question>(
            "SELECT id, exam_id, description, position FROM questions \
             WHERE exam_id = $1 ORDER BY position, id",
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list questions"))
    }

    async fn documents_for_question(&self, question_id: QuestionId) -> AppResult<Vec<Document>> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d \
             WHERE d.question_id = $1 ORDER BY d.created_seq"
        ))
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list documents"))
    }

    async fn allocation_records_for_document(
        &self,
        document_id: DocumentId,
    ) -> AppResult<Vec<AllocationRecord>> {
        let records = sqlx::query_as::<_, AllocationRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM allocation_records r \
             WHERE r.document_id = $1 ORDER BY r.downloaded_at"
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list allocation records"))?;
        Ok(dedup_records(records))
    }

    async fn allocation_records_for_exam(
        &self,
        exam_id: ExamId,
    ) -> AppResult<Vec<AllocationRecord>> {
        sqlx::query_as::<_, AllocationRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM allocation_records r \
             JOIN documents d ON d.id = r.document_id \
             JOIN questions q ON q.id = d.question_id \
             WHERE q.exam_id = $1 ORDER BY r.downloaded_at"
        ))
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list exam allocation records"))
    }

    async fn has_any_allocation(&self, student_id: StudentId, exam_id: ExamId) -> AppResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM allocation_records r \
             JOIN documents d ON d.id = r.document_id \
             JOIN questions q ON q.id = d.question_id \
             WHERE r.student_id = $1 AND q.exam_id = $2)",
        )
        .bind(student_id)
        .bind(exam_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("Failed to check existing allocation"))
    }

    async fn existing_documents_for(
        &self,
        student_id: StudentId,
        exam_id: ExamId,
    ) -> AppResult<Vec<Document>> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d \
             JOIN questions q ON q.id = d.question_id \
             JOIN allocation_records r ON r.document_id = d.id \
             WHERE r.student_id = $1 AND q.exam_id = $2 \
             ORDER BY q.position, q.id, d.created_seq"
        ))
        .bind(student_id)
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list existing documents"))
    }

    async fn persist_allocations(
        &self,
        student_id: StudentId,
        ip_address: &str,
        downloaded_at: DateTime<Utc>,
        documents: &[Document],
    ) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin allocation transaction"))?;

        let mut inserted = 0u64;
        for document in documents {
            let result = sqlx::query(
                "INSERT INTO allocation_records \
                 (id, student_id, document_id, ip_address, downloaded_at) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (student_id, document_id) DO NOTHING",
            )
            .bind(AllocationRecordId::new())
            .bind(student_id)
            .bind(document.id)
            .bind(ip_address)
            .bind(downloaded_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to insert allocation record"))?;
            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(db_err("Failed to commit allocation records"))?;

        debug!(student_id = %student_id, inserted, "Allocation records persisted");
        Ok(())
    }
}

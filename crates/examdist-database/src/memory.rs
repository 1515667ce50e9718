//! In-memory allocation store using a Tokio read-write lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use examdist_core::error::AppError;
use examdist_core::result::AppResult;
use examdist_core::types::id::{CourseId, DocumentId, ExamId, QuestionId, StudentId};
use examdist_entity::{AllocationRecord, Course, Document, Exam, Question, Student};

use crate::store::{AllocationStore, dedup_records};

/// Internal state for the memory store.
#[derive(Debug, Default)]
struct InnerState {
    courses: HashMap<CourseId, Course>,
    exams: HashMap<ExamId, Exam>,
    /// Kept in insertion order.
    questions: Vec<Question>,
    /// Kept in insertion order.
    documents: Vec<Document>,
    students: Vec<Student>,
    records: Vec<AllocationRecord>,
}

impl InnerState {
    fn questions_for_exam(&self, exam_id: ExamId) -> Vec<&Question> {
        let mut questions: Vec<&Question> = self
            .questions
            .iter()
            .filter(|q| q.exam_id == exam_id)
            .collect();
        questions.sort_by_key(|q| q.position);
        questions
    }

    fn documents_for_question(&self, question_id: QuestionId) -> impl Iterator<Item = &Document> {
        self.documents
            .iter()
            .filter(move |d| d.question_id == question_id)
    }

    fn exam_document_ids(&self, exam_id: ExamId) -> HashSet<DocumentId> {
        self.questions_for_exam(exam_id)
            .into_iter()
            .flat_map(|q| self.documents_for_question(q.id))
            .map(|d| d.id)
            .collect()
    }
}

/// In-memory allocation store.
///
/// Suitable for single-process deployments, the CLI simulator, and tests.
/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryAllocationStore {
    state: Arc<RwLock<InnerState>>,
}

impl MemoryAllocationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a course.
    pub async fn insert_course(&self, course: Course) {
        let mut state = self.state.write().await;
        state.courses.insert(course.id, course);
    }

    /// Adds an exam. The course must exist.
    pub async fn insert_exam(&self, exam: Exam) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.courses.contains_key(&exam.course_id) {
            return Err(AppError::not_found(format!(
                "Course {} not found for exam {}",
                exam.course_id, exam.id
            )));
        }
        state.exams.insert(exam.id, exam);
        Ok(())
    }

    /// Adds a question. The exam must exist.
    pub async fn insert_question(&self, question: Question) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.exams.contains_key(&question.exam_id) {
            return Err(AppError::not_found(format!(
                "Exam {} not found for question {}",
                question.exam_id, question.id
            )));
        }
        state.questions.push(question);
        Ok(())
    }

    /// Adds a candidate document. The question must exist.
    pub async fn insert_document(&self, document: Document) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.questions.iter().any(|q| q.id == document.question_id) {
            return Err(AppError::not_found(format!(
                "Question {} not found for document {}",
                document.question_id, document.id
            )));
        }
        state.documents.push(document);
        Ok(())
    }

    /// Enrolls a student. The course must exist.
    pub async fn insert_student(&self, student: Student) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.courses.contains_key(&student.course_id) {
            return Err(AppError::not_found(format!(
                "Course {} not found for student {}",
                student.course_id, student.id
            )));
        }
        state.students.push(student);
        Ok(())
    }

    /// Adds an existing allocation record verbatim (imports and fixtures).
    pub async fn insert_record(&self, record: AllocationRecord) {
        let mut state = self.state.write().await;
        state.records.push(record);
    }

    /// Total number of stored allocation records.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Students enrolled in a course, in enrollment order.
    pub async fn students_in_course(&self, course_id: CourseId) -> Vec<Student> {
        let state = self.state.read().await;
        state
            .students
            .iter()
            .filter(|s| s.course_id == course_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AllocationStore for MemoryAllocationStore {
    async fn find_exam(&self, exam_id: ExamId) -> AppResult<Option<Exam>> {
        Ok(self.state.read().await.exams.get(&exam_id).cloned())
    }

    async fn find_student(&self, student_id: StudentId) -> AppResult<Option<Student>> {
        let state = self.state.read().await;
        Ok(state.students.iter().find(|s| s.id == student_id).cloned())
    }

    async fn find_course(&self, course_id: CourseId) -> AppResult<Option<Course>> {
        Ok(self.state.read().await.courses.get(&course_id).cloned())
    }

    async fn count_students_in_course(&self, course_id: CourseId) -> AppResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .students
            .iter()
            .filter(|s| s.course_id == course_id)
            .count() as u64)
    }

    async fn questions_for_exam(&self, exam_id: ExamId) -> AppResult<Vec<Question>> {
        let state = self.state.read().await;
        Ok(state
            .questions_for_exam(exam_id)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn documents_for_question(&self, question_id: QuestionId) -> AppResult<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state.documents_for_question(question_id).cloned().collect())
    }

    async fn allocation_records_for_document(
        &self,
        document_id: DocumentId,
    ) -> AppResult<Vec<AllocationRecord>> {
        let state = self.state.read().await;
        let records = state
            .records
            .iter()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect();
        Ok(dedup_records(records))
    }

    async fn allocation_records_for_exam(
        &self,
        exam_id: ExamId,
    ) -> AppResult<Vec<AllocationRecord>> {
        let state = self.state.read().await;
        let documents = state.exam_document_ids(exam_id);
        Ok(state
            .records
            .iter()
            .filter(|r| documents.contains(&r.document_id))
            .cloned()
            .collect())
    }

    async fn has_any_allocation(&self, student_id: StudentId, exam_id: ExamId) -> AppResult<bool> {
        let state = self.state.read().await;
        let documents = state.exam_document_ids(exam_id);
        Ok(state
            .records
            .iter()
            .any(|r| r.student_id == student_id && documents.contains(&r.document_id)))
    }

    async fn existing_documents_for(
        &self,
        student_id: StudentId,
        exam_id: ExamId,
    ) -> AppResult<Vec<Document>> {
        let state = self.state.read().await;
        let held: HashSet<DocumentId> = state
            .records
            .iter()
            .filter(|r| r.student_id == student_id)
            .map(|r| r.document_id)
            .collect();

        Ok(state
            .questions_for_exam(exam_id)
            .into_iter()
            .flat_map(|q| state.documents_for_question(q.id))
            .filter(|d| held.contains(&d.id))
            .cloned()
            .collect())
    }

    async fn persist_allocations(
        &self,
        student_id: StudentId,
        ip_address: &str,
        downloaded_at: DateTime<Utc>,
        documents: &[Document],
    ) -> AppResult<()> {
        let mut state = self.state.write().await;

        if let Some(missing) = documents
            .iter()
            .find(|d| !state.documents.iter().any(|known| known.id == d.id))
        {
            return Err(AppError::persistence(format!(
                "Cannot allocate unknown document {}",
                missing.id
            )));
        }

        let held: HashSet<DocumentId> = state
            .records
            .iter()
            .filter(|r| r.student_id == student_id)
            .map(|r| r.document_id)
            .collect();

        let mut inserted = 0usize;
        for document in documents.iter().filter(|d| !held.contains(&d.id)) {
            state.records.push(AllocationRecord::new(
                student_id,
                document.id,
                ip_address,
                downloaded_at,
            ));
            inserted += 1;
        }

        debug!(
            student_id = %student_id,
            inserted,
            total_records = state.records.len(),
            "Allocation records persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examdist_core::types::id::UserId;

    struct Fixture {
        store: MemoryAllocationStore,
        exam: Exam,
        questions: Vec<Question>,
        documents: Vec<Document>,
        student: Student,
    }

    async fn fixture() -> Fixture {
        let store = MemoryAllocationStore::new();
        let course = Course {
            id: CourseId::new(),
            owner_id: UserId::new(),
            name: "Databases".to_string(),
        };
        store.insert_course(course.clone()).await;

        let exam = Exam {
            id: ExamId::new(),
            course_id: course.id,
            name: "Final".to_string(),
            start: Utc::now(),
            duration_minutes: 60,
            authentication_code: "XYZ".to_string(),
            is_limited_access: false,
        };
        store.insert_exam(exam.clone()).await.expect("exam");

        // Inserted out of position order on purpose.
        let mut questions = Vec::new();
        for (position, description) in [(2, "Q2"), (1, "Q1")] {
            let q = Question {
                id: QuestionId::new(),
                exam_id: exam.id,
                description: description.to_string(),
                position,
            };
            store.insert_question(q.clone()).await.expect("question");
            questions.push(q);
        }
        questions.sort_by_key(|q| q.position);

        let mut documents = Vec::new();
        for q in &questions {
            for n in 0..2 {
                let d = Document::new(q.id, format!("{}-{n}.pdf", q.description), "https://x/d");
                store.insert_document(d.clone()).await.expect("document");
                documents.push(d);
            }
        }

        let student = Student {
            id: StudentId::new(),
            course_id: course.id,
            name: "Ada".to_string(),
            number: "s001".to_string(),
            email: None,
        };
        store.insert_student(student.clone()).await.expect("student");

        Fixture {
            store,
            exam,
            questions,
            documents,
            student,
        }
    }

    #[tokio::test]
    async fn test_questions_come_back_in_position_order() {
        let f = fixture().await;
        let questions = f.store.questions_for_exam(f.exam.id).await.unwrap();
        let names: Vec<_> = questions.iter().map(|q| q.description.as_str()).collect();
        assert_eq!(names, vec!["Q1", "Q2"]);
        assert_eq!(questions, f.questions);
    }

    #[tokio::test]
    async fn test_persist_then_lookup_in_question_order() {
        let f = fixture().await;
        // Q2's document first, Q1's second.
        let picked = vec![f.documents[3].clone(), f.documents[0].clone()];

        assert!(!f.store.has_any_allocation(f.student.id, f.exam.id).await.unwrap());
        f.store
            .persist_allocations(f.student.id, "10.0.0.7", Utc::now(), &picked)
            .await
            .unwrap();

        assert!(f.store.has_any_allocation(f.student.id, f.exam.id).await.unwrap());
        let existing = f
            .store
            .existing_documents_for(f.student.id, f.exam.id)
            .await
            .unwrap();
        assert_eq!(existing, vec![f.documents[0].clone(), f.documents[3].clone()]);
    }

    #[tokio::test]
    async fn test_persist_is_idempotent_per_pair() {
        let f = fixture().await;
        let picked = vec![f.documents[1].clone()];
        for _ in 0..3 {
            f.store
                .persist_allocations(f.student.id, "10.0.0.7", Utc::now(), &picked)
                .await
                .unwrap();
        }
        assert_eq!(f.store.record_count().await, 1);
    }

    #[tokio::test]
    async fn test_persist_unknown_document_writes_nothing() {
        let f = fixture().await;
        let stranger = Document::new(f.questions[0].id, "ghost.pdf", "https://x/ghost");
        let err = f
            .store
            .persist_allocations(
                f.student.id,
                "10.0.0.7",
                Utc::now(),
                &[f.documents[0].clone(), stranger],
            )
            .await
            .expect_err("unknown document");

        assert_eq!(err.kind, examdist_core::ErrorKind::Persistence);
        assert_eq!(f.store.record_count().await, 0);
    }

    #[tokio::test]
    async fn test_records_for_document_are_deduplicated() {
        let f = fixture().await;
        let doc = &f.documents[2];
        f.store
            .insert_record(AllocationRecord::new(f.student.id, doc.id, "a", Utc::now()))
            .await;
        f.store
            .insert_record(AllocationRecord::new(f.student.id, doc.id, "b", Utc::now()))
            .await;

        let records = f.store.allocation_records_for_document(doc.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ip_address, "a");

        let for_exam = f.store.allocation_records_for_exam(f.exam.id).await.unwrap();
        assert_eq!(for_exam.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_document_requires_question() {
        let f = fixture().await;
        let orphan = Document::new(QuestionId::new(), "orphan.pdf", "https://x/o");
        let err = f.store.insert_document(orphan).await.expect_err("orphan");
        assert_eq!(err.kind, examdist_core::ErrorKind::NotFound);
        assert_eq!(
            f.store.count_students_in_course(f.exam.course_id).await.unwrap(),
            1
        );
    }
}

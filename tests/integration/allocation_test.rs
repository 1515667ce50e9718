//! Integration tests for single-request allocation behaviour.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use examdist_allocation::AllocationGate;
use examdist_core::config::{AllocationConfig, GateScope};
use examdist_core::error::{AppError, ErrorKind};
use examdist_core::result::AppResult;
use examdist_core::types::id::{CourseId, DocumentId, ExamId, QuestionId, StudentId};
use examdist_database::{AllocationStore, MemoryAllocationStore, SeedData};
use examdist_entity::{AllocationRecord, Course, Document, Exam, Question, Student};
use examdist_service::{AllocationService, AssignRequest};

use helpers::{DEMO_SEED, TestExam};

#[tokio::test]
async fn test_demo_roster_allocates_every_student() {
    let seed = SeedData::from_file(DEMO_SEED).await.expect("demo roster");
    let exam_id = seed.exams[0].id;
    let students: Vec<StudentId> = seed.students.iter().map(|s| s.id).collect();
    let store = MemoryAllocationStore::from_seed(seed).await.expect("seeded");

    let config = AllocationConfig {
        rng_seed: Some(7),
        ..AllocationConfig::default()
    };
    let service = AllocationService::from_config(Arc::new(store.clone()), &config);

    for student in &students {
        let outcome = service.allocate(*student, exam_id, "10.1.0.1").await.unwrap();
        assert_eq!(outcome.documents.len(), 2);
    }
    assert_eq!(store.record_count().await, students.len() * 2);
}

#[tokio::test]
async fn test_redelivery_returns_same_documents_in_question_order() {
    let t = TestExam::new(4, &[2, 3, 2]).await;
    let service = t.service(GateScope::Global, 11);
    let student = t.students[2].id;

    let first = service.allocate(student, t.exam.id, "172.16.0.4").await.unwrap();
    let again = service.allocate(student, t.exam.id, "172.16.9.9").await.unwrap();

    assert!(!first.redelivered);
    assert!(again.redelivered);
    assert_eq!(first.documents, again.documents);
    for (doc, question) in again.documents.iter().zip(&t.questions) {
        assert_eq!(doc.question_id, question.id);
    }
    assert_eq!(t.store.record_count().await, 3);
}

#[tokio::test]
async fn test_same_room_students_get_different_documents() {
    // Two students, two documents, one shared address: the second must get the other one.
    for seed in 0..10 {
        let t = TestExam::new(2, &[2]).await;
        let service = t.service(GateScope::Global, seed);
        let a = service.allocate(t.students[0].id, t.exam.id, "10.0.0.1").await.unwrap();
        let b = service.allocate(t.students[1].id, t.exam.id, "10.0.0.1").await.unwrap();
        assert_ne!(a.documents[0].id, b.documents[0].id, "seed {seed}");
    }
}

#[tokio::test]
async fn test_shared_room_falls_back_once_every_document_was_seen() {
    // Scenario: three students in one room, two documents.
    let t = TestExam::new(3, &[2]).await;
    let service = t.service(GateScope::Global, 5);

    let mut counts = std::collections::HashMap::<DocumentId, usize>::new();
    for student in &t.students {
        let outcome = service.allocate(student.id, t.exam.id, "0.0.0.0").await.unwrap();
        *counts.entry(outcome.documents[0].id).or_default() += 1;
    }

    assert_eq!(counts.values().sum::<usize>(), 3);
    assert!(counts.values().all(|&n| n <= t.target(0)));
}

#[tokio::test]
async fn test_oversubscribed_exam_is_exhausted_without_partial_records() {
    let t = TestExam::new(3, &[1, 3]).await;
    // The only first-question document is already at its share.
    for _ in 0..3 {
        t.store
            .insert_record(AllocationRecord::new(
                StudentId::new(),
                t.documents[0][0].id,
                "192.0.2.1",
                Utc::now(),
            ))
            .await;
    }
    let service = t.service(GateScope::PerExam, 1);

    let err = service.allocate(t.students[0].id, t.exam.id, "192.0.2.9").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::AllocationExhausted);
    assert_eq!(t.store.record_count().await, 3);
    assert!(!t.store.has_any_allocation(t.students[0].id, t.exam.id).await.unwrap());
}

#[tokio::test]
async fn test_request_documents_enforces_access_rules() {
    let t = TestExam::new(2, &[2]).await;
    let other = TestExam::in_store(t.store.clone(), 1, &[1]).await;
    let service = t.service(GateScope::Global, 3);
    let student = &t.students[0];

    let mut request = AssignRequest {
        student_id: student.id,
        student_number: student.number.clone(),
        authentication_code: t.exam.authentication_code.clone(),
        exam_id: t.exam.id,
    };
    assert_eq!(service.request_documents(&request, "1.2.3.4").await.unwrap().documents.len(), 1);

    request.student_number = "N9999".to_string();
    let err = service.request_documents(&request, "1.2.3.4").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);

    // Enrolled in a different course.
    let outsider = AssignRequest {
        student_id: other.students[0].id,
        student_number: other.students[0].number.clone(),
        authentication_code: t.exam.authentication_code.clone(),
        exam_id: t.exam.id,
    };
    let err = service.request_documents(&outsider, "1.2.3.4").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authorization);
}

/// Fails the first `persist_allocations` call, then delegates.
#[derive(Debug)]
struct FlakyStore {
    inner: MemoryAllocationStore,
    failed: AtomicBool,
}

#[async_trait]
impl AllocationStore for FlakyStore {
    async fn find_exam(&self, id: ExamId) -> AppResult<Option<Exam>> {
        self.inner.find_exam(id).await
    }
    async fn find_student(&self, id: StudentId) -> AppResult<Option<Student>> {
        self.inner.find_student(id).await
    }
    async fn find_course(&self, id: CourseId) -> AppResult<Option<Course>> {
        self.inner.find_course(id).await
    }
    async fn count_students_in_course(&self, id: CourseId) -> AppResult<u64> {
        self.inner.count_students_in_course(id).await
    }
    async fn questions_for_exam(&self, id: ExamId) -> AppResult<Vec<Question>> {
        self.inner.questions_for_exam(id).await
    }
    async fn documents_for_question(&self, id: QuestionId) -> AppResult<Vec<Document>> {
        self.inner.documents_for_question(id).await
    }
    async fn allocation_records_for_document(
        &self,
        id: DocumentId,
    ) -> AppResult<Vec<AllocationRecord>> {
        self.inner.allocation_records_for_document(id).await
    }
    async fn allocation_records_for_exam(&self, id: ExamId) -> AppResult<Vec<AllocationRecord>> {
        self.inner.allocation_records_for_exam(id).await
    }
    async fn has_any_allocation(&self, student: StudentId, exam: ExamId) -> AppResult<bool> {
        self.inner.has_any_allocation(student, exam).await
    }
    async fn existing_documents_for(
        &self,
        student: StudentId,
        exam: ExamId,
    ) -> AppResult<Vec<Document>> {
        self.inner.existing_documents_for(student, exam).await
    }
    async fn persist_allocations(
        &self,
        student_id: StudentId,
        ip_address: &str,
        downloaded_at: DateTime<Utc>,
        documents: &[Document],
    ) -> AppResult<()> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(AppError::persistence("connection reset"));
        }
        self.inner
            .persist_allocations(student_id, ip_address, downloaded_at, documents)
            .await
    }
}

#[tokio::test]
async fn test_persistence_failure_commits_nothing_and_next_request_succeeds() {
    let t = TestExam::new(2, &[2, 2]).await;
    let store = Arc::new(FlakyStore {
        inner: t.store.clone(),
        failed: AtomicBool::new(false),
    });
    let service =
        AllocationService::new(store, Arc::new(AllocationGate::default())).with_rng_seed(2);
    let student = t.students[0].id;

    let err = service.allocate(student, t.exam.id, "10.0.0.1").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Persistence);
    assert_eq!(t.store.record_count().await, 0);

    let outcome = service.allocate(student, t.exam.id, "10.0.0.1").await.unwrap();
    assert!(!outcome.redelivered);
    assert_eq!(outcome.documents.len(), 2);
    assert_eq!(t.store.record_count().await, 2);
}

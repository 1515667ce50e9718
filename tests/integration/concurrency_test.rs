//! Integration tests for allocation under concurrent requests.

mod helpers;

use std::collections::HashMap;
use std::sync::Arc;

use examdist_core::config::GateScope;
use examdist_core::types::id::{DocumentId, StudentId};
use examdist_database::{AllocationStore, MemoryAllocationStore};
use examdist_service::AllocationService;

use helpers::TestExam;

async fn allocate_class(service: &Arc<AllocationService>, t: &TestExam, rooms: usize) {
    let tasks: Vec<_> = t
        .students
        .iter()
        .enumerate()
        .map(|(i, student)| {
            let service = Arc::clone(service);
            let (student_id, exam_id) = (student.id, t.exam.id);
            let address = format!("10.{}.0.1", i % rooms);
            tokio::spawn(async move { service.allocate(student_id, exam_id, &address).await })
        })
        .collect();

    for joined in futures::future::join_all(tasks).await {
        let outcome = joined.expect("task").expect("allocation");
        assert_eq!(outcome.documents.len(), t.questions.len());
    }
}

async fn issued_per_document(
    store: &MemoryAllocationStore,
    t: &TestExam,
) -> HashMap<DocumentId, usize> {
    let mut counts = HashMap::new();
    for record in store.allocation_records_for_exam(t.exam.id).await.unwrap() {
        *counts.entry(record.document_id).or_default() += 1;
    }
    counts
}

fn assert_capacity_bound(t: &TestExam, counts: &HashMap<DocumentId, usize>) {
    for (index, documents) in t.documents.iter().enumerate() {
        for doc in documents {
            let issued = counts.get(&doc.id).copied().unwrap_or(0);
            assert!(
                issued <= t.target(index),
                "{} issued {issued} > {}",
                doc.public_file_name,
                t.target(index)
            );
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_whole_class_concurrently_respects_capacity() {
    let t = TestExam::new(37, &[5, 4, 6]).await;
    let service = Arc::new(t.service(GateScope::Global, 99));

    allocate_class(&service, &t, 4).await;

    let counts = issued_per_document(&t.store, &t).await;
    assert_eq!(counts.values().sum::<usize>(), 37 * 3);
    assert_capacity_bound(&t, &counts);
    assert_eq!(service.gate().acquisitions(), 37);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_per_exam_gate_keeps_each_exam_within_capacity() {
    let first = TestExam::new(21, &[4, 3]).await;
    let second = TestExam::in_store(first.store.clone(), 17, &[2, 5]).await;
    let service = Arc::new(first.service(GateScope::PerExam, 4));

    tokio::join!(
        allocate_class(&service, &first, 3),
        allocate_class(&service, &second, 2),
    );

    assert_capacity_bound(&first, &issued_per_document(&first.store, &first).await);
    assert_capacity_bound(&second, &issued_per_document(&second.store, &second).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_concurrent_requests_allocate_once() {
    let t = TestExam::new(5, &[3, 3]).await;
    let service = Arc::new(t.service(GateScope::Global, 8));
    let student: StudentId = t.students[0].id;

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let service = Arc::clone(&service);
            let exam = t.exam.id;
            tokio::spawn(async move { service.allocate(student, exam, "10.0.0.1").await })
        })
        .collect();

    let outcomes: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task").expect("allocation"))
        .collect();

    assert_eq!(t.store.record_count().await, 2);
    assert_eq!(outcomes.iter().filter(|o| !o.redelivered).count(), 1);
    assert!(outcomes.iter().all(|o| o.documents == outcomes[0].documents));
    assert_eq!(service.deliveries(student, t.exam.id), 10);
}

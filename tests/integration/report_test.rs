//! Integration tests for assignment history export.

mod helpers;

use examdist_core::config::GateScope;
use examdist_core::error::ErrorKind;
use examdist_core::types::id::ExamId;
use examdist_service::AssignmentReport;

use helpers::TestExam;

#[tokio::test]
async fn test_report_lists_each_student_once_in_allocation_order() {
    let t = TestExam::new(4, &[2, 2]).await;
    let service = t.service(GateScope::Global, 21);

    let order = [3usize, 0, 2];
    for &i in &order {
        service.allocate(t.students[i].id, t.exam.id, &format!("10.0.0.{i}")).await.unwrap();
        // Distinct timestamps for a stable order.
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    service.allocate(t.students[0].id, t.exam.id, "10.9.9.9").await.unwrap();

    let report = AssignmentReport::for_exam(&t.store, t.exam.id).await.unwrap();
    assert_eq!(report.questions, vec!["Question 1", "Question 2"]);
    let names: Vec<_> = report.rows.iter().map(|r| r.student_name.as_str()).collect();
    assert_eq!(names, vec!["student-03", "student-00", "student-02"]);
    assert_eq!(report.rows[1].ip_address, "10.0.0.0");
    assert!(report.rows.iter().all(|r| r.documents.iter().all(|d| !d.is_empty())));

    let csv = report.to_csv();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], "Student,IP,Time,\"Question 1\",\"Question 2\"");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("student-03,10.0.0.3,"));
}

#[tokio::test]
async fn test_exam_without_records_exports_header_only() {
    let t = TestExam::new(3, &[1, 1, 1]).await;
    let report = AssignmentReport::for_exam(&t.store, t.exam.id).await.unwrap();
    assert!(report.rows.is_empty());
    assert_eq!(
        report.to_csv(),
        "Student,IP,Time,\"Question 1\",\"Question 2\",\"Question 3\"\n"
    );
}

#[tokio::test]
async fn test_report_for_unknown_exam_is_not_found() {
    let t = TestExam::new(1, &[1]).await;
    let err = AssignmentReport::for_exam(&t.store, ExamId::new()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

//! Whole-class allocation simulation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use examdist_core::config::AppConfig;
use examdist_core::error::{AppError, ErrorKind};
use examdist_core::types::id::ExamId;
use examdist_database::AllocationStore;
use examdist_service::AssignmentReport;

use crate::output::{self, OutputFormat};

/// Arguments for the simulate command
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Seed roster (JSON)
    #[arg(short, long)]
    pub seed: PathBuf,

    /// Exam identifier
    #[arg(long)]
    pub exam: ExamId,

    /// Send every request from this single address
    #[arg(long, conflicts_with = "rooms")]
    pub ip: Option<String>,

    /// Spread students round-robin over this many room addresses
    #[arg(long, default_value_t = 1)]
    pub rooms: usize,

    /// Fixed seed for the allocation random source
    #[arg(long)]
    pub seed_rng: Option<u64>,

    /// Write the assignment history as CSV to this path
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

/// Per-document distribution row for table output
#[derive(Debug, Serialize, Tabled)]
struct DistributionRow {
    /// Question description
    question: String,
    /// Public file name
    document: String,
    /// Records issued
    issued: usize,
    /// Fair-share target, `ceil(students / documents)`
    target: u64,
}

/// Execute the simulate command
pub async fn execute(
    args: &SimulateArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let store = super::load_seed(&args.seed).await?;
    let exam = store
        .find_exam(args.exam)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Exam {} not found", args.exam)))?;
    let students = store.students_in_course(exam.course_id).await;

    let mut config = config.clone();
    if args.seed_rng.is_some() {
        config.allocation.rng_seed = args.seed_rng;
    }
    let (service, _notifier) = super::build_service(Arc::new(store.clone()), &config);
    let service = Arc::new(service);

    let rooms = args.rooms.max(1);
    let exam_id = exam.id;
    info!(exam_id = %exam_id, students = students.len(), rooms, "Starting simulation");

    let tasks: Vec<_> = students
        .iter()
        .enumerate()
        .map(|(i, student)| {
            let service = Arc::clone(&service);
            let student_id = student.id;
            let address = args
                .ip
                .clone()
                .unwrap_or_else(|| format!("192.168.{}.1", i % rooms));
            tokio::spawn(async move { service.allocate(student_id, exam_id, &address).await })
        })
        .collect();

    let mut allocated = 0usize;
    let mut failures: BTreeMap<String, usize> = BTreeMap::new();
    for joined in futures::future::join_all(tasks).await {
        match joined {
            Ok(Ok(_)) => allocated += 1,
            Ok(Err(e)) => *failures.entry(e.kind.to_string()).or_default() += 1,
            Err(e) => {
                output::print_error(&format!("Allocation task failed: {e}"));
                *failures.entry(ErrorKind::Internal.to_string()).or_default() += 1;
            }
        }
    }

    let rows = distribution(&store, exam.id, students.len() as u64).await?;
    output::print_list(&rows, format);

    if format == OutputFormat::Table {
        output::print_kv("Students", &students.len().to_string());
        output::print_kv("Allocated", &allocated.to_string());
        output::print_kv("Gate entries", &service.gate().acquisitions().to_string());
        for (kind, count) in &failures {
            output::print_kv(&format!("Failed ({kind})"), &count.to_string());
        }
    }
    if !failures.is_empty() {
        output::print_warning("Some students received no documents");
    }

    if let Some(path) = &args.csv {
        let report = AssignmentReport::for_exam(&store, exam.id).await?;
        tokio::fs::write(path, report.to_csv()).await?;
        output::print_success(&format!("Assignment history written to '{}'", path.display()));
    }

    Ok(())
}

/// Issued count against fair-share target for every document of the exam.
async fn distribution<S>(
    store: &S,
    exam_id: ExamId,
    students: u64,
) -> Result<Vec<DistributionRow>, AppError>
where
    S: AllocationStore + ?Sized,
{
    let mut rows = Vec::new();
    for question in store.questions_for_exam(exam_id).await? {
        let documents = store.documents_for_question(question.id).await?;
        let target = students.div_ceil(documents.len().max(1) as u64);
        for document in documents {
            let issued = store.allocation_records_for_document(document.id).await?.len();
            rows.push(DistributionRow {
                question: question.description.clone(),
                document: document.public_file_name,
                issued,
                target,
            });
        }
    }
    Ok(rows)
}

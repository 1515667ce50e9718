//! Single-student allocation command.

use std::path::PathBuf;

use chrono::Utc;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use examdist_core::config::AppConfig;
use examdist_core::error::AppError;
use examdist_core::types::id::{ExamId, StudentId};
use examdist_entity::Document;
use examdist_service::AssignRequest;

use crate::output::{self, OutputFormat};

/// Arguments for the allocate command
#[derive(Debug, Args)]
pub struct AllocateArgs {
    /// Seed roster (JSON); required unless the database provider is postgres
    #[arg(short, long)]
    pub seed: Option<PathBuf>,

    /// Exam identifier
    #[arg(long)]
    pub exam: ExamId,

    /// Student identifier
    #[arg(long)]
    pub student: StudentId,

    /// Requester network address
    #[arg(long, default_value = "127.0.0.1")]
    pub ip: String,

    /// Exam authentication code; with --number, the request is verified first
    #[arg(long, requires = "number")]
    pub code: Option<String>,

    /// Student number, checked together with --code
    #[arg(long, requires = "code")]
    pub number: Option<String>,

    /// Send the same request a second time
    #[arg(long)]
    pub repeat: bool,
}

/// Delivered document row for table output
#[derive(Debug, Serialize, Tabled)]
struct DocumentRow {
    /// Document ID
    id: String,
    /// Public file name
    file: String,
    /// Download location
    url: String,
}

impl From<&Document> for DocumentRow {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id.to_string(),
            file: document.public_file_name.clone(),
            url: document.url.clone(),
        }
    }
}

/// Execute the allocate command
pub async fn execute(
    args: &AllocateArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let store = super::open_store(config, args.seed.as_deref()).await?;
    let (service, notifier) = super::build_service(store.clone(), config);

    let mut inbox = match &notifier {
        Some(notifier) => {
            let exam = store
                .find_exam(args.exam)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Exam {} not found", args.exam)))?;
            store
                .find_course(exam.course_id)
                .await?
                .map(|course| notifier.subscribe(course.owner_id))
        }
        None => None,
    };

    let request = match (&args.code, &args.number) {
        (Some(code), Some(number)) => Some(AssignRequest {
            student_id: args.student,
            student_number: number.clone(),
            authentication_code: code.clone(),
            exam_id: args.exam,
        }),
        _ => None,
    };

    let rounds = if args.repeat { 2 } else { 1 };
    for round in 1..=rounds {
        let outcome = match &request {
            Some(request) => service.request_documents(request, &args.ip).await?,
            None => service.allocate(args.student, args.exam, &args.ip).await?,
        };

        if format == OutputFormat::Table {
            let verb = if outcome.redelivered { "Redelivered" } else { "Allocated" };
            output::print_success(&format!(
                "Request {round}: {verb} {} document(s) at {}",
                outcome.documents.len(),
                Utc::now().format("%H:%M:%S")
            ));
        }
        let rows: Vec<DocumentRow> = outcome.documents.iter().map(DocumentRow::from).collect();
        output::print_list(&rows, format);
    }

    if let Some(inbox) = inbox.as_mut() {
        while let Ok(message) = inbox.try_recv() {
            output::print_kv(
                "Owner notified",
                &format!(
                    "{} got {} ({} download(s))",
                    message.student_name, message.document_names, message.num_downloads
                ),
            );
        }
    }

    Ok(())
}

//! CSV rendering of an [`AssignmentReport`].

use std::borrow::Cow;

use super::history::AssignmentReport;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Quote a field if it contains a delimiter, quote, or line break.
fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(quote(field))
    } else {
        Cow::Borrowed(field)
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

impl AssignmentReport {
    /// Render the report as CSV, one line per student after the header.
    pub fn to_csv(&self) -> String {
        let mut header = vec!["Student".to_string(), "IP".to_string(), "Time".to_string()];
        header.extend(self.questions.iter().map(|q| quote(q)));

        let mut out = header.join(",");
        out.push('\n');

        for row in &self.rows {
            let time = row.downloaded_at.format(TIME_FORMAT).to_string();
            let mut fields = vec![
                escape(&row.student_name),
                escape(&row.ip_address),
                Cow::Owned(time),
            ];
            fields.extend(row.documents.iter().map(|d| escape(d)));
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        out
    }
}

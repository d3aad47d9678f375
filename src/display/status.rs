//! Status document display formatting
//!
//! Formats a run's status document as a summary block followed by a
//! per-item table.

use crate::ledger::StatusDocument;
use crate::models::ItemStatus;

/// Format a status document for the terminal
pub fn format_status(doc: &StatusDocument) -> String {
    let mut output = String::new();

    output.push_str("Backup Run\n");
    output.push_str("==========\n");
    output.push_str(&format!("Directory: {}\n", doc.info.directory.display()));
    output.push_str(&format!(
        "Started:   {}\n",
        doc.info.date.format("%Y-%m-%d %H:%M:%S")
    ));
    if let Some(end) = doc.info.end_date {
        output.push_str(&format!("Finished:  {}\n", end.format("%Y-%m-%d %H:%M:%S")));
    }
    output.push_str(&format!("State:     {}\n", doc.info.state));
    output.push_str(&format!(
        "Items:     {} of {} backed up ({} failed)\n",
        doc.info.backed_up_items,
        doc.info.total_items,
        doc.count_status(ItemStatus::Failed)
    ));
    output.push_str(&format!("Size:      {}\n", format_size(doc.info.size)));
    output.push_str(&format!(
        "Success:   {}\n",
        if doc.info.success { "Yes" } else { "No" }
    ));

    if doc.items.is_empty() {
        output.push_str("\nNo items recorded.\n");
        return output;
    }

    let title_width = doc
        .items
        .values()
        .map(|r| r.title.len())
        .max()
        .unwrap_or(5)
        .max(5);
    let type_width = doc
        .items
        .values()
        .map(|r| r.item_type.len())
        .max()
        .unwrap_or(4)
        .max(4);

    output.push('\n');
    output.push_str(&format!(
        "{:<title_width$}  {:<type_width$}  {:<11}  {:>7}  {}\n",
        "Title",
        "Type",
        "Status",
        "Retries",
        "Detail",
        title_width = title_width,
        type_width = type_width,
    ));
    output.push_str(&format!(
        "{:-<title_width$}  {:-<type_width$}  {:-<11}  {:->7}  {:-<10}\n",
        "",
        "",
        "",
        "",
        "",
        title_width = title_width,
        type_width = type_width,
    ));

    for record in doc.items.values() {
        let detail = match (&record.error, &record.backup_path) {
            (Some(error), _) if !record.success => error.clone(),
            (_, Some(path)) => path.display().to_string(),
            _ => String::new(),
        };

        output.push_str(&format!(
            "{:<title_width$}  {:<type_width$}  {:<11}  {:>7}  {}\n",
            record.title,
            record.item_type,
            record.status.to_string(),
            record.retries,
            detail,
            title_width = title_width,
            type_width = type_width,
        ));
    }

    output
}

/// Format a file size in human-readable form
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

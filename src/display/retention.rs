//! Retention display formatting

use crate::archive::{RetentionEntry, RetentionReport};

/// Format the entries a prune would evict
pub fn format_retention_plan(planned: &[RetentionEntry], keep_count: usize) -> String {
    if planned.is_empty() {
        return format!("Nothing to prune (keeping {} generations).\n", keep_count);
    }

    let mut output = format!(
        "Would evict {} generation(s), keeping the newest {}:\n",
        planned.len(),
        keep_count
    );
    for entry in planned {
        let date = entry
            .parsed_date
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        output.push_str(&format!("  {}  ({})\n", entry.directory_name, date));
    }
    output
}

/// Format the outcome of a retention pass
pub fn format_retention_report(report: &RetentionReport) -> String {
    let mut output = format!(
        "Evicted {} generation(s), {} retained",
        report.evicted.len(),
        report.retained.len()
    );
    if !report.unparsable.is_empty() {
        output.push_str(&format!(
            ", {} ignored (undated)",
            report.unparsable.len()
        ));
    }
    output.push('\n');

    for path in &report.evicted {
        output.push_str(&format!("  - {}\n", path.display()));
    }
    if let Some(reason) = &report.halted {
        output.push_str(&format!("Stopped early: {}\n", reason));
    }
    output
}

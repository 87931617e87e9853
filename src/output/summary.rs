use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use crate::report::BuildReport;

use super::styling::{bright, bright_green, bright_red, bright_yellow, build_result, cyan, dim};
use super::tables::{color_coded_count_cell, color_coded_result_cell, create_table};

const MAX_ISSUES: usize = 20;

/// Prints a human-readable summary of a build report to stdout.
///
/// Displays:
/// - Overview: project, definition, build number, branch, commit and result
/// - Timeline records that reported errors, warnings or issues
/// - The first issues with their source location
/// - The release created from the build, if resolved
pub fn print_summary(report: &BuildReport) {
    println!("{}", render_summary(report));
}

fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn render_summary(report: &BuildReport) -> String {
    let mut output = String::new();
    let build = &report.build;

    add_section_header(&mut output, "📊", "Overview");

    let _ = writeln!(
        output,
        "  {} {}\n  {} {} (#{})\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Project:"),
        cyan(&report.project),
        dim("Definition:"),
        cyan(&report.definition.name),
        report.definition.id,
        dim("Build:"),
        bright_yellow(&build.build_number),
        dim("Branch:"),
        cyan(&build.source_branch),
        dim("Commit:"),
        dim(&build.source_commit),
        dim("Result:"),
        build_result(build.result),
        dim("Link:"),
        dim(&build.links.web),
    );

    let totals = &report.totals;
    let _ = writeln!(
        output,
        "  {} {}   {} {}   {} {}   {} {}\n",
        dim("Records:"),
        bright_yellow(totals.records),
        dim("Errors:"),
        bright_red(totals.errors),
        dim("Warnings:"),
        bright_yellow(totals.warnings),
        dim("Issues:"),
        bright_yellow(totals.issues),
    );

    let records: Vec<_> = report.records_with_issues().collect();

    if records.is_empty() {
        let _ = writeln!(output, "{}", bright_green("No errors or warnings reported."));
    } else {
        add_section_header(&mut output, "🧱", "Timeline Records With Issues");

        let mut records_table = create_table();
        records_table.set_header(create_cyan_header(&[
            "Record", "Type", "Result", "Errors", "Warnings", "Log",
        ]));

        for record in &records {
            let name = if record.is_root() {
                record.name.clone()
            } else {
                format!("└ {}", record.name)
            };
            records_table.add_row(vec![
                Cell::new(name),
                Cell::new(&record.type_),
                color_coded_result_cell(record.result),
                color_coded_count_cell(record.error_count, TableColor::Red),
                color_coded_count_cell(record.warning_count, TableColor::Yellow),
                Cell::new(record.log.as_ref().map_or("N/A", |log| log.url.as_str())),
            ]);
        }

        let _ = writeln!(output, "{records_table}\n");

        add_section_header(&mut output, "❌", "Issues");

        let mut issues_table = create_table();
        issues_table.set_header(create_cyan_header(&["Record", "Type", "Message", "Location"]));

        let issues: Vec<_> = records
            .iter()
            .flat_map(|record| record.issues.iter().map(move |issue| (record, issue)))
            .collect();

        for (record, issue) in issues.iter().take(MAX_ISSUES) {
            let location = issue.data.as_ref().map_or_else(String::new, |data| {
                format!("{}:{}", data.source_path, data.line_number)
            });
            let color = if issue.type_.eq_ignore_ascii_case("error") {
                TableColor::Red
            } else {
                TableColor::Yellow
            };
            issues_table.add_row(vec![
                Cell::new(&record.name),
                Cell::new(&issue.type_).fg(color),
                Cell::new(&issue.message),
                Cell::new(location),
            ]);
        }

        if issues.len() > MAX_ISSUES {
            issues_table.add_row(vec![
                Cell::new(format!("... and {} more", issues.len() - MAX_ISSUES))
                    .fg(TableColor::DarkGrey),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
            ]);
        }

        let _ = writeln!(output, "{issues_table}\n");
    }

    if let Some(release) = &report.release {
        add_section_header(&mut output, "🚀", "Release");
        let _ = writeln!(
            output,
            "  {} {} ({:?})\n  {} {}\n",
            dim("Name:"),
            cyan(&release.name),
            release.status,
            dim("Link:"),
            dim(&release.links.web),
        );
    }

    for (record, log) in &report.logs {
        add_section_header(&mut output, "📜", &format!("Log: {record}"));
        let _ = writeln!(output, "{log}");
    }

    let _ = write!(
        output,
        "{} {}",
        dim("Collected:"),
        dim(report.collected_at.format("%Y-%m-%d %H:%M UTC"))
    );

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::sync::Arc;

    use crate::providers::azure::types::{Build, BuildDefinition, Links, Project, TimelineRecord};

    fn create_report(records: Vec<TimelineRecord>) -> BuildReport {
        let definition = BuildDefinition {
            id: 42,
            name: "NuGet-Official".to_string(),
            project: Arc::new(Project {
                id: "p".to_string(),
                name: "DevDiv".to_string(),
            }),
            links: Links {
                self_: "https://self".to_string(),
                web: "https://web".to_string(),
                badge: None,
            },
        };
        let build = Build::from_json(
            &json!({
                "id": 1, "buildNumber": "20240101.1", "result": "failed", "sourceBranch": "main",
                "_links": {"self": {"href": "https://self/1"}, "web": {"href": "https://web/1"}}
            }),
            &Arc::new(definition.clone()),
        )
        .unwrap()
        .with_timeline(records);
        BuildReport::new(&definition, build, None, IndexMap::new())
    }

    #[test]
    fn test_render_summary_without_issues() {
        console::set_colors_enabled(false);
        let output = render_summary(&create_report(vec![]));
        assert!(output.contains("NuGet-Official"));
        assert!(output.contains("20240101.1"));
        assert!(output.contains("No errors or warnings reported."));
    }

    #[test]
    fn test_render_summary_lists_issues() {
        console::set_colors_enabled(false);
        let records = vec![TimelineRecord::from_json(&json!({
            "id": "r", "name": "Compile", "type": "Task", "result": "failed", "errorCount": 1,
            "issues": [{"type": "error", "message": "CS0103",
                        "data": {"sourcePath": "src/a.cs", "lineNumber": "12"}}]
        }))];
        let output = render_summary(&create_report(records));
        assert!(output.contains("Compile"));
        assert!(output.contains("CS0103"));
        assert!(output.contains("src/a.cs:12"));
    }
}

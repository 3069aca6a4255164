use crate::{
    access_log::AccessLogSummary,
    distribution::Coverage,
    load_schedule::{achieved_rps, ScheduleParams, ScheduledRequest},
    page_usage::SimulationReport,
};
use colored::*;
use itertools::Itertools;
use term_table::{row, row::Row, rows, table_cell::*, Table, TableStyle};

const TOP_ADDRESSES: usize = 10;

fn heading(title: &str) -> String {
    format!("\n{}", format!(" {} ", title).reversed().green())
}

pub fn render_log_summary(summary: &AccessLogSummary) -> String {
    let mut rows = rows![row![
        TableCell::builder("Rank".bold()).build(),
        TableCell::builder("Key".bold()).build(),
        TableCell::builder("Address".bold()).build(),
        TableCell::builder("Access Count".bold()).build()
    ]];
    rows.extend(summary.accesses.iter().take(TOP_ADDRESSES).map(|access| {
        row![
            TableCell::new(access.rank),
            TableCell::new(&access.key),
            TableCell::new(&access.address),
            TableCell::new(access.access_count)
        ]
    }));

    let table = Table::builder()
        .rows(rows)
        .style(TableStyle::rounded())
        .build();

    format!(
        "{}\n{} lines, {} key lines, {} queries, {} unique addresses\n{}",
        heading("Access log"),
        summary.total_lines,
        summary.key_lines,
        summary.query_count,
        summary.unique_addresses.to_string().yellow(),
        table.render()
    )
}

pub fn render_simulation(report: &SimulationReport) -> String {
    let mut rows = rows![row![
        TableCell::builder("Bytes Used".bold()).build(),
        TableCell::builder("Number of Pages".bold()).build(),
        TableCell::builder("Fill".bold()).build()
    ]];
    let page_size = report.params.page_size() as f64;
    rows.extend(report.histogram.iter().map(|(bytes_used, pages)| {
        row![
            TableCell::new(bytes_used),
            TableCell::new(pages),
            TableCell::new(format!("{:.1}%", bytes_used as f64 / page_size * 100.0))
        ]
    }));

    let table = Table::builder()
        .rows(rows)
        .style(TableStyle::rounded())
        .build();

    let mut out = format!(
        "{}\nNumber of addresses with access count >= {}: {}\nPages touched: {}\n{}",
        heading("Page usage"),
        report.params.access_threshold(),
        report.qualifying.len().to_string().yellow(),
        report.usage.page_count(),
        table.render()
    );

    if !report.skipped.is_empty() {
        let skipped = report.skipped.iter().map(|s| s.text.as_str()).join(", ");
        out.push_str(&format!(
            "{} {}\n",
            format!("Skipped {} malformed addresses:", report.skipped.len()).red(),
            skipped
        ));
    }
    out
}

pub fn render_coverage(coverage: Option<&Coverage>, addresses: usize) -> String {
    match coverage {
        Some(cov) => format!(
            "{}\n{} of {} addresses account for {}% of {} accesses",
            heading("Access distribution"),
            cov.addresses.to_string().yellow(),
            addresses,
            cov.portion,
            cov.total_accesses
        ),
        None => format!(
            "{}\n{}",
            heading("Access distribution"),
            "No accesses recorded".bright_black()
        ),
    }
}

pub fn render_schedule(params: &ScheduleParams, schedule: &[ScheduledRequest]) -> String {
    let mut rows = rows![row![
        TableCell::builder("Worker".bold()).build(),
        TableCell::builder("Requests".bold()).build(),
        TableCell::builder("Duration (s)".bold()).build(),
        TableCell::builder("Rate (rps)".bold()).build()
    ]];

    for (worker, requests) in &schedule.iter().chunk_by(|r| r.worker) {
        let offsets = requests.map(|r| r.offset_secs).collect_vec();
        let duration = offsets.last().copied().unwrap_or_default();
        rows.push(row![
            TableCell::new(worker),
            TableCell::new(offsets.len()),
            TableCell::new(format!("{:.3}", duration)),
            TableCell::new(
                achieved_rps(&offsets)
                    .map(|rps| format!("{:.2}", rps))
                    .unwrap_or("--".to_string())
            )
        ]);
    }

    let table = Table::builder()
        .rows(rows)
        .style(TableStyle::rounded())
        .build();

    format!(
        "{}\nTarget {:.2} rps across {} workers ({:.2} rps each)\n{}",
        heading("Query schedule"),
        params.rate(),
        params.workers(),
        params.rate_per_worker(),
        table.render()
    )
}

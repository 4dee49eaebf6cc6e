use crate::error::CliError;
use engine_core::metrics::MetricsSnapshot;
use engine_runtime::orchestrator::{RunOverview, TickResult};
use model::{execution::error_record::ErrorRecord, progress::snapshot::ProgressSnapshot};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn duration(secs: Option<u64>) -> String {
    match secs {
        Some(secs) => format!("{}m{:02}s", secs / 60, secs % 60),
        None => "n/a".to_string(),
    }
}

pub fn print_tick(result: &TickResult) {
    match result.snapshot() {
        Some(snap) => println!(
            "{:<10} {:>6.1}%  {}/{}  errors {}  eta {}  {}",
            result.label(),
            snap.percentage,
            snap.processed,
            snap.total.map(|t| t.to_string()).unwrap_or_else(|| "?".into()),
            snap.errors,
            duration(snap.estimated_remaining_secs),
            snap.current_item_label.as_deref().unwrap_or("")
        ),
        None => println!("{}", result.label()),
    }
}

pub fn print_progress_table(snap: &ProgressSnapshot, stalled: bool) {
    println!("Progress for '{}' / run '{}':", snap.entity, snap.run_id);
    println!("-----------------------------");
    println!("{:<16} {}", "Status", snap.status);
    println!("{:<16} {:.1}%", "Percentage", snap.percentage);
    println!("{:<16} {}", "Processed", snap.processed);
    println!("{:<16} {}", "Errors", snap.errors);
    let total = snap.total.map(|t| t.to_string()).unwrap_or_else(|| "unknown".into());
    println!("{:<16} {}", "Total", total);
    println!(
        "{:<16} {}",
        "Current item",
        snap.current_item_label.as_deref().unwrap_or("n/a")
    );
    println!("{:<16} {}", "Started", snap.started_at.to_rfc3339());
    println!("{:<16} {}", "Updated", snap.updated_at.to_rfc3339());
    println!("{:<16} {}", "Elapsed", duration(Some(snap.elapsed_secs)));
    println!("{:<16} {}", "Remaining", duration(snap.estimated_remaining_secs));
    println!("{:<16} {}", "Cancel requested", snap.cancel_requested);
    println!("{:<16} {}", "Stalled", stalled);
}

pub fn print_errors(records: &[ErrorRecord]) {
    if records.is_empty() {
        println!("No failed items.");
        return;
    }
    println!("{:<10} {:<24} {}", "Position", "Reference", "Message");
    for record in records {
        println!(
            "{:<10} {:<24} {}",
            record.position, record.item_reference, record.message
        );
    }
}

pub fn print_overview(overview: &RunOverview) {
    println!("== {} ==", overview.entity);
    match &overview.checkpoint {
        Some(cp) => println!(
            "{:<16} run {} offset {} batch {} (size {})",
            "Checkpoint", cp.run_id, cp.offset, cp.batch_index, cp.batch_size
        ),
        None => println!("{:<16} none", "Checkpoint"),
    }
    match &overview.lock {
        Some(lock) => println!(
            "{:<16} held by {} until {}{}",
            "Lock",
            lock.holder_token,
            lock.expires_at.to_rfc3339(),
            if lock.in_tick { " (tick in flight)" } else { "" }
        ),
        None => println!("{:<16} free", "Lock"),
    }
    match &overview.progress {
        Some(snap) => println!(
            "{:<16} {} {:.1}% ({} processed, {} errors){}",
            "Progress",
            snap.status,
            snap.percentage,
            snap.processed,
            snap.errors,
            if overview.stalled { " STALLED" } else { "" }
        ),
        None => println!("{:<16} none", "Progress"),
    }
}

pub fn print_metrics(metrics: &MetricsSnapshot) {
    println!(
        "ticks {} (busy {}, failed {}), batches {}, items {}, item failures {}",
        metrics.ticks,
        metrics.busy_ticks,
        metrics.failed_ticks,
        metrics.batches_processed,
        metrics.records_processed,
        metrics.failure_count
    );
}

//! Operator-facing output

use agentlab_core::batch::BatchSummary;
use agentlab_core::invocation::{InvocationOutcome, InvocationReport, InvocationResult};
use agentlab_core::llm::ProbeReport;
use chrono::Local;

const RULE: &str = "──────────────────────────────────────────────────";

pub fn print_query(report: &InvocationReport) {
    println!("{}", RULE);
    println!("📝 Query: {}\n", report.query);

    for step in &report.steps {
        println!("   🛠️ {}({}) -> {}", step.tool, step.arguments, step.output);
    }

    match &report.outcome {
        InvocationOutcome::Skipped => println!("⏭️ Skipped (dry run)\n"),
        InvocationOutcome::Aborted => println!("🚫 Aborted by operator\n"),
        InvocationOutcome::Completed(InvocationResult::Success { text }) => {
            println!("✅ Result: {}\n", text)
        }
        InvocationOutcome::Completed(InvocationResult::Failure { message, .. }) => {
            println!("❌ Error: {}\n", message)
        }
    }
}

pub fn print_summary(summary: &BatchSummary) {
    println!("{}", RULE);
    if summary.halted_by_rate_limit {
        println!(
            "⏳ Rate limited by the provider (HTTP 429). Stop running and try again later; {} queries not attempted.\n",
            summary.remaining
        );
    } else {
        println!("🎉 Agent demo complete!\n");
    }
    println!(
        "completed: {}  failed: {}  skipped: {}  aborted: {}  remaining: {}",
        summary.completed, summary.failed, summary.skipped, summary.aborted, summary.remaining
    );
}

pub fn print_probe(report: &ProbeReport) {
    if report.ok {
        println!("✅ Request succeeded (not rate-limited right now).");
        return;
    }

    println!("❌ Request failed.");
    if let Some(error) = &report.error {
        println!("Error: {}", error);
    }
    let Some(status) = report.status else {
        println!("\n(No HTTP response, so rate-limit headers are not available.)");
        return;
    };

    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "None".to_string());
    println!("\n--- Rate limit / retry headers (if present) ---");
    println!("status: {}", status);
    println!("retry-after: {}", show(&report.retry_after));
    println!("x-ratelimit-remaining: {}", show(&report.remaining));
    println!("x-ratelimit-limit: {}", show(&report.limit));
    println!("x-ratelimit-reset: {}", show(&report.reset));

    if report.retry_after.is_some() {
        match (report.wait(), report.ready_at(Local::now().naive_local())) {
            (Some(wait), Some(ready_at)) => {
                println!("\n--- Retry-After interpretation ---");
                println!("wait: {}", wait);
                println!("ready_at (local): {}", ready_at.format("%Y-%m-%d %H:%M:%S"));
            }
            _ => println!("\n(Could not parse Retry-After value)"),
        }
    }

    if report.reset.is_some() {
        match report.reset_utc() {
            Some(reset) => println!("reset (UTC): {}", reset),
            None => println!("(Could not parse x-ratelimit-reset value)"),
        }
    }
}

use colored::*;
use std::time::{Duration, Instant};

use crate::sse_client::Event;

/// Outcome of one scenario run against the hub.
#[derive(Debug)]
pub struct TestResult {
    pub scenario: &'static str,
    pub passed: bool,
    pub detail: Option<String>,
    pub duration: Duration,
}

impl TestResult {
    pub fn pass(scenario: &'static str, started: Instant) -> Self {
        Self {
            scenario,
            passed: true,
            detail: None,
            duration: started.elapsed(),
        }
    }

    /// Passes when there are no failures; otherwise fails listing all of them.
    pub fn from_failures(scenario: &'static str, started: Instant, failures: Vec<String>) -> Self {
        Self {
            scenario,
            passed: failures.is_empty(),
            detail: (!failures.is_empty()).then(|| failures.join("; ")),
            duration: started.elapsed(),
        }
    }
}

pub fn print_event(label: &str, event: &Event) {
    println!(
        "   [{}] {} id={} after {:?}",
        label.bright_blue().bold(),
        event.event_type.yellow(),
        event.id.as_deref().unwrap_or("-"),
        event.timestamp.elapsed(),
    );

    if let Ok(compact) = serde_json::to_string(&event.data) {
        println!("      {}", compact.dimmed());
    }
}

/// Prints one line per scenario and returns whether all of them passed.
pub fn print_test_summary(results: &[TestResult]) -> bool {
    println!("\n{}", "=== RESULTS ===".bright_white().bold());

    for result in results {
        let status = if result.passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        println!("[{}] {:<16} {:.0?}", status, result.scenario, result.duration);

        if let Some(detail) = &result.detail {
            println!("      {}", detail.dimmed());
        }
    }

    let failed = results.iter().filter(|r| !r.passed).count();
    let elapsed: Duration = results.iter().map(|r| r.duration).sum();
    println!(
        "\n{} scenario(s) in {:.1?}: {} passed, {} failed",
        results.len(),
        elapsed,
        (results.len() - failed).to_string().green(),
        failed.to_string().red()
    );

    failed == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_failures() {
        let started = Instant::now();

        let passed = TestResult::from_failures("broadcast_test", started, Vec::new());
        assert!(passed.passed);
        assert!(passed.detail.is_none());

        let failed = TestResult::from_failures(
            "broadcast_test",
            started,
            vec!["Client 1: timeout".to_string(), "Client 2: timeout".to_string()],
        );
        assert!(!failed.passed);
        assert_eq!(
            failed.detail.as_deref(),
            Some("Client 1: timeout; Client 2: timeout")
        );
    }

    #[test]
    fn test_summary_reports_overall_outcome() {
        let started = Instant::now();
        let ok = TestResult::pass("connection_test", started);
        let bad = TestResult::from_failures("ordering_test", started, vec!["out of order".into()]);

        assert!(print_test_summary(&[TestResult::pass("connection_test", started)]));
        assert!(!print_test_summary(&[ok, bad]));
    }
}

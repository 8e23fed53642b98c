//! Report printing

use fwflash_core::{RunMode, SessionReport, TargetGroup, TargetId};

fn print_bucket(label: &str, ids: &[TargetId]) {
    let names = if ids.is_empty() {
        "-".to_string()
    } else {
        ids.iter()
            .map(|id| id.name())
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("  {:<10}{}", format!("{}:", label), names);
}

/// Print per-group buckets and the overall result
pub fn print_report(report: &SessionReport) {
    println!();
    for (group, title) in [
        (TargetGroup::Main, "Main firmware"),
        (TargetGroup::Io, "IO controller"),
    ] {
        let buckets = report.summary(group);
        if buckets.is_empty() {
            continue;
        }
        println!("{}:", title);
        match report.mode() {
            RunMode::Verify => {
                print_bucket("verified", &buckets.verified);
                print_bucket("failed", &buckets.failed);
            }
            RunMode::Install => {
                print_bucket("updated", &buckets.updated);
                print_bucket("skipped", &buckets.skipped);
                print_bucket("failed", &buckets.failed);
            }
        }
    }

    for record in report.records() {
        if let Some(window) = record.bricking_window {
            println!(
                "{}: bricking window {} ms",
                record.target,
                window.as_millis()
            );
        }
    }

    println!("Result: {}", if report.success() { "PASS" } else { "FAIL" });
}

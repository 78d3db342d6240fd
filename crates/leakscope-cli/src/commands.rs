//! Command implementations for the leakscope CLI.

use std::fmt::Write as _;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context, Result};
use leakscope::LeakReport;
use leakscope_core::{codec, EventTable};

/// Analyze command: print the leak report of a saved capture.
pub fn analyze(capture: &Path, allow: &[String], json: bool, expect: Option<usize>) -> Result<()> {
    let patterns: Vec<&str> = allow.iter().map(String::as_str).collect();
    let report = leakscope::leaks_from_capture(capture, &patterns)
        .with_context(|| format!("failed to analyze capture {}", capture.display()))?;

    if json {
        println!("{}", report.to_json().context("failed to serialize report")?);
    } else {
        print!("{report}");
    }

    check_expected(&report, expect)
}

fn check_expected(report: &LeakReport, expect: Option<usize>) -> Result<()> {
    match expect {
        Some(want) if report.count != want => {
            bail!("expected {want} leaked tasks, found {}", report.count)
        }
        _ => Ok(()),
    }
}

/// Events command: dump every decoded event with its link.
pub fn events(capture: &Path) -> Result<()> {
    let file = File::open(capture)
        .with_context(|| format!("failed to open capture {}", capture.display()))?;
    let table = codec::decode(BufReader::new(file))
        .with_context(|| format!("failed to decode capture {}", capture.display()))?;

    print!("{}", render_events(&table));
    Ok(())
}

fn render_events(table: &EventTable) -> String {
    let mut out = String::new();
    for (index, event) in table.iter() {
        let next = event
            .next
            .map(|next| next.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{index} {kind} task={task} t={ts}ns frames={frames} next={next} name={name}",
            kind = event.kind,
            task = event.task,
            ts = event.timestamp_ns,
            frames = event.stack.len(),
            name = table.task_name(event.task),
        );
    }
    let _ = writeln!(out, "{} events, {} tasks", table.len(), table.tasks().count());
    out
}

//! Outcome tally and line-oriented rendering.

use std::io::{self, Write};

use crate::core::outcome::{OutcomeKind, OutcomeRecord};
use crate::core::types::RunStatus;

/// Aggregated result of one run, in record order.
///
/// Only the runner mutates a report, and it hands it out once the run has
/// finished executing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub records: Vec<OutcomeRecord>,
    /// Units that started executing.
    pub units: usize,
    /// Executed test methods (skip records excluded).
    pub tests: usize,
    /// Assertion-style helper calls made by all methods.
    pub assertions: usize,
    pub passes: usize,
    pub failures: usize,
    pub errors: usize,
    pub skips: usize,
    /// Set when the halt policy stopped the run early.
    pub halted: bool,
}

impl Report {
    /// Append a record and update the counters.
    pub fn record(&mut self, record: OutcomeRecord) {
        match record.kind {
            OutcomeKind::Pass => self.passes += 1,
            OutcomeKind::Failure => self.failures += 1,
            OutcomeKind::Error => self.errors += 1,
            OutcomeKind::Skip => self.skips += 1,
        }
        if record.kind != OutcomeKind::Skip {
            self.tests += 1;
        }
        self.records.push(record);
    }

    pub fn status(&self) -> RunStatus {
        if self.halted {
            RunStatus::Halted
        } else {
            RunStatus::Completed
        }
    }

    /// Counts in fixed order: tests, assertions, passes, failures, errors, skips.
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{} tests, {} assertions, {} passes, {} failures, {} errors, {} skips",
            self.tests, self.assertions, self.passes, self.failures, self.errors, self.skips
        );
        if self.halted {
            line.push_str(" (halted)");
        }
        line
    }

    /// Write one block per record followed by the summary line.
    pub fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        for record in &self.records {
            writeln!(out, "{}", render_record(record))?;
        }
        writeln!(out, "{}", self.summary_line())
    }
}

/// `LABEL unit: method`, plus indented message and location for problems.
pub fn render_record(record: &OutcomeRecord) -> String {
    let mut line = format!("{:<5} {}", record.kind.label(), readable(&record.unit));
    match &record.method {
        Some(method) => {
            line.push_str(": ");
            line.push_str(&readable(method));
        }
        None => {
            if let Some(reason) = &record.message {
                line.push_str(" (");
                line.push_str(reason);
                line.push(')');
            }
        }
    }
    if record.kind.is_problem() {
        if let Some(message) = &record.message {
            for message_line in message.lines() {
                line.push_str("\n      ");
                line.push_str(message_line);
            }
        }
        if let Some(location) = &record.location {
            line.push_str(&format!("\n      at {location}"));
        }
    }
    line
}

/// Turn `test_listens_on_port`, `testOne` or `WebServer` into spaced lowercase.
///
/// A leading `test` word is dropped when other words follow it.
pub fn readable(identifier: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for part in identifier.split(|ch: char| ch == '_' || ch == '-' || ch.is_whitespace()) {
        split_camel(part, &mut words);
    }
    if words.len() > 1 && words[0] == "test" {
        words.remove(0);
    }
    words.join(" ")
}

fn split_camel(part: &str, words: &mut Vec<String>) {
    let chars: Vec<char> = part.chars().collect();
    let mut current = String::new();
    for (index, &ch) in chars.iter().enumerate() {
        if index > 0 && ch.is_uppercase() {
            let prev = chars[index - 1];
            let next_is_lower = chars.get(index + 1).is_some_and(|next| next.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
}

//! Test reporting sink.
//!
//! The harness never prints or aborts on its own; it hands progress and
//! failure messages to a [`Reporter`]. `fatal` must not return: under the
//! Rust test harness a panic fails the current test only.

use std::sync::{Mutex, PoisonError};

pub trait Reporter: Send + Sync {
    /// Progress output (pull output, created/started containers).
    fn log(&self, message: &str);

    /// A non-fatal failure, e.g. one container refusing to stop.
    fn error(&self, message: &str);

    /// Abort the current test.
    fn fatal(&self, message: &str) -> !;
}

/// Reporter for `cargo test`: output goes through the captured stdout/stderr,
/// so it is only shown for failing tests, and `fatal` panics.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibtestReporter;

impl Reporter for LibtestReporter {
    fn log(&self, message: &str) {
        println!("{message}");
    }

    fn error(&self, message: &str) {
        eprintln!("{message}");
    }

    fn fatal(&self, message: &str) -> ! {
        panic!("{message}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Log(String),
    Error(String),
    Fatal(String),
}

/// Keeps every message for later assertions. `fatal` records, then panics.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, report: Report) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report);
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Error(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn fatals(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Fatal(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Log(m) => Some(m),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn log(&self, message: &str) {
        self.push(Report::Log(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(Report::Error(message.to_string()));
    }

    fn fatal(&self, message: &str) -> ! {
        self.push(Report::Fatal(message.to_string()));
        panic!("{message}");
    }
}

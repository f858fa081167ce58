// file: src/reporter/mod.rs
// version: 2.0.0
// guid: 0b6c1f52-96f4-4b63-8a2e-8d4fb7a1f2c9

//! Progress notifications for installation steps
//!
//! A notification is emitted after every step state transition. The
//! tracing reporter is always available; the console reporter draws a
//! spinner for the running step and a status line once it finishes.

use crate::steps::{InstallationStep, StepStatus};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info};

/// Receives step state transitions
pub trait ProgressReporter: Send + Sync {
    fn step_changed(&self, step: &InstallationStep);
}

/// Emits one log event per transition
#[derive(Debug, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn step_changed(&self, step: &InstallationStep) {
        match step.status {
            StepStatus::Failed => error!(
                node = %step.node,
                step = %step.name,
                status = %step.status,
                "{}",
                step.error.as_deref().unwrap_or("step failed")
            ),
            _ => info!(node = %step.node, step = %step.name, status = %step.status, "step"),
        }
    }
}

/// Human-facing progress on stderr
pub struct ConsoleReporter {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }

    fn start_spinner(&self, message: String) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]") {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(120));

        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(previous) = slot.replace(pb) {
                previous.finish_and_clear();
            }
        }
    }

    fn finish_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(pb) = slot.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleReporter {
    fn step_changed(&self, step: &InstallationStep) {
        let label = format!("[{}] {}", step.node, step.name);
        match step.status {
            StepStatus::Pending => {}
            StepStatus::Running => self.start_spinner(label),
            StepStatus::Success => {
                self.finish_spinner();
                eprintln!("{} {}", "✓".green().bold(), label);
            }
            StepStatus::Failed => {
                self.finish_spinner();
                eprintln!(
                    "{} {}: {}",
                    "✗".red().bold(),
                    label,
                    step.error.as_deref().unwrap_or("failed").red()
                );
            }
        }
    }
}

/// Fans one notification out to several reporters
pub struct CompositeReporter {
    reporters: Vec<Box<dyn ProgressReporter>>,
}

impl CompositeReporter {
    pub fn new(reporters: Vec<Box<dyn ProgressReporter>>) -> Self {
        Self { reporters }
    }
}

impl ProgressReporter for CompositeReporter {
    fn step_changed(&self, step: &InstallationStep) {
        for reporter in &self.reporters {
            reporter.step_changed(step);
        }
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::Arc;

    /// Keeps every notification as (node, name, status)
    #[derive(Debug, Clone, Default)]
    pub struct RecordingReporter {
        pub events: Arc<Mutex<Vec<(String, String, StepStatus)>>>,
    }

    impl RecordingReporter {
        pub fn events(&self) -> Vec<(String, String, StepStatus)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressReporter for RecordingReporter {
        fn step_changed(&self, step: &InstallationStep) {
            self.events
                .lock()
                .unwrap()
                .push((step.node.clone(), step.name.clone(), step.status));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::recording::RecordingReporter;
    use super::*;

    #[test]
    fn test_composite_forwards_to_every_reporter() {
        let a = RecordingReporter::default();
        let b = RecordingReporter::default();
        let composite = CompositeReporter::new(vec![Box::new(a.clone()), Box::new(b.clone())]);

        let mut step = InstallationStep::new("Update OS", "root@es:22");
        step.mark_running();
        composite.step_changed(&step);

        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events()[0].2, StepStatus::Running);
    }

    #[test]
    fn test_console_reporter_clears_spinner_on_finish() {
        let reporter = ConsoleReporter::new();
        let mut step = InstallationStep::new("Update OS", "root@es:22");
        step.mark_running();
        reporter.step_changed(&step);
        assert!(reporter.spinner.lock().unwrap().is_some());

        step.mark_success(None);
        reporter.step_changed(&step);
        assert!(reporter.spinner.lock().unwrap().is_none());
    }
}

//! Console output for transfer progress and results.

use console::Style;
use heatlink_core::session::{Progress, SessionReport};
use std::io::Write;
use std::path::Path;

/// Output formatter for CLI results
pub struct OutputFormatter {
    green: Style,
    red: Style,
    blue: Style,
    bold: Style,
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self {
            green: Style::new().green(),
            red: Style::new().red(),
            blue: Style::new().blue(),
            bold: Style::new().bold(),
        }
    }
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print_banner(&self, host: &str, output_root: &Path) {
        println!("{}", self.bold.apply_to("Heatmap Frame Receiver"));
        println!("  Server: {}", self.blue.apply_to(host));
        println!("  Output: {}", self.blue.apply_to(output_root.display()));
    }

    /// Render one progress event. Frame counts are throttled to every
    /// tenth frame (and the last) so a large transfer doesn't flood the
    /// terminal.
    pub fn print_progress(&self, progress: &Progress) {
        match progress {
            Progress::Status(status) => {
                println!("  Status: {}", status);
            }
            Progress::Frames { received, total } => {
                let is_last = total.is_some_and(|t| *received >= t);
                if received % 10 == 0 || is_last {
                    match total {
                        Some(total) => print!("\r  Received {}/{} frames", received, total),
                        None => print!("\r  Received {} frames", received),
                    }
                    let _ = std::io::stdout().flush();
                    if is_last {
                        println!();
                    }
                }
            }
        }
    }

    pub fn print_report(&self, report: &SessionReport) {
        println!();
        if report.outcome.is_success() {
            println!(
                "{} Transfer complete: {} frames received",
                self.green.apply_to("✓"),
                report.frames_received
            );
        } else {
            println!(
                "{} Transfer {}: {} frames received{}",
                self.red.apply_to("✗"),
                report.outcome.label(),
                report.frames_received,
                report
                    .frames_expected
                    .map(|t| format!(" of {t} expected"))
                    .unwrap_or_default()
            );
        }

        if report.decode_failures > 0 || report.persistence_failures > 0 {
            println!(
                "  Soft errors: {} undecodable messages, {} frames not persisted",
                report.decode_failures, report.persistence_failures
            );
        }

        match &report.summary_path {
            Some(path) => println!("  Summary: {}", self.blue.apply_to(path.display())),
            None => println!("{} Summary record could not be written", self.red.apply_to("✗")),
        }
    }
}

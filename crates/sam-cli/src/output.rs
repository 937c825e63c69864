//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use sam_core::{SamDocument, SamMetadata};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a single SAM with its body
    pub fn print_sam(&self, doc: &SamDocument) {
        match self.format {
            OutputFormat::Human => {
                println!("Key:         {}", doc.key);
                println!("Name:        {}", doc.name.as_deref().unwrap_or("(unnamed)"));
                if let Some(ref desc) = doc.description {
                    println!("Description: {}", desc);
                }
                if let Some(status) = doc.generation_status {
                    println!("Status:      {}", status);
                }
                println!("Created:     {}", doc.created_at.format("%Y-%m-%d %H:%M:%S"));
                println!("Modified:    {}", doc.modified_at.format("%Y-%m-%d %H:%M:%S"));

                println!();
                println!("── Body ──");
                print_pretty(&doc.body);
            }
            OutputFormat::Json => print_pretty(doc),
            OutputFormat::Quiet => {
                println!("{}", doc.key);
            }
        }
    }

    /// Print a list of SAM metadata entries
    pub fn print_list(&self, entries: &[SamMetadata]) {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("No SAMs found.");
                    return;
                }
                for meta in entries {
                    let status = meta
                        .generation_status
                        .map(|s| format!(" [{}]", s))
                        .unwrap_or_default();
                    println!(
                        "{} | {}{} | {}",
                        meta.key,
                        truncate(meta.display_name(), 35),
                        status,
                        meta.modified_at.format("%Y-%m-%d %H:%M")
                    );
                }
                println!("\n{} SAM(s)", entries.len());
            }
            OutputFormat::Json => print_pretty(&entries),
            OutputFormat::Quiet => {
                for meta in entries {
                    println!("{}", meta.key);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_pretty<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to format output: {}", e),
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

//! Status command handler

use anyhow::Result;

use sam_core::{GenerationStatus, SamMetadata, Store};

use crate::output::{Output, OutputFormat};

/// Document counts by generation status
#[derive(Debug, Default, PartialEq, Eq)]
struct Counts {
    total: usize,
    pending: usize,
    completed: usize,
    failed: usize,
}

impl Counts {
    fn from_entries(entries: &[SamMetadata]) -> Self {
        let mut counts = Counts {
            total: entries.len(),
            ..Counts::default()
        };
        for meta in entries {
            match meta.generation_status {
                Some(GenerationStatus::Pending) => counts.pending += 1,
                Some(GenerationStatus::Completed) => counts.completed += 1,
                Some(GenerationStatus::Failed) => counts.failed += 1,
                None => {}
            }
        }
        counts
    }
}

/// Show status information
pub async fn show(store: &Store, output: &Output) -> Result<()> {
    let config = store.config();
    let entries = store.list().fetch_all().await?;
    let counts = Counts::from_entries(&entries);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "backend": store.backend(),
                    "backends": store.factory().backends(),
                    "data_dir": config.data_dir,
                    "database": config.sqlite_path(),
                    "counts": {
                        "total": counts.total,
                        "pending": counts.pending,
                        "completed": counts.completed,
                        "failed": counts.failed
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", counts.total);
        }
        OutputFormat::Human => {
            println!("SAM Status");
            println!("==========");
            println!();
            println!("Storage:");
            println!("  Backend:   {}", store.backend());
            println!("  Available: {}", store.factory().backends().join(", "));
            println!("  Location:  {}", config.data_dir.display());
            if store.backend() == sam_core::storage::SQLITE_BACKEND {
                println!("  Database:  {}", config.sqlite_path().display());
            }
            println!();
            println!("Contents:");
            println!("  SAMs:      {}", counts.total);
            println!("  Pending:   {}", counts.pending);
            println!("  Completed: {}", counts.completed);
            println!("  Failed:    {}", counts.failed);
        }
    }

    Ok(())
}

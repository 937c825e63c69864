//! SAM document command handlers

use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use sam_core::{GenerationStatus, NewSam, SamPatch, Store};

use crate::output::Output;

/// Field values for `create`
pub struct CreateArgs {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<GenerationStatus>,
    pub body: Option<String>,
}

/// Field values for `update`. Empty strings and "none" clear a field.
pub struct UpdateArgs {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub body: Option<String>,
}

/// List metadata for every stored SAM
pub async fn list(store: &Store, output: &Output) -> Result<()> {
    let entries = store
        .list()
        .fetch_all()
        .await
        .context("Failed to list SAMs")?;

    output.print_list(&entries);
    Ok(())
}

/// Create a new SAM
pub async fn create(store: &Store, args: CreateArgs, output: &Output) -> Result<()> {
    let mut new = NewSam {
        name: args.name,
        description: args.description,
        generation_status: args.status,
        ..NewSam::default()
    };
    if let Some(ref body) = args.body {
        new.body = parse_body(body)?;
    }

    let meta = store
        .list()
        .create_entry(new)
        .await
        .context("Failed to create SAM")?;

    let doc = store.current().load(&meta.key).await?;

    output.success(&format!("Created SAM: {}", meta.key));
    output.print_sam(&doc);
    Ok(())
}

/// Show a single SAM
pub async fn show(store: &Store, key: String, output: &Output) -> Result<()> {
    let doc = store.current().load(&key).await?;
    output.print_sam(&doc);
    Ok(())
}

/// Update fields of an existing SAM
pub async fn update(store: &Store, key: String, args: UpdateArgs, output: &Output) -> Result<()> {
    let patch = build_patch(&key, args)?;
    if patch.is_empty() {
        bail!("Nothing to update. Pass at least one of --name, --description, --status, --body");
    }

    let doc = store.current().save(patch).await?;

    output.success(&format!("Updated SAM: {}", doc.key));
    output.print_sam(&doc);
    Ok(())
}

/// Delete a SAM
pub async fn delete(store: &Store, key: String, yes: bool, output: &Output) -> Result<()> {
    if output.should_prompt() && !yes && !confirm(&format!("Delete SAM {}?", key))? {
        output.message("Cancelled.");
        return Ok(());
    }

    store.list().drop_entry(&key).await?;

    output.success(&format!("Deleted SAM: {}", key));
    Ok(())
}

fn build_patch(key: &str, args: UpdateArgs) -> Result<SamPatch> {
    let mut patch = SamPatch::new(key);

    if let Some(name) = args.name {
        patch = patch.name(clearable(name));
    }
    if let Some(description) = args.description {
        patch = patch.description(clearable(description));
    }
    if let Some(status) = args.status {
        let status = match clearable(status) {
            Some(s) => Some(s.parse::<GenerationStatus>()?),
            None => None,
        };
        patch = patch.generation_status(status);
    }
    if let Some(body) = args.body {
        patch = patch.body(parse_body(&body)?);
    }

    Ok(patch)
}

/// Map "" and "none" to a cleared value
fn clearable(value: String) -> Option<String> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value)
    }
}

/// Parse a body given inline as JSON or as `@path` to a JSON file
fn parse_body(arg: &str) -> Result<Value> {
    match arg.strip_prefix('@') {
        Some(path) => {
            let path = Path::new(path);
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read body file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Body file is not valid JSON: {}", path.display()))
        }
        None => serde_json::from_str(arg).context("Body is not valid JSON"),
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_inline_body() {
        assert_eq!(
            parse_body(r#"{"accounts": ["a", "b"]}"#).unwrap(),
            json!({"accounts": ["a", "b"]})
        );
        assert!(parse_body("{not json").is_err());
    }

    #[test]
    fn test_parse_body_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("body.json");
        std::fs::write(&path, r#"{"cells": [[1, 2], [3, 4]]}"#).unwrap();

        let body = parse_body(&format!("@{}", path.display())).unwrap();
        assert_eq!(body, json!({"cells": [[1, 2], [3, 4]]}));

        let missing = temp_dir.path().join("missing.json");
        assert!(parse_body(&format!("@{}", missing.display())).is_err());
    }

    #[test]
    fn test_build_patch_sets_and_clears() {
        let patch = build_patch(
            "k1",
            UpdateArgs {
                name: Some("Base 2020 Revised".to_string()),
                description: Some("none".to_string()),
                status: Some("completed".to_string()),
                body: None,
            },
        )
        .unwrap();

        assert_eq!(patch.key, "k1");
        assert_eq!(patch.name, Some(Some("Base 2020 Revised".to_string())));
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.generation_status, Some(Some(GenerationStatus::Completed)));
        assert_eq!(patch.body, None);
    }

    #[test]
    fn test_build_patch_rejects_bad_status() {
        let result = build_patch(
            "k1",
            UpdateArgs {
                name: None,
                description: None,
                status: Some("running".to_string()),
                body: None,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_update_is_empty_patch() {
        let patch = build_patch(
            "k1",
            UpdateArgs {
                name: None,
                description: None,
                status: None,
                body: None,
            },
        )
        .unwrap();
        assert!(patch.is_empty());
    }
}

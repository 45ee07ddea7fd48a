use anyhow::{Context, Result};
use std::path::Path;

use super::Store;
use super::helpers::print_json;

/// Write the full export document to `output`, or stdout when absent.
pub(crate) fn cmd_export(store: &Store, output: Option<&Path>, json: bool) -> Result<()> {
    let data = store.export();
    let Some(path) = output else {
        return print_json(&data);
    };

    let text = serde_json::to_string_pretty(&data)?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write export file: {}", path.display()))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "path": path.display().to_string(),
                "recipes": data.recipes.len(),
                "history": data.history.len(),
            })
        );
    } else {
        let recipes = data.recipes.len();
        println!("Exported {recipes} recipes to {}", path.display());
    }
    Ok(())
}

pub(crate) fn cmd_import(store: &mut Store, file: &Path, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read import file: {}", file.display()))?;
    let summary = store.import_json(&text)?;

    if json {
        return print_json(&summary);
    }

    let added = summary.recipes_added;
    let replaced = summary.recipes_replaced;
    println!("Imported recipes: {added} added, {replaced} replaced");
    if summary.history_imported > 0 {
        println!("  History: {} entries", summary.history_imported);
    }
    if summary.profile_imported {
        println!("  Profile restored");
    }
    if summary.settings_imported {
        println!("  Settings restored");
    }
    Ok(())
}

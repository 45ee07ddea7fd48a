use anyhow::{Result, bail};

use cookbook_core::generate::{GeneratedRecipe, GenerationRequest, generate_recipe};

use crate::config::{Config, mask_key};
use crate::generation::GenerationClient;

use super::Store;
use super::helpers::print_json;

const NO_KEY_MESSAGE: &str = "No API key configured. Set GEMINI_API_KEY or OPENAI_API_KEY, or run: cookbook key set <key>";

pub(crate) async fn cmd_generate(
    store: &mut Store,
    config: &Config,
    request: &GenerationRequest,
    save: bool,
    json: bool,
) -> Result<()> {
    let Some(client) = GenerationClient::from_config(config)? else {
        bail!(NO_KEY_MESSAGE);
    };
    if !json {
        eprintln!(
            "Generating recipe with {}...",
            client.provider().name()
        );
    }

    let generated = generate_recipe(&client, request).await?;

    if save {
        let recipe = store.save_generated(generated)?;
        if json {
            return print_json(&recipe);
        }
        println!("Saved recipe: {} (id: {})", recipe.title, recipe.id);
        return Ok(());
    }

    if json {
        return print_json(&generated);
    }
    print_preview(&generated);
    println!("\nRun again with --save to keep it.");
    Ok(())
}

fn print_preview(recipe: &GeneratedRecipe) {
    println!("=== {} ===", recipe.title);
    if !recipe.description.is_empty() {
        println!("  {}", recipe.description);
    }
    println!(
        "  Meal: {}  |  Difficulty: {}  |  Prep: {} min  |  Cook: {} min  |  Serves: {}",
        recipe.meal_type, recipe.difficulty, recipe.prep_time, recipe.cook_time, recipe.servings
    );

    println!("\n  INGREDIENTS:");
    for ingredient in &recipe.ingredients {
        println!("    - {ingredient}");
    }

    println!("\n  INSTRUCTIONS:");
    for line in recipe.instructions.lines().filter(|l| !l.trim().is_empty()) {
        println!("    {}", line.trim());
    }

    if let Some(calories) = recipe.calories {
        let p = recipe.protein.unwrap_or(0);
        let c = recipe.carbs.unwrap_or(0);
        let f = recipe.fat.unwrap_or(0);
        println!("\n  {calories} kcal | P:{p}g C:{c}g F:{f}g");
    }
}

pub(crate) fn cmd_key_set(config: &Config, key: &str, json: bool) -> Result<()> {
    config.save_generation_key(key)?;
    if json {
        println!("{}", serde_json::json!({ "saved": true }));
    } else {
        println!("Gemini API key saved to {}", config.data_dir.display());
    }
    Ok(())
}

pub(crate) fn cmd_key_show(config: &Config, json: bool) -> Result<()> {
    let from_env = ["GEMINI_API_KEY", "OPENAI_API_KEY"]
        .into_iter()
        .find_map(|var| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| (var, v))
        });
    let saved = config.load_generation_key()?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "saved": saved.as_deref().map(mask_key),
                "env": from_env.as_ref().map(|(var, _)| *var),
            })
        );
        return Ok(());
    }

    match &saved {
        Some(key) => println!("Saved key: {}", mask_key(key)),
        None => println!("No saved key"),
    }
    if let Some((var, value)) = &from_env {
        println!("{var} is set: {}", mask_key(value.trim()));
    }
    Ok(())
}

pub(crate) fn cmd_key_clear(config: &Config, json: bool) -> Result<()> {
    let removed = config.clear_generation_key()?;
    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else if removed {
        println!("Saved API key removed");
    } else {
        println!("No saved key");
    }
    Ok(())
}

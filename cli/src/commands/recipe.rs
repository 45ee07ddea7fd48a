use anyhow::{Result, bail};

use cookbook_core::models::{Recipe, RecipeInput, RecipePatch, SortOrder};

use super::Store;
use super::helpers::{
    format_timestamp, or_not_found, print_json, print_recipe_table, require_recipe,
    short_id, stars,
};

pub(crate) fn cmd_recipe_add(store: &mut Store, input: RecipeInput, json: bool) -> Result<()> {
    let recipe = store.create(input)?;
    if json {
        print_json(&recipe)?;
    } else {
        let title = &recipe.title;
        let id = &recipe.id;
        println!("Added recipe: {title} (id: {id})");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_edit(
    store: &mut Store,
    reference: &str,
    patch: RecipePatch,
    json: bool,
) -> Result<()> {
    if patch.is_empty() {
        bail!("Nothing to update. Pass at least one field, e.g. --title or --prep-time");
    }
    let id = require_recipe(store, reference, json)?;
    let recipe = or_not_found(store.patch(&id, patch), json)?;
    if json {
        print_json(&recipe)?;
    } else {
        println!("Updated recipe: {}", recipe.title);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_delete(store: &mut Store, reference: &str, json: bool) -> Result<()> {
    let id = require_recipe(store, reference, json)?;
    let title = store.get(&id)?.title;
    store.delete(&id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted recipe: {title}");
    }
    Ok(())
}

/// Show a recipe. Viewing counts: the view counter and history are updated.
pub(crate) fn cmd_recipe_show(store: &mut Store, reference: &str, json: bool) -> Result<()> {
    let id = require_recipe(store, reference, json)?;
    let recipe = or_not_found(store.record_view(&id), json)?;

    if json {
        return print_json(&recipe);
    }
    print_recipe_detail(&recipe);
    Ok(())
}

fn print_recipe_detail(recipe: &Recipe) {
    let title = &recipe.title;
    println!("=== {title} ===");
    if !recipe.description.is_empty() {
        println!("  {}", recipe.description);
    }
    println!();

    let mut facts = Vec::new();
    if !recipe.meal_type.is_empty() {
        facts.push(format!("Meal: {}", recipe.meal_type));
    }
    if !recipe.difficulty.is_empty() {
        facts.push(format!("Difficulty: {}", recipe.difficulty));
    }
    if recipe.prep_time > 0 {
        facts.push(format!("Prep: {} min", recipe.prep_time));
    }
    if recipe.cook_time > 0 {
        facts.push(format!("Cook: {} min", recipe.cook_time));
    }
    if recipe.servings > 0 {
        facts.push(format!("Serves: {}", recipe.servings));
    }
    if !facts.is_empty() {
        println!("  {}", facts.join("  |  "));
    }
    let fav = if recipe.favorite { "  ♥ favorite" } else { "" };
    println!(
        "  Rating: {}  |  Views: {}{fav}",
        stars(recipe.rating),
        recipe.views
    );

    if !recipe.ingredients.is_empty() {
        println!("\n  INGREDIENTS:");
        for ingredient in &recipe.ingredients {
            println!("    - {ingredient}");
        }
    }

    println!("\n  INSTRUCTIONS:");
    for (i, step) in recipe
        .instructions
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .enumerate()
    {
        println!("    {}. {step}", i + 1);
    }

    let nutrition: Vec<String> = [
        ("kcal", recipe.calories),
        ("P", recipe.protein),
        ("C", recipe.carbs),
        ("F", recipe.fat),
    ]
    .into_iter()
    .filter_map(|(label, v)| {
        v.map(|v| {
            if label == "kcal" {
                format!("{v} kcal")
            } else {
                format!("{label}:{v}g")
            }
        })
    })
    .collect();
    if !nutrition.is_empty() {
        println!("\n  NUTRITION (per serving):");
        println!("    {}", nutrition.join(" "));
    }

    if recipe.image.is_some() {
        println!("\n  Has image");
    }
    println!(
        "\n  id: {}  |  added {}",
        recipe.id,
        format_timestamp(recipe.created_at)
    );
}

pub(crate) fn cmd_recipe_list(
    store: &Store,
    meal: &str,
    sort: SortOrder,
    json: bool,
) -> Result<()> {
    let recipes = store.search_sorted("", meal, sort);
    print_recipes(&recipes, "No recipes yet. Add one with: cookbook recipe add", json)
}

pub(crate) fn cmd_recipe_search(
    store: &Store,
    query: &str,
    meal: &str,
    sort: Option<SortOrder>,
    json: bool,
) -> Result<()> {
    let recipes = match sort {
        Some(order) => store.search_sorted(query, meal, order),
        None => store.search(query, meal),
    };
    print_recipes(&recipes, &format!("No recipes match '{query}'"), json)
}

pub(crate) fn cmd_favorites(store: &Store, json: bool) -> Result<()> {
    let recipes = store.favorites();
    print_recipes(
        &recipes,
        "No favorites yet. Mark one with: cookbook recipe favorite <recipe>",
        json,
    )
}

fn print_recipes(recipes: &[Recipe], empty_message: &str, json: bool) -> Result<()> {
    if json {
        return print_json(recipes);
    }
    if recipes.is_empty() {
        println!("{empty_message}");
        return Ok(());
    }
    print_recipe_table(recipes);
    Ok(())
}

pub(crate) fn cmd_recipe_favorite(store: &mut Store, reference: &str, json: bool) -> Result<()> {
    let id = require_recipe(store, reference, json)?;
    let recipe = or_not_found(store.toggle_favorite(&id), json)?;
    if json {
        print_json(&recipe)?;
    } else if recipe.favorite {
        println!("Added {} to favorites", recipe.title);
    } else {
        println!("Removed {} from favorites", recipe.title);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_rate(
    store: &mut Store,
    reference: &str,
    rating: i64,
    json: bool,
) -> Result<()> {
    let id = require_recipe(store, reference, json)?;
    let recipe = or_not_found(store.set_rating(&id, rating), json)?;
    if json {
        print_json(&recipe)?;
    } else {
        println!(
            "Rated {} {} ({})",
            recipe.title,
            stars(recipe.rating),
            short_id(&recipe.id)
        );
    }
    Ok(())
}

pub(crate) fn cmd_recipe_seed(store: &mut Store, json: bool) -> Result<()> {
    let added = store.seed_samples()?;
    if json {
        println!("{}", serde_json::json!({ "added": added }));
    } else if added == 0 {
        println!("Sample recipes are only added to an empty collection");
    } else {
        println!("Added {added} sample recipes");
    }
    Ok(())
}

use anyhow::{Result, bail};
use chrono::{Local, TimeZone};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use cookbook_core::StoreError;
use cookbook_core::models::{HistoryEntry, Recipe};

use super::Store;

/// Find a recipe by exact id, falling back to a case-insensitive title match.
pub(crate) fn resolve_recipe(store: &Store, reference: &str) -> Result<Option<String>> {
    if let Some(recipe) = store.find(reference) {
        return Ok(Some(recipe.id.clone()));
    }

    let needle = reference.trim().to_lowercase();
    let matches: Vec<&Recipe> = store
        .recipes()
        .iter()
        .filter(|r| r.title.to_lowercase() == needle)
        .collect();

    match matches.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(only.id.clone())),
        _ => bail!(
            "{} recipes are titled '{reference}'. Use the recipe id instead",
            matches.len()
        ),
    }
}

/// Resolve or exit with status 2, like every other not-found path.
pub(crate) fn require_recipe(store: &Store, reference: &str, json: bool) -> Result<String> {
    match resolve_recipe(store, reference)? {
        Some(id) => Ok(id),
        None => not_found(&format!("Recipe '{reference}' not found"), json),
    }
}

pub(crate) fn not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

/// Map a `NotFound` store error onto the exit-2 path; everything else propagates.
pub(crate) fn or_not_found<T>(result: cookbook_core::Result<T>, json: bool) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e @ StoreError::NotFound(_)) => not_found(&e.to_string(), json),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn print_recipe_table(recipes: &[Recipe]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Meal")]
        meal_type: String,
        #[tabled(rename = "Difficulty")]
        difficulty: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Rating")]
        rating: String,
        #[tabled(rename = "Fav")]
        favorite: String,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: short_id(&r.id),
            title: truncate(&r.title, 35),
            meal_type: or_dash(&r.meal_type),
            difficulty: or_dash(&r.difficulty),
            time: match r.total_time() {
                0 => "-".into(),
                t => format!("{t} min"),
            },
            rating: stars(r.rating),
            favorite: if r.favorite { "♥".into() } else { String::new() },
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_history_table(history: &[HistoryEntry]) {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Viewed")]
        viewed_at: String,
        #[tabled(rename = "Recipe")]
        title: String,
        #[tabled(rename = "ID")]
        id: String,
    }

    let rows: Vec<HistoryRow> = history
        .iter()
        .map(|h| HistoryRow {
            viewed_at: format_timestamp(h.viewed_at),
            title: truncate(&h.recipe_title, 40),
            id: short_id(&h.recipe_id),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Epoch milliseconds as a local date and time.
pub(crate) fn format_timestamp(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

pub(crate) fn stars(rating: u8) -> String {
    if rating == 0 {
        return "-".into();
    }
    let filled = usize::from(rating.min(5));
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

pub(crate) fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn or_dash(s: &str) -> String {
    if s.is_empty() { "-".into() } else { s.to_string() }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cookbook_core::db::Database;
    use cookbook_core::models::RecipeInput;
    use cookbook_core::store::RecipeStore;

    fn store_with(titles: &[&str]) -> Store {
        let mut store = RecipeStore::open(Database::open_in_memory().unwrap()).unwrap();
        for title in titles {
            store
                .create(RecipeInput {
                    title: (*title).to_string(),
                    instructions: "Cook.".into(),
                    ..RecipeInput::default()
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn test_resolve_by_id_and_title() {
        let store = store_with(&["Pancakes", "Pasta"]);
        let id = store.recipes()[1].id.clone();
        assert_eq!(resolve_recipe(&store, &id).unwrap(), Some(id.clone()));
        assert_eq!(resolve_recipe(&store, "pasta").unwrap(), Some(id));
        assert_eq!(resolve_recipe(&store, "Soup").unwrap(), None);
    }

    #[test]
    fn test_resolve_ambiguous_title() {
        let store = store_with(&["Soup", "soup"]);
        assert!(resolve_recipe(&store, "SOUP").is_err());
    }

    #[test]
    fn test_stars() {
        assert_eq!(stars(0), "-");
        assert_eq!(stars(3), "★★★☆☆");
        assert_eq!(stars(5), "★★★★★");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("nope"), r#"{"error":"nope"}"#);
        assert_eq!(json_error("say \"hi\""), r#"{"error":"say \"hi\""}"#);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème brûlée tart", 10), "Crème b...");
        assert_eq!(truncate("Müsli", 10), "Müsli");
    }
}

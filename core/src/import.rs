//! Reconciling an external recipe collection with the stored one.
//!
//! Two input shapes are accepted: the wrapped export object written by
//! `RecipeStore::export` and a bare array of recipes from older exports.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::models::{
    HISTORY_LIMIT, HistoryEntry, Recipe, SettingsPatch, UserProfile, new_recipe_id,
};

const WRAPPED_KEYS: &[&str] = &["recipes", "user", "history", "settings", "exportDate"];

/// A parsed import document, normalized but not yet merged.
#[derive(Debug, Clone, Default)]
pub struct ImportPayload {
    pub recipes: Vec<Recipe>,
    /// Replaces the stored profile when present.
    pub user: Option<UserProfile>,
    /// Replaces the stored history when present.
    pub history: Option<Vec<HistoryEntry>>,
    /// Merged field by field over the stored settings when present.
    pub settings: Option<SettingsPatch>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileCounts {
    pub replaced: usize,
    pub added: usize,
}

pub fn parse_import(text: &str) -> Result<ImportPayload> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| StoreError::import_format(format!("not valid JSON: {e}")))?;

    match value {
        Value::Array(entries) => Ok(ImportPayload {
            recipes: parse_recipe_entries(entries)?,
            ..ImportPayload::default()
        }),
        Value::Object(map) => parse_wrapped(map),
        _ => Err(StoreError::import_format(
            "expected an export object or an array of recipes",
        )),
    }
}

fn parse_wrapped(mut map: Map<String, Value>) -> Result<ImportPayload> {
    if !WRAPPED_KEYS.iter().any(|k| map.contains_key(*k)) {
        return Err(StoreError::import_format(
            "object has none of the fields recipes, user, history, settings",
        ));
    }

    let recipes = match map.remove("recipes") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => parse_recipe_entries(entries)?,
        Some(_) => return Err(StoreError::import_format("'recipes' must be an array")),
    };

    let user = match map.remove("user") {
        Some(value @ Value::Object(_)) => serde_json::from_value::<UserProfile>(value).ok(),
        _ => None,
    };

    let history = match map.remove("history") {
        Some(Value::Array(entries)) => Some(
            entries
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|e| serde_json::from_value::<HistoryEntry>(e).ok())
                .take(HISTORY_LIMIT)
                .collect(),
        ),
        _ => None,
    };

    let settings = match map.remove("settings") {
        Some(Value::Object(obj)) => Some(SettingsPatch {
            dark_mode: obj.get("darkMode").and_then(Value::as_bool),
            notifications: obj.get("notifications").and_then(Value::as_bool),
        }),
        _ => None,
    };

    Ok(ImportPayload {
        recipes,
        user,
        history,
        settings,
    })
}

fn parse_recipe_entries(entries: Vec<Value>) -> Result<Vec<Recipe>> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let has_text = |field: &str| {
                entry
                    .get(field)
                    .and_then(Value::as_str)
                    .is_some_and(|t| !t.trim().is_empty())
            };
            if !entry.is_object() || !has_text("title") || !has_text("instructions") {
                return Err(StoreError::import_format(format!(
                    "recipe entry {index} is not an object with a title and instructions"
                )));
            }
            serde_json::from_value::<Recipe>(entry).map_err(|e| {
                StoreError::import_format(format!("recipe entry {index} is malformed: {e}"))
            })
        })
        .collect()
}

/// Merge `imported` into `existing` by id.
///
/// A matching id replaces the stored record in place. Records without an id
/// get a fresh one and are appended; records whose id matches nothing keep
/// it and are appended. Untouched records keep their order.
#[must_use]
pub fn reconcile(existing: &[Recipe], imported: Vec<Recipe>) -> (Vec<Recipe>, ReconcileCounts) {
    let mut merged = existing.to_vec();
    let mut counts = ReconcileCounts::default();

    for mut recipe in imported {
        if recipe.id.is_empty() {
            recipe.id = new_recipe_id();
        } else if let Some(slot) = merged.iter_mut().find(|r| r.id == recipe.id) {
            debug!(id = %recipe.id, "import replaces existing recipe");
            *slot = recipe;
            counts.replaced += 1;
            continue;
        }
        merged.push(recipe);
        counts.added += 1;
    }

    (merged, counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecipeInput;

    fn recipe(id: &str, title: &str) -> Recipe {
        RecipeInput {
            title: title.to_string(),
            instructions: "Cook.".to_string(),
            ..RecipeInput::default()
        }
        .into_recipe(id.to_string(), 1_000)
    }

    #[test]
    fn test_parse_legacy_array() {
        let payload = parse_import(
            r#"[{"id":"a","title":"Tea","instructions":"Steep."},
                {"title":"Toast","instructions":"Toast."}]"#,
        )
        .unwrap();
        assert_eq!(payload.recipes.len(), 2);
        assert_eq!(payload.recipes[0].id, "a");
        assert!(payload.recipes[1].id.is_empty());
        assert!(payload.user.is_none());
        assert!(payload.history.is_none());
        assert!(payload.settings.is_none());
    }

    #[test]
    fn test_parse_wrapped_export() {
        let text = r#"{
            "recipes": [{"id":"a","title":"Tea","instructions":"Steep.","prepTime":"5"}],
            "user": {"name":"Ada","email":"ada@example.com","bio":"","createdAt":5},
            "history": [{"recipeId":"a","recipeTitle":"Tea","viewedAt":7}, 3],
            "settings": {"notifications": true},
            "exportDate": 1700000000000
        }"#;
        let payload = parse_import(text).unwrap();

        assert_eq!(payload.recipes[0].prep_time, 5);
        assert_eq!(payload.user.unwrap().name, "Ada");
        let history = payload.history.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].viewed_at, 7);
        let settings = payload.settings.unwrap();
        assert_eq!(settings.notifications, Some(true));
        assert_eq!(settings.dark_mode, None);
    }

    #[test]
    fn test_parse_wrapped_null_user_is_ignored() {
        let payload = parse_import(r#"{"recipes":[],"user":null}"#).unwrap();
        assert!(payload.recipes.is_empty());
        assert!(payload.user.is_none());
    }

    #[test]
    fn test_parse_history_is_capped() {
        let entries: Vec<String> = (0..60)
            .map(|i| format!(r#"{{"recipeId":"r{i}","recipeTitle":"T","viewedAt":{}}}"#, i + 1))
            .collect();
        let text = format!(r#"{{"history":[{}]}}"#, entries.join(","));
        let history = parse_import(&text).unwrap().history.unwrap();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].recipe_id, "r0");
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for text in [
            "not json",
            "42",
            r#""text""#,
            r#"{"foo":1}"#,
            r#"{"recipes":"nope"}"#,
            r#"[1, 2]"#,
            r#"[{"name":"no title"}]"#,
            r#"[{"title":5}]"#,
            r#"[{"title":"   ","instructions":"Stir."}]"#,
            r#"[{"title":"Soup"}]"#,
            r#"[{"title":"Soup","instructions":"  "}]"#,
        ] {
            let result = parse_import(text);
            assert!(
                matches!(result, Err(StoreError::ImportFormat(_))),
                "expected format error for {text}"
            );
        }
    }

    #[test]
    fn test_reconcile_replaces_matching_ids_in_place() {
        let existing = vec![recipe("a", "Tea"), recipe("b", "Toast")];
        let (merged, counts) = reconcile(&existing, vec![recipe("a", "Green Tea")]);

        assert_eq!(counts, ReconcileCounts { replaced: 1, added: 0 });
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, "a");
        assert_eq!(merged[0].title, "Green Tea");
        assert_eq!(merged[1].title, "Toast");
    }

    #[test]
    fn test_reconcile_assigns_fresh_id_when_missing() {
        let existing = vec![recipe("a", "Tea")];
        let (merged, counts) = reconcile(&existing, vec![recipe("", "Soup")]);

        assert_eq!(counts, ReconcileCounts { replaced: 0, added: 1 });
        assert_eq!(merged.len(), 2);
        assert!(!merged[1].id.is_empty());
        assert_ne!(merged[1].id, "a");
    }

    #[test]
    fn test_reconcile_keeps_unmatched_ids() {
        let (merged, counts) = reconcile(&[], vec![recipe("x", "Tea"), recipe("y", "Toast")]);
        assert_eq!(counts.added, 2);
        let ids: Vec<&str> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[test]
    fn test_reconcile_duplicate_ids_stay_unique() {
        let (merged, counts) = reconcile(&[], vec![recipe("x", "First"), recipe("x", "Second")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "Second");
        assert_eq!(counts, ReconcileCounts { replaced: 1, added: 1 });
    }
}

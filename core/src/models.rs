use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Maximum number of entries kept in the view history log.
pub const HISTORY_LIMIT: usize = 50;

pub const MAX_RATING: u8 = 5;

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack", "dessert"];

pub const DIFFICULTIES: &[&str] = &["easy", "medium", "hard"];

/// Meal type filter value that disables tag filtering in searches.
pub const ALL_MEAL_TYPES: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub meal_type: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub difficulty: String,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub prep_time: u32,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub cook_time: u32,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub servings: u32,
    #[serde(default, deserialize_with = "text_lines")]
    pub ingredients: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub instructions: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub calories: Option<u32>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub protein: Option<u32>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub carbs: Option<u32>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub fat: Option<u32>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub favorite: bool,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: u8,
    #[serde(default, deserialize_with = "lenient_views")]
    pub views: u64,
    #[serde(default = "now_millis", deserialize_with = "lenient_timestamp")]
    pub created_at: i64,
}

impl Recipe {
    /// Text searched by free-text queries: title, description, ingredients
    /// and instructions, lowercased.
    #[must_use]
    pub fn search_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.title,
            self.description,
            self.ingredients.join(" "),
            self.instructions
        )
        .to_lowercase()
    }

    #[must_use]
    pub fn total_time(&self) -> u32 {
        self.prep_time.saturating_add(self.cook_time)
    }
}

/// Caller-supplied fields for create and full update.
///
/// `favorite`, `rating` and `views` are overrides: when `None` an update
/// keeps the stored values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeInput {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub meal_type: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub difficulty: String,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub prep_time: u32,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub cook_time: u32,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub servings: u32,
    #[serde(default, deserialize_with = "text_lines")]
    pub ingredients: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub instructions: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub calories: Option<u32>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub protein: Option<u32>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub carbs: Option<u32>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub fat: Option<u32>,
    #[serde(default)]
    pub favorite: Option<bool>,
    #[serde(default, deserialize_with = "optional_int")]
    pub rating: Option<i64>,
    #[serde(default)]
    pub views: Option<u64>,
}

impl RecipeInput {
    pub fn validate(&self) -> Result<()> {
        validate_required(&self.title, &self.instructions)?;
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        Ok(())
    }

    /// Build the stored record. Required text is trimmed; engagement fields
    /// come from the overrides or their defaults.
    #[must_use]
    pub fn into_recipe(self, id: String, created_at: i64) -> Recipe {
        Recipe {
            id,
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            meal_type: self.meal_type.trim().to_string(),
            difficulty: self.difficulty.trim().to_string(),
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            servings: self.servings,
            ingredients: clean_lines(self.ingredients),
            instructions: self.instructions.trim().to_string(),
            image: self.image.filter(|i| !i.is_empty()),
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
            favorite: self.favorite.unwrap_or(false),
            rating: self
                .rating
                .and_then(|r| validate_rating(r).ok())
                .unwrap_or(0),
            views: self.views.unwrap_or(0),
            created_at,
        }
    }
}

/// Partial update: only the fields that are present change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::option_option)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub meal_type: Option<String>,
    pub difficulty: Option<String>,
    #[serde(default, deserialize_with = "some_count")]
    pub prep_time: Option<u32>,
    #[serde(default, deserialize_with = "some_count")]
    pub cook_time: Option<u32>,
    #[serde(default, deserialize_with = "some_count")]
    pub servings: Option<u32>,
    #[serde(default, deserialize_with = "some_lines")]
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<String>,
    #[serde(default, deserialize_with = "some_optional_text")]
    pub image: Option<Option<String>>,
    #[serde(default, deserialize_with = "some_amount")]
    pub calories: Option<Option<u32>>,
    #[serde(default, deserialize_with = "some_amount")]
    pub protein: Option<Option<u32>>,
    #[serde(default, deserialize_with = "some_amount")]
    pub carbs: Option<Option<u32>>,
    #[serde(default, deserialize_with = "some_amount")]
    pub fat: Option<Option<u32>>,
}

impl RecipePatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.meal_type.is_none()
            && self.difficulty.is_none()
            && self.prep_time.is_none()
            && self.cook_time.is_none()
            && self.servings.is_none()
            && self.ingredients.is_none()
            && self.instructions.is_none()
            && self.image.is_none()
            && self.calories.is_none()
            && self.protein.is_none()
            && self.carbs.is_none()
            && self.fat.is_none()
    }

    /// Apply onto a copy of `recipe`. Engagement metadata, `id` and
    /// `created_at` are never touched.
    pub fn apply_to(self, recipe: &mut Recipe) {
        if let Some(title) = self.title {
            recipe.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            recipe.description = description.trim().to_string();
        }
        if let Some(meal_type) = self.meal_type {
            recipe.meal_type = meal_type.trim().to_string();
        }
        if let Some(difficulty) = self.difficulty {
            recipe.difficulty = difficulty.trim().to_string();
        }
        if let Some(prep_time) = self.prep_time {
            recipe.prep_time = prep_time;
        }
        if let Some(cook_time) = self.cook_time {
            recipe.cook_time = cook_time;
        }
        if let Some(servings) = self.servings {
            recipe.servings = servings;
        }
        if let Some(ingredients) = self.ingredients {
            recipe.ingredients = clean_lines(ingredients);
        }
        if let Some(instructions) = self.instructions {
            recipe.instructions = instructions.trim().to_string();
        }
        if let Some(image) = self.image {
            recipe.image = image.filter(|i| !i.is_empty());
        }
        if let Some(calories) = self.calories {
            recipe.calories = calories;
        }
        if let Some(protein) = self.protein {
            recipe.protein = protein;
        }
        if let Some(carbs) = self.carbs {
            recipe.carbs = carbs;
        }
        if let Some(fat) = self.fat {
            recipe.fat = fat;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default, deserialize_with = "lenient_text")]
    pub recipe_id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub recipe_title: String,
    #[serde(default = "now_millis", deserialize_with = "lenient_timestamp")]
    pub viewed_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub bio: String,
    #[serde(default = "now_millis", deserialize_with = "lenient_timestamp")]
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_dark_mode")]
    pub dark_mode: bool,
    #[serde(default)]
    pub notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dark_mode: true,
            notifications: false,
        }
    }
}

fn default_dark_mode() -> bool {
    true
}

/// Settings fields supplied by an import or a partial update.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default)]
    pub dark_mode: Option<bool>,
    #[serde(default)]
    pub notifications: Option<bool>,
}

impl Settings {
    #[must_use]
    pub fn merged(self, patch: SettingsPatch) -> Self {
        Self {
            dark_mode: patch.dark_mode.unwrap_or(self.dark_mode),
            notifications: patch.notifications.unwrap_or(self.notifications),
        }
    }
}

// --- Export / Import types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub recipes: Vec<Recipe>,
    pub user: Option<UserProfile>,
    pub history: Vec<HistoryEntry>,
    pub settings: Settings,
    pub export_date: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub recipes_replaced: usize,
    pub recipes_added: usize,
    pub history_imported: usize,
    pub profile_imported: bool,
    pub settings_imported: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStats {
    pub total: usize,
    pub favorites: usize,
    pub average_prep_time: u32,
    pub history_count: usize,
}

// --- Sorting ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    /// `created_at` descending.
    #[default]
    Newest,
    Oldest,
    /// Rating descending; unrated recipes sort last.
    Rating,
    /// Prep time ascending.
    PrepTime,
}

impl SortOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Rating => "rating",
            Self::PrepTime => "prepTime",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "" | "newest" | "recent" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "rating" => Ok(Self::Rating),
            "preptime" | "prep" => Ok(Self::PrepTime),
            _ => Err(format!(
                "Invalid sort order '{s}'. Must be one of: newest, oldest, rating, prepTime"
            )),
        }
    }
}

/// Sort in place. The sort is stable, so ties keep collection order.
pub fn sort_recipes(recipes: &mut [Recipe], order: SortOrder) {
    match order {
        SortOrder::Newest => recipes.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::Oldest => recipes.sort_by_key(|r| r.created_at),
        SortOrder::Rating => recipes.sort_by(|a, b| b.rating.cmp(&a.rating)),
        SortOrder::PrepTime => recipes.sort_by_key(|r| r.prep_time),
    }
}

// --- Validation ---

pub fn validate_required(title: &str, instructions: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(StoreError::validation("Recipe title must not be empty"));
    }
    if instructions.trim().is_empty() {
        return Err(StoreError::validation(
            "Recipe instructions must not be empty",
        ));
    }
    Ok(())
}

pub fn validate_rating(value: i64) -> Result<u8> {
    match u8::try_from(value) {
        Ok(rating) if rating <= MAX_RATING => Ok(rating),
        _ => Err(StoreError::validation(format!(
            "Rating must be between 0 and {MAX_RATING} (got {value})"
        ))),
    }
}

// --- Ids and time ---

#[must_use]
pub fn new_recipe_id() -> String {
    Uuid::new_v4().to_string()
}

#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// --- Lenient decoding ---
//
// Persisted and imported documents are loosely typed. These deserializers
// coerce whatever is stored into the domain's types instead of rejecting the
// whole document.

/// Integer coercion with `parseInt` semantics: numbers truncate, strings
/// parse their leading integer, everything else is `None`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => parse_leading_int(s),
        _ => None,
    }
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Non-negative integer coercion; negative or unparsable values are `None`.
#[must_use]
pub fn coerce_count(value: &Value) -> Option<u32> {
    coerce_int(value).and_then(|n| u32::try_from(n).ok())
}

pub(crate) fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

pub(crate) fn optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

fn some_optional_text<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    optional_text(deserializer).map(Some)
}

pub(crate) fn count_or_zero<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(coerce_count(&Value::deserialize(deserializer)?).unwrap_or(0))
}

fn some_count<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    count_or_zero(deserializer).map(Some)
}

fn optional_int<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(coerce_int(&Value::deserialize(deserializer)?))
}

pub(crate) fn optional_amount<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(coerce_count(&Value::deserialize(deserializer)?))
}

#[allow(clippy::option_option)]
fn some_amount<'de, D>(deserializer: D) -> std::result::Result<Option<Option<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    optional_amount(deserializer).map(Some)
}

/// A list of lines, given either as an array or as one newline-separated string.
pub(crate) fn text_lines<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn some_lines<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    text_lines(deserializer).map(Some)
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    })
}

#[allow(clippy::cast_sign_loss)]
fn lenient_rating<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let rating = coerce_int(&Value::deserialize(deserializer)?).unwrap_or(0);
    Ok(rating.clamp(0, i64::from(MAX_RATING)) as u8)
}

#[allow(clippy::cast_sign_loss)]
fn lenient_views<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let views = coerce_int(&Value::deserialize(deserializer)?).unwrap_or(0);
    Ok(views.max(0) as u64)
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(coerce_int(&Value::deserialize(deserializer)?)
        .filter(|ts| *ts > 0)
        .unwrap_or_else(now_millis))
}

fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_recipe() -> Recipe {
        RecipeInput {
            title: "Tea".to_string(),
            instructions: "Boil water.".to_string(),
            ..RecipeInput::default()
        }
        .into_recipe("r1".to_string(), 1_000)
    }

    #[test]
    fn test_coerce_int_numbers_and_strings() {
        assert_eq!(coerce_int(&json!(12)), Some(12));
        assert_eq!(coerce_int(&json!(3.9)), Some(3));
        assert_eq!(coerce_int(&json!("15")), Some(15));
        assert_eq!(coerce_int(&json!("20 min")), Some(20));
        assert_eq!(coerce_int(&json!("  7")), Some(7));
        assert_eq!(coerce_int(&json!("-4")), Some(-4));
        assert_eq!(coerce_int(&json!("abc")), None);
        assert_eq!(coerce_int(&json!("")), None);
        assert_eq!(coerce_int(&json!(null)), None);
        assert_eq!(coerce_int(&json!(true)), None);
    }

    #[test]
    fn test_coerce_count_rejects_negative() {
        assert_eq!(coerce_count(&json!(-1)), None);
        assert_eq!(coerce_count(&json!("10")), Some(10));
    }

    #[test]
    fn test_recipe_normalizes_loose_json() {
        let recipe: Recipe = serde_json::from_value(json!({
            "id": "r_1",
            "title": "Soup",
            "prepTime": "10",
            "cookTime": null,
            "servings": "lots",
            "ingredients": ["water", 3, null],
            "instructions": "Boil.",
            "calories": "250",
            "protein": -5,
            "rating": 9,
            "views": -3,
            "createdAt": 1_700_000_000_000_i64
        }))
        .unwrap();

        assert_eq!(recipe.prep_time, 10);
        assert_eq!(recipe.cook_time, 0);
        assert_eq!(recipe.servings, 0);
        assert_eq!(recipe.ingredients, vec!["water", "3"]);
        assert_eq!(recipe.calories, Some(250));
        assert_eq!(recipe.protein, None);
        assert_eq!(recipe.carbs, None);
        assert_eq!(recipe.rating, 5);
        assert_eq!(recipe.views, 0);
        assert!(!recipe.favorite);
        assert_eq!(recipe.created_at, 1_700_000_000_000);
    }

    #[test]
    fn test_recipe_missing_fields_get_defaults() {
        let before = now_millis();
        let recipe: Recipe = serde_json::from_value(json!({ "title": "Bare" })).unwrap();
        assert!(recipe.id.is_empty());
        assert!(recipe.ingredients.is_empty());
        assert!(recipe.image.is_none());
        assert_eq!(recipe.rating, 0);
        assert!(recipe.created_at >= before);
    }

    #[test]
    fn test_recipe_serializes_camel_case() {
        let value = serde_json::to_value(sample_recipe()).unwrap();
        assert_eq!(value["prepTime"], 0);
        assert_eq!(value["createdAt"], 1_000);
        assert_eq!(value["mealType"], "");
        assert!(value["image"].is_null());
    }

    #[test]
    fn test_input_into_recipe_trims_and_defaults() {
        let recipe = RecipeInput {
            title: "  Tea ".to_string(),
            instructions: " Boil water. ".to_string(),
            ingredients: vec![" water ".to_string(), String::new(), "tea".to_string()],
            image: Some(String::new()),
            ..RecipeInput::default()
        }
        .into_recipe("id".to_string(), 5);

        assert_eq!(recipe.title, "Tea");
        assert_eq!(recipe.instructions, "Boil water.");
        assert_eq!(recipe.ingredients, vec!["water", "tea"]);
        assert!(recipe.image.is_none());
        assert!(!recipe.favorite);
        assert_eq!(recipe.rating, 0);
        assert_eq!(recipe.views, 0);
    }

    #[test]
    fn test_input_validation() {
        let mut input = RecipeInput {
            title: "Tea".to_string(),
            instructions: "Boil.".to_string(),
            ..RecipeInput::default()
        };
        assert!(input.validate().is_ok());

        input.title = "   ".to_string();
        assert!(matches!(input.validate(), Err(StoreError::Validation(_))));

        input.title = "Tea".to_string();
        input.instructions = String::new();
        assert!(matches!(input.validate(), Err(StoreError::Validation(_))));

        input.instructions = "Boil.".to_string();
        input.rating = Some(6);
        assert!(matches!(input.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_input_ingredients_from_multiline_text() {
        let input: RecipeInput = serde_json::from_value(json!({
            "title": "Pancakes",
            "instructions": "Mix.",
            "ingredients": "1 cup flour\n\n  2 eggs  \r\n"
        }))
        .unwrap();
        assert_eq!(input.ingredients, vec!["1 cup flour", "2 eggs"]);

        let patch: RecipePatch =
            serde_json::from_value(json!({ "ingredients": "salt\npepper" })).unwrap();
        assert_eq!(
            patch.ingredients,
            Some(vec!["salt".to_string(), "pepper".to_string()])
        );
    }

    #[test]
    fn test_input_rating_out_of_range_fails_validation() {
        for rating in [json!(-1), json!(300), json!("9")] {
            let input: RecipeInput = serde_json::from_value(json!({
                "title": "Tea",
                "instructions": "Boil.",
                "rating": rating
            }))
            .unwrap();
            assert!(matches!(input.validate(), Err(StoreError::Validation(_))));
        }

        let input: RecipeInput = serde_json::from_value(json!({
            "title": "Tea",
            "instructions": "Boil.",
            "rating": "4"
        }))
        .unwrap();
        assert!(input.validate().is_ok());
        assert_eq!(input.into_recipe("t".to_string(), 1).rating, 4);
    }

    #[test]
    fn test_validate_rating_range() {
        assert_eq!(validate_rating(0).unwrap(), 0);
        assert_eq!(validate_rating(5).unwrap(), 5);
        assert!(validate_rating(6).is_err());
        assert!(validate_rating(-1).is_err());
    }

    #[test]
    fn test_patch_only_touches_supplied_fields() {
        let mut recipe = sample_recipe();
        recipe.favorite = true;
        recipe.rating = 4;
        recipe.calories = Some(10);

        let patch: RecipePatch = serde_json::from_value(json!({
            "title": "Green Tea",
            "prepTime": "5",
            "calories": null
        }))
        .unwrap();
        assert!(!patch.is_empty());
        patch.apply_to(&mut recipe);

        assert_eq!(recipe.title, "Green Tea");
        assert_eq!(recipe.prep_time, 5);
        assert_eq!(recipe.calories, None);
        assert_eq!(recipe.instructions, "Boil water.");
        assert!(recipe.favorite);
        assert_eq!(recipe.rating, 4);
    }

    #[test]
    fn test_patch_image_absent_vs_null() {
        let absent: RecipePatch = serde_json::from_value(json!({})).unwrap();
        assert!(absent.image.is_none());
        assert!(absent.is_empty());

        let cleared: RecipePatch = serde_json::from_value(json!({ "image": null })).unwrap();
        assert_eq!(cleared.image, Some(None));
    }

    #[test]
    fn test_settings_defaults_and_merge() {
        let settings: Settings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.dark_mode);
        assert!(!settings.notifications);

        let merged = settings.merged(SettingsPatch {
            dark_mode: None,
            notifications: Some(true),
        });
        assert!(merged.dark_mode);
        assert!(merged.notifications);
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("newest".parse::<SortOrder>().unwrap(), SortOrder::Newest);
        assert_eq!("prepTime".parse::<SortOrder>().unwrap(), SortOrder::PrepTime);
        assert_eq!("prep-time".parse::<SortOrder>().unwrap(), SortOrder::PrepTime);
        assert_eq!("RATING".parse::<SortOrder>().unwrap(), SortOrder::Rating);
        assert!("alphabetical".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_sort_rating_puts_unrated_last() {
        let mut recipes: Vec<Recipe> = [(0_u8, "a"), (5, "b"), (0, "c"), (3, "d")]
            .into_iter()
            .map(|(rating, id)| {
                let mut r = sample_recipe();
                r.id = id.to_string();
                r.rating = rating;
                r
            })
            .collect();
        sort_recipes(&mut recipes, SortOrder::Rating);
        let ids: Vec<&str> = recipes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_sort_by_created_at() {
        let mut recipes: Vec<Recipe> = [(200, "mid"), (100, "old"), (300, "new")]
            .into_iter()
            .map(|(ts, id)| {
                let mut r = sample_recipe();
                r.id = id.to_string();
                r.created_at = ts;
                r
            })
            .collect();

        sort_recipes(&mut recipes, SortOrder::Newest);
        assert_eq!(recipes[0].id, "new");
        assert_eq!(recipes[2].id, "old");

        sort_recipes(&mut recipes, SortOrder::Oldest);
        assert_eq!(recipes[0].id, "old");
        assert_eq!(recipes[2].id, "new");
    }

    #[test]
    fn test_search_text_covers_all_fields() {
        let mut recipe = sample_recipe();
        recipe.description = "Calming".to_string();
        recipe.ingredients = vec!["Jasmine".to_string()];
        let text = recipe.search_text();
        assert!(text.contains("tea"));
        assert!(text.contains("calming"));
        assert!(text.contains("jasmine"));
        assert!(text.contains("boil water"));
    }
}

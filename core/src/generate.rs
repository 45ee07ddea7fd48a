//! Recipe generation from a free-text prompt.
//!
//! The network call lives behind [`RecipeGenerator`]; everything here is pure
//! so the response parsing can be tested without I/O.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::models::{
    RecipeInput, count_or_zero, lenient_text, optional_amount, text_lines,
};

pub const DEFAULT_MEAL_TYPE: &str = "dinner";
pub const DEFAULT_DIFFICULTY: &str = "medium";
const DEFAULT_SERVINGS: u32 = 4;

/// Prompt-to-text service. Implementations are single-shot: no retries.
#[allow(async_fn_in_trait)]
pub trait RecipeGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub meal_type: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    fn meal_type(&self) -> &str {
        self.meal_type
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MEAL_TYPE)
    }

    fn difficulty(&self) -> &str {
        self.difficulty
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DIFFICULTY)
    }
}

/// A recipe parsed out of a generation response, not yet stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRecipe {
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
    #[serde(default, deserialize_with = "optional_amount")]
    pub calories: Option<u32>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub protein: Option<u32>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub carbs: Option<u32>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub fat: Option<u32>,
}

impl GeneratedRecipe {
    #[must_use]
    pub fn into_input(self) -> RecipeInput {
        RecipeInput {
            title: self.title,
            description: self.description,
            meal_type: self.meal_type,
            difficulty: self.difficulty,
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            servings: self.servings,
            ingredients: self.ingredients,
            instructions: self.instructions,
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
            ..RecipeInput::default()
        }
    }
}

#[must_use]
pub fn build_prompt(request: &GenerationRequest) -> String {
    let prompt = request.prompt.trim();
    let meal_type = request.meal_type();
    let difficulty = request.difficulty();
    format!(
        r#"You are a professional chef and recipe writer. Generate a well-formatted recipe in JSON format based on the following request: "{prompt}"

The recipe should be for {meal_type} and have {difficulty} difficulty level.

Return the recipe in this exact JSON format (no markdown, no code blocks, just pure JSON):
{{
  "title": "Recipe title",
  "description": "Brief description",
  "mealType": "{meal_type}",
  "difficulty": "{difficulty}",
  "prepTime": number in minutes,
  "cookTime": number in minutes,
  "servings": number,
  "ingredients": ["ingredient 1", "ingredient 2", ...],
  "instructions": "Step-by-step instructions with line breaks",
  "calories": number (optional),
  "protein": number in grams (optional),
  "carbs": number in grams (optional),
  "fat": number in grams (optional)
}}

Important: Return ONLY the JSON object, no markdown formatting, no code blocks, no explanations. Make sure all numeric values are actual numbers, not strings."#
    )
}

/// Remove Markdown code fence markers, keeping the fenced content.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// The first balanced `{...}` span in `text`. Braces inside JSON strings,
/// including escaped quotes, do not count.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn parse_generated_recipe(text: &str) -> Result<GeneratedRecipe> {
    let content = strip_code_fences(text);
    if content.is_empty() {
        return Err(StoreError::generation("Empty response from API"));
    }

    let json = extract_json_object(&content).unwrap_or(content.as_str());
    let mut value: Value = serde_json::from_str(json).map_err(|e| {
        debug!(error = %e, "generated content is not JSON");
        StoreError::generation(
            "Failed to parse recipe JSON. The AI response may be malformed. Please try again.",
        )
    })?;

    let Some(obj) = value.as_object_mut() else {
        return Err(StoreError::generation(
            "Failed to parse recipe JSON. The AI response may be malformed. Please try again.",
        ));
    };

    // Some models return steps as a list
    if let Some(Value::Array(steps)) = obj.get("instructions") {
        let joined = steps
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        obj.insert("instructions".to_string(), Value::String(joined));
    }
    if let Some(Value::String(lines)) = obj.get("ingredients") {
        let split: Vec<Value> = lines
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| Value::String(l.to_string()))
            .collect();
        obj.insert("ingredients".to_string(), Value::Array(split));
    }

    let mut recipe: GeneratedRecipe = serde_json::from_value(value).map_err(|e| {
        StoreError::generation(format!("Failed to parse recipe JSON: {e}"))
    })?;

    recipe.title = recipe.title.trim().to_string();
    recipe.instructions = recipe.instructions.trim().to_string();
    recipe.ingredients.retain(|i| !i.trim().is_empty());
    if recipe.title.is_empty() || recipe.ingredients.is_empty() || recipe.instructions.is_empty()
    {
        return Err(StoreError::generation(
            "Generated recipe is missing required fields. Please try again.",
        ));
    }

    if recipe.servings == 0 {
        recipe.servings = DEFAULT_SERVINGS;
    }
    for amount in [
        &mut recipe.calories,
        &mut recipe.protein,
        &mut recipe.carbs,
        &mut recipe.fat,
    ] {
        if *amount == Some(0) {
            *amount = None;
        }
    }

    Ok(recipe)
}

/// Build the prompt, call the generator and parse its reply.
pub async fn generate_recipe<G: RecipeGenerator>(
    generator: &G,
    request: &GenerationRequest,
) -> Result<GeneratedRecipe> {
    if request.prompt.trim().is_empty() {
        return Err(StoreError::validation("Please enter a recipe description"));
    }

    let prompt = build_prompt(request);
    let reply = generator.generate(&prompt).await.map_err(|e| {
        warn!(error = %e, "recipe generation failed");
        StoreError::generation(format!("{e:#}"))
    })?;

    let mut recipe = parse_generated_recipe(&reply)?;
    if recipe.meal_type.trim().is_empty() {
        recipe.meal_type = request.meal_type().to_string();
    }
    if recipe.difficulty.trim().is_empty() {
        recipe.difficulty = request.difficulty().to_string();
    }
    Ok(recipe)
}

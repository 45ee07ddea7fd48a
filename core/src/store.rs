use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::db::{DocumentStore, HISTORY_KEY, RECIPES_KEY, SETTINGS_KEY, USER_KEY};
use crate::error::{Result, StoreError};
use crate::generate::GeneratedRecipe;
use crate::import::{parse_import, reconcile};
use crate::models::{
    ALL_MEAL_TYPES, ExportData, HISTORY_LIMIT, HistoryEntry, ImportSummary, Recipe, RecipeInput,
    RecipePatch, RecipeStats, Settings, SortOrder, UserProfile, new_recipe_id, now_millis,
    sort_recipes, validate_rating, validate_required,
};

/// Owner of the recipe collection, view history, profile and settings.
///
/// Every mutation is built on a copy, written through the backend and only
/// then committed to memory. A failed write leaves both the in-memory and the
/// persisted state as they were.
pub struct RecipeStore<P: DocumentStore> {
    backend: P,
    recipes: Vec<Recipe>,
    history: Vec<HistoryEntry>,
    user: Option<UserProfile>,
    settings: Settings,
}

impl<P: DocumentStore> RecipeStore<P> {
    /// Load all documents from `backend`, normalizing whatever is stored.
    pub fn open(backend: P) -> Result<Self> {
        let mut recipes: Vec<Recipe> = load_list(&backend, RECIPES_KEY)?;
        let mut seen = std::collections::HashSet::new();
        for recipe in &mut recipes {
            if recipe.id.is_empty() || !seen.insert(recipe.id.clone()) {
                recipe.id = new_recipe_id();
                seen.insert(recipe.id.clone());
                debug!(title = %recipe.title, "assigned id to stored recipe");
            }
        }

        let mut history: Vec<HistoryEntry> = load_list(&backend, HISTORY_KEY)?;
        history.truncate(HISTORY_LIMIT);

        let user = load_document::<Option<UserProfile>>(&backend, USER_KEY)?.flatten();
        let settings = load_document::<Settings>(&backend, SETTINGS_KEY)?.unwrap_or_default();

        info!(
            recipes = recipes.len(),
            history = history.len(),
            "recipe store loaded"
        );
        Ok(Self {
            backend,
            recipes,
            history,
            user,
            settings,
        })
    }

    pub fn backend(&self) -> &P {
        &self.backend
    }

    // --- Queries ---

    /// All recipes in collection order.
    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn find(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    pub fn get(&self, id: &str) -> Result<Recipe> {
        self.find(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub fn list<F>(&self, predicate: F, order: SortOrder) -> Vec<Recipe>
    where
        F: Fn(&Recipe) -> bool,
    {
        let mut recipes: Vec<Recipe> = self
            .recipes
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect();
        sort_recipes(&mut recipes, order);
        recipes
    }

    /// Case-insensitive substring search over title, description,
    /// ingredients and instructions, optionally restricted to one meal type.
    /// Results keep collection order.
    pub fn search(&self, query: &str, meal_type: &str) -> Vec<Recipe> {
        let query = query.trim().to_lowercase();
        let meal_type = meal_type.trim();
        self.recipes
            .iter()
            .filter(|r| matches_search(r, &query, meal_type))
            .cloned()
            .collect()
    }

    pub fn search_sorted(&self, query: &str, meal_type: &str, order: SortOrder) -> Vec<Recipe> {
        let mut recipes = self.search(query, meal_type);
        sort_recipes(&mut recipes, order);
        recipes
    }

    pub fn favorites(&self) -> Vec<Recipe> {
        self.recipes.iter().filter(|r| r.favorite).cloned().collect()
    }

    /// View history, most recent first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn stats(&self) -> RecipeStats {
        let total = self.recipes.len();
        let prep_sum: u64 = self.recipes.iter().map(|r| u64::from(r.prep_time)).sum();
        let average_prep_time = if total == 0 {
            0
        } else {
            let n = total as u64;
            u32::try_from((prep_sum + n / 2) / n).unwrap_or(u32::MAX)
        };
        RecipeStats {
            total,
            favorites: self.recipes.iter().filter(|r| r.favorite).count(),
            average_prep_time,
            history_count: self.history.len(),
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    // --- Recipe mutations ---

    pub fn create(&mut self, input: RecipeInput) -> Result<Recipe> {
        input.validate()?;
        let recipe = input.into_recipe(self.fresh_id(), now_millis());

        let mut next = self.recipes.clone();
        next.push(recipe.clone());
        self.commit_recipes(next)?;

        info!(id = %recipe.id, title = %recipe.title, "recipe created");
        Ok(recipe)
    }

    /// Replace every editable field of `id` from `input`. Favorite, rating
    /// and views are kept unless `input` overrides them.
    pub fn update(&mut self, id: &str, mut input: RecipeInput) -> Result<Recipe> {
        input.validate()?;
        let index = self.index_of(id)?;
        let current = &self.recipes[index];
        input.favorite.get_or_insert(current.favorite);
        input.rating.get_or_insert(i64::from(current.rating));
        input.views.get_or_insert(current.views);
        let updated = input.into_recipe(current.id.clone(), current.created_at);

        let mut next = self.recipes.clone();
        next[index] = updated.clone();
        self.commit_recipes(next)?;

        info!(id, "recipe updated");
        Ok(updated)
    }

    /// Change only the fields present in `patch`.
    pub fn patch(&mut self, id: &str, patch: RecipePatch) -> Result<Recipe> {
        let index = self.index_of(id)?;
        let mut updated = self.recipes[index].clone();
        patch.apply_to(&mut updated);
        validate_required(&updated.title, &updated.instructions)?;

        self.replace_at(index, updated)
    }

    /// Remove `id`. Returns false when there was nothing to remove.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let Some(index) = self.recipes.iter().position(|r| r.id == id) else {
            debug!(id, "delete of unknown recipe ignored");
            return Ok(false);
        };

        let mut next = self.recipes.clone();
        next.remove(index);
        self.commit_recipes(next)?;

        info!(id, "recipe deleted");
        Ok(true)
    }

    pub fn toggle_favorite(&mut self, id: &str) -> Result<Recipe> {
        let index = self.index_of(id)?;
        let mut updated = self.recipes[index].clone();
        updated.favorite = !updated.favorite;
        self.replace_at(index, updated)
    }

    pub fn set_rating(&mut self, id: &str, value: i64) -> Result<Recipe> {
        let rating = validate_rating(value)?;
        let index = self.index_of(id)?;
        let mut updated = self.recipes[index].clone();
        updated.rating = rating;
        self.replace_at(index, updated)
    }

    /// Count a view and log it at the head of the history.
    pub fn record_view(&mut self, id: &str) -> Result<Recipe> {
        let index = self.index_of(id)?;
        let mut updated = self.recipes[index].clone();
        updated.views = updated.views.saturating_add(1);

        let mut recipes = self.recipes.clone();
        recipes[index] = updated.clone();

        let mut history = Vec::with_capacity(HISTORY_LIMIT);
        history.push(HistoryEntry {
            recipe_id: updated.id.clone(),
            recipe_title: updated.title.clone(),
            viewed_at: now_millis(),
        });
        history.extend(self.history.iter().take(HISTORY_LIMIT - 1).cloned());

        self.backend.save(&[
            (RECIPES_KEY, to_json(&recipes)?),
            (HISTORY_KEY, to_json(&history)?),
        ])?;
        self.recipes = recipes;
        self.history = history;

        Ok(updated)
    }

    /// Insert the sample recipes into an empty collection. Returns how many
    /// were added.
    pub fn seed_samples(&mut self) -> Result<usize> {
        if !self.recipes.is_empty() {
            return Ok(0);
        }
        let now = now_millis();
        let samples: Vec<Recipe> = sample_recipes()
            .into_iter()
            .map(|input| input.into_recipe(new_recipe_id(), now))
            .collect();
        let count = samples.len();
        self.commit_recipes(samples)?;
        info!(count, "sample recipes added");
        Ok(count)
    }

    pub fn save_generated(&mut self, generated: GeneratedRecipe) -> Result<Recipe> {
        self.create(generated.into_input())
    }

    // --- Profile ---

    pub fn login(&mut self, name: &str, email: &str) -> Result<UserProfile> {
        let (name, email) = (name.trim(), email.trim());
        if name.is_empty() || email.is_empty() {
            return Err(StoreError::validation("Please enter both name and email"));
        }
        let profile = UserProfile {
            name: name.to_string(),
            email: email.to_string(),
            bio: String::new(),
            created_at: now_millis(),
        };
        self.commit_profile(profile)
    }

    pub fn update_profile(
        &mut self,
        name: Option<&str>,
        email: Option<&str>,
        bio: Option<&str>,
    ) -> Result<UserProfile> {
        let Some(mut profile) = self.user.clone() else {
            return Err(StoreError::validation("Not logged in"));
        };
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(StoreError::validation("Name must not be empty"));
            }
            profile.name = name.trim().to_string();
        }
        if let Some(email) = email {
            if email.trim().is_empty() {
                return Err(StoreError::validation("Email must not be empty"));
            }
            profile.email = email.trim().to_string();
        }
        if let Some(bio) = bio {
            profile.bio = bio.trim().to_string();
        }
        self.commit_profile(profile)
    }

    /// Drop the profile. Returns false when nobody was logged in.
    pub fn logout(&mut self) -> Result<bool> {
        let removed = self.backend.remove(USER_KEY)?;
        let had_profile = self.user.take().is_some();
        Ok(removed || had_profile)
    }

    // --- Settings ---

    pub fn save_settings(&mut self, settings: Settings) -> Result<Settings> {
        self.backend.save(&[(SETTINGS_KEY, to_json(&settings)?)])?;
        self.settings = settings;
        Ok(settings)
    }

    // --- Export / Import ---

    pub fn export(&self) -> ExportData {
        ExportData {
            recipes: self.recipes.clone(),
            user: self.user.clone(),
            history: self.history.clone(),
            settings: self.settings,
            export_date: now_millis(),
        }
    }

    /// Merge an export document (or a bare recipe array) into the store.
    ///
    /// Recipes are reconciled by id, a profile or history in the document
    /// replaces the stored one, and settings are merged field by field. All
    /// documents are written in one save.
    pub fn import_json(&mut self, text: &str) -> Result<ImportSummary> {
        let payload = parse_import(text)?;
        let (recipes, counts) = reconcile(&self.recipes, payload.recipes);

        let profile_imported = payload.user.is_some();
        let user = payload.user.or_else(|| self.user.clone());

        let history_imported = payload.history.as_ref().map_or(0, Vec::len);
        let history = payload.history.unwrap_or_else(|| self.history.clone());

        let settings_imported = payload.settings.is_some();
        let settings = payload
            .settings
            .map_or(self.settings, |patch| self.settings.merged(patch));

        let mut documents = vec![
            (RECIPES_KEY, to_json(&recipes)?),
            (HISTORY_KEY, to_json(&history)?),
            (SETTINGS_KEY, to_json(&settings)?),
        ];
        if let Some(user) = &user {
            documents.push((USER_KEY, to_json(user)?));
        }
        self.backend.save(&documents)?;

        self.recipes = recipes;
        self.history = history;
        self.user = user;
        self.settings = settings;

        let summary = ImportSummary {
            recipes_replaced: counts.replaced,
            recipes_added: counts.added,
            history_imported,
            profile_imported,
            settings_imported,
        };
        info!(
            replaced = summary.recipes_replaced,
            added = summary.recipes_added,
            "import applied"
        );
        Ok(summary)
    }

    // --- Internals ---

    fn index_of(&self, id: &str) -> Result<usize> {
        self.recipes
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = new_recipe_id();
            if self.find(&id).is_none() {
                return id;
            }
        }
    }

    fn replace_at(&mut self, index: usize, recipe: Recipe) -> Result<Recipe> {
        let mut next = self.recipes.clone();
        next[index] = recipe.clone();
        self.commit_recipes(next)?;
        Ok(recipe)
    }

    fn commit_recipes(&mut self, recipes: Vec<Recipe>) -> Result<()> {
        self.backend.save(&[(RECIPES_KEY, to_json(&recipes)?)])?;
        self.recipes = recipes;
        Ok(())
    }

    fn commit_profile(&mut self, profile: UserProfile) -> Result<UserProfile> {
        self.backend.save(&[(USER_KEY, to_json(&profile)?)])?;
        self.user = Some(profile.clone());
        Ok(profile)
    }
}

fn matches_search(recipe: &Recipe, query: &str, meal_type: &str) -> bool {
    let meal_matches = meal_type.is_empty()
        || meal_type.eq_ignore_ascii_case(ALL_MEAL_TYPES)
        || recipe.meal_type.eq_ignore_ascii_case(meal_type);
    meal_matches && (query.is_empty() || recipe.search_text().contains(query))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .context("Failed to serialize document")
        .map_err(StoreError::from)
}

/// Load one document. Missing documents are `None`; corrupt ones are logged
/// and treated as missing.
fn load_document<T: DeserializeOwned>(backend: &impl DocumentStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = backend.load(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(key, error = %e, "ignoring corrupt document");
            Ok(None)
        }
    }
}

/// Load a list document item by item, skipping entries that cannot be
/// normalized.
fn load_list<T: DeserializeOwned>(backend: &impl DocumentStore, key: &str) -> Result<Vec<T>> {
    let Some(items) = load_document::<Value>(backend, key)? else {
        return Ok(Vec::new());
    };
    let Value::Array(items) = items else {
        warn!(key, "ignoring document that is not a list");
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "skipping corrupt entry");
                None
            }
        })
        .collect())
}

fn sample_recipes() -> Vec<RecipeInput> {
    let lines = |items: &[&str]| items.iter().map(ToString::to_string).collect();
    vec![
        RecipeInput {
            title: "Classic Pancakes".to_string(),
            description: "Fluffy and delicious pancakes perfect for weekend mornings".to_string(),
            meal_type: "breakfast".to_string(),
            difficulty: "easy".to_string(),
            prep_time: 10,
            cook_time: 10,
            servings: 4,
            ingredients: lines(&[
                "1½ cups flour",
                "1 tbsp sugar",
                "1 tsp baking powder",
                "1 egg",
                "1 cup milk",
                "2 tbsp butter",
            ]),
            instructions: "1. Mix dry ingredients in a bowl.\n\
                           2. In another bowl, whisk egg and milk.\n\
                           3. Combine wet and dry ingredients.\n\
                           4. Cook on a hot griddle until golden brown on both sides.\n\
                           5. Serve with maple syrup and butter."
                .to_string(),
            calories: Some(250),
            protein: Some(8),
            carbs: Some(35),
            fat: Some(8),
            ..RecipeInput::default()
        },
        RecipeInput {
            title: "Tomato Basil Pasta".to_string(),
            description: "Fresh and simple pasta dish with cherry tomatoes and basil".to_string(),
            meal_type: "dinner".to_string(),
            difficulty: "medium".to_string(),
            prep_time: 10,
            cook_time: 15,
            servings: 4,
            ingredients: lines(&[
                "200g pasta",
                "2 cups cherry tomatoes",
                "handful fresh basil",
                "2 cloves garlic",
                "3 tbsp olive oil",
                "salt and pepper",
            ]),
            instructions: "1. Cook pasta according to package directions.\n\
                           2. Heat olive oil in a pan, add sliced garlic.\n\
                           3. Add halved cherry tomatoes and cook until soft.\n\
                           4. Toss cooked pasta with tomato mixture.\n\
                           5. Add fresh basil leaves and season with salt and pepper.\n\
                           6. Serve immediately."
                .to_string(),
            calories: Some(320),
            protein: Some(12),
            carbs: Some(45),
            fat: Some(12),
            ..RecipeInput::default()
        },
    ]
}

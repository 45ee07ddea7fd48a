mod commands;
mod config;
mod generation;
mod server;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    Store, cmd_export, cmd_favorites, cmd_generate, cmd_history, cmd_import, cmd_key_clear,
    cmd_key_set, cmd_key_show, cmd_profile_login, cmd_profile_logout, cmd_profile_show,
    cmd_profile_update, cmd_recipe_add, cmd_recipe_delete, cmd_recipe_edit, cmd_recipe_favorite,
    cmd_recipe_list, cmd_recipe_rate, cmd_recipe_search, cmd_recipe_seed, cmd_recipe_show,
    cmd_settings_set, cmd_settings_show, cmd_stats,
};
use crate::config::Config;
use crate::generation::GenerationClient;
use cookbook_core::db::Database;
use cookbook_core::generate::GenerationRequest;
use cookbook_core::image::read_image_file;
use cookbook_core::models::{RecipeInput, RecipePatch, SettingsPatch, SortOrder};
use cookbook_core::store::RecipeStore;

#[derive(Parser)]
#[command(
    name = "cookbook",
    version,
    about = "A simple, local-first recipe manager",
    long_about = "\n\n   ___ ___   ___  _  _____  ___   ___  _  __
  / __/ _ \\ / _ \\| |/ / _ )/ _ \\ / _ \\| |/ /
 | (_| (_) | (_) | ' <| _ \\ (_) | (_) | ' <
  \\___\\___/ \\___/|_|\\_\\___/\\___/ \\___/|_|\\_\\
        what's for dinner?
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// List favorite recipes
    Favorites {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recently viewed recipes, most recent first
    History {
        /// Only show this many entries
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show collection statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Export everything as one JSON document
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Output a JSON summary (when writing to a file)
        #[arg(long)]
        json: bool,
    },
    /// Import an export document or a JSON array of recipes
    Import {
        /// Path to the JSON file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a recipe from a description using an AI provider
    Generate {
        /// What you'd like to cook (e.g. "a quick vegetarian curry")
        prompt: String,
        /// Meal type: breakfast, lunch, dinner, snack, dessert
        #[arg(short, long)]
        meal: Option<String>,
        /// Difficulty: easy, medium, hard
        #[arg(short, long)]
        difficulty: Option<String>,
        /// Save the generated recipe to your collection
        #[arg(long)]
        save: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the saved Gemini API key used by `generate`
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Add a new recipe
    Add {
        #[command(flatten)]
        fields: RecipeFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change some fields of a recipe
    Edit {
        /// Recipe id or title
        recipe: String,
        #[command(flatten)]
        fields: RecipeFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe
    Delete {
        /// Recipe id or title
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe (counts as a view)
    Show {
        /// Recipe id or title
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recipes
    List {
        /// Only this meal type ("all" for every recipe)
        #[arg(short, long, default_value = "all")]
        meal: String,
        /// Sort order: newest, oldest, rating, prepTime
        #[arg(short, long, default_value = "newest")]
        sort: SortOrder,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search titles, descriptions, ingredients and instructions
    Search {
        /// Text to look for (case-insensitive)
        query: String,
        /// Only this meal type
        #[arg(short, long, default_value = "all")]
        meal: String,
        /// Sort order: newest, oldest, rating, prepTime (default: collection order)
        #[arg(short, long)]
        sort: Option<SortOrder>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle a recipe's favorite flag
    Favorite {
        /// Recipe id or title
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rate a recipe from 0 (unrated) to 5
    Rate {
        /// Recipe id or title
        recipe: String,
        /// Rating, 0-5
        #[arg(allow_negative_numbers = true)]
        rating: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add sample recipes to an empty collection
    Seed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RecipeFields {
    /// Recipe title
    #[arg(short, long)]
    title: Option<String>,
    /// Short description
    #[arg(long)]
    description: Option<String>,
    /// Meal type: breakfast, lunch, dinner, snack, dessert
    #[arg(short, long)]
    meal: Option<String>,
    /// Difficulty: easy, medium, hard
    #[arg(short, long)]
    difficulty: Option<String>,
    /// Preparation time in minutes
    #[arg(long)]
    prep_time: Option<u32>,
    /// Cooking time in minutes
    #[arg(long)]
    cook_time: Option<u32>,
    /// Number of servings
    #[arg(long)]
    servings: Option<u32>,
    /// An ingredient line; repeat for each ingredient
    #[arg(short, long = "ingredient", value_name = "LINE")]
    ingredients: Vec<String>,
    /// Cooking instructions
    #[arg(long)]
    instructions: Option<String>,
    /// Path to an image file (PNG, JPEG, GIF, WebP, BMP, SVG)
    #[arg(long, value_name = "PATH", conflicts_with = "no_image")]
    image: Option<PathBuf>,
    /// Remove the recipe's image
    #[arg(long)]
    no_image: bool,
    /// Calories per serving
    #[arg(long)]
    calories: Option<u32>,
    /// Protein per serving (g)
    #[arg(long)]
    protein: Option<u32>,
    /// Carbs per serving (g)
    #[arg(long)]
    carbs: Option<u32>,
    /// Fat per serving (g)
    #[arg(long)]
    fat: Option<u32>,
}

impl RecipeFields {
    fn read_image(&self) -> Result<Option<String>> {
        Ok(self.image.as_deref().map(read_image_file).transpose()?)
    }

    fn into_input(self) -> Result<RecipeInput> {
        let image = self.read_image()?;
        Ok(RecipeInput {
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            meal_type: self.meal.unwrap_or_default(),
            difficulty: self.difficulty.unwrap_or_default(),
            prep_time: self.prep_time.unwrap_or(0),
            cook_time: self.cook_time.unwrap_or(0),
            servings: self.servings.unwrap_or(0),
            ingredients: self.ingredients,
            instructions: self.instructions.unwrap_or_default(),
            image,
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
            ..RecipeInput::default()
        })
    }

    fn into_patch(self) -> Result<RecipePatch> {
        let image = if self.no_image {
            Some(None)
        } else {
            self.read_image()?.map(Some)
        };
        Ok(RecipePatch {
            title: self.title,
            description: self.description,
            meal_type: self.meal,
            difficulty: self.difficulty,
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            servings: self.servings,
            ingredients: (!self.ingredients.is_empty()).then_some(self.ingredients),
            instructions: self.instructions,
            image,
            calories: self.calories.map(Some),
            protein: self.protein.map(Some),
            carbs: self.carbs.map(Some),
            fat: self.fat.map(Some),
        })
    }
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Create a local profile
    Login {
        /// Your name
        name: String,
        /// Your email
        email: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change profile fields
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the profile
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change settings (unspecified ones keep their value)
    Set {
        /// Dark mode: true or false
        #[arg(long)]
        dark_mode: Option<bool>,
        /// Notifications: true or false
        #[arg(long)]
        notifications: Option<bool>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Save a Gemini API key (stored with owner-only permissions)
    Set {
        /// The API key
        key: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which keys are configured (masked)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the saved key
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut store: Store = RecipeStore::open(Database::open(&config.db_path)?)?;

    match cli.command {
        Commands::Recipe { command } => match command {
            RecipeCommands::Add { fields, json } => {
                cmd_recipe_add(&mut store, fields.into_input()?, json)
            }
            RecipeCommands::Edit {
                recipe,
                fields,
                json,
            } => cmd_recipe_edit(&mut store, &recipe, fields.into_patch()?, json),
            RecipeCommands::Delete { recipe, json } => cmd_recipe_delete(&mut store, &recipe, json),
            RecipeCommands::Show { recipe, json } => cmd_recipe_show(&mut store, &recipe, json),
            RecipeCommands::List { meal, sort, json } => cmd_recipe_list(&store, &meal, sort, json),
            RecipeCommands::Search {
                query,
                meal,
                sort,
                json,
            } => cmd_recipe_search(&store, &query, &meal, sort, json),
            RecipeCommands::Favorite { recipe, json } => {
                cmd_recipe_favorite(&mut store, &recipe, json)
            }
            RecipeCommands::Rate {
                recipe,
                rating,
                json,
            } => cmd_recipe_rate(&mut store, &recipe, rating, json),
            RecipeCommands::Seed { json } => cmd_recipe_seed(&mut store, json),
        },
        Commands::Favorites { json } => cmd_favorites(&store, json),
        Commands::History { limit, json } => cmd_history(&store, limit, json),
        Commands::Stats { json } => cmd_stats(&store, json),
        Commands::Profile { command } => match command {
            ProfileCommands::Login { name, email, json } => {
                cmd_profile_login(&mut store, &name, &email, json)
            }
            ProfileCommands::Show { json } => cmd_profile_show(&store, json),
            ProfileCommands::Update {
                name,
                email,
                bio,
                json,
            } => cmd_profile_update(
                &mut store,
                name.as_deref(),
                email.as_deref(),
                bio.as_deref(),
                json,
            ),
            ProfileCommands::Logout { json } => cmd_profile_logout(&mut store, json),
        },
        Commands::Settings { command } => match command {
            SettingsCommands::Show { json } => cmd_settings_show(&store, json),
            SettingsCommands::Set {
                dark_mode,
                notifications,
                json,
            } => cmd_settings_set(
                &mut store,
                SettingsPatch {
                    dark_mode,
                    notifications,
                },
                json,
            ),
        },
        Commands::Export { output, json } => cmd_export(&store, output.as_deref(), json),
        Commands::Import { file, json } => cmd_import(&mut store, &file, json),
        Commands::Generate {
            prompt,
            meal,
            difficulty,
            save,
            json,
        } => {
            let request = GenerationRequest {
                prompt,
                meal_type: meal,
                difficulty,
            };
            cmd_generate(&mut store, &config, &request, save, json).await
        }
        Commands::Key { command } => match command {
            KeyCommands::Set { key, json } => cmd_key_set(&config, &key, json),
            KeyCommands::Show { json } => cmd_key_show(&config, json),
            KeyCommands::Clear { json } => cmd_key_clear(&config, json),
        },
        Commands::Serve { port, bind } => {
            let generator = GenerationClient::from_config(&config)?;
            server::start_server(store, generator, port, &bind).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(args: &[&str]) -> RecipeFields {
        #[derive(Parser)]
        struct Harness {
            #[command(flatten)]
            fields: RecipeFields,
        }
        let mut argv = vec!["cookbook"];
        argv.extend_from_slice(args);
        Harness::parse_from(argv).fields
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fields_into_input() {
        let input = fields(&[
            "--title",
            "Pancakes",
            "-i",
            "1 cup flour",
            "-i",
            "2 eggs",
            "--instructions",
            "Mix. Fry.",
            "--prep-time",
            "10",
        ])
        .into_input()
        .unwrap();
        assert_eq!(input.title, "Pancakes");
        assert_eq!(input.ingredients, vec!["1 cup flour", "2 eggs"]);
        assert_eq!(input.prep_time, 10);
        assert_eq!(input.servings, 0);
        assert!(input.image.is_none());
        assert!(input.favorite.is_none());
    }

    #[test]
    fn test_fields_into_patch_only_sets_given_fields() {
        let patch = fields(&["--servings", "6", "--calories", "300"])
            .into_patch()
            .unwrap();
        assert_eq!(patch.servings, Some(6));
        assert_eq!(patch.calories, Some(Some(300)));
        assert!(patch.title.is_none());
        assert!(patch.ingredients.is_none());
        assert!(patch.image.is_none());
    }

    #[test]
    fn test_fields_no_image_clears() {
        let patch = fields(&["--no-image"]).into_patch().unwrap();
        assert_eq!(patch.image, Some(None));
    }

    #[test]
    fn test_fields_image_is_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let patch = fields(&["--image", path.to_str().unwrap()])
            .into_patch()
            .unwrap();
        assert_eq!(
            patch.image,
            Some(Some("data:image/gif;base64,R0lGODlh".to_string()))
        );
    }

    #[test]
    fn test_empty_patch_is_empty() {
        assert!(fields(&[]).into_patch().unwrap().is_empty());
    }

    #[test]
    fn test_sort_flag_parses() {
        let cli = Cli::parse_from(["cookbook", "recipe", "list", "--sort", "prep-time"]);
        match cli.command {
            Commands::Recipe {
                command: RecipeCommands::List { sort, meal, .. },
            } => {
                assert_eq!(sort, SortOrder::PrepTime);
                assert_eq!(meal, "all");
            }
            _ => panic!("expected recipe list"),
        }
    }
}

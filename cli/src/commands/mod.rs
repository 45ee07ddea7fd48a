mod data;
mod generate;
mod helpers;
mod profile;
mod recipe;

use cookbook_core::db::Database;
use cookbook_core::store::RecipeStore;

pub(crate) type Store = RecipeStore<Database>;

pub(crate) use data::{cmd_export, cmd_import};
pub(crate) use generate::{cmd_generate, cmd_key_clear, cmd_key_set, cmd_key_show};
pub(crate) use profile::{
    cmd_history, cmd_profile_login, cmd_profile_logout, cmd_profile_show, cmd_profile_update,
    cmd_settings_set, cmd_settings_show, cmd_stats,
};
pub(crate) use recipe::{
    cmd_favorites, cmd_recipe_add, cmd_recipe_delete, cmd_recipe_edit, cmd_recipe_favorite,
    cmd_recipe_list, cmd_recipe_rate, cmd_recipe_search, cmd_recipe_seed, cmd_recipe_show,
};

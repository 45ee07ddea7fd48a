use anyhow::{Result, bail};

use cookbook_core::models::SettingsPatch;

use super::Store;
use super::helpers::{format_timestamp, not_found, print_history_table, print_json};

pub(crate) fn cmd_profile_login(
    store: &mut Store,
    name: &str,
    email: &str,
    json: bool,
) -> Result<()> {
    let profile = store.login(name, email)?;
    if json {
        print_json(&profile)?;
    } else {
        println!("Logged in as {} <{}>", profile.name, profile.email);
    }
    Ok(())
}

pub(crate) fn cmd_profile_show(store: &Store, json: bool) -> Result<()> {
    let Some(profile) = store.profile() else {
        not_found("Not logged in. Use: cookbook profile login <name> <email>", json);
    };
    if json {
        return print_json(profile);
    }

    println!("=== {} ===", profile.name);
    println!("  Email:  {}", profile.email);
    if !profile.bio.is_empty() {
        println!("  Bio:    {}", profile.bio);
    }
    println!("  Member since {}", format_timestamp(profile.created_at));
    Ok(())
}

pub(crate) fn cmd_profile_update(
    store: &mut Store,
    name: Option<&str>,
    email: Option<&str>,
    bio: Option<&str>,
    json: bool,
) -> Result<()> {
    if name.is_none() && email.is_none() && bio.is_none() {
        bail!("Nothing to update. Pass --name, --email or --bio");
    }
    let profile = store.update_profile(name, email, bio)?;
    if json {
        print_json(&profile)?;
    } else {
        println!("Profile updated");
    }
    Ok(())
}

pub(crate) fn cmd_profile_logout(store: &mut Store, json: bool) -> Result<()> {
    let removed = store.logout()?;
    if json {
        println!("{}", serde_json::json!({ "loggedOut": removed }));
    } else if removed {
        println!("Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(())
}

pub(crate) fn cmd_settings_show(store: &Store, json: bool) -> Result<()> {
    let settings = store.settings();
    if json {
        return print_json(&settings);
    }
    println!("Dark mode:     {}", on_off(settings.dark_mode));
    println!("Notifications: {}", on_off(settings.notifications));
    Ok(())
}

pub(crate) fn cmd_settings_set(store: &mut Store, patch: SettingsPatch, json: bool) -> Result<()> {
    if patch.dark_mode.is_none() && patch.notifications.is_none() {
        bail!("Nothing to update. Pass --dark-mode or --notifications");
    }
    let merged = store.settings().merged(patch);
    let settings = store.save_settings(merged)?;
    if json {
        print_json(&settings)?;
    } else {
        println!("Settings saved");
        println!("Dark mode:     {}", on_off(settings.dark_mode));
        println!("Notifications: {}", on_off(settings.notifications));
    }
    Ok(())
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

pub(crate) fn cmd_history(store: &Store, limit: Option<usize>, json: bool) -> Result<()> {
    let history = store.history();
    let history = &history[..limit.map_or(history.len(), |n| n.min(history.len()))];
    if json {
        return print_json(history);
    }
    if history.is_empty() {
        println!("No recipes viewed yet");
        return Ok(());
    }
    print_history_table(history);
    Ok(())
}

pub(crate) fn cmd_stats(store: &Store, json: bool) -> Result<()> {
    let stats = store.stats();
    if json {
        return print_json(&stats);
    }
    println!("=== Cookbook ===");
    println!("  Recipes:          {}", stats.total);
    println!("  Favorites:        {}", stats.favorites);
    println!("  Avg prep time:    {} min", stats.average_prep_time);
    println!("  Recently viewed:  {}", stats.history_count);
    Ok(())
}

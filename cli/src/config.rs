use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Overrides the platform data directory when set.
pub const DATA_DIR_ENV: &str = "COOKBOOK_DATA_DIR";

const KEY_FILE: &str = "gemini_api_key";
const MIN_KEY_LEN: usize = 10;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => ProjectDirs::from("", "", "cookbook")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        Self::in_dir(data_dir)
    }

    pub fn in_dir(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("cookbook.db");

        Ok(Config { db_path, data_dir })
    }

    fn key_path(&self) -> PathBuf {
        self.data_dir.join(KEY_FILE)
    }

    /// The saved Gemini API key, if any.
    pub fn load_generation_key(&self) -> Result<Option<String>> {
        let path = self.key_path();
        if !path.exists() {
            return Ok(None);
        }
        let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
        let key = key.trim().to_string();
        Ok((!key.is_empty()).then_some(key))
    }

    pub fn save_generation_key(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.len() < MIN_KEY_LEN {
            bail!("Please enter a valid Gemini API key (at least {MIN_KEY_LEN} characters)");
        }

        let path = self.key_path();
        std::fs::write(&path, key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        Ok(())
    }

    pub fn clear_generation_key(&self) -> Result<bool> {
        let path = self.key_path();
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).context("Failed to remove API key file")?;
        Ok(true)
    }
}

/// Show only the ends of a secret.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::in_dir(dir.path().join("data")).unwrap();
        (dir, config)
    }

    #[test]
    fn test_in_dir_creates_directory() {
        let (_dir, config) = temp_config();
        assert!(config.data_dir.is_dir());
        assert_eq!(config.db_path, config.data_dir.join("cookbook.db"));
    }

    #[test]
    fn test_generation_key_round_trip() {
        let (_dir, config) = temp_config();
        assert!(config.load_generation_key().unwrap().is_none());

        config.save_generation_key("  AIzaSyExampleKey123  ").unwrap();
        assert_eq!(
            config.load_generation_key().unwrap().as_deref(),
            Some("AIzaSyExampleKey123")
        );

        assert!(config.clear_generation_key().unwrap());
        assert!(!config.clear_generation_key().unwrap());
        assert!(config.load_generation_key().unwrap().is_none());
    }

    #[test]
    fn test_short_generation_key_rejected() {
        let (_dir, config) = temp_config();
        assert!(config.save_generation_key("short").is_err());
        assert!(config.load_generation_key().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_generation_key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, config) = temp_config();
        config.save_generation_key("AIzaSyExampleKey123").unwrap();
        let mode = std::fs::metadata(config.key_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("AIzaSyExampleKey123"), "AIza...y123");
        assert_eq!(mask_key("short"), "*****");
    }
}

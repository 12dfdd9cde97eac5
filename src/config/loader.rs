//! Configuration loading with multi-layer merge

use super::ApiConfig;
use crate::store::SessionStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level taskflow configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TaskflowConfig {
    /// Workflow service connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Global defaults
    #[serde(default)]
    pub defaults: Defaults,

    /// Session persistence
    #[serde(default)]
    pub store: StoreConfig,
}

/// Global default settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Output mode: console, json or quiet
    pub output: Option<String>,

    /// Log file (in addition to stderr)
    pub log_file: Option<String>,
}

/// Session persistence settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Database path (defaults to the user data dir)
    pub path: Option<String>,

    /// Save the session after every command that changes it (default on)
    pub autosave: Option<bool>,
}

impl StoreConfig {
    pub fn autosave(&self) -> bool {
        self.autosave.unwrap_or(true)
    }
}

impl TaskflowConfig {
    /// Load configuration from the standard hierarchy
    ///
    /// Load order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. ~/.config/taskflow/config.toml
    /// 3. .taskflow/config.toml (project)
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        // Load user config
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                let user_config = Self::load_file(&user_config_path)
                    .with_context(|| format!("loading {}", user_config_path.display()))?;
                config.merge(user_config);
            }
        }

        // Load project config
        let project_config_path = project_dir
            .map(|p| p.join(".taskflow/config.toml"))
            .unwrap_or_else(|| PathBuf::from(".taskflow/config.toml"));

        if project_config_path.exists() {
            let project_config = Self::load_file(&project_config_path)
                .with_context(|| format!("loading {}", project_config_path.display()))?;
            config.merge(project_config);
        }

        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Get the user config path (~/.config/taskflow/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("taskflow/config.toml"))
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        self.api.merge(other.api);

        if other.defaults.output.is_some() {
            self.defaults.output = other.defaults.output;
        }
        if other.defaults.log_file.is_some() {
            self.defaults.log_file = other.defaults.log_file;
        }

        if other.store.path.is_some() {
            self.store.path = other.store.path;
        }
        if other.store.autosave.is_some() {
            self.store.autosave = other.store.autosave;
        }
    }

    /// Session database path, `~` expanded
    pub fn store_path(&self) -> Result<PathBuf> {
        match self.store.path {
            Some(ref path) => Ok(expand_path(path)),
            None => SessionStore::default_path(),
        }
    }

    /// Configured log file, `~` expanded
    pub fn log_file(&self) -> Option<PathBuf> {
        self.defaults.log_file.as_deref().map(expand_path)
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_load_empty_config() {
        let config = TaskflowConfig::default();
        assert!(config.api.is_default());
        assert!(config.store.autosave());
        assert!(config.defaults.output.is_none());
    }

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
[api]
base_url = "https://studio.example.com/api"
api_key_env = "STUDIO_API_KEY"
timeout = 120

[defaults]
output = "json"

[store]
path = "/tmp/taskflow-test/sessions.db"
autosave = false
"#
        )
        .unwrap();

        let config = TaskflowConfig::load_file(&config_path).unwrap();
        assert_eq!(config.api.base_url(), "https://studio.example.com/api");
        assert_eq!(config.api.api_key_env.as_deref(), Some("STUDIO_API_KEY"));
        assert_eq!(config.api.timeout(), 120);
        assert_eq!(config.defaults.output.as_deref(), Some("json"));
        assert!(!config.store.autosave());
        assert_eq!(
            config.store_path().unwrap(),
            PathBuf::from("/tmp/taskflow-test/sessions.db")
        );
    }

    #[test]
    fn test_config_merge() {
        let mut base = TaskflowConfig::default();
        base.api.base_url = Some("https://user.example.com/api".into());
        base.api.api_key = Some("sk-user".into());

        let mut project = TaskflowConfig::default();
        project.api.base_url = Some("https://project.example.com/api".into());
        project.defaults.output = Some("quiet".into());

        base.merge(project);

        assert_eq!(base.api.base_url(), "https://project.example.com/api");
        // Not set in project, user value survives
        assert_eq!(base.api.api_key.as_deref(), Some("sk-user"));
        assert_eq!(base.defaults.output.as_deref(), Some("quiet"));
    }

    #[test]
    fn test_later_layer_restates_defaults() {
        let dir = TempDir::new().unwrap();
        let user = dir.path().join("user.toml");
        std::fs::write(
            &user,
            "[api]\nbase_url = \"https://user.example.com/api\"\ntimeout = 30\n\n[store]\nautosave = false\n",
        )
        .unwrap();
        let project = dir.path().join("project.toml");
        std::fs::write(
            &project,
            "[api]\nbase_url = \"http://localhost:3000/api\"\ntimeout = 600\n\n[store]\nautosave = true\n",
        )
        .unwrap();

        let mut config = TaskflowConfig::default();
        config.merge(TaskflowConfig::load_file(&user).unwrap());
        assert!(!config.store.autosave());
        assert_eq!(config.api.timeout(), 30);

        config.merge(TaskflowConfig::load_file(&project).unwrap());
        assert!(config.store.autosave());
        assert_eq!(config.api.base_url(), "http://localhost:3000/api");
        assert_eq!(config.api.timeout(), 600);

        // A layer that leaves a field out keeps the earlier value
        let mut config = TaskflowConfig::default();
        config.merge(TaskflowConfig::load_file(&user).unwrap());
        config.merge(TaskflowConfig::default());
        assert!(!config.store.autosave());
        assert_eq!(config.api.base_url(), "https://user.example.com/api");
    }

    #[test]
    fn test_project_config_loaded() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".taskflow")).unwrap();
        std::fs::write(
            dir.path().join(".taskflow/config.toml"),
            "[api]\nbase_url = \"https://project.example.com/api\"\n",
        )
        .unwrap();

        let config = TaskflowConfig::load(Some(dir.path())).unwrap();
        assert_eq!(config.api.base_url(), "https://project.example.com/api");
    }

    #[test]
    fn test_unknown_section_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[backends.claude]\ncommand = \"claude\"\n").unwrap();

        assert!(TaskflowConfig::load_file(&path).is_err());
    }

    #[test]
    fn test_tilde_expansion() {
        let config = TaskflowConfig {
            defaults: Defaults {
                log_file: Some("~/taskflow.log".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let log = config.log_file().unwrap();
        assert!(!log.to_string_lossy().starts_with('~'));
        assert!(log.ends_with("taskflow.log"));
    }
}

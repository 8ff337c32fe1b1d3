use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key the settings record is stored under inside the settings document.
pub const SETTINGS_KEY: &str = "settings";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub github_token: Option<String>,
    pub org_name: Option<String>,
    pub team_names: Vec<String>,
    pub teams: BTreeMap<String, TeamSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TeamSettings {
    pub repositories: Vec<String>,
}

/// Fields to overwrite in a partial save; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub github_token: Option<String>,
    pub org_name: Option<String>,
    pub team_names: Option<Vec<String>>,
    pub teams: Option<BTreeMap<String, TeamSettings>>,
}

impl Settings {
    pub fn merge(&mut self, patch: SettingsPatch) {
        if let Some(github_token) = patch.github_token {
            self.github_token = Some(github_token);
        }
        if let Some(org_name) = patch.org_name {
            self.org_name = Some(org_name);
        }
        if let Some(team_names) = patch.team_names {
            self.team_names = team_names;
        }
        if let Some(teams) = patch.teams {
            self.teams.extend(teams);
        }
    }
}

/// Where user settings live. Callers get one injected rather than reaching
/// for a global.
pub trait SettingsRepository: Send + Sync {
    fn load(&self) -> Result<Settings>;

    fn save_all(&self, settings: &Settings) -> Result<()>;

    fn load_team(&self, team_name: &str) -> Result<Option<TeamSettings>> {
        Ok(self.load()?.teams.remove(team_name))
    }

    fn partial_save(&self, patch: SettingsPatch) -> Result<()> {
        let mut settings = self.load()?;
        settings.merge(patch);
        self.save_all(&settings)
    }

    fn partial_save_team(&self, team_name: &str, repositories: Vec<String>) -> Result<()> {
        let mut teams = BTreeMap::new();
        teams.insert(team_name.to_string(), TeamSettings { repositories });
        self.partial_save(SettingsPatch {
            teams: Some(teams),
            ..SettingsPatch::default()
        })
    }
}

/// Settings kept in a JSON document on disk under [`SETTINGS_KEY`].
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings file: {:?}", self.path))?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse settings file: {:?}", self.path))
    }
}

impl SettingsRepository for JsonFileSettings {
    fn load(&self) -> Result<Settings> {
        match self.read_document()?.remove(SETTINGS_KEY) {
            Some(value) => serde_json::from_value(value)
                .with_context(|| format!("Invalid settings record in {:?}", self.path)),
            None => Ok(Settings::default()),
        }
    }

    fn save_all(&self, settings: &Settings) -> Result<()> {
        let mut document = self.read_document()?;
        document.insert(
            SETTINGS_KEY.to_string(),
            serde_json::to_value(settings).context("Failed to serialize settings")?,
        );

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {:?}", parent))?;
        }

        let raw = serde_json::to_string_pretty(&document).context("Failed to serialize settings")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write settings file: {:?}", self.path))?;

        debug!("Saved settings to {:?}", self.path);
        Ok(())
    }
}

/// Settings that only live as long as the process.
#[derive(Debug, Default)]
pub struct MemorySettings {
    settings: Mutex<Settings>,
}

impl MemorySettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsRepository for MemorySettings {
    fn load(&self) -> Result<Settings> {
        self.settings
            .lock()
            .map(|settings| settings.clone())
            .map_err(|_| anyhow!("Settings lock poisoned"))
    }

    fn save_all(&self, settings: &Settings) -> Result<()> {
        let mut stored = self
            .settings
            .lock()
            .map_err(|_| anyhow!("Settings lock poisoned"))?;
        *stored = settings.clone();
        Ok(())
    }
}

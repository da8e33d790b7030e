#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::board::model::{DEFAULT_PALETTE, is_hex_color};
use crate::error::TierboardError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub ui: UiConfig,
    pub board: BoardConfig,
    pub reminders: RemindersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(alias = "dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.config/tierboard/boards".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    #[default]
    Light,
    Dark,
    Sepia,
    Forest,
}

impl ThemeName {
    pub const ALL: [ThemeName; 4] = [Self::Light, Self::Dark, Self::Sepia, Self::Forest];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Sepia => "sepia",
            Self::Forest => "forest",
        }
    }

    #[must_use]
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub theme: ThemeName,
    pub sidebar: bool,
    /// Height of a collapsed card, borders included.
    pub card_height: u16,
    pub tilde_home: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: ThemeName::Light,
            sidebar: true,
            card_height: 4,
            tilde_home: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BoardConfig {
    pub palette: Vec<String>,
    pub column_titles: Vec<String>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.iter().map(|c| (*c).to_owned()).collect(),
            column_titles: ["Final tasks", "Parent tasks", "Child tasks", "Grandchild tasks"]
                .iter()
                .map(|t| (*t).to_owned())
                .collect(),
        }
    }
}

impl BoardConfig {
    #[must_use]
    pub fn column_title(&self, index: usize) -> &str {
        self.column_titles.get(index).map_or("", String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemindersConfig {
    pub enabled: bool,
    /// Local hour of day reminders fire at.
    pub hour: u8,
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: crate::reminder::DEFAULT_HOUR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_file: PathBuf,
}

pub fn default_paths() -> anyhow::Result<ConfigPaths> {
    let unix = home_config_path_unix();
    if !cfg!(windows) {
        return Ok(ConfigPaths { config_file: unix });
    }

    // Windows: prefer the Unix-style path if present for portability.
    if unix.exists() {
        return Ok(ConfigPaths { config_file: unix });
    }

    let proj = ProjectDirs::from("com", "tierboard", "tierboard")
        .context("failed to determine platform config directory")?;
    Ok(ConfigPaths {
        config_file: proj.config_dir().join("config.toml"),
    })
}

fn home_config_path_unix() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
    home.join(".config").join("tierboard").join("config.toml")
}

fn home_dir() -> Option<PathBuf> {
    if let Some(v) = std::env::var_os("HOME") {
        return Some(PathBuf::from(v));
    }
    if let Some(v) = std::env::var_os("USERPROFILE") {
        return Some(PathBuf::from(v));
    }
    let drive = std::env::var_os("HOMEDRIVE");
    let path = std::env::var_os("HOMEPATH");
    match (drive, path) {
        (Some(d), Some(p)) => Some(PathBuf::from(d).join(PathBuf::from(p))),
        _ => None,
    }
}

#[must_use]
pub fn expand_tilde(input: &str) -> String {
    if let Some(rest) = input.strip_prefix("~/")
        && let Some(home) = home_dir()
    {
        return home.join(rest).to_string_lossy().to_string();
    }
    input.to_owned()
}

#[must_use]
pub fn tilde_path(input: &str) -> String {
    let Some(home) = home_dir() else {
        return input.to_owned();
    };
    let home_str = home.to_string_lossy();
    if let Some(rest) = input.strip_prefix(home_str.as_ref()) {
        if rest.is_empty() {
            return "~".to_owned();
        }
        if rest.starts_with(std::path::MAIN_SEPARATOR) {
            return format!("~{rest}");
        }
    }
    input.to_owned()
}

pub fn expand_path(input: &str) -> anyhow::Result<PathBuf> {
    let expanded = expand_env_vars(&expand_tilde(input));
    let p = PathBuf::from(expanded);
    if p.is_absolute() {
        return Ok(p);
    }
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    Ok(cwd.join(p))
}

fn expand_env_vars(input: &str) -> String {
    // Expand $VAR and ${VAR}. Leave unknown vars untouched.
    let Ok(re) = regex::Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?") else {
        return input.to_owned();
    };
    re.replace_all(input, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        std::env::var(key).unwrap_or_else(|_| caps[0].to_owned())
    })
    .to_string()
}

pub fn load() -> anyhow::Result<(Config, toml_edit::DocumentMut, ConfigPaths)> {
    let paths = default_paths()?;
    let (doc, cfg) = load_from_file(&paths.config_file)?;
    cfg.validate()?;
    Ok((cfg, doc, paths))
}

pub fn list_resolved_toml() -> anyhow::Result<String> {
    let (cfg, _doc, _paths) = load()?;
    Ok(toml::to_string_pretty(&cfg)?)
}

pub fn get_value_string(key: &str) -> anyhow::Result<Option<String>> {
    let paths = default_paths()?;
    get_value_string_at_path(&paths.config_file, key)
}

pub fn set_value_string(key: &str, value: &str) -> anyhow::Result<()> {
    let paths = default_paths()?;
    set_value_string_at_path(&paths.config_file, key, value)
}

pub fn load_from_file(path: &Path) -> anyhow::Result<(toml_edit::DocumentMut, Config)> {
    if !path.exists() {
        return Ok((toml_edit::DocumentMut::new(), Config::default()));
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let doc = raw
        .parse::<toml_edit::DocumentMut>()
        .with_context(|| format!("failed to parse TOML in {}", path.display()))?;

    let cfg: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to deserialize TOML in {}", path.display()))?;
    Ok((doc, cfg))
}

pub fn get_value_string_at_path(path: &Path, key: &str) -> anyhow::Result<Option<String>> {
    let (_doc, cfg) = load_from_file(path)?;
    cfg.validate()?;

    let norm = normalize_key(key);
    let value = lookup_value(&cfg, &norm);
    Ok(value.map(format_value_for_stdout))
}

pub fn set_value_string_at_path(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let (mut doc, cfg) = load_from_file(path)?;
    cfg.validate()?;

    let (norm_key, value_item) = normalize_key_and_parse_value(key, value)?;
    apply_set(&mut doc, &norm_key, value_item)?;

    // Validate by re-parsing the updated doc into a Config.
    let new_raw = doc.to_string();
    let new_cfg: Config = toml::from_str(&new_raw)
        .with_context(|| format!("config update produced invalid TOML for {}", path.display()))?;
    new_cfg.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, new_raw.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

impl Config {
    pub fn validate(&self) -> Result<(), TierboardError> {
        if self.storage.data_dir.trim().is_empty() {
            return Err(TierboardError::Config(
                "storage.data_dir must not be empty".to_owned(),
            ));
        }
        if self.ui.card_height < 3 {
            return Err(TierboardError::Config(
                "ui.card_height must be >= 3".to_owned(),
            ));
        }
        if self.board.palette.is_empty() {
            return Err(TierboardError::Config(
                "board.palette must list at least one color".to_owned(),
            ));
        }
        if let Some(bad) = self.board.palette.iter().find(|c| !is_hex_color(c)) {
            return Err(TierboardError::Config(format!(
                "board.palette: '{bad}' is not a #RRGGBB color"
            )));
        }
        if self.board.column_titles.len() != 4 {
            return Err(TierboardError::Config(
                "board.column_titles must have exactly 4 entries".to_owned(),
            ));
        }
        if self.reminders.hour > 23 {
            return Err(TierboardError::Config(
                "reminders.hour must be between 0 and 23".to_owned(),
            ));
        }
        Ok(())
    }

    /// Root of the board store, with `~` and env vars expanded.
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        expand_path(&self.storage.data_dir)
    }

    pub fn session_path(&self) -> anyhow::Result<PathBuf> {
        Ok(self.data_dir()?.join("session.json"))
    }

    pub fn log_path(&self) -> anyhow::Result<PathBuf> {
        Ok(self.data_dir()?.join("tierboard.log"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyType {
    Bool,
    Int,
    String,
    /// Comma-separated on the command line, an array in the file.
    List,
    Enum(&'static [&'static str]),
}

fn normalize_key(key: &str) -> String {
    match key.trim() {
        "theme" => "ui.theme",
        "storage.dir" | "data_dir" => "storage.data_dir",
        "palette" => "board.palette",
        "reminder.hour" => "reminders.hour",
        "reminder.enabled" => "reminders.enabled",
        other => other,
    }
    .to_owned()
}

fn normalize_key_and_parse_value(
    key: &str,
    value: &str,
) -> anyhow::Result<(String, toml_edit::Item)> {
    let norm = normalize_key(key);
    let key_type = key_type(&norm).ok_or_else(|| TierboardError::InvalidConfigKey(key.to_owned()))?;
    let invalid = |msg: String| TierboardError::InvalidConfigValue {
        key: key.to_owned(),
        msg,
    };
    let item = match key_type {
        KeyType::Bool => toml_edit::value(parse_bool(value).map_err(invalid)?),
        KeyType::Int => toml_edit::value(parse_int(value).map_err(invalid)?),
        KeyType::String => toml_edit::value(value),
        KeyType::List => {
            let mut array = toml_edit::Array::new();
            for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                array.push(part);
            }
            toml_edit::value(array)
        }
        KeyType::Enum(allowed) => {
            let v = value.trim();
            if !allowed.contains(&v) {
                return Err(invalid(format!("must be one of: {}", allowed.join(", "))).into());
            }
            toml_edit::value(v)
        }
    };

    Ok((norm, item))
}

fn key_type(key: &str) -> Option<KeyType> {
    Some(match key {
        "storage.data_dir" => KeyType::String,
        "ui.sidebar" | "ui.tilde_home" | "reminders.enabled" => KeyType::Bool,
        "ui.card_height" | "reminders.hour" => KeyType::Int,
        "board.palette" | "board.column_titles" => KeyType::List,
        "ui.theme" => KeyType::Enum(&["light", "dark", "sepia", "forest"]),
        _ => return None,
    })
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(format!("expected true|false, got '{other}'")),
    }
}

fn parse_int(s: &str) -> Result<i64, String> {
    s.trim()
        .parse::<i64>()
        .map_err(|e| format!("expected integer, got '{s}': {e}"))
}

fn apply_set(
    doc: &mut toml_edit::DocumentMut,
    key: &str,
    value: toml_edit::Item,
) -> anyhow::Result<()> {
    let parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
    let Some((leaf, sections)) = parts.split_last() else {
        return Err(TierboardError::InvalidConfigKey(key.to_owned()).into());
    };

    let mut cur = doc.as_table_mut();
    for seg in sections {
        if !cur.contains_key(seg) {
            let mut t = toml_edit::Table::new();
            t.set_implicit(true);
            cur.insert(seg, toml_edit::Item::Table(t));
        }
        cur = cur[seg].as_table_mut().ok_or_else(|| {
            TierboardError::Config(format!("cannot set {key}: '{seg}' is not a table"))
        })?;
    }

    cur.insert(leaf, value);
    Ok(())
}

fn lookup_value(cfg: &Config, key: &str) -> Option<serde_json::Value> {
    let mut v = serde_json::to_value(cfg).ok()?;
    for seg in key.split('.').filter(|s| !s.is_empty()) {
        match v {
            serde_json::Value::Object(mut map) => {
                v = map.remove(seg)?;
            }
            _ => return None,
        }
    }
    Some(v)
}

fn format_value_for_stdout(v: serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_owned(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s,
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(format_value_for_stdout)
            .collect::<Vec<_>>()
            .join(","),
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
        assert_eq!(Config::default().board.palette.len(), 16);
    }

    #[test]
    fn config_validation_catches_invalid_values() {
        let mut cfg = Config::default();
        cfg.ui.card_height = 2;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.board.palette = vec!["teal".to_owned()];
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.reminders.hour = 24;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_set_and_get_dot_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");

        set_value_string_at_path(&path, "ui.sidebar", "false").unwrap();
        assert_eq!(
            get_value_string_at_path(&path, "ui.sidebar")
                .unwrap()
                .as_deref(),
            Some("false")
        );

        set_value_string_at_path(&path, "theme", "forest").unwrap();
        assert_eq!(
            get_value_string_at_path(&path, "ui.theme")
                .unwrap()
                .as_deref(),
            Some("forest")
        );

        set_value_string_at_path(&path, "board.palette", "#111111, #222222").unwrap();
        assert_eq!(
            get_value_string_at_path(&path, "palette")
                .unwrap()
                .as_deref(),
            Some("#111111,#222222")
        );

        let (_doc, cfg) = load_from_file(&path).unwrap();
        cfg.validate().unwrap();
        assert!(!cfg.ui.sidebar);
        assert_eq!(cfg.ui.theme, ThemeName::Forest);
        assert_eq!(cfg.board.palette, vec!["#111111", "#222222"]);
    }

    #[test]
    fn rejected_updates_leave_the_file_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");

        assert!(set_value_string_at_path(&path, "ui.theme", "neon").is_err());
        assert!(set_value_string_at_path(&path, "reminders.hour", "25").is_err());
        assert!(set_value_string_at_path(&path, "board.palette", "nope").is_err());
        assert!(set_value_string_at_path(&path, "no.such.key", "1").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn theme_cycles() {
        let order: Vec<ThemeName> = std::iter::successors(Some(ThemeName::Light), |t| Some(t.next()))
            .take(5)
            .collect();
        assert_eq!(
            order,
            vec![
                ThemeName::Light,
                ThemeName::Dark,
                ThemeName::Sepia,
                ThemeName::Forest,
                ThemeName::Light
            ]
        );
    }
}

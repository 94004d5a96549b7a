//! Audit settings
//!
//! Every option has a default, so an empty file (or no file) is a valid
//! configuration. Unknown keys are ignored; malformed patterns and unknown
//! enum values are rejected at load time.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};
use crate::logging::LogLevel;
use crate::scope::pattern::SearchPattern;

/// Event sources that can be switched on and off
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Request,
    Model,
    Unspecified,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Module::Request => write!(f, "request"),
            Module::Model => write!(f, "model"),
            Module::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Which side of an HTTP exchange gets its payload captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadDirection {
    Request,
    Response,
}

/// Request exclusion scopes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestExclusion {
    #[serde(default)]
    pub unknown: bool,

    #[serde(default)]
    pub applications: Vec<SearchPattern>,

    /// HTTP methods, compared case-insensitively
    #[serde(default)]
    pub methods: BTreeSet<String>,

    #[serde(default = "default_excluded_status")]
    pub status: BTreeSet<u16>,
}

impl Default for RequestExclusion {
    fn default() -> Self {
        Self {
            unknown: false,
            applications: Vec::new(),
            methods: BTreeSet::new(),
            status: default_excluded_status(),
        }
    }
}

/// Request/response payload capture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestData {
    #[serde(default)]
    pub enabled: BTreeSet<PayloadDirection>,

    /// Record the query string separately from the path
    #[serde(default)]
    pub query: bool,

    /// Payload keys removed before storing
    #[serde(default)]
    pub ignore: BTreeSet<String>,

    /// Payload keys replaced by the redaction token
    #[serde(default = "default_payload_mask")]
    pub mask: BTreeSet<String>,

    #[serde(default = "default_content_types")]
    pub content_types: BTreeSet<String>,
}

impl Default for RequestData {
    fn default() -> Self {
        Self {
            enabled: BTreeSet::new(),
            query: false,
            ignore: BTreeSet::new(),
            mask: default_payload_mask(),
            content_types: default_content_types(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSettings {
    #[serde(default)]
    pub loglevel: LogLevel,

    /// Record the client address
    #[serde(default = "default_true")]
    pub ip: bool,

    #[serde(default)]
    pub exclude: RequestExclusion,

    #[serde(default)]
    pub data: RequestData,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            loglevel: LogLevel::default(),
            ip: true,
            exclude: RequestExclusion::default(),
            data: RequestData::default(),
        }
    }
}

/// Model exclusion scopes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelExclusion {
    #[serde(default)]
    pub unknown: bool,

    #[serde(default)]
    pub applications: Vec<SearchPattern>,

    #[serde(default)]
    pub models: Vec<SearchPattern>,

    #[serde(default)]
    pub fields: Vec<SearchPattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default)]
    pub loglevel: LogLevel,

    #[serde(default)]
    pub exclude: ModelExclusion,

    /// Field names whose values are redacted
    #[serde(default)]
    pub mask: Vec<SearchPattern>,

    /// Append the changeset summary to the log line
    #[serde(default = "default_true")]
    pub detailed_message: bool,

    /// Measure time between before-write and after-write
    #[serde(default)]
    pub performance: bool,

    /// Embed the full entity state in each event
    #[serde(default)]
    pub snapshot: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            loglevel: LogLevel::default(),
            exclude: ModelExclusion::default(),
            mask: Vec::new(),
            detailed_message: true,
            performance: false,
            snapshot: false,
        }
    }
}

/// Log source exclusion scopes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnspecifiedExclusion {
    #[serde(default)]
    pub unknown: bool,

    #[serde(default)]
    pub applications: Vec<SearchPattern>,

    #[serde(default)]
    pub files: Vec<SearchPattern>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnspecifiedSettings {
    #[serde(default)]
    pub loglevel: LogLevel,

    #[serde(default)]
    pub exclude: UnspecifiedExclusion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalExclusion {
    #[serde(default = "default_global_applications")]
    pub applications: Vec<SearchPattern>,
}

impl Default for GlobalExclusion {
    fn default() -> Self {
        Self {
            applications: default_global_applications(),
        }
    }
}

/// Scopes merged into every module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default)]
    pub exclude: GlobalExclusion,
}

/// Longest accepted retention, in days
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Event store retention
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionSettings {
    /// Drop events older than this many days when writing a batch
    #[serde(default)]
    pub max_age_days: Option<u32>,
}

impl RetentionSettings {
    pub fn max_age(&self) -> Option<chrono::Duration> {
        self.max_age_days
            .map(|days| chrono::Duration::days(i64::from(days)))
    }
}

/// Effective audit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_modules")]
    pub modules: BTreeSet<Module>,

    #[serde(default)]
    pub request: RequestSettings,

    #[serde(default)]
    pub model: ModelSettings,

    #[serde(default)]
    pub unspecified: UnspecifiedSettings,

    #[serde(default)]
    pub globals: GlobalSettings,

    #[serde(default)]
    pub retention: RetentionSettings,
}

fn default_true() -> bool {
    true
}

fn default_modules() -> BTreeSet<Module> {
    [Module::Request, Module::Model, Module::Unspecified]
        .into_iter()
        .collect()
}

fn default_excluded_status() -> BTreeSet<u16> {
    [200].into_iter().collect()
}

fn default_payload_mask() -> BTreeSet<String> {
    ["password".to_string()].into_iter().collect()
}

fn default_content_types() -> BTreeSet<String> {
    ["application/json".to_string()].into_iter().collect()
}

fn default_global_applications() -> Vec<SearchPattern> {
    let mut patterns = Vec::new();
    if let Ok(session) = SearchPattern::glob("session*") {
        patterns.push(session);
    }
    for name in ["admin", "basehttp", "migrations", "contenttypes"] {
        if let Ok(pattern) = SearchPattern::plain(name) {
            patterns.push(pattern);
        }
    }
    patterns
}

impl Default for Settings {
    fn default() -> Self {
        let mut settings = Self {
            modules: default_modules(),
            request: RequestSettings::default(),
            model: ModelSettings::default(),
            unspecified: UnspecifiedSettings::default(),
            globals: GlobalSettings::default(),
            retention: RetentionSettings::default(),
        };
        settings.normalize();
        settings
    }
}

impl Settings {
    /// Parse JSON settings
    pub fn from_json_str(contents: &str) -> AuditResult<Self> {
        let mut settings: Settings = serde_json::from_str(contents)
            .map_err(|e| AuditError::Config(format!("Failed to parse settings: {}", e)))?;
        settings.normalize();
        settings.validate()?;
        Ok(settings)
    }

    /// Parse YAML settings
    pub fn from_yaml_str(contents: &str) -> AuditResult<Self> {
        // An empty YAML document deserializes as null
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut settings: Settings = serde_yaml::from_str(contents)
            .map_err(|e| AuditError::Config(format!("Failed to parse settings: {}", e)))?;
        settings.normalize();
        settings.validate()?;
        Ok(settings)
    }

    /// Load a settings file, choosing the format by extension
    pub fn load(path: &Path) -> AuditResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AuditError::Io(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }

    /// Load settings if the file exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> AuditResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Serialize as YAML (used by `config show`)
    pub fn to_yaml(&self) -> AuditResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn is_enabled(&self, module: Module) -> bool {
        self.modules.contains(&module)
    }

    /// Canonicalize values and union the global application scope into
    /// every module. Safe to call more than once.
    fn normalize(&mut self) {
        let globals = self.globals.exclude.applications.clone();
        merge_patterns(&mut self.request.exclude.applications, &globals);
        merge_patterns(&mut self.model.exclude.applications, &globals);
        merge_patterns(&mut self.unspecified.exclude.applications, &globals);

        self.request.exclude.methods = self
            .request
            .exclude
            .methods
            .iter()
            .map(|m| m.trim().to_uppercase())
            .collect();
        self.request.data.content_types = self
            .request
            .data
            .content_types
            .iter()
            .map(|c| c.trim().to_lowercase())
            .collect();
        self.request.data.ignore = lowercase_keys(&self.request.data.ignore);
        self.request.data.mask = lowercase_keys(&self.request.data.mask);
    }

    /// Reject values that parse but cannot be used
    fn validate(&self) -> AuditResult<()> {
        match self.retention.max_age_days {
            Some(0) => Err(AuditError::Config(
                "retention.max_age_days must be at least 1".into(),
            )),
            Some(days) if days > MAX_RETENTION_DAYS => Err(AuditError::Config(format!(
                "retention.max_age_days must not exceed {} (got {})",
                MAX_RETENTION_DAYS, days
            ))),
            _ => Ok(()),
        }
    }
}

fn lowercase_keys(keys: &BTreeSet<String>) -> BTreeSet<String> {
    keys.iter().map(|k| k.trim().to_lowercase()).collect()
}

/// Append every pattern of `extra` not already present
fn merge_patterns(target: &mut Vec<SearchPattern>, extra: &[SearchPattern]) {
    for pattern in extra {
        if !target.contains(pattern) {
            target.push(pattern.clone());
        }
    }
}

/// Shared, atomically replaceable settings
///
/// Readers take one snapshot per operation with [`ConfigHandle::load`] and
/// evaluate against it only; [`ConfigHandle::reload`] swaps the whole value.
#[derive(Debug)]
pub struct ConfigHandle {
    current: ArcSwap<Settings>,
}

impl ConfigHandle {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: ArcSwap::from_pointee(settings),
        }
    }

    /// Current settings snapshot
    pub fn load(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    /// Replace the settings
    pub fn reload(&self, settings: Settings) {
        self.current.store(Arc::new(settings));
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::pattern::PatternKind;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.modules.len(), 3);
        assert!(settings.request.exclude.status.contains(&200));
        assert!(settings.request.exclude.methods.is_empty());
        assert!(settings.request.ip);
        assert!(settings.request.data.mask.contains("password"));
        assert!(settings.request.data.content_types.contains("application/json"));
        assert!(settings.model.detailed_message);
        assert!(!settings.model.snapshot);
        assert!(settings.retention.max_age_days.is_none());
    }

    #[test]
    fn test_globals_merged_into_modules() {
        let settings = Settings::default();
        for applications in [
            &settings.request.exclude.applications,
            &settings.model.exclude.applications,
            &settings.unspecified.exclude.applications,
        ] {
            assert_eq!(applications.len(), 5);
            assert_eq!(applications[0].kind(), PatternKind::Glob);
            assert_eq!(applications[0].value(), "session*");
        }
    }

    #[test]
    fn test_merge_deduplicates() {
        let json = r#"{
            "model": {"exclude": {"applications": ["pl:admin", "gl:shop*"]}}
        }"#;
        let settings = Settings::from_json_str(json).unwrap();
        let apps: Vec<String> = settings
            .model
            .exclude
            .applications
            .iter()
            .map(|p| p.to_string())
            .collect();

        assert_eq!(apps.iter().filter(|a| *a == "plain:admin").count(), 1);
        assert!(apps.contains(&"glob:shop*".to_string()));
        assert_eq!(apps.len(), 6);
    }

    #[test]
    fn test_yaml_settings() {
        let yaml = r#"
modules: [model]
model:
  mask: [password]
  exclude:
    models: ["re:^Temp"]
request:
  exclude:
    methods: [get]
    status: []
retention:
  max_age_days: 30
"#;
        let settings = Settings::from_yaml_str(yaml).unwrap();
        assert!(settings.is_enabled(Module::Model));
        assert!(!settings.is_enabled(Module::Request));
        assert_eq!(settings.model.mask.len(), 1);
        assert!(settings.request.exclude.methods.contains("GET"));
        assert!(settings.request.exclude.status.is_empty());
        assert_eq!(settings.retention.max_age_days, Some(30));
    }

    #[test]
    fn test_pattern_map_form() {
        let json = r#"{"model": {"exclude": {"models": [{"type": "plain", "value": "Order"}]}}}"#;
        let settings = Settings::from_json_str(json).unwrap();
        assert_eq!(settings.model.exclude.models[0].kind(), PatternKind::Plain);
        assert_eq!(settings.model.exclude.models[0].value(), "order");
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        assert!(Settings::from_json_str(r#"{"modules": ["model", "bogus"]}"#).is_err());
        assert!(Settings::from_json_str(r#"{"model": {"mask": ["re:("]}}"#).is_err());
        assert!(Settings::from_json_str(r#"{"model": {"loglevel": "loud"}}"#).is_err());
        assert!(
            Settings::from_json_str(r#"{"request": {"data": {"enabled": ["sideways"]}}}"#)
                .is_err()
        );
    }

    #[test]
    fn test_retention_range() {
        let err = Settings::from_json_str(r#"{"retention": {"max_age_days": 4000000000}}"#)
            .unwrap_err();
        assert!(err.is_config());
        assert!(Settings::from_yaml_str("retention:\n  max_age_days: 0\n").is_err());

        let settings = Settings::from_json_str(r#"{"retention": {"max_age_days": 30}}"#).unwrap();
        assert_eq!(settings.retention.max_age(), Some(chrono::Duration::days(30)));
    }

    #[test]
    fn test_payload_keys_lowercased() {
        let settings = Settings::from_json_str(
            r#"{"request": {"data": {"ignore": ["CSRF_Token"], "mask": ["Password", "ApiKey"]}}}"#,
        )
        .unwrap();
        assert!(settings.request.data.ignore.contains("csrf_token"));
        assert!(settings.request.data.mask.contains("password"));
        assert!(settings.request.data.mask.contains("apikey"));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let settings = Settings::from_json_str(r#"{"flavour": "vanilla"}"#).unwrap();
        assert_eq!(settings.modules.len(), 3);
    }

    #[test]
    fn test_load_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "model:\n  snapshot: true").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert!(settings.model.snapshot);

        let missing = temp_dir.path().join("missing.json");
        let defaults = Settings::load_or_default(&missing).unwrap();
        assert!(!defaults.model.snapshot);
    }

    #[test]
    fn test_config_handle_reload() {
        let handle = ConfigHandle::default();
        let before = handle.load();

        let mut updated = Settings::default();
        updated.model.snapshot = true;
        handle.reload(updated);

        assert!(!before.model.snapshot);
        assert!(handle.load().model.snapshot);
    }
}

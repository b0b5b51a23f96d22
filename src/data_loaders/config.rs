use std::path::Path;

use serde_yaml::{Mapping, Value};

use super::yaml::load_yaml;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub debug: bool,
    pub log_level: String,
    pub settings: AppSettings,
}

#[derive(Debug, Clone, Default)]
pub struct AppSettings {
    pub behavior: BehaviorSettings,
    pub preview: PreviewSettings,
    pub diagnostics: DiagnosticsSettings,
    pub development: DevelopmentSettings,
}

#[derive(Debug, Clone, Default)]
pub struct BehaviorSettings {
    pub apply_mode: ApplyMode,
}

#[derive(Debug, Clone, Default)]
pub struct PreviewSettings {
    pub warn_on_decode_failure: bool,
}

#[derive(Debug, Clone)]
pub struct DiagnosticsSettings {
    pub show_registry_button: bool,
    pub log_operations: bool,
}

#[derive(Debug, Clone)]
pub struct DevelopmentSettings {
    pub debug: bool,
    pub log_level: String,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            show_registry_button: true,
            log_operations: true,
        }
    }
}

impl Default for DevelopmentSettings {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let settings = AppSettings::default();
        Self {
            debug: settings.development.debug,
            log_level: settings.development.log_level.clone(),
            settings,
        }
    }
}

/// When the registry write happens relative to picking a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyMode {
    /// Apply fires as soon as the picker returns a path.
    #[default]
    OnSelect,
    /// Apply waits for its own button.
    Explicit,
}

impl ApplyMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "on-select" | "on_select" | "onselect" | "auto" | "automatic" | "immediate" => {
                Some(Self::OnSelect)
            }
            "explicit" | "manual" | "button" => Some(Self::Explicit),
            _ => None,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Option<Self> {
        let value = load_yaml(path)?;
        Self::from_yaml(&value)
    }

    pub fn from_yaml(root: &Value) -> Option<Self> {
        let map = root.as_mapping()?;

        let settings = parse_settings(map);
        let debug = settings.development.debug;
        let log_level = settings.development.log_level.clone();

        Some(Self {
            debug,
            log_level,
            settings,
        })
    }

    pub fn apply_mode(&self) -> ApplyMode {
        self.settings.behavior.apply_mode
    }
}

fn parse_settings(root: &Mapping) -> AppSettings {
    let mut settings = AppSettings::default();

    settings.development.debug = bool_at(root, "debug").unwrap_or(settings.development.debug);
    settings.development.log_level = str_at(root, "log_level")
        .unwrap_or(&settings.development.log_level)
        .to_lowercase();

    let settings_map = mapping_at(root, "settings");
    let behavior_map = settings_map.and_then(|v| mapping_at(v, "behavior"));
    let preview_map = settings_map.and_then(|v| mapping_at(v, "preview"));
    let diagnostics_map = settings_map.and_then(|v| mapping_at(v, "diagnostics"));
    let development_map = settings_map.and_then(|v| mapping_at(v, "development"));

    if let Some(behavior) = behavior_map {
        settings.behavior.apply_mode = str_any(behavior, &["apply_mode", "apply", "mode"])
            .and_then(ApplyMode::parse)
            .unwrap_or(settings.behavior.apply_mode);
    }

    if let Some(preview) = preview_map {
        settings.preview.warn_on_decode_failure = bool_any(
            preview,
            &["warn_on_decode_failure", "warn_on_error", "show_decode_errors"],
        )
        .unwrap_or(settings.preview.warn_on_decode_failure);
    }

    if let Some(diag) = diagnostics_map {
        settings.diagnostics.show_registry_button = bool_any(
            diag,
            &["show_registry_button", "show_registry_values", "debug_button"],
        )
        .unwrap_or(settings.diagnostics.show_registry_button);
        settings.diagnostics.log_operations = bool_any(diag, &["log_operations", "log_registry_ops"])
            .unwrap_or(settings.diagnostics.log_operations);
    }

    if let Some(dev) = development_map {
        settings.development.debug =
            bool_any(dev, &["debug", "debug_mode"]).unwrap_or(settings.development.debug);
        settings.development.log_level = str_any(dev, &["log_level", "logging"])
            .unwrap_or(&settings.development.log_level)
            .to_lowercase();
    }

    settings
}

fn bool_at(map: &Mapping, key: &str) -> Option<bool> {
    map.get(Value::String(key.to_string()))?.as_bool()
}

fn bool_any(map: &Mapping, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| bool_at(map, k))
}

fn str_at<'a>(map: &'a Mapping, key: &str) -> Option<&'a str> {
    map.get(Value::String(key.to_string()))?.as_str()
}

fn str_any<'a>(map: &'a Mapping, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| str_at(map, k))
}

fn mapping_at<'a>(map: &'a Mapping, key: &str) -> Option<&'a Mapping> {
    map.get(Value::String(key.to_string()))?.as_mapping()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loaders::yaml::parse_yaml;

    fn config(txt: &str) -> AppConfig {
        AppConfig::from_yaml(&parse_yaml(txt).unwrap()).unwrap()
    }

    #[test]
    fn empty_mapping_gives_defaults() {
        let cfg = config("{}");
        assert!(!cfg.debug);
        assert_eq!(cfg.log_level, "warn");
        assert_eq!(cfg.apply_mode(), ApplyMode::OnSelect);
        assert!(!cfg.settings.preview.warn_on_decode_failure);
        assert!(cfg.settings.diagnostics.show_registry_button);
        assert!(cfg.settings.diagnostics.log_operations);
    }

    #[test]
    fn explicit_apply_mode_and_aliases() {
        let cfg = config("settings:\n  behavior:\n    apply_mode: explicit\n");
        assert_eq!(cfg.apply_mode(), ApplyMode::Explicit);

        let cfg = config("settings:\n  behavior:\n    mode: manual\n");
        assert_eq!(cfg.apply_mode(), ApplyMode::Explicit);

        let cfg = config("settings:\n  behavior:\n    apply: Automatic\n");
        assert_eq!(cfg.apply_mode(), ApplyMode::OnSelect);
    }

    #[test]
    fn unknown_apply_mode_falls_back_to_default() {
        let cfg = config("settings:\n  behavior:\n    apply_mode: sometimes\n");
        assert_eq!(cfg.apply_mode(), ApplyMode::OnSelect);
    }

    #[test]
    fn nested_development_overrides_top_level() {
        let cfg = config(
            "debug: false\nlog_level: warn\nsettings:\n  development:\n    debug_mode: true\n    logging: INFO\n",
        );
        assert!(cfg.debug);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn preview_and_diagnostics_flags() {
        let cfg = config(
            "settings:\n  preview:\n    warn_on_decode_failure: true\n  diagnostics:\n    show_registry_button: false\n    log_operations: false\n",
        );
        assert!(cfg.settings.preview.warn_on_decode_failure);
        assert!(!cfg.settings.diagnostics.show_registry_button);
        assert!(!cfg.settings.diagnostics.log_operations);
    }

    #[test]
    fn non_mapping_root_is_rejected() {
        assert!(AppConfig::from_yaml(&parse_yaml("- a\n- b\n").unwrap()).is_none());
    }
}

//! Configuration loading from TOML files.
//!
//! Lookup order:
//! 1. `--config <PATH>` (must exist)
//! 2. `$KVTRACE_CONFIG` environment variable
//! 3. `<platform config dir>/kvtrace/config.toml`
//! 4. Built-in defaults (everything is optional)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use kvtrace_core::{
    LineParser, Marker, MarkerTable, OrphanPolicy, ParseOptions, Reconciler, Section,
    UnansweredCount,
};

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub parse: ParseOptions,
    pub reconcile: ReconcileConfig,
    pub output: OutputConfig,
    /// Ordered marker table. Replaces the built-in table when present.
    pub markers: Vec<Marker>,
}

/// Log input settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub path: PathBuf,
}

/// Reconciliation policy.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub on_orphan: OrphanPolicy,
    pub unanswered_count: UnansweredCount,
}

/// Report output settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub section: Section,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

// --- Defaults ---

impl Default for Config {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            parse: ParseOptions::default(),
            reconcile: ReconcileConfig::default(),
            output: OutputConfig::default(),
            markers: MarkerTable::default().markers().to_vec(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("output.txt"),
        }
    }
}

impl Config {
    /// Build a reconciler from the marker, parse and policy settings. A
    /// failures-only report never reads PUT timestamps.
    pub fn reconciler(&self) -> Result<Reconciler> {
        let markers = MarkerTable::new(self.markers.clone()).context("invalid [[markers]]")?;
        let parser = LineParser::new(self.parse.clone()).context("invalid [parse] section")?;
        let reconciler = Reconciler::new(markers, parser, self.reconcile.on_orphan);
        if self.output.section == Section::Failures {
            return Ok(reconciler.without_timings());
        }
        Ok(reconciler)
    }
}

/// Load config from disk. Returns defaults if no config file exists.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(p) = explicit {
        if !p.exists() {
            bail!("config file {} not found", p.display());
        }
        return read_config(p);
    }

    match config_path() {
        Some(p) if p.exists() => read_config(&p),
        _ => Ok(Config::default()),
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Resolve the config file path.
fn config_path() -> Option<PathBuf> {
    // 1. Environment variable
    if let Ok(p) = std::env::var("KVTRACE_CONFIG") {
        return Some(PathBuf::from(p));
    }

    // 2. Platform config dir
    directories::ProjectDirs::from("dev", "kvtrace", "kvtrace")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Show the active config path (for `kvtrace config`).
pub fn show_config_path(explicit: Option<&Path>) -> String {
    if let Some(p) = explicit {
        return format!("{} (explicit)", p.display());
    }
    match config_path() {
        Some(p) if p.exists() => format!("{} (loaded)", p.display()),
        Some(p) => format!("{} (not found, using defaults)", p.display()),
        None => "no config path resolved (using defaults)".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvtrace_core::{EventCategory, ParseMode};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.input.path, PathBuf::from("output.txt"));
        assert_eq!(config.parse.id_label, "mid: ");
        assert_eq!(config.parse.id_len, 16);
        assert_eq!(config.reconcile.on_orphan, OrphanPolicy::Fail);
        assert_eq!(config.reconcile.unanswered_count, UnansweredCount::Subtraction);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert_eq!(config.markers.len(), 7);
        assert!(config.reconciler().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[reconcile]
on_orphan = "skip"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.reconcile.on_orphan, OrphanPolicy::Skip);
        // Other fields should be defaults
        assert_eq!(config.parse.timestamp_start, 1);
        assert_eq!(config.markers, MarkerTable::default().markers());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[input]
path = "/tmp/cluster.log"

[parse]
mode = "tokenized"
id_label = "msg="

[reconcile]
on_orphan = "fail"
unanswered_count = "set-difference"

[output]
format = "json"
section = "times"

[[markers]]
text = "PUT start"
category = "put-request"

[[markers]]
text = "PUT done"
category = "put-response"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.input.path, PathBuf::from("/tmp/cluster.log"));
        assert_eq!(config.parse.mode, ParseMode::Tokenized);
        assert_eq!(config.parse.id_label, "msg=");
        assert_eq!(config.parse.id_len, 16);
        assert_eq!(
            config.reconcile.unanswered_count,
            UnansweredCount::SetDifference
        );
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.section, Section::Times);
        assert_eq!(config.markers.len(), 2);
        assert_eq!(config.markers[1].category, EventCategory::PutResponse);

        let reconciler = config.reconciler().unwrap();
        assert_eq!(
            reconciler.classify("[1.0] PUT done msg=x"),
            Some(EventCategory::PutResponse)
        );
    }

    #[test]
    fn test_failures_section_skips_timings() {
        let mut config = Config::default();
        assert!(config.reconciler().unwrap().tracks_timings());

        config.output.section = Section::Failures;
        let reconciler = config.reconciler().unwrap();
        assert!(!reconciler.tracks_timings());
        let data = reconciler
            .accumulate(["0000005 completed PUT mid: AAAAAAAAAAAAAAAA"])
            .unwrap();
        assert_eq!(data.put_responses.len(), 1);

        config.output.section = Section::Times;
        assert!(config.reconciler().unwrap().tracks_timings());
    }

    #[test]
    fn test_invalid_marker_rejected() {
        let toml_str = r#"
[[markers]]
text = ""
category = "redirect"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.reconciler().is_err());
    }

    #[test]
    fn test_unknown_category_fails_to_parse() {
        let toml_str = r#"
[[markers]]
text = "deleting"
category = "delete"
"#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn test_load_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kvtrace.toml");
        std::fs::write(&path, "[output]\nformat = \"json\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.output.format, OutputFormat::Json);

        let missing = dir.path().join("missing.toml");
        assert!(load_config(Some(&missing)).is_err());
    }
}

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use glob::Pattern;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = ".styleslicerc.json";

/// Import path of the bundled style library.
pub const DEFAULT_LIBRARY: &str = "@styleslice/core";

pub const TEST_FILE_PATTERNS: &[&str] = &[
    "**/*.test.tsx",
    "**/*.test.ts",
    "**/*.test.jsx",
    "**/*.test.js",
    "**/*.spec.tsx",
    "**/*.spec.ts",
    "**/*.spec.jsx",
    "**/*.spec.js",
    "**/__tests__/**",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub ignores: Vec<String>,
    #[serde(default = "default_includes")]
    pub includes: Vec<String>,
    #[serde(default = "default_source_root")]
    pub source_root: String,
    #[serde(default = "default_ignore_test_files")]
    pub ignore_test_files: bool,
    #[serde(default = "default_out_dir")]
    pub out_dir: String,
    #[serde(default = "default_class_prefix")]
    pub class_prefix: String,
    /// Evaluation fuel for the sandbox; unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u64>,
    /// Call depth limit for the sandbox; the evaluator default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(default = "default_extractors")]
    pub extractors: Vec<ExtractorConfig>,
}

/// How a recognized call site is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Every argument is style data.
    Css,
    /// The first argument names a target; the rest are style data.
    Styled,
    /// Calling it returns an object of derived extractors.
    Factory,
}

/// Which generator serializes an extractor's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Css,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractorConfig {
    pub import_path: String,
    pub symbol: String,
    pub kind: ExtractorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputFormat>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<DerivedConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedConfig {
    pub symbol: String,
    pub kind: ExtractorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputFormat>,
    /// Names a derived factory produces in turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<DerivedConfig>,
}

fn default_includes() -> Vec<String> {
    vec!["src".to_string()]
}

fn default_source_root() -> String {
    "./".to_string()
}

fn default_ignore_test_files() -> bool {
    true
}

fn default_out_dir() -> String {
    ".styleslice".to_string()
}

fn default_class_prefix() -> String {
    "ss-".to_string()
}

fn default_extractors() -> Vec<ExtractorConfig> {
    let plain = |symbol: &str, kind| ExtractorConfig {
        import_path: DEFAULT_LIBRARY.to_string(),
        symbol: symbol.to_string(),
        kind,
        output: None,
        derived: Vec::new(),
    };
    vec![
        plain("css", ExtractorKind::Css),
        plain("styled", ExtractorKind::Styled),
        ExtractorConfig {
            derived: vec![
                DerivedConfig {
                    symbol: "css".to_string(),
                    kind: ExtractorKind::Css,
                    output: None,
                    derived: Vec::new(),
                },
                DerivedConfig {
                    symbol: "styled".to_string(),
                    kind: ExtractorKind::Styled,
                    output: None,
                    derived: Vec::new(),
                },
            ],
            ..plain("createTheme", ExtractorKind::Factory)
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignores: Vec::new(),
            includes: default_includes(),
            source_root: default_source_root(),
            ignore_test_files: default_ignore_test_files(),
            out_dir: default_out_dir(),
            class_prefix: default_class_prefix(),
            max_steps: None,
            max_depth: None,
            extractors: default_extractors(),
        }
    }
}

impl Config {
    /// Validate configuration values.
    ///
    /// Rejects invalid glob patterns, class prefixes that are not valid CSS
    /// identifier characters, and malformed extractor declarations.
    pub fn validate(&self) -> Result<()> {
        for pattern in &self.ignores {
            Pattern::new(pattern)
                .with_context(|| format!("Invalid glob pattern in 'ignores': \"{}\"", pattern))?;
        }

        // Includes without wildcards are literal directories.
        for pattern in &self.includes {
            if pattern.contains('*') || pattern.contains('?') {
                Pattern::new(pattern).with_context(|| {
                    format!("Invalid glob pattern in 'includes': \"{}\"", pattern)
                })?;
            }
        }

        if !self
            .class_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            bail!("Invalid 'classPrefix': \"{}\"", self.class_prefix);
        }

        if self.max_steps == Some(0) {
            bail!("'maxSteps' must be greater than zero");
        }
        if self.max_depth == Some(0) {
            bail!("'maxDepth' must be greater than zero");
        }

        let mut seen = HashSet::new();
        for extractor in &self.extractors {
            extractor.validate()?;
            if !seen.insert((extractor.import_path.as_str(), extractor.symbol.as_str())) {
                bail!(
                    "Duplicate extractor \"{}:{}\"",
                    extractor.import_path,
                    extractor.symbol
                );
            }
        }

        Ok(())
    }
}

impl ExtractorConfig {
    fn validate(&self) -> Result<()> {
        if self.import_path.trim().is_empty() {
            bail!("Extractor 'importPath' must not be empty");
        }
        validate_shape(&self.symbol, self.kind, self.output, &self.derived)
    }
}

/// Checks one extractor declaration and, for factories, everything it derives.
fn validate_shape(
    symbol: &str,
    kind: ExtractorKind,
    output: Option<OutputFormat>,
    derived: &[DerivedConfig],
) -> Result<()> {
    validate_symbol(symbol)?;

    match kind {
        ExtractorKind::Factory => {
            if derived.is_empty() {
                bail!("Factory extractor \"{}\" declares no 'derived' names", symbol);
            }
            if output.is_some() {
                bail!("Factory extractor \"{}\" cannot set 'output'", symbol);
            }
        }
        _ if !derived.is_empty() => {
            bail!("Only factory extractors may declare 'derived' (\"{}\")", symbol);
        }
        _ => {}
    }

    let mut seen = HashSet::new();
    for child in derived {
        if !seen.insert(child.symbol.as_str()) {
            bail!("Duplicate derived extractor \"{}\" in \"{}\"", child.symbol, symbol);
        }
        validate_shape(&child.symbol, child.kind, child.output, &child.derived)?;
    }
    Ok(())
}

fn validate_symbol(symbol: &str) -> Result<()> {
    let valid = !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !symbol.starts_with(|c: char| c.is_ascii_digit());
    if !valid {
        bail!("Invalid extractor symbol: \"{}\"", symbol);
    }
    Ok(())
}

pub fn default_config_json() -> Result<String> {
    let config = Config::default();
    serde_json::to_string_pretty(&config).context("Failed to generate default config.")
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if current.join(".git").exists() {
            return None;
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Result of loading configuration.
pub struct ConfigLoadResult {
    pub config: Config,
    /// True if config was loaded from a file, false if using defaults.
    pub from_file: bool,
}

pub fn load_config(start_dir: &Path) -> Result<ConfigLoadResult> {
    match find_config_file(start_dir) {
        Some(path) => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            config.validate()?;
            Ok(ConfigLoadResult {
                config,
                from_file: true,
            })
        }
        None => Ok(ConfigLoadResult {
            config: Config::default(),
            from_file: false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::*;
    use pretty_assertions::assert_eq;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.ignores.is_empty());
        assert_eq!(config.includes, vec!["src"]);
        assert_eq!(config.out_dir, ".styleslice");
        assert_eq!(config.class_prefix, "ss-");
        assert_eq!(config.extractors.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let json = r#"{
              "ignores": ["**/dist/**"],
              "includes": ["app"],
              "classPrefix": "x-",
              "maxSteps": 5000,
              "maxDepth": 64,
              "extractors": [
                { "importPath": "my-css", "symbol": "style", "kind": "css", "output": "raw" }
              ]
          }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.ignores, vec!["**/dist/**"]);
        assert_eq!(config.includes, vec!["app"]);
        assert_eq!(config.class_prefix, "x-");
        assert_eq!(config.max_steps, Some(5000));
        assert_eq!(config.max_depth, Some(64));
        assert_eq!(
            config.extractors,
            vec![ExtractorConfig {
                import_path: "my-css".to_string(),
                symbol: "style".to_string(),
                kind: ExtractorKind::Css,
                output: Some(OutputFormat::Raw),
                derived: vec![],
            }]
        );
    }

    #[test]
    fn test_partial_config_keeps_default_extractors() {
        let json = r#"{ "ignores": ["**/dist/**"] }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.ignores, vec!["**/dist/**"]);
        assert_eq!(config.includes, default_includes());
        assert_eq!(config.extractors, default_extractors());
    }

    #[test]
    fn test_find_config_file() {
        let dir = tempdir().unwrap();
        let sub_dir = dir.path().join("src").join("components");
        fs::create_dir_all(&sub_dir).unwrap();

        let config_path = dir.path().join(CONFIG_FILE_NAME);
        File::create(&config_path).unwrap();

        let found = find_config_file(&sub_dir);
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        assert!(find_config_file(dir.path()).is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{ "outDir": "dist/styles" }"#).unwrap();

        let result = load_config(dir.path()).unwrap();
        assert!(result.from_file);
        assert_eq!(result.config.out_dir, "dist/styles");
    }

    #[test]
    fn test_load_config_default_when_not_found() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let result = load_config(dir.path()).unwrap();
        assert!(!result.from_file);
        assert_eq!(result.config.includes, default_includes());
    }

    #[test]
    fn test_validate_invalid_ignore_pattern() {
        let config = Config {
            ignores: vec!["[invalid".to_string()],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ignores"));
    }

    #[test]
    fn test_validate_invalid_class_prefix() {
        let config = Config {
            class_prefix: "a b".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_factory_requires_derived() {
        let config = Config {
            extractors: vec![ExtractorConfig {
                import_path: "lib".to_string(),
                symbol: "makeTheme".to_string(),
                kind: ExtractorKind::Factory,
                output: None,
                derived: vec![],
            }],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("makeTheme"));
    }

    #[test]
    fn test_validate_rejects_derived_on_plain_extractor() {
        let config = Config {
            extractors: vec![ExtractorConfig {
                import_path: "lib".to_string(),
                symbol: "css".to_string(),
                kind: ExtractorKind::Css,
                output: None,
                derived: vec![DerivedConfig {
                    symbol: "inner".to_string(),
                    kind: ExtractorKind::Css,
                    output: None,
                    derived: vec![],
                }],
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_nested_factories() {
        let json = r#"{
              "extractors": [{
                "importPath": "kit",
                "symbol": "createKit",
                "kind": "factory",
                "derived": [{
                  "symbol": "theme",
                  "kind": "factory",
                  "derived": [{ "symbol": "css", "kind": "css" }]
                }]
              }]
          }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.extractors[0].derived[0].derived[0].symbol, "css");

        let mut empty = config.clone();
        empty.extractors[0].derived[0].derived.clear();
        let err = empty.validate().unwrap_err();
        assert!(err.to_string().contains("\"theme\" declares no 'derived'"));
    }

    #[test]
    fn test_validate_rejects_duplicate_extractors() {
        let mut config = Config::default();
        let first = config.extractors[0].clone();
        config.extractors.push(first);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_load_config_with_invalid_pattern_fails() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{ "ignores": ["[invalid"] }"#).unwrap();

        assert!(load_config(dir.path()).is_err());
    }

    #[test]
    fn test_serialization_round_trips_defaults() {
        let json = default_config_json().unwrap();
        assert!(json.contains("\"importPath\": \"@styleslice/core\""));
        assert!(!json.contains("maxSteps"));
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.extractors, default_extractors());
    }
}

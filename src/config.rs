use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::errors::{PurgeError, Result};
use crate::markup::{ExtractorMode, ScannerOptions};
use crate::purger::PurgeOptions;
use crate::reducer::ReduceOptions;
use crate::safelist::{Safelist, SafelistEntry};

/// Purge configuration, as loaded from a YAML or JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeConfig {
    /// Markup file patterns to scan
    pub content: Vec<String>,

    /// Stylesheets to purge
    pub css: Vec<PathBuf>,

    /// Output file, or directory when several stylesheets are purged
    pub output: Option<PathBuf>,

    /// Patterns excluded from the content scan
    pub exclude: Vec<String>,

    /// Selectors or names that are always kept
    pub safelist: Vec<SafelistEntry>,

    /// Names that keep every selector they appear in
    pub greedy_safelist: Vec<SafelistEntry>,

    /// Match safelist entries ignoring case
    pub case_insensitive_safelist: bool,

    /// Remove unused @keyframes
    pub keyframes: bool,

    /// Remove unused @font-face
    pub font_face: bool,

    /// Write a report of removed selectors next to the output
    pub rejected: bool,

    /// Markup attributes holding class names
    pub class_attributes: Vec<String>,

    /// Markup attributes holding element ids
    pub id_attributes: Vec<String>,

    pub extractor: ExtractorMode,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        let scanner = ScannerOptions::default();
        Self {
            content: Vec::new(),
            css: Vec::new(),
            output: None,
            exclude: Vec::new(),
            safelist: Vec::new(),
            greedy_safelist: Vec::new(),
            case_insensitive_safelist: false,
            keyframes: false,
            font_face: false,
            rejected: false,
            class_attributes: scanner.class_attributes,
            id_attributes: scanner.id_attributes,
            extractor: scanner.extractor,
        }
    }
}

impl PurgeConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PurgeError::ConfigError {
                message: format!("Failed to read config file {}: {}", path.display(), e),
            })?;

        serde_yaml::from_str(&content)
            .map_err(|e| PurgeError::ConfigError {
                message: format!("Failed to parse YAML config: {}", e),
            })
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PurgeError::ConfigError {
                message: format!("Failed to read config file {}: {}", path.display(), e),
            })?;

        serde_json::from_str(&content)
            .map_err(|e| PurgeError::ConfigError {
                message: format!("Failed to parse JSON config: {}", e),
            })
    }

    /// Load configuration from a file (auto-detect format).
    ///
    /// Relative `content`, `css`, `output` and `exclude` entries are taken
    /// relative to the directory holding the file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_file(path)?,
            Some("json") => Self::from_json_file(path)?,
            _ => {
                return Err(PurgeError::ConfigError {
                    message: format!(
                        "Unsupported config file format: {}. Use .yaml, .yml, or .json",
                        path.display()
                    ),
                })
            }
        };
        Ok(match path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            Some(dir) => config.relative_to(dir),
            None => config,
        })
    }

    fn relative_to(mut self, base: &Path) -> Self {
        let rebase_pattern = |pattern: String| {
            let relative = pattern.strip_prefix("./").unwrap_or(&pattern);
            if Path::new(relative).is_absolute() {
                pattern
            } else {
                base.join(relative).to_string_lossy().into_owned()
            }
        };
        let rebase_path = |path: PathBuf| if path.is_absolute() { path } else { base.join(path) };

        self.content = self.content.into_iter().map(rebase_pattern).collect();
        self.exclude = self.exclude.into_iter().map(rebase_pattern).collect();
        self.css = self.css.into_iter().map(rebase_path).collect();
        self.output = self.output.map(rebase_path);
        self
    }

    /// Merge with another configuration; `other` wins where it sets a value
    pub fn merge(mut self, other: Self) -> Self {
        for pattern in other.content {
            if !self.content.contains(&pattern) {
                self.content.push(pattern);
            }
        }
        for path in other.css {
            if !self.css.contains(&path) {
                self.css.push(path);
            }
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        self.exclude.extend(other.exclude);
        self.safelist.extend(other.safelist);
        self.greedy_safelist.extend(other.greedy_safelist);

        self.case_insensitive_safelist |= other.case_insensitive_safelist;
        self.keyframes |= other.keyframes;
        self.font_face |= other.font_face;
        self.rejected |= other.rejected;

        let defaults = ScannerOptions::default();
        if other.class_attributes != defaults.class_attributes {
            self.class_attributes = other.class_attributes;
        }
        if other.id_attributes != defaults.id_attributes {
            self.id_attributes = other.id_attributes;
        }
        if other.extractor != defaults.extractor {
            self.extractor = other.extractor;
        }

        self
    }

    /// Compile into purge options; safelist regexes are validated here
    pub fn to_options(&self) -> Result<PurgeOptions> {
        Ok(PurgeOptions {
            scanner: ScannerOptions {
                class_attributes: self.class_attributes.clone(),
                id_attributes: self.id_attributes.clone(),
                extractor: self.extractor,
            },
            safelist: Safelist::from_entries(&self.safelist, &self.greedy_safelist, self.case_insensitive_safelist)?,
            reduce: ReduceOptions {
                keyframes: self.keyframes,
                font_face: self.font_face,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PurgeConfig::default();
        assert!(config.content.is_empty());
        assert_eq!(config.class_attributes, vec!["class", "styleClass"]);
        assert!(!config.keyframes);
    }

    #[test]
    fn test_yaml_config_loading() {
        let yaml_content = r##"
content:
  - "views/admin/**/*.fxml"
  - "views/shared/**/*.fxml"
css:
  - global-style.css
output: global-style.cleaned.css
safelist:
  - active
  - prefix: "fa-"
  - pattern: "^col-\\d+$"
keyframes: true
extractor: words
"##;

        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(yaml_content.as_bytes()).unwrap();

        let config = PurgeConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.content.len(), 2);
        assert_eq!(config.css, vec![PathBuf::from("global-style.css")]);
        assert_eq!(config.output, Some(PathBuf::from("global-style.cleaned.css")));
        assert_eq!(config.safelist.len(), 3);
        assert!(config.keyframes);
        assert_eq!(config.extractor, ExtractorMode::Words);

        let options = config.to_options().unwrap();
        assert_eq!(options.safelist.len(), 3);
        assert!(options.safelist.matches_name("col-12"));
        assert!(options.reduce.keyframes);
    }

    #[test]
    fn test_json_config_loading() {
        let json_content = r##"{
  "content": ["./views/**/*.html"],
  "css": ["site.css"],
  "font_face": true,
  "class_attributes": ["class", "data-class"]
}"##;

        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(json_content.as_bytes()).unwrap();

        let config = PurgeConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.content.len(), 1);
        assert!(config.font_face);
        assert_eq!(config.class_attributes, vec!["class", "data-class"]);
        assert_eq!(config.id_attributes, vec!["id", "fx:id"]);
    }

    #[test]
    fn test_paths_relative_to_config_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("site");
        std::fs::create_dir_all(&dir).unwrap();
        let config_path = dir.join("purge.yaml");
        std::fs::write(
            &config_path,
            "content:\n  - ./views/**/*.html\n  - /abs/*.html\ncss:\n  - style.css\noutput: dist/style.css\nexclude:\n  - views/drafts/**\n",
        )
        .unwrap();

        let config = PurgeConfig::from_file(&config_path).unwrap();
        assert_eq!(
            config.content,
            vec![dir.join("views/**/*.html").to_string_lossy().into_owned(), "/abs/*.html".to_string()]
        );
        assert_eq!(config.css, vec![dir.join("style.css")]);
        assert_eq!(config.output, Some(dir.join("dist/style.css")));
        assert_eq!(config.exclude, vec![dir.join("views/drafts/**").to_string_lossy().into_owned()]);
    }

    #[test]
    fn test_unsupported_format() {
        let file = NamedTempFile::with_suffix(".toml").unwrap();
        let err = PurgeConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, PurgeError::ConfigError { .. }));
    }

    #[test]
    fn test_invalid_safelist_pattern() {
        let config = PurgeConfig {
            safelist: vec![SafelistEntry::Pattern { pattern: "[".to_string() }],
            ..PurgeConfig::default()
        };
        assert!(matches!(config.to_options(), Err(PurgeError::SafelistPattern { .. })));
    }

    #[test]
    fn test_config_merge() {
        let base = PurgeConfig {
            content: vec!["a/**/*.html".to_string()],
            output: Some(PathBuf::from("out.css")),
            ..PurgeConfig::default()
        };

        let other = PurgeConfig {
            content: vec!["a/**/*.html".to_string(), "b/**/*.html".to_string()],
            output: Some(PathBuf::from("other.css")),
            safelist: vec![SafelistEntry::Exact("open".to_string())],
            keyframes: true,
            ..PurgeConfig::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.content.len(), 2);
        assert_eq!(merged.output, Some(PathBuf::from("other.css")));
        assert_eq!(merged.safelist.len(), 1);
        assert!(merged.keyframes);
        assert_eq!(merged.class_attributes, vec!["class", "styleClass"]);
    }
}

//! Source inventory used by the detectors.

use std::path::{Path, PathBuf};

use tokei::{Config, LanguageType};

use crate::error::Result;
use crate::fs::FileSystem;

/// A source file recognised by `tokei`, with its contents loaded.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the project root.
    pub path: PathBuf,
    /// Detected language.
    pub language: LanguageType,
    /// Whether the path looks like a test.
    pub is_test: bool,
    /// Lines of code, excluding blanks and comments.
    pub code_lines: usize,
    /// File contents.
    pub contents: String,
}

/// Walks a project and classifies its source files with `tokei`.
pub struct SourceInspector<'a> {
    fs: &'a dyn FileSystem,
    config: Config,
}

impl<'a> SourceInspector<'a> {
    /// Inspector with default `tokei` configuration.
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self {
            fs,
            config: Config::default(),
        }
    }

    /// Load every source file under `root`. Unreadable files are skipped.
    pub fn inspect(&self, root: &Path) -> Result<Vec<SourceFile>> {
        let mut sources = Vec::new();
        for path in self.fs.list_files(root)? {
            let Some(language) = LanguageType::from_path(&path, &self.config) else {
                continue;
            };
            if !is_code_language(language) {
                continue;
            }
            let contents = match self.fs.read_to_string(&path) {
                Ok(contents) => contents,
                Err(err) => {
                    log::debug!("skipping {}: {err}", path.display());
                    continue;
                }
            };
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            let code_lines = language.parse_from_str(&contents, &self.config).code;
            sources.push(SourceFile {
                is_test: is_test_file(&relative),
                path: relative,
                language,
                code_lines,
                contents,
            });
        }
        Ok(sources)
    }
}

fn is_code_language(language: LanguageType) -> bool {
    !matches!(
        language,
        LanguageType::Markdown
            | LanguageType::Json
            | LanguageType::Yaml
            | LanguageType::Toml
            | LanguageType::Text
            | LanguageType::Xml
            | LanguageType::Svg
            | LanguageType::Css
            | LanguageType::Html
            | LanguageType::ReStructuredText
    )
}

/// Whether a (root-relative) path looks like a test file.
pub fn is_test_file(path: &Path) -> bool {
    if path_components_match(path, &["test", "tests", "__tests__", "spec", "specs"]) {
        return true;
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_lowercase())
        .unwrap_or_default();
    if file_name.contains(".test.") || file_name.contains(".spec.") {
        return true;
    }

    let stem = path
        .file_stem()
        .and_then(|name| name.to_str())
        .map(|name| name.to_lowercase())
        .unwrap_or_default();
    stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.starts_with("spec_")
        || stem.ends_with("_spec")
}

fn path_components_match(path: &Path, segments: &[&str]) -> bool {
    path.components().any(|component| {
        let segment = component.as_os_str().to_string_lossy().to_lowercase();
        segments.iter().any(|target| *target == segment)
    })
}

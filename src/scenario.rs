//! YAML scenario files for the command-line runner.
//!
//! ```yaml
//! file_name: MyDeeplinks
//! folder: _Deeplinks_
//! links:
//!   - name: Show settings by scheme
//!     target: testdeeplink://showSettings
//! cleanup:
//!   - name: _Deeplinks_
//!     folder: true
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::automation::UiDriver;
use crate::config::HarnessConfig;
use crate::document::LinkEntry;
use crate::session::DeeplinkSession;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse scenario YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("scenario lists no links")]
    NoLinks,
    #[error("cannot read link document {0}")]
    UnreadableDocument(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSpec {
    Html(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CleanupItem {
    pub name: String,
    #[serde(default)]
    pub folder: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub file_name: String,
    #[serde(default)]
    pub folder: Option<String>,
    /// `html: <markup>` or `file: <path>`. Rendered from `links` when absent.
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub document: Option<DocumentSpec>,
    pub links: Vec<LinkEntry>,
    #[serde(default)]
    pub cleanup: Vec<CleanupItem>,
}

impl Scenario {
    /// Parse a scenario. Relative document paths resolve against `base_dir`.
    pub fn from_yaml(contents: &str, base_dir: &Path) -> Result<Self, ScenarioError> {
        let mut scenario: Scenario = serde_yaml::from_str(contents)?;
        if scenario.links.is_empty() {
            return Err(ScenarioError::NoLinks);
        }
        if let Some(DocumentSpec::File(path)) = &mut scenario.document {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
        Ok(scenario)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml(&contents, base_dir)
    }

    /// Build the session this scenario describes.
    pub fn session<D: UiDriver>(
        &self,
        driver: D,
        config: HarnessConfig,
    ) -> Result<DeeplinkSession<D>, ScenarioError> {
        let folder = self.folder.as_deref();
        let file_name = self.file_name.clone();
        match &self.document {
            None => Ok(DeeplinkSession::with_entries(
                driver, config, &self.links, file_name, folder,
            )),
            Some(DocumentSpec::Html(markup)) => Ok(DeeplinkSession::with_html(
                driver,
                config,
                markup.clone(),
                file_name,
                folder,
            )),
            Some(DocumentSpec::File(path)) => {
                DeeplinkSession::with_file(driver, config, path, file_name, folder)
                    .ok_or_else(|| ScenarioError::UnreadableDocument(path.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rendered_scenario() {
        let yaml = r#"
file_name: MyDeeplinks
folder: _Deeplinks_
links:
  - name: Show settings by scheme
    target: testdeeplink://showSettings
  - name: Activate premium by scheme
    target: testdeeplink://premium
cleanup:
  - name: _Deeplinks_
    folder: true
  - name: MyDeeplinks
"#;
        let scenario = Scenario::from_yaml(yaml, Path::new("/tmp")).unwrap();
        assert_eq!(scenario.folder.as_deref(), Some("_Deeplinks_"));
        assert!(scenario.document.is_none());
        assert_eq!(scenario.links.len(), 2);
        assert_eq!(scenario.links[1].target, "testdeeplink://premium");
        assert_eq!(
            scenario.cleanup,
            vec![
                CleanupItem {
                    name: "_Deeplinks_".into(),
                    folder: true
                },
                CleanupItem {
                    name: "MyDeeplinks".into(),
                    folder: false
                },
            ]
        );
    }

    #[test]
    fn resolves_document_paths_against_the_scenario() {
        let yaml = r#"
file_name: URLDeeplinks
document:
  file: fixtures/testDeeplinks.html
links:
  - name: Activate premium
    target: https://josshad.glatop.com/app/activatePremium
"#;
        let scenario = Scenario::from_yaml(yaml, Path::new("/srv/scenarios")).unwrap();
        assert_eq!(
            scenario.document,
            Some(DocumentSpec::File(PathBuf::from(
                "/srv/scenarios/fixtures/testDeeplinks.html"
            )))
        );
    }

    #[test]
    fn parses_inline_html_document() {
        let yaml = r#"
file_name: MyDeeplinks
document:
  html: "<a href='x://y'>Y</a>"
links:
  - name: Y
    target: x://y
"#;
        let scenario = Scenario::from_yaml(yaml, Path::new(".")).unwrap();
        assert_eq!(
            scenario.document,
            Some(DocumentSpec::Html("<a href='x://y'>Y</a>".into()))
        );
    }

    #[test]
    fn rejects_empty_link_lists() {
        let err = Scenario::from_yaml("file_name: X\nlinks: []\n", Path::new(".")).unwrap_err();
        assert!(matches!(err, ScenarioError::NoLinks));
    }
}

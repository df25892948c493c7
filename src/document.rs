//! Link documents: the markup staged inside the file viewer.
//!
//! A document carries one tappable anchor per [`LinkEntry`]. It is either
//! rendered from entries, supplied as literal markup, or read from an existing
//! file; the last two are forwarded untouched.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use html_escape::{encode_double_quoted_attribute, encode_text};
use kuchiki::parse_html;
use kuchiki::traits::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const INLINE_EXTENSION: &str = "html";

/// A named link: `name` is the visible anchor label, `target` the URL that must
/// reach the target application verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkEntry {
    pub name: String,
    pub target: String,
}

impl LinkEntry {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }

    pub fn anchor_markup(&self) -> String {
        format!(
            "<a href=\"{}\">{}</a>",
            encode_double_quoted_attribute(&self.target),
            encode_text(&self.name)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub label: String,
    pub href: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("two entries share the label {0:?}")]
    DuplicateLabel(String),
    #[error("no anchor labelled {0:?} in the document")]
    MissingLabel(String),
    #[error("anchor label {0:?} occurs more than once in the document")]
    AmbiguousLabel(String),
    #[error("anchor {label:?} points at {actual:?}, expected {expected:?}")]
    TargetMismatch {
        label: String,
        expected: String,
        actual: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DocumentSource {
    Inline(String),
    External { path: PathBuf, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDocument {
    source: DocumentSource,
}

impl LinkDocument {
    /// Render inline markup with one anchor per entry, in order.
    pub fn render(entries: &[LinkEntry]) -> Self {
        let anchors = entries
            .iter()
            .map(LinkEntry::anchor_markup)
            .collect::<Vec<_>>()
            .join("<br/>\n        ");
        let markup = format!(
            "<html>\n<body>\n    <br/>\n    <h1>\n        {anchors}\n    </h1>\n    <br/>\n</body>\n</html>\n"
        );
        Self::from_markup(markup)
    }

    pub fn from_markup(content: impl Into<String>) -> Self {
        Self {
            source: DocumentSource::Inline(content.into()),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        Ok(Self {
            source: DocumentSource::External {
                path: path.to_path_buf(),
                bytes,
            },
        })
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.source {
            DocumentSource::Inline(markup) => markup.as_bytes(),
            DocumentSource::External { bytes, .. } => bytes,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.source, DocumentSource::External { .. })
    }

    pub fn source_path(&self) -> Option<&Path> {
        match &self.source {
            DocumentSource::Inline(_) => None,
            DocumentSource::External { path, .. } => Some(path),
        }
    }

    /// Extension the viewer will list the staged file under.
    pub fn extension(&self) -> String {
        match &self.source {
            DocumentSource::Inline(_) => INLINE_EXTENSION.to_string(),
            DocumentSource::External { path, .. } => path
                .extension()
                .and_then(|ext| ext.to_str())
                .filter(|ext| !ext.is_empty())
                .map(|ext| ext.to_ascii_lowercase())
                .unwrap_or_else(|| INLINE_EXTENSION.to_string()),
        }
    }

    pub fn type_identifier(&self) -> &'static str {
        type_identifier_for(&self.extension())
    }

    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.bytes()))
    }

    pub fn anchors(&self) -> Vec<Anchor> {
        extract_anchors(&String::from_utf8_lossy(self.bytes()))
    }

    /// Every entry must resolve to exactly one anchor with the same target, and
    /// no two entries may share a label.
    pub fn check_catalog(&self, entries: &[LinkEntry]) -> Result<(), DocumentError> {
        let mut seen = HashSet::new();
        for entry in entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(DocumentError::DuplicateLabel(entry.name.clone()));
            }
        }

        let mut by_label: HashMap<String, Vec<Anchor>> = HashMap::new();
        for anchor in self.anchors() {
            by_label.entry(anchor.label.clone()).or_default().push(anchor);
        }

        for entry in entries {
            let anchor = match by_label.get(&entry.name).map(Vec::as_slice) {
                None | Some([]) => return Err(DocumentError::MissingLabel(entry.name.clone())),
                Some([anchor]) => anchor,
                Some(_) => return Err(DocumentError::AmbiguousLabel(entry.name.clone())),
            };
            if anchor.href.as_deref() != Some(entry.target.as_str()) {
                return Err(DocumentError::TargetMismatch {
                    label: entry.name.clone(),
                    expected: entry.target.clone(),
                    actual: anchor.href.clone(),
                });
            }
        }
        Ok(())
    }
}

pub fn extract_anchors(markup: &str) -> Vec<Anchor> {
    let parsed = parse_html().one(markup);
    let Ok(selection) = parsed.select("a") else {
        return Vec::new();
    };
    selection
        .map(|anchor| {
            let href = anchor
                .attributes
                .borrow()
                .get("href")
                .map(|href| href.to_string());
            Anchor {
                label: anchor.text_contents().trim().to_string(),
                href,
            }
        })
        .filter(|anchor| !anchor.label.is_empty())
        .collect()
}

pub fn type_identifier_for(extension: &str) -> &'static str {
    match extension {
        "html" | "htm" => "public.html",
        "txt" => "public.plain-text",
        "pdf" => "com.adobe.pdf",
        _ => "public.data",
    }
}

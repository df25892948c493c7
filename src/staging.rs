//! Idempotent placement of a link document inside the file viewer.

use std::fmt;

use crate::automation::{PasteboardItem, UiDriver};
use crate::config::{HarnessConfig, Timeouts};
use crate::document::LinkDocument;
use crate::error::{HarnessError, Result};
use crate::viewer::{cell_label, FileViewer, Location};

/// Mutual-exclusion key of a staged document: two sessions with the same key
/// share (and must not concurrently touch) one file in the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagingKey {
    pub file_name: String,
    pub folder: Option<String>,
}

impl fmt::Display for StagingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.folder {
            Some(folder) => write!(f, "{folder}/{}", self.file_name),
            None => f.write_str(&self.file_name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StagingDescriptor {
    pub file_name: String,
    pub folder: Option<String>,
    pub document: LinkDocument,
}

impl StagingDescriptor {
    pub fn new(file_name: impl Into<String>, folder: Option<&str>, document: LinkDocument) -> Self {
        Self {
            file_name: file_name.into(),
            folder: folder.map(str::to_string),
            document,
        }
    }

    pub fn key(&self) -> StagingKey {
        StagingKey {
            file_name: self.file_name.clone(),
            folder: self.folder.clone(),
        }
    }

    pub fn location(&self) -> Location {
        Location::from_folder(self.folder.as_deref())
    }

    /// File name in storage, extension included.
    pub fn stored_name(&self) -> String {
        format!("{}.{}", self.file_name, self.document.extension())
    }

    pub fn cell_label(&self) -> String {
        cell_label(&self.stored_name())
    }

    pub fn pasteboard_item(&self) -> PasteboardItem {
        PasteboardItem {
            suggested_name: self.stored_name(),
            type_identifier: self.document.type_identifier().to_string(),
            data: self.document.bytes().to_vec(),
        }
    }
}

/// A staged document the viewer is currently showing the location of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyLocation {
    pub key: StagingKey,
    pub location: Location,
    pub cell_label: String,
    /// The file was already present and nothing was created.
    pub reused: bool,
}

pub struct Stager<'a, D: UiDriver> {
    viewer: FileViewer<'a, D>,
    timeouts: &'a Timeouts,
}

impl<'a, D: UiDriver> Stager<'a, D> {
    pub fn new(driver: &'a mut D, config: &'a HarnessConfig) -> Self {
        Self {
            viewer: FileViewer::new(driver, config),
            timeouts: &config.timeouts,
        }
    }

    /// Make sure the descriptor's document exists at its location, creating
    /// the folder and the file only when absent. Leaves the viewer showing the
    /// effective location.
    pub fn ensure_present(&mut self, descriptor: &StagingDescriptor) -> Result<ReadyLocation> {
        let key = descriptor.key();
        let location = descriptor.location();
        let cell_label = descriptor.cell_label();

        self.viewer.foreground()?;
        if self.viewer.document_is_open()? {
            self.viewer.close_document()?;
        }

        if !self.viewer.is_at(&location)? {
            self.viewer.go_home()?;
            if let Location::Folder(folder) = &location {
                if self.viewer.item(folder)?.is_none() {
                    self.viewer.create_folder(folder)?;
                }
                self.viewer.enter_folder(folder)?;
            }
        }

        if self.viewer.item(&cell_label)?.is_some() {
            tracing::info!(target = "staging", key = %key, "reusing staged document");
            return Ok(ReadyLocation {
                key,
                location,
                cell_label,
                reused: true,
            });
        }

        tracing::info!(
            target = "staging",
            key = %key,
            external = descriptor.document.is_external(),
            source = ?descriptor.document.source_path(),
            fingerprint = %descriptor.document.fingerprint(),
            "staging document"
        );
        self.viewer.paste(&descriptor.pasteboard_item())?;

        let opts = self.timeouts.staging();
        if self.viewer.wait_for_item(&cell_label, opts)?.is_none() {
            tracing::error!(
                target = "staging",
                key = %key,
                waited_ms = opts.timeout.as_millis() as u64,
                "staged document never appeared"
            );
            return Err(HarnessError::StagingTimeout {
                file: descriptor.stored_name(),
                location: location.to_string(),
                waited: opts.timeout,
            });
        }

        Ok(ReadyLocation {
            key,
            location,
            cell_label,
            reused: false,
        })
    }

    /// Delete the root-level item listed as `label`. Returns whether anything
    /// was removed; a missing item is not an error.
    pub fn remove(&mut self, label: &str) -> Result<bool> {
        self.viewer.foreground()?;
        if self.viewer.document_is_open()? {
            self.viewer.close_document()?;
        }
        self.viewer.navigate_to(&Location::Home)?;
        if self.viewer.item(label)?.is_none() {
            tracing::debug!(target = "staging", item = %label, "nothing to remove");
            return Ok(false);
        }
        self.viewer.delete_item(label)?;
        tracing::info!(target = "staging", item = %label, "removed item");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LinkEntry;

    #[test]
    fn descriptor_names_follow_the_document() {
        let document = LinkDocument::render(&[LinkEntry::new("A", "x://a")]);
        let descriptor = StagingDescriptor::new("MyDeeplinks", Some("_Deeplinks_"), document);
        assert_eq!(descriptor.stored_name(), "MyDeeplinks.html");
        assert_eq!(descriptor.cell_label(), "MyDeeplinks, html");
        assert_eq!(descriptor.key().to_string(), "_Deeplinks_/MyDeeplinks");
        assert_eq!(
            descriptor.location(),
            Location::Folder("_Deeplinks_".into())
        );

        let item = descriptor.pasteboard_item();
        assert_eq!(item.suggested_name, "MyDeeplinks.html");
        assert_eq!(item.type_identifier, "public.html");
    }

    #[test]
    fn keys_distinguish_folder_from_root() {
        let document = LinkDocument::from_markup("<a href='x://a'>A</a>");
        let root = StagingDescriptor::new("Links", None, document.clone());
        let nested = StagingDescriptor::new("Links", Some("Folder"), document);
        assert_ne!(root.key(), nested.key());
        assert_eq!(root.key().to_string(), "Links");
    }
}

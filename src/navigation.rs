use crate::automation::{ElementRole, ElementSelector, UiDriver};
use crate::config::{HarnessConfig, Timeouts};
use crate::error::{HarnessError, Result};
use crate::staging::ReadyLocation;
use crate::viewer::FileViewer;

/// Drives the viewer from a staged location to an activated link.
///
/// Nothing is carried over between calls: every call re-reads which document,
/// if any, the viewer is showing.
pub struct LinkTapper<'a, D: UiDriver> {
    viewer: FileViewer<'a, D>,
    timeouts: &'a Timeouts,
}

impl<'a, D: UiDriver> LinkTapper<'a, D> {
    pub fn new(driver: &'a mut D, config: &'a HarnessConfig) -> Self {
        Self {
            viewer: FileViewer::new(driver, config),
            timeouts: &config.timeouts,
        }
    }

    /// Foreground the viewer and keep the open document only if it is the
    /// expected one. Returns whether it can be used as is.
    pub fn resume_document(&mut self, title: &str, trusted: bool) -> Result<bool> {
        self.viewer.foreground()?;
        if !self.viewer.document_is_open()? {
            return Ok(false);
        }
        if trusted && self.viewer.showing_document(title)? {
            tracing::debug!(target = "navigation", document = %title, "document still open");
            return Ok(true);
        }
        self.viewer.close_document()?;
        Ok(false)
    }

    pub fn open_document(&mut self, ready: &ReadyLocation, title: &str) -> Result<()> {
        let opts = self.timeouts.element();
        let cell = self
            .viewer
            .wait_for_item(&ready.cell_label, opts)?
            .ok_or_else(|| HarnessError::ElementTimeout {
                element: format!("cell {:?}", ready.cell_label),
                waited: opts.timeout,
            })?;
        self.viewer.driver().tap(&cell)?;

        let bar = ElementSelector::named(ElementRole::NavigationBar, title);
        if self.viewer.driver().wait_for_appearance(&bar, opts)?.is_none() {
            return Err(HarnessError::ElementTimeout {
                element: bar.to_string(),
                waited: opts.timeout,
            });
        }
        tracing::debug!(target = "navigation", key = %ready.key, "opened document");
        Ok(())
    }

    /// Locate the anchor labelled `name` in the open document and tap it.
    pub fn tap_link(&mut self, name: &str, document: &str) -> Result<()> {
        let selector = ElementSelector::named(ElementRole::StaticText, name);
        let opts = self.timeouts.element();
        let Some(link) = self.viewer.driver().wait_for_appearance(&selector, opts)? else {
            tracing::error!(target = "navigation", link = %name, document = %document, "link not found");
            return Err(HarnessError::LinkNotFound {
                name: name.to_string(),
                document: document.to_string(),
                waited: opts.timeout,
            });
        };
        self.viewer.driver().tap(&link)?;
        tracing::info!(target = "navigation", link = %name, "tapped link");
        Ok(())
    }
}

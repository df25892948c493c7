//! One automation session per test: stage a link document in the file viewer,
//! open its links one by one and check the target application after each.

use std::path::Path;

use serde::Serialize;

use crate::automation::{AppState, UiDriver};
use crate::config::HarnessConfig;
use crate::document::{LinkDocument, LinkEntry};
use crate::error::{HarnessError, Result};
use crate::handoff::Handoff;
use crate::navigation::LinkTapper;
use crate::staging::{ReadyLocation, StagingDescriptor, Stager};
use crate::verify::{Mismatch, ObservableState, TargetReader, Verification};
use crate::viewer::cell_label;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SequenceReport {
    pub verifications: Vec<Verification>,
    /// The run stopped at the first mismatch.
    pub stopped_early: bool,
}

impl SequenceReport {
    pub fn is_success(&self) -> bool {
        self.verifications.iter().all(Verification::is_match)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = (&Verification, &Mismatch)> {
        self.verifications
            .iter()
            .flat_map(|verification| verification.mismatches.iter().map(move |m| (verification, m)))
    }
}

pub struct DeeplinkSession<D: UiDriver> {
    driver: D,
    config: HarnessConfig,
    descriptor: StagingDescriptor,
    // Set once this session opened the document itself; a document left open
    // by anything else is never trusted.
    opened_document: bool,
}

impl<D: UiDriver> DeeplinkSession<D> {
    fn new(driver: D, config: HarnessConfig, descriptor: StagingDescriptor) -> Self {
        Self {
            driver,
            config,
            descriptor,
            opened_document: false,
        }
    }

    /// Stage literal document markup.
    pub fn with_html(
        driver: D,
        config: HarnessConfig,
        content: impl Into<String>,
        file_name: impl Into<String>,
        folder: Option<&str>,
    ) -> Self {
        let document = LinkDocument::from_markup(content);
        Self::new(
            driver,
            config,
            StagingDescriptor::new(file_name, folder, document),
        )
    }

    /// Stage markup rendered from `entries`.
    pub fn with_entries(
        driver: D,
        config: HarnessConfig,
        entries: &[LinkEntry],
        file_name: impl Into<String>,
        folder: Option<&str>,
    ) -> Self {
        let document = LinkDocument::render(entries);
        Self::new(
            driver,
            config,
            StagingDescriptor::new(file_name, folder, document),
        )
    }

    /// Stage an existing file. `None` if it cannot be read.
    pub fn with_file(
        driver: D,
        config: HarnessConfig,
        path: impl AsRef<Path>,
        file_name: impl Into<String>,
        folder: Option<&str>,
    ) -> Option<Self> {
        let path = path.as_ref();
        let document = match LinkDocument::from_file(path) {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(
                    target = "staging",
                    path = %path.display(),
                    error = %err,
                    "cannot read link document"
                );
                return None;
            }
        };
        Some(Self::new(
            driver,
            config,
            StagingDescriptor::new(file_name, folder, document),
        ))
    }

    pub fn descriptor(&self) -> &StagingDescriptor {
        &self.descriptor
    }

    /// Relaunch the target so its counter starts from zero.
    pub fn prepare_target(&mut self) -> Result<()> {
        let bundle_id = self.config.target.bundle_id.clone();
        self.driver.terminate_app(&bundle_id)?;
        self.driver.launch_app(&bundle_id)?;
        let opts = self.config.timeouts.launch();
        if !self
            .driver
            .wait_for_app_state(&bundle_id, AppState::Foreground, opts)?
        {
            return Err(HarnessError::LaunchTimeout {
                bundle_id,
                waited: opts.timeout,
            });
        }
        tracing::info!(target = "verify", bundle_id = %bundle_id, "target relaunched");
        Ok(())
    }

    pub fn stage(&mut self) -> Result<ReadyLocation> {
        self.opened_document = false;
        Stager::new(&mut self.driver, &self.config).ensure_present(&self.descriptor)
    }

    /// Open the link labelled `name` from the staged document and wait until
    /// the target application is in the foreground.
    pub fn open_deeplink(&mut self, name: &str) -> Result<()> {
        let title = self.descriptor.file_name.clone();

        let resumed = LinkTapper::new(&mut self.driver, &self.config)
            .resume_document(&title, self.opened_document)?;
        if !resumed {
            let ready = self.stage()?;
            LinkTapper::new(&mut self.driver, &self.config).open_document(&ready, &title)?;
            self.opened_document = true;
        }
        LinkTapper::new(&mut self.driver, &self.config).tap_link(name, &title)?;

        let mut handoff = Handoff::new(&mut self.driver, &self.config);
        handoff.accept_prompt(name)?;
        handoff.await_target()?;
        Ok(())
    }

    /// Delete a root-level file (named without extension) or folder. Missing
    /// items are ignored.
    pub fn remove_element(&mut self, name: &str, is_folder: bool) -> Result<bool> {
        let label = if is_folder {
            name.to_string()
        } else {
            cell_label(&format!("{name}.{}", self.descriptor.document.extension()))
        };
        self.opened_document = false;
        Stager::new(&mut self.driver, &self.config).remove(&label)
    }

    pub fn observe(&mut self) -> Result<ObservableState> {
        TargetReader::new(&mut self.driver, &self.config).read_state()
    }

    /// Open each entry in order, checking the target after every open.
    /// Fatal errors abort the run; mismatches are recorded.
    pub fn run_sequence(&mut self, entries: &[LinkEntry]) -> Result<SequenceReport> {
        self.descriptor.document.check_catalog(entries)?;

        let mut report = SequenceReport::default();
        for (index, entry) in entries.iter().enumerate() {
            let ordinal = index + 1;
            self.open_deeplink(&entry.name)?;
            let verification = TargetReader::new(&mut self.driver, &self.config).verify(ordinal, entry)?;

            let matched = verification.is_match();
            if matched {
                tracing::info!(target = "verify", ordinal, link = %entry.name, "target state matches");
            } else {
                for mismatch in &verification.mismatches {
                    tracing::warn!(target = "verify", ordinal, link = %entry.name, "{mismatch}");
                }
            }
            report.verifications.push(verification);

            if !matched && self.config.stop_on_first_failure {
                report.stopped_early = true;
                break;
            }
        }
        Ok(report)
    }
}

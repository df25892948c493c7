use std::fmt;

use anyhow::anyhow;
use serde::Serialize;

use crate::automation::{ElementRole, ElementSelector, UiDriver};
use crate::config::{HarnessConfig, TargetSettings, Timeouts};
use crate::document::LinkEntry;
use crate::error::{HarnessError, Result};

/// Readback of the target application's two observable values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservableState {
    pub invocation_count: u64,
    pub last_link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    InvocationCount,
    LastLink,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvocationCount => write!(f, "invocation count"),
            Self::LastLink => write!(f, "last link"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub field: Field,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {:?}, got {:?}",
            self.field, self.expected, self.actual
        )
    }
}

/// Outcome of checking the target after the `ordinal`-th open of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub ordinal: usize,
    pub link: LinkEntry,
    pub mismatches: Vec<Mismatch>,
}

impl Verification {
    pub fn is_match(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Reads the target application's observable values by their stable names.
pub struct TargetReader<'a, D: UiDriver> {
    driver: &'a mut D,
    settings: &'a TargetSettings,
    timeouts: &'a Timeouts,
}

impl<'a, D: UiDriver> TargetReader<'a, D> {
    pub fn new(driver: &'a mut D, config: &'a HarnessConfig) -> Self {
        Self {
            driver,
            settings: &config.target,
            timeouts: &config.timeouts,
        }
    }

    fn read_label(&mut self, identifier: &str) -> Result<String> {
        let selector = ElementSelector::named(ElementRole::StaticText, identifier);
        let opts = self.timeouts.readback();
        let element = self
            .driver
            .wait_for_appearance(&selector, opts)?
            .ok_or_else(|| HarnessError::ElementTimeout {
                element: selector.to_string(),
                waited: opts.timeout,
            })?;
        Ok(self.driver.element_label(&element)?)
    }

    fn read_labels(&mut self) -> Result<(String, String)> {
        let counter_id = self.settings.counter_id.clone();
        let link_id = self.settings.link_id.clone();
        Ok((self.read_label(&counter_id)?, self.read_label(&link_id)?))
    }

    pub fn read_state(&mut self) -> Result<ObservableState> {
        let (counter, link) = self.read_labels()?;
        let invocation_count = counter.trim().parse::<u64>().map_err(|err| {
            anyhow!("counter label {counter:?} is not a number: {err}")
        })?;
        let last_link = (link != self.settings.empty_link_label).then_some(link);
        Ok(ObservableState {
            invocation_count,
            last_link,
        })
    }

    /// Compare the readback against the expected state after the
    /// `ordinal`-th open (1-based). Labels are compared verbatim.
    pub fn verify(&mut self, ordinal: usize, entry: &LinkEntry) -> Result<Verification> {
        let (counter, link) = self.read_labels()?;
        let mut mismatches = Vec::new();

        let expected_count = ordinal.to_string();
        if counter != expected_count {
            mismatches.push(Mismatch {
                field: Field::InvocationCount,
                expected: expected_count,
                actual: counter,
            });
        }
        if link != entry.target {
            mismatches.push(Mismatch {
                field: Field::LastLink,
                expected: entry.target.clone(),
                actual: link,
            });
        }

        Ok(Verification {
            ordinal,
            link: entry.clone(),
            mismatches,
        })
    }
}

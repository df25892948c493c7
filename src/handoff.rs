use std::time::Instant;

use crate::automation::{AppState, ElementRole, ElementSelector, UiDriver, WaitOptions};
use crate::config::{HarnessConfig, TargetSettings, Timeouts};
use crate::error::{HarnessError, Result};

/// Accepts the system "open in app" prompt and waits for the target
/// application to come forward.
pub struct Handoff<'a, D: UiDriver> {
    driver: &'a mut D,
    target: &'a TargetSettings,
    timeouts: &'a Timeouts,
}

impl<'a, D: UiDriver> Handoff<'a, D> {
    pub fn new(driver: &'a mut D, config: &'a HarnessConfig) -> Self {
        Self {
            driver,
            target: &config.target,
            timeouts: &config.timeouts,
        }
    }

    /// The alert and its accept button share one `prompt_ms` budget.
    pub fn accept_prompt(&mut self, link: &str) -> Result<()> {
        let started = Instant::now();
        let opts = self.timeouts.prompt();
        let timeout = || HarnessError::PromptTimeout {
            link: link.to_string(),
            waited: opts.timeout,
        };

        self.driver
            .wait_for_appearance(&ElementSelector::first(ElementRole::Alert), opts)?
            .ok_or_else(timeout)?;
        let accept = ElementSelector::named(ElementRole::Button, &self.target.accept_button)
            .within(ElementRole::Alert);
        let remaining = WaitOptions::new(
            opts.timeout.saturating_sub(started.elapsed()),
            opts.poll_interval,
        );
        let button = self
            .driver
            .wait_for_appearance(&accept, remaining)?
            .ok_or_else(timeout)?;
        self.driver.tap(&button)?;
        tracing::debug!(target = "handoff", link = %link, "accepted open prompt");
        Ok(())
    }

    pub fn await_target(&mut self) -> Result<()> {
        let opts = self.timeouts.launch();
        let bundle_id = &self.target.bundle_id;
        if !self
            .driver
            .wait_for_app_state(bundle_id, AppState::Foreground, opts)?
        {
            tracing::error!(target = "handoff", bundle_id = %bundle_id, "target never came forward");
            return Err(HarnessError::LaunchTimeout {
                bundle_id: bundle_id.clone(),
                waited: opts.timeout,
            });
        }
        tracing::debug!(target = "handoff", bundle_id = %bundle_id, "target in foreground");
        Ok(())
    }
}

//! Capability interface for driving opaque, host-controlled UIs.
//!
//! Both the file viewer and the target application are reached only through
//! name/label lookup and bounded waits. Backends implement [`UiDriver`]; the
//! engine never assumes anything else about them.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod simulated;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementRole {
    NavigationBar,
    TabBarButton,
    Cell,
    CollectionView,
    StaticText,
    Button,
    TextField,
    Alert,
}

impl fmt::Display for ElementRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NavigationBar => "navigation bar",
            Self::TabBarButton => "tab bar button",
            Self::Cell => "cell",
            Self::CollectionView => "collection view",
            Self::StaticText => "static text",
            Self::Button => "button",
            Self::TextField => "text field",
            Self::Alert => "alert",
        };
        f.write_str(name)
    }
}

/// Locates an element by role, optionally by label/identifier and by the role
/// of an enclosing container. Without a name the first match is selected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementSelector {
    pub role: ElementRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub within: Option<ElementRole>,
}

impl ElementSelector {
    pub fn named(role: ElementRole, name: impl Into<String>) -> Self {
        Self {
            role,
            name: Some(name.into()),
            within: None,
        }
    }

    pub fn first(role: ElementRole) -> Self {
        Self {
            role,
            name: None,
            within: None,
        }
    }

    pub fn within(mut self, container: ElementRole) -> Self {
        self.within = Some(container);
        self
    }
}

impl fmt::Display for ElementSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} {name:?}", self.role)?,
            None => write!(f, "first {}", self.role)?,
        }
        if let Some(container) = self.within {
            write!(f, " in {container}")?;
        }
        Ok(())
    }
}

/// Opaque reference to a resolved element. Handles may go stale once the UI
/// changes underneath them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub id: String,
    pub selector: ElementSelector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    NotRunning,
    Background,
    Foreground,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteboardItem {
    pub suggested_name: String,
    pub type_identifier: String,
    pub data: Vec<u8>,
}

/// Wait configuration shared by helpers.
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitOptions {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

pub trait UiDriver {
    fn launch_app(&mut self, bundle_id: &str) -> Result<()>;
    fn terminate_app(&mut self, bundle_id: &str) -> Result<()>;
    /// Bring an installed app to the foreground, launching it if needed.
    fn activate_app(&mut self, bundle_id: &str) -> Result<()>;
    fn app_state(&mut self, bundle_id: &str) -> Result<AppState>;

    /// Resolve `selector` against the foreground app without waiting.
    fn find(&mut self, selector: &ElementSelector) -> Result<Option<ElementHandle>>;
    fn tap(&mut self, element: &ElementHandle) -> Result<()>;
    fn double_tap(&mut self, element: &ElementHandle) -> Result<()>;
    fn long_press(&mut self, element: &ElementHandle, duration: Duration) -> Result<()>;
    fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<()>;
    fn element_label(&mut self, element: &ElementHandle) -> Result<String>;

    fn set_pasteboard(&mut self, item: &PasteboardItem) -> Result<()>;

    fn exists(&mut self, selector: &ElementSelector) -> Result<bool> {
        Ok(self.find(selector)?.is_some())
    }

    /// Poll until `selector` resolves. `None` once the timeout elapses.
    fn wait_for_appearance(
        &mut self,
        selector: &ElementSelector,
        opts: WaitOptions,
    ) -> Result<Option<ElementHandle>> {
        let start = Instant::now();
        loop {
            if let Some(handle) = self.find(selector)? {
                return Ok(Some(handle));
            }
            if start.elapsed() >= opts.timeout {
                return Ok(None);
            }
            thread::sleep(opts.poll_interval);
        }
    }

    /// Poll until `selector` no longer resolves. `false` on timeout.
    fn wait_for_disappearance(
        &mut self,
        selector: &ElementSelector,
        opts: WaitOptions,
    ) -> Result<bool> {
        let start = Instant::now();
        loop {
            if self.find(selector)?.is_none() {
                return Ok(true);
            }
            if start.elapsed() >= opts.timeout {
                return Ok(false);
            }
            thread::sleep(opts.poll_interval);
        }
    }

    fn wait_for_app_state(
        &mut self,
        bundle_id: &str,
        state: AppState,
        opts: WaitOptions,
    ) -> Result<bool> {
        let start = Instant::now();
        loop {
            if self.app_state(bundle_id)? == state {
                return Ok(true);
            }
            if start.elapsed() >= opts.timeout {
                return Ok(false);
            }
            thread::sleep(opts.poll_interval);
        }
    }
}

impl<D: UiDriver + ?Sized> UiDriver for &mut D {
    fn launch_app(&mut self, bundle_id: &str) -> Result<()> {
        (**self).launch_app(bundle_id)
    }

    fn terminate_app(&mut self, bundle_id: &str) -> Result<()> {
        (**self).terminate_app(bundle_id)
    }

    fn activate_app(&mut self, bundle_id: &str) -> Result<()> {
        (**self).activate_app(bundle_id)
    }

    fn app_state(&mut self, bundle_id: &str) -> Result<AppState> {
        (**self).app_state(bundle_id)
    }

    fn find(&mut self, selector: &ElementSelector) -> Result<Option<ElementHandle>> {
        (**self).find(selector)
    }

    fn tap(&mut self, element: &ElementHandle) -> Result<()> {
        (**self).tap(element)
    }

    fn double_tap(&mut self, element: &ElementHandle) -> Result<()> {
        (**self).double_tap(element)
    }

    fn long_press(&mut self, element: &ElementHandle, duration: Duration) -> Result<()> {
        (**self).long_press(element, duration)
    }

    fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        (**self).type_text(element, text)
    }

    fn element_label(&mut self, element: &ElementHandle) -> Result<String> {
        (**self).element_label(element)
    }

    fn set_pasteboard(&mut self, item: &PasteboardItem) -> Result<()> {
        (**self).set_pasteboard(item)
    }
}

//! Navigation primitives for the external file viewer.
//!
//! The viewer is a black box: every step locates an affordance by its label,
//! acts on it, and waits (bounded) for the UI to reflect the change.

use std::fmt;

use crate::automation::{
    AppState, ElementHandle, ElementRole, ElementSelector, PasteboardItem, UiDriver, WaitOptions,
};
use crate::config::{HarnessConfig, Timeouts, ViewerSettings};
use crate::error::{HarnessError, Result};

/// Where a staged document lives inside the viewer's storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Home,
    Folder(String),
}

impl Location {
    pub fn from_folder(folder: Option<&str>) -> Self {
        match folder {
            Some(name) => Self::Folder(name.to_string()),
            None => Self::Home,
        }
    }

    pub fn title<'a>(&'a self, settings: &'a ViewerSettings) -> &'a str {
        match self {
            Self::Home => &settings.home_location,
            Self::Folder(name) => name,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => write!(f, "home"),
            Self::Folder(name) => write!(f, "folder {name:?}"),
        }
    }
}

/// How the viewer lists a stored file: `"<stem>, <ext>"`.
pub fn cell_label(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}, {ext}"),
        _ => file_name.to_string(),
    }
}

pub struct FileViewer<'a, D: UiDriver> {
    driver: &'a mut D,
    settings: &'a ViewerSettings,
    timeouts: &'a Timeouts,
}

impl<'a, D: UiDriver> FileViewer<'a, D> {
    pub fn new(driver: &'a mut D, config: &'a HarnessConfig) -> Self {
        Self {
            driver,
            settings: &config.viewer,
            timeouts: &config.timeouts,
        }
    }

    pub fn driver(&mut self) -> &mut D {
        &mut *self.driver
    }

    fn require(&mut self, selector: &ElementSelector, opts: WaitOptions) -> Result<ElementHandle> {
        self.driver
            .wait_for_appearance(selector, opts)?
            .ok_or_else(|| HarnessError::ElementTimeout {
                element: selector.to_string(),
                waited: opts.timeout,
            })
    }

    fn done_button(&self) -> ElementSelector {
        ElementSelector::named(ElementRole::Button, &self.settings.done_button)
            .within(ElementRole::NavigationBar)
    }

    fn title_selector(title: &str) -> ElementSelector {
        ElementSelector::named(ElementRole::StaticText, title).within(ElementRole::NavigationBar)
    }

    pub fn foreground(&mut self) -> Result<()> {
        let bundle_id = self.settings.bundle_id.clone();
        self.driver.activate_app(&bundle_id)?;
        let opts = self.timeouts.launch();
        if !self
            .driver
            .wait_for_app_state(&bundle_id, AppState::Foreground, opts)?
        {
            return Err(HarnessError::LaunchTimeout {
                bundle_id,
                waited: opts.timeout,
            });
        }
        Ok(())
    }

    pub fn document_is_open(&mut self) -> Result<bool> {
        let done = self.done_button();
        Ok(self.driver.exists(&done)?)
    }

    /// True when the document titled `title` is the one showing.
    pub fn showing_document(&mut self, title: &str) -> Result<bool> {
        let bar = ElementSelector::named(ElementRole::NavigationBar, title);
        Ok(self.document_is_open()? && self.driver.exists(&bar)?)
    }

    pub fn close_document(&mut self) -> Result<()> {
        let done = self.done_button();
        let Some(button) = self.driver.find(&done)? else {
            return Ok(());
        };
        self.driver.tap(&button)?;
        let opts = self.timeouts.element();
        if !self.driver.wait_for_disappearance(&done, opts)? {
            return Err(HarnessError::ElementTimeout {
                element: format!("closing {done}"),
                waited: opts.timeout,
            });
        }
        tracing::debug!(target = "navigation", "closed open document");
        Ok(())
    }

    pub fn is_at(&mut self, location: &Location) -> Result<bool> {
        let title = Self::title_selector(location.title(self.settings));
        Ok(self.driver.exists(&title)?)
    }

    pub fn go_home(&mut self) -> Result<()> {
        if self.is_at(&Location::Home)? {
            return Ok(());
        }
        let element = self.timeouts.element();
        let tab = self.require(
            &ElementSelector::named(ElementRole::TabBarButton, &self.settings.browse_tab),
            element,
        )?;
        self.driver.double_tap(&tab)?;
        let home = self.require(
            &ElementSelector::named(ElementRole::StaticText, &self.settings.home_location)
                .within(ElementRole::Cell),
            element,
        )?;
        self.driver.tap(&home)?;
        self.require(&Self::title_selector(&self.settings.home_location), element)?;
        tracing::debug!(target = "navigation", home = %self.settings.home_location, "reached home location");
        Ok(())
    }

    pub fn enter_folder(&mut self, folder: &str) -> Result<()> {
        let element = self.timeouts.element();
        let cell = self.require(&Self::item_selector(folder), element)?;
        self.driver.tap(&cell)?;
        self.require(&Self::title_selector(folder), element)?;
        Ok(())
    }

    /// Reach `location`, skipping navigation when already there.
    pub fn navigate_to(&mut self, location: &Location) -> Result<()> {
        if self.is_at(location)? {
            return Ok(());
        }
        self.go_home()?;
        if let Location::Folder(folder) = location {
            self.enter_folder(folder)?;
        }
        Ok(())
    }

    fn item_selector(label: &str) -> ElementSelector {
        ElementSelector::named(ElementRole::Cell, label).within(ElementRole::CollectionView)
    }

    pub fn item(&mut self, label: &str) -> Result<Option<ElementHandle>> {
        Ok(self.driver.find(&Self::item_selector(label))?)
    }

    pub fn wait_for_item(&mut self, label: &str, opts: WaitOptions) -> Result<Option<ElementHandle>> {
        Ok(self
            .driver
            .wait_for_appearance(&Self::item_selector(label), opts)?)
    }

    fn context_menu(&mut self, target: &ElementHandle, action: &str) -> Result<()> {
        let press = self.settings.long_press();
        self.driver.long_press(target, press)?;
        let item = self.require(
            &ElementSelector::named(ElementRole::Button, action),
            self.timeouts.element(),
        )?;
        self.driver.tap(&item)?;
        Ok(())
    }

    /// Put `item` on the pasteboard and paste it into the current location.
    pub fn paste(&mut self, item: &PasteboardItem) -> Result<()> {
        self.driver.set_pasteboard(item)?;
        let background = self.require(
            &ElementSelector::first(ElementRole::CollectionView),
            self.timeouts.element(),
        )?;
        let paste = self.settings.paste_action.clone();
        self.context_menu(&background, &paste)
    }

    pub fn create_folder(&mut self, folder: &str) -> Result<()> {
        let element = self.timeouts.element();
        let background = self.require(&ElementSelector::first(ElementRole::CollectionView), element)?;
        let action = self.settings.new_folder_action.clone();
        self.context_menu(&background, &action)?;

        let field = self.require(&ElementSelector::first(ElementRole::TextField), element)?;
        self.driver.type_text(&field, folder)?;
        let done = self.require(&self.done_button(), element)?;
        self.driver.tap(&done)?;
        self.require(&Self::item_selector(folder), element)?;
        tracing::info!(target = "staging", folder = %folder, "created folder");
        Ok(())
    }

    pub fn delete_item(&mut self, label: &str) -> Result<()> {
        let element = self.timeouts.element();
        let cell = self.require(&Self::item_selector(label), element)?;
        let action = self.settings.delete_action.clone();
        self.context_menu(&cell, &action)?;
        if !self
            .driver
            .wait_for_disappearance(&Self::item_selector(label), element)?
        {
            return Err(HarnessError::ElementTimeout {
                element: format!("removal of {label:?}"),
                waited: element.timeout,
            });
        }
        Ok(())
    }
}

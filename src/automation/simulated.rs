//! In-process device model backing [`UiDriver`] without real hardware.
//!
//! The simulated device hosts two apps: a file viewer with persistent storage,
//! folder navigation, paste/new-folder/delete context menus, document
//! rendering and the system open prompt, and a target app that counts open-URL
//! invocations. It only models what the harness observes through labels.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use uuid::Uuid;

use super::{AppState, ElementHandle, ElementRole, ElementSelector, PasteboardItem, UiDriver};
use crate::config::HarnessConfig;
use crate::document::{extract_anchors, Anchor};
use crate::verify::ObservableState;
use crate::viewer::cell_label;

const RECENTS_TAB: &str = "Recents";
const CANCEL_BUTTON: &str = "Cancel";
const UNTITLED_FOLDER: &str = "untitled folder";

/// Behaviour switches for exercising failure paths.
#[derive(Debug, Clone, Default)]
pub struct SimulatedFaults {
    /// Paste is accepted but no file ever appears.
    pub drop_pastes: bool,
    /// Tapping a link shows no confirmation prompt.
    pub suppress_prompt: bool,
    /// Accepting the prompt never brings the target app forward.
    pub block_launch: bool,
    /// The viewer closes the open document when it hands a link off.
    pub close_document_on_handoff: bool,
    /// Render documents without the anchor carrying this label.
    pub strip_anchor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    NavigationBar,
    NavigationTitle,
    DoneButton,
    Tab,
    LocationCell,
    ItemCell,
    CollectionView,
    MenuAction,
    FolderNameField,
    Anchor,
    Alert,
    AlertButton,
    TargetText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SimElement {
    kind: ElementKind,
    label: String,
}

impl SimElement {
    fn new(kind: ElementKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
        }
    }
}

/// Last resolution of a selector. The id survives as long as the selector
/// keeps resolving to the same element.
#[derive(Debug, Clone)]
struct RecordedHandle {
    id: String,
    element: SimElement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Screen {
    Recents,
    Browse,
    /// `None` is the home location.
    Folder(Option<String>),
}

#[derive(Debug, Clone)]
struct OpenDocument {
    title: String,
    anchors: Vec<Anchor>,
}

#[derive(Debug, Clone)]
enum Menu {
    Background { paste: bool },
    Item { label: String },
}

#[derive(Debug, Default)]
struct Storage {
    root: BTreeMap<String, Vec<u8>>,
    folders: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
}

impl Storage {
    fn files(&self, folder: Option<&str>) -> Option<&BTreeMap<String, Vec<u8>>> {
        match folder {
            None => Some(&self.root),
            Some(name) => self.folders.get(name),
        }
    }

    fn files_mut(&mut self, folder: Option<&str>) -> Option<&mut BTreeMap<String, Vec<u8>>> {
        match folder {
            None => Some(&mut self.root),
            Some(name) => self.folders.get_mut(name),
        }
    }

    /// Cell labels of a location, folders first.
    fn cells(&self, folder: Option<&str>) -> Vec<String> {
        let mut cells = Vec::new();
        if folder.is_none() {
            cells.extend(self.folders.keys().cloned());
        }
        if let Some(files) = self.files(folder) {
            cells.extend(files.keys().map(|name| cell_label(name)));
        }
        cells
    }

    fn file_for_cell(&self, folder: Option<&str>, label: &str) -> Option<(&String, &Vec<u8>)> {
        self.files(folder)?
            .iter()
            .find(|(name, _)| cell_label(name) == label)
    }
}

#[derive(Debug)]
struct ViewerApp {
    running: bool,
    screen: Screen,
    document: Option<OpenDocument>,
    menu: Option<Menu>,
    draft: Option<String>,
    prompt: Option<String>,
}

impl ViewerApp {
    fn new() -> Self {
        Self {
            running: false,
            screen: Screen::Recents,
            document: None,
            menu: None,
            draft: None,
            prompt: None,
        }
    }

    fn reset(&mut self, running: bool) {
        *self = Self::new();
        self.running = running;
    }
}

#[derive(Debug, Default)]
struct TargetApp {
    running: bool,
    invocation_count: u64,
    last_link: Option<String>,
}

#[derive(Debug, Clone)]
struct Labels {
    viewer_bundle: String,
    target_bundle: String,
    home_location: String,
    browse_tab: String,
    done_button: String,
    paste_action: String,
    new_folder_action: String,
    delete_action: String,
    counter_id: String,
    link_id: String,
    empty_link_label: String,
    accept_button: String,
}

impl From<&HarnessConfig> for Labels {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            viewer_bundle: config.viewer.bundle_id.clone(),
            target_bundle: config.target.bundle_id.clone(),
            home_location: config.viewer.home_location.clone(),
            browse_tab: config.viewer.browse_tab.clone(),
            done_button: config.viewer.done_button.clone(),
            paste_action: config.viewer.paste_action.clone(),
            new_folder_action: config.viewer.new_folder_action.clone(),
            delete_action: config.viewer.delete_action.clone(),
            counter_id: config.target.counter_id.clone(),
            link_id: config.target.link_id.clone(),
            empty_link_label: config.target.empty_link_label.clone(),
            accept_button: config.target.accept_button.clone(),
        }
    }
}

pub struct SimulatedDevice {
    labels: Labels,
    faults: SimulatedFaults,
    storage: Storage,
    viewer: ViewerApp,
    target: TargetApp,
    foreground: Option<String>,
    pasteboard: Option<PasteboardItem>,
    handles: HashMap<ElementSelector, RecordedHandle>,
    paste_count: usize,
}

impl SimulatedDevice {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            labels: Labels::from(config),
            faults: SimulatedFaults::default(),
            storage: Storage::default(),
            viewer: ViewerApp::new(),
            target: TargetApp::default(),
            foreground: None,
            pasteboard: None,
            handles: HashMap::new(),
            paste_count: 0,
        }
    }

    pub fn with_faults(mut self, faults: SimulatedFaults) -> Self {
        self.faults = faults;
        self
    }

    pub fn faults_mut(&mut self) -> &mut SimulatedFaults {
        &mut self.faults
    }

    /// Place a file directly into storage, as a previous run would have left it.
    pub fn seed_file(&mut self, folder: Option<&str>, file_name: &str, contents: &[u8]) {
        if let Some(folder) = folder {
            self.storage.folders.entry(folder.to_string()).or_default();
        }
        if let Some(files) = self.storage.files_mut(folder) {
            files.insert(file_name.to_string(), contents.to_vec());
        }
    }

    pub fn seed_folder(&mut self, folder: &str) {
        self.storage.folders.entry(folder.to_string()).or_default();
    }

    /// Names stored at a location; the root also lists its folders.
    pub fn items(&self, folder: Option<&str>) -> Vec<String> {
        let mut items = Vec::new();
        if folder.is_none() {
            items.extend(self.storage.folders.keys().cloned());
        }
        if let Some(files) = self.storage.files(folder) {
            items.extend(files.keys().cloned());
        }
        items
    }

    pub fn has_folder(&self, folder: &str) -> bool {
        self.storage.folders.contains_key(folder)
    }

    pub fn file_contents(&self, folder: Option<&str>, file_name: &str) -> Option<&[u8]> {
        self.storage
            .files(folder)?
            .get(file_name)
            .map(Vec::as_slice)
    }

    pub fn target_state(&self) -> ObservableState {
        ObservableState {
            invocation_count: self.target.invocation_count,
            last_link: self.target.last_link.clone(),
        }
    }

    pub fn paste_count(&self) -> usize {
        self.paste_count
    }

    pub fn open_document_title(&self) -> Option<&str> {
        self.viewer.document.as_ref().map(|doc| doc.title.as_str())
    }

    fn is_foreground(&self, bundle_id: &str) -> bool {
        self.foreground.as_deref() == Some(bundle_id)
    }

    fn current_folder(&self) -> Option<Option<&str>> {
        match &self.viewer.screen {
            Screen::Folder(folder) => Some(folder.as_deref()),
            _ => None,
        }
    }

    fn title(&self) -> String {
        if let Some(document) = &self.viewer.document {
            return document.title.clone();
        }
        match &self.viewer.screen {
            Screen::Recents => RECENTS_TAB.to_string(),
            Screen::Browse => self.labels.browse_tab.clone(),
            Screen::Folder(None) => self.labels.home_location.clone(),
            Screen::Folder(Some(name)) => name.clone(),
        }
    }

    fn visible_cells(&self) -> Vec<(ElementKind, String)> {
        if self.viewer.document.is_some() {
            return Vec::new();
        }
        match &self.viewer.screen {
            Screen::Recents => Vec::new(),
            Screen::Browse => vec![(ElementKind::LocationCell, self.labels.home_location.clone())],
            Screen::Folder(folder) => self
                .storage
                .cells(folder.as_deref())
                .into_iter()
                .map(|label| (ElementKind::ItemCell, label))
                .collect(),
        }
    }

    fn menu_actions(&self) -> Vec<String> {
        match &self.viewer.menu {
            None => Vec::new(),
            Some(Menu::Background { paste }) => {
                let mut actions = vec![self.labels.new_folder_action.clone()];
                if *paste {
                    actions.insert(0, self.labels.paste_action.clone());
                }
                actions
            }
            Some(Menu::Item { .. }) => vec![self.labels.delete_action.clone()],
        }
    }

    fn resolve(&self, selector: &ElementSelector) -> Option<SimElement> {
        let name = selector.name.as_deref();
        let matches = |label: &str| name.map_or(true, |name| name == label);

        if self.is_foreground(&self.labels.target_bundle) {
            if selector.role != ElementRole::StaticText || selector.within.is_some() {
                return None;
            }
            return [self.labels.counter_id.as_str(), self.labels.link_id.as_str()]
                .into_iter()
                .find(|&id| matches(id))
                .map(|id| SimElement::new(ElementKind::TargetText, id));
        }
        if !self.is_foreground(&self.labels.viewer_bundle) {
            return None;
        }

        if let Some(url) = &self.viewer.prompt {
            match (selector.role, selector.within) {
                (ElementRole::Alert, None) => {
                    return Some(SimElement::new(ElementKind::Alert, url.as_str()));
                }
                (ElementRole::Button, Some(ElementRole::Alert)) => {
                    return [self.labels.accept_button.as_str(), CANCEL_BUTTON]
                        .into_iter()
                        .find(|&label| matches(label))
                        .map(|label| SimElement::new(ElementKind::AlertButton, label));
                }
                _ => {}
            }
        }

        let title = self.title();
        match (selector.role, selector.within) {
            (ElementRole::NavigationBar, None) => {
                matches(title.as_str()).then(|| SimElement::new(ElementKind::NavigationBar, title))
            }
            (ElementRole::StaticText, Some(ElementRole::NavigationBar)) => {
                matches(title.as_str()).then(|| SimElement::new(ElementKind::NavigationTitle, title))
            }
            (ElementRole::Button, within)
                if matches!(within, None | Some(ElementRole::NavigationBar))
                    && (self.viewer.document.is_some() || self.viewer.draft.is_some())
                    && name == Some(self.labels.done_button.as_str()) =>
            {
                Some(SimElement::new(
                    ElementKind::DoneButton,
                    self.labels.done_button.as_str(),
                ))
            }
            (ElementRole::Button, None) => self
                .menu_actions()
                .into_iter()
                .find(|action| matches(action.as_str()))
                .map(|action| SimElement::new(ElementKind::MenuAction, action)),
            (ElementRole::TabBarButton, None) if self.viewer.document.is_none() => {
                [RECENTS_TAB, self.labels.browse_tab.as_str()]
                    .into_iter()
                    .find(|&tab| matches(tab))
                    .map(|tab| SimElement::new(ElementKind::Tab, tab))
            }
            (ElementRole::CollectionView, None)
                if self.viewer.document.is_none() && self.current_folder().is_some() =>
            {
                Some(SimElement::new(ElementKind::CollectionView, ""))
            }
            (ElementRole::Cell, None | Some(ElementRole::CollectionView))
            | (ElementRole::StaticText, Some(ElementRole::Cell)) => self
                .visible_cells()
                .into_iter()
                .find(|(_, label)| matches(label.as_str()))
                .map(|(kind, label)| SimElement::new(kind, label)),
            (ElementRole::TextField, None) => self
                .viewer
                .draft
                .as_ref()
                .map(|draft| SimElement::new(ElementKind::FolderNameField, draft.as_str())),
            (ElementRole::StaticText, None) => match &self.viewer.document {
                Some(document) => document
                    .anchors
                    .iter()
                    .find(|anchor| matches(anchor.label.as_str()))
                    .map(|anchor| SimElement::new(ElementKind::Anchor, anchor.label.as_str())),
                None => None,
            },
            _ => None,
        }
    }

    fn element(&self, handle: &ElementHandle) -> Result<SimElement> {
        let recorded = self
            .handles
            .get(&handle.selector)
            .ok_or_else(|| anyhow!("unknown element handle {}", handle.id))?;
        match self.resolve(&handle.selector) {
            Some(current) if recorded.id == handle.id && current == recorded.element => {
                Ok(current)
            }
            _ => bail!("element {} is no longer on screen", handle.selector),
        }
    }

    fn ensure_interactable(&self, element: &SimElement) -> Result<()> {
        if self.viewer.prompt.is_some()
            && self.is_foreground(&self.labels.viewer_bundle)
            && !matches!(element.kind, ElementKind::Alert | ElementKind::AlertButton)
        {
            bail!("interaction blocked by system prompt");
        }
        Ok(())
    }

    fn app(&self, bundle_id: &str) -> Result<AppRef> {
        if bundle_id == self.labels.viewer_bundle {
            Ok(AppRef::Viewer)
        } else if bundle_id == self.labels.target_bundle {
            Ok(AppRef::Target)
        } else {
            bail!("app {bundle_id} is not installed")
        }
    }

    fn paste(&mut self) -> Result<()> {
        let Some(folder) = self.current_folder().map(|folder| folder.map(str::to_string)) else {
            bail!("paste requires a folder location");
        };
        let Some(item) = self.pasteboard.clone() else {
            bail!("pasteboard is empty");
        };
        self.paste_count += 1;
        if self.faults.drop_pastes {
            tracing::debug!(target = "simulator", "dropping paste");
            return Ok(());
        }
        let files = self
            .storage
            .files_mut(folder.as_deref())
            .ok_or_else(|| anyhow!("folder vanished during paste"))?;
        let name = unique_file_name(files, &item.suggested_name);
        tracing::debug!(target = "simulator", file = %name, folder = ?folder, "pasted file");
        files.insert(name, item.data);
        Ok(())
    }

    fn create_folder(&mut self) -> Result<()> {
        let Some(name) = self.viewer.draft.take() else {
            return Ok(());
        };
        if self.current_folder() != Some(None) {
            bail!("folders can only be created at {}", self.labels.home_location);
        }
        let mut candidate = name.clone();
        let mut counter = 2;
        while self.storage.folders.contains_key(&candidate) {
            candidate = format!("{name} {counter}");
            counter += 1;
        }
        tracing::debug!(target = "simulator", folder = %candidate, "created folder");
        self.storage.folders.insert(candidate, BTreeMap::new());
        Ok(())
    }

    fn delete(&mut self, label: &str) -> Result<()> {
        let folder = self
            .current_folder()
            .ok_or_else(|| anyhow!("delete requires a folder location"))?
            .map(str::to_string);
        if folder.is_none() && self.storage.folders.remove(label).is_some() {
            return Ok(());
        }
        let name = self
            .storage
            .file_for_cell(folder.as_deref(), label)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| anyhow!("no item labelled {label}"))?;
        if let Some(files) = self.storage.files_mut(folder.as_deref()) {
            files.remove(&name);
        }
        Ok(())
    }

    fn open_cell(&mut self, label: &str) -> Result<()> {
        let folder = self
            .current_folder()
            .ok_or_else(|| anyhow!("no folder is showing"))?
            .map(str::to_string);
        if folder.is_none() && self.storage.folders.contains_key(label) {
            self.viewer.screen = Screen::Folder(Some(label.to_string()));
            return Ok(());
        }
        let (name, bytes) = self
            .storage
            .file_for_cell(folder.as_deref(), label)
            .ok_or_else(|| anyhow!("no item labelled {label}"))?;
        let title = name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(name)
            .to_string();
        let mut anchors = extract_anchors(&String::from_utf8_lossy(bytes));
        if let Some(stripped) = &self.faults.strip_anchor {
            anchors.retain(|anchor| &anchor.label != stripped);
        }
        self.viewer.document = Some(OpenDocument { title, anchors });
        Ok(())
    }

    fn hand_off(&mut self) {
        let Some(url) = self.viewer.prompt.take() else {
            return;
        };
        if self.faults.close_document_on_handoff {
            self.viewer.document = None;
        }
        if self.faults.block_launch {
            tracing::debug!(target = "simulator", url = %url, "swallowing handoff");
            return;
        }
        if !self.target.running {
            self.target = TargetApp {
                running: true,
                ..TargetApp::default()
            };
        }
        self.target.invocation_count += 1;
        self.target.last_link = Some(url);
        self.foreground = Some(self.labels.target_bundle.clone());
    }

    fn activate(&mut self, element: &SimElement) -> Result<()> {
        match element.kind {
            ElementKind::DoneButton => {
                if self.viewer.draft.is_some() {
                    self.create_folder()?;
                } else {
                    self.viewer.document = None;
                }
            }
            ElementKind::Tab => {
                self.viewer.menu = None;
                self.viewer.screen = if element.label == RECENTS_TAB {
                    Screen::Recents
                } else {
                    Screen::Browse
                };
            }
            ElementKind::LocationCell => {
                self.viewer.screen = Screen::Folder(None);
            }
            ElementKind::ItemCell => {
                self.viewer.menu = None;
                self.open_cell(&element.label)?;
            }
            ElementKind::CollectionView => self.viewer.menu = None,
            ElementKind::MenuAction => {
                let menu = self.viewer.menu.take();
                if element.label == self.labels.paste_action {
                    self.paste()?;
                } else if element.label == self.labels.new_folder_action {
                    self.viewer.draft = Some(UNTITLED_FOLDER.to_string());
                } else if let Some(Menu::Item { label }) = menu {
                    self.delete(&label)?;
                }
            }
            ElementKind::Anchor => {
                let href = self
                    .viewer
                    .document
                    .as_ref()
                    .and_then(|doc| doc.anchors.iter().find(|a| a.label == element.label))
                    .and_then(|anchor| anchor.href.clone());
                if let Some(href) = href {
                    if !self.faults.suppress_prompt {
                        self.viewer.prompt = Some(href);
                    }
                }
            }
            ElementKind::AlertButton => {
                if element.label == self.labels.accept_button {
                    self.hand_off();
                } else {
                    self.viewer.prompt = None;
                }
            }
            ElementKind::NavigationBar
            | ElementKind::NavigationTitle
            | ElementKind::FolderNameField
            | ElementKind::Alert
            | ElementKind::TargetText => {}
        }
        Ok(())
    }
}

enum AppRef {
    Viewer,
    Target,
}

impl UiDriver for SimulatedDevice {
    fn launch_app(&mut self, bundle_id: &str) -> Result<()> {
        match self.app(bundle_id)? {
            AppRef::Viewer => self.viewer.reset(true),
            AppRef::Target => {
                self.target = TargetApp {
                    running: true,
                    ..TargetApp::default()
                }
            }
        }
        self.foreground = Some(bundle_id.to_string());
        Ok(())
    }

    fn terminate_app(&mut self, bundle_id: &str) -> Result<()> {
        match self.app(bundle_id)? {
            AppRef::Viewer => self.viewer.reset(false),
            AppRef::Target => self.target.running = false,
        }
        if self.is_foreground(bundle_id) {
            self.foreground = None;
        }
        Ok(())
    }

    fn activate_app(&mut self, bundle_id: &str) -> Result<()> {
        let running = match self.app(bundle_id)? {
            AppRef::Viewer => self.viewer.running,
            AppRef::Target => self.target.running,
        };
        if !running {
            return self.launch_app(bundle_id);
        }
        self.foreground = Some(bundle_id.to_string());
        Ok(())
    }

    fn app_state(&mut self, bundle_id: &str) -> Result<AppState> {
        let running = match self.app(bundle_id)? {
            AppRef::Viewer => self.viewer.running,
            AppRef::Target => self.target.running,
        };
        Ok(if !running {
            AppState::NotRunning
        } else if self.is_foreground(bundle_id) {
            AppState::Foreground
        } else {
            AppState::Background
        })
    }

    fn find(&mut self, selector: &ElementSelector) -> Result<Option<ElementHandle>> {
        let Some(element) = self.resolve(selector) else {
            return Ok(None);
        };
        let id = match self.handles.get(selector) {
            Some(recorded) if recorded.element == element => recorded.id.clone(),
            _ => {
                let id = Uuid::new_v4().to_string();
                self.handles.insert(
                    selector.clone(),
                    RecordedHandle {
                        id: id.clone(),
                        element,
                    },
                );
                id
            }
        };
        Ok(Some(ElementHandle {
            id,
            selector: selector.clone(),
        }))
    }

    fn tap(&mut self, element: &ElementHandle) -> Result<()> {
        let element = self.element(element)?;
        self.ensure_interactable(&element)?;
        self.activate(&element)
    }

    fn double_tap(&mut self, element: &ElementHandle) -> Result<()> {
        let element = self.element(element)?;
        self.ensure_interactable(&element)?;
        // A double tap on a tab pops it back to its root; elsewhere it acts once.
        self.activate(&element)
    }

    fn long_press(&mut self, element: &ElementHandle, _duration: Duration) -> Result<()> {
        let element = self.element(element)?;
        self.ensure_interactable(&element)?;
        self.viewer.menu = match element.kind {
            ElementKind::CollectionView => Some(Menu::Background {
                paste: self.pasteboard.is_some(),
            }),
            ElementKind::ItemCell => Some(Menu::Item {
                label: element.label,
            }),
            _ => bail!("long press has no effect on {}", element.label),
        };
        Ok(())
    }

    fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        let element = self.element(element)?;
        match element.kind {
            ElementKind::FolderNameField => {
                self.viewer.draft = Some(text.to_string());
                Ok(())
            }
            _ => bail!("cannot type into {}", element.label),
        }
    }

    fn element_label(&mut self, element: &ElementHandle) -> Result<String> {
        let element = self.element(element)?;
        if element.kind != ElementKind::TargetText {
            return Ok(element.label);
        }
        Ok(if element.label == self.labels.counter_id {
            self.target.invocation_count.to_string()
        } else {
            self.target
                .last_link
                .clone()
                .unwrap_or_else(|| self.labels.empty_link_label.clone())
        })
    }

    fn set_pasteboard(&mut self, item: &PasteboardItem) -> Result<()> {
        self.pasteboard = Some(item.clone());
        Ok(())
    }
}

fn unique_file_name(existing: &BTreeMap<String, Vec<u8>>, suggested: &str) -> String {
    if !existing.contains_key(suggested) {
        return suggested.to_string();
    }
    let (stem, ext) = match suggested.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (suggested, None),
    };
    (2..)
        .map(|n| match ext {
            Some(ext) => format!("{stem} {n}.{ext}"),
            None => format!("{stem} {n}"),
        })
        .find(|candidate| !existing.contains_key(candidate))
        .unwrap_or_else(|| suggested.to_string())
}

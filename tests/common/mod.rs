#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use deeplink_harness::config::Timeouts;
use deeplink_harness::{HarnessConfig, LinkEntry};

pub const FILE_NAME: &str = "MyDeeplinks";
pub const FOLDER: &str = "_Deeplinks_";
pub const URL_FILE_NAME: &str = "URLDeeplinks";
pub const URL_FOLDER: &str = "_URLDeeplinks_";

pub fn show_settings_universal() -> LinkEntry {
    LinkEntry::new(
        "Show settings universal",
        "https://josshad.glatop.com/app/showSettings",
    )
}

pub fn activate_premium() -> LinkEntry {
    LinkEntry::new(
        "Activate premium",
        "https://josshad.glatop.com/app/activatePremium",
    )
}

pub fn show_settings_by_scheme() -> LinkEntry {
    LinkEntry::new("Show settings by scheme", "testdeeplink://showSettings")
}

pub fn activate_premium_by_scheme() -> LinkEntry {
    LinkEntry::new("Activate premium by scheme", "testdeeplink://premium")
}

pub fn scheme_links() -> Vec<LinkEntry> {
    vec![show_settings_by_scheme(), activate_premium_by_scheme()]
}

pub fn universal_links() -> Vec<LinkEntry> {
    vec![show_settings_universal(), activate_premium()]
}

pub fn all_links() -> Vec<LinkEntry> {
    vec![
        show_settings_universal(),
        activate_premium(),
        show_settings_by_scheme(),
        activate_premium_by_scheme(),
    ]
}

pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/testDeeplinks.html")
}

/// Defaults with waits short enough for the simulated device.
pub fn fast_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.timeouts = Timeouts::uniform(Duration::from_millis(150), Duration::from_millis(5));
    config
}

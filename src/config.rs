use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::automation::WaitOptions;

const CONFIG_ENV: &str = "DEEPLINK_HARNESS_CONFIG";
const AGENT_URL_ENV: &str = "DEEPLINK_AGENT_URL";
const TARGET_BUNDLE_ENV: &str = "DEEPLINK_TARGET_BUNDLE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read harness config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid agent url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub viewer: ViewerSettings,
    pub target: TargetSettings,
    pub timeouts: Timeouts,
    pub agent: AgentSettings,
    pub stop_on_first_failure: bool,
}

/// Labels of the file viewer's native affordances.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub bundle_id: String,
    pub home_location: String,
    pub browse_tab: String,
    pub done_button: String,
    pub paste_action: String,
    pub new_folder_action: String,
    pub delete_action: String,
    pub long_press_ms: u64,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            bundle_id: "com.apple.DocumentsApp".into(),
            home_location: "On My iPhone".into(),
            browse_tab: "Browse".into(),
            done_button: "Done".into(),
            paste_action: "Paste".into(),
            new_folder_action: "New Folder".into(),
            delete_action: "Delete".into(),
            long_press_ms: 1300,
        }
    }
}

impl ViewerSettings {
    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }
}

/// How the target application exposes its open-URL readback.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetSettings {
    pub bundle_id: String,
    pub counter_id: String,
    pub link_id: String,
    pub empty_link_label: String,
    pub accept_button: String,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            bundle_id: "com.example.DeeplinkTesting".into(),
            counter_id: "ContentView.countID".into(),
            link_id: "ContentView.link".into(),
            empty_link_label: "None".into(),
            accept_button: "Open".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub staging_ms: u64,
    pub element_ms: u64,
    pub prompt_ms: u64,
    pub launch_ms: u64,
    pub readback_ms: u64,
    pub poll_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            staging_ms: 5_000,
            element_ms: 5_000,
            prompt_ms: 5_000,
            launch_ms: 5_000,
            readback_ms: 5_000,
            poll_ms: 200,
        }
    }
}

impl Timeouts {
    /// Uniform timeouts, handy for tests and dry runs.
    pub fn uniform(timeout: Duration, poll_interval: Duration) -> Self {
        let timeout_ms = timeout.as_millis() as u64;
        Self {
            staging_ms: timeout_ms,
            element_ms: timeout_ms,
            prompt_ms: timeout_ms,
            launch_ms: timeout_ms,
            readback_ms: timeout_ms,
            poll_ms: poll_interval.as_millis() as u64,
        }
    }

    fn wait(&self, timeout_ms: u64) -> WaitOptions {
        WaitOptions::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(self.poll_ms),
        )
    }

    pub fn staging(&self) -> WaitOptions {
        self.wait(self.staging_ms)
    }

    pub fn element(&self) -> WaitOptions {
        self.wait(self.element_ms)
    }

    pub fn prompt(&self) -> WaitOptions {
        self.wait(self.prompt_ms)
    }

    pub fn launch(&self) -> WaitOptions {
        self.wait(self.launch_ms)
    }

    pub fn readback(&self) -> WaitOptions {
        self.wait(self.readback_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub url: String,
    pub request_timeout_ms: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8100".into(),
            request_timeout_ms: 30_000,
        }
    }
}

impl AgentSettings {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Ok(Url::parse(&self.url)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl HarnessConfig {
    /// Load from `config_path` if it exists, falling back to defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(&path)?;
                let config: HarnessConfig = serde_yaml::from_str(&contents)?;
                tracing::debug!(target = "config", path = %path.display(), "loaded harness config");
                config
            }
            _ => HarnessConfig::default(),
        };
        config.agent.base_url()?;
        Ok(config)
    }

    /// Precedence:
    /// 1) DEEPLINK_HARNESS_CONFIG
    /// 2) <platform config dir>/deeplink-harness/harness.yaml
    pub fn default_path() -> Option<PathBuf> {
        env::var_os(CONFIG_ENV)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                ProjectDirs::from("dev", "deeplink", "deeplink-harness")
                    .map(|dirs| dirs.config_dir().join("harness.yaml"))
            })
    }

    pub fn apply_env(mut self) -> Self {
        if let Some(url) = env::var(AGENT_URL_ENV).ok().filter(|url| !url.is_empty()) {
            self.agent.url = url;
        }
        if let Some(bundle) = env::var(TARGET_BUNDLE_ENV)
            .ok()
            .filter(|bundle| !bundle.is_empty())
        {
            self.target.bundle_id = bundle;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_defaults_without_file() {
        let config = HarnessConfig::load(None).unwrap();
        assert_eq!(config.viewer.bundle_id, "com.apple.DocumentsApp");
        assert_eq!(config.timeouts.prompt().timeout, Duration::from_secs(5));
        assert!(!config.stop_on_first_failure);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = HarnessConfig::load(Some(PathBuf::from("/no/such/harness.yaml"))).unwrap();
        assert_eq!(config.target.accept_button, "Open");
    }

    #[test]
    fn loads_partial_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "target:\n  bundle_id: com.acme.App\ntimeouts:\n  launch_ms: 9000\nstop_on_first_failure: true"
        )
        .unwrap();
        let config = HarnessConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.target.bundle_id, "com.acme.App");
        assert_eq!(config.target.counter_id, "ContentView.countID");
        assert_eq!(config.timeouts.launch().timeout, Duration::from_millis(9000));
        assert_eq!(config.timeouts.staging_ms, 5000);
        assert!(config.stop_on_first_failure);
    }

    #[test]
    fn rejects_bad_agent_url() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "agent:\n  url: not a url").unwrap();
        assert!(matches!(
            HarnessConfig::load(Some(file.path().to_path_buf())),
            Err(ConfigError::InvalidUrl(_))
        ));
    }
}

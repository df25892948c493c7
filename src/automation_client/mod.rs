//! Blocking HTTP client for an on-device automation agent.
//!
//! The agent owns the real UI automation runtime; this side only speaks its
//! JSON protocol. Every response is wrapped as `{"value": ...}` and failures
//! carry `{"value": {"error": "..."}}` with a non-success status.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::automation::{AppState, ElementHandle, ElementSelector, PasteboardItem, UiDriver};
use crate::config::AgentSettings;

/// [`UiDriver`] backed by a remote agent session. The session is deleted on drop.
pub struct RemoteDriver {
    client: Client,
    base_url: Url,
    session_id: String,
}

impl RemoteDriver {
    /// Open a new agent session.
    pub fn connect(settings: &AgentSettings) -> Result<Self> {
        let base_url = settings.base_url().context("parse agent base url")?;
        Self::connect_to(base_url, settings.request_timeout())
    }

    pub fn connect_to(base_url: Url, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("build agent http client")?;
        let base_url = with_trailing_slash(base_url);
        let url = endpoint(&base_url, "session")?;
        let created: CreatedSession = envelope(client.post(url).json(&Empty {}))
            .context("create agent session")?;
        tracing::info!(target = "agent", url = %base_url, session = %created.session_id, "agent session opened");
        Ok(Self {
            client,
            base_url,
            session_id: created.session_id,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        let full_path = format!(
            "session/{}/{}",
            self.session_id,
            path.trim_start_matches('/')
        );
        endpoint(&self.base_url, &full_path)
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path)?;
        envelope(self.client.post(url).json(body)).with_context(|| format!("POST {path}"))
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        envelope(self.client.get(url)).with_context(|| format!("GET {path}"))
    }

    fn element_action<B: Serialize>(&self, element: &ElementHandle, action: &str, body: &B) -> Result<()> {
        let path = format!("element/{}/{action}", element.id);
        let _: Option<serde_json::Value> = self.post(&path, body)?;
        Ok(())
    }

    fn app_action(&self, verb: &str, bundle_id: &str) -> Result<()> {
        let _: Option<serde_json::Value> = self.post(
            &format!("app/{verb}"),
            &BundlePayload {
                bundle_id: bundle_id.to_string(),
            },
        )?;
        tracing::debug!(target = "agent", verb, bundle_id, "app command sent");
        Ok(())
    }
}

impl Drop for RemoteDriver {
    fn drop(&mut self) {
        let Ok(url) = endpoint(&self.base_url, &format!("session/{}", self.session_id)) else {
            return;
        };
        if let Err(err) = self.client.delete(url).send() {
            tracing::warn!(target = "agent", session = %self.session_id, error = %err, "failed to close agent session");
        }
    }
}

impl UiDriver for RemoteDriver {
    fn launch_app(&mut self, bundle_id: &str) -> Result<()> {
        self.app_action("launch", bundle_id)
    }

    fn terminate_app(&mut self, bundle_id: &str) -> Result<()> {
        self.app_action("terminate", bundle_id)
    }

    fn activate_app(&mut self, bundle_id: &str) -> Result<()> {
        self.app_action("activate", bundle_id)
    }

    fn app_state(&mut self, bundle_id: &str) -> Result<AppState> {
        let query = serde_urlencoded::to_string(BundlePayload {
            bundle_id: bundle_id.to_string(),
        })
        .context("encode app state query")?;
        self.get(&format!("app/state?{query}"))
    }

    fn find(&mut self, selector: &ElementSelector) -> Result<Option<ElementHandle>> {
        let query = serde_urlencoded::to_string(selector).context("encode selector query")?;
        let id: Option<String> = self.get(&format!("element?{query}"))?;
        Ok(id.map(|id| ElementHandle {
            id,
            selector: selector.clone(),
        }))
    }

    fn tap(&mut self, element: &ElementHandle) -> Result<()> {
        self.element_action(element, "tap", &Empty {})
    }

    fn double_tap(&mut self, element: &ElementHandle) -> Result<()> {
        self.element_action(element, "double_tap", &Empty {})
    }

    fn long_press(&mut self, element: &ElementHandle, duration: Duration) -> Result<()> {
        self.element_action(
            element,
            "press",
            &PressPayload {
                milliseconds: duration.as_millis() as u64,
            },
        )
    }

    fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        self.element_action(
            element,
            "type",
            &TypePayload {
                text: text.to_string(),
            },
        )
    }

    fn element_label(&mut self, element: &ElementHandle) -> Result<String> {
        self.get(&format!("element/{}/label", element.id))
    }

    fn set_pasteboard(&mut self, item: &PasteboardItem) -> Result<()> {
        let _: Option<serde_json::Value> = self.post(
            "pasteboard",
            &PasteboardPayload {
                suggested_name: item.suggested_name.clone(),
                type_identifier: item.type_identifier.clone(),
                data: BASE64.encode(&item.data),
            },
        )?;
        Ok(())
    }
}

/// Agent routes are relative so a path prefix in the configured url is kept.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn endpoint(base_url: &Url, path: &str) -> Result<Url> {
    base_url.join(path).context("build request url")
}

/// Send `request` and unwrap the `value` envelope, turning agent-reported
/// errors into `anyhow` errors.
fn envelope<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().context("execute agent request")?;
    let status = response.status();
    let body: Envelope<serde_json::Value> =
        response.json().context("parse agent response body")?;
    if !status.is_success() {
        let failure: AgentFailure = serde_json::from_value(body.value)
            .map_err(|_| anyhow!("agent responded with status {status}"))?;
        return Err(anyhow!("agent error ({status}): {}", failure.error));
    }
    serde_json::from_value(body.value).context("decode agent response value")
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub value: T,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentFailure {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlePayload {
    pub bundle_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PressPayload {
    pub milliseconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TypePayload {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteboardPayload {
    pub suggested_name: String,
    pub type_identifier: String,
    /// Base64 of the item's bytes.
    pub data: String,
}

impl PasteboardPayload {
    pub fn into_item(self) -> Result<PasteboardItem> {
        let data = BASE64
            .decode(self.data.as_bytes())
            .context("decode pasteboard data")?;
        Ok(PasteboardItem {
            suggested_name: self.suggested_name,
            type_identifier: self.type_identifier,
            data,
        })
    }
}

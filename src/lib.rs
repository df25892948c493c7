// Library exports for the runner and integration tests

pub mod automation;
pub mod automation_client;
pub mod config;
pub mod document;
pub mod error;
pub mod handoff;
pub mod navigation;
pub mod scenario;
pub mod session;
pub mod staging;
pub mod verify;
pub mod viewer;

// Re-export commonly used types
pub use automation::simulated::{SimulatedDevice, SimulatedFaults};
pub use automation::{AppState, ElementRole, ElementSelector, UiDriver, WaitOptions};
pub use automation_client::RemoteDriver;
pub use config::HarnessConfig;
pub use document::{LinkDocument, LinkEntry};
pub use error::{HarnessError, Result};
pub use scenario::Scenario;
pub use session::{DeeplinkSession, SequenceReport};
pub use staging::{ReadyLocation, StagingDescriptor, StagingKey};
pub use verify::{Mismatch, ObservableState, Verification};

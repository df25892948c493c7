use std::time::Duration;

use thiserror::Error;

use crate::document::DocumentError;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("staged file {file} did not appear in {location} within {waited:?}")]
    StagingTimeout {
        file: String,
        location: String,
        waited: Duration,
    },

    #[error("link {name:?} not found in document {document} within {waited:?}")]
    LinkNotFound {
        name: String,
        document: String,
        waited: Duration,
    },

    #[error("open confirmation for {link:?} did not appear within {waited:?}")]
    PromptTimeout { link: String, waited: Duration },

    #[error("{bundle_id} did not reach the foreground within {waited:?}")]
    LaunchTimeout { bundle_id: String, waited: Duration },

    #[error("{element} did not appear within {waited:?}")]
    ElementTimeout { element: String, waited: Duration },

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

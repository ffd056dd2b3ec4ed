use crate::error::QaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Document lifecycle. The only legal edges are
/// `Uploaded|Ready|Failed -> Processing`, `Processing -> Ready` and
/// `Processing -> Failed`; everything else is rejected so no call site
/// can leave a document in an inconsistent state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Ready,
    Failed,
}

impl DocumentStatus {
    pub fn transition(self, next: DocumentStatus) -> Result<DocumentStatus, QaError> {
        let allowed = matches!(
            (self, next),
            (DocumentStatus::Uploaded, DocumentStatus::Processing)
                | (DocumentStatus::Ready, DocumentStatus::Processing)
                | (DocumentStatus::Failed, DocumentStatus::Processing)
                | (DocumentStatus::Processing, DocumentStatus::Ready)
                | (DocumentStatus::Processing, DocumentStatus::Failed)
        );

        if allowed {
            Ok(next)
        } else {
            Err(QaError::InvalidState(format!(
                "illegal status transition {self} -> {next}"
            )))
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DocumentStatus::Uploaded => "UPLOADED",
            DocumentStatus::Processing => "PROCESSING",
            DocumentStatus::Ready => "READY",
            DocumentStatus::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

impl FromStr for DocumentStatus {
    type Err = QaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "UPLOADED" => Ok(DocumentStatus::Uploaded),
            "PROCESSING" => Ok(DocumentStatus::Processing),
            "READY" => Ok(DocumentStatus::Ready),
            "FAILED" => Ok(DocumentStatus::Failed),
            other => Err(QaError::Validation(format!(
                "unknown document status: {other}"
            ))),
        }
    }
}

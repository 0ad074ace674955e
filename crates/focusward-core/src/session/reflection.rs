use serde::{Deserialize, Serialize};

use crate::scoring::QualityLabel;

/// Summary of a just-completed session waiting for the user's note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionPrompt {
    pub session_id: String,
    pub score: u8,
    pub quality_label: QualityLabel,
    pub duration: u64,
}

/// A saved note about a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    pub session_id: String,
    pub text: String,
    /// Epoch milliseconds.
    pub saved_at: i64,
}

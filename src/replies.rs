//! User-facing chat replies.
//!
//! Every text the bridge ever sends to a chat sender lives here. Callers can
//! override any of them through [`crate::config::BridgeConfig::replies`]; the
//! constants are the defaults and reproduce the wording the bot has always
//! used with its (Portuguese-speaking) users.

use crate::error::ReplyClass;
use serde::{Deserialize, Serialize};

/// Sent immediately after a valid image is accepted.
pub const DEFAULT_PROCESSING: &str = "Processando sua imagem... 🔄";

/// Sent after the PDF attachment has been delivered.
pub const DEFAULT_SUCCESS: &str = "Aqui está seu PDF! 📄";

/// Sent when the attachment is not an image.
pub const DEFAULT_RETRY_PROMPT: &str = "Por favor, envie apenas imagens.";

/// Sent when conversion failed for an internal reason.
pub const DEFAULT_GENERIC_FAILURE: &str =
    "Desculpe, ocorreu um erro ao processar sua imagem. Por favor, tente enviar novamente.";

/// The complete set of reply texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyTexts {
    pub processing: String,
    pub success: String,
    pub retry_prompt: String,
    pub generic_failure: String,
}

impl Default for ReplyTexts {
    fn default() -> Self {
        Self {
            processing: DEFAULT_PROCESSING.to_string(),
            success: DEFAULT_SUCCESS.to_string(),
            retry_prompt: DEFAULT_RETRY_PROMPT.to_string(),
            generic_failure: DEFAULT_GENERIC_FAILURE.to_string(),
        }
    }
}

impl ReplyTexts {
    /// The text for a failed request.
    pub fn for_failure(&self, class: ReplyClass) -> &str {
        match class {
            ReplyClass::RetryPrompt => &self.retry_prompt,
            ReplyClass::GenericFailure => &self.generic_failure,
        }
    }
}

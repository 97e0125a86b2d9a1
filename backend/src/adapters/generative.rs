//! Vision-language classifier.
//!
//! Runs as a two-stage state machine: the image is uploaded to obtain a file
//! handle, then a one-word classification is requested against that handle.
//! Each stage has its own deadline; the aggregator bounds the whole call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::genai::{GenerativeModel, UploadedFile};
use super::{AdapterError, AdapterName, LabelAdapter, UNKNOWN_LABEL};
use crate::imaging::NormalizedImage;
use crate::invoker::with_deadline;

/// Reply requested from the model when the image shows nothing to classify.
pub const NO_FINDING_SENTINEL: &str = "no acne";

pub const VOCABULARY: [&str; 14] = [
    "Blackhead",
    "Conglobata",
    "Crystalline",
    "Cystic",
    "Flat_wart",
    "Folliculitis",
    "Keloid",
    "Milium",
    "Papular",
    "Purulent",
    "Scars",
    "Sebo-crystan-conglo",
    "Syringoma",
    "Whitehead",
];

pub fn classification_prompt() -> String {
    format!(
        "You are an acne-classification expert.\n\
         TASK: Return ONE WORD ONLY - the acne type that best matches the face in this image.\n\
         VALID TYPES: {}\n\
         If you detect NO visible acne, or the picture is not a human face, reply exactly: {}",
        VOCABULARY.join(", "),
        NO_FINDING_SENTINEL
    )
}

/// Strips whitespace, quoting and trailing punctuation the model tends to add.
pub fn clean_reply(text: &str) -> String {
    let cleaned = text
        .trim()
        .trim_matches(|c: char| matches!(c, '.' | '"' | '\'' | '*' | '`'))
        .trim();
    if cleaned.is_empty() {
        UNKNOWN_LABEL.to_string()
    } else {
        cleaned.to_string()
    }
}

#[derive(Debug)]
enum Stage {
    Uploading,
    Generating(UploadedFile),
    Done(String),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Uploading => "upload",
            Stage::Generating(_) => "generate",
            Stage::Done(_) => "done",
        }
    }
}

pub struct GenerativeAdapter {
    model: Arc<dyn GenerativeModel>,
    upload_deadline: Duration,
    generate_deadline: Duration,
}

impl GenerativeAdapter {
    pub fn new(model: Arc<dyn GenerativeModel>, upload_deadline: Duration, generate_deadline: Duration) -> Self {
        Self {
            model,
            upload_deadline,
            generate_deadline,
        }
    }

    async fn advance(&self, stage: Stage, image: &NormalizedImage) -> Result<Stage, AdapterError> {
        match stage {
            Stage::Uploading => {
                let upload = self.model.upload_file(image.jpeg.clone(), image.mime_type());
                let file = with_deadline("generative upload", self.upload_deadline, upload).await?;
                Ok(Stage::Generating(file))
            }
            Stage::Generating(file) => {
                let prompt = classification_prompt();
                let generate = self.model.generate_text(&prompt, Some(&file));
                let text = with_deadline("generative classification", self.generate_deadline, generate).await?;
                Ok(Stage::Done(text))
            }
            done @ Stage::Done(_) => Ok(done),
        }
    }
}

#[async_trait]
impl LabelAdapter for GenerativeAdapter {
    fn name(&self) -> AdapterName {
        AdapterName::Generative
    }

    async fn classify(&self, image: &NormalizedImage) -> Result<String, AdapterError> {
        let mut stage = Stage::Uploading;
        loop {
            stage = match stage {
                Stage::Done(text) => return Ok(clean_reply(&text)),
                pending => {
                    let current = pending.name();
                    self.advance(pending, image).await.map_err(|err| {
                        log::warn!("Generative classifier failed during {} stage: {}", current, err);
                        err
                    })?
                }
            };
        }
    }
}

// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const MIN_PROMPT_COUNT: u8 = 3;
pub const MAX_PROMPT_COUNT: u8 = 6;
pub const DEFAULT_PROMPT_COUNT: u8 = 4;
pub const MAX_ATTACHMENTS: usize = 5;

/// The four free-text creative fields. Any of them may be blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInputs {
    pub storyline: String,
    pub subject: String,
    pub environment: String,
    pub mood: String,
}

impl UserInputs {
    /// Labelled fields in the order they are shown to the model.
    pub fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("Storyline", self.storyline.as_str()),
            ("Subject", self.subject.as_str()),
            ("Environment", self.environment.as_str()),
            ("Mood", self.mood.as_str()),
        ]
    }

    /// Fields with non-blank values, trimmed.
    pub fn filled_fields(&self) -> Vec<(&'static str, &str)> {
        self.fields()
            .into_iter()
            .map(|(name, value)| (name, value.trim()))
            .filter(|(_, value)| !value.is_empty())
            .collect()
    }

    /// True when all four fields are blank.
    pub fn is_empty(&self) -> bool {
        self.filled_fields().is_empty()
    }
}

/// An already-encoded reference image. The bytes are never decoded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageAttachment {
    Inline {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
    },
    Reference {
        url: String,
    },
}

impl ImageAttachment {
    #[cfg(test)]
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        use base64::{Engine as _, engine::general_purpose};

        ImageAttachment::Inline {
            mime_type: mime_type.into(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn reference(url: impl Into<String>) -> Self {
        ImageAttachment::Reference { url: url.into() }
    }

    /// URL form accepted by the gateway: a data URL for inline images,
    /// the remote address otherwise.
    pub fn to_url(&self) -> String {
        match self {
            ImageAttachment::Inline { mime_type, data } => {
                format!("data:{};base64,{}", mime_type, data)
            }
            ImageAttachment::Reference { url } => url.clone(),
        }
    }
}

/// Abstract style information synthesised from the reference images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualStyleCues {
    pub description: String,
    #[serde(alias = "hex_palette", alias = "palette")]
    pub hex_palette: Vec<String>,
    #[serde(alias = "keyword_phrases")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPrompt {
    pub label: String,
    pub prompt: String,
}

/// Shape the text model is asked to return for a generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBatch {
    // Absent or null lists are left empty and reported as an empty result.
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompts: Vec<GeneratedPrompt>,
}

/// Shape the text model is asked to return for a revision call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisedPrompt {
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub prompts: Vec<GeneratedPrompt>,
    pub visual_style_cues: Option<VisualStyleCues>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
    #[serde(default)]
    pub inputs: UserInputs,
    #[serde(default = "default_prompt_count")]
    pub prompt_count: u8,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_prompt_count() -> u8 {
    DEFAULT_PROMPT_COUNT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRequest {
    /// Caller-side identity of the card being revised, used to keep at
    /// most one revision per card in flight.
    #[serde(default)]
    pub card_id: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub label: String,
    pub revision_note: String,
    #[serde(default)]
    pub inputs: UserInputs,
    #[serde(default)]
    pub visual_style_cues: Option<VisualStyleCues>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub request_id: Uuid,
    pub prompts: Vec<GeneratedPrompt>,
    pub visual_style_cues: Option<VisualStyleCues>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviseResponse {
    pub request_id: Uuid,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

/// Camera angles a generated prompt may be labelled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraAngle {
    WideEstablishing,
    Medium,
    CloseUp,
    ExtremeCloseUp,
    OverTheShoulder,
    LowAngle,
    HighAngle,
    Dutch,
    BirdsEye,
    Tracking,
}

impl CameraAngle {
    pub const ALL: [CameraAngle; 10] = [
        CameraAngle::WideEstablishing,
        CameraAngle::Medium,
        CameraAngle::CloseUp,
        CameraAngle::ExtremeCloseUp,
        CameraAngle::OverTheShoulder,
        CameraAngle::LowAngle,
        CameraAngle::HighAngle,
        CameraAngle::Dutch,
        CameraAngle::BirdsEye,
        CameraAngle::Tracking,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CameraAngle::WideEstablishing => "Wide Establishing Shot",
            CameraAngle::Medium => "Medium Shot",
            CameraAngle::CloseUp => "Close-Up",
            CameraAngle::ExtremeCloseUp => "Extreme Close-Up",
            CameraAngle::OverTheShoulder => "Over-the-Shoulder",
            CameraAngle::LowAngle => "Low Angle",
            CameraAngle::HighAngle => "High Angle",
            CameraAngle::Dutch => "Dutch Angle",
            CameraAngle::BirdsEye => "Bird's-Eye View",
            CameraAngle::Tracking => "Tracking Shot",
        }
    }

    /// Case-insensitive lookup by label.
    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = label.trim();
        Self::ALL
            .into_iter()
            .find(|angle| angle.label().eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for CameraAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// src/services/pipeline.rs
use crate::errors::{ShotlistError, Stage};
use crate::models::*;
use crate::services::extract::extract_checked;
use crate::services::gateway::{ChatMessage, ChatTransport, ContentPart};
use crate::services::templates;
use log::{error, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    AnalyzingVisuals,
    GeneratingPrompts,
    Revising,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::AnalyzingVisuals => "analyzing visuals",
            PipelineState::GeneratingPrompts => "generating prompts",
            PipelineState::Revising => "revising",
            PipelineState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Vision analysis followed by prompt generation, plus single-prompt
/// revision. Holds no per-request state; the credential is passed on
/// every call.
pub struct PromptPipeline {
    transport: Arc<dyn ChatTransport>,
    vision_model: String,
    text_model: String,
}

impl PromptPipeline {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        vision_model: impl Into<String>,
        text_model: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            vision_model: vision_model.into(),
            text_model: text_model.into(),
        }
    }

    pub async fn generate(
        &self,
        request: &GenerateRequest,
        credential: &str,
    ) -> Result<GenerationResult, ShotlistError> {
        validate_generate(request)?;
        let start = Instant::now();

        let cues = if request.images.is_empty() {
            None
        } else {
            self.analyze_visuals(&request.images, credential).await?
        };

        let prompts = self
            .generate_prompts(&request.inputs, request.prompt_count, cues.as_ref(), credential)
            .await?;

        info!(
            "Pipeline {}: {} prompt(s), cues {}, {} ms",
            PipelineState::Done,
            prompts.len(),
            if cues.is_some() { "present" } else { "absent" },
            start.elapsed().as_millis()
        );

        Ok(GenerationResult {
            prompts,
            visual_style_cues: cues,
        })
    }

    /// Returns `Ok(None)` when the model answered but its output could not
    /// be read as cues. Transport failures are returned as errors.
    async fn analyze_visuals(
        &self,
        images: &[ImageAttachment],
        credential: &str,
    ) -> Result<Option<VisualStyleCues>, ShotlistError> {
        info!(
            "Pipeline {}: {} image(s) via {}",
            PipelineState::AnalyzingVisuals,
            images.len(),
            self.vision_model
        );

        let mut parts = vec![ContentPart::text(templates::VISION_INSTRUCTION)];
        parts.extend(images.iter().map(ContentPart::image));
        let messages = [ChatMessage::user_parts(parts)];

        let raw = self
            .transport
            .send(&self.vision_model, &messages, credential, true)
            .await
            .inspect_err(|e| error!("Vision analysis failed: {}", e))?;

        match extract_checked::<VisualStyleCues>(&raw, Stage::VisionAnalysis) {
            Ok(cues) => Ok(Some(cues)),
            Err(e @ (ShotlistError::Parse { .. } | ShotlistError::Schema { .. })) => {
                warn!("Continuing without visual cues: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn generate_prompts(
        &self,
        inputs: &UserInputs,
        count: u8,
        cues: Option<&VisualStyleCues>,
        credential: &str,
    ) -> Result<Vec<GeneratedPrompt>, ShotlistError> {
        info!(
            "Pipeline {}: {} prompt(s) via {}",
            PipelineState::GeneratingPrompts,
            count,
            self.text_model
        );

        let messages = [
            ChatMessage::system(templates::system_instruction()),
            ChatMessage::user(templates::generation_user_message(inputs, count, cues)),
        ];

        let raw = self
            .transport
            .send(&self.text_model, &messages, credential, true)
            .await
            .inspect_err(|e| error!("Prompt generation failed: {}", e))?;

        let batch: PromptBatch = extract_checked(&raw, Stage::Generation)
            .inspect_err(|e| error!("Prompt generation failed: {}", e))?;

        if batch.prompts.len() != usize::from(count) {
            warn!(
                "Requested {} prompts, model returned {}",
                count,
                batch.prompts.len()
            );
        }
        warn_on_labels(&batch.prompts);

        Ok(batch.prompts)
    }

    /// Rewrites one prompt. Either a complete replacement comes back or an
    /// error does; nothing partial.
    pub async fn revise(
        &self,
        request: &RevisionRequest,
        credential: &str,
    ) -> Result<String, ShotlistError> {
        validate_revision(request)?;
        info!(
            "Pipeline {}: '{}' via {}",
            PipelineState::Revising,
            request.label,
            self.text_model
        );

        let messages = [
            ChatMessage::system(templates::system_instruction()),
            ChatMessage::user(templates::revision_user_message(
                &request.prompt,
                &request.label,
                &request.revision_note,
                &request.inputs,
                request.visual_style_cues.as_ref(),
            )),
        ];

        let raw = self
            .transport
            .send(&self.text_model, &messages, credential, true)
            .await
            .inspect_err(|e| error!("Revision failed: {}", e))?;

        let revised: RevisedPrompt = extract_checked(&raw, Stage::Revision)
            .inspect_err(|e| error!("Revision failed: {}", e))?;

        info!("Pipeline {}: revision complete", PipelineState::Done);
        Ok(revised.prompt.trim().to_string())
    }
}

fn validate_generate(request: &GenerateRequest) -> Result<(), ShotlistError> {
    if !(MIN_PROMPT_COUNT..=MAX_PROMPT_COUNT).contains(&request.prompt_count) {
        return Err(ShotlistError::Validation(format!(
            "promptCount must be between {} and {}, got {}",
            MIN_PROMPT_COUNT, MAX_PROMPT_COUNT, request.prompt_count
        )));
    }
    if request.images.is_empty() && request.inputs.is_empty() {
        return Err(ShotlistError::Validation(
            "Provide at least one reference image or one of storyline, subject, environment or mood"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_revision(request: &RevisionRequest) -> Result<(), ShotlistError> {
    if request.prompt.trim().is_empty() {
        return Err(ShotlistError::Validation(
            "The prompt to revise is empty".to_string(),
        ));
    }
    if request.revision_note.trim().is_empty() {
        return Err(ShotlistError::Validation(
            "The revision note is empty".to_string(),
        ));
    }
    Ok(())
}

// Duplicate or unknown camera angles are accepted; they are only logged.
fn warn_on_labels(prompts: &[GeneratedPrompt]) {
    let mut seen = HashSet::new();
    for entry in prompts {
        let label = entry.label.trim();
        if CameraAngle::from_label(label).is_none() {
            warn!("Prompt labelled with unknown camera angle '{}'", label);
        }
        if !seen.insert(label.to_ascii_lowercase()) {
            warn!("Camera angle '{}' used more than once", label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::MockTransport;
    use serde_json::json;

    const VISION: &str = "vision-model";
    const TEXT: &str = "text-model";

    fn pipeline(mock: &Arc<MockTransport>) -> PromptPipeline {
        PromptPipeline::new(mock.clone(), VISION, TEXT)
    }

    fn batch(labels: &[&str]) -> String {
        let prompts: Vec<_> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| json!({ "label": label, "prompt": format!("Prompt number {}", i + 1) }))
            .collect();
        json!({ "prompts": prompts }).to_string()
    }

    fn cues_reply() -> String {
        json!({
            "description": "Cold haze, wet concrete, sodium light pooling on the ground.",
            "hexPalette": ["#0B1A2C", "#1F3B4D", "#C8A15A", "#E6E1D3", "#5E2B2B"],
            "keywords": ["sodium vapor glow", "wet asphalt sheen", "low-key lighting",
                         "anamorphic flare", "heavy atmospheric haze", "desaturated teal shadows"]
        })
        .to_string()
    }

    fn detective_request() -> GenerateRequest {
        GenerateRequest {
            images: Vec::new(),
            inputs: UserInputs {
                storyline: "a lone detective searches an abandoned warehouse at night".to_string(),
                ..Default::default()
            },
            prompt_count: 3,
        }
    }

    fn with_image(mut request: GenerateRequest) -> GenerateRequest {
        request
            .images
            .push(ImageAttachment::from_bytes("image/jpeg", b"\xff\xd8\xff"));
        request
    }

    fn revision_request() -> RevisionRequest {
        RevisionRequest {
            card_id: None,
            prompt: "A detective stands in a warehouse.".to_string(),
            label: "Medium Shot".to_string(),
            revision_note: "make it rain".to_string(),
            inputs: detective_request().inputs,
            visual_style_cues: None,
        }
    }

    #[tokio::test]
    async fn refuses_to_start_without_any_input() {
        let mock = Arc::new(MockTransport::replying(&[]));
        let request = GenerateRequest {
            images: Vec::new(),
            inputs: UserInputs {
                subject: "  ".to_string(),
                ..Default::default()
            },
            prompt_count: 4,
        };

        let err = pipeline(&mock).generate(&request, "key").await.unwrap_err();

        assert!(matches!(err, ShotlistError::Validation(_)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn rejects_out_of_range_prompt_count() {
        let mock = Arc::new(MockTransport::replying(&[]));
        let mut request = detective_request();
        request.prompt_count = 7;

        let err = pipeline(&mock).generate(&request, "key").await.unwrap_err();

        assert!(matches!(err, ShotlistError::Validation(msg) if msg.contains("promptCount")));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn text_only_request_skips_vision() {
        let reply = batch(&["Wide Establishing Shot", "Close-Up", "Low Angle"]);
        let mock = Arc::new(MockTransport::replying(&[reply.as_str()]));

        let result = pipeline(&mock)
            .generate(&detective_request(), "key")
            .await
            .unwrap();

        assert_eq!(mock.calls_to(VISION), 0);
        assert_eq!(mock.calls_to(TEXT), 1);
        assert_eq!(result.prompts.len(), 3);
        assert_eq!(result.prompts[1].label, "Close-Up");
        assert!(result.visual_style_cues.is_none());

        let call = &mock.calls()[0];
        assert!(call.json_mode);
        assert_eq!(call.credential, "key");
        assert_eq!(call.messages[0].text(), templates::system_instruction());
        assert!(call.user_text().contains("a lone detective searches an abandoned warehouse"));
        assert!(call.user_text().contains("No visual reference is available"));
    }

    #[tokio::test]
    async fn unreadable_vision_output_degrades_gracefully() {
        let reply = batch(&["Medium Shot", "High Angle", "Dutch Angle"]);
        let mock = Arc::new(MockTransport::replying(&[
            "Sorry, I can only describe one image at a time.",
            reply.as_str(),
        ]));

        let result = pipeline(&mock)
            .generate(&with_image(detective_request()), "key")
            .await
            .unwrap();

        assert!(result.visual_style_cues.is_none());
        assert!(!result.prompts.is_empty());
        assert_eq!(mock.calls_to(VISION), 1);
        assert_eq!(mock.calls_to(TEXT), 1);
    }

    #[tokio::test]
    async fn images_only_with_unreadable_vision_uses_fallback_scene() {
        let reply = batch(&["Medium Shot", "High Angle", "Dutch Angle"]);
        let mock = Arc::new(MockTransport::replying(&["sorry, cannot", reply.as_str()]));
        let request = GenerateRequest {
            images: vec![ImageAttachment::reference("https://example.com/ref.jpg")],
            inputs: UserInputs::default(),
            prompt_count: 3,
        };

        let result = pipeline(&mock).generate(&request, "key").await.unwrap();

        assert!(result.visual_style_cues.is_none());
        assert_eq!(result.prompts.len(), 3);
        let user = mock.calls()[1].user_text();
        assert!(user.contains("Invent one coherent cinematic scene"));
        assert!(!user.contains("Work from the user input alone"));
    }

    #[tokio::test]
    async fn reply_without_prompts_key_is_an_empty_result() {
        let mock = Arc::new(MockTransport::replying(&["{\"result\": \"nothing\"}"]));

        let err = pipeline(&mock)
            .generate(&detective_request(), "key")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShotlistError::EmptyResult {
                stage: Stage::Generation,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn revision_reply_without_prompt_key_is_an_empty_result() {
        let mock = Arc::new(MockTransport::replying(&["{\"result\": \"x\"}"]));

        let err = pipeline(&mock)
            .revise(&revision_request(), "key")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShotlistError::EmptyResult {
                stage: Stage::Revision,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn malformed_cues_degrade_gracefully() {
        let short_palette = json!({
            "description": "haze",
            "hexPalette": ["#000000"],
            "keywords": ["soft haze"]
        })
        .to_string();
        let reply = batch(&["Medium Shot", "High Angle", "Dutch Angle"]);
        let mock = Arc::new(MockTransport::replying(&[short_palette.as_str(), reply.as_str()]));

        let result = pipeline(&mock)
            .generate(&with_image(detective_request()), "key")
            .await
            .unwrap();

        assert!(result.visual_style_cues.is_none());
        assert_eq!(result.prompts.len(), 3);
    }

    #[tokio::test]
    async fn cues_feed_the_generation_call() {
        let cues = cues_reply();
        let fenced = format!("```json\n{}\n```", cues);
        let reply = batch(&["Close-Up", "Tracking Shot", "Bird's-Eye View", "Low Angle"]);
        let mock = Arc::new(MockTransport::replying(&[fenced.as_str(), reply.as_str()]));
        let mut request = with_image(detective_request());
        request
            .images
            .push(ImageAttachment::reference("https://example.com/ref.jpg"));
        request.prompt_count = 4;

        let result = pipeline(&mock).generate(&request, "key").await.unwrap();

        let cues = result.visual_style_cues.unwrap();
        assert_eq!(cues.hex_palette[2], "#C8A15A");
        assert_eq!(result.prompts.len(), 4);

        let calls = mock.calls();
        assert_eq!(calls[0].model, VISION);
        assert!(calls[0].json_mode);
        assert_eq!(calls[0].messages.len(), 1);
        assert_eq!(calls[0].messages[0].image_count(), 2);
        assert!(calls[0].user_text().contains("ONE moodboard"));

        assert_eq!(calls[1].model, TEXT);
        let user = calls[1].user_text();
        assert!(user.contains("Write exactly 4 prompts"));
        assert!(user.contains("wet asphalt sheen"));
        assert!(user.contains("#5E2B2B"));
    }

    #[tokio::test]
    async fn vision_transport_failure_is_fatal() {
        let mock = Arc::new(MockTransport::new(vec![Err(ShotlistError::Gateway {
            status: 503,
            body: "overloaded".to_string(),
        })]));

        let err = pipeline(&mock)
            .generate(&with_image(detective_request()), "key")
            .await
            .unwrap_err();

        assert!(matches!(err, ShotlistError::Gateway { status: 503, .. }));
        assert_eq!(mock.calls_to(TEXT), 0);
    }

    #[tokio::test]
    async fn generation_timeout_is_fatal() {
        let mock = Arc::new(MockTransport::new(vec![
            Ok(cues_reply()),
            Err(ShotlistError::Timeout(90)),
        ]));

        let err = pipeline(&mock)
            .generate(&with_image(detective_request()), "key")
            .await
            .unwrap_err();

        assert!(matches!(err, ShotlistError::Timeout(90)));
    }

    #[tokio::test]
    async fn unreadable_generation_output_is_fatal() {
        let mock = Arc::new(MockTransport::replying(&["Here are some ideas: rain, neon."]));

        let err = pipeline(&mock)
            .generate(&detective_request(), "key")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShotlistError::Parse {
                stage: Stage::Generation
            }
        ));
    }

    #[tokio::test]
    async fn empty_prompt_list_is_reported_distinctly() {
        let mock = Arc::new(MockTransport::replying(&["{\"prompts\": []}"]));

        let err = pipeline(&mock)
            .generate(&detective_request(), "key")
            .await
            .unwrap_err();

        assert!(matches!(err, ShotlistError::EmptyResult { .. }));
    }

    #[tokio::test]
    async fn duplicate_labels_are_accepted() {
        let reply = batch(&["Close-Up", "Close-Up", "Selfie Cam"]);
        let mock = Arc::new(MockTransport::replying(&[reply.as_str()]));

        let result = pipeline(&mock)
            .generate(&detective_request(), "key")
            .await
            .unwrap();

        assert_eq!(result.prompts.len(), 3);
        assert_eq!(result.prompts[0].label, result.prompts[1].label);
    }

    #[tokio::test]
    async fn revision_returns_the_replacement() {
        let replacement = "Rain lashes a detective standing in a derelict warehouse.";
        let reply = json!({ "prompt": replacement }).to_string();
        let mock = Arc::new(MockTransport::replying(&[reply.as_str()]));
        let request = revision_request();

        let revised = pipeline(&mock).revise(&request, "key").await.unwrap();

        assert_eq!(revised, replacement);
        assert_ne!(revised, request.prompt);
        assert_eq!(mock.call_count(), 1);

        let call = &mock.calls()[0];
        assert_eq!(call.model, TEXT);
        assert_eq!(call.messages[0].text(), templates::system_instruction());
        let user = call.user_text();
        assert!(user.contains("A detective stands in a warehouse."));
        assert!(user.contains("make it rain"));
    }

    #[tokio::test]
    async fn revision_requires_prompt_and_note() {
        let mock = Arc::new(MockTransport::replying(&[]));

        let mut request = revision_request();
        request.revision_note = " ".to_string();
        let err = pipeline(&mock).revise(&request, "key").await.unwrap_err();
        assert!(matches!(err, ShotlistError::Validation(_)));

        let mut request = revision_request();
        request.prompt = String::new();
        let err = pipeline(&mock).revise(&request, "key").await.unwrap_err();
        assert!(matches!(err, ShotlistError::Validation(_)));

        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_revision_is_fatal() {
        let mock = Arc::new(MockTransport::replying(&["{\"prompt\": \"   \"}"]));

        let err = pipeline(&mock)
            .revise(&revision_request(), "key")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShotlistError::EmptyResult {
                stage: Stage::Revision,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn revision_transport_failure_is_fatal() {
        let mock = Arc::new(MockTransport::new(vec![Err(ShotlistError::Network(
            "connection reset".to_string(),
        ))]));

        let err = pipeline(&mock)
            .revise(&revision_request(), "key")
            .await
            .unwrap_err();

        assert!(matches!(err, ShotlistError::Network(_)));
    }
}

// src/services/templates.rs
//! Instruction text sent to the vision and text models.
//!
//! Everything here is pure string assembly: no I/O, no state.
use crate::models::{CameraAngle, UserInputs, VisualStyleCues};

/// Moodboard analysis instruction for the vision model.
pub const VISION_INSTRUCTION: &str = r##"You are a cinematographer and colorist studying a moodboard.

Treat every attached image as part of ONE moodboard. Synthesize the visual language the images SHARE: color, light quality and direction, contrast, texture, atmosphere, lens character and composition habits.

Rules:
- Do NOT describe the images one by one.
- Do NOT identify people, faces, brands, landmarks or locations.
- Do NOT describe story, characters or subject matter. Describe style only.

Return ONLY a JSON object with exactly this shape:
{
  "description": "a synthesis of the shared visual style, 200-400 words",
  "hexPalette": ["#RRGGBB", "#RRGGBB", "#RRGGBB", "#RRGGBB", "#RRGGBB"],
  "keywords": ["6 to 10 cinematic phrases of 2-6 words each"]
}

"hexPalette" must contain exactly 5 colors in #RRGGBB form, ordered from most to least dominant.
"keywords" must contain only phrases that genuinely recur across multiple images."##;

const FORBIDDEN_WORDS: [&str; 10] = [
    "magical",
    "mystical",
    "ethereal",
    "enchanting",
    "fantastical",
    "otherworldly",
    "dreamlike",
    "breathtaking",
    "stunning",
    "epic",
];

const LENS_VOCABULARY: [&str; 6] = [
    "24mm wide-angle",
    "35mm prime",
    "50mm standard",
    "85mm portrait lens",
    "135mm telephoto compression",
    "anamorphic lens",
];

const LIGHT_VOCABULARY: [&str; 8] = [
    "hard rim light",
    "soft diffused key",
    "practical lamps",
    "motivated window light",
    "sodium vapor glow",
    "overcast flat light",
    "low-key chiaroscuro",
    "golden hour backlight",
];

/// System instruction shared by generation and revision so both speak in
/// the same voice.
pub fn system_instruction() -> String {
    let angles = CameraAngle::ALL
        .iter()
        .map(|a| format!("- {}", a.label()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a veteran cinematographer writing prompts for an image-generation model. Every prompt describes a single film still.

PROMPT STRUCTURE, in this order:
1. A short visual descriptor of the shot
2. The subject and what the subject is doing
3. The environment
4. The lighting
5. The camera: angle, lens and depth of field

RULES:
- Each prompt is 70-120 words of plain prose.
- The first words carry the most weight: open with the most important visual idea.
- Every prompt names a lens, a depth of field and the quality of the light.
- Never use these words: {forbidden}.
- Prefer concrete vocabulary. Lenses: {lenses}. Light: {light}.

CAMERA ANGLES. Assign each prompt exactly one of these labels and use each label at most once:
{angles}

VISUAL REFERENCE PRECEDENCE:
When visual-reference cues are provided they govern color, light and atmosphere only. The narrative subject and the environment come from the user input. Take subject and environment from the visual reference description only when the user input is entirely empty.

OUTPUT:
Return ONLY a JSON object of this shape:
{{"prompts": [{{"label": "<camera angle>", "prompt": "<prompt text>"}}]}}"#,
        forbidden = FORBIDDEN_WORDS.join(", "),
        lenses = LENS_VOCABULARY.join(", "),
        light = LIGHT_VOCABULARY.join(", "),
        angles = angles,
    )
}

fn push_user_fields(out: &mut String, inputs: &UserInputs) {
    for (name, value) in inputs.filled_fields() {
        out.push_str(&format!("{}: {}\n", name, value));
    }
}

fn push_cues(out: &mut String, cues: &VisualStyleCues) {
    out.push_str(&format!("Description: {}\n", cues.description.trim()));
    out.push_str(&format!("Palette: {}\n", cues.hex_palette.join(", ")));
    out.push_str(&format!("Keywords: {}\n", cues.keywords.join("; ")));
}

/// User message for a generation call.
pub fn generation_user_message(
    inputs: &UserInputs,
    count: u8,
    cues: Option<&VisualStyleCues>,
) -> String {
    let mut out = format!(
        "Write exactly {} prompts, each from a different camera angle.\n\n",
        count
    );

    if let Some(cues) = cues {
        out.push_str("VISUAL REFERENCE (primary source for color, light and atmosphere):\n");
        push_cues(&mut out, cues);
        out.push_str("Use these keyword phrases directly in the prompts.\n\n");
    }

    match (inputs.is_empty(), cues.is_some()) {
        (false, has_cues) => {
            out.push_str("USER INPUT:\n");
            push_user_fields(&mut out, inputs);
            if !has_cues {
                out.push_str(
                    "\nNo visual reference is available. Work from the user input alone.\n",
                );
            }
        }
        (true, true) => out.push_str(
            "No storyline, subject, environment or mood was given. \
             Derive the subject and environment from the visual reference description.\n",
        ),
        // Images were sent but their analysis could not be read.
        (true, false) => out.push_str(
            "No user input and no readable visual reference are available. \
             Invent one coherent cinematic scene with a clear subject, environment and mood, \
             and keep it consistent across every prompt.\n",
        ),
    }

    out
}

/// User message for a revision call. The original prompt and the requested
/// change come first, then the scene context that must stay fixed.
pub fn revision_user_message(
    prompt: &str,
    label: &str,
    revision_note: &str,
    inputs: &UserInputs,
    cues: Option<&VisualStyleCues>,
) -> String {
    let label = if label.trim().is_empty() {
        "unlabelled"
    } else {
        label.trim()
    };

    let mut out = format!("ORIGINAL PROMPT ({}):\n{}\n\n", label, prompt);
    out.push_str(&format!("REVISION REQUEST:\n{}\n\n", revision_note));

    let has_context = !inputs.is_empty() || cues.is_some();
    if has_context {
        out.push_str(
            "ORIGINAL SCENE CONTEXT (do NOT change this unless the revision request requires it):\n",
        );
        push_user_fields(&mut out, inputs);
        if let Some(cues) = cues {
            out.push_str("Visual reference:\n");
            push_cues(&mut out, cues);
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "Rewrite the prompt applying only the requested change. Keep the {} camera angle \
         unless the request changes it. Return ONLY a JSON object of this shape: \
         {{\"prompt\": \"<revised prompt text>\"}}\n",
        label
    ));

    out
}

//! Request option parsing shared by the portrait and prompt tasks.

use crate::error::CoreError;

/// LoRA style adapters installed on the backend.
pub const SUPPORTED_LORA_STYLES: &[&str] = &[
    "DarkestDungeonSDXL",
    "J_cartoon",
    "Duolinguo_flat_syle_XL",
    "Lego_XL_v2.1",
    "pixel-art-xl-v1.1",
];

const LORA_EXTENSION: &str = ".safetensors";

/// Framing appended to a free-text portrait description.
pub const PORTRAIT_PROMPT_SUFFIX: &str =
    ", close-up, portrait_(object), positive_face, looking_at_viewer, face_shot, front";

/// Validate a LoRA style name and return the weights file name to inject.
///
/// A trailing `.safetensors` is tolerated on input.
pub fn lora_file_name(style: &str) -> Result<String, CoreError> {
    let style = style.trim();
    let clean = style.strip_suffix(LORA_EXTENSION).unwrap_or(style);
    if SUPPORTED_LORA_STYLES.contains(&clean) {
        Ok(format!("{clean}{LORA_EXTENSION}"))
    } else {
        Err(CoreError::UnsupportedOption {
            option: "LoRA style",
            value: style.to_string(),
            allowed: SUPPORTED_LORA_STYLES.iter().map(|s| s.to_string()).collect(),
        })
    }
}

pub fn portrait_prompt(description: &str) -> String {
    format!("{description}{PORTRAIT_PROMPT_SUFFIX}")
}

/// Whether a toggle value switches the feature off (`off`, `false`, `0`).
pub fn is_switched_off(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "off" | "false" | "0"
    )
}

/// Parse a boolean-ish form value (`true`, `1`, `on`, `yes`).
pub fn is_switched_on(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

//! Catalogue of the generation tasks exposed over HTTP.
//!
//! Each [`TaskKind`] fixes its workflow template file, the typed injection
//! points inside that template, the artifact kind it produces and its
//! default polling budget.

use std::fmt;

use crate::artifact::ArtifactKind;
use crate::template::{Binding, InjectionPoint, TemplateField};

/// Every task type the façade knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    StyleTransfer,
    StyleTransferLcm,
    IpadapterScribble,
    TextToPortrait,
    TextToScene,
    CharacterPortrait,
    CharacterPortraitAblation,
    TextGen,
    PlotGen,
    Tts,
}

/// How a staged upload is referenced from inside a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadReference {
    /// Absolute path on the backend host (`file` inputs of custom loaders).
    AbsolutePath,
    /// Bare file name relative to the backend's input directory (`LoadImage`).
    FileName,
}

const fn bind(field: TemplateField, node: &'static str, input: &'static str) -> Binding {
    Binding {
        field,
        point: InjectionPoint { node, input },
    }
}

const STYLE_TRANSFER: &[Binding] = &[
    bind(TemplateField::PositivePrompt, "15", "text"),
    bind(TemplateField::NegativePrompt, "16", "text"),
    bind(TemplateField::StyleImage, "1", "file"),
    bind(TemplateField::ContentImage, "2", "file"),
];

const STYLE_TRANSFER_LCM: &[Binding] = &[
    bind(TemplateField::ContentImage, "1", "file"),
    bind(TemplateField::StyleImage, "15", "file"),
];

const IPADAPTER_SCRIBBLE: &[Binding] = &[
    bind(TemplateField::ContentImage, "26", "image"),
    bind(TemplateField::StyleImage, "25", "image"),
];

const TEXT_TO_PORTRAIT: &[Binding] = &[bind(TemplateField::PositivePrompt, "13", "text")];

const TEXT_TO_SCENE: &[Binding] = &[bind(TemplateField::PositivePrompt, "20", "text")];

const CHARACTER_PORTRAIT: &[Binding] = &[
    bind(TemplateField::CharacterDescription, "15", "value"),
    bind(TemplateField::PortraitImage, "12", "image"),
    bind(TemplateField::LoraName, "14", "lora_name"),
    bind(TemplateField::Seed, "9", "seed"),
];

const CHARACTER_PORTRAIT_ABLATION: &[Binding] = &[
    bind(TemplateField::CharacterDescription, "15", "value"),
    bind(TemplateField::PortraitImage, "12", "image"),
    bind(TemplateField::LoraName, "14", "lora_name"),
    bind(TemplateField::Seed, "9", "seed"),
    bind(TemplateField::Sampler, "9", "sampler_name"),
    bind(TemplateField::Scheduler, "9", "scheduler"),
    bind(TemplateField::Unet, "10", "unet_name"),
    bind(TemplateField::GuidanceModel, "28", "model"),
];

const TEXT_GEN: &[Binding] = &[
    bind(TemplateField::UserPrompt, "1", "value"),
    bind(TemplateField::SystemPrompt, "3", "value"),
];

const PLOT_GEN: &[Binding] = &[bind(TemplateField::UserPrompt, "1", "value")];

const TTS: &[Binding] = &[bind(TemplateField::SpeechText, "2", "text")];

impl TaskKind {
    pub const ALL: [TaskKind; 10] = [
        TaskKind::StyleTransfer,
        TaskKind::StyleTransferLcm,
        TaskKind::IpadapterScribble,
        TaskKind::TextToPortrait,
        TaskKind::TextToScene,
        TaskKind::CharacterPortrait,
        TaskKind::CharacterPortraitAblation,
        TaskKind::TextGen,
        TaskKind::PlotGen,
        TaskKind::Tts,
    ];

    /// Route segment and log label, e.g. `text_gen`.
    pub fn slug(self) -> &'static str {
        match self {
            TaskKind::StyleTransfer => "style_transfer",
            TaskKind::StyleTransferLcm => "style_transfer_w_cn_ipa_lcm",
            TaskKind::IpadapterScribble => "ipadapter_scribble",
            TaskKind::TextToPortrait => "text_to_portrait",
            TaskKind::TextToScene => "text_to_scene",
            TaskKind::CharacterPortrait => "character_portrait_gen",
            TaskKind::CharacterPortraitAblation => "character_portrait_ablation",
            TaskKind::TextGen => "text_gen",
            TaskKind::PlotGen => "plot_gen",
            TaskKind::Tts => "chattts_basic",
        }
    }

    /// Template file name inside the workflow directory.
    ///
    /// The ablation route reuses the portrait graph and rewires it.
    pub fn template_file(self) -> &'static str {
        match self {
            TaskKind::StyleTransfer => "style_transfer.json",
            TaskKind::StyleTransferLcm => "style_transfer_w_cn_ipa_lcm.json",
            TaskKind::IpadapterScribble => "ipadapter_scribble.json",
            TaskKind::TextToPortrait => "text_to_portrait.json",
            TaskKind::TextToScene => "text_to_scene.json",
            TaskKind::CharacterPortrait | TaskKind::CharacterPortraitAblation => {
                "character_portrait_gen.json"
            }
            TaskKind::TextGen => "ollama_qwen_14b_instruct.json",
            TaskKind::PlotGen => "plot_gen.json",
            TaskKind::Tts => "chattts_basic.json",
        }
    }

    pub fn artifact_kind(self) -> ArtifactKind {
        match self {
            TaskKind::TextGen | TaskKind::PlotGen => ArtifactKind::Text,
            TaskKind::Tts => ArtifactKind::Audio,
            _ => ArtifactKind::Image,
        }
    }

    /// Default number of one-second polls before giving up.
    pub fn default_max_attempts(self) -> u32 {
        match self {
            TaskKind::CharacterPortrait | TaskKind::Tts => 120,
            TaskKind::CharacterPortraitAblation => 100,
            TaskKind::StyleTransfer | TaskKind::StyleTransferLcm | TaskKind::TextGen => 60,
            TaskKind::IpadapterScribble
            | TaskKind::TextToPortrait
            | TaskKind::TextToScene
            | TaskKind::PlotGen => 30,
        }
    }

    /// Environment variable overriding [`default_max_attempts`](Self::default_max_attempts).
    pub fn max_attempts_env_var(self) -> String {
        format!("POLL_MAX_ATTEMPTS_{}", self.slug().to_uppercase())
    }

    pub fn upload_reference(self) -> UploadReference {
        match self {
            TaskKind::StyleTransfer | TaskKind::StyleTransferLcm => UploadReference::AbsolutePath,
            _ => UploadReference::FileName,
        }
    }

    /// Injection points this task writes into its template.
    pub fn bindings(self) -> &'static [Binding] {
        match self {
            TaskKind::StyleTransfer => STYLE_TRANSFER,
            TaskKind::StyleTransferLcm => STYLE_TRANSFER_LCM,
            TaskKind::IpadapterScribble => IPADAPTER_SCRIBBLE,
            TaskKind::TextToPortrait => TEXT_TO_PORTRAIT,
            TaskKind::TextToScene => TEXT_TO_SCENE,
            TaskKind::CharacterPortrait => CHARACTER_PORTRAIT,
            TaskKind::CharacterPortraitAblation => CHARACTER_PORTRAIT_ABLATION,
            TaskKind::TextGen => TEXT_GEN,
            TaskKind::PlotGen => PLOT_GEN,
            TaskKind::Tts => TTS,
        }
    }

    pub fn binding(self, field: TemplateField) -> Option<InjectionPoint> {
        self.bindings()
            .iter()
            .find(|b| b.field == field)
            .map(|b| b.point)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

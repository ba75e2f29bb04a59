//! Image-producing tasks: style transfer, scribbles and portraits.

use axum::extract::State;
use axum::response::Response;
use serde_json::json;
use studio_core::options::{is_switched_off, lora_file_name, portrait_prompt};
use studio_core::seed::random_seed;
use studio_core::task::TaskKind;
use studio_core::template::TemplateField;

use super::{generate, stage_for};
use crate::error::AppResult;
use crate::form::TaskForm;
use crate::state::AppState;

/// Node whose output feeds the model straight past the CFG-Zero* guidance node.
const GUIDANCE_BYPASS_NODE: &str = "8";

/// POST /api/style_transfer
///
/// Files `content` and `style`; optional `positivePrompt` and
/// `negativePrompt` override the template's prompts.
pub async fn style_transfer(State(state): State<AppState>, form: TaskForm) -> AppResult<Response> {
    let task = TaskKind::StyleTransfer;
    let content = form.require_file("content")?;
    let style = form.require_file("style")?;
    let template = state.templates.get(task)?;

    let content = stage_for(&state, task, content).await?;
    let style = stage_for(&state, task, style).await?;

    let mut job = template.instantiate();
    job.set(TemplateField::ContentImage, content)?
        .set(TemplateField::StyleImage, style)?
        .set_opt(TemplateField::PositivePrompt, form.text("positivePrompt"))?
        .set_opt(TemplateField::NegativePrompt, form.text("negativePrompt"))?;

    generate(&state, task, job.build()).await
}

/// POST /api/style_transfer_w_cn_ipa_lcm
pub async fn style_transfer_lcm(
    State(state): State<AppState>,
    form: TaskForm,
) -> AppResult<Response> {
    content_and_style(&state, TaskKind::StyleTransferLcm, &form).await
}

/// POST /api/ipadapter_scribble
pub async fn ipadapter_scribble(
    State(state): State<AppState>,
    form: TaskForm,
) -> AppResult<Response> {
    content_and_style(&state, TaskKind::IpadapterScribble, &form).await
}

/// Tasks driven only by a `content` and a `style` image.
async fn content_and_style(state: &AppState, task: TaskKind, form: &TaskForm) -> AppResult<Response> {
    let content = form.require_file("content")?;
    let style = form.require_file("style")?;
    let template = state.templates.get(task)?;

    let content = stage_for(state, task, content).await?;
    let style = stage_for(state, task, style).await?;

    let mut job = template.instantiate();
    job.set(TemplateField::ContentImage, content)?
        .set(TemplateField::StyleImage, style)?;

    generate(state, task, job.build()).await
}

/// POST /api/text_to_portrait
///
/// The description gets portrait framing appended before injection.
pub async fn text_to_portrait(State(state): State<AppState>, form: TaskForm) -> AppResult<Response> {
    let task = TaskKind::TextToPortrait;
    let text = form.require_text("text")?;
    let template = state.templates.get(task)?;

    let mut job = template.instantiate();
    job.set(TemplateField::PositivePrompt, portrait_prompt(text))?;

    generate(&state, task, job.build()).await
}

/// POST /api/text_to_scene
pub async fn text_to_scene(State(state): State<AppState>, form: TaskForm) -> AppResult<Response> {
    let task = TaskKind::TextToScene;
    let text = form.require_text("text")?;
    let template = state.templates.get(task)?;

    let mut job = template.instantiate();
    job.set(TemplateField::PositivePrompt, text)?;

    generate(&state, task, job.build()).await
}

/// POST /api/character_portrait_gen
///
/// `characterDescription` and a `portrait` file; `loraStyle` must be one of
/// the installed adapters. Every request gets a fresh seed.
pub async fn character_portrait(
    State(state): State<AppState>,
    form: TaskForm,
) -> AppResult<Response> {
    let task = TaskKind::CharacterPortrait;
    let description = form.require_text("characterDescription")?;
    let lora = form.text("loraStyle").map(lora_file_name).transpose()?;
    let portrait = form.require_file("portrait")?;
    let template = state.templates.get(task)?;

    let portrait = stage_for(&state, task, portrait).await?;

    let mut job = template.instantiate();
    job.set(TemplateField::CharacterDescription, description)?
        .set(TemplateField::PortraitImage, portrait)?
        .set_opt(TemplateField::LoraName, lora)?
        .set(TemplateField::Seed, random_seed())?;

    generate(&state, task, job.build()).await
}

/// POST /api/character_portrait_ablation
///
/// The portrait task with sampler, scheduler and UNet overrides.
/// `cfg_zero_star=off` routes the model around the guidance node.
pub async fn character_portrait_ablation(
    State(state): State<AppState>,
    form: TaskForm,
) -> AppResult<Response> {
    let task = TaskKind::CharacterPortraitAblation;
    let description = form.require_text("characterDescription")?;
    let lora = form.text("loraStyle").map(lora_file_name).transpose()?;
    let portrait = form.require_file("portrait")?;
    let bypass_guidance = form.text("cfg_zero_star").is_some_and(is_switched_off);
    let template = state.templates.get(task)?;

    let portrait = stage_for(&state, task, portrait).await?;

    let mut job = template.instantiate();
    job.set(TemplateField::CharacterDescription, description)?
        .set(TemplateField::PortraitImage, portrait)?
        .set_opt(TemplateField::LoraName, lora)?
        .set(TemplateField::Seed, random_seed())?
        .set_opt(TemplateField::Sampler, form.text("sampler"))?
        .set_opt(TemplateField::Scheduler, form.text("scheduler"))?
        .set_opt(TemplateField::Unet, form.text("unet"))?;
    if bypass_guidance {
        job.set(TemplateField::GuidanceModel, json!([GUIDANCE_BYPASS_NODE, 0]))?;
    }

    generate(&state, task, job.build()).await
}

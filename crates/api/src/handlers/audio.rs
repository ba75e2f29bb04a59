use axum::extract::State;
use axum::response::Response;
use studio_core::task::TaskKind;
use studio_core::template::TemplateField;

use super::generate;
use crate::error::AppResult;
use crate::form::TaskForm;
use crate::state::AppState;

/// POST /api/chattts_basic -- speak `text`.
pub async fn chattts_basic(State(state): State<AppState>, form: TaskForm) -> AppResult<Response> {
    let task = TaskKind::Tts;
    let text = form.require_text("text")?;
    let template = state.templates.get(task)?;

    let mut job = template.instantiate();
    job.set(TemplateField::SpeechText, text)?;

    generate(&state, task, job.build()).await
}

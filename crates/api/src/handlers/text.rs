//! Text-producing tasks.

use axum::extract::State;
use axum::response::Response;
use studio_core::artifact::ArtifactKind;
use studio_core::session::ChatSession;
use studio_core::task::TaskKind;
use studio_core::template::TemplateField;

use super::generate;
use crate::emitter;
use crate::error::AppResult;
use crate::form::TaskForm;
use crate::orchestrator;
use crate::state::AppState;

/// POST /api/text_gen
///
/// `userPrompt` and `systemPrompt`. With a `sessionId` the previous
/// exchanges of that session are prepended to the prompt and the reply is
/// remembered; `resetContext` clears the session first. Without one the
/// request is stateless.
pub async fn text_gen(State(state): State<AppState>, form: TaskForm) -> AppResult<Response> {
    let user_prompt = form.require_text("userPrompt")?;
    let system_prompt = form.require_text("systemPrompt")?;

    let Some(session_id) = form.text("sessionId") else {
        return chat(&state, user_prompt, system_prompt, None).await;
    };

    let session = state.sessions.session(session_id).await;
    let mut session = session.lock().await;
    if form.flag("resetContext") {
        tracing::debug!(session_id, "Resetting chat context");
        session.reset();
    }
    let response = chat(&state, user_prompt, system_prompt, Some(&mut *session)).await;
    response
}

/// One chat turn, optionally within `session`.
///
/// The session only records the exchange when a reply was produced.
async fn chat(
    state: &AppState,
    user_prompt: &str,
    system_prompt: &str,
    session: Option<&mut ChatSession>,
) -> AppResult<Response> {
    let task = TaskKind::TextGen;
    let template = state.templates.get(task)?;

    let prompt = match &session {
        Some(session) => session.compose_prompt(user_prompt),
        None => user_prompt.to_string(),
    };

    let mut job = template.instantiate();
    job.set(TemplateField::UserPrompt, prompt)?
        .set(TemplateField::SystemPrompt, system_prompt)?;

    let completed = orchestrator::execute(state, task, job.build()).await?;
    let response = emitter::emit(ArtifactKind::Text, &completed).await?;

    if let Some(session) = session {
        session.record(user_prompt, completed.artifacts.text().trim());
    }
    Ok(response)
}

/// POST /api/plot_gen
pub async fn plot_gen(State(state): State<AppState>, form: TaskForm) -> AppResult<Response> {
    let task = TaskKind::PlotGen;
    let prompt = form.require_text("prompt")?;
    let template = state.templates.get(task)?;

    let mut job = template.instantiate();
    job.set(TemplateField::UserPrompt, prompt)?;

    generate(&state, task, job.build()).await
}

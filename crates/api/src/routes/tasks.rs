//! Route definitions for the generation tasks.

use axum::routing::post;
use axum::Router;

use crate::handlers::{audio, image, text};
use crate::state::AppState;

/// Task routes mounted at `/api`. Paths match each task's slug.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/style_transfer", post(image::style_transfer))
        .route(
            "/style_transfer_w_cn_ipa_lcm",
            post(image::style_transfer_lcm),
        )
        .route("/ipadapter_scribble", post(image::ipadapter_scribble))
        .route("/text_to_portrait", post(image::text_to_portrait))
        .route("/text_to_scene", post(image::text_to_scene))
        .route("/character_portrait_gen", post(image::character_portrait))
        .route(
            "/character_portrait_ablation",
            post(image::character_portrait_ablation),
        )
        .route("/text_gen", post(text::text_gen))
        .route("/plot_gen", post(text::plot_gen))
        .route("/chattts_basic", post(audio::chattts_basic))
}

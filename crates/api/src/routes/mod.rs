pub mod health;
pub mod tasks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /style_transfer                  POST  image
/// /style_transfer_w_cn_ipa_lcm     POST  image
/// /ipadapter_scribble              POST  image
/// /text_to_portrait                POST  image
/// /text_to_scene                   POST  image
/// /character_portrait_gen          POST  image
/// /character_portrait_ablation     POST  image
/// /text_gen                        POST  text
/// /plot_gen                        POST  text
/// /chattts_basic                   POST  audio
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(tasks::router())
}

//! Decision callback endpoint.
//!
//! Slack posts interactive-message callbacks as a form-encoded `payload`
//! field. The handler parses it and hands the decision to the processor in a
//! spawned task; processing failures are logged there, never surfaced to
//! Slack. The response is always 200 so Slack leaves the original message
//! alone (the processor rewrites it itself).

use axum::Form;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::scheduler::{JobRegistry, PlanApi};
use crate::slack::ChatApi;
use crate::slack::types::InteractionCallback;

use super::AppState;

/// The form body of an interactive-message POST.
#[derive(Debug, Deserialize)]
pub struct CallbackForm {
    /// JSON-encoded [`InteractionCallback`].
    pub payload: String,
}

/// Callback handler.
///
/// # Request
///
/// - Method: POST
/// - Body: `application/x-www-form-urlencoded` with a `payload` field
///   containing the interaction callback JSON
///
/// # Response
///
/// Always 200 OK. Malformed payloads are logged and dropped; well-formed
/// ones are processed asynchronously.
pub async fn callback_handler<R, C, P>(
    State(app_state): State<AppState<R, C, P>>,
    Form(form): Form<CallbackForm>,
) -> StatusCode
where
    R: JobRegistry + Send + Sync + 'static,
    C: ChatApi + Send + Sync + 'static,
    P: PlanApi + Send + Sync + 'static,
{
    let callback: InteractionCallback = match serde_json::from_str(&form.payload) {
        Ok(callback) => callback,
        Err(error) => {
            warn!(%error, "could not parse decision callback payload");
            return StatusCode::OK;
        }
    };

    debug!(callback_id = %callback.callback_id, "received decision callback");

    // Spawned so the decision runs to completion even if Slack drops the
    // connection; in-flight decisions are never cancelled.
    let processor = app_state.processor();
    tokio::spawn(async move { processor.handle_decision(callback).await });

    StatusCode::OK
}

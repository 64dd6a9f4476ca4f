//! HTTP boundary for the approval workflow.
//!
//! This server exists for one inbound payload: the chat platform's decision
//! callback. Everything else about the transport (form decoding, routing,
//! liveness) is plumbing around handing that payload to the
//! [`DecisionProcessor`].
//!
//! # Endpoints
//!
//! - `POST /` - Accepts interactive-message callbacks (always 200)
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

pub mod callback;
pub mod health;

pub use callback::callback_handler;
pub use health::health_handler;

use crate::decision::DecisionProcessor;
use crate::scheduler::{JobRegistry, PlanApi};
use crate::slack::ChatApi;

/// Shared application state, passed to handlers via Axum's `State` extractor.
pub struct AppState<R, C, P> {
    processor: Arc<DecisionProcessor<R, C, P>>,
}

// Manual impl: deriving Clone would put bounds on R, C and P, but only the
// Arc is cloned.
impl<R, C, P> Clone for AppState<R, C, P> {
    fn clone(&self) -> Self {
        AppState {
            processor: self.processor.clone(),
        }
    }
}

impl<R, C, P> AppState<R, C, P> {
    pub fn new(processor: Arc<DecisionProcessor<R, C, P>>) -> Self {
        AppState { processor }
    }

    /// A handle on the decision processor for spawned work.
    pub fn processor(&self) -> Arc<DecisionProcessor<R, C, P>> {
        self.processor.clone()
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<R, C, P>(app_state: AppState<R, C, P>) -> axum::Router
where
    R: JobRegistry + Send + Sync + 'static,
    C: ChatApi + Send + Sync + 'static,
    P: PlanApi + Send + Sync + 'static,
{
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/", post(callback_handler::<R, C, P>))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

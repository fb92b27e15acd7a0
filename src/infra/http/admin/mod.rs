mod certificates;
mod events;
mod health;
mod state;

pub use state::AdminState;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::middleware::{log_responses, set_request_context};

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/_health/db", get(health::admin_health))
        .route(
            "/api/events",
            get(events::list_events).post(events::create_event),
        )
        .route(
            "/api/events/{id}",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/api/events/{id}/share", post(events::share_event))
        .route(
            "/api/events/{id}/participants",
            get(events::list_participants),
        )
        .route(
            "/api/events/{id}/send-certificates",
            post(certificates::send_event_certificates),
        )
        .route(
            "/api/events/{id}/send-certificates-selected",
            post(certificates::send_selected_certificates),
        )
        .route(
            "/api/certificates/preview/{participant_id}",
            get(certificates::preview_certificate),
        )
        .route(
            "/api/certificates/send/{participant_id}",
            post(certificates::send_participant_certificate),
        )
        .route(
            "/api/certificates/send-bulk",
            post(certificates::send_bulk_certificates),
        )
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

use std::future::ready;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use odoo_rpc::Connector;

use crate::connection::ConnectionStore;
use crate::handlers;
use crate::prometheus::{setup_metrics_recorder, track_metrics};

#[derive(Clone)]
pub struct State {
    pub store: Arc<ConnectionStore>,
    pub connector: Arc<dyn Connector>,
}

async fn index() -> &'static str {
    "gateway-api"
}

pub fn router<C: Connector + 'static>(connector: C, metrics: bool) -> Router {
    let state = State {
        store: Arc::new(ConnectionStore::new()),
        connector: Arc::new(connector),
    };

    let router = Router::new()
        .route("/", get(index))
        .route("/store-data", post(handlers::store_data))
        .route("/get-data", get(handlers::get_data))
        .route("/test-database-api", get(handlers::test_database_api))
        .route("/login-api", post(handlers::login_api))
        .route("/authenticate-api", get(handlers::authenticate_api))
        .route("/fetch-tasks", get(handlers::fetch_tasks))
        .route("/fetch-apps", get(handlers::fetch_apps))
        .route("/update-stage", post(handlers::update_stage))
        .route("/isadmin", get(handlers::isadmin))
        .route("/fetch-new-task", get(handlers::fetch_new_task))
        .route("/add-task", post(handlers::add_task))
        .route("/fetch-contacts", get(handlers::fetch_contacts))
        .route("/fetch-timesheet", get(handlers::fetch_timesheet))
        .route("/add-timesheet-line", post(handlers::add_timesheet_line))
        .layer(TraceLayer::new_for_http())
        // The client application is served from another origin.
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // Don't install metrics unless asked to. Installing a global recorder
    // when the router is built repeatedly (during tests etc) does not work
    // well.
    if metrics {
        let recorder_handle = setup_metrics_recorder();

        router.route("/metrics", get(move || ready(recorder_handle.render())))
    } else {
        router
    }
}

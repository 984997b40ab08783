//! HTTP control plane: the strategy's only way into the reserve.

pub mod auth;
pub mod envelope;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use common::auth::HmacSigner;

use crate::core::ReserveCore;
use crate::data::ReserveData;
use crate::metric::MetricStorage;

pub struct AppState {
    pub data: ReserveData,
    pub core: ReserveCore,
    pub metric: Arc<dyn MetricStorage>,
    /// `None` disables authentication (`--no-auth` development mode).
    pub signer: Option<HmacSigner>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/prices", get(handlers::all_prices))
        .route("/prices/{base}/{quote}", get(handlers::one_price))
        .route("/getrates", get(handlers::get_rates))
        .route("/authdata", get(handlers::auth_data))
        .route("/activities", get(handlers::activities))
        .route(
            "/immediate-pending-activities",
            get(handlers::pending_activities),
        )
        .route(
            "/metrics",
            get(handlers::get_metrics).post(handlers::store_metrics),
        )
        .route("/cancelorder/{exchangeid}", post(handlers::cancel_order))
        .route("/deposit/{exchangeid}", post(handlers::deposit))
        .route("/withdraw/{exchangeid}", post(handlers::withdraw))
        .route("/trade/{exchangeid}", post(handlers::trade))
        .route("/setrates", post(handlers::set_rates))
        .route("/exchangeinfo/{exchangeid}", get(handlers::exchange_info))
        .route(
            "/exchangeinfo/{exchangeid}/{base}/{quote}",
            get(handlers::pair_info),
        )
        .route("/exchangefees", get(handlers::all_fees))
        .route("/exchangefees/{exchangeid}", get(handlers::exchange_fees))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

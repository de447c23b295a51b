use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, rate_limit_middleware};
use crate::state::AppState;

// Room for multipart boundaries and part headers around the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Builds the full router with its middleware stack
pub fn app(state: AppState) -> Router {
    let api = &state.config.api;

    let mut router = Router::new()
        .route("/", get(public::root_get))
        .route("/health", get(public::health_get))
        .route("/test", get(public::test_get))
        .nest("/api/user", user_routes())
        .nest("/api/portfolio", portfolio_routes(&state))
        .nest("/api/transactions", transaction_routes(&state))
        .layer(DefaultBodyLimit::max(api.max_request_size_bytes));

    if api.enable_rate_limiting {
        router = router.layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));
    }

    with_security_headers(router)
        .layer(cors_layer(&state.config.server))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(public::signup_post))
        .route("/login", post(public::login_post))
}

fn portfolio_routes(state: &AppState) -> Router<AppState> {
    use protected::portfolio;

    Router::new()
        .route("/stocks", get(portfolio::stocks_get))
        .route("/mutual-funds", get(portfolio::mutual_funds_get))
        .route("/summary", get(portfolio::summary_get))
        .route("/overview", get(portfolio::overview_get))
        .route("/prices/:symbol/refresh", post(portfolio::price_refresh_post))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn transaction_routes(state: &AppState) -> Router<AppState> {
    use protected::transactions;

    let upload_limit = state.config.api.max_upload_size_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", post(transactions::create_post))
        .route("/user", get(transactions::user_get))
        .route("/security/:securityId", get(transactions::security_get))
        .route(
            "/upload-csv",
            post(transactions::upload_csv_post).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/motilal-oswal", post(transactions::motilal_oswal_post))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

fn with_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
}

pub mod api;
pub mod config;
pub mod services;
pub mod utils;

use crate::config::ConverterConfig;
use crate::services::converter::ItemConverter;
use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::convert::pack_file,
        api::handlers::convert::unpack_file,
        api::handlers::convert::unpack_json,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::convert::UnpackResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "convert", description = "XNB pack/unpack endpoints"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<dyn ItemConverter>,
    pub config: ConverterConfig,
}

pub fn create_app(state: AppState) -> Router {
    let allowed_origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/packfile", post(api::handlers::convert::pack_file))
        .route("/unpackfile", post(api::handlers::convert::unpack_file))
        .route("/unpack", post(api::handlers::convert::unpack_json))
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_upload_size + 16 * 1024, // multipart framing overhead
        ))
        .layer(from_fn(api::middleware::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/me", get(handlers::get_me))
        .route("/me", put(handlers::update_me));

    let book_routes = Router::new()
        .route("/", post(handlers::create_book))
        .route("/", get(handlers::my_books))
        .route("/{id}", put(handlers::update_book))
        .route("/{id}", delete(handlers::delete_book));

    // Mounted on several legacy paths so older frontends keep working.
    let public_routes = Router::new()
        .route("/", get(handlers::public_books))
        .route("/all", get(handlers::public_books));

    let internal_routes = Router::new()
        .route("/theme-sync", post(handlers::theme_sync))
        .route("/theme", get(handlers::theme_get))
        .route("/theme/ws", get(handlers::theme_ws));

    Router::new()
        .route("/", get(handlers::root))
        .nest("/api/owner/auth", auth_routes)
        .nest("/api/owner/books", book_routes)
        .nest("/api/books", public_routes.clone())
        .nest("/api/ebooks", public_routes.clone())
        .nest("/api/public/books", public_routes)
        .nest("/api/internal", internal_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state))
        .with_state(state)
}

/// Credentialed CORS restricted to the configured origins. A wildcard is not
/// usable here because the session cookie requires credentials.
fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-internal-secret"),
        ])
}

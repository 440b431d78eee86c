pub mod config;
pub mod extract;
pub mod rate_limit;
pub mod routes;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use kindred_core::clock::Clock;
use kindred_core::conversation::ConversationService;
use kindred_core::hub::{PresenceMirror, PresenceService, PushHub};
use kindred_core::identity::{IdentityService, IdentitySettings, PasswordHasher, PhotoStore};
use kindred_core::matching::MatchingService;
use kindred_core::moderation::ModerationService;
use kindred_core::store::Store;
use kindred_shared::clients::redis::RedisClient;
use kindred_shared::middleware::{http_trace_layer, metrics_middleware, AuthState};
use kindred_shared::tokens::TokenIssuer;

use config::AppConfig;

/// Multipart framing allowance on top of the photo byte limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub struct AppState {
    pub config: AppConfig,
    pub tokens: Arc<TokenIssuer>,
    pub store: Arc<dyn Store>,
    pub identity: IdentityService,
    pub matching: MatchingService,
    pub conversations: ConversationService,
    pub moderation: ModerationService,
    pub presence: PresenceService,
    pub redis: Option<RedisClient>,
    pub metrics_handle: PrometheusHandle,
}

impl AuthState for AppState {
    fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }
}

/// Backends the services are wired to.
pub struct Collaborators {
    pub store: Arc<dyn Store>,
    pub photos: Arc<dyn PhotoStore>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
    pub redis: Option<RedisClient>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(config: AppConfig, deps: Collaborators) -> Arc<Self> {
        let tokens = Arc::new(TokenIssuer::new(
            &config.jwt_secret,
            config.jwt_access_ttl_secs,
            config.jwt_refresh_ttl_secs,
        ));
        let hub = Arc::new(PushHub::new(
            config.hub_queue_capacity,
            Duration::from_secs(config.typing_ttl_secs),
        ));
        let mirror = deps
            .redis
            .clone()
            .map(|redis| Arc::new(redis) as Arc<dyn PresenceMirror>);

        let identity = IdentityService::new(
            deps.store.clone(),
            deps.hasher,
            deps.photos,
            tokens.clone(),
            deps.clock.clone(),
            IdentitySettings {
                max_photos: config.max_photos,
                max_photo_bytes: config.max_photo_bytes,
                admin_emails: config.admin_emails(),
            },
        );
        let matching = MatchingService::new(deps.store.clone(), hub.clone(), deps.clock.clone());
        let conversations = ConversationService::new(deps.store.clone(), hub.clone(), deps.clock.clone());
        let moderation = ModerationService::new(
            deps.store.clone(),
            hub.clone(),
            deps.clock,
            config.default_temp_ban_days,
        );
        let presence = PresenceService::new(deps.store.clone(), hub, mirror);

        Arc::new(Self {
            config,
            tokens,
            store: deps.store,
            identity,
            matching,
            conversations,
            moderation,
            presence,
            redis: deps.redis,
            metrics_handle: deps.metrics_handle,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    use routes::{admin, auth, chats, health, matches, profile, safety};

    let photo_limit = state.config.max_photo_bytes + MULTIPART_OVERHEAD;

    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/matches", get(matches::list_matches))
        .route("/matches/discover", get(matches::discover))
        .route("/matches/like", post(matches::like))
        .route("/matches/pass", post(matches::pass))
        .route("/matches/:id", delete(matches::unmatch))
        .route("/interests", get(profile::list_interests))
        .route("/chats", get(chats::list_chats))
        .route("/chats/:match_id/messages", get(chats::get_messages).post(chats::send_message))
        .route("/chats/:match_id/read", put(chats::mark_read))
        .route("/reports", post(safety::create_report).get(safety::my_reports))
        .route("/blocks", post(safety::create_block).get(safety::list_blocks))
        .route("/blocks/:id", delete(safety::remove_block));

    let users = Router::new()
        .route("/profile", get(profile::get_profile).put(profile::update_profile))
        .route(
            "/photos",
            post(profile::upload_photo).layer(DefaultBodyLimit::max(photo_limit)),
        )
        .route("/photos/:id", delete(profile::delete_photo))
        .route("/photos/:id/primary", put(profile::set_primary_photo));

    let admin = Router::new()
        .route("/reports", get(admin::list_reports))
        .route("/reports/:id", get(admin::get_report).put(admin::review_report))
        .route("/users/:id/reports", get(admin::user_reports));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/ws", get(ws::upgrade))
        .nest("/api", api)
        .nest("/users", users)
        .nest("/admin", admin)
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit))
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(http_trace_layer())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]));
    if origins.is_empty() {
        layer.allow_origin(AllowOrigin::any())
    } else {
        layer.allow_origin(origins).allow_credentials(true)
    }
}

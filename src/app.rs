/// 애플리케이션 상태와 라우터
// region:    --- Imports
use crate::auction::events::RealtimeEvent;
use crate::bidding::commands::{AuctionEngine, EngineSettings};
use crate::broadcast::{ws, Broadcaster, EventSink, RoomHub};
use crate::catalog::PlayerCatalog;
use crate::handlers;
use crate::identity::presence::PresenceRegistry;
use crate::identity::UserDirectory;
use crate::registry::AuctionRegistry;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

// endregion: --- Imports

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AuctionEngine>,
    pub registry: Arc<dyn AuctionRegistry>,
    pub directory: Arc<dyn UserDirectory>,
    pub catalog: Arc<dyn PlayerCatalog>,
    pub presence: Arc<PresenceRegistry>,
    pub hub: Arc<RoomHub>,
}

impl AppState {
    /// 저장소와 이벤트 싱크로 엔진과 접속 레지스트리를 구성한다.
    pub fn new(
        registry: Arc<dyn AuctionRegistry>,
        directory: Arc<dyn UserDirectory>,
        catalog: Arc<dyn PlayerCatalog>,
        hub: Arc<RoomHub>,
        sink: Arc<dyn EventSink>,
        settings: EngineSettings,
    ) -> Self {
        let broadcaster = Broadcaster::new(sink);
        let engine = Arc::new(AuctionEngine::new(
            Arc::clone(&registry),
            Arc::clone(&directory),
            Arc::clone(&catalog),
            broadcaster.clone(),
            settings,
        ));
        let presence = Arc::new(PresenceRegistry::new(
            Arc::clone(&directory),
            Arc::clone(&hub),
            broadcaster,
        ));
        Self {
            engine,
            registry,
            directory,
            catalog,
            presence,
            hub,
        }
    }
}

/// 현재 서버 상태
pub async fn server_status(state: &AppState) -> RealtimeEvent {
    RealtimeEvent::ServerStatus {
        server: true,
        database: state.registry.ping().await,
        connected_clients: state.hub.connected_count(),
    }
}

pub fn router(state: AppState) -> Router {
    // 프론트엔드 개발 서버를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/auth/users", get(handlers::handle_list_users))
        .route("/auth/login", post(handlers::handle_login))
        .route("/auth/logout", post(handlers::handle_logout))
        .route("/users/:id", get(handlers::handle_get_user))
        .route("/players/:id", get(handlers::handle_get_player))
        .route(
            "/pool",
            get(handlers::handle_get_pool).post(handlers::handle_add_to_pool),
        )
        .route("/pool/:player_id", delete(handlers::handle_remove_from_pool))
        .route(
            "/auctions",
            get(handlers::handle_list_auctions).post(handlers::handle_create_auction),
        )
        .route(
            "/auctions/:id",
            get(handlers::handle_get_auction).delete(handlers::handle_delete_auction),
        )
        .route("/auctions/:id/join", post(handlers::handle_join))
        .route("/auctions/:id/start", post(handlers::handle_start))
        .route("/auctions/:id/pause", post(handlers::handle_pause))
        .route("/auctions/:id/end", post(handlers::handle_end))
        .route("/auctions/:id/nominate", post(handlers::handle_nominate))
        .route("/auctions/:id/bid", post(handlers::handle_bid))
        .route(
            "/auctions/:id/close-player",
            post(handlers::handle_close_player),
        )
        .route("/status", get(handlers::handle_status))
        .route("/ws", get(ws::handle_ws))
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

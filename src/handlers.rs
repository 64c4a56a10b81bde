// region:    --- Imports
use crate::app::{server_status, AppState};
use crate::auction::events::RealtimeEvent;
use crate::auction::model::{Auction, AuctionId, PlayerId};
use crate::bidding::commands::{CreateAuctionCommand, NominatePlayerCommand, PlaceBidCommand};
use crate::bidding::model::AcceptedBid;
use crate::catalog::{Player, MIN_CURATED_POOL};
use crate::error::{AuctionError, Result};
use crate::identity::{User, UserProfile};
use axum::async_trait;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

// endregion: --- Imports

/// 요청자 식별 헤더
pub const USER_HEADER: &str = "x-user-id";

// region:    --- Requester
/// 로그인한 요청자. `x-user-id` 헤더로 식별한다.
pub struct Requester(pub User);

#[async_trait]
impl FromRequestParts<AppState> for Requester {
    type Rejection = AuctionError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AuctionError::Unauthenticated(format!("missing {} header", USER_HEADER))
            })?;
        let user = state
            .directory
            .find_user(user_id)
            .await?
            .ok_or_else(|| AuctionError::Unauthenticated(format!("unknown user {}", user_id)))?;
        if !user.is_logged_in {
            return Err(AuctionError::Unauthenticated(
                "login required".to_string(),
            ));
        }
        Ok(Requester(user))
    }
}

// endregion: --- Requester

// region:    --- Auth Handlers
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub pin: String,
}

/// 사용자 목록 (PIN 제외)
pub async fn handle_list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    info!("{:<12} --> 사용자 목록 조회", "Query");
    Ok(Json(state.directory.list_users().await?))
}

/// PIN 로그인
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<User>> {
    info!("{:<12} --> 로그인 요청 user: {}", "Handler", req.user_id);
    Ok(Json(state.presence.login(&req.user_id, &req.pin).await?))
}

/// 로그아웃 (요청자 본인)
pub async fn handle_logout(
    State(state): State<AppState>,
    Requester(user): Requester,
) -> Result<Json<Value>> {
    info!("{:<12} --> 로그아웃 요청 user: {}", "Handler", user.id);
    state.presence.logout(&user.id).await?;
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// 사용자 프로필 (스쿼드, 통계)
pub async fn handle_get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>> {
    info!("{:<12} --> 사용자 조회 id: {}", "Query", id);
    state
        .directory
        .profile(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AuctionError::NotFound(format!("user {}", id)))
}

// endregion: --- Auth Handlers

// region:    --- Catalog Handlers
#[derive(Debug, Deserialize)]
pub struct PoolRequest {
    pub player_id: PlayerId,
}

/// 선수 조회
pub async fn handle_get_player(
    State(state): State<AppState>,
    Path(id): Path<PlayerId>,
) -> Result<Json<Player>> {
    info!("{:<12} --> 선수 조회 id: {}", "Query", id);
    state
        .catalog
        .find_player(id)
        .await?
        .map(Json)
        .ok_or_else(|| AuctionError::NotFound(format!("player {}", id)))
}

/// 내 큐레이션 목록
pub async fn handle_get_pool(
    State(state): State<AppState>,
    Requester(user): Requester,
) -> Result<Json<Value>> {
    info!("{:<12} --> 큐레이션 목록 조회 user: {}", "Query", user.id);
    let players = state.catalog.curated_pool(&user.id).await?;
    Ok(Json(json!({
        "players": players,
        "count": players.len(),
        "required": MIN_CURATED_POOL,
    })))
}

/// 큐레이션 추가
pub async fn handle_add_to_pool(
    State(state): State<AppState>,
    Requester(user): Requester,
    Json(req): Json<PoolRequest>,
) -> Result<impl IntoResponse> {
    info!(
        "{:<12} --> 큐레이션 추가 user: {}, player: {}",
        "Handler", user.id, req.player_id
    );
    state.catalog.add_to_pool(&user.id, req.player_id).await?;
    let count = state.catalog.count_curated_pool(&user.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "player_id": req.player_id, "count": count })),
    ))
}

/// 큐레이션 제거
pub async fn handle_remove_from_pool(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(player_id): Path<PlayerId>,
) -> Result<Json<Value>> {
    info!(
        "{:<12} --> 큐레이션 제거 user: {}, player: {}",
        "Handler", user.id, player_id
    );
    state.catalog.remove_from_pool(&user.id, player_id).await?;
    let count = state.catalog.count_curated_pool(&user.id).await?;
    Ok(Json(json!({ "player_id": player_id, "count": count })))
}

// endregion: --- Catalog Handlers

// region:    --- Auction Handlers
/// 경매 목록
pub async fn handle_list_auctions(State(state): State<AppState>) -> Result<Json<Vec<Auction>>> {
    info!("{:<12} --> 경매 목록 조회", "Query");
    Ok(Json(state.engine.list_auctions().await?))
}

/// 경매 조회
pub async fn handle_get_auction(
    State(state): State<AppState>,
    Path(id): Path<AuctionId>,
) -> Result<Json<Auction>> {
    info!("{:<12} --> 경매 조회 id: {}", "Query", id);
    Ok(Json(state.engine.get_auction(id).await?))
}

/// 경매 생성
pub async fn handle_create_auction(
    State(state): State<AppState>,
    Requester(user): Requester,
    Json(cmd): Json<CreateAuctionCommand>,
) -> Result<impl IntoResponse> {
    let auction = state.engine.create_auction(&user.id, cmd).await?;
    Ok((StatusCode::CREATED, Json(auction)))
}

/// 경매 삭제
pub async fn handle_delete_auction(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(id): Path<AuctionId>,
) -> Result<Json<Value>> {
    info!("{:<12} --> 경매 삭제 요청 id: {}, user: {}", "Handler", id, user.id);
    state.engine.delete(id, &user.id).await?;
    Ok(Json(json!({ "message": "Auction deleted successfully" })))
}

/// 참가
pub async fn handle_join(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(id): Path<AuctionId>,
) -> Result<Json<Auction>> {
    info!("{:<12} --> 참가 요청 id: {}, user: {}", "Handler", id, user.id);
    Ok(Json(state.engine.join(id, &user.id).await?))
}

/// 시작
pub async fn handle_start(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(id): Path<AuctionId>,
) -> Result<Json<Auction>> {
    info!("{:<12} --> 시작 요청 id: {}, user: {}", "Handler", id, user.id);
    Ok(Json(state.engine.start(id, &user.id).await?))
}

/// 일시정지/재개
pub async fn handle_pause(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(id): Path<AuctionId>,
) -> Result<Json<Auction>> {
    info!("{:<12} --> 일시정지 토글 id: {}, user: {}", "Handler", id, user.id);
    Ok(Json(state.engine.toggle_pause(id, &user.id).await?))
}

/// 종료
pub async fn handle_end(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(id): Path<AuctionId>,
) -> Result<Json<Auction>> {
    info!("{:<12} --> 종료 요청 id: {}, user: {}", "Handler", id, user.id);
    Ok(Json(state.engine.end(id, &user.id).await?))
}

/// 선수 지명
pub async fn handle_nominate(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(id): Path<AuctionId>,
    Json(cmd): Json<NominatePlayerCommand>,
) -> Result<Json<Auction>> {
    info!(
        "{:<12} --> 선수 지명 요청 id: {}, {:?}",
        "Handler", id, cmd
    );
    Ok(Json(state.engine.nominate(id, &user.id, cmd).await?))
}

/// 입찰
pub async fn handle_bid(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(id): Path<AuctionId>,
    Json(cmd): Json<PlaceBidCommand>,
) -> Result<Json<AcceptedBid>> {
    Ok(Json(state.engine.place_bid(id, &user.id, cmd).await?))
}

/// 현재 선수 마감
pub async fn handle_close_player(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(id): Path<AuctionId>,
) -> Result<Json<Auction>> {
    info!("{:<12} --> 선수 마감 요청 id: {}, user: {}", "Handler", id, user.id);
    Ok(Json(state.engine.close_player(id, &user.id).await?))
}

/// 서버 상태
pub async fn handle_status(State(state): State<AppState>) -> Json<RealtimeEvent> {
    Json(server_status(&state).await)
}

// endregion: --- Auction Handlers

/// WebSocket 전송 계층
/// 접속하면 접속자 수와 서버 상태를 보내고, 룸에 입장하면 경매 스냅샷을 보낸 뒤 룸 이벤트를 전달한다.
// region:    --- Imports
use crate::app::{server_status, AppState};
use crate::auction::events::RealtimeEvent;
use crate::auction::model::AuctionId;
use crate::broadcast::SessionId;
use crate::error::AuctionError;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use tracing::{debug, info, warn};

// endregion: --- Imports

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: Option<String>,
}

/// 클라이언트 -> 서버 메시지
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinRoom { auction_id: AuctionId },
    LeaveRoom { auction_id: AuctionId },
    GetStatus,
}

/// GET /ws?user_id=...
pub async fn handle_ws(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, params.user_id, state))
}

async fn handle_socket(mut socket: WebSocket, user_id: Option<String>, state: AppState) {
    let user_id = match user_id {
        Some(id) => match state.directory.find_user(&id).await {
            Ok(Some(_)) => Some(id),
            _ => {
                warn!("{:<12} --> 알 수 없는 사용자 접속, 익명 처리: {}", "Socket", id);
                None
            }
        },
        None => None,
    };

    let (session, mut outbound) = state.presence.connect(user_id.clone()).await;
    match state.presence.online_count().await {
        Ok(online_count) => state
            .hub
            .send_to(session, &RealtimeEvent::PresenceUpdate { online_count }),
        Err(e) => warn!("{:<12} --> 접속자 수 조회 실패: {}", "Socket", e),
    }
    state.hub.send_to(session, &server_status(&state).await);

    loop {
        tokio::select! {
            payload = outbound.recv() => {
                let Some(payload) = payload else { break };
                if socket.send(Message::Text(payload.to_string())).await.is_err() {
                    break; // 클라이언트 연결 끊김
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_client_message(&state, session, &text).await {
                            if socket.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if let Err(e) = state.presence.disconnect(session, user_id.as_deref()).await {
        warn!("{:<12} --> 연결 해제 처리 실패: {}", "Socket", e);
    }
}

// 직접 응답할 내용이 있으면 반환 (오류 메시지)
async fn handle_client_message(state: &AppState, session: SessionId, text: &str) -> Option<String> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("{:<12} --> 잘못된 메시지: {}", "Socket", e);
            return Some(error_frame(&AuctionError::Validation(format!(
                "unrecognized message: {}",
                e
            ))));
        }
    };

    match message {
        ClientMessage::JoinRoom { auction_id } => {
            state.hub.join_room(session, auction_id);
            match state.engine.get_auction(auction_id).await {
                Ok(auction) => {
                    info!(
                        "{:<12} --> 룸 입장 session: {}, auction: {}",
                        "Socket", session, auction_id
                    );
                    state
                        .hub
                        .send_to(session, &RealtimeEvent::snapshot(&auction));
                    None
                }
                Err(e) => {
                    state.hub.leave_room(session, auction_id);
                    Some(error_frame(&e))
                }
            }
        }
        ClientMessage::LeaveRoom { auction_id } => {
            state.hub.leave_room(session, auction_id);
            None
        }
        ClientMessage::GetStatus => {
            state.hub.send_to(session, &server_status(state).await);
            None
        }
    }
}

fn error_frame(e: &AuctionError) -> String {
    serde_json::json!({
        "type": "error",
        "error": e.to_string(),
        "code": e.code(),
    })
    .to_string()
}

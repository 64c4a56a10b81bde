use super::model::{Auction, AuctionId, Participant};
use serde::{Deserialize, Serialize};

/// 실시간 이벤트
/// 경매 관련 이벤트는 커밋 버전을 포함하며, 클라이언트는 더 새로운 버전만 반영한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    // 경매 전체 스냅샷
    AuctionStateUpdate {
        auction_id: AuctionId,
        version: i64,
        auction: Auction,
    },
    // 참가자 목록 변경
    ParticipantUpdate {
        auction_id: AuctionId,
        version: i64,
        participants: Vec<Participant>,
    },
    // 경매 삭제
    AuctionDeleted { auction_id: AuctionId },
    // 접속자 수 변경
    PresenceUpdate { online_count: i64 },
    // 서버 상태
    ServerStatus {
        server: bool,
        database: bool,
        connected_clients: usize,
    },
}

impl RealtimeEvent {
    pub fn snapshot(auction: &Auction) -> Self {
        RealtimeEvent::AuctionStateUpdate {
            auction_id: auction.id,
            version: auction.version,
            auction: auction.clone(),
        }
    }

    /// 경매 룸 대상 이벤트면 해당 경매 id
    pub fn auction_id(&self) -> Option<AuctionId> {
        match self {
            RealtimeEvent::AuctionStateUpdate { auction_id, .. }
            | RealtimeEvent::ParticipantUpdate { auction_id, .. }
            | RealtimeEvent::AuctionDeleted { auction_id } => Some(*auction_id),
            RealtimeEvent::PresenceUpdate { .. } | RealtimeEvent::ServerStatus { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RealtimeEvent::AuctionStateUpdate { .. } => "auction_state_update",
            RealtimeEvent::ParticipantUpdate { .. } => "participant_update",
            RealtimeEvent::AuctionDeleted { .. } => "auction_deleted",
            RealtimeEvent::PresenceUpdate { .. } => "presence_update",
            RealtimeEvent::ServerStatus { .. } => "server_status",
        }
    }
}

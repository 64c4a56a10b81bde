/// 실시간 브로드캐스트 계층
/// 상태 머신과 사용자 디렉터리가 사용하는 알림 계약을 제공한다.
/// 발행은 fire-and-forget이며 전달 완료를 기다리지 않는다.
// region:    --- Imports
use crate::auction::events::RealtimeEvent;
use crate::auction::model::{Auction, AuctionId, Participant};
use std::sync::{Arc, Mutex};
use tracing::debug;

// endregion: --- Imports

pub mod hub;
pub mod mirror;
pub mod ws;

pub use hub::{RoomHub, SessionId};
pub use mirror::AuctionMirror;

// region:    --- Event Sink
/// 이벤트 전달 경로 (로컬 허브 또는 Kafka 릴레이)
pub trait EventSink: Send + Sync {
    /// 호출 순서대로 전달되어야 하며, 블로킹하지 않아야 한다.
    fn publish(&self, event: RealtimeEvent);
}

/// 발행된 이벤트를 기록만 하는 싱크 (테스트용)
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RealtimeEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<RealtimeEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: RealtimeEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

// endregion: --- Event Sink

// region:    --- Broadcaster
/// 상태 머신/디렉터리 -> 브로드캐스트 계층 계약
#[derive(Clone)]
pub struct Broadcaster {
    sink: Arc<dyn EventSink>,
}

impl Broadcaster {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub fn notify_auction_update(&self, auction: &Auction) {
        debug!(
            "{:<12} --> 경매 상태 발행 id: {}, version: {}",
            "Broadcast", auction.id, auction.version
        );
        self.sink.publish(RealtimeEvent::snapshot(auction));
    }

    pub fn notify_auction_deleted(&self, auction_id: AuctionId) {
        debug!("{:<12} --> 경매 삭제 발행 id: {}", "Broadcast", auction_id);
        self.sink
            .publish(RealtimeEvent::AuctionDeleted { auction_id });
    }

    pub fn notify_participant_change(
        &self,
        auction_id: AuctionId,
        version: i64,
        participants: &[Participant],
    ) {
        debug!(
            "{:<12} --> 참가자 변경 발행 id: {}, 참가자 수: {}",
            "Broadcast",
            auction_id,
            participants.len()
        );
        self.sink.publish(RealtimeEvent::ParticipantUpdate {
            auction_id,
            version,
            participants: participants.to_vec(),
        });
    }

    pub fn notify_presence_change(&self, online_count: i64) {
        debug!("{:<12} --> 접속자 수 발행: {}", "Broadcast", online_count);
        self.sink
            .publish(RealtimeEvent::PresenceUpdate { online_count });
    }
}

// endregion: --- Broadcaster

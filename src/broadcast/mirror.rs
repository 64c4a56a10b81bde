/// 클라이언트 측 경매 미러
/// 전송 계층은 at-least-once이므로 같은 이벤트가 여러 번 올 수 있다.
/// 버전이 더 새로운 이벤트만 반영해서 중복 전달이 상태를 바꾸지 않게 한다.
use crate::auction::events::RealtimeEvent;
use crate::auction::model::{Auction, AuctionId};

#[derive(Debug, Clone, PartialEq)]
pub struct AuctionMirror {
    pub auction_id: AuctionId,
    pub auction: Option<Auction>,
    pub deleted: bool,
    pub online_count: Option<i64>,
    /// 마지막으로 반영한 참가자 목록 이벤트의 버전
    pub participants_version: i64,
}

impl AuctionMirror {
    pub fn new(auction_id: AuctionId) -> Self {
        Self {
            auction_id,
            auction: None,
            deleted: false,
            online_count: None,
            participants_version: 0,
        }
    }

    /// 직접 조회한 스냅샷으로 맞추기 (재연결 시)
    pub fn reconcile(&mut self, snapshot: Option<Auction>) {
        match snapshot {
            Some(auction) => self.accept_snapshot(auction),
            None => {
                self.auction = None;
                self.deleted = true;
            }
        }
    }

    /// 이벤트 반영. 상태가 바뀌었으면 true.
    pub fn apply(&mut self, event: &RealtimeEvent) -> bool {
        if let Some(id) = event.auction_id() {
            if id != self.auction_id || self.deleted {
                return false;
            }
        }

        match event {
            RealtimeEvent::AuctionStateUpdate { auction, .. } => {
                let before = self.auction.clone();
                self.accept_snapshot(auction.clone());
                before != self.auction
            }
            RealtimeEvent::ParticipantUpdate {
                version,
                participants,
                ..
            } => match self.auction.as_mut() {
                Some(current) if *version > current.version.max(self.participants_version) => {
                    self.participants_version = *version;
                    let changed = current.participants != *participants;
                    current.participants = participants.clone();
                    changed
                }
                _ => false,
            },
            RealtimeEvent::AuctionDeleted { .. } => {
                self.auction = None;
                self.deleted = true;
                true
            }
            RealtimeEvent::PresenceUpdate { online_count } => {
                let changed = self.online_count != Some(*online_count);
                self.online_count = Some(*online_count);
                changed
            }
            RealtimeEvent::ServerStatus { .. } => false,
        }
    }

    fn accept_snapshot(&mut self, mut auction: Auction) {
        let newer = self
            .auction
            .as_ref()
            .map(|current| auction.version > current.version)
            .unwrap_or(true);
        if !newer {
            return;
        }
        // 더 새로운 참가자 목록을 이미 받았으면 유지
        if self.participants_version > auction.version {
            if let Some(current) = &self.auction {
                auction.participants = current.participants.clone();
            }
        }
        self.auction = Some(auction);
    }
}

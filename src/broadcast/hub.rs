/// 룸 허브
/// 경매별 룸과 전체 접속 세션을 관리하고, 이벤트를 직렬화해 각 세션 큐에 넣는다.
/// 세션 큐는 FIFO라서 같은 세션으로의 전달 순서는 발행 순서와 같다.
// region:    --- Imports
use super::EventSink;
use crate::auction::events::RealtimeEvent;
use crate::auction::model::AuctionId;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

// endregion: --- Imports

pub type SessionId = u64;

struct Session {
    user_id: Option<String>,
    tx: mpsc::UnboundedSender<Arc<str>>,
}

#[derive(Default)]
struct HubState {
    sessions: HashMap<SessionId, Session>,
    rooms: HashMap<AuctionId, HashSet<SessionId>>,
}

// region:    --- Room Hub
#[derive(Default)]
pub struct RoomHub {
    state: Mutex<HubState>,
    next_id: AtomicU64,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 세션 등록. 반환된 수신기로 해당 세션에 보낼 메시지가 들어온다.
    pub fn register(
        &self,
        user_id: Option<String>,
    ) -> (SessionId, mpsc::UnboundedReceiver<Arc<str>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        state.sessions.insert(id, Session { user_id, tx });
        info!(
            "{:<12} --> 세션 연결 id: {}, 접속 세션 수: {}",
            "Broadcast",
            id,
            state.sessions.len()
        );
        (id, rx)
    }

    /// 세션 해제. 모든 룸에서 제거하고 세션의 사용자 id를 돌려준다.
    pub fn unregister(&self, session: SessionId) -> Option<String> {
        let mut state = self.lock();
        let removed = state.sessions.remove(&session)?;
        state.rooms.retain(|_, members| {
            members.remove(&session);
            !members.is_empty()
        });
        info!(
            "{:<12} --> 세션 종료 id: {}, 접속 세션 수: {}",
            "Broadcast",
            session,
            state.sessions.len()
        );
        removed.user_id
    }

    pub fn join_room(&self, session: SessionId, auction_id: AuctionId) -> bool {
        let mut state = self.lock();
        if !state.sessions.contains_key(&session) {
            return false;
        }
        state.rooms.entry(auction_id).or_default().insert(session);
        debug!(
            "{:<12} --> 룸 입장 session: {}, auction: {}",
            "Broadcast", session, auction_id
        );
        true
    }

    pub fn leave_room(&self, session: SessionId, auction_id: AuctionId) {
        let mut state = self.lock();
        if let Some(members) = state.rooms.get_mut(&auction_id) {
            members.remove(&session);
            if members.is_empty() {
                state.rooms.remove(&auction_id);
            }
        }
    }

    pub fn room_size(&self, auction_id: AuctionId) -> usize {
        self.lock()
            .rooms
            .get(&auction_id)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    pub fn connected_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// 사용자의 다른 활성 세션 수
    pub fn sessions_for_user(&self, user_id: &str) -> usize {
        self.lock()
            .sessions
            .values()
            .filter(|s| s.user_id.as_deref() == Some(user_id))
            .count()
    }

    /// 단일 세션 전송 (접속 시 스냅샷 등)
    pub fn send_to(&self, session: SessionId, event: &RealtimeEvent) {
        let Some(payload) = encode(event) else {
            return;
        };
        if let Some(s) = self.lock().sessions.get(&session) {
            let _ = s.tx.send(payload);
        }
    }

    /// 이벤트 팬아웃
    /// 경매 이벤트는 해당 룸, 그 외에는 전체 세션으로 보낸다.
    pub fn fan_out(&self, event: &RealtimeEvent) {
        let Some(payload) = encode(event) else {
            return;
        };
        let mut state = self.lock();
        let targets: Vec<SessionId> = match event.auction_id() {
            Some(auction_id) => state
                .rooms
                .get(&auction_id)
                .map(|m| m.iter().copied().collect())
                .unwrap_or_default(),
            None => state.sessions.keys().copied().collect(),
        };

        let mut delivered = 0;
        for id in &targets {
            if let Some(s) = state.sessions.get(id) {
                if s.tx.send(Arc::clone(&payload)).is_ok() {
                    delivered += 1;
                }
            }
        }
        if let RealtimeEvent::AuctionDeleted { auction_id } = event {
            state.rooms.remove(auction_id);
        }
        debug!(
            "{:<12} --> {} 전달: {}/{} 세션",
            "Broadcast",
            event.kind(),
            delivered,
            targets.len()
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventSink for RoomHub {
    fn publish(&self, event: RealtimeEvent) {
        self.fan_out(&event);
    }
}

fn encode(event: &RealtimeEvent) -> Option<Arc<str>> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Arc::from(text)),
        Err(e) => {
            error!("{:<12} --> 이벤트 직렬화 실패: {:?}", "Broadcast", e);
            None
        }
    }
}

// endregion: --- Room Hub

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<Arc<str>>) -> Vec<RealtimeEvent> {
        let mut out = vec![];
        while let Ok(text) = rx.try_recv() {
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }

    #[test]
    fn auction_events_reach_only_room_members() {
        let hub = RoomHub::new();
        let (a, mut rx_a) = hub.register(Some("a".into()));
        let (_b, mut rx_b) = hub.register(Some("b".into()));
        assert!(hub.join_room(a, 10));

        hub.fan_out(&RealtimeEvent::AuctionDeleted { auction_id: 10 });

        assert_eq!(
            drain(&mut rx_a),
            vec![RealtimeEvent::AuctionDeleted { auction_id: 10 }]
        );
        assert!(drain(&mut rx_b).is_empty());
        // 삭제된 경매의 룸은 정리된다
        assert_eq!(hub.room_size(10), 0);
    }

    #[test]
    fn presence_reaches_every_session() {
        let hub = RoomHub::new();
        let (_a, mut rx_a) = hub.register(None);
        let (_b, mut rx_b) = hub.register(Some("b".into()));

        hub.publish(RealtimeEvent::PresenceUpdate { online_count: 2 });

        assert_eq!(drain(&mut rx_a).len(), 1);
        assert_eq!(drain(&mut rx_b).len(), 1);
    }

    #[test]
    fn delivery_preserves_publish_order() {
        let hub = RoomHub::new();
        let (a, mut rx) = hub.register(None);
        hub.join_room(a, 1);
        for n in 0..20 {
            hub.fan_out(&RealtimeEvent::PresenceUpdate { online_count: n });
        }
        let counts: Vec<i64> = drain(&mut rx)
            .into_iter()
            .map(|e| match e {
                RealtimeEvent::PresenceUpdate { online_count } => online_count,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(counts, (0..20).collect::<Vec<i64>>());
    }

    #[test]
    fn unregister_removes_membership_everywhere() {
        let hub = RoomHub::new();
        let (a, _rx) = hub.register(Some("a".into()));
        let (b, _rx_b) = hub.register(Some("a".into()));
        hub.join_room(a, 1);
        hub.join_room(a, 2);
        hub.join_room(b, 2);
        assert_eq!(hub.sessions_for_user("a"), 2);

        assert_eq!(hub.unregister(a), Some("a".to_string()));
        assert_eq!(hub.room_size(1), 0);
        assert_eq!(hub.room_size(2), 1);
        assert_eq!(hub.connected_count(), 1);
        assert_eq!(hub.sessions_for_user("a"), 1);
        assert!(!hub.join_room(a, 3));
    }
}

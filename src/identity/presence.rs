/// 접속 상태 레지스트리
/// 로그인/로그아웃/소켓 연결/해제를 사용자별로 직렬화하고, 접속자 수 변경을 브로드캐스트한다.
// region:    --- Imports
use super::{User, UserDirectory};
use crate::broadcast::{Broadcaster, RoomHub, SessionId};
use crate::error::{AuctionError, Result};
use crate::locks::KeyedLocks;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

// endregion: --- Imports

pub struct PresenceRegistry {
    directory: Arc<dyn UserDirectory>,
    hub: Arc<RoomHub>,
    broadcaster: Broadcaster,
    locks: KeyedLocks<String>,
}

impl PresenceRegistry {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        hub: Arc<RoomHub>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            directory,
            hub,
            broadcaster,
            locks: KeyedLocks::new(),
        }
    }

    /// PIN 로그인
    pub async fn login(&self, user_id: &str, pin: &str) -> Result<User> {
        let _guard = self.locks.lock(&user_id.to_string()).await;
        info!("{:<12} --> 로그인 요청 user: {}", "Presence", user_id);

        if !self.directory.verify_pin(user_id, pin).await? {
            warn!("{:<12} --> PIN 불일치 user: {}", "Presence", user_id);
            return Err(AuctionError::Unauthenticated("Invalid PIN".to_string()));
        }
        self.directory.set_online(user_id, true).await?;
        let user = self
            .directory
            .find_user(user_id)
            .await?
            .ok_or_else(|| AuctionError::NotFound(format!("user {}", user_id)))?;

        self.publish_count().await;
        Ok(user)
    }

    /// 로그아웃
    pub async fn logout(&self, user_id: &str) -> Result<()> {
        let _guard = self.locks.lock(&user_id.to_string()).await;
        info!("{:<12} --> 로그아웃 user: {}", "Presence", user_id);

        if self.directory.find_user(user_id).await?.is_none() {
            return Err(AuctionError::NotFound(format!("user {}", user_id)));
        }
        self.directory.set_online(user_id, false).await?;
        self.publish_count().await;
        Ok(())
    }

    /// 소켓 연결 등록
    pub async fn connect(
        &self,
        user_id: Option<String>,
    ) -> (SessionId, mpsc::UnboundedReceiver<Arc<str>>) {
        let _guard = match &user_id {
            Some(id) => Some(self.locks.lock(id).await),
            None => None,
        };
        self.hub.register(user_id)
    }

    /// 소켓 해제. 로그인 상태 사용자의 마지막 세션이면 오프라인 처리한다.
    pub async fn disconnect(&self, session: SessionId, user_id: Option<&str>) -> Result<()> {
        let Some(user_id) = user_id else {
            self.hub.unregister(session);
            return Ok(());
        };
        let _guard = self.locks.lock(&user_id.to_string()).await;
        self.hub.unregister(session);

        if self.hub.sessions_for_user(user_id) > 0 {
            return Ok(());
        }
        let logged_in = self
            .directory
            .find_user(user_id)
            .await?
            .map(|u| u.is_logged_in)
            .unwrap_or(false);
        if logged_in {
            info!(
                "{:<12} --> 마지막 세션 종료, 오프라인 처리 user: {}",
                "Presence", user_id
            );
            self.directory.set_online(user_id, false).await?;
            self.publish_count().await;
        }
        Ok(())
    }

    pub async fn online_count(&self) -> Result<i64> {
        self.directory.online_count().await
    }

    async fn publish_count(&self) {
        match self.directory.online_count().await {
            Ok(count) => self.broadcaster.notify_presence_change(count),
            Err(e) => warn!("{:<12} --> 접속자 수 조회 실패: {}", "Presence", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::events::RealtimeEvent;
    use crate::broadcast::RecordingSink;
    use crate::database::memory::MemoryStore;
    use crate::identity::RosterEntry;

    async fn setup() -> (PresenceRegistry, Arc<MemoryStore>, Arc<RecordingSink>) {
        let store = Arc::new(MemoryStore::new());
        store
            .provision(&[
                RosterEntry::new("sid", "Sid", "🦁", "1111").unwrap(),
                RosterEntry::new("rah", "Rah", "🐯", "2222").unwrap(),
            ])
            .await
            .unwrap();
        let sink = Arc::new(RecordingSink::default());
        let registry = PresenceRegistry::new(
            store.clone(),
            Arc::new(RoomHub::new()),
            Broadcaster::new(sink.clone()),
        );
        (registry, store, sink)
    }

    #[tokio::test]
    async fn login_requires_matching_pin() {
        let (presence, store, sink) = setup().await;

        let err = presence.login("sid", "9999").await.unwrap_err();
        assert!(matches!(err, AuctionError::Unauthenticated(_)));
        assert!(!store.find_user("sid").await.unwrap().unwrap().is_logged_in);
        assert!(sink.events().is_empty());

        let user = presence.login("sid", "1111").await.unwrap();
        assert!(user.is_logged_in);
        assert_eq!(
            sink.events(),
            vec![RealtimeEvent::PresenceUpdate { online_count: 1 }]
        );
    }

    #[tokio::test]
    async fn unknown_user_cannot_log_in() {
        let (presence, _, _) = setup().await;
        assert!(matches!(
            presence.login("ghost", "1111").await,
            Err(AuctionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn last_session_disconnect_marks_user_offline() {
        let (presence, store, sink) = setup().await;
        presence.login("sid", "1111").await.unwrap();
        let (first, _rx1) = presence.connect(Some("sid".into())).await;
        let (second, _rx2) = presence.connect(Some("sid".into())).await;
        sink.clear();

        presence.disconnect(first, Some("sid")).await.unwrap();
        assert!(store.find_user("sid").await.unwrap().unwrap().is_logged_in);
        assert!(sink.events().is_empty());

        presence.disconnect(second, Some("sid")).await.unwrap();
        assert!(!store.find_user("sid").await.unwrap().unwrap().is_logged_in);
        assert_eq!(
            sink.events(),
            vec![RealtimeEvent::PresenceUpdate { online_count: 0 }]
        );
    }

    #[tokio::test]
    async fn anonymous_sessions_do_not_touch_presence() {
        let (presence, _, sink) = setup().await;
        let (session, _rx) = presence.connect(None).await;
        presence.disconnect(session, None).await.unwrap();
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn logout_broadcasts_new_count() {
        let (presence, _, sink) = setup().await;
        presence.login("sid", "1111").await.unwrap();
        presence.login("rah", "2222").await.unwrap();
        presence.logout("sid").await.unwrap();

        assert_eq!(
            sink.events().last(),
            Some(&RealtimeEvent::PresenceUpdate { online_count: 1 })
        );
        assert_eq!(presence.online_count().await.unwrap(), 1);
    }
}

/// 경매 커맨드 처리
/// 1. 경매 생성/삭제
/// 2. 참가, 시작, 일시정지, 종료
/// 3. 선수 지명, 입찰, 낙찰
///
/// 변경 커맨드는 경매별 잠금을 잡은 뒤 조회 -> 복사본에 전이 적용 -> 버전 비교 저장 -> 발행 순서로 처리한다.
// region:    --- Imports
use super::model::{AcceptedBid, Sale};
use crate::auction::model::{Auction, AuctionId, NewAuction};
use crate::auction::state_machine::{CloseTrigger, LotTiming};
use crate::auction::{MAX_COINS_PER_USER, MIN_COINS_PER_USER};
use crate::broadcast::Broadcaster;
use crate::catalog::{PlayerCatalog, MIN_CURATED_POOL};
use crate::error::{AuctionError, Result};
use crate::identity::UserDirectory;
use crate::locks::KeyedLocks;
use crate::registry::{AuctionRegistry, LinkageChange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

// endregion: --- Imports

// region:    --- Commands
/// 경매 생성 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateAuctionCommand {
    pub name: String,
    pub ghanta_coins: i64,
}

/// 선수 지명 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NominatePlayerCommand {
    pub player_id: i64,
}

/// 입찰 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub player_id: i64,
    pub amount: i64,
}

// endregion: --- Commands

// region:    --- Engine
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub timing: LotTiming,
    /// 저장 실패 시 최대 시도 횟수
    pub persist_retries: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timing: LotTiming::default(),
            persist_retries: 3,
        }
    }
}

type Transition<T> = Result<(T, Vec<LinkageChange>)>;

pub struct AuctionEngine {
    registry: Arc<dyn AuctionRegistry>,
    directory: Arc<dyn UserDirectory>,
    catalog: Arc<dyn PlayerCatalog>,
    broadcaster: Broadcaster,
    locks: KeyedLocks<AuctionId>,
    settings: EngineSettings,
}

impl AuctionEngine {
    pub fn new(
        registry: Arc<dyn AuctionRegistry>,
        directory: Arc<dyn UserDirectory>,
        catalog: Arc<dyn PlayerCatalog>,
        broadcaster: Broadcaster,
        settings: EngineSettings,
    ) -> Self {
        Self {
            registry,
            directory,
            catalog,
            broadcaster,
            locks: KeyedLocks::new(),
            settings,
        }
    }

    /// 1. 경매 생성
    pub async fn create_auction(&self, host_id: &str, cmd: CreateAuctionCommand) -> Result<Auction> {
        info!("{:<12} --> 경매 생성 요청 host: {}, {:?}", "Command", host_id, cmd);

        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(AuctionError::Validation(
                "auction name is required".to_string(),
            ));
        }
        if !(MIN_COINS_PER_USER..=MAX_COINS_PER_USER).contains(&cmd.ghanta_coins) {
            return Err(AuctionError::Validation(format!(
                "ghanta coins must be between {} and {}",
                MIN_COINS_PER_USER, MAX_COINS_PER_USER
            )));
        }

        let host = self
            .directory
            .find_user(host_id)
            .await?
            .ok_or_else(|| AuctionError::NotFound(format!("user {}", host_id)))?;
        let pool_size = self.catalog.count_curated_pool(host_id).await?;
        if pool_size < MIN_CURATED_POOL {
            warn!(
                "{:<12} --> 큐레이션 선수 부족 host: {}, {}/{}",
                "Command", host_id, pool_size, MIN_CURATED_POOL
            );
            return Err(AuctionError::Prerequisite(format!(
                "at least {} curated players are required, found {}",
                MIN_CURATED_POOL, pool_size
            )));
        }

        let auction = self
            .with_retries("create", || {
                self.registry.insert_auction(NewAuction {
                    name: name.to_string(),
                    host: host.member(),
                    ghanta_coins_per_user: cmd.ghanta_coins,
                    created_at: Utc::now(),
                })
            })
            .await?;
        info!("{:<12} --> 경매 생성 완료 id: {}", "Command", auction.id);
        Ok(auction)
    }

    pub async fn get_auction(&self, id: AuctionId) -> Result<Auction> {
        self.registry
            .get_auction(id)
            .await?
            .ok_or_else(|| AuctionError::NotFound(format!("auction {}", id)))
    }

    pub async fn list_auctions(&self) -> Result<Vec<Auction>> {
        self.registry.list_auctions().await
    }

    /// 2. 참가
    pub async fn join(&self, id: AuctionId, user_id: &str) -> Result<Auction> {
        let user = self
            .directory
            .find_user(user_id)
            .await?
            .ok_or_else(|| AuctionError::NotFound(format!("user {}", user_id)))?;
        let member = user.member();
        let (auction, _) = self
            .execute(id, "join", |auction, now| {
                let joined = auction.join(&member, now)?;
                Ok(((), vec![joined]))
            })
            .await?;
        Ok(auction)
    }

    /// 시작
    pub async fn start(&self, id: AuctionId, requester: &str) -> Result<Auction> {
        let (auction, _) = self
            .execute(id, "start", |auction, now| {
                auction.start(requester, now)?;
                Ok(((), Vec::new()))
            })
            .await?;
        Ok(auction)
    }

    /// 일시정지/재개
    pub async fn toggle_pause(&self, id: AuctionId, requester: &str) -> Result<Auction> {
        let timing = self.settings.timing;
        let (auction, paused) = self
            .execute(id, "pause", |auction, now| {
                Ok((auction.toggle_pause(requester, now, timing)?, Vec::new()))
            })
            .await?;
        info!(
            "{:<12} --> 경매 {} id: {}",
            "Command",
            if paused { "일시정지" } else { "재개" },
            id
        );
        Ok(auction)
    }

    /// 3. 선수 지명
    pub async fn nominate(
        &self,
        id: AuctionId,
        requester: &str,
        cmd: NominatePlayerCommand,
    ) -> Result<Auction> {
        if !self.get_auction(id).await?.is_host(requester) {
            return Err(AuctionError::Authorization(
                "only the host can nominate players".to_string(),
            ));
        }
        let player = self
            .catalog
            .find_player(cmd.player_id)
            .await?
            .ok_or_else(|| AuctionError::NotFound(format!("player {}", cmd.player_id)))?;
        if let Some(owner) = &player.current_owner {
            return Err(AuctionError::State(format!(
                "player {} already belongs to {}",
                player.id, owner
            )));
        }
        if !self.catalog.is_curated(requester, player.id).await? {
            return Err(AuctionError::Validation(format!(
                "player {} is not in your auction list",
                player.id
            )));
        }
        let elsewhere = self
            .registry
            .active_auctions()
            .await?
            .into_iter()
            .find(|a| {
                a.id != id
                    && a.current_player
                        .as_ref()
                        .map(|lot| lot.player_id == player.id)
                        .unwrap_or(false)
            });
        if let Some(other) = elsewhere {
            return Err(AuctionError::State(format!(
                "player {} is already up for bid in auction {}",
                player.id, other.id
            )));
        }

        let timing = self.settings.timing;
        let (auction, _) = self
            .execute(id, "nominate", |auction, now| {
                auction.nominate(requester, &player, now, timing)?;
                Ok(((), Vec::new()))
            })
            .await?;
        info!(
            "{:<12} --> 선수 지명 id: {}, player: {}",
            "Command", id, player.id
        );
        Ok(auction)
    }

    /// 입찰
    pub async fn place_bid(
        &self,
        id: AuctionId,
        user_id: &str,
        cmd: PlaceBidCommand,
    ) -> Result<AcceptedBid> {
        info!(
            "{:<12} --> 입찰 요청 id: {}, user: {}, {:?}",
            "Command", id, user_id, cmd
        );
        let timing = self.settings.timing;
        let (auction, bid) = self
            .execute(id, "bid", |auction, now| {
                let outbid = auction
                    .leading_bidder()
                    .filter(|leader| *leader != user_id)
                    .map(str::to_string);
                let bid = auction.place_bid(user_id, cmd.player_id, cmd.amount, now, timing)?;
                let stats = LinkageChange::Bid {
                    user_id: user_id.to_string(),
                    outbid,
                };
                Ok((bid, vec![stats]))
            })
            .await?;

        let lot = auction
            .current_player
            .as_ref()
            .ok_or_else(|| AuctionError::State("lot closed unexpectedly".to_string()))?;
        let remaining_coins = auction
            .participant(user_id)
            .map(|p| p.remaining_coins)
            .unwrap_or_default();
        Ok(AcceptedBid {
            auction_id: auction.id,
            next_minimum: lot.floor(),
            deadline: lot.deadline,
            remaining_coins,
            version: auction.version,
            bid,
        })
    }

    /// 호스트가 현재 선수 마감
    pub async fn close_player(&self, id: AuctionId, requester: &str) -> Result<Auction> {
        let (auction, sale) = self
            .settle(id, "close", |auction, now| {
                auction.close_player(CloseTrigger::Host(requester), now)
            })
            .await?;
        log_sale(id, sale.as_ref());
        Ok(auction)
    }

    /// 마감 시간이 지난 로트 정산 (스케줄러)
    pub async fn close_expired(&self, id: AuctionId) -> Result<Option<Sale>> {
        let (_, sale) = self
            .settle(id, "expire", |auction, now| {
                auction.close_player(CloseTrigger::Timer, now)
            })
            .await?;
        log_sale(id, sale.as_ref());
        Ok(sale)
    }

    /// 종료
    pub async fn end(&self, id: AuctionId, requester: &str) -> Result<Auction> {
        let (auction, sale) = self
            .settle(id, "end", |auction, now| auction.end(requester, now))
            .await?;
        log_sale(id, sale.as_ref());
        info!("{:<12} --> 경매 종료 id: {}", "Command", id);
        Ok(auction)
    }

    /// 삭제 (Pending 상태, 호스트만)
    pub async fn delete(&self, id: AuctionId, requester: &str) -> Result<()> {
        let _guard = self.locks.lock(&id).await;
        self.with_retries("delete", || async move {
            let auction = self.get_auction(id).await?;
            auction.ensure_deletable(requester)?;
            self.registry.delete_auction(id, auction.version).await
        })
        .await?;
        info!("{:<12} --> 경매 삭제 완료 id: {}", "Command", id);
        self.broadcaster.notify_auction_deleted(id);
        Ok(())
    }

    // 로트 정산. 선수가 그 사이 다른 경매에서 낙찰됐으면 입찰을 무효로 하고 유찰 처리한다.
    async fn settle<F>(
        &self,
        id: AuctionId,
        action: &str,
        mut close: F,
    ) -> Result<(Auction, Option<Sale>)>
    where
        F: FnMut(&mut Auction, DateTime<Utc>) -> Result<(Option<Sale>, Option<LinkageChange>)>,
    {
        let player_id = match self
            .execute(id, action, |auction, now| settled(close(auction, now)?))
            .await
        {
            Err(AuctionError::PlayerTaken(player_id)) => player_id,
            other => return other,
        };
        warn!(
            "{:<12} --> 다른 경매에서 이미 낙찰된 선수, 유찰 처리 id: {}, player: {}",
            "Command", id, player_id
        );
        self.execute(id, action, |auction, now| {
            auction.void_bids(player_id);
            settled(close(auction, now)?)
        })
        .await
    }

    // 잠금 -> 조회 -> 복사본에 전이 -> 버전 비교 저장 -> 발행
    async fn execute<T, F>(&self, id: AuctionId, action: &str, mut apply: F) -> Result<(Auction, T)>
    where
        F: FnMut(&mut Auction, DateTime<Utc>) -> Transition<T>,
    {
        let _guard = self.locks.lock(&id).await;
        let max_attempts = self.settings.persist_retries.max(1);
        let mut attempts = 0;
        let (previous, next, output) = loop {
            attempts += 1;
            match self.attempt(id, &mut apply).await {
                Ok(committed) => break committed,
                Err(e) => self.check_retry(action, e, attempts, max_attempts)?,
            }
        };

        self.broadcaster.notify_auction_update(&next);
        if previous.participants != next.participants {
            self.broadcaster
                .notify_participant_change(id, next.version, &next.participants);
        }
        Ok((next, output))
    }

    async fn attempt<T, F>(&self, id: AuctionId, apply: &mut F) -> Result<(Auction, Auction, T)>
    where
        F: FnMut(&mut Auction, DateTime<Utc>) -> Transition<T>,
    {
        let current = self.get_auction(id).await?;
        let now = Utc::now();
        let mut next = current.clone();
        let (output, linkage) = apply(&mut next, now)?;
        next.version = current.version + 1;
        next.updated_at = now;

        self.registry.commit(&next, current.version, &linkage).await?;
        Ok((current, next, output))
    }

    // 저장 실패/버전 충돌만 재시도. 거절된 커맨드는 그대로 반환한다.
    async fn with_retries<T, F, Fut>(&self, action: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_attempts = self.settings.persist_retries.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => self.check_retry(action, e, attempts, max_attempts)?,
            }
        }
    }

    // 재시도 가능하면 Ok(()), 아니면 호출자에게 돌려줄 오류
    fn check_retry(
        &self,
        action: &str,
        e: AuctionError,
        attempts: u32,
        max_attempts: u32,
    ) -> Result<()> {
        if !e.is_retryable() {
            return Err(e);
        }
        if attempts < max_attempts {
            warn!(
                "{:<12} --> {} 저장 실패, 재시도 {}/{}: {}",
                "Command", action, attempts, max_attempts, e
            );
            return Ok(());
        }
        error!(
            "{:<12} --> {} 최대 재시도 횟수 초과: {}",
            "Command", action, e
        );
        Err(match e {
            AuctionError::Conflict(id) => AuctionError::Persistence(format!(
                "auction {} kept changing underneath the command",
                id
            )),
            other => other,
        })
    }
}

fn settled(
    (sale, acquired): (Option<Sale>, Option<LinkageChange>),
) -> Transition<Option<Sale>> {
    Ok((sale, acquired.into_iter().collect()))
}

fn log_sale(id: AuctionId, sale: Option<&Sale>) {
    match sale {
        Some(sale) => info!(
            "{:<12} --> 낙찰 id: {}, player: {}, winner: {}, price: {}",
            "Command", id, sale.player_id, sale.winner, sale.price
        ),
        None => info!("{:<12} --> 유찰 또는 열린 로트 없음 id: {}", "Command", id),
    }
}

// endregion: --- Engine

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::events::RealtimeEvent;
    use crate::auction::model::AuctionStatus;
    use crate::broadcast::RecordingSink;
    use crate::catalog::{Position, Tier};
    use crate::database::memory::MemoryStore;
    use crate::identity::RosterEntry;
    use chrono::Duration;

    struct Fixture {
        engine: Arc<AuctionEngine>,
        store: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
        player_id: i64,
    }

    async fn fixture_with(settings: EngineSettings) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        store
            .provision(&[
                RosterEntry::new("host", "Host", "🎩", "0000").unwrap(),
                RosterEntry::new("a", "Anil", "🦁", "1111").unwrap(),
                RosterEntry::new("b", "Bala", "🐯", "2222").unwrap(),
            ])
            .await
            .unwrap();
        let mut player_id = 0;
        for i in 0..MIN_CURATED_POOL {
            let tier = if i == 0 { Tier::Bronze } else { Tier::Silver };
            let player = store
                .insert_player(&format!("Player {}", i), Position::Midfielder, tier)
                .await;
            store.add_to_pool("host", player.id).await.unwrap();
            if i == 0 {
                player_id = player.id;
            }
        }
        let sink = Arc::new(RecordingSink::default());
        let engine = Arc::new(AuctionEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Broadcaster::new(sink.clone()),
            settings,
        ));
        Fixture {
            engine,
            store,
            sink,
            player_id,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(EngineSettings::default()).await
    }

    fn create(coins: i64) -> CreateAuctionCommand {
        CreateAuctionCommand {
            name: "Friday night".into(),
            ghanta_coins: coins,
        }
    }

    // 두 명 참가, 시작, 선수 지명까지
    async fn running_auction(f: &Fixture) -> AuctionId {
        let id = f.engine.create_auction("host", create(100)).await.unwrap().id;
        f.engine.join(id, "a").await.unwrap();
        f.engine.join(id, "b").await.unwrap();
        f.engine.start(id, "host").await.unwrap();
        f.engine
            .nominate(
                id,
                "host",
                NominatePlayerCommand {
                    player_id: f.player_id,
                },
            )
            .await
            .unwrap();
        id
    }

    fn bid(player_id: i64, amount: i64) -> PlaceBidCommand {
        PlaceBidCommand { player_id, amount }
    }

    #[tokio::test]
    async fn two_bidders_scenario() {
        let f = fixture().await;
        let id = running_auction(&f).await;

        let first = f.engine.place_bid(id, "a", bid(f.player_id, 30)).await.unwrap();
        assert_eq!(first.next_minimum, 31);
        let err = f
            .engine
            .place_bid(id, "b", bid(f.player_id, 30))
            .await
            .unwrap_err();
        assert!(matches!(err, AuctionError::BidTooLow { minimum: 31, .. }));
        f.engine.place_bid(id, "b", bid(f.player_id, 35)).await.unwrap();

        let auction = f.engine.close_player(id, "host").await.unwrap();
        assert_eq!(auction.participant("b").unwrap().remaining_coins, 65);
        assert_eq!(auction.participant("a").unwrap().remaining_coins, 100);
        assert_eq!(auction.auctioned_players.len(), 1);
        assert_eq!(auction.auctioned_players[0].winner.user_id, "b");
        assert_eq!(auction.auctioned_players[0].winning_bid, 35);

        let profile = f.store.profile("b").await.unwrap().unwrap();
        assert_eq!(profile.squad.len(), 1);
        assert_eq!(profile.stats.players_won, 1);
        assert_eq!(profile.stats.total_coins_spent, 35);
        let player = f.store.find_player(f.player_id).await.unwrap().unwrap();
        assert_eq!(player.current_owner.as_deref(), Some("b"));

        assert_eq!(profile.stats.bid_stats.total_bids, 1);
        assert_eq!(profile.stats.bid_stats.successful_bids, 1);
        assert_eq!(profile.stats.bid_stats.outbid_count, 0);
        let outbid = f.store.profile("a").await.unwrap().unwrap();
        assert_eq!(outbid.stats.bid_stats.total_bids, 1);
        assert_eq!(outbid.stats.bid_stats.successful_bids, 0);
        assert_eq!(outbid.stats.bid_stats.outbid_count, 1);
    }

    #[tokio::test]
    async fn create_requires_a_full_curated_pool() {
        let f = fixture().await;
        let err = f.engine.create_auction("a", create(100)).await.unwrap_err();
        assert!(matches!(err, AuctionError::Prerequisite(_)));
        assert!(f.engine.list_auctions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_validates_name_and_coins() {
        let f = fixture().await;
        let blank = CreateAuctionCommand {
            name: "   ".into(),
            ghanta_coins: 100,
        };
        assert!(matches!(
            f.engine.create_auction("host", blank).await,
            Err(AuctionError::Validation(_))
        ));
        for coins in [49, 1001] {
            assert!(matches!(
                f.engine.create_auction("host", create(coins)).await,
                Err(AuctionError::Validation(_))
            ));
        }
        assert!(f.engine.create_auction("host", create(50)).await.is_ok());
        assert!(f.engine.create_auction("host", create(1000)).await.is_ok());
    }

    #[tokio::test]
    async fn non_host_start_is_rejected() {
        let f = fixture().await;
        let id = f.engine.create_auction("host", create(100)).await.unwrap().id;
        let err = f.engine.start(id, "a").await.unwrap_err();
        assert!(matches!(err, AuctionError::Authorization(_)));
        let auction = f.engine.get_auction(id).await.unwrap();
        assert_eq!(auction.status, AuctionStatus::Pending);
        assert_eq!(auction.version, 1);
    }

    #[tokio::test]
    async fn active_auction_cannot_be_deleted() {
        let f = fixture().await;
        let id = running_auction(&f).await;
        let err = f.engine.delete(id, "host").await.unwrap_err();
        assert!(matches!(err, AuctionError::State(_)));
        assert!(f.engine.get_auction(id).await.is_ok());
    }

    #[tokio::test]
    async fn over_budget_bid_leaves_no_trace() {
        let f = fixture().await;
        let id = running_auction(&f).await;
        let before = f.engine.get_auction(id).await.unwrap();

        let err = f
            .engine
            .place_bid(id, "a", bid(f.player_id, 101))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuctionError::Budget {
                amount: 101,
                remaining: 100
            }
        ));
        assert_eq!(f.engine.get_auction(id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn rejected_pause_emits_nothing() {
        let f = fixture().await;
        let id = running_auction(&f).await;
        f.sink.clear();

        let err = f.engine.toggle_pause(id, "a").await.unwrap_err();
        assert!(matches!(err, AuctionError::Authorization(_)));
        assert!(!f.engine.get_auction(id).await.unwrap().is_paused);
        assert!(f.sink.events().is_empty());
    }

    #[tokio::test]
    async fn join_broadcasts_state_then_participants() {
        let f = fixture().await;
        let id = f.engine.create_auction("host", create(100)).await.unwrap().id;
        f.sink.clear();

        f.engine.join(id, "a").await.unwrap();
        let events = f.sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), "auction_state_update");
        match &events[1] {
            RealtimeEvent::ParticipantUpdate {
                version,
                participants,
                ..
            } => {
                assert_eq!(*version, 2);
                assert_eq!(participants.len(), 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn storage_outage_surfaces_after_bounded_retries() {
        let f = fixture().await;
        let id = running_auction(&f).await;
        let before = f.engine.get_auction(id).await.unwrap();
        f.sink.clear();

        f.store.fail_next_writes(3);
        let err = f
            .engine
            .place_bid(id, "a", bid(f.player_id, 20))
            .await
            .unwrap_err();
        assert!(matches!(err, AuctionError::Persistence(_)));
        assert_eq!(f.engine.get_auction(id).await.unwrap(), before);
        assert!(f.sink.events().is_empty());
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let f = fixture().await;
        let id = running_auction(&f).await;

        f.store.fail_next_writes(1);
        let accepted = f.engine.place_bid(id, "a", bid(f.player_id, 20)).await.unwrap();
        assert_eq!(accepted.bid.amount, 20);
        let auction = f.engine.get_auction(id).await.unwrap();
        assert_eq!(auction.version, accepted.version);
        assert_eq!(auction.current_player.unwrap().bids.len(), 1);
    }

    #[tokio::test]
    async fn delete_purges_memberships_and_notifies() {
        let f = fixture().await;
        let id = f.engine.create_auction("host", create(100)).await.unwrap().id;
        f.engine.join(id, "a").await.unwrap();
        f.sink.clear();

        f.engine.delete(id, "host").await.unwrap();
        assert!(matches!(
            f.engine.get_auction(id).await,
            Err(AuctionError::NotFound(_))
        ));
        for user in ["host", "a"] {
            let profile = f.store.profile(user).await.unwrap().unwrap();
            assert!(profile.memberships.is_empty());
        }
        assert_eq!(
            f.sink.events(),
            vec![RealtimeEvent::AuctionDeleted { auction_id: id }]
        );
    }

    #[tokio::test]
    async fn concurrent_bids_are_strictly_increasing() {
        let f = fixture_with(EngineSettings {
            timing: LotTiming::default(),
            persist_retries: 3,
        })
        .await;
        let id = f.engine.create_auction("host", create(1000)).await.unwrap().id;
        f.engine.join(id, "a").await.unwrap();
        f.engine.join(id, "b").await.unwrap();
        f.engine.start(id, "host").await.unwrap();
        f.engine
            .nominate(
                id,
                "host",
                NominatePlayerCommand {
                    player_id: f.player_id,
                },
            )
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for amount in 10..60 {
            let engine = f.engine.clone();
            let user = if amount % 2 == 0 { "a" } else { "b" };
            let player_id = f.player_id;
            tasks.push(tokio::spawn(async move {
                engine.place_bid(id, user, bid(player_id, amount)).await
            }));
        }
        for task in tasks {
            let _ = task.await.unwrap();
        }

        let lot = f.engine.get_auction(id).await.unwrap().current_player.unwrap();
        assert!(!lot.bids.is_empty());
        assert!(lot.bids.windows(2).all(|w| w[0].amount < w[1].amount));
    }

    #[tokio::test]
    async fn expired_lot_is_closed_by_timer_only_after_deadline() {
        let f = fixture_with(EngineSettings {
            timing: LotTiming {
                window: Duration::zero(),
                bid_extension: Duration::zero(),
            },
            persist_retries: 3,
        })
        .await;
        let id = running_auction(&f).await;
        f.engine.place_bid(id, "a", bid(f.player_id, 40)).await.unwrap();

        let sale = f.engine.close_expired(id).await.unwrap().unwrap();
        assert_eq!(sale.winner, "a");
        assert_eq!(sale.price, 40);
        let auction = f.engine.get_auction(id).await.unwrap();
        assert!(auction.current_player.is_none());
        assert_eq!(auction.participant("a").unwrap().remaining_coins, 60);
    }

    #[tokio::test]
    async fn open_lot_is_not_closed_by_timer() {
        let f = fixture().await;
        let id = running_auction(&f).await;
        assert!(matches!(
            f.engine.close_expired(id).await,
            Err(AuctionError::State(_))
        ));
    }

    #[tokio::test]
    async fn nominating_a_player_outside_the_pool_is_rejected() {
        let f = fixture().await;
        let id = f.engine.create_auction("host", create(100)).await.unwrap().id;
        f.engine.start(id, "host").await.unwrap();
        let stranger = f
            .store
            .insert_player("Stranger", Position::Attacker, Tier::Elite)
            .await;

        let err = f
            .engine
            .nominate(
                id,
                "host",
                NominatePlayerCommand {
                    player_id: stranger.id,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuctionError::Validation(_)));
    }

    #[tokio::test]
    async fn end_settles_the_open_lot() {
        let f = fixture().await;
        let id = running_auction(&f).await;
        f.engine.place_bid(id, "b", bid(f.player_id, 12)).await.unwrap();

        let auction = f.engine.end(id, "host").await.unwrap();
        assert_eq!(auction.status, AuctionStatus::Completed);
        assert!(auction.end_time.is_some());
        assert_eq!(auction.participant("b").unwrap().remaining_coins, 88);
        assert!(matches!(
            f.engine.start(id, "host").await,
            Err(AuctionError::State(_))
        ));
    }

    // 다른 경매에서 같은 선수가 먼저 낙찰된 상황
    async fn sell_elsewhere(f: &Fixture, buyer: &str) -> AuctionId {
        let other = f.engine.create_auction("host", create(100)).await.unwrap();
        let mut next = other.clone();
        next.version += 1;
        f.store
            .commit(
                &next,
                other.version,
                &[LinkageChange::Acquired {
                    user_id: buyer.into(),
                    player_id: f.player_id,
                    auction_id: other.id,
                    price: 40,
                    acquired_at: Utc::now(),
                }],
            )
            .await
            .unwrap();
        other.id
    }

    #[tokio::test]
    async fn player_open_in_another_auction_cannot_be_nominated() {
        let f = fixture().await;
        let first = running_auction(&f).await;

        let second = f.engine.create_auction("host", create(100)).await.unwrap().id;
        f.engine.join(second, "a").await.unwrap();
        f.engine.start(second, "host").await.unwrap();
        let err = f
            .engine
            .nominate(
                second,
                "host",
                NominatePlayerCommand {
                    player_id: f.player_id,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuctionError::State(_)));
        assert!(f
            .engine
            .get_auction(second)
            .await
            .unwrap()
            .current_player
            .is_none());

        // 첫 경매에서 유찰되면 다시 지명할 수 있다
        f.engine.close_player(first, "host").await.unwrap();
        f.engine
            .nominate(
                second,
                "host",
                NominatePlayerCommand {
                    player_id: f.player_id,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn player_sold_elsewhere_is_never_sold_twice() {
        let f = fixture().await;
        let id = running_auction(&f).await;
        f.engine.place_bid(id, "a", bid(f.player_id, 20)).await.unwrap();
        sell_elsewhere(&f, "b").await;

        let auction = f.engine.close_player(id, "host").await.unwrap();
        assert!(auction.current_player.is_none());
        assert!(auction.auctioned_players.is_empty());
        assert_eq!(auction.participant("a").unwrap().remaining_coins, 100);

        assert!(f.store.profile("a").await.unwrap().unwrap().squad.is_empty());
        assert_eq!(f.store.profile("b").await.unwrap().unwrap().squad.len(), 1);
        let player = f.store.find_player(f.player_id).await.unwrap().unwrap();
        assert_eq!(player.current_owner.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn ending_with_a_lot_sold_elsewhere_completes_unsold() {
        let f = fixture().await;
        let id = running_auction(&f).await;
        f.engine.place_bid(id, "a", bid(f.player_id, 20)).await.unwrap();
        sell_elsewhere(&f, "b").await;

        let auction = f.engine.end(id, "host").await.unwrap();
        assert_eq!(auction.status, AuctionStatus::Completed);
        assert!(auction.auctioned_players.is_empty());
        assert_eq!(auction.participant("a").unwrap().remaining_coins, 100);
    }
}

/// 로트 마감 스케줄러
/// 진행 중이고 일시정지되지 않은 경매 중 현재 선수의 마감 시간이 지난 경매를 찾아 낙찰 처리한다.
/// 실제 상태 전이는 엔진이 수행하므로 호스트 마감과 경합해도 한쪽만 반영된다.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionId, AuctionStatus};
use crate::bidding::commands::AuctionEngine;
use crate::error::{AuctionError, Result};
use crate::registry::AuctionRegistry;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

// endregion: --- Imports

// region:    --- Auction Scheduler
pub struct AuctionScheduler {
    engine: Arc<AuctionEngine>,
    registry: Arc<dyn AuctionRegistry>,
    period: Duration,
}

impl AuctionScheduler {
    pub fn new(engine: Arc<AuctionEngine>, registry: Arc<dyn AuctionRegistry>) -> Self {
        Self {
            engine,
            registry,
            period: Duration::from_secs(1),
        }
    }

    /// 스케줄러 시작 (1초마다 실행)
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = interval(self.period);
            loop {
                interval.tick().await;
                if let Err(e) = self.close_expired_lots().await {
                    error!("{:<12} --> 로트 마감 처리 중 오류 발생: {:?}", "Scheduler", e);
                }
            }
        })
    }

    /// 마감 시간이 지난 로트 정산. 처리한 경매 수를 반환한다.
    pub async fn close_expired_lots(&self) -> Result<usize> {
        let now = Utc::now();
        let due: Vec<AuctionId> = self
            .registry
            .active_auctions()
            .await?
            .iter()
            .filter(|a| lot_expired(a, now))
            .map(|a| a.id)
            .collect();

        let mut closed = 0;
        for id in due {
            match self.engine.close_expired(id).await {
                Ok(_) => closed += 1,
                // 그 사이 호스트가 마감했거나 입찰로 연장된 경우
                Err(AuctionError::State(reason)) => {
                    debug!("{:<12} --> 마감 건너뜀 id: {}, {}", "Scheduler", id, reason)
                }
                Err(e) => error!("{:<12} --> 마감 실패 id: {}, {}", "Scheduler", id, e),
            }
        }
        if closed > 0 {
            info!("{:<12} --> 로트 {}건 마감", "Scheduler", closed);
        }
        Ok(closed)
    }
}

fn lot_expired(auction: &Auction, now: DateTime<Utc>) -> bool {
    auction.status == AuctionStatus::Active
        && !auction.is_paused
        && auction
            .current_player
            .as_ref()
            .map(|lot| lot.deadline <= now)
            .unwrap_or(false)
}

// endregion: --- Auction Scheduler

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::state_machine::LotTiming;
    use crate::bidding::commands::{
        CreateAuctionCommand, EngineSettings, NominatePlayerCommand, PlaceBidCommand,
    };
    use crate::broadcast::{Broadcaster, RecordingSink};
    use crate::catalog::{PlayerCatalog, Position, Tier, MIN_CURATED_POOL};
    use crate::database::memory::MemoryStore;
    use crate::identity::{RosterEntry, UserDirectory};

    async fn setup(window_secs: i64) -> (AuctionScheduler, Arc<AuctionEngine>, AuctionId, i64) {
        let store = Arc::new(MemoryStore::new());
        store
            .provision(&[
                RosterEntry::new("host", "Host", "🎩", "0000").unwrap(),
                RosterEntry::new("a", "Anil", "🦁", "1111").unwrap(),
            ])
            .await
            .unwrap();
        let mut first = None;
        for i in 0..MIN_CURATED_POOL {
            let p = store
                .insert_player(&format!("P{}", i), Position::Defender, Tier::Bronze)
                .await;
            store.add_to_pool("host", p.id).await.unwrap();
            if first.is_none() {
                first = Some(p.id);
            }
        }
        let player_id = first.unwrap();

        let engine = Arc::new(AuctionEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Broadcaster::new(Arc::new(RecordingSink::default())),
            EngineSettings {
                timing: LotTiming {
                    window: chrono::Duration::seconds(window_secs),
                    bid_extension: chrono::Duration::zero(),
                },
                persist_retries: 1,
            },
        ));
        let id = engine
            .create_auction(
                "host",
                CreateAuctionCommand {
                    name: "Timer".into(),
                    ghanta_coins: 100,
                },
            )
            .await
            .unwrap()
            .id;
        engine.join(id, "a").await.unwrap();
        engine.start(id, "host").await.unwrap();
        engine
            .nominate(id, "host", NominatePlayerCommand { player_id })
            .await
            .unwrap();

        let scheduler = AuctionScheduler::new(engine.clone(), store);
        (scheduler, engine, id, player_id)
    }

    #[tokio::test]
    async fn expired_lot_is_sold_to_highest_bidder() {
        let (scheduler, engine, id, player_id) = setup(0).await;
        engine
            .place_bid(id, "a", PlaceBidCommand { player_id, amount: 15 })
            .await
            .unwrap();

        assert_eq!(scheduler.close_expired_lots().await.unwrap(), 1);
        let auction = engine.get_auction(id).await.unwrap();
        assert!(auction.current_player.is_none());
        assert_eq!(auction.auctioned_players[0].winner.user_id, "a");
        assert_eq!(auction.participant("a").unwrap().remaining_coins, 85);
    }

    #[tokio::test]
    async fn open_and_paused_lots_are_left_alone() {
        let (scheduler, engine, id, _) = setup(60).await;
        assert_eq!(scheduler.close_expired_lots().await.unwrap(), 0);

        let (scheduler, engine_b, id_b, _) = setup(0).await;
        engine_b.toggle_pause(id_b, "host").await.unwrap();
        assert_eq!(scheduler.close_expired_lots().await.unwrap(), 0);
        assert!(engine_b
            .get_auction(id_b)
            .await
            .unwrap()
            .current_player
            .is_some());
        assert!(engine.get_auction(id).await.unwrap().current_player.is_some());
    }
}

/// 인메모리 저장소
/// PostgreSQL 저장소와 같은 트레이트를 구현한다. 테스트와 DATABASE_URL 없이 실행할 때 사용한다.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionId, NewAuction, PlayerId};
use crate::catalog::{Player, PlayerCatalog, Position, Tier};
use crate::error::{AuctionError, Result};
use crate::identity::{
    BiggestBid, Membership, RosterEntry, SquadEntry, User, UserDirectory, UserProfile, UserStats,
};
use crate::registry::{AuctionRegistry, LinkageChange, Role};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

// endregion: --- Imports

struct UserRecord {
    user: User,
    stats: UserStats,
    squad: Vec<SquadEntry>,
    memberships: Vec<Membership>,
}

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<String, UserRecord>,
    players: BTreeMap<PlayerId, Player>,
    pools: HashMap<String, BTreeSet<PlayerId>>,
    auctions: BTreeMap<AuctionId, Auction>,
    next_auction_id: AuctionId,
    next_player_id: PlayerId,
}

impl MemoryState {
    fn user_mut(&mut self, id: &str) -> Result<&mut UserRecord> {
        self.users
            .get_mut(id)
            .ok_or_else(|| AuctionError::NotFound(format!("user {}", id)))
    }

    fn apply(&mut self, change: &LinkageChange) -> Result<()> {
        match change {
            LinkageChange::Joined {
                user_id,
                auction_id,
                role,
                joined_at,
            } => {
                let record = self.user_mut(user_id)?;
                if record
                    .memberships
                    .iter()
                    .any(|m| m.auction_id == *auction_id)
                {
                    return Ok(());
                }
                record.memberships.push(Membership {
                    auction_id: *auction_id,
                    role: *role,
                    joined_at: *joined_at,
                });
                record.stats.total_auctions += 1;
                if *role == Role::Host {
                    record.stats.auctions_hosted += 1;
                }
            }
            LinkageChange::Bid { user_id, outbid } => {
                self.user_mut(user_id)?.stats.bid_stats.total_bids += 1;
                if let Some(outbid) = outbid {
                    self.user_mut(outbid)?.stats.bid_stats.outbid_count += 1;
                }
            }
            LinkageChange::Acquired {
                user_id,
                player_id,
                auction_id,
                price,
                acquired_at,
            } => {
                let record = self.user_mut(user_id)?;
                record.squad.push(SquadEntry {
                    player_id: *player_id,
                    auction_id: *auction_id,
                    price: *price,
                    acquired_at: *acquired_at,
                });
                record.stats.players_won += 1;
                record.stats.bid_stats.successful_bids += 1;
                record.stats.total_coins_spent += price;
                if *price > record.stats.biggest_bid.amount {
                    record.stats.biggest_bid = BiggestBid {
                        amount: *price,
                        player_id: Some(*player_id),
                        auction_id: Some(*auction_id),
                    };
                }
                if let Some(player) = self.players.get_mut(player_id) {
                    player.current_owner = Some(user_id.clone());
                }
            }
        }
        Ok(())
    }

    // 반영 전에 모든 변경이 적용 가능한지 확인한다.
    fn check(&self, change: &LinkageChange) -> Result<()> {
        let known = |id: &str| {
            if self.users.contains_key(id) {
                Ok(())
            } else {
                Err(AuctionError::NotFound(format!("user {}", id)))
            }
        };
        match change {
            LinkageChange::Joined { user_id, .. } => known(user_id),
            LinkageChange::Bid { user_id, outbid } => {
                known(user_id)?;
                outbid.as_deref().map_or(Ok(()), known)
            }
            LinkageChange::Acquired {
                user_id, player_id, ..
            } => {
                known(user_id)?;
                match self.players.get(player_id) {
                    Some(player) if player.current_owner.is_some() => {
                        Err(AuctionError::PlayerTaken(*player_id))
                    }
                    Some(_) => Ok(()),
                    None => Err(AuctionError::NotFound(format!("player {}", player_id))),
                }
            }
        }
    }
}

// region:    --- Memory Store
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    failing_writes: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 카탈로그에 선수 추가 (최소 입찰가는 등급 기본값)
    pub async fn insert_player(&self, name: &str, position: Position, tier: Tier) -> Player {
        let mut state = self.state.write().await;
        state.next_player_id += 1;
        let player = Player {
            id: state.next_player_id,
            name: name.to_string(),
            position,
            tier,
            minimum_bid: tier.default_minimum_bid(),
            current_owner: None,
        };
        state.players.insert(player.id, player.clone());
        player
    }

    /// 개발용 선수 카탈로그 생성 (포지션과 등급을 순환)
    pub async fn seed_players(&self, count: i64) -> Vec<Player> {
        const POSITIONS: [Position; 4] = [
            Position::Goalkeeper,
            Position::Defender,
            Position::Midfielder,
            Position::Attacker,
        ];
        const TIERS: [Tier; 4] = [Tier::Bronze, Tier::Silver, Tier::Gold, Tier::Elite];

        let mut players = Vec::new();
        for i in 0..count.max(0) as usize {
            let player = self
                .insert_player(
                    &format!("Player {}", i + 1),
                    POSITIONS[i % POSITIONS.len()],
                    TIERS[(i / POSITIONS.len()) % TIERS.len()],
                )
                .await;
            players.push(player);
        }
        players
    }

    /// 다음 `count`번의 쓰기를 저장소 오류로 실패시킨다.
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<()> {
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(AuctionError::Persistence(
                "simulated storage outage".to_string(),
            ));
        }
        Ok(())
    }
}

// endregion: --- Memory Store

// region:    --- Auction Registry
#[async_trait]
impl AuctionRegistry for MemoryStore {
    async fn insert_auction(&self, draft: NewAuction) -> Result<Auction> {
        self.check_write()?;
        let mut state = self.state.write().await;
        if !state.users.contains_key(&draft.host.user_id) {
            return Err(AuctionError::NotFound(format!("user {}", draft.host.user_id)));
        }
        state.next_auction_id += 1;
        let created_at = draft.created_at;
        let auction = draft.into_auction(state.next_auction_id);
        state.apply(&LinkageChange::Joined {
            user_id: auction.host.user_id.clone(),
            auction_id: auction.id,
            role: Role::Host,
            joined_at: created_at,
        })?;
        state.auctions.insert(auction.id, auction.clone());
        Ok(auction)
    }

    async fn get_auction(&self, id: AuctionId) -> Result<Option<Auction>> {
        Ok(self.state.read().await.auctions.get(&id).cloned())
    }

    async fn list_auctions(&self) -> Result<Vec<Auction>> {
        Ok(self
            .state
            .read()
            .await
            .auctions
            .values()
            .rev()
            .cloned()
            .collect())
    }

    async fn active_auctions(&self) -> Result<Vec<Auction>> {
        Ok(self
            .state
            .read()
            .await
            .auctions
            .values()
            .filter(|a| a.status == crate::auction::model::AuctionStatus::Active)
            .cloned()
            .collect())
    }

    async fn commit(
        &self,
        auction: &Auction,
        expected_version: i64,
        linkage: &[LinkageChange],
    ) -> Result<()> {
        self.check_write()?;
        let mut state = self.state.write().await;
        let stored_version = state
            .auctions
            .get(&auction.id)
            .map(|a| a.version)
            .ok_or_else(|| AuctionError::NotFound(format!("auction {}", auction.id)))?;
        if stored_version != expected_version {
            return Err(AuctionError::Conflict(auction.id));
        }
        for change in linkage {
            state.check(change)?;
        }

        for change in linkage {
            state.apply(change)?;
        }
        state.auctions.insert(auction.id, auction.clone());
        Ok(())
    }

    async fn delete_auction(&self, id: AuctionId, expected_version: i64) -> Result<()> {
        self.check_write()?;
        let mut state = self.state.write().await;
        match state.auctions.get(&id) {
            None => return Err(AuctionError::NotFound(format!("auction {}", id))),
            Some(a) if a.version != expected_version => return Err(AuctionError::Conflict(id)),
            Some(_) => {}
        }
        state.auctions.remove(&id);
        for record in state.users.values_mut() {
            record.memberships.retain(|m| m.auction_id != id);
        }
        Ok(())
    }
}

// endregion: --- Auction Registry

// region:    --- User Directory
#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .get(id)
            .map(|r| r.user.clone()))
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().map(|r| r.user.clone()).collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn verify_pin(&self, id: &str, pin: &str) -> Result<bool> {
        let state = self.state.read().await;
        let record = state
            .users
            .get(id)
            .ok_or_else(|| AuctionError::NotFound(format!("user {}", id)))?;
        Ok(record.user.pin == pin)
    }

    async fn set_online(&self, id: &str, online: bool) -> Result<()> {
        let mut state = self.state.write().await;
        state.user_mut(id)?.user.is_logged_in = online;
        Ok(())
    }

    async fn online_count(&self) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.users.values().filter(|r| r.user.is_logged_in).count() as i64)
    }

    async fn profile(&self, id: &str) -> Result<Option<UserProfile>> {
        let state = self.state.read().await;
        Ok(state.users.get(id).map(|r| UserProfile {
            user: r.user.clone(),
            squad: r.squad.clone(),
            memberships: r.memberships.clone(),
            stats: r.stats.clone().with_squad(&r.squad),
        }))
    }

    async fn provision(&self, roster: &[RosterEntry]) -> Result<()> {
        let mut state = self.state.write().await;
        for entry in roster {
            let user = User {
                id: entry.id.clone(),
                name: entry.name.clone(),
                emoji: entry.emoji.clone(),
                pin: entry.pin.clone(),
                is_logged_in: false,
            };
            match state.users.get_mut(&entry.id) {
                Some(record) => record.user = user,
                None => {
                    state.users.insert(
                        entry.id.clone(),
                        UserRecord {
                            user,
                            stats: UserStats::default(),
                            squad: Vec::new(),
                            memberships: Vec::new(),
                        },
                    );
                }
            }
        }
        for record in state.users.values_mut() {
            record.user.is_logged_in = false;
        }
        Ok(())
    }
}

// endregion: --- User Directory

// region:    --- Player Catalog
#[async_trait]
impl PlayerCatalog for MemoryStore {
    async fn find_player(&self, id: PlayerId) -> Result<Option<Player>> {
        Ok(self.state.read().await.players.get(&id).cloned())
    }

    async fn count_curated_pool(&self, user_id: &str) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.pools.get(user_id).map(|p| p.len()).unwrap_or(0) as i64)
    }

    async fn is_curated(&self, user_id: &str, player_id: PlayerId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .pools
            .get(user_id)
            .map(|p| p.contains(&player_id))
            .unwrap_or(false))
    }

    async fn curated_pool(&self, user_id: &str) -> Result<Vec<Player>> {
        let state = self.state.read().await;
        Ok(state
            .pools
            .get(user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.players.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_to_pool(&self, user_id: &str, player_id: PlayerId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.players.contains_key(&player_id) {
            return Err(AuctionError::NotFound(format!("player {}", player_id)));
        }
        if !state.users.contains_key(user_id) {
            return Err(AuctionError::NotFound(format!("user {}", user_id)));
        }
        if !state
            .pools
            .entry(user_id.to_string())
            .or_default()
            .insert(player_id)
        {
            return Err(AuctionError::Validation(
                "Player already in auction list".to_string(),
            ));
        }
        Ok(())
    }

    async fn remove_from_pool(&self, user_id: &str, player_id: PlayerId) -> Result<()> {
        let mut state = self.state.write().await;
        let removed = state
            .pools
            .get_mut(user_id)
            .map(|p| p.remove(&player_id))
            .unwrap_or(false);
        if !removed {
            return Err(AuctionError::NotFound(format!(
                "player {} in auction list",
                player_id
            )));
        }
        Ok(())
    }
}

// endregion: --- Player Catalog

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::model::Member;
    use chrono::Utc;

    async fn store_with_host() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .provision(&[RosterEntry::new("host", "Host", "🎩", "0000").unwrap()])
            .await
            .unwrap();
        store
    }

    fn draft() -> NewAuction {
        NewAuction {
            name: "Sunday league".into(),
            host: Member {
                user_id: "host".into(),
                name: "Host".into(),
                emoji: "🎩".into(),
            },
            ghanta_coins_per_user: 200,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn stale_version_commit_is_rejected() {
        let store = store_with_host().await;
        let auction = store.insert_auction(draft()).await.unwrap();

        let mut next = auction.clone();
        next.version = 2;
        next.name = "renamed".into();
        store.commit(&next, 1, &[]).await.unwrap();

        let mut stale = auction.clone();
        stale.version = 2;
        assert!(matches!(
            store.commit(&stale, 1, &[]).await,
            Err(AuctionError::Conflict(_))
        ));
        let stored = store.get_auction(auction.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "renamed");
    }

    #[tokio::test]
    async fn creating_an_auction_links_the_host() {
        let store = store_with_host().await;
        let auction = store.insert_auction(draft()).await.unwrap();

        let profile = store.profile("host").await.unwrap().unwrap();
        assert_eq!(profile.memberships.len(), 1);
        assert_eq!(profile.memberships[0].auction_id, auction.id);
        assert_eq!(profile.memberships[0].role, Role::Host);
        assert_eq!(profile.stats.auctions_hosted, 1);
        assert_eq!(profile.stats.total_auctions, 1);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_one_write_at_a_time() {
        let store = store_with_host().await;
        store.fail_next_writes(1);
        assert!(matches!(
            store.insert_auction(draft()).await,
            Err(AuctionError::Persistence(_))
        ));
        assert!(store.insert_auction(draft()).await.is_ok());
    }

    #[tokio::test]
    async fn owned_player_cannot_be_acquired_again() {
        let store = store_with_host().await;
        store
            .provision(&[RosterEntry::new("b", "Bala", "🐯", "2222").unwrap()])
            .await
            .unwrap();
        let player = store
            .insert_player("Striker", Position::Attacker, Tier::Silver)
            .await;
        let first = store.insert_auction(draft()).await.unwrap();
        let second = store.insert_auction(draft()).await.unwrap();
        let acquired = |user_id: &str, auction_id| LinkageChange::Acquired {
            user_id: user_id.into(),
            player_id: player.id,
            auction_id,
            price: 30,
            acquired_at: Utc::now(),
        };

        let mut next = first.clone();
        next.version = 2;
        store
            .commit(&next, 1, &[acquired("host", first.id)])
            .await
            .unwrap();

        let mut next = second.clone();
        next.version = 2;
        next.name = "second sale".into();
        assert!(matches!(
            store.commit(&next, 1, &[acquired("b", second.id)]).await,
            Err(AuctionError::PlayerTaken(id)) if id == player.id
        ));

        let stored = store.get_auction(second.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_ne!(stored.name, "second sale");
        assert!(store.profile("b").await.unwrap().unwrap().squad.is_empty());
        let owner = store.find_player(player.id).await.unwrap().unwrap().current_owner;
        assert_eq!(owner.as_deref(), Some("host"));
    }

    #[tokio::test]
    async fn curated_pool_rejects_duplicates() {
        let store = store_with_host().await;
        let player = store
            .insert_player("Keeper", Position::Goalkeeper, Tier::Gold)
            .await;
        assert_eq!(player.minimum_bid, 50);

        store.add_to_pool("host", player.id).await.unwrap();
        assert!(matches!(
            store.add_to_pool("host", player.id).await,
            Err(AuctionError::Validation(_))
        ));
        assert_eq!(store.count_curated_pool("host").await.unwrap(), 1);

        store.remove_from_pool("host", player.id).await.unwrap();
        assert!(matches!(
            store.remove_from_pool("host", player.id).await,
            Err(AuctionError::NotFound(_))
        ));
    }
}

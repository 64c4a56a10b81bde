/// PostgreSQL 저장소
/// 경매 한 건은 한 행에 저장하고, 커밋은 버전 비교 후 참가 연결과 함께 한 트랜잭션으로 반영한다.
// region:    --- Imports
use super::DatabaseManager;
use crate::auction::model::{
    Auction, AuctionId, AuctionStatus, AuctionedPlayer, Lot, Member, NewAuction, Participant,
    PlayerId,
};
use crate::catalog::{Player, PlayerCatalog, Position, Tier};
use crate::error::{AuctionError, Result};
use crate::identity::{
    BidStats, BiggestBid, Membership, RosterEntry, SquadEntry, User, UserDirectory, UserProfile,
    UserStats,
};
use crate::query::queries;
use crate::registry::{AuctionRegistry, LinkageChange, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Rows
#[derive(sqlx::FromRow)]
struct AuctionRow {
    id: i64,
    name: String,
    host_id: String,
    host_name: String,
    host_emoji: String,
    status: String,
    is_paused: bool,
    ghanta_coins_per_user: i64,
    participants: Json<Vec<Participant>>,
    current_player: Option<Json<Lot>>,
    auctioned_players: Json<Vec<AuctionedPlayer>>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<AuctionRow> for Auction {
    type Error = AuctionError;

    fn try_from(row: AuctionRow) -> Result<Self> {
        let status = AuctionStatus::parse(&row.status).ok_or_else(|| {
            AuctionError::Persistence(format!("unknown auction status {}", row.status))
        })?;
        Ok(Auction {
            id: row.id,
            name: row.name,
            host: Member {
                user_id: row.host_id,
                name: row.host_name,
                emoji: row.host_emoji,
            },
            status,
            is_paused: row.is_paused,
            ghanta_coins_per_user: row.ghanta_coins_per_user,
            participants: row.participants.0,
            current_player: row.current_player.map(|lot| lot.0),
            auctioned_players: row.auctioned_players.0,
            start_time: row.start_time,
            end_time: row.end_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    emoji: String,
    pin: String,
    is_logged_in: bool,
    total_auctions: i64,
    auctions_hosted: i64,
    players_won: i64,
    total_coins_spent: i64,
    biggest_bid_amount: i64,
    biggest_bid_player: Option<i64>,
    biggest_bid_auction: Option<i64>,
    total_bids: i64,
    outbid_count: i64,
}

impl UserRow {
    fn into_parts(self) -> (User, UserStats) {
        let stats = UserStats {
            total_auctions: self.total_auctions,
            auctions_hosted: self.auctions_hosted,
            players_won: self.players_won,
            total_coins_spent: self.total_coins_spent,
            average_coins_spent: 0.0,
            biggest_bid: BiggestBid {
                amount: self.biggest_bid_amount,
                player_id: self.biggest_bid_player,
                auction_id: self.biggest_bid_auction,
            },
            bid_stats: BidStats {
                total_bids: self.total_bids,
                successful_bids: self.players_won,
                outbid_count: self.outbid_count,
            },
            frequently_bought_players: Vec::new(),
        };
        let user = User {
            id: self.id,
            name: self.name,
            emoji: self.emoji,
            pin: self.pin,
            is_logged_in: self.is_logged_in,
        };
        (user, stats)
    }
}

#[derive(sqlx::FromRow)]
struct PlayerRow {
    id: i64,
    name: String,
    position: String,
    tier: String,
    minimum_bid: i64,
    current_owner: Option<String>,
}

impl TryFrom<PlayerRow> for Player {
    type Error = AuctionError;

    fn try_from(row: PlayerRow) -> Result<Self> {
        let position = Position::parse(&row.position).ok_or_else(|| {
            AuctionError::Persistence(format!("unknown position {}", row.position))
        })?;
        let tier = Tier::parse(&row.tier)
            .ok_or_else(|| AuctionError::Persistence(format!("unknown tier {}", row.tier)))?;
        Ok(Player {
            id: row.id,
            name: row.name,
            position,
            tier,
            minimum_bid: row.minimum_bid,
            current_owner: row.current_owner,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
    auction_id: i64,
    role: String,
    joined_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = AuctionError;

    fn try_from(row: MembershipRow) -> Result<Self> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| AuctionError::Persistence(format!("unknown role {}", row.role)))?;
        Ok(Membership {
            auction_id: row.auction_id,
            role,
            joined_at: row.joined_at,
        })
    }
}

// endregion: --- Rows

// region:    --- Linkage
async fn apply_linkage(conn: &mut PgConnection, change: &LinkageChange) -> Result<()> {
    match change {
        LinkageChange::Joined {
            user_id,
            auction_id,
            role,
            joined_at,
        } => {
            let inserted = sqlx::query(queries::INSERT_MEMBERSHIP)
                .bind(user_id)
                .bind(auction_id)
                .bind(role.as_str())
                .bind(joined_at)
                .execute(&mut *conn)
                .await?
                .rows_affected();
            if inserted == 1 {
                let hosted: i64 = if *role == Role::Host { 1 } else { 0 };
                sqlx::query(queries::BUMP_PARTICIPATION)
                    .bind(user_id)
                    .bind(hosted)
                    .execute(&mut *conn)
                    .await?;
            }
        }
        LinkageChange::Bid { user_id, outbid } => {
            sqlx::query(queries::RECORD_BID)
                .bind(user_id)
                .execute(&mut *conn)
                .await?;
            if let Some(outbid) = outbid {
                sqlx::query(queries::RECORD_OUTBID)
                    .bind(outbid)
                    .execute(&mut *conn)
                    .await?;
            }
        }
        LinkageChange::Acquired {
            user_id,
            player_id,
            auction_id,
            price,
            acquired_at,
        } => {
            let claimed = sqlx::query(queries::CLAIM_PLAYER)
                .bind(player_id)
                .bind(user_id)
                .execute(&mut *conn)
                .await?
                .rows_affected();
            if claimed == 0 {
                return Err(AuctionError::PlayerTaken(*player_id));
            }
            sqlx::query(queries::INSERT_SQUAD_ENTRY)
                .bind(user_id)
                .bind(player_id)
                .bind(auction_id)
                .bind(price)
                .bind(acquired_at)
                .execute(&mut *conn)
                .await?;
            sqlx::query(queries::RECORD_ACQUISITION)
                .bind(user_id)
                .bind(price)
                .bind(player_id)
                .bind(auction_id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

// 버전 불일치 원인 구분 (삭제됨 / 다른 작업이 먼저 반영됨)
async fn version_mismatch(conn: &mut PgConnection, id: AuctionId) -> AuctionError {
    match sqlx::query_scalar::<_, i64>(queries::GET_AUCTION_VERSION)
        .bind(id)
        .fetch_optional(conn)
        .await
    {
        Ok(Some(_)) => AuctionError::Conflict(id),
        Ok(None) => AuctionError::NotFound(format!("auction {}", id)),
        Err(e) => e.into(),
    }
}

// endregion: --- Linkage

// region:    --- Pg Store
pub struct PgStore {
    db: Arc<DatabaseManager>,
}

impl PgStore {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    async fn user_row(&self, id: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as::<_, UserRow>(&queries::get_user())
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?)
    }
}

// endregion: --- Pg Store

// region:    --- Auction Registry
#[async_trait]
impl AuctionRegistry for PgStore {
    async fn insert_auction(&self, draft: NewAuction) -> Result<Auction> {
        self.db
            .transaction(move |tx| {
                Box::pin(async move {
                    let id: i64 = sqlx::query_scalar(queries::INSERT_AUCTION)
                        .bind(&draft.name)
                        .bind(&draft.host.user_id)
                        .bind(&draft.host.name)
                        .bind(&draft.host.emoji)
                        .bind(draft.ghanta_coins_per_user)
                        .bind(draft.created_at)
                        .fetch_one(&mut **tx)
                        .await?;
                    apply_linkage(
                        &mut **tx,
                        &LinkageChange::Joined {
                            user_id: draft.host.user_id.clone(),
                            auction_id: id,
                            role: Role::Host,
                            joined_at: draft.created_at,
                        },
                    )
                    .await?;
                    info!("{:<12} --> 경매 저장 완료 id: {}", "PgStore", id);
                    Ok::<_, AuctionError>(draft.into_auction(id))
                })
            })
            .await
    }

    async fn get_auction(&self, id: AuctionId) -> Result<Option<Auction>> {
        sqlx::query_as::<_, AuctionRow>(&queries::get_auction())
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .map(Auction::try_from)
            .transpose()
    }

    async fn list_auctions(&self) -> Result<Vec<Auction>> {
        sqlx::query_as::<_, AuctionRow>(&queries::list_auctions())
            .fetch_all(self.db.pool())
            .await?
            .into_iter()
            .map(Auction::try_from)
            .collect()
    }

    async fn active_auctions(&self) -> Result<Vec<Auction>> {
        sqlx::query_as::<_, AuctionRow>(&queries::list_active_auctions())
            .fetch_all(self.db.pool())
            .await?
            .into_iter()
            .map(Auction::try_from)
            .collect()
    }

    async fn commit(
        &self,
        auction: &Auction,
        expected_version: i64,
        linkage: &[LinkageChange],
    ) -> Result<()> {
        let auction = auction.clone();
        let linkage = linkage.to_vec();
        self.db
            .transaction(move |tx| {
                Box::pin(async move {
                    let updated = sqlx::query(queries::UPDATE_AUCTION)
                        .bind(auction.id)
                        .bind(&auction.name)
                        .bind(auction.status.as_str())
                        .bind(auction.is_paused)
                        .bind(Json(&auction.participants))
                        .bind(auction.current_player.as_ref().map(Json))
                        .bind(Json(&auction.auctioned_players))
                        .bind(auction.start_time)
                        .bind(auction.end_time)
                        .bind(auction.updated_at)
                        .bind(auction.version)
                        .bind(expected_version)
                        .execute(&mut **tx)
                        .await?
                        .rows_affected();
                    if updated == 0 {
                        return Err(version_mismatch(&mut **tx, auction.id).await);
                    }
                    for change in &linkage {
                        apply_linkage(&mut **tx, change).await?;
                    }
                    debug!(
                        "{:<12} --> 경매 커밋 id: {}, version: {} -> {}",
                        "PgStore", auction.id, expected_version, auction.version
                    );
                    Ok::<_, AuctionError>(())
                })
            })
            .await
    }

    async fn delete_auction(&self, id: AuctionId, expected_version: i64) -> Result<()> {
        self.db
            .transaction(move |tx| {
                Box::pin(async move {
                    sqlx::query(queries::DELETE_MEMBERSHIPS_FOR_AUCTION)
                        .bind(id)
                        .execute(&mut **tx)
                        .await?;
                    let deleted = sqlx::query(queries::DELETE_AUCTION)
                        .bind(id)
                        .bind(expected_version)
                        .execute(&mut **tx)
                        .await?
                        .rows_affected();
                    if deleted == 0 {
                        return Err(version_mismatch(&mut **tx, id).await);
                    }
                    info!("{:<12} --> 경매 삭제 완료 id: {}", "PgStore", id);
                    Ok::<_, AuctionError>(())
                })
            })
            .await
    }

    async fn ping(&self) -> bool {
        self.db.ping().await
    }
}

// endregion: --- Auction Registry

// region:    --- User Directory
#[async_trait]
impl UserDirectory for PgStore {
    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.user_row(id).await?.map(|row| row.into_parts().0))
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(sqlx::query_as::<_, UserRow>(&queries::list_users())
            .fetch_all(self.db.pool())
            .await?
            .into_iter()
            .map(|row| row.into_parts().0)
            .collect())
    }

    async fn verify_pin(&self, id: &str, pin: &str) -> Result<bool> {
        let user = self
            .find_user(id)
            .await?
            .ok_or_else(|| AuctionError::NotFound(format!("user {}", id)))?;
        Ok(user.pin == pin)
    }

    async fn set_online(&self, id: &str, online: bool) -> Result<()> {
        let updated = sqlx::query(queries::SET_ONLINE)
            .bind(id)
            .bind(online)
            .execute(self.db.pool())
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(AuctionError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    async fn online_count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(queries::COUNT_ONLINE)
            .fetch_one(self.db.pool())
            .await?)
    }

    async fn profile(&self, id: &str) -> Result<Option<UserProfile>> {
        let Some(row) = self.user_row(id).await? else {
            return Ok(None);
        };
        let (user, stats) = row.into_parts();

        let squad = sqlx::query_as::<_, SquadEntry>(queries::GET_SQUAD)
            .bind(id)
            .fetch_all(self.db.pool())
            .await?;
        let memberships = sqlx::query_as::<_, MembershipRow>(queries::GET_MEMBERSHIPS)
            .bind(id)
            .fetch_all(self.db.pool())
            .await?
            .into_iter()
            .map(Membership::try_from)
            .collect::<Result<Vec<_>>>()?;

        let stats = stats.with_squad(&squad);
        Ok(Some(UserProfile {
            user,
            squad,
            memberships,
            stats,
        }))
    }

    async fn provision(&self, roster: &[RosterEntry]) -> Result<()> {
        let roster = roster.to_vec();
        self.db
            .transaction(move |tx| {
                Box::pin(async move {
                    for entry in &roster {
                        sqlx::query(queries::UPSERT_USER)
                            .bind(&entry.id)
                            .bind(&entry.name)
                            .bind(&entry.emoji)
                            .bind(&entry.pin)
                            .execute(&mut **tx)
                            .await?;
                    }
                    sqlx::query(queries::LOGOUT_ALL).execute(&mut **tx).await?;
                    info!("{:<12} --> 사용자 명단 등록: {}명", "PgStore", roster.len());
                    Ok::<_, AuctionError>(())
                })
            })
            .await
    }
}

// endregion: --- User Directory

// region:    --- Player Catalog
#[async_trait]
impl PlayerCatalog for PgStore {
    async fn find_player(&self, id: PlayerId) -> Result<Option<Player>> {
        sqlx::query_as::<_, PlayerRow>(queries::GET_PLAYER)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .map(Player::try_from)
            .transpose()
    }

    async fn count_curated_pool(&self, user_id: &str) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(queries::COUNT_POOL)
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?)
    }

    async fn is_curated(&self, user_id: &str, player_id: PlayerId) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(queries::IS_CURATED)
            .bind(user_id)
            .bind(player_id)
            .fetch_one(self.db.pool())
            .await?)
    }

    async fn curated_pool(&self, user_id: &str) -> Result<Vec<Player>> {
        sqlx::query_as::<_, PlayerRow>(queries::GET_POOL)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?
            .into_iter()
            .map(Player::try_from)
            .collect()
    }

    async fn add_to_pool(&self, user_id: &str, player_id: PlayerId) -> Result<()> {
        if self.find_player(player_id).await?.is_none() {
            return Err(AuctionError::NotFound(format!("player {}", player_id)));
        }
        let inserted = sqlx::query_scalar::<_, i64>(queries::INSERT_POOL)
            .bind(user_id)
            .bind(player_id)
            .fetch_optional(self.db.pool())
            .await?;
        if inserted.is_none() {
            return Err(AuctionError::Validation(
                "Player already in auction list".to_string(),
            ));
        }
        Ok(())
    }

    async fn remove_from_pool(&self, user_id: &str, player_id: PlayerId) -> Result<()> {
        let removed = sqlx::query(queries::DELETE_POOL)
            .bind(user_id)
            .bind(player_id)
            .execute(self.db.pool())
            .await?
            .rows_affected();
        if removed == 0 {
            return Err(AuctionError::NotFound(format!(
                "player {} in auction list",
                player_id
            )));
        }
        Ok(())
    }
}

// endregion: --- Player Catalog

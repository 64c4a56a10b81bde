/// 사용자 디렉터리
/// 고정된 사용자 명단, PIN 로그인, 온라인 상태, 경매 간 누적 통계를 관리한다.
// region:    --- Imports
use crate::auction::model::{AuctionId, Member, PlayerId, UserId};
use crate::error::{AuctionError, Result};
use crate::registry::Role;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// endregion: --- Imports

pub mod presence;

// region:    --- User Model
// 사용자 모델
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub emoji: String,
    #[serde(skip_serializing, default)]
    pub pin: String,
    pub is_logged_in: bool,
}

impl User {
    pub fn member(&self) -> Member {
        Member {
            user_id: self.id.clone(),
            name: self.name.clone(),
            emoji: self.emoji.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiggestBid {
    pub amount: i64,
    pub player_id: Option<PlayerId>,
    pub auction_id: Option<AuctionId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidStats {
    pub total_bids: i64,
    /// 낙찰로 이어진 입찰 수
    pub successful_bids: i64,
    /// 다른 사용자에게 최고 입찰을 빼앗긴 횟수
    pub outbid_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPurchase {
    pub player_id: PlayerId,
    pub count: i64,
    pub total_spent: i64,
}

// 누적 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_auctions: i64,
    pub auctions_hosted: i64,
    pub players_won: i64,
    pub total_coins_spent: i64,
    pub average_coins_spent: f64,
    pub biggest_bid: BiggestBid,
    pub bid_stats: BidStats,
    pub frequently_bought_players: Vec<PlayerPurchase>,
}

impl UserStats {
    /// 스쿼드에서 파생되는 값 (평균 지출, 선수별 구매 횟수) 채우기
    pub fn with_squad(mut self, squad: &[SquadEntry]) -> Self {
        self.average_coins_spent = if squad.is_empty() {
            0.0
        } else {
            self.total_coins_spent as f64 / squad.len() as f64
        };

        let mut purchases: Vec<PlayerPurchase> = Vec::new();
        for entry in squad {
            match purchases.iter_mut().find(|p| p.player_id == entry.player_id) {
                Some(purchase) => {
                    purchase.count += 1;
                    purchase.total_spent += entry.price;
                }
                None => purchases.push(PlayerPurchase {
                    player_id: entry.player_id,
                    count: 1,
                    total_spent: entry.price,
                }),
            }
        }
        purchases.sort_by(|a, b| b.count.cmp(&a.count).then(b.total_spent.cmp(&a.total_spent)));
        self.frequently_bought_players = purchases;
        self
    }
}

// 스쿼드 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SquadEntry {
    pub player_id: PlayerId,
    pub auction_id: AuctionId,
    pub price: i64,
    pub acquired_at: DateTime<Utc>,
}

// 경매 참가 연결
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub auction_id: AuctionId,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub squad: Vec<SquadEntry>,
    pub memberships: Vec<Membership>,
    pub stats: UserStats,
}

/// 시작 시 등록되는 사용자 명단 항목
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: UserId,
    pub name: String,
    pub emoji: String,
    pub pin: String,
}

impl RosterEntry {
    pub fn new(id: &str, name: &str, emoji: &str, pin: &str) -> Result<Self> {
        validate_pin(pin)?;
        if id.trim().is_empty() || name.trim().is_empty() {
            return Err(AuctionError::Validation(
                "user id and name are required".to_string(),
            ));
        }
        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            emoji: emoji.to_string(),
            pin: pin.to_string(),
        })
    }
}

/// PIN은 정확히 4자리 숫자
pub fn validate_pin(pin: &str) -> Result<()> {
    if pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AuctionError::Validation(format!(
            "{} is not a valid 4-digit PIN",
            pin
        )))
    }
}

// endregion: --- User Model

// region:    --- User Directory Trait
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: &str) -> Result<Option<User>>;

    /// 전체 사용자 (PIN 제외하고 직렬화됨)
    async fn list_users(&self) -> Result<Vec<User>>;

    /// 사용자가 없으면 `NotFound`
    async fn verify_pin(&self, id: &str, pin: &str) -> Result<bool>;

    async fn set_online(&self, id: &str, online: bool) -> Result<()>;

    async fn online_count(&self) -> Result<i64>;

    async fn profile(&self, id: &str) -> Result<Option<UserProfile>>;

    /// 명단을 등록하고 모든 사용자를 로그아웃 상태로 초기화한다.
    async fn provision(&self, roster: &[RosterEntry]) -> Result<()>;
}

// endregion: --- User Directory Trait

use crate::bidding::model::Bid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type AuctionId = i64;
pub type PlayerId = i64;
pub type UserId = String;

// 경매 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuctionStatus {
    Pending,
    Active,
    Completed,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Pending => "Pending",
            AuctionStatus::Active => "Active",
            AuctionStatus::Completed => "Completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(AuctionStatus::Pending),
            "Active" => Some(AuctionStatus::Active),
            "Completed" => Some(AuctionStatus::Completed),
            _ => None,
        }
    }
}

/// 경매 기록에 포함되는 사용자 표시 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    pub name: String,
    pub emoji: String,
}

// 경매 참가자
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub name: String,
    pub emoji: String,
    pub remaining_coins: i64,
    pub bids: Vec<Bid>,
}

/// 현재 입찰 중인 선수(로트)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub player_id: PlayerId,
    pub minimum_bid: i64,
    pub nominated_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub bids: Vec<Bid>,
}

impl Lot {
    pub fn highest_bid(&self) -> Option<&Bid> {
        self.bids.last()
    }

    /// 다음 입찰이 넘어야 하는 최소 금액
    pub fn floor(&self) -> i64 {
        let over_highest = self.highest_bid().map(|b| b.amount + 1).unwrap_or(0);
        self.minimum_bid.max(over_highest).max(1)
    }
}

// 낙찰된 선수
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionedPlayer {
    pub player_id: PlayerId,
    pub winning_bid: i64,
    pub winner: Member,
    pub bids: Vec<Bid>,
    /// 지명부터 낙찰까지 걸린 시간(초)
    pub time_elapsed: i64,
}

// 경매 모델
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub name: String,
    pub host: Member,
    pub status: AuctionStatus,
    pub is_paused: bool,
    pub ghanta_coins_per_user: i64,
    pub participants: Vec<Participant>,
    pub current_player: Option<Lot>,
    pub auctioned_players: Vec<AuctionedPlayer>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Auction {
    pub fn is_host(&self, user_id: &str) -> bool {
        self.host.user_id == user_id
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn is_auctioned(&self, player_id: PlayerId) -> bool {
        self.auctioned_players
            .iter()
            .any(|a| a.player_id == player_id)
    }
}

/// 경매 생성 시 저장되는 초기 값
#[derive(Debug, Clone)]
pub struct NewAuction {
    pub name: String,
    pub host: Member,
    pub ghanta_coins_per_user: i64,
    pub created_at: DateTime<Utc>,
}

impl NewAuction {
    pub fn into_auction(self, id: AuctionId) -> Auction {
        Auction {
            id,
            name: self.name,
            host: self.host,
            status: AuctionStatus::Pending,
            is_paused: false,
            ghanta_coins_per_user: self.ghanta_coins_per_user,
            participants: Vec::new(),
            current_player: None,
            auctioned_players: Vec::new(),
            start_time: None,
            end_time: None,
            created_at: self.created_at,
            updated_at: self.created_at,
            version: 1,
        }
    }
}

use crate::auction::model::{AuctionId, PlayerId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 입찰 모델
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub user_id: UserId,
    pub player_id: PlayerId,
    pub amount: i64,
    pub timestamp: DateTime<Utc>,
}

// 입찰 성공 응답
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedBid {
    pub auction_id: AuctionId,
    pub bid: Bid,
    /// 다음 입찰이 넘어야 하는 금액
    pub next_minimum: i64,
    pub remaining_coins: i64,
    pub deadline: DateTime<Utc>,
    pub version: i64,
}

/// 낙찰 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub player_id: PlayerId,
    pub winner: UserId,
    pub price: i64,
}

/// 경매 레지스트리
/// 경매 기록의 영속화, 상태 전이 결과의 원자적 저장, 삭제 시 참가 연결 정리를 담당한다.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionId, NewAuction, PlayerId, UserId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Linkage
/// 사용자의 경매 참여 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Host,
    Participant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Host => "Host",
            Role::Participant => "Participant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Host" => Some(Role::Host),
            "Participant" => Some(Role::Participant),
            _ => None,
        }
    }
}

/// 경매 커밋과 같은 트랜잭션에서 반영되는 사용자 쪽 변경
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkageChange {
    /// 참가 연결 추가 + 누적 참가 수 증가
    Joined {
        user_id: UserId,
        auction_id: AuctionId,
        role: Role,
        joined_at: DateTime<Utc>,
    },
    /// 입찰 통계: 입찰자 입찰 수 증가, 밀려난 직전 최고 입찰자의 outbid 수 증가
    Bid {
        user_id: UserId,
        outbid: Option<UserId>,
    },
    /// 낙찰: 스쿼드 추가, 통계 갱신, 선수 소유자 지정.
    /// 선수에게 이미 소유자가 있으면 `AuctionError::PlayerTaken`, 커밋 전체가 반영되지 않는다.
    Acquired {
        user_id: UserId,
        player_id: PlayerId,
        auction_id: AuctionId,
        price: i64,
        acquired_at: DateTime<Utc>,
    },
}

// endregion: --- Linkage

// region:    --- Auction Registry Trait
#[async_trait]
pub trait AuctionRegistry: Send + Sync {
    /// 새 경매 저장. 호스트 참가 연결과 호스트 통계도 함께 반영한다.
    async fn insert_auction(&self, draft: NewAuction) -> Result<Auction>;

    async fn get_auction(&self, id: AuctionId) -> Result<Option<Auction>>;

    async fn list_auctions(&self) -> Result<Vec<Auction>>;

    /// 진행 중인 경매 (스케줄러용)
    async fn active_auctions(&self) -> Result<Vec<Auction>>;

    /// `expected_version`이 저장된 버전과 같을 때만 `auction`을 저장한다.
    /// 버전이 다르면 `AuctionError::Conflict`, 아무것도 반영되지 않는다.
    /// 경매 행과 `linkage`는 하나의 트랜잭션으로 반영된다.
    async fn commit(
        &self,
        auction: &Auction,
        expected_version: i64,
        linkage: &[LinkageChange],
    ) -> Result<()>;

    /// 경매와 이를 참조하는 모든 참가 연결을 삭제한다.
    async fn delete_auction(&self, id: AuctionId, expected_version: i64) -> Result<()>;

    /// 저장소 연결 상태
    async fn ping(&self) -> bool {
        true
    }
}

// endregion: --- Auction Registry Trait

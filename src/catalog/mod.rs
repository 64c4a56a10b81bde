/// 선수 카탈로그
/// 경매 엔진은 검증 용도로만 조회하며, 낙찰 시 소유자 지정 외에는 변경하지 않는다.
// region:    --- Imports
use crate::auction::model::{PlayerId, UserId};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// endregion: --- Imports

/// 경매를 만들기 위해 필요한 최소 큐레이션 선수 수
pub const MIN_CURATED_POOL: i64 = 50;

// region:    --- Player Model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Elite,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "Bronze",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
            Tier::Elite => "Elite",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Bronze" => Some(Tier::Bronze),
            "Silver" => Some(Tier::Silver),
            "Gold" => Some(Tier::Gold),
            "Elite" => Some(Tier::Elite),
            _ => None,
        }
    }

    /// 등급별 기본 최소 입찰가
    pub fn default_minimum_bid(&self) -> i64 {
        match self {
            Tier::Bronze => 10,
            Tier::Silver => 25,
            Tier::Gold => 50,
            Tier::Elite => 75,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Attacker,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "goalkeeper",
            Position::Defender => "defender",
            Position::Midfielder => "midfielder",
            Position::Attacker => "attacker",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "goalkeeper" => Some(Position::Goalkeeper),
            "defender" => Some(Position::Defender),
            "midfielder" => Some(Position::Midfielder),
            "attacker" => Some(Position::Attacker),
            _ => None,
        }
    }
}

// 선수 모델
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Position,
    pub tier: Tier,
    pub minimum_bid: i64,
    pub current_owner: Option<UserId>,
}

// endregion: --- Player Model

// region:    --- Player Catalog Trait
#[async_trait]
pub trait PlayerCatalog: Send + Sync {
    async fn find_player(&self, id: PlayerId) -> Result<Option<Player>>;

    /// 사용자가 큐레이션한 선수 수
    async fn count_curated_pool(&self, user_id: &str) -> Result<i64>;

    async fn is_curated(&self, user_id: &str, player_id: PlayerId) -> Result<bool>;

    async fn curated_pool(&self, user_id: &str) -> Result<Vec<Player>>;

    /// 이미 포함된 선수면 `Validation` 오류
    async fn add_to_pool(&self, user_id: &str, player_id: PlayerId) -> Result<()>;

    /// 포함되지 않은 선수면 `NotFound` 오류
    async fn remove_from_pool(&self, user_id: &str, player_id: PlayerId) -> Result<()>;
}

// endregion: --- Player Catalog Trait

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_minimums_grow_with_rarity() {
        let tiers = [Tier::Bronze, Tier::Silver, Tier::Gold, Tier::Elite];
        let minimums: Vec<i64> = tiers.iter().map(|t| t.default_minimum_bid()).collect();
        assert_eq!(minimums, vec![10, 25, 50, 75]);
        for t in tiers {
            assert_eq!(Tier::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn position_serializes_lowercase() {
        let json = serde_json::to_string(&Position::Goalkeeper).unwrap();
        assert_eq!(json, "\"goalkeeper\"");
        assert_eq!(Position::parse("attacker"), Some(Position::Attacker));
        assert_eq!(Position::parse("GK"), None);
    }
}

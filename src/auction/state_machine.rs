/// 경매 상태 머신
/// Pending -> Active (일시정지 플래그 토글 가능) -> Completed
/// 모든 전이는 가드를 전부 검증한 뒤에만 상태를 변경한다.
// region:    --- Imports
use super::model::{
    Auction, AuctionStatus, AuctionedPlayer, Lot, Member, Participant, PlayerId,
};
use crate::bidding::model::{Bid, Sale};
use crate::catalog::Player;
use crate::error::{AuctionError, Result};
use crate::registry::{LinkageChange, Role};
use chrono::{DateTime, Duration, Utc};

// endregion: --- Imports

// region:    --- Timing
/// 로트 마감 시간 설정
#[derive(Debug, Clone, Copy)]
pub struct LotTiming {
    /// 지명 또는 재개 후 입찰 가능 시간
    pub window: Duration,
    /// 입찰이 들어오면 마감까지 최소 이 시간은 남긴다
    pub bid_extension: Duration,
}

impl Default for LotTiming {
    fn default() -> Self {
        Self {
            window: Duration::seconds(30),
            bid_extension: Duration::seconds(10),
        }
    }
}

/// 로트 마감 요청 주체
#[derive(Debug, Clone, Copy)]
pub enum CloseTrigger<'a> {
    Host(&'a str),
    Timer,
}

// endregion: --- Timing

// region:    --- Transitions
impl Auction {
    /// 참가
    pub fn join(&mut self, user: &Member, now: DateTime<Utc>) -> Result<LinkageChange> {
        if self.status != AuctionStatus::Pending {
            return Err(AuctionError::State(format!(
                "cannot join an auction that is {}",
                self.status.as_str()
            )));
        }
        if self.participant(&user.user_id).is_some() {
            return Err(AuctionError::State("already joined this auction".to_string()));
        }

        self.participants.push(Participant {
            user_id: user.user_id.clone(),
            name: user.name.clone(),
            emoji: user.emoji.clone(),
            remaining_coins: self.ghanta_coins_per_user,
            bids: Vec::new(),
        });
        Ok(LinkageChange::Joined {
            user_id: user.user_id.clone(),
            auction_id: self.id,
            role: Role::Participant,
            joined_at: now,
        })
    }

    /// 시작
    pub fn start(&mut self, requester: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_host(requester, "start")?;
        if self.status != AuctionStatus::Pending {
            return Err(AuctionError::State(format!(
                "only a pending auction can be started (status: {})",
                self.status.as_str()
            )));
        }

        self.status = AuctionStatus::Active;
        self.is_paused = false;
        self.start_time = Some(now);
        Ok(())
    }

    /// 일시정지/재개 토글. 재개 시 열린 로트의 마감을 다시 잡는다.
    pub fn toggle_pause(
        &mut self,
        requester: &str,
        now: DateTime<Utc>,
        timing: LotTiming,
    ) -> Result<bool> {
        self.ensure_host(requester, "pause or resume")?;
        self.ensure_active()?;

        self.is_paused = !self.is_paused;
        if !self.is_paused {
            if let Some(lot) = self.current_player.as_mut() {
                lot.deadline = now + timing.window;
            }
        }
        Ok(self.is_paused)
    }

    /// 선수 지명. 카탈로그 쪽 검증(큐레이션 여부, 소유자)은 호출자가 먼저 수행한다.
    pub fn nominate(
        &mut self,
        requester: &str,
        player: &Player,
        now: DateTime<Utc>,
        timing: LotTiming,
    ) -> Result<()> {
        self.ensure_host(requester, "nominate players")?;
        self.ensure_accepting()?;
        if let Some(lot) = &self.current_player {
            return Err(AuctionError::State(format!(
                "player {} is still up for bid",
                lot.player_id
            )));
        }
        if self.is_auctioned(player.id) {
            return Err(AuctionError::State(format!(
                "player {} was already auctioned",
                player.id
            )));
        }

        self.current_player = Some(Lot {
            player_id: player.id,
            minimum_bid: player.minimum_bid,
            nominated_at: now,
            deadline: now + timing.window,
            bids: Vec::new(),
        });
        Ok(())
    }

    /// 입찰. 코인은 낙찰 시점에 차감된다.
    pub fn place_bid(
        &mut self,
        user_id: &str,
        player_id: i64,
        amount: i64,
        now: DateTime<Utc>,
        timing: LotTiming,
    ) -> Result<Bid> {
        self.ensure_accepting()?;
        let remaining = self
            .participant(user_id)
            .map(|p| p.remaining_coins)
            .ok_or_else(|| {
                AuctionError::Authorization("only participants can bid".to_string())
            })?;
        let lot = self.current_player.as_ref().ok_or_else(|| {
            AuctionError::State("no player is currently up for bid".to_string())
        })?;
        if lot.player_id != player_id {
            return Err(AuctionError::State(format!(
                "player {} is not up for bid",
                player_id
            )));
        }
        let minimum = lot.floor();
        if amount < minimum {
            return Err(AuctionError::BidTooLow { amount, minimum });
        }
        if amount > remaining {
            return Err(AuctionError::Budget { amount, remaining });
        }

        let bid = Bid {
            user_id: user_id.to_string(),
            player_id,
            amount,
            timestamp: now,
        };
        if let Some(lot) = self.current_player.as_mut() {
            lot.bids.push(bid.clone());
            lot.deadline = lot.deadline.max(now + timing.bid_extension);
        }
        if let Some(p) = self.participants.iter_mut().find(|p| p.user_id == user_id) {
            p.bids.push(bid.clone());
        }
        Ok(bid)
    }

    /// 현재 로트 마감
    pub fn close_player(
        &mut self,
        trigger: CloseTrigger<'_>,
        now: DateTime<Utc>,
    ) -> Result<(Option<Sale>, Option<LinkageChange>)> {
        self.ensure_closable(trigger, now)?;
        Ok(self.settle_lot(now))
    }

    fn ensure_closable(&self, trigger: CloseTrigger<'_>, now: DateTime<Utc>) -> Result<()> {
        match trigger {
            CloseTrigger::Host(requester) => self.ensure_host(requester, "close a player")?,
            CloseTrigger::Timer => {
                if self.is_paused {
                    return Err(AuctionError::State("auction is paused".to_string()));
                }
            }
        }
        self.ensure_active()?;
        let lot = self.current_player.as_ref().ok_or_else(|| {
            AuctionError::State("no player is currently up for bid".to_string())
        })?;
        if matches!(trigger, CloseTrigger::Timer) && lot.deadline > now {
            return Err(AuctionError::State(format!(
                "bidding on player {} is still open",
                lot.player_id
            )));
        }
        Ok(())
    }

    /// 다른 경매에서 먼저 낙찰된 선수의 로트 입찰을 무효로 한다. 이후 마감하면 유찰된다.
    /// 참가자별 입찰 기록은 남는다.
    pub fn void_bids(&mut self, player_id: PlayerId) -> bool {
        match self.current_player.as_mut() {
            Some(lot) if lot.player_id == player_id => {
                lot.bids.clear();
                true
            }
            _ => false,
        }
    }

    /// 현재 로트의 최고 입찰자
    pub fn leading_bidder(&self) -> Option<&str> {
        self.current_player
            .as_ref()
            .and_then(|lot| lot.bids.last())
            .map(|bid| bid.user_id.as_str())
    }

    /// 종료. 열린 로트가 있으면 먼저 정산한다.
    pub fn end(
        &mut self,
        requester: &str,
        now: DateTime<Utc>,
    ) -> Result<(Option<Sale>, Option<LinkageChange>)> {
        self.ensure_host(requester, "end")?;
        self.ensure_active()?;

        let settled = self.settle_lot(now);
        self.status = AuctionStatus::Completed;
        self.is_paused = false;
        self.end_time = Some(now);
        Ok(settled)
    }

    /// 삭제 가능 여부 (호스트 + Pending)
    pub fn ensure_deletable(&self, requester: &str) -> Result<()> {
        self.ensure_host(requester, "delete")?;
        if self.status != AuctionStatus::Pending {
            return Err(AuctionError::State(
                "only pending auctions can be deleted".to_string(),
            ));
        }
        Ok(())
    }

    // 최고 입찰 중 잔액으로 감당 가능한 입찰이 낙찰된다. 입찰이 없으면 유찰.
    fn settle_lot(&mut self, now: DateTime<Utc>) -> (Option<Sale>, Option<LinkageChange>) {
        let Some(lot) = self.current_player.take() else {
            return (None, None);
        };

        let winning = lot.bids.iter().rev().find(|bid| {
            self.participant(&bid.user_id)
                .map(|p| p.remaining_coins >= bid.amount)
                .unwrap_or(false)
        });
        let Some(winning) = winning.cloned() else {
            return (None, None);
        };
        let Some(winner) = self
            .participants
            .iter_mut()
            .find(|p| p.user_id == winning.user_id)
        else {
            return (None, None);
        };

        winner.remaining_coins -= winning.amount;
        let member = Member {
            user_id: winner.user_id.clone(),
            name: winner.name.clone(),
            emoji: winner.emoji.clone(),
        };
        self.auctioned_players.push(AuctionedPlayer {
            player_id: lot.player_id,
            winning_bid: winning.amount,
            winner: member,
            time_elapsed: (now - lot.nominated_at).num_seconds().max(0),
            bids: lot.bids,
        });

        let sale = Sale {
            player_id: lot.player_id,
            winner: winning.user_id.clone(),
            price: winning.amount,
        };
        let linkage = LinkageChange::Acquired {
            user_id: winning.user_id,
            player_id: lot.player_id,
            auction_id: self.id,
            price: winning.amount,
            acquired_at: now,
        };
        (Some(sale), Some(linkage))
    }

    fn ensure_host(&self, requester: &str, action: &str) -> Result<()> {
        if !self.is_host(requester) {
            return Err(AuctionError::Authorization(format!(
                "only the host can {} this auction",
                action
            )));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.status != AuctionStatus::Active {
            return Err(AuctionError::State(format!(
                "auction is {}, not Active",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    fn ensure_accepting(&self) -> Result<()> {
        self.ensure_active()?;
        if self.is_paused {
            return Err(AuctionError::State("auction is paused".to_string()));
        }
        Ok(())
    }
}

// endregion: --- Transitions

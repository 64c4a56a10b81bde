// region:    --- Auctions
const AUCTION_COLUMNS: &str = "id, name, host_id, host_name, host_emoji, status, is_paused, ghanta_coins_per_user, participants, current_player, auctioned_players, start_time, end_time, created_at, updated_at, version";

/// 경매 생성
pub const INSERT_AUCTION: &str = r#"
    INSERT INTO auctions (name, host_id, host_name, host_emoji, status, is_paused, ghanta_coins_per_user, created_at, updated_at, version)
    VALUES ($1, $2, $3, $4, 'Pending', FALSE, $5, $6, $6, 1)
    RETURNING id
"#;

/// 경매 조회
pub fn get_auction() -> String {
    format!("SELECT {} FROM auctions WHERE id = $1", AUCTION_COLUMNS)
}

/// 모든 경매 조회
pub fn list_auctions() -> String {
    format!(
        "SELECT {} FROM auctions ORDER BY created_at DESC, id DESC",
        AUCTION_COLUMNS
    )
}

/// 진행 중인 경매 조회
pub fn list_active_auctions() -> String {
    format!(
        "SELECT {} FROM auctions WHERE status = 'Active' ORDER BY id",
        AUCTION_COLUMNS
    )
}

/// 경매 저장 (버전이 일치할 때만)
pub const UPDATE_AUCTION: &str = r#"
    UPDATE auctions
    SET name = $2, status = $3, is_paused = $4, participants = $5, current_player = $6,
        auctioned_players = $7, start_time = $8, end_time = $9, updated_at = $10, version = $11
    WHERE id = $1 AND version = $12
"#;

/// 경매 버전 조회
pub const GET_AUCTION_VERSION: &str = "SELECT version FROM auctions WHERE id = $1";

/// 경매 삭제 (버전이 일치할 때만)
pub const DELETE_AUCTION: &str = "DELETE FROM auctions WHERE id = $1 AND version = $2";

// endregion: --- Auctions

// region:    --- Linkage
/// 참가 연결 추가
pub const INSERT_MEMBERSHIP: &str = r#"
    INSERT INTO auction_memberships (user_id, auction_id, role, joined_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (user_id, auction_id) DO NOTHING
"#;

/// 경매의 참가 연결 전체 삭제
pub const DELETE_MEMBERSHIPS_FOR_AUCTION: &str =
    "DELETE FROM auction_memberships WHERE auction_id = $1";

/// 참가 통계 증가
pub const BUMP_PARTICIPATION: &str = r#"
    UPDATE users
    SET total_auctions = total_auctions + 1, auctions_hosted = auctions_hosted + $2
    WHERE id = $1
"#;

/// 스쿼드 추가
pub const INSERT_SQUAD_ENTRY: &str = r#"
    INSERT INTO squad_entries (user_id, player_id, auction_id, price, acquired_at)
    VALUES ($1, $2, $3, $4, $5)
"#;

/// 낙찰 통계 반영
pub const RECORD_ACQUISITION: &str = r#"
    UPDATE users
    SET players_won = players_won + 1,
        total_coins_spent = total_coins_spent + $2,
        biggest_bid_player = CASE WHEN $2 > biggest_bid_amount THEN $3 ELSE biggest_bid_player END,
        biggest_bid_auction = CASE WHEN $2 > biggest_bid_amount THEN $4 ELSE biggest_bid_auction END,
        biggest_bid_amount = GREATEST(biggest_bid_amount, $2)
    WHERE id = $1
"#;

/// 선수 소유자 지정. 이미 소유자가 있으면 0행.
pub const CLAIM_PLAYER: &str =
    "UPDATE players SET current_owner = $2 WHERE id = $1 AND current_owner IS NULL";

/// 입찰 수 증가
pub const RECORD_BID: &str = "UPDATE users SET total_bids = total_bids + 1 WHERE id = $1";

/// 최고 입찰을 빼앗긴 횟수 증가
pub const RECORD_OUTBID: &str = "UPDATE users SET outbid_count = outbid_count + 1 WHERE id = $1";

// endregion: --- Linkage

// region:    --- Users
const USER_COLUMNS: &str = "id, name, emoji, pin, is_logged_in, total_auctions, auctions_hosted, players_won, total_coins_spent, biggest_bid_amount, biggest_bid_player, biggest_bid_auction, total_bids, outbid_count";

/// 사용자 조회
pub fn get_user() -> String {
    format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS)
}

/// 모든 사용자 조회
pub fn list_users() -> String {
    format!("SELECT {} FROM users ORDER BY name", USER_COLUMNS)
}

/// 로그인 상태 변경
pub const SET_ONLINE: &str = "UPDATE users SET is_logged_in = $2 WHERE id = $1";

/// 접속자 수
pub const COUNT_ONLINE: &str = "SELECT COUNT(*) AS online FROM users WHERE is_logged_in";

/// 명단 등록
pub const UPSERT_USER: &str = r#"
    INSERT INTO users (id, name, emoji, pin, is_logged_in)
    VALUES ($1, $2, $3, $4, FALSE)
    ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, emoji = EXCLUDED.emoji, pin = EXCLUDED.pin
"#;

/// 전체 로그아웃
pub const LOGOUT_ALL: &str = "UPDATE users SET is_logged_in = FALSE";

/// 스쿼드 조회
pub const GET_SQUAD: &str = r#"
    SELECT player_id, auction_id, price, acquired_at
    FROM squad_entries
    WHERE user_id = $1
    ORDER BY acquired_at
"#;

/// 참가 연결 조회
pub const GET_MEMBERSHIPS: &str = r#"
    SELECT auction_id, role, joined_at
    FROM auction_memberships
    WHERE user_id = $1
    ORDER BY joined_at
"#;

// endregion: --- Users

// region:    --- Players
/// 선수 조회
pub const GET_PLAYER: &str =
    "SELECT id, name, position, tier, minimum_bid, current_owner FROM players WHERE id = $1";

/// 큐레이션 선수 수
pub const COUNT_POOL: &str = "SELECT COUNT(*) AS pool_size FROM curated_players WHERE user_id = $1";

/// 큐레이션 여부
pub const IS_CURATED: &str =
    "SELECT EXISTS(SELECT 1 FROM curated_players WHERE user_id = $1 AND player_id = $2) AS curated";

/// 큐레이션 목록
pub const GET_POOL: &str = r#"
    SELECT p.id, p.name, p.position, p.tier, p.minimum_bid, p.current_owner
    FROM curated_players c
    JOIN players p ON p.id = c.player_id
    WHERE c.user_id = $1
    ORDER BY c.created_at
"#;

/// 큐레이션 추가
pub const INSERT_POOL: &str = r#"
    INSERT INTO curated_players (user_id, player_id)
    VALUES ($1, $2)
    ON CONFLICT (user_id, player_id) DO NOTHING
    RETURNING player_id
"#;

/// 큐레이션 제거
pub const DELETE_POOL: &str = "DELETE FROM curated_players WHERE user_id = $1 AND player_id = $2";

// endregion: --- Players

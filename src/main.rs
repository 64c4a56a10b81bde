// region:    --- Imports
use chrono::Duration;
use ghanta_auction::app::{self, AppState};
use ghanta_auction::auction::state_machine::LotTiming;
use ghanta_auction::bidding::commands::EngineSettings;
use ghanta_auction::broadcast::{EventSink, RoomHub};
use ghanta_auction::catalog::PlayerCatalog;
use ghanta_auction::config::Config;
use ghanta_auction::database::memory::MemoryStore;
use ghanta_auction::database::postgres::PgStore;
use ghanta_auction::database::DatabaseManager;
use ghanta_auction::identity::UserDirectory;
use ghanta_auction::message_broker::{KafkaManager, KafkaRelay};
use ghanta_auction::registry::AuctionRegistry;
use ghanta_auction::scheduler::AuctionScheduler;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

// endregion: --- Imports

type Stores = (
    Arc<dyn AuctionRegistry>,
    Arc<dyn UserDirectory>,
    Arc<dyn PlayerCatalog>,
);

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    // 저장소 선택 (DATABASE_URL 없으면 인메모리)
    let (registry, directory, catalog) = open_stores(&config).await?;
    directory.provision(&config.roster).await?;
    info!(
        "{:<12} --> 사용자 명단 등록 완료: {}명",
        "Main",
        config.roster.len()
    );

    // 이벤트 전달 경로 (KAFKA_BROKERS 있으면 Kafka 경유)
    let hub = Arc::new(RoomHub::new());
    let sink: Arc<dyn EventSink> = match &config.kafka_brokers {
        Some(brokers) => start_kafka_relay(brokers, &config.events_topic, Arc::clone(&hub)).await?,
        None => {
            info!("{:<12} --> Kafka 미사용, 로컬 허브로 전달", "Main");
            Arc::clone(&hub) as Arc<dyn EventSink>
        }
    };

    let settings = EngineSettings {
        timing: LotTiming {
            window: Duration::seconds(config.lot_window_secs),
            bid_extension: Duration::seconds(config.bid_extension_secs),
        },
        persist_retries: config.persist_retries,
    };
    let state = AppState::new(registry, directory, catalog, hub, sink, settings);

    // 로트 마감 스케줄러
    let _scheduler =
        AuctionScheduler::new(Arc::clone(&state.engine), Arc::clone(&state.registry)).start();

    let routes_all = app::router(state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}

async fn open_stores(config: &Config) -> Result<Stores, Box<dyn std::error::Error>> {
    let Some(url) = &config.database_url else {
        warn!(
            "{:<12} --> DATABASE_URL 미설정, 인메모리 저장소 사용 (재시작 시 초기화됨)",
            "Main"
        );
        let store = Arc::new(MemoryStore::new());
        let players = store.seed_players(config.seed_players).await;
        info!("{:<12} --> 선수 {}명 생성", "Main", players.len());
        return Ok(stores(store));
    };

    let db_manager = Arc::new(DatabaseManager::new(url, config.db_max_connections).await?);
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    Ok(stores(Arc::new(PgStore::new(db_manager))))
}

fn stores<S>(store: Arc<S>) -> Stores
where
    S: AuctionRegistry + UserDirectory + PlayerCatalog + 'static,
{
    let registry: Arc<dyn AuctionRegistry> = store.clone();
    let directory: Arc<dyn UserDirectory> = store.clone();
    let catalog: Arc<dyn PlayerCatalog> = store;
    (registry, directory, catalog)
}

async fn start_kafka_relay(
    brokers: &str,
    topic: &str,
    hub: Arc<RoomHub>,
) -> Result<Arc<dyn EventSink>, Box<dyn std::error::Error>> {
    let kafka_manager = KafkaManager::new(brokers);
    kafka_manager.create_topic(topic, 5, 1).await?;

    // 인스턴스마다 다른 그룹으로 구독해야 모든 인스턴스가 이벤트를 받는다
    let group_id = format!("auction-hub-{}", std::process::id());
    let consumer = kafka_manager.consumer(&group_id)?;
    let consume_topic = topic.to_string();
    tokio::spawn(async move {
        if let Err(e) = consumer.relay_to_hub(&consume_topic, hub).await {
            error!("{:<12} --> Kafka 구독 실패: {:?}", "Main", e);
        }
    });

    let (relay, _) = KafkaRelay::spawn(kafka_manager.producer()?, topic.to_string());
    info!("{:<12} --> Kafka 릴레이 시작: topic={}", "Main", topic);
    Ok(Arc::new(relay))
}

// endregion: --- Main

/// Kafka 이벤트 릴레이
/// 여러 인스턴스가 같은 경매 이벤트를 받도록 실시간 이벤트를 토픽에 싣고, 각 인스턴스가 구독해서 로컬 허브로 전달한다.
/// 키는 경매 ID라서 같은 경매의 이벤트는 같은 파티션에 순서대로 쌓인다.
// region:    --- Imports
use crate::auction::events::RealtimeEvent;
use crate::broadcast::{EventSink, RoomHub};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

// endregion: --- Imports

// region:    --- Kafka Producer
#[derive(Clone)]
pub struct KafkaProducer {
    producer: Arc<FutureProducer>,
}

impl KafkaProducer {
    pub fn new(brokers: &str) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(KafkaProducer {
            producer: Arc::new(producer),
        })
    }

    /// 메시지 전송
    pub async fn send_message(&self, topic: &str, key: &str, value: &str) -> Result<(), String> {
        debug!(
            "{:<12} --> Kafka 메시지 전송: topic={}, key={}",
            "Producer", topic, key
        );
        let record = FutureRecord::to(topic).key(key).payload(value);

        self.producer
            .send(record, Duration::from_secs(0))
            .await
            .map_err(|(e, _)| format!("Error sending message: {:?}", e))?;

        Ok(())
    }
}

// endregion: --- Kafka Producer

// region:    --- Kafka Relay
/// 발행 순서를 보존하는 Kafka 싱크
/// `publish`는 큐에 넣기만 하고, 전송은 단일 태스크가 순서대로 처리한다.
pub struct KafkaRelay {
    queue: mpsc::UnboundedSender<RealtimeEvent>,
}

impl KafkaRelay {
    pub fn spawn(producer: KafkaProducer, topic: String) -> (Self, JoinHandle<()>) {
        let (queue, mut rx) = mpsc::unbounded_channel::<RealtimeEvent>();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!("{:<12} --> 이벤트 직렬화 실패: {:?}", "Producer", e);
                        continue;
                    }
                };
                if let Err(e) = producer
                    .send_message(&topic, &partition_key(&event), &payload)
                    .await
                {
                    error!(
                        "{:<12} --> 이벤트 전송 실패 ({}): {}",
                        "Producer",
                        event.kind(),
                        e
                    );
                }
            }
            info!("{:<12} --> 이벤트 릴레이 종료", "Producer");
        });
        (Self { queue }, handle)
    }
}

impl EventSink for KafkaRelay {
    fn publish(&self, event: RealtimeEvent) {
        if self.queue.send(event).is_err() {
            warn!("{:<12} --> 릴레이가 종료되어 이벤트를 버림", "Producer");
        }
    }
}

/// 경매 이벤트는 경매 ID, 나머지는 종류별 고정 키
pub fn partition_key(event: &RealtimeEvent) -> String {
    match event.auction_id() {
        Some(id) => format!("auction-{}", id),
        None => event.kind().to_string(),
    }
}

// endregion: --- Kafka Relay

// region:    --- Kafka Consumer
pub struct KafkaConsumer {
    consumer: Arc<StreamConsumer>,
}

impl KafkaConsumer {
    /// 인스턴스마다 다른 group id를 써야 모든 인스턴스가 모든 이벤트를 받는다.
    pub fn new(brokers: &str, group_id: &str) -> Result<Self, KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .set("session.timeout.ms", "6000")
            .set("fetch.max.bytes", "5242880")
            .set("allow.auto.create.topics", "true")
            .create()?;

        Ok(KafkaConsumer {
            consumer: Arc::new(consumer),
        })
    }

    /// 토픽의 이벤트를 로컬 허브로 전달
    pub async fn relay_to_hub(&self, topic: &str, hub: Arc<RoomHub>) -> Result<(), KafkaError> {
        info!(
            "{:<12} --> Kafka 이벤트 구독 시작: topic={}",
            "Consumer", topic
        );
        self.consumer.subscribe(&[topic])?;

        loop {
            match self.consumer.recv().await {
                Ok(message) => {
                    debug!(
                        "{:<12} --> 메시지 수신: partition={}, offset={}",
                        "Consumer",
                        message.partition(),
                        message.offset()
                    );
                    let Some(payload) = message.payload() else {
                        warn!("{:<12} --> 빈 페이로드 수신", "Consumer");
                        continue;
                    };
                    match serde_json::from_slice::<RealtimeEvent>(payload) {
                        Ok(event) => hub.fan_out(&event),
                        Err(e) => error!("{:<12} --> deserialize 오류: {:?}", "Consumer", e),
                    }
                }
                Err(e) => error!("{:<12} --> 메시지 수신 오류: {:?}", "Consumer", e),
            }
        }
    }
}

// endregion: --- Kafka Consumer

// region:    --- Kafka Manager
pub struct KafkaManager {
    brokers: String,
}

impl KafkaManager {
    pub fn new(brokers: &str) -> Self {
        KafkaManager {
            brokers: brokers.to_string(),
        }
    }

    /// 토픽 생성 (이미 있으면 무시)
    pub async fn create_topic(
        &self,
        topic_name: &str,
        num_partitions: i32,
        replication_factor: i32,
    ) -> Result<(), String> {
        info!("{:<12} --> Kafka 토픽 생성 시작: {}", "Manager", topic_name);

        let admin_client: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()
            .map_err(|e| format!("AdminClient 생성 실패: {:?}", e))?;

        let new_topic = NewTopic::new(
            topic_name,
            num_partitions,
            TopicReplication::Fixed(replication_factor),
        );

        let results = admin_client
            .create_topics(&[new_topic], &AdminOptions::new())
            .await
            .map_err(|e| format!("토픽 생성 실패: {:?}", e))?;
        for result in results {
            match result {
                Ok(name) => info!("{:<12} --> Kafka 토픽 생성 성공: {}", "Manager", name),
                Err((name, rdkafka::types::RDKafkaErrorCode::TopicAlreadyExists)) => {
                    debug!("{:<12} --> Kafka 토픽 이미 존재: {}", "Manager", name)
                }
                Err((name, code)) => {
                    error!("{:<12} --> Kafka 토픽 생성 실패: {} {:?}", "Manager", name, code);
                    return Err(format!("토픽 생성 실패: {} {:?}", name, code));
                }
            }
        }
        Ok(())
    }

    pub fn producer(&self) -> Result<KafkaProducer, KafkaError> {
        KafkaProducer::new(&self.brokers)
    }

    pub fn consumer(&self, group_id: &str) -> Result<KafkaConsumer, KafkaError> {
        KafkaConsumer::new(&self.brokers, group_id)
    }
}

// endregion: --- Kafka Manager

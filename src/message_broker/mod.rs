/// 클레임 이벤트 발행/구독
/// Kafka 가 설정되면 토픽으로, 아니면 프로세스 내부 채널로 보낸다.
// region:    --- Imports
use crate::claim::events::ClaimEvent;
use crate::config::KafkaConfig;
use crate::error::{AppError, ClaimError};
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

// endregion: --- Imports

// region:    --- Event Publisher

/// 커밋 이후 이벤트 발행
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &ClaimEvent) -> Result<(), ClaimError>;
}

/// 발행 실패는 이미 커밋된 상태를 되돌리지 않으므로 로그만 남긴다
pub async fn publish_all(publisher: &dyn EventPublisher, events: Vec<ClaimEvent>) {
    for event in events {
        if let Err(e) = publisher.publish(&event).await {
            error!(
                "{:<12} --> {} 이벤트 발행 실패: {}",
                "Publisher",
                event.event_type(),
                e
            );
        }
    }
}

/// Kafka 토픽 발행
pub struct KafkaEventPublisher {
    producer: Arc<KafkaProducer>,
    topic: String,
}

impl KafkaEventPublisher {
    pub fn new(producer: Arc<KafkaProducer>, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, event: &ClaimEvent) -> Result<(), ClaimError> {
        let payload =
            serde_json::to_string(event).map_err(|e| ClaimError::Publish(e.to_string()))?;
        self.producer
            .send_message(&self.topic, &event.aggregate_id().to_string(), &payload)
            .await
            .map_err(ClaimError::Publish)
    }
}

/// 프로세스 내부 채널 발행 (Kafka 없이 실행할 때, 테스트)
#[derive(Clone)]
pub struct LocalEventPublisher {
    sender: mpsc::UnboundedSender<ClaimEvent>,
}

impl LocalEventPublisher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClaimEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventPublisher for LocalEventPublisher {
    async fn publish(&self, event: &ClaimEvent) -> Result<(), ClaimError> {
        debug!("{:<12} --> 로컬 이벤트: {}", "Publisher", event.event_type());
        self.sender
            .send(event.clone())
            .map_err(|_| ClaimError::Publish("local event channel closed".to_string()))
    }
}

// endregion: --- Event Publisher

// region:    --- Kafka Producer
#[derive(Clone)]
pub struct KafkaProducer {
    producer: Arc<FutureProducer>,
}

/// KafkaProducer 구현
impl KafkaProducer {
    pub fn new(brokers: &str) -> Result<Self, AppError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| AppError::Kafka(format!("producer creation error: {e}")))?;

        Ok(KafkaProducer {
            producer: Arc::new(producer),
        })
    }

    /// 메시지 전송
    pub async fn send_message(&self, topic: &str, key: &str, value: &str) -> Result<(), String> {
        info!(
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

// region:    --- Kafka Consumer
pub struct KafkaConsumer {
    consumer: Arc<StreamConsumer>,
}

/// KafkaConsumer 구현
impl KafkaConsumer {
    pub fn new(brokers: &str, group_id: &str) -> Result<Self, AppError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .set("allow.auto.create.topics", "true")
            .create()
            .map_err(|e| AppError::Kafka(format!("consumer creation error: {e}")))?;

        Ok(KafkaConsumer {
            consumer: Arc::new(consumer),
        })
    }

    /// 클레임 이벤트 구독. 역직렬화 실패 메시지는 건너뛴다
    pub async fn consume_events<F, Fut>(&self, topic: &str, handler: F) -> Result<(), AppError>
    where
        F: Fn(ClaimEvent) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ClaimError>> + Send + 'static,
    {
        info!(
            "{:<12} --> Kafka 이벤트 구독 시작: topic={}",
            "Consumer", topic
        );
        self.consumer
            .subscribe(&[topic])
            .map_err(|e| AppError::Kafka(e.to_string()))?;

        loop {
            match self.consumer.recv().await {
                Ok(message) => {
                    debug!(
                        "{:<12} --> 메시지 수신: topic={}, partition={}, offset={}",
                        "Consumer",
                        message.topic(),
                        message.partition(),
                        message.offset()
                    );

                    let Some(payload) = message.payload() else {
                        warn!("{:<12} --> 빈 페이로드 수신", "Consumer");
                        continue;
                    };
                    match serde_json::from_slice::<ClaimEvent>(payload) {
                        Ok(event) => {
                            if let Err(e) = handler(event).await {
                                error!("{:<12} --> 이벤트 처리 오류: {}", "Consumer", e);
                            }
                        }
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
    producer: Arc<KafkaProducer>,
    consumer: Arc<KafkaConsumer>,
    config: KafkaConfig,
}

/// KafkaManager 구현
impl KafkaManager {
    pub fn new(config: &KafkaConfig) -> Result<Self, AppError> {
        let producer = Arc::new(KafkaProducer::new(&config.brokers)?);
        let consumer = Arc::new(KafkaConsumer::new(&config.brokers, &config.group_id)?);

        Ok(KafkaManager {
            producer,
            consumer,
            config: config.clone(),
        })
    }

    /// 프로듀서 반환
    pub fn get_producer(&self) -> Arc<KafkaProducer> {
        Arc::clone(&self.producer)
    }

    /// 컨슈머 반환
    pub fn get_consumer(&self) -> Arc<KafkaConsumer> {
        Arc::clone(&self.consumer)
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    pub fn publisher(&self) -> KafkaEventPublisher {
        KafkaEventPublisher::new(self.get_producer(), self.config.topic.clone())
    }

    /// 토픽 생성. 이미 있으면 그대로 둔다
    pub async fn create_topic(
        &self,
        num_partitions: i32,
        replication_factor: i32,
    ) -> Result<(), AppError> {
        let topic_name = self.config.topic.as_str();
        info!("{:<12} --> Kafka 토픽 생성 시작: {}", "Manager", topic_name);

        let admin_client: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.config.brokers)
            .create()
            .map_err(|e| AppError::Kafka(format!("AdminClient 생성 실패: {:?}", e)))?;

        let new_topic = NewTopic::new(
            topic_name,
            num_partitions,
            TopicReplication::Fixed(replication_factor),
        );

        let results = admin_client
            .create_topics(&[new_topic], &AdminOptions::new())
            .await
            .map_err(|e| AppError::Kafka(format!("토픽 생성 실패: {:?}", e)))?;

        for result in results {
            match result {
                Ok(name) => info!("{:<12} --> Kafka 토픽 생성 성공: {}", "Manager", name),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    debug!("{:<12} --> Kafka 토픽 이미 존재: {}", "Manager", name)
                }
                Err((name, code)) => {
                    error!("{:<12} --> Kafka 토픽 생성 실패: {} {:?}", "Manager", name, code);
                    return Err(AppError::Kafka(format!("topic {name}: {code:?}")));
                }
            }
        }
        Ok(())
    }
}

// endregion: --- Kafka Manager

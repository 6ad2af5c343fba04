// region:    --- Imports
use claim_sale_service::config::AppConfig;
use claim_sale_service::database::DatabaseManager;
use claim_sale_service::message_broker::{EventPublisher, KafkaManager, LocalEventPublisher};
use claim_sale_service::notify::{challenge_sender, NotificationProjector};
use claim_sale_service::scheduler::ClaimScheduler;
use claim_sale_service::store::{ClaimStore, InMemoryClaimStore, PgClaimStore};
use claim_sale_service::{router, telemetry, AppError, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::load()?;

    // logging 초기화
    telemetry::init(&config.telemetry)?;
    info!("{:<12} --> 실행 환경: {:?}", "Main", config.environment);

    // 저장소 선택
    let store: Arc<dyn ClaimStore> = match &config.database {
        Some(db_config) => {
            let db_manager = Arc::new(DatabaseManager::connect(db_config).await?);
            if let Err(e) = db_manager.initialize_database().await {
                error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
                return Err(e.into());
            }
            info!("{:<12} --> 데이터베이스 초기화 성공", "Main");
            Arc::new(PgClaimStore::new(db_manager))
        }
        None => {
            warn!(
                "{:<12} --> DATABASE_URL 없음, 메모리 저장소로 실행",
                "Main"
            );
            Arc::new(InMemoryClaimStore::new())
        }
    };

    // 이벤트 발행 + 판매자 알림 구독
    let projector = NotificationProjector::new(Arc::clone(&store));
    let publisher: Arc<dyn EventPublisher> = match &config.kafka {
        Some(kafka_config) => {
            let kafka_manager = KafkaManager::new(kafka_config)?;
            kafka_manager.create_topic(5, 1).await?;
            info!("{:<12} --> Kafka 초기화 성공", "Main");

            let consumer = kafka_manager.get_consumer();
            let topic = kafka_manager.topic().to_string();
            tokio::spawn(async move {
                let result = consumer
                    .consume_events(&topic, move |event| {
                        let projector = projector.clone();
                        async move { projector.project(&event).await.map(|_| ()) }
                    })
                    .await;
                if let Err(e) = result {
                    error!("{:<12} --> 이벤트 구독 종료: {}", "Main", e);
                }
            });
            Arc::new(kafka_manager.publisher())
        }
        None => {
            let (publisher, receiver) = LocalEventPublisher::channel();
            tokio::spawn(projector.run_local(receiver));
            Arc::new(publisher)
        }
    };

    // 정리 스케줄러
    ClaimScheduler::new(
        Arc::clone(&store),
        Arc::clone(&publisher),
        config.scheduler.clone(),
    )
    .start();

    // cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        store,
        publisher,
        challenges: challenge_sender(&config.notify),
        auth: config.auth.clone(),
    };
    let routes_all = router(state).layer(cors);

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
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
// endregion: --- Main

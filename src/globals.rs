use crate::auth::AuthService;
use crate::domains::consultation::repository::LocalConsultationRepository;
use crate::domains::consultation::service::ConsultationService;
use crate::domains::geo::GeocodingService;
use crate::domains::message::repository::LocalMessageRepository;
use crate::domains::message::service::MessageService;
use crate::domains::notification::service::{LogAlertSink, NotificationService};
use crate::domains::report::repository::LocalReportRepository;
use crate::domains::report::service::ReportService;
use crate::domains::user::repository::LocalUserRepository;
use crate::domains::user::service::UserService;
use crate::errors::{ServiceError, ServiceResult};
use crate::events::EventBus;
use crate::store::RecordStore;
use lazy_static::lazy_static;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Global state definitions
lazy_static! {
    static ref INIT_MUTEX: tokio::sync::Mutex<()> = tokio::sync::Mutex::new(());
    static ref INITIALIZED: AtomicBool = AtomicBool::new(false);

    static ref DB_POOL: Mutex<Option<SqlitePool>> = Mutex::new(None);
    static ref RECORD_STORE: Mutex<Option<Arc<RecordStore>>> = Mutex::new(None);
    static ref EVENT_BUS: Mutex<Option<Arc<EventBus>>> = Mutex::new(None);
    static ref NOTIFICATION_SERVICE: Mutex<Option<Arc<NotificationService>>> = Mutex::new(None);
    static ref USER_SERVICE: Mutex<Option<Arc<UserService>>> = Mutex::new(None);
    static ref REPORT_SERVICE: Mutex<Option<Arc<ReportService>>> = Mutex::new(None);
    static ref CONSULTATION_SERVICE: Mutex<Option<Arc<ConsultationService>>> = Mutex::new(None);
    static ref MESSAGE_SERVICE: Mutex<Option<Arc<MessageService>>> = Mutex::new(None);
    static ref GEOCODING_SERVICE: Mutex<Option<Arc<GeocodingService>>> = Mutex::new(None);
}

/// Initialize the shared pool, record store, event bus, and services.
/// Must be called once before any accessor; later calls are no-ops.
pub async fn initialize(db_path: &str, simulated_latency: Option<Duration>) -> ServiceResult<()> {
    let _guard = INIT_MUTEX.lock().await;
    if INITIALIZED.load(Ordering::SeqCst) {
        return Ok(());
    }

    let pool = if db_path == ":memory:" {
        crate::database::connect_in_memory().await
    } else {
        crate::database::connect(db_path).await
    }
    .map_err(|e| ServiceError::Domain(e.into()))?;

    crate::db_migration::initialize_database(&pool)
        .await
        .map_err(|e| ServiceError::Domain(e.into()))?;

    let store = Arc::new(RecordStore::new(pool.clone()));
    let bus = Arc::new(EventBus::new());
    let notifications = Arc::new(NotificationService::new(
        store.clone(),
        Arc::new(LogAlertSink),
    ));
    let auth_service = Arc::new(AuthService::new(simulated_latency));

    let user_repo = Arc::new(LocalUserRepository::new(store.clone()));
    let report_repo = Arc::new(LocalReportRepository::new(store.clone()));
    let consultation_repo = Arc::new(LocalConsultationRepository::new(store.clone()));
    let message_repo = Arc::new(LocalMessageRepository::new(store.clone()));

    let user_service = Arc::new(UserService::new(
        user_repo.clone(),
        auth_service,
        bus.clone(),
    ));
    let report_service = Arc::new(ReportService::new(
        report_repo.clone(),
        consultation_repo.clone(),
        message_repo.clone(),
        user_repo,
        notifications.clone(),
        bus.clone(),
    ));
    let consultation_service = Arc::new(ConsultationService::new(
        consultation_repo,
        report_repo,
        bus.clone(),
    ));
    let message_service = Arc::new(MessageService::new(message_repo, notifications.clone()));
    let geocoding = Arc::new(GeocodingService::new());

    set(&DB_POOL, pool);
    set(&RECORD_STORE, store);
    set(&EVENT_BUS, bus);
    set(&NOTIFICATION_SERVICE, notifications);
    set(&USER_SERVICE, user_service);
    set(&REPORT_SERVICE, report_service);
    set(&CONSULTATION_SERVICE, consultation_service);
    set(&MESSAGE_SERVICE, message_service);
    set(&GEOCODING_SERVICE, geocoding);

    INITIALIZED.store(true, Ordering::SeqCst);
    log::info!("Core initialized with database at {}", db_path);
    Ok(())
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}

pub fn get_db_pool() -> ServiceResult<SqlitePool> {
    get(&DB_POOL, "database pool")
}

pub fn get_record_store() -> ServiceResult<Arc<RecordStore>> {
    get(&RECORD_STORE, "record store")
}

pub fn get_event_bus() -> ServiceResult<Arc<EventBus>> {
    get(&EVENT_BUS, "event bus")
}

pub fn get_notification_service() -> ServiceResult<Arc<NotificationService>> {
    get(&NOTIFICATION_SERVICE, "notification service")
}

pub fn get_user_service() -> ServiceResult<Arc<UserService>> {
    get(&USER_SERVICE, "user service")
}

pub fn get_report_service() -> ServiceResult<Arc<ReportService>> {
    get(&REPORT_SERVICE, "report service")
}

pub fn get_consultation_service() -> ServiceResult<Arc<ConsultationService>> {
    get(&CONSULTATION_SERVICE, "consultation service")
}

pub fn get_message_service() -> ServiceResult<Arc<MessageService>> {
    get(&MESSAGE_SERVICE, "message service")
}

pub fn get_geocoding_service() -> ServiceResult<Arc<GeocodingService>> {
    get(&GEOCODING_SERVICE, "geocoding service")
}

fn set<T>(slot: &Mutex<Option<T>>, value: T) {
    match slot.lock() {
        Ok(mut guard) => *guard = Some(value),
        Err(poisoned) => *poisoned.into_inner() = Some(value),
    }
}

fn get<T: Clone>(slot: &Mutex<Option<T>>, what: &str) -> ServiceResult<T> {
    let guard = match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard
        .clone()
        .ok_or_else(|| ServiceError::NotInitialized(format!("{} is not available", what)))
}

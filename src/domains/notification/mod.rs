pub mod service;
pub mod types;

pub use service::{AlertSink, LogAlertSink, NotificationService};
pub use types::{AppNotification, NotificationType};

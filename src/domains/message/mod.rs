pub mod repository;
pub mod service;
pub mod types;

pub use repository::{LocalMessageRepository, MessageRepository};
pub use service::MessageService;
pub use types::Message;

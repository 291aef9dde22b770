pub mod repository;
pub mod service;
pub mod types;

pub use repository::{ConsultationRepository, LocalConsultationRepository};
pub use service::ConsultationService;
pub use types::{Consultation, ConsultationResponse, ConsultationStatus, LastMessage};

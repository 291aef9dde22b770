pub mod repository;
pub mod service;
pub mod types;

pub use repository::{LocalReportRepository, ReportRepository};
pub use service::ReportService;
pub use types::{
    DoctorResponse, HealthReport, NewHealthReport, ReportLocation, ReportStatus,
    ReportWithSubmitter, ResponseInput, SystemStats, Urgency,
};

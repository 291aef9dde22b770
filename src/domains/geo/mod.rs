pub mod service;
pub mod types;

pub use service::GeocodingService;
pub use types::{BoundingBox, GeoMatch, GeoPoint};

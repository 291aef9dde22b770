pub mod repository;
pub mod service;
pub mod types;

pub use repository::{LocalUserRepository, UserRepository};
pub use service::UserService;
pub use types::{Credentials, DirectoryEntry, NewUser, RegisteredUser, UpdateProfile, User, UserStats};

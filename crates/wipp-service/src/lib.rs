pub mod error;
pub mod gcp;
pub mod memory;
pub mod service;

pub use error::ServiceError;
pub use gcp::{GcpIamService, GcpIamServiceConfig};
pub use memory::{CallCounts, InMemoryService};
pub use service::IdentityService;

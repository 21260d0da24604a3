pub mod error;
pub mod fare;
pub mod handlers;
pub mod models;
pub mod refund;
pub mod service;
pub mod status_machine;

pub use error::RideError;
pub use fare::{FareBreakdown, FareEstimator};
pub use handlers::*;
pub use models::*;
pub use refund::RefundPolicy;
pub use service::RideService;
pub use status_machine::StatusMachine;

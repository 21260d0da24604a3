pub mod engine;
pub mod handlers;
pub mod matcher;
pub mod scheduler;

pub use engine::*;
pub use handlers::*;
pub use scheduler::*;

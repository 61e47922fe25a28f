pub mod engine;
pub mod scheduler;

pub use engine::{VersusEngine, VersusSpec};
pub use scheduler::Scheduler;

pub mod job_engine;
pub mod logging;
pub mod notification;
pub mod orchestrator;
pub mod scheduler;

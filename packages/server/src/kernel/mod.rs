pub mod scheduled_tasks;

pub use scheduled_tasks::start_scheduler;

pub mod emitter;
pub mod models;

pub use emitter::{NewNotification, Notifier};

pub mod geo;
pub mod push;
pub mod time;

pub use geo::GeoPoint;
pub use push::PushClient;

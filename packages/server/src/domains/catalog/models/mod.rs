pub mod branch;

pub use branch::{
    Availability, Branch, Frequency, Material, MaterialPickupStatus, PickupDetails,
};

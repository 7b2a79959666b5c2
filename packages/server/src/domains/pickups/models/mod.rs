pub mod pickup;

pub use pickup::{
    ApprovalStatus, BranchApproval, BranchLine, CompletionOutcome, CompletionRecord, Pickup,
    PickupStatus, PickupType, QuantityDecrement, RecurringDetails, RecurringStatus, TimeSlot,
    WeightMode,
};

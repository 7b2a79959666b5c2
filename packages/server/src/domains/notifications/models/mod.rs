pub mod notification;

pub use notification::{
    LocalizedText, Message, NotificationFeed, NotificationItem, NotificationType, NotifiedBranch,
};

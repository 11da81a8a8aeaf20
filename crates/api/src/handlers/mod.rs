pub mod devices;
pub mod feeds;
pub mod groups;
pub mod status;
pub mod subscriptions;

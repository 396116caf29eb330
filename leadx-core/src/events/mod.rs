//! Event channels between the coordinator and its background processors.
//!
//! # Event Flow
//!
//! 1. `AuctionCoordinator` emits `BroadcastRequested` -> `NotificationFanout`
//! 2. `AuctionCoordinator` emits `AuctionSettled` -> `OutcomeReporter`
//!
//! Claims arrive through the API and are handled inline by the coordinator;
//! they never travel over a channel.

pub mod channels;
pub mod types;

pub use channels::{
    AuctionSettledReceiver, AuctionSettledSender, BroadcastRequestedReceiver,
    BroadcastRequestedSender, DEFAULT_CHANNEL_BUFFER, EventReceivers, EventSenders,
    auction_settled_channel, broadcast_requested_channel, engine_channels,
};
pub use types::{AuctionSettled, BroadcastRequested};

//! Event channel factories and handles.

use super::types::{AuctionSettled, BroadcastRequested};
use tokio::sync::mpsc;

/// Default buffer size for event channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

pub type BroadcastRequestedSender = mpsc::Sender<BroadcastRequested>;
pub type BroadcastRequestedReceiver = mpsc::Receiver<BroadcastRequested>;

pub type AuctionSettledSender = mpsc::Sender<AuctionSettled>;
pub type AuctionSettledReceiver = mpsc::Receiver<AuctionSettled>;

/// Create a new BroadcastRequested channel.
pub fn broadcast_requested_channel() -> (BroadcastRequestedSender, BroadcastRequestedReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new AuctionSettled channel.
pub fn auction_settled_channel() -> (AuctionSettledSender, AuctionSettledReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Container for the senders the coordinator emits on.
#[derive(Clone)]
pub struct EventSenders {
    pub broadcast_requested: BroadcastRequestedSender,
    pub auction_settled: AuctionSettledSender,
}

impl EventSenders {
    pub fn new(
        broadcast_requested: BroadcastRequestedSender,
        auction_settled: AuctionSettledSender,
    ) -> Self {
        Self {
            broadcast_requested,
            auction_settled,
        }
    }
}

/// Receiving ends matching an [`EventSenders`].
pub struct EventReceivers {
    pub broadcast_requested: BroadcastRequestedReceiver,
    pub auction_settled: AuctionSettledReceiver,
}

/// Create every engine channel at once.
pub fn engine_channels() -> (EventSenders, EventReceivers) {
    let (broadcast_tx, broadcast_rx) = broadcast_requested_channel();
    let (settled_tx, settled_rx) = auction_settled_channel();
    (
        EventSenders::new(broadcast_tx, settled_tx),
        EventReceivers {
            broadcast_requested: broadcast_rx,
            auction_settled: settled_rx,
        },
    )
}

//! Network bootstrap for the G3-PLC DLMS stack
//!
//! Implements both ends of the LBP join handshake: the device-side
//! state machine (startup delay, channel-checked discovery, candidate
//! PAN selection, Joining/Challenge/Accepted exchange) and the
//! coordinator-side join table that hands out short addresses.
//!
//! Both machines are sans-io: time advances through explicit ticks,
//! frames come in through handler methods, and outgoing work is queued
//! as commands for the embedding task to execute.

pub mod auth;
pub mod backoff;
pub mod coordinator;
pub mod device;
pub mod media;
pub mod pan;

pub use auth::{AUTH_RESPONSE_LEN, GroupKey, NONCE_LEN, Psk, challenge_response};
pub use backoff::ContentionWindow;
pub use coordinator::{
    BootstrapCoordinator, CoordinatorAction, CoordinatorConfig, MAX_JOIN_ENTRIES,
};
pub use device::{DeviceCommand, DeviceJoin, JoinStatus, NetworkInfo};
pub use media::{MediaActivity, MediaMonitor};
pub use pan::{MIN_LINK_QUALITY, PanDescriptor, PanSelector, ROUTE_COST_INFINITY};

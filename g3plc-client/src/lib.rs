//! DLMS client side
//!
//! [`DlmsClient`] keeps up to four client associations, encodes requests
//! and reassembles block-transferred responses; outgoing APDUs and
//! completed exchanges are emitted through polled queues. On top of it
//! [`CycleManager`] walks the joined meters in rounds, reading a
//! configured object list from each and keeping per-meter statistics.
//! Both are sans-io and driven by `tick` calls carrying elapsed wall
//! time.

pub mod association;
pub mod cycle;

pub use association::{
    AssociationState, DataIndication, DataRequest, DlmsClient, ResponseData,
};
pub use g3plc_core::ClientResult;
pub use cycle::{CycleManager, CycleState, NodeStatistics, reference_object_list};

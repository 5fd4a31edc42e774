//! HDLC framing for the serial management port
//!
//! Only the codec lives here: addresses, check sequences and whole-frame
//! encode/decode. Window management and retransmission are out of scope
//! for the management link, which exchanges one frame at a time.

pub mod address;
pub mod fcs;
pub mod frame;

pub use address::{HdlcAddress, reserved};
pub use fcs::FcsCalc;
pub use frame::{FLAG, FrameType, HdlcFrame, LLC_COMMAND, LLC_RESPONSE, MAX_FRAME_LENGTH};

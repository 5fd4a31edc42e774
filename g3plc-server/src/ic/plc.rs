//! G3-PLC management objects (IC 90, 91, 92)
//!
//! These bridge DLMS attribute reads onto the MAC and ADP information bases
//! of the live PLC stack. The store is shared with the networking side
//! behind a mutex; a value the stack cannot serve right now comes back as a
//! temporary failure rather than a protocol error.

use std::sync::{Arc, Mutex};

use g3plc_codec::AccessSelector;
use g3plc_core::{DataAccessResult, DataValue, ObisCode};

use crate::registry::CosemObject;

/// MAC information base attribute identifiers.
pub mod mac_pib {
    pub const MAX_BE: u32 = 0x47;
    pub const MAX_CSMA_BACKOFFS: u32 = 0x4E;
    pub const MIN_BE: u32 = 0x4F;
    pub const PAN_ID: u32 = 0x50;
    pub const SHORT_ADDRESS: u32 = 0x53;
    pub const MAX_FRAME_RETRIES: u32 = 0x59;
    pub const HIGH_PRIORITY_WINDOW_SIZE: u32 = 0x100;
    pub const TX_DATA_PACKET_COUNT: u32 = 0x101;
    pub const RX_DATA_PACKET_COUNT: u32 = 0x102;
    pub const TX_CMD_PACKET_COUNT: u32 = 0x103;
    pub const RX_CMD_PACKET_COUNT: u32 = 0x104;
    pub const CSMA_FAIL_COUNT: u32 = 0x105;
    pub const CSMA_NO_ACK_COUNT: u32 = 0x106;
    pub const RX_DATA_BROADCAST_COUNT: u32 = 0x107;
    pub const TX_DATA_BROADCAST_COUNT: u32 = 0x108;
    pub const BAD_CRC_COUNT: u32 = 0x109;
    pub const NEIGHBOUR_TABLE: u32 = 0x10A;
    pub const CSMA_FAIRNESS_LIMIT: u32 = 0x10C;
    pub const TMR_TTL: u32 = 0x10D;
    pub const NEIGHBOUR_TABLE_ENTRY_TTL: u32 = 0x10E;
    pub const RC_COORD: u32 = 0x10F;
    pub const TONE_MASK: u32 = 0x110;
    pub const BEACON_RANDOMIZATION_WINDOW_LENGTH: u32 = 0x111;
    pub const A: u32 = 0x112;
    pub const K: u32 = 0x113;
    pub const MIN_CW_ATTEMPTS: u32 = 0x114;
    pub const CENELEC_LEGACY_MODE: u32 = 0x115;
    pub const FCC_LEGACY_MODE: u32 = 0x116;
}

/// ADP information base attribute identifiers.
pub mod adp_ib {
    pub const SECURITY_LEVEL: u32 = 0x00;
    pub const PREFIX_TABLE: u32 = 0x01;
    pub const BROADCAST_LOG_TABLE_ENTRY_TTL: u32 = 0x02;
    pub const METRIC_TYPE: u32 = 0x03;
    pub const CONTEXT_INFORMATION_TABLE: u32 = 0x07;
    pub const COORD_SHORT_ADDRESS: u32 = 0x08;
    pub const BROADCAST_LOG_TABLE: u32 = 0x0B;
    pub const ROUTING_TABLE: u32 = 0x0C;
    pub const GROUP_TABLE: u32 = 0x0E;
    pub const MAX_HOPS: u32 = 0x0F;
    pub const DEVICE_TYPE: u32 = 0x10;
    pub const WEAK_LQI_VALUE: u32 = 0x1A;
    pub const BLACKLIST_TABLE: u32 = 0x1E;
    pub const MAX_JOIN_WAIT_TIME: u32 = 0x20;
    pub const PATH_DISCOVERY_TIME: u32 = 0x21;
    pub const ACTIVE_KEY_INDEX: u32 = 0x22;
    pub const DISABLE_DEFAULT_ROUTING: u32 = 0xF0;
}

pub const COUNTERS_OBIS: ObisCode = ObisCode::new(0, 0, 29, 0, 0, 255);
pub const MAC_SETUP_OBIS: ObisCode = ObisCode::new(0, 0, 29, 1, 0, 255);
pub const ADP_SETUP_OBIS: ObisCode = ObisCode::new(0, 0, 29, 2, 0, 255);

/// Read access into the PLC stack's information bases.
pub trait PibStore: Send {
    /// Fetch a MAC PIB attribute, `None` when the stack cannot serve it.
    fn mac_get(&mut self, attribute: u32, index: u16) -> Option<DataValue>;

    /// Fetch an ADP IB attribute.
    fn adp_get(&mut self, attribute: u32, index: u16) -> Option<DataValue>;
}

pub type SharedPib = Arc<Mutex<dyn PibStore>>;

fn pib_read(
    pib: &SharedPib,
    fetch: impl FnOnce(&mut dyn PibStore) -> Option<DataValue>,
) -> Result<DataValue, DataAccessResult> {
    let Ok(mut store) = pib.lock() else {
        return Err(DataAccessResult::TemporaryFailure);
    };
    fetch(&mut *store).ok_or(DataAccessResult::TemporaryFailure)
}

/// PLC frame counters (IC 90)
pub struct G3PlcCounters {
    pib: SharedPib,
}

impl G3PlcCounters {
    pub fn new(pib: SharedPib) -> Self {
        Self { pib }
    }
}

impl CosemObject for G3PlcCounters {
    fn class_id(&self) -> u16 {
        90
    }

    fn logical_name(&self) -> ObisCode {
        COUNTERS_OBIS
    }

    fn get_attribute(
        &mut self,
        attribute: u8,
        _selector: Option<&AccessSelector>,
    ) -> Result<DataValue, DataAccessResult> {
        let pib_attribute = match attribute {
            2 => mac_pib::TX_DATA_PACKET_COUNT,
            3 => mac_pib::RX_DATA_PACKET_COUNT,
            4 => mac_pib::TX_CMD_PACKET_COUNT,
            5 => mac_pib::RX_CMD_PACKET_COUNT,
            6 => mac_pib::CSMA_FAIL_COUNT,
            7 => mac_pib::CSMA_NO_ACK_COUNT,
            8 => mac_pib::BAD_CRC_COUNT,
            9 => mac_pib::TX_DATA_BROADCAST_COUNT,
            10 => mac_pib::RX_DATA_BROADCAST_COUNT,
            _ => return Err(DataAccessResult::ObjectUnavailable),
        };
        pib_read(&self.pib, |store| store.mac_get(pib_attribute, 0))
    }
}

/// MAC layer setup (IC 91)
pub struct G3PlcMacSetup {
    pib: SharedPib,
}

impl G3PlcMacSetup {
    pub fn new(pib: SharedPib) -> Self {
        Self { pib }
    }
}

impl CosemObject for G3PlcMacSetup {
    fn class_id(&self) -> u16 {
        91
    }

    fn logical_name(&self) -> ObisCode {
        MAC_SETUP_OBIS
    }

    fn get_attribute(
        &mut self,
        attribute: u8,
        _selector: Option<&AccessSelector>,
    ) -> Result<DataValue, DataAccessResult> {
        let pib_attribute = match attribute {
            2 => mac_pib::SHORT_ADDRESS,
            3 => mac_pib::RC_COORD,
            4 => mac_pib::PAN_ID,
            7 => mac_pib::TONE_MASK,
            8 => mac_pib::TMR_TTL,
            9 => mac_pib::MAX_FRAME_RETRIES,
            10 => mac_pib::NEIGHBOUR_TABLE_ENTRY_TTL,
            11 => mac_pib::NEIGHBOUR_TABLE,
            12 => mac_pib::HIGH_PRIORITY_WINDOW_SIZE,
            13 => mac_pib::CSMA_FAIRNESS_LIMIT,
            14 => mac_pib::BEACON_RANDOMIZATION_WINDOW_LENGTH,
            15 => mac_pib::A,
            16 => mac_pib::K,
            17 => mac_pib::MIN_CW_ATTEMPTS,
            18 => mac_pib::CENELEC_LEGACY_MODE,
            19 => mac_pib::FCC_LEGACY_MODE,
            20 => mac_pib::MAX_BE,
            21 => mac_pib::MAX_CSMA_BACKOFFS,
            22 => mac_pib::MIN_BE,
            // 5 and 6 (key table, frame counter) are write/internal only
            _ => return Err(DataAccessResult::ObjectUnavailable),
        };
        pib_read(&self.pib, |store| store.mac_get(pib_attribute, 0))
    }
}

/// Adaptation layer setup (IC 92)
pub struct G3PlcAdpSetup {
    pib: SharedPib,
}

impl G3PlcAdpSetup {
    pub fn new(pib: SharedPib) -> Self {
        Self { pib }
    }
}

impl CosemObject for G3PlcAdpSetup {
    fn class_id(&self) -> u16 {
        92
    }

    fn logical_name(&self) -> ObisCode {
        ADP_SETUP_OBIS
    }

    fn get_attribute(
        &mut self,
        attribute: u8,
        _selector: Option<&AccessSelector>,
    ) -> Result<DataValue, DataAccessResult> {
        let pib_attribute = match attribute {
            2 => adp_ib::MAX_HOPS,
            3 => adp_ib::WEAK_LQI_VALUE,
            4 => adp_ib::SECURITY_LEVEL,
            5 => adp_ib::PREFIX_TABLE,
            // 6 would be the routing configuration, which the stack does not
            // expose
            7 => adp_ib::BROADCAST_LOG_TABLE_ENTRY_TTL,
            8 => adp_ib::ROUTING_TABLE,
            9 => adp_ib::CONTEXT_INFORMATION_TABLE,
            10 => adp_ib::BLACKLIST_TABLE,
            11 => adp_ib::BROADCAST_LOG_TABLE,
            12 => adp_ib::GROUP_TABLE,
            13 => adp_ib::MAX_JOIN_WAIT_TIME,
            14 => adp_ib::PATH_DISCOVERY_TIME,
            15 => adp_ib::ACTIVE_KEY_INDEX,
            16 => adp_ib::METRIC_TYPE,
            17 => adp_ib::COORD_SHORT_ADDRESS,
            18 => adp_ib::DISABLE_DEFAULT_ROUTING,
            19 => adp_ib::DEVICE_TYPE,
            _ => return Err(DataAccessResult::ObjectUnavailable),
        };
        pib_read(&self.pib, |store| store.adp_get(pib_attribute, 0))
    }
}

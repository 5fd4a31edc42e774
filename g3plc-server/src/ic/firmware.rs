//! Firmware identity (IC 86, manufacturer specific)

use g3plc_codec::AccessSelector;
use g3plc_core::{DataAccessResult, DataValue, ObisCode};

use crate::registry::CosemObject;

pub const FIRMWARE_OBIS: ObisCode = ObisCode::new(0, 0, 28, 7, 0, 255);

pub struct Firmware {
    version: Vec<u8>,
    vendor_id: Vec<u8>,
    product_id: Vec<u8>,
}

impl Firmware {
    pub fn new(version: &str, vendor_id: &str, product_id: &str) -> Self {
        Self {
            version: version.as_bytes().to_vec(),
            vendor_id: vendor_id.as_bytes().to_vec(),
            product_id: product_id.as_bytes().to_vec(),
        }
    }
}

impl CosemObject for Firmware {
    fn class_id(&self) -> u16 {
        86
    }

    fn logical_name(&self) -> ObisCode {
        FIRMWARE_OBIS
    }

    fn get_attribute(
        &mut self,
        attribute: u8,
        _selector: Option<&AccessSelector>,
    ) -> Result<DataValue, DataAccessResult> {
        match attribute {
            2 => Ok(DataValue::VisibleString(self.version.clone())),
            3 => Ok(DataValue::VisibleString(self.vendor_id.clone())),
            4 => Ok(DataValue::VisibleString(self.product_id.clone())),
            _ => Err(DataAccessResult::ObjectUnavailable),
        }
    }
}

//! Current association (IC 15)
//!
//! Only the object list is served: attribute 2 enumerates the class and
//! logical name of every object the meter exposes, which is what a client
//! walks to discover the OBIS map.

use g3plc_codec::AccessSelector;
use g3plc_core::{DataAccessResult, DataValue, ObisCode};

use crate::registry::CosemObject;

pub const CURRENT_ASSOCIATION_OBIS: ObisCode = ObisCode::new(0, 0, 40, 0, 0, 255);

pub struct AssociationLn {
    entries: Vec<(u16, ObisCode)>,
}

impl AssociationLn {
    /// View over the served object list, typically the registry descriptor
    /// list with this object's own entry appended.
    pub fn new(entries: Vec<(u16, ObisCode)>) -> Self {
        Self { entries }
    }
}

impl CosemObject for AssociationLn {
    fn class_id(&self) -> u16 {
        15
    }

    fn logical_name(&self) -> ObisCode {
        CURRENT_ASSOCIATION_OBIS
    }

    fn get_attribute(
        &mut self,
        attribute: u8,
        _selector: Option<&AccessSelector>,
    ) -> Result<DataValue, DataAccessResult> {
        match attribute {
            2 => Ok(DataValue::Array(
                self.entries
                    .iter()
                    .map(|(class_id, obis)| {
                        DataValue::Structure(vec![
                            DataValue::LongUnsigned(*class_id),
                            DataValue::Unsigned(0),
                            DataValue::octets(obis.as_bytes()),
                        ])
                    })
                    .collect(),
            )),
            _ => Err(DataAccessResult::ObjectUnavailable),
        }
    }
}

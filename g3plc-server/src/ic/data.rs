//! Data (IC 1)

use g3plc_codec::AccessSelector;
use g3plc_core::{DataAccessResult, DataValue, ObisCode};

use crate::registry::CosemObject;

/// Plain stored value. Attribute 2 is the value itself; a SET replaces it
/// with whatever the client sent.
pub struct Data {
    logical_name: ObisCode,
    value: DataValue,
}

impl Data {
    pub fn new(logical_name: ObisCode, value: DataValue) -> Self {
        Self {
            logical_name,
            value,
        }
    }

    pub fn value(&self) -> &DataValue {
        &self.value
    }
}

impl CosemObject for Data {
    fn class_id(&self) -> u16 {
        1
    }

    fn logical_name(&self) -> ObisCode {
        self.logical_name
    }

    fn get_attribute(
        &mut self,
        attribute: u8,
        _selector: Option<&AccessSelector>,
    ) -> Result<DataValue, DataAccessResult> {
        match attribute {
            2 => Ok(self.value.clone()),
            _ => Err(DataAccessResult::ObjectUnavailable),
        }
    }

    fn set_attribute(&mut self, attribute: u8, value: DataValue) -> Result<(), DataAccessResult> {
        match attribute {
            2 => {
                self.value = value;
                Ok(())
            }
            _ => Err(DataAccessResult::ObjectUnavailable),
        }
    }
}

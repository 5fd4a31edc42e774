//! Register (IC 3)
//!
//! Attribute 2 is the current value, attribute 3 the scaler_unit structure.
//! A SET of the value must keep the configured data type; this is how the
//! original tariff-reset writes behave.

use g3plc_codec::AccessSelector;
use g3plc_core::{DataAccessResult, DataValue, ObisCode};

use crate::registry::CosemObject;

/// Measurement units carried in the scaler_unit structure
pub mod units {
    pub const WATT: u8 = 27;
    pub const WATT_HOUR: u8 = 30;
    pub const VAR_HOUR: u8 = 32;
    pub const AMPERE: u8 = 33;
    pub const VOLT: u8 = 35;
    pub const HERTZ: u8 = 44;
    pub const NONE: u8 = 255;
}

pub struct Register {
    logical_name: ObisCode,
    value: DataValue,
    scaler: i8,
    unit: u8,
}

impl Register {
    /// Register holding a double-long-unsigned, starting at zero
    pub fn new(logical_name: ObisCode, scaler: i8, unit: u8) -> Self {
        Self::with_value(logical_name, DataValue::DoubleLongUnsigned(0), scaler, unit)
    }

    pub fn with_value(logical_name: ObisCode, value: DataValue, scaler: i8, unit: u8) -> Self {
        Self {
            logical_name,
            value,
            scaler,
            unit,
        }
    }

    pub fn value(&self) -> &DataValue {
        &self.value
    }

    /// Measurement update from the application; not type-checked
    pub fn set_value(&mut self, value: DataValue) {
        self.value = value;
    }

    fn scaler_unit(&self) -> DataValue {
        DataValue::Structure(vec![
            DataValue::Integer(self.scaler),
            DataValue::Enum(self.unit),
        ])
    }
}

impl CosemObject for Register {
    fn class_id(&self) -> u16 {
        3
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
            3 => Ok(self.scaler_unit()),
            _ => Err(DataAccessResult::ObjectUnavailable),
        }
    }

    fn set_attribute(&mut self, attribute: u8, value: DataValue) -> Result<(), DataAccessResult> {
        match attribute {
            2 => {
                if value.tag() != self.value.tag() {
                    return Err(DataAccessResult::TypeUnmatched);
                }
                self.value = value;
                Ok(())
            }
            3 => Err(DataAccessResult::ReadWriteDenied),
            _ => Err(DataAccessResult::ObjectUnavailable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voltage() -> Register {
        Register::with_value(
            ObisCode::new(1, 0, 32, 7, 0, 255),
            DataValue::LongUnsigned(2301),
            -1,
            units::VOLT,
        )
    }

    #[test]
    fn test_scaler_unit_structure() {
        let mut register = voltage();
        assert_eq!(
            register.get_attribute(3, None),
            Ok(DataValue::Structure(vec![
                DataValue::Integer(-1),
                DataValue::Enum(units::VOLT),
            ]))
        );
    }

    #[test]
    fn test_set_keeps_configured_type() {
        let mut register = voltage();
        assert_eq!(
            register.set_attribute(2, DataValue::octets(b"no")),
            Err(DataAccessResult::TypeUnmatched)
        );
        register.set_attribute(2, DataValue::LongUnsigned(2295)).unwrap();
        assert_eq!(register.value(), &DataValue::LongUnsigned(2295));
    }

    #[test]
    fn test_scaler_unit_is_immutable() {
        let mut register = voltage();
        assert_eq!(
            register.set_attribute(3, DataValue::Null),
            Err(DataAccessResult::ReadWriteDenied)
        );
    }

    #[test]
    fn test_application_update_bypasses_type_check() {
        let mut register = voltage();
        register.set_value(DataValue::DoubleLongUnsigned(1));
        assert_eq!(register.value(), &DataValue::DoubleLongUnsigned(1));
    }
}

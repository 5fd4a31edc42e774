//! COSEM interface classes
//!
//! The concrete objects a device registers and serves: plain data and
//! register values, the clock, the load profile, the association view,
//! firmware identity and the bridges onto the PLC MAC/ADP information
//! bases.

pub mod association_ln;
pub mod clock;
pub mod data;
pub mod firmware;
pub mod plc;
pub mod profile;
pub mod register;

pub use association_ln::AssociationLn;
pub use clock::Clock;
pub use data::Data;
pub use firmware::Firmware;
pub use plc::{G3PlcAdpSetup, G3PlcCounters, G3PlcMacSetup, PibStore, SharedPib};
pub use profile::{CaptureObject, ProfileGeneric};
pub use register::Register;

use g3plc_core::{DataValue, G3Result, ObisCode};

use crate::registry::{AccessRights, ObjectRegistry, attribute_bit};

/// Stock object table of a meter: identity data, energy and instantaneous
/// registers, the hourly load profile, clock, firmware identity and the PLC
/// PIB bridges.
///
/// The management association (slot 0) may write the clock and reset the
/// energy registers; everything else is read-only.
pub fn meter_registry(pib: SharedPib) -> G3Result<ObjectRegistry> {
    let mut registry = ObjectRegistry::new();

    registry.register(
        AccessRights::read_only(),
        Box::new(Data::new(
            ObisCode::new(0, 0, 96, 1, 0, 255),
            DataValue::octets(b"40061945"),
        )),
    )?;
    registry.register(
        AccessRights::read_only(),
        Box::new(Data::new(
            ObisCode::new(1, 0, 0, 2, 0, 255),
            DataValue::VisibleString(b"01.08".to_vec()),
        )),
    )?;

    let energy = AccessRights::new([0xE000_0000; 4], [attribute_bit(2), 0, 0, 0]);
    registry.register(
        energy,
        Box::new(Register::new(
            ObisCode::new(1, 0, 1, 8, 0, 255),
            0,
            register::units::WATT_HOUR,
        )),
    )?;
    registry.register(
        energy,
        Box::new(Register::new(
            ObisCode::new(1, 0, 2, 8, 0, 255),
            0,
            register::units::WATT_HOUR,
        )),
    )?;

    let instantaneous = AccessRights::read_mask(0xE000_0000);
    registry.register(
        instantaneous,
        Box::new(Register::new(
            ObisCode::new(1, 0, 32, 7, 0, 255),
            -1,
            register::units::VOLT,
        )),
    )?;
    registry.register(
        instantaneous,
        Box::new(Register::new(
            ObisCode::new(1, 0, 31, 7, 0, 255),
            -2,
            register::units::AMPERE,
        )),
    )?;

    let capture = vec![
        CaptureObject::new(8, ObisCode::new(0, 0, 1, 0, 0, 255), 2),
        CaptureObject::new(3, ObisCode::new(1, 0, 1, 8, 0, 255), 2),
    ];
    registry.register(
        AccessRights::read_mask(0xFF00_0000),
        Box::new(ProfileGeneric::new(
            ObisCode::new(1, 0, 99, 1, 0, 255),
            capture,
            3600,
            168,
        )),
    )?;

    let clock_rights = AccessRights::new(
        [0xFF80_0000; 4],
        [attribute_bit(2) | attribute_bit(3), 0, 0, 0],
    );
    registry.register(
        clock_rights,
        Box::new(Clock::new(ObisCode::new(0, 0, 1, 0, 0, 255))),
    )?;

    registry.register(
        AccessRights::read_mask(0xF000_0000),
        Box::new(Firmware::new("01.08", "ATM", "SAM4C")),
    )?;

    registry.register(
        AccessRights::read_mask(0xFFC0_0000),
        Box::new(G3PlcCounters::new(pib.clone())),
    )?;
    registry.register(
        AccessRights::read_mask(0xF3FF_FC00),
        Box::new(G3PlcMacSetup::new(pib.clone())),
    )?;
    registry.register(
        AccessRights::read_mask(0xFFFF_E000),
        Box::new(G3PlcAdpSetup::new(pib)),
    )?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct NullPib;

    impl PibStore for NullPib {
        fn mac_get(&mut self, _attribute: u32, _index: u16) -> Option<DataValue> {
            Some(DataValue::DoubleLongUnsigned(0))
        }

        fn adp_get(&mut self, _attribute: u32, _index: u16) -> Option<DataValue> {
            Some(DataValue::DoubleLongUnsigned(0))
        }
    }

    #[test]
    fn test_meter_registry_layout() {
        let pib: SharedPib = Arc::new(Mutex::new(NullPib));
        let registry = meter_registry(pib).unwrap();
        assert_eq!(registry.len(), 12);

        let descriptors = registry.descriptors();
        assert!(descriptors.contains(&(8, ObisCode::new(0, 0, 1, 0, 0, 255))));
        assert!(descriptors.contains(&(90, ObisCode::new(0, 0, 29, 0, 0, 255))));
        assert!(descriptors.contains(&(7, ObisCode::new(1, 0, 99, 1, 0, 255))));
    }
}

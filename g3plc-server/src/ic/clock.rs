//! Clock (IC 8)
//!
//! Attribute 2 carries the 12-byte date-time octet string; attributes 3 and
//! 4 expose the deviation and clock status on their own. Time-sync writes
//! come in through attribute 2 and are parsed back into the fields.

use g3plc_codec::AccessSelector;
use g3plc_core::data::SIZE_DATE_TIME;
use g3plc_core::{DataAccessResult, DataValue, ObisCode};

use crate::registry::CosemObject;

pub struct Clock {
    logical_name: ObisCode,
    year: u16,
    month: u8,
    day_of_month: u8,
    day_of_week: u8,
    hour: u8,
    minute: u8,
    second: u8,
    hundredths: u8,
    deviation: i16,
    status: u8,
}

impl Clock {
    /// Clock at its boot epoch; the application sets the real time.
    pub fn new(logical_name: ObisCode) -> Self {
        Self {
            logical_name,
            year: 2020,
            month: 1,
            day_of_month: 1,
            day_of_week: 3,
            hour: 0,
            minute: 0,
            second: 0,
            hundredths: 0,
            deviation: 0,
            status: 0,
        }
    }

    /// The 12-byte date-time rendering
    pub fn datetime(&self) -> [u8; SIZE_DATE_TIME] {
        [
            (self.year >> 8) as u8,
            self.year as u8,
            self.month,
            self.day_of_month,
            self.day_of_week,
            self.hour,
            self.minute,
            self.second,
            self.hundredths,
            (self.deviation >> 8) as u8,
            self.deviation as u8,
            self.status,
        ]
    }

    /// Install a 12-byte date-time, e.g. from a time-sync write
    pub fn set_datetime(&mut self, datetime: &[u8]) -> Result<(), DataAccessResult> {
        if datetime.len() != SIZE_DATE_TIME {
            return Err(DataAccessResult::TypeUnmatched);
        }
        self.year = u16::from_be_bytes([datetime[0], datetime[1]]);
        self.month = datetime[2];
        self.day_of_month = datetime[3];
        self.day_of_week = datetime[4];
        self.hour = datetime[5];
        self.minute = datetime[6];
        self.second = datetime[7];
        self.hundredths = datetime[8];
        self.deviation = i16::from_be_bytes([datetime[9], datetime[10]]);
        self.status = datetime[11];
        Ok(())
    }
}

impl CosemObject for Clock {
    fn class_id(&self) -> u16 {
        8
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
            2 => Ok(DataValue::OctetString(self.datetime().to_vec())),
            3 => Ok(DataValue::Long(self.deviation)),
            4 => Ok(DataValue::Unsigned(self.status)),
            _ => Err(DataAccessResult::ObjectUnavailable),
        }
    }

    fn set_attribute(&mut self, attribute: u8, value: DataValue) -> Result<(), DataAccessResult> {
        match attribute {
            2 => match value {
                DataValue::OctetString(bytes) => self.set_datetime(&bytes),
                _ => Err(DataAccessResult::TypeUnmatched),
            },
            3 => match value {
                DataValue::Long(deviation) => {
                    self.deviation = deviation;
                    Ok(())
                }
                _ => Err(DataAccessResult::TypeUnmatched),
            },
            4 => Err(DataAccessResult::ReadWriteDenied),
            _ => Err(DataAccessResult::ObjectUnavailable),
        }
    }
}

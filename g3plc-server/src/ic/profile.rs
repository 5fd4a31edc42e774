//! Profile generic (IC 7)
//!
//! A capture buffer of rows, one value per capture object, oldest first.
//! Attribute 2 honours both selective-access variants: entry ranges with
//! 1-based inclusive row/column bounds, and timestamp ranges restricted by
//! the first capture object.

use std::collections::VecDeque;

use g3plc_codec::AccessSelector;
use g3plc_core::{AttributeDescriptor, DataAccessResult, DataValue, G3Error, G3Result, ObisCode};

use crate::registry::CosemObject;

/// One column of the profile: which attribute of which object is captured.
pub struct CaptureObject {
    pub class_id: u16,
    pub obis: ObisCode,
    pub attribute: u8,
}

impl CaptureObject {
    pub fn new(class_id: u16, obis: ObisCode, attribute: u8) -> Self {
        Self {
            class_id,
            obis,
            attribute,
        }
    }

    fn descriptor_value(&self) -> DataValue {
        DataValue::Structure(vec![
            DataValue::LongUnsigned(self.class_id),
            DataValue::octets(self.obis.as_bytes()),
            DataValue::Integer(self.attribute as i8),
            DataValue::LongUnsigned(0),
        ])
    }

    fn matches(&self, descriptor: &AttributeDescriptor) -> bool {
        self.class_id == descriptor.class_id
            && self.obis == descriptor.obis
            && self.attribute == descriptor.attribute
    }
}

pub struct ProfileGeneric {
    logical_name: ObisCode,
    capture_objects: Vec<CaptureObject>,
    capture_period: u32,
    profile_entries: u32,
    buffer: VecDeque<Vec<DataValue>>,
}

impl ProfileGeneric {
    pub fn new(
        logical_name: ObisCode,
        capture_objects: Vec<CaptureObject>,
        capture_period: u32,
        profile_entries: u32,
    ) -> Self {
        Self {
            logical_name,
            capture_objects,
            capture_period,
            profile_entries,
            buffer: VecDeque::new(),
        }
    }

    /// Append one captured row; entries beyond the capacity fall out oldest
    /// first.
    pub fn capture(&mut self, row: Vec<DataValue>) -> G3Result<()> {
        if row.len() != self.capture_objects.len() {
            return Err(G3Error::Config(format!(
                "captured {} values for {} capture objects",
                row.len(),
                self.capture_objects.len()
            )));
        }
        self.buffer.push_back(row);
        while self.buffer.len() > self.profile_entries as usize {
            self.buffer.pop_front();
        }
        Ok(())
    }

    pub fn entries_in_use(&self) -> usize {
        self.buffer.len()
    }

    fn buffer_value(
        &self,
        selector: Option<&AccessSelector>,
    ) -> Result<DataValue, DataAccessResult> {
        let rows = match selector {
            None => self.rows(
                1,
                self.buffer.len() as u32,
                1,
                self.capture_objects.len() as u16,
            ),
            Some(AccessSelector::Entry {
                from_entry,
                to_entry,
                from_value,
                to_value,
            }) => {
                // zero bounds mean "from the start" / "to the end"
                let to_entry = if *to_entry == 0 {
                    self.buffer.len() as u32
                } else {
                    *to_entry
                };
                let from_column = if *from_value == 0 { 1 } else { *from_value };
                let to_column = if *to_value == 0 {
                    self.capture_objects.len() as u16
                } else {
                    *to_value
                };
                self.rows((*from_entry).max(1), to_entry, from_column, to_column)
            }
            Some(AccessSelector::Range {
                restricting_object,
                from,
                to,
                ..
            }) => {
                let restricts_first_column = self
                    .capture_objects
                    .first()
                    .is_some_and(|capture| capture.matches(restricting_object));
                if !restricts_first_column {
                    return Err(DataAccessResult::OtherReason);
                }
                let (DataValue::OctetString(from), DataValue::OctetString(to)) = (from, to) else {
                    return Err(DataAccessResult::TypeUnmatched);
                };
                self.buffer
                    .iter()
                    .filter(|row| {
                        matches!(row.first(),
                            Some(DataValue::OctetString(stamp)) if stamp >= from && stamp <= to)
                    })
                    .map(|row| DataValue::Structure(row.clone()))
                    .collect()
            }
        };
        Ok(DataValue::Array(rows))
    }

    /// Entry and column bounds are 1-based and inclusive at both ends.
    fn rows(&self, from_entry: u32, to_entry: u32, from_column: u16, to_column: u16) -> Vec<DataValue> {
        let start = from_entry.saturating_sub(1) as usize;
        let end = (to_entry as usize).min(self.buffer.len());
        let column_start = from_column.saturating_sub(1) as usize;
        let column_end = (to_column as usize).min(self.capture_objects.len());
        if start >= end || column_start >= column_end {
            return Vec::new();
        }
        self.buffer
            .iter()
            .skip(start)
            .take(end - start)
            .map(|row| DataValue::Structure(row[column_start..column_end].to_vec()))
            .collect()
    }
}

impl CosemObject for ProfileGeneric {
    fn class_id(&self) -> u16 {
        7
    }

    fn logical_name(&self) -> ObisCode {
        self.logical_name
    }

    fn get_attribute(
        &mut self,
        attribute: u8,
        selector: Option<&AccessSelector>,
    ) -> Result<DataValue, DataAccessResult> {
        match attribute {
            2 => self.buffer_value(selector),
            3 => Ok(DataValue::Array(
                self.capture_objects
                    .iter()
                    .map(CaptureObject::descriptor_value)
                    .collect(),
            )),
            4 => Ok(DataValue::DoubleLongUnsigned(self.capture_period)),
            7 => Ok(DataValue::DoubleLongUnsigned(self.buffer.len() as u32)),
            8 => Ok(DataValue::DoubleLongUnsigned(self.profile_entries)),
            _ => Err(DataAccessResult::ObjectUnavailable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOCK_OBIS: ObisCode = ObisCode::new(0, 0, 1, 0, 0, 255);
    const ENERGY_OBIS: ObisCode = ObisCode::new(1, 0, 1, 8, 0, 255);

    fn load_profile(capacity: u32) -> ProfileGeneric {
        ProfileGeneric::new(
            ObisCode::new(1, 0, 99, 1, 0, 255),
            vec![
                CaptureObject::new(8, CLOCK_OBIS, 2),
                CaptureObject::new(3, ENERGY_OBIS, 2),
            ],
            3600,
            capacity,
        )
    }

    fn row(stamp: u8, energy: u32) -> Vec<DataValue> {
        vec![
            DataValue::OctetString(vec![0x07, 0xEA, stamp]),
            DataValue::DoubleLongUnsigned(energy),
        ]
    }

    fn rows_of(value: DataValue) -> Vec<DataValue> {
        match value {
            DataValue::Array(rows) => rows,
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_capture_rolls_oldest_entries_out() {
        let mut profile = load_profile(3);
        for stamp in 1..=4 {
            profile.capture(row(stamp, u32::from(stamp) * 100)).unwrap();
        }
        assert_eq!(profile.entries_in_use(), 3);
        let rows = rows_of(profile.buffer_value(None).unwrap());
        assert_eq!(rows.len(), 3);
        // stamp 1 fell out
        assert_eq!(
            rows[0],
            DataValue::Structure(vec![
                DataValue::OctetString(vec![0x07, 0xEA, 2]),
                DataValue::DoubleLongUnsigned(200),
            ])
        );
    }

    #[test]
    fn test_capture_checks_row_arity() {
        let mut profile = load_profile(8);
        let err = profile
            .capture(vec![DataValue::DoubleLongUnsigned(1)])
            .unwrap_err();
        assert!(err.to_string().contains("capture objects"));
    }

    #[test]
    fn test_capture_object_list() {
        let mut profile = load_profile(8);
        let list = rows_of(profile.get_attribute(3, None).unwrap());
        assert_eq!(
            list[0],
            DataValue::Structure(vec![
                DataValue::LongUnsigned(8),
                DataValue::octets(CLOCK_OBIS.as_bytes()),
                DataValue::Integer(2),
                DataValue::LongUnsigned(0),
            ])
        );
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_entry_selector_slices_rows() {
        let mut profile = load_profile(8);
        for stamp in 1..=5 {
            profile.capture(row(stamp, u32::from(stamp))).unwrap();
        }
        let selector = AccessSelector::entries(2, 4);
        let rows = rows_of(profile.buffer_value(Some(&selector)).unwrap());
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[2],
            DataValue::Structure(vec![
                DataValue::OctetString(vec![0x07, 0xEA, 4]),
                DataValue::DoubleLongUnsigned(4),
            ])
        );
    }

    #[test]
    fn test_entry_selector_zero_means_whole_buffer() {
        let mut profile = load_profile(8);
        for stamp in 1..=5 {
            profile.capture(row(stamp, u32::from(stamp))).unwrap();
        }
        let selector = AccessSelector::entries(0, 0);
        assert_eq!(rows_of(profile.buffer_value(Some(&selector)).unwrap()).len(), 5);
        let selector = AccessSelector::entries(6, 0);
        assert!(rows_of(profile.buffer_value(Some(&selector)).unwrap()).is_empty());
    }

    #[test]
    fn test_entry_selector_restricts_columns() {
        let mut profile = load_profile(8);
        for stamp in 1..=2 {
            profile.capture(row(stamp, u32::from(stamp) * 10)).unwrap();
        }
        let selector = AccessSelector::Entry {
            from_entry: 1,
            to_entry: 2,
            from_value: 2,
            to_value: 2,
        };
        let rows = rows_of(profile.buffer_value(Some(&selector)).unwrap());
        assert_eq!(
            rows,
            vec![
                DataValue::Structure(vec![DataValue::DoubleLongUnsigned(10)]),
                DataValue::Structure(vec![DataValue::DoubleLongUnsigned(20)]),
            ]
        );
    }

    #[test]
    fn test_range_selector_filters_on_timestamp() {
        let mut profile = load_profile(8);
        for stamp in 1..=5 {
            profile.capture(row(stamp, u32::from(stamp))).unwrap();
        }
        let selector = AccessSelector::Range {
            restricting_object: AttributeDescriptor::new(8, CLOCK_OBIS, 2),
            data_index: 0,
            from: DataValue::OctetString(vec![0x07, 0xEA, 2]),
            to: DataValue::OctetString(vec![0x07, 0xEA, 4]),
        };
        let rows = rows_of(profile.buffer_value(Some(&selector)).unwrap());
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            DataValue::Structure(vec![
                DataValue::OctetString(vec![0x07, 0xEA, 2]),
                DataValue::DoubleLongUnsigned(2),
            ])
        );
    }

    #[test]
    fn test_range_selector_requires_first_capture_object() {
        let mut profile = load_profile(8);
        profile.capture(row(1, 1)).unwrap();
        let selector = AccessSelector::Range {
            restricting_object: AttributeDescriptor::new(3, ENERGY_OBIS, 2),
            data_index: 0,
            from: DataValue::OctetString(vec![0x00]),
            to: DataValue::OctetString(vec![0xFF]),
        };
        assert_eq!(
            profile.buffer_value(Some(&selector)),
            Err(DataAccessResult::OtherReason)
        );
        let selector = AccessSelector::Range {
            restricting_object: AttributeDescriptor::new(8, CLOCK_OBIS, 2),
            data_index: 0,
            from: DataValue::LongUnsigned(0),
            to: DataValue::LongUnsigned(9),
        };
        assert_eq!(
            profile.buffer_value(Some(&selector)),
            Err(DataAccessResult::TypeUnmatched)
        );
    }

    #[test]
    fn test_counter_attributes() {
        let mut profile = load_profile(168);
        profile.capture(row(1, 1)).unwrap();
        profile.capture(row(2, 2)).unwrap();
        assert_eq!(
            profile.get_attribute(4, None),
            Ok(DataValue::DoubleLongUnsigned(3600))
        );
        assert_eq!(
            profile.get_attribute(7, None),
            Ok(DataValue::DoubleLongUnsigned(2))
        );
        assert_eq!(
            profile.get_attribute(8, None),
            Ok(DataValue::DoubleLongUnsigned(168))
        );
        assert_eq!(
            profile.get_attribute(5, None),
            Err(DataAccessResult::ObjectUnavailable)
        );
    }

    #[test]
    fn test_buffer_writes_denied() {
        let mut profile = load_profile(8);
        assert_eq!(
            profile.set_attribute(2, DataValue::Array(Vec::new())),
            Err(DataAccessResult::ReadWriteDenied)
        );
    }
}

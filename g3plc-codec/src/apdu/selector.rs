//! Selective-access descriptors for profile buffer reads

use g3plc_core::{AttributeDescriptor, DataValue, G3Error, G3Result, ObisCode};

use crate::axdr::{AxdrDecoder, AxdrEncoder};

/// access-selector values for class 7 buffers
const SELECTOR_RANGE: u8 = 1;
const SELECTOR_ENTRY: u8 = 2;

/// Restriction applied to a profile buffer GET/SET
#[derive(Debug, Clone, PartialEq)]
pub enum AccessSelector {
    /// range_descriptor: entries whose restricting column lies between two
    /// values, usually a date-time window
    Range {
        restricting_object: AttributeDescriptor,
        data_index: u16,
        from: DataValue,
        to: DataValue,
    },
    /// entry_descriptor: entries by ordinal position and column span
    Entry {
        from_entry: u32,
        to_entry: u32,
        from_value: u16,
        to_value: u16,
    },
}

impl AccessSelector {
    /// Entry restriction covering whole records
    pub fn entries(from_entry: u32, to_entry: u32) -> Self {
        Self::Entry {
            from_entry,
            to_entry,
            from_value: 0,
            to_value: 0,
        }
    }

    /// Encode as access-selector byte plus access-parameters data
    pub fn encode(&self, encoder: &mut AxdrEncoder) -> G3Result<()> {
        match self {
            Self::Range {
                restricting_object,
                data_index,
                from,
                to,
            } => {
                encoder.write_u8(SELECTOR_RANGE);
                let parameters = DataValue::Structure(vec![
                    DataValue::Structure(vec![
                        DataValue::LongUnsigned(restricting_object.class_id),
                        DataValue::octets(restricting_object.obis.as_bytes()),
                        DataValue::Integer(restricting_object.attribute as i8),
                        DataValue::LongUnsigned(*data_index),
                    ]),
                    from.clone(),
                    to.clone(),
                    DataValue::Array(Vec::new()),
                ]);
                encoder.encode_data(&parameters)
            }
            Self::Entry {
                from_entry,
                to_entry,
                from_value,
                to_value,
            } => {
                encoder.write_u8(SELECTOR_ENTRY);
                let parameters = DataValue::Structure(vec![
                    DataValue::DoubleLongUnsigned(*from_entry),
                    DataValue::DoubleLongUnsigned(*to_entry),
                    DataValue::LongUnsigned(*from_value),
                    DataValue::LongUnsigned(*to_value),
                ]);
                encoder.encode_data(&parameters)
            }
        }
    }

    /// Decode from access-selector byte plus access-parameters data
    pub fn decode(decoder: &mut AxdrDecoder<'_>) -> G3Result<Self> {
        let selector = decoder.read_u8()?;
        let parameters = decoder.decode_data()?;
        match selector {
            SELECTOR_RANGE => Self::decode_range(parameters),
            SELECTOR_ENTRY => Self::decode_entry(parameters),
            other => Err(G3Error::Decode(format!(
                "unknown access selector {}",
                other
            ))),
        }
    }

    fn decode_range(parameters: DataValue) -> G3Result<Self> {
        let DataValue::Structure(fields) = parameters else {
            return Err(G3Error::Decode("range parameters not a structure".to_string()));
        };
        let mut fields = fields.into_iter();
        let restricting = fields
            .next()
            .ok_or_else(|| G3Error::Decode("missing restricting object".to_string()))?;
        let from = fields
            .next()
            .ok_or_else(|| G3Error::Decode("missing range from".to_string()))?;
        let to = fields
            .next()
            .ok_or_else(|| G3Error::Decode("missing range to".to_string()))?;

        let DataValue::Structure(object) = restricting else {
            return Err(G3Error::Decode("restricting object not a structure".to_string()));
        };
        let [
            DataValue::LongUnsigned(class_id),
            DataValue::OctetString(obis),
            DataValue::Integer(attribute),
            DataValue::LongUnsigned(data_index),
        ] = object.as_slice()
        else {
            return Err(G3Error::Decode("restricting object fields invalid".to_string()));
        };

        Ok(Self::Range {
            restricting_object: AttributeDescriptor::new(
                *class_id,
                ObisCode::from_bytes(obis)?,
                *attribute as u8,
            ),
            data_index: *data_index,
            from,
            to,
        })
    }

    fn decode_entry(parameters: DataValue) -> G3Result<Self> {
        let DataValue::Structure(fields) = parameters else {
            return Err(G3Error::Decode("entry parameters not a structure".to_string()));
        };
        let [
            DataValue::DoubleLongUnsigned(from_entry),
            DataValue::DoubleLongUnsigned(to_entry),
            DataValue::LongUnsigned(from_value),
            DataValue::LongUnsigned(to_value),
        ] = fields.as_slice()
        else {
            return Err(G3Error::Decode("entry descriptor fields invalid".to_string()));
        };
        Ok(Self::Entry {
            from_entry: *from_entry,
            to_entry: *to_entry,
            from_value: *from_value,
            to_value: *to_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_selector_round_trip() {
        let selector = AccessSelector::entries(1, 10);
        let mut encoder = AxdrEncoder::new();
        selector.encode(&mut encoder).unwrap();
        let bytes = encoder.into_bytes();

        let mut decoder = AxdrDecoder::new(&bytes);
        assert_eq!(AccessSelector::decode(&mut decoder).unwrap(), selector);
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_range_selector_round_trip() {
        let clock = AttributeDescriptor::new(8, ObisCode::new(0, 0, 1, 0, 0, 255), 2);
        let selector = AccessSelector::Range {
            restricting_object: clock,
            data_index: 0,
            from: DataValue::octets(&[0x07, 0xE9, 0x01, 0x01, 0xFF, 0, 0, 0, 0, 0x80, 0x00, 0xFF]),
            to: DataValue::octets(&[0x07, 0xE9, 0x01, 0x02, 0xFF, 0, 0, 0, 0, 0x80, 0x00, 0xFF]),
        };
        let mut encoder = AxdrEncoder::new();
        selector.encode(&mut encoder).unwrap();
        let bytes = encoder.into_bytes();

        let mut decoder = AxdrDecoder::new(&bytes);
        assert_eq!(AccessSelector::decode(&mut decoder).unwrap(), selector);
    }
}

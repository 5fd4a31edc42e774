//! SET request/response APDUs

use g3plc_core::{DataAccessResult, DataValue, G3Error, G3Result};

use crate::apdu::get::GetItem;
use crate::apdu::tags;
use crate::axdr::{AxdrDecoder, AxdrEncoder};

const CHOICE_NORMAL: u8 = 1;
const CHOICE_REQUEST_WITH_LIST: u8 = 4;
const CHOICE_RESPONSE_WITH_LIST: u8 = 5;

/// SET-request APDU
#[derive(Debug, Clone, PartialEq)]
pub enum SetRequest {
    Normal {
        invoke_id: u8,
        item: GetItem,
        value: DataValue,
    },
    WithList {
        invoke_id: u8,
        items: Vec<GetItem>,
        values: Vec<DataValue>,
    },
}

impl SetRequest {
    pub fn invoke_id(&self) -> u8 {
        match self {
            Self::Normal { invoke_id, .. } | Self::WithList { invoke_id, .. } => *invoke_id,
        }
    }

    pub fn encode(&self) -> G3Result<Vec<u8>> {
        let mut encoder = AxdrEncoder::new();
        encoder.write_u8(tags::SET_REQUEST);
        match self {
            Self::Normal {
                invoke_id,
                item,
                value,
            } => {
                encoder.write_u8(CHOICE_NORMAL);
                encoder.write_u8(*invoke_id);
                item.encode(&mut encoder)?;
                encoder.encode_data(value)?;
            }
            Self::WithList {
                invoke_id,
                items,
                values,
            } => {
                if items.len() != values.len() {
                    return Err(G3Error::Encode(
                        "set-with-list descriptor/value count mismatch".to_string(),
                    ));
                }
                encoder.write_u8(CHOICE_REQUEST_WITH_LIST);
                encoder.write_u8(*invoke_id);
                encoder.encode_length(items.len())?;
                for item in items {
                    item.encode(&mut encoder)?;
                }
                encoder.encode_length(values.len())?;
                for value in values {
                    encoder.encode_data(value)?;
                }
            }
        }
        Ok(encoder.into_bytes())
    }

    pub fn decode(bytes: &[u8]) -> G3Result<Self> {
        let mut decoder = AxdrDecoder::new(bytes);
        let tag = decoder.read_u8()?;
        if tag != tags::SET_REQUEST {
            return Err(G3Error::Decode(format!("not a SET-request: 0x{:02X}", tag)));
        }
        let choice = decoder.read_u8()?;
        let invoke_id = decoder.read_u8()?;
        match choice {
            CHOICE_NORMAL => {
                let item = GetItem::decode(&mut decoder)?;
                let value = decoder.decode_data()?;
                Ok(Self::Normal {
                    invoke_id,
                    item,
                    value,
                })
            }
            CHOICE_REQUEST_WITH_LIST => {
                let count = decoder.decode_length()?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(GetItem::decode(&mut decoder)?);
                }
                let value_count = decoder.decode_length()?;
                if value_count != count {
                    return Err(G3Error::Decode(
                        "set-with-list descriptor/value count mismatch".to_string(),
                    ));
                }
                let mut values = Vec::with_capacity(value_count);
                for _ in 0..value_count {
                    values.push(decoder.decode_data()?);
                }
                Ok(Self::WithList {
                    invoke_id,
                    items,
                    values,
                })
            }
            other => Err(G3Error::Decode(format!(
                "unknown SET-request choice {}",
                other
            ))),
        }
    }
}

/// SET-response APDU
#[derive(Debug, Clone, PartialEq)]
pub enum SetResponse {
    Normal {
        invoke_id: u8,
        result: DataAccessResult,
    },
    WithList {
        invoke_id: u8,
        results: Vec<DataAccessResult>,
    },
}

impl SetResponse {
    pub fn invoke_id(&self) -> u8 {
        match self {
            Self::Normal { invoke_id, .. } | Self::WithList { invoke_id, .. } => *invoke_id,
        }
    }

    pub fn encode(&self) -> G3Result<Vec<u8>> {
        let mut encoder = AxdrEncoder::new();
        encoder.write_u8(tags::SET_RESPONSE);
        match self {
            Self::Normal { invoke_id, result } => {
                encoder.write_u8(CHOICE_NORMAL);
                encoder.write_u8(*invoke_id);
                encoder.write_u8(*result as u8);
            }
            Self::WithList { invoke_id, results } => {
                encoder.write_u8(CHOICE_RESPONSE_WITH_LIST);
                encoder.write_u8(*invoke_id);
                encoder.encode_length(results.len())?;
                for result in results {
                    encoder.write_u8(*result as u8);
                }
            }
        }
        Ok(encoder.into_bytes())
    }

    pub fn decode(bytes: &[u8]) -> G3Result<Self> {
        let mut decoder = AxdrDecoder::new(bytes);
        let tag = decoder.read_u8()?;
        if tag != tags::SET_RESPONSE {
            return Err(G3Error::Decode(format!("not a SET-response: 0x{:02X}", tag)));
        }
        let choice = decoder.read_u8()?;
        let invoke_id = decoder.read_u8()?;
        match choice {
            CHOICE_NORMAL => {
                let code = decoder.read_u8()?;
                let result = DataAccessResult::from_u8(code).ok_or_else(|| {
                    G3Error::Decode(format!("unknown data-access-result {}", code))
                })?;
                Ok(Self::Normal { invoke_id, result })
            }
            CHOICE_RESPONSE_WITH_LIST => {
                let count = decoder.decode_length()?;
                let mut results = Vec::with_capacity(count);
                for _ in 0..count {
                    let code = decoder.read_u8()?;
                    let result = DataAccessResult::from_u8(code).ok_or_else(|| {
                        G3Error::Decode(format!("unknown data-access-result {}", code))
                    })?;
                    results.push(result);
                }
                Ok(Self::WithList { invoke_id, results })
            }
            other => Err(G3Error::Decode(format!(
                "unknown SET-response choice {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use g3plc_core::{AttributeDescriptor, ObisCode};

    #[test]
    fn test_set_request_normal_round_trip() {
        let request = SetRequest::Normal {
            invoke_id: 0xC1,
            item: GetItem::new(AttributeDescriptor::new(
                3,
                ObisCode::new(1, 0, 1, 8, 0, 255),
                2,
            )),
            value: DataValue::DoubleLongUnsigned(42),
        };
        let bytes = request.encode().unwrap();
        assert_eq!(bytes[0], 0xC1);
        assert_eq!(SetRequest::decode(&bytes).unwrap(), request);
    }

    #[test]
    fn test_set_request_list_mismatch_rejected() {
        let request = SetRequest::WithList {
            invoke_id: 0xC1,
            items: vec![GetItem::new(AttributeDescriptor::new(
                1,
                ObisCode::new(0, 0, 96, 3, 10, 255),
                2,
            ))],
            values: Vec::new(),
        };
        assert!(request.encode().is_err());
    }

    #[test]
    fn test_set_response_round_trip() {
        let response = SetResponse::Normal {
            invoke_id: 0xC1,
            result: DataAccessResult::ReadWriteDenied,
        };
        let bytes = response.encode().unwrap();
        assert_eq!(bytes, vec![0xC5, 0x01, 0xC1, 0x03]);
        assert_eq!(SetResponse::decode(&bytes).unwrap(), response);

        let list = SetResponse::WithList {
            invoke_id: 0xC2,
            results: vec![DataAccessResult::Success, DataAccessResult::ObjectUndefined],
        };
        let bytes = list.encode().unwrap();
        assert_eq!(SetResponse::decode(&bytes).unwrap(), list);
    }
}

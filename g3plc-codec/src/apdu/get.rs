//! GET request/response APDUs

use g3plc_core::{AttributeDescriptor, DataAccessResult, DataValue, G3Error, G3Result};

use crate::apdu::selector::AccessSelector;
use crate::apdu::{decode_descriptor, encode_descriptor, tags};
use crate::axdr::{AxdrDecoder, AxdrEncoder};

const CHOICE_NORMAL: u8 = 1;
const CHOICE_NEXT: u8 = 2;
const CHOICE_WITH_LIST: u8 = 3;
const CHOICE_WITH_DATABLOCK: u8 = 2;

/// One requested object with its optional selective access
#[derive(Debug, Clone, PartialEq)]
pub struct GetItem {
    pub descriptor: AttributeDescriptor,
    pub selector: Option<AccessSelector>,
}

impl GetItem {
    pub fn new(descriptor: AttributeDescriptor) -> Self {
        Self {
            descriptor,
            selector: None,
        }
    }

    pub fn with_selector(descriptor: AttributeDescriptor, selector: AccessSelector) -> Self {
        Self {
            descriptor,
            selector: Some(selector),
        }
    }

    pub(crate) fn encode(&self, encoder: &mut AxdrEncoder) -> G3Result<()> {
        encode_descriptor(encoder, &self.descriptor);
        match &self.selector {
            None => encoder.write_u8(0x00),
            Some(selector) => {
                encoder.write_u8(0x01);
                selector.encode(encoder)?;
            }
        }
        Ok(())
    }

    pub(crate) fn decode(decoder: &mut AxdrDecoder<'_>) -> G3Result<Self> {
        let descriptor = decode_descriptor(decoder)?;
        let selector = match decoder.read_u8()? {
            0x00 => None,
            0x01 => Some(AccessSelector::decode(decoder)?),
            other => {
                return Err(G3Error::Decode(format!(
                    "invalid access-selection flag 0x{:02X}",
                    other
                )));
            }
        };
        Ok(Self {
            descriptor,
            selector,
        })
    }
}

/// GET-request APDU
#[derive(Debug, Clone, PartialEq)]
pub enum GetRequest {
    Normal { invoke_id: u8, item: GetItem },
    Next { invoke_id: u8, block_number: u32 },
    WithList { invoke_id: u8, items: Vec<GetItem> },
}

impl GetRequest {
    pub fn invoke_id(&self) -> u8 {
        match self {
            Self::Normal { invoke_id, .. }
            | Self::Next { invoke_id, .. }
            | Self::WithList { invoke_id, .. } => *invoke_id,
        }
    }

    pub fn encode(&self) -> G3Result<Vec<u8>> {
        let mut encoder = AxdrEncoder::new();
        encoder.write_u8(tags::GET_REQUEST);
        match self {
            Self::Normal { invoke_id, item } => {
                encoder.write_u8(CHOICE_NORMAL);
                encoder.write_u8(*invoke_id);
                item.encode(&mut encoder)?;
            }
            Self::Next {
                invoke_id,
                block_number,
            } => {
                encoder.write_u8(CHOICE_NEXT);
                encoder.write_u8(*invoke_id);
                encoder.write_u32(*block_number);
            }
            Self::WithList { invoke_id, items } => {
                encoder.write_u8(CHOICE_WITH_LIST);
                encoder.write_u8(*invoke_id);
                encoder.encode_length(items.len())?;
                for item in items {
                    item.encode(&mut encoder)?;
                }
            }
        }
        Ok(encoder.into_bytes())
    }

    pub fn decode(bytes: &[u8]) -> G3Result<Self> {
        let mut decoder = AxdrDecoder::new(bytes);
        let tag = decoder.read_u8()?;
        if tag != tags::GET_REQUEST {
            return Err(G3Error::Decode(format!("not a GET-request: 0x{:02X}", tag)));
        }
        let choice = decoder.read_u8()?;
        let invoke_id = decoder.read_u8()?;
        match choice {
            CHOICE_NORMAL => Ok(Self::Normal {
                invoke_id,
                item: GetItem::decode(&mut decoder)?,
            }),
            CHOICE_NEXT => Ok(Self::Next {
                invoke_id,
                block_number: decoder.read_u32()?,
            }),
            CHOICE_WITH_LIST => {
                let count = decoder.decode_length()?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(GetItem::decode(&mut decoder)?);
                }
                Ok(Self::WithList { invoke_id, items })
            }
            other => Err(G3Error::Decode(format!(
                "unknown GET-request choice {}",
                other
            ))),
        }
    }
}

/// Get-Data-Result CHOICE
#[derive(Debug, Clone, PartialEq)]
pub enum GetDataResult {
    Data(DataValue),
    AccessError(DataAccessResult),
}

impl GetDataResult {
    fn encode(&self, encoder: &mut AxdrEncoder) -> G3Result<()> {
        match self {
            Self::Data(value) => {
                encoder.write_u8(0x00);
                encoder.encode_data(value)
            }
            Self::AccessError(dar) => {
                encoder.write_u8(0x01);
                encoder.write_u8(*dar as u8);
                Ok(())
            }
        }
    }

    fn decode(decoder: &mut AxdrDecoder<'_>) -> G3Result<Self> {
        match decoder.read_u8()? {
            0x00 => Ok(Self::Data(decoder.decode_data()?)),
            0x01 => {
                let code = decoder.read_u8()?;
                let dar = DataAccessResult::from_u8(code).ok_or_else(|| {
                    G3Error::Decode(format!("unknown data-access-result {}", code))
                })?;
                Ok(Self::AccessError(dar))
            }
            other => Err(G3Error::Decode(format!(
                "invalid Get-Data-Result choice {}",
                other
            ))),
        }
    }
}

/// Raw-data or access error inside a datablock response
#[derive(Debug, Clone, PartialEq)]
pub enum BlockResult {
    Raw(Vec<u8>),
    AccessError(DataAccessResult),
}

/// GET-response APDU
#[derive(Debug, Clone, PartialEq)]
pub enum GetResponse {
    Normal {
        invoke_id: u8,
        result: GetDataResult,
    },
    WithDataBlock {
        invoke_id: u8,
        last_block: bool,
        block_number: u32,
        result: BlockResult,
    },
    WithList {
        invoke_id: u8,
        results: Vec<GetDataResult>,
    },
}

impl GetResponse {
    pub fn invoke_id(&self) -> u8 {
        match self {
            Self::Normal { invoke_id, .. }
            | Self::WithDataBlock { invoke_id, .. }
            | Self::WithList { invoke_id, .. } => *invoke_id,
        }
    }

    pub fn encode(&self) -> G3Result<Vec<u8>> {
        let mut encoder = AxdrEncoder::new();
        encoder.write_u8(tags::GET_RESPONSE);
        match self {
            Self::Normal { invoke_id, result } => {
                encoder.write_u8(CHOICE_NORMAL);
                encoder.write_u8(*invoke_id);
                result.encode(&mut encoder)?;
            }
            Self::WithDataBlock {
                invoke_id,
                last_block,
                block_number,
                result,
            } => {
                encoder.write_u8(CHOICE_WITH_DATABLOCK);
                encoder.write_u8(*invoke_id);
                encoder.write_u8(if *last_block { 0xFF } else { 0x00 });
                encoder.write_u32(*block_number);
                match result {
                    BlockResult::Raw(raw) => {
                        encoder.write_u8(0x00);
                        encoder.encode_octet_string(raw)?;
                    }
                    BlockResult::AccessError(dar) => {
                        encoder.write_u8(0x01);
                        encoder.write_u8(*dar as u8);
                    }
                }
            }
            Self::WithList { invoke_id, results } => {
                encoder.write_u8(CHOICE_WITH_LIST);
                encoder.write_u8(*invoke_id);
                encoder.encode_length(results.len())?;
                for result in results {
                    result.encode(&mut encoder)?;
                }
            }
        }
        Ok(encoder.into_bytes())
    }

    pub fn decode(bytes: &[u8]) -> G3Result<Self> {
        let mut decoder = AxdrDecoder::new(bytes);
        let tag = decoder.read_u8()?;
        if tag != tags::GET_RESPONSE {
            return Err(G3Error::Decode(format!("not a GET-response: 0x{:02X}", tag)));
        }
        let choice = decoder.read_u8()?;
        let invoke_id = decoder.read_u8()?;
        match choice {
            CHOICE_NORMAL => Ok(Self::Normal {
                invoke_id,
                result: GetDataResult::decode(&mut decoder)?,
            }),
            CHOICE_WITH_DATABLOCK => {
                let last_block = decoder.read_u8()? != 0;
                let block_number = decoder.read_u32()?;
                let result = match decoder.read_u8()? {
                    0x00 => {
                        let len = decoder.decode_length()?;
                        BlockResult::Raw(decoder.read_bytes(len)?.to_vec())
                    }
                    0x01 => {
                        let code = decoder.read_u8()?;
                        let dar = DataAccessResult::from_u8(code).ok_or_else(|| {
                            G3Error::Decode(format!("unknown data-access-result {}", code))
                        })?;
                        BlockResult::AccessError(dar)
                    }
                    other => {
                        return Err(G3Error::Decode(format!(
                            "invalid datablock result choice {}",
                            other
                        )));
                    }
                };
                Ok(Self::WithDataBlock {
                    invoke_id,
                    last_block,
                    block_number,
                    result,
                })
            }
            CHOICE_WITH_LIST => {
                let count = decoder.decode_length()?;
                let mut results = Vec::with_capacity(count);
                for _ in 0..count {
                    results.push(GetDataResult::decode(&mut decoder)?);
                }
                Ok(Self::WithList { invoke_id, results })
            }
            other => Err(G3Error::Decode(format!(
                "unknown GET-response choice {}",
                other
            ))),
        }
    }
}

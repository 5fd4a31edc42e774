//! DLMS server endpoint
//!
//! Up to [`MAX_ASSOCIATIONS`] server-side association slots share one OBIS
//! object registry. The server is synchronous and transport-agnostic: the
//! session layer resolves the wrapper port pair to a slot index, hands the
//! APDU to [`DlmsServer::handle_apdu`] and transmits whatever comes back.
//!
//! Responses larger than the negotiated APDU size are served through
//! GET-response-with-datablock; the raw response encoding is snapshotted at
//! request time and sliced on each GET-request-next.

use g3plc_codec::acse::{
    Aare, Aarq, InitiateResponse, Rlre, Rlrq, SourceDiagnostic, context, mechanism,
    tags as acse_tags,
};
use g3plc_codec::apdu::{
    BlockResult, GetDataResult, GetItem, GetRequest, GetResponse, SetRequest, SetResponse,
    tags as apdu_tags,
};
use g3plc_codec::axdr::{self, decode_length};
use g3plc_core::{
    AssociationConfig, AssociationResult, AuthMechanism, DLMS_VERSION, DataAccessResult,
    DataValue, Eui64, G3Error, G3Result, InitiateError, MAX_ASSOCIATIONS, ReleaseReason,
    SERVER_CONFORMANCE, SERVER_MAX_APDU_SIZE, ServiceProviderDiagnostic, ServiceUserDiagnostic,
};

use crate::registry::ObjectRegistry;

/// Smallest client-max-receive-pdu-size worth negotiating with
const MIN_PDU_SIZE: u16 = 12;

/// Fixed bytes of a GET-response-with-datablock around the raw slice: APDU
/// tag, choice, invoke id, last-block flag, block number and the raw-data
/// choice with its worst-case length field
const BLOCK_OVERHEAD: usize = 12;

/// State of one block transfer in progress
struct LongGetTransfer {
    invoke_id: u8,
    snapshot: Vec<u8>,
    offset: usize,
    /// Block number of the most recently sent block
    block_number: u32,
}

struct ServerAssociation {
    config: AssociationConfig,
    associated: bool,
    negotiated_conformance: u32,
    max_apdu_size: u16,
    long_get: Option<LongGetTransfer>,
}

impl ServerAssociation {
    fn new(config: AssociationConfig) -> Self {
        Self {
            config,
            associated: false,
            negotiated_conformance: 0,
            max_apdu_size: SERVER_MAX_APDU_SIZE,
            long_get: None,
        }
    }
}

/// DLMS server over four association slots and one object registry.
pub struct DlmsServer {
    own_address: Eui64,
    slots: [Option<ServerAssociation>; MAX_ASSOCIATIONS],
    registry: ObjectRegistry,
}

impl DlmsServer {
    pub fn new(own_address: Eui64) -> Self {
        Self {
            own_address,
            slots: [None, None, None, None],
            registry: ObjectRegistry::new(),
        }
    }

    /// Server with the stock four-slot layout: management, reading and
    /// firmware associations with their fixed passwords, plus the public
    /// association without authentication.
    pub fn with_reference_associations(own_address: Eui64) -> Self {
        let mut server = Self::new(own_address);
        server.slots[0] = Some(ServerAssociation::new(AssociationConfig::low_level(
            1,
            1,
            b"00000002",
        )));
        server.slots[1] = Some(ServerAssociation::new(AssociationConfig::low_level(
            2,
            1,
            b"00000001",
        )));
        server.slots[2] = Some(ServerAssociation::new(AssociationConfig::low_level(
            3,
            1,
            b"00000003",
        )));
        server.slots[3] = Some(ServerAssociation::new(AssociationConfig::lowest_level(
            16, 1,
        )));
        server
    }

    /// Configure the next free association slot, returning its index.
    pub fn add_association(&mut self, config: AssociationConfig) -> G3Result<usize> {
        if self
            .association_for_ports(config.source_wport, config.destination_wport)
            .is_some()
        {
            return Err(G3Error::Config(format!(
                "wrapper ports {}/{} already bound",
                config.source_wport, config.destination_wport
            )));
        }
        let index = self
            .slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or_else(|| {
                G3Error::Config(format!("all {} association slots in use", MAX_ASSOCIATIONS))
            })?;
        self.slots[index] = Some(ServerAssociation::new(config));
        Ok(index)
    }

    /// Slot whose port pair matches an inbound wrapper header
    pub fn association_for_ports(
        &self,
        source_wport: u16,
        destination_wport: u16,
    ) -> Option<usize> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            let slot = slot.as_ref()?;
            (slot.config.source_wport == source_wport
                && slot.config.destination_wport == destination_wport)
                .then_some(index)
        })
    }

    pub fn own_address(&self) -> &Eui64 {
        &self.own_address
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.registry
    }

    pub fn is_associated(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .and_then(|slot| slot.as_ref())
            .is_some_and(|slot| slot.associated)
    }

    /// Conformance granted to the peer, once associated
    pub fn negotiated_conformance(&self, index: usize) -> Option<u32> {
        self.slots
            .get(index)
            .and_then(|slot| slot.as_ref())
            .filter(|slot| slot.associated)
            .map(|slot| slot.negotiated_conformance)
    }

    /// Drop the association state of a slot, e.g. when the node leaves the
    /// network without releasing.
    pub fn reset(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index).and_then(|slot| slot.as_mut()) {
            slot.associated = false;
            slot.long_get = None;
        }
    }

    /// Process one inbound APDU for the given association slot.
    ///
    /// Returns the response APDU to transmit, or `None` where the protocol
    /// answers with silence (unknown tags, requests before association,
    /// undecodable service requests).
    pub fn handle_apdu(&mut self, index: usize, apdu: &[u8]) -> Option<Vec<u8>> {
        if index >= MAX_ASSOCIATIONS || self.slots[index].is_none() {
            log::warn!("APDU for unconfigured association {}", index);
            return None;
        }
        match *apdu.first()? {
            acse_tags::AARQ_APDU => self.on_aarq(index, apdu),
            acse_tags::RLRQ_APDU => self.on_rlrq(index, apdu),
            apdu_tags::GET_REQUEST => self.on_get(index, apdu),
            apdu_tags::SET_REQUEST => self.on_set(index, apdu),
            other => {
                log::debug!("unhandled APDU tag 0x{:02X} on association {}", other, index);
                None
            }
        }
    }

    fn on_aarq(&mut self, index: usize, apdu: &[u8]) -> Option<Vec<u8>> {
        // Any AARQ tears down what the slot had; re-association is allowed
        self.reset(index);

        if let Some(false) = protocol_version_supported(apdu) {
            log::warn!("AARQ with unsupported protocol version on association {}", index);
            return Self::encode_aare(Aare::rejected(
                AssociationResult::RejectedPermanent,
                SourceDiagnostic::Provider(ServiceProviderDiagnostic::NoCommonAcseVersion),
            ));
        }

        let aarq = match Aarq::decode(apdu) {
            Ok(aarq) => aarq,
            Err(e) => {
                log::warn!("AARQ decode failed: {}", e);
                return Self::encode_aare(Aare::rejected(
                    AssociationResult::RejectedPermanent,
                    SourceDiagnostic::User(ServiceUserDiagnostic::NoReasonGiven),
                ));
            }
        };

        if aarq.context_id != context::LOGICAL_NAME {
            log::warn!(
                "application context {} refused on association {}",
                aarq.context_id,
                index
            );
            return Self::encode_aare(Aare::rejected(
                AssociationResult::RejectedPermanent,
                SourceDiagnostic::User(ServiceUserDiagnostic::ApplicationContextNameNotSupported),
            ));
        }

        let Some(config) = self.slots[index].as_ref().map(|slot| slot.config.clone()) else {
            return None;
        };
        if let Some(diagnostic) = authentication_failure(&config, &self.own_address, &aarq) {
            log::warn!("authentication refused on association {}: {:?}", index, diagnostic);
            return Self::encode_aare(Aare::rejected(
                AssociationResult::RejectedPermanent,
                SourceDiagnostic::User(diagnostic),
            ));
        }

        let initiate = &aarq.initiate;
        if initiate.dlms_version < DLMS_VERSION {
            return Self::encode_aare(Aare::initiate_error(
                AssociationResult::RejectedPermanent,
                InitiateError::DlmsVersionTooLow,
            ));
        }
        if initiate.client_max_pdu_size < MIN_PDU_SIZE {
            return Self::encode_aare(Aare::initiate_error(
                AssociationResult::RejectedPermanent,
                InitiateError::PduSizeTooShort,
            ));
        }
        if initiate.proposed_conformance & SERVER_CONFORMANCE == 0 {
            return Self::encode_aare(Aare::initiate_error(
                AssociationResult::RejectedPermanent,
                InitiateError::IncompatibleConformance,
            ));
        }

        let negotiated = initiate.proposed_conformance & SERVER_CONFORMANCE;
        let max_apdu = initiate.client_max_pdu_size.min(SERVER_MAX_APDU_SIZE);
        if let Some(slot) = self.slots[index].as_mut() {
            slot.associated = true;
            slot.negotiated_conformance = negotiated;
            slot.max_apdu_size = max_apdu;
        }
        log::info!(
            "association {} established, conformance 0x{:06X}, max APDU {}",
            index,
            negotiated,
            max_apdu
        );
        Self::encode_aare(Aare::accepted(InitiateResponse::new(negotiated, max_apdu)))
    }

    fn on_rlrq(&mut self, index: usize, apdu: &[u8]) -> Option<Vec<u8>> {
        let reason = match Rlrq::decode(apdu) {
            Ok(rlrq) => rlrq.reason,
            Err(e) => {
                log::warn!("RLRQ decode failed, releasing anyway: {}", e);
                ReleaseReason::Normal
            }
        };
        log::info!("association {} released ({:?})", index, reason);
        self.reset(index);
        Some(Rlre::new(ReleaseReason::Normal).encode())
    }

    fn on_get(&mut self, index: usize, apdu: &[u8]) -> Option<Vec<u8>> {
        let request = match GetRequest::decode(apdu) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("GET-request decode failed: {}", e);
                return None;
            }
        };
        let Some(slot) = self.slots[index].as_ref() else {
            return None;
        };
        if !slot.associated {
            log::debug!("GET before association on slot {}", index);
            return None;
        }
        let max_apdu = slot.max_apdu_size as usize;

        match request {
            GetRequest::Next {
                invoke_id,
                block_number,
            } => self.on_get_next(index, invoke_id, block_number),
            GetRequest::Normal { invoke_id, item } => {
                if self.abort_long_get(index) {
                    return Self::encode_get(GetResponse::Normal {
                        invoke_id,
                        result: GetDataResult::AccessError(DataAccessResult::LongGetAborted),
                    });
                }
                match self.read_attribute(index, &item) {
                    GetDataResult::Data(value) => {
                        let encoded = match axdr::encode_value(&value) {
                            Ok(encoded) => encoded,
                            Err(e) => {
                                log::error!("attribute encode failed for {}: {}", item.descriptor, e);
                                return Self::encode_get(GetResponse::Normal {
                                    invoke_id,
                                    result: GetDataResult::AccessError(
                                        DataAccessResult::OtherReason,
                                    ),
                                });
                            }
                        };
                        if 4 + encoded.len() <= max_apdu {
                            Self::encode_get(GetResponse::Normal {
                                invoke_id,
                                result: GetDataResult::Data(value),
                            })
                        } else {
                            self.start_long_get(index, invoke_id, encoded)
                        }
                    }
                    error => Self::encode_get(GetResponse::Normal {
                        invoke_id,
                        result: error,
                    }),
                }
            }
            GetRequest::WithList { invoke_id, items } => {
                if self.abort_long_get(index) {
                    let results = vec![
                        GetDataResult::AccessError(DataAccessResult::LongGetAborted);
                        items.len()
                    ];
                    return Self::encode_get(GetResponse::WithList { invoke_id, results });
                }
                let results: Vec<GetDataResult> = items
                    .iter()
                    .map(|item| self.read_attribute(index, item))
                    .collect();
                let snapshot = match encode_result_list(&results) {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        log::error!("list response encode failed: {}", e);
                        let results = vec![
                            GetDataResult::AccessError(DataAccessResult::OtherReason);
                            items.len()
                        ];
                        return Self::encode_get(GetResponse::WithList { invoke_id, results });
                    }
                };
                if 3 + snapshot.len() <= max_apdu {
                    Self::encode_get(GetResponse::WithList { invoke_id, results })
                } else {
                    self.start_long_get(index, invoke_id, snapshot)
                }
            }
        }
    }

    /// First block of a response that exceeds the negotiated APDU size.
    ///
    /// The snapshot is strictly longer than one block here, so the first
    /// block is never the last.
    fn start_long_get(&mut self, index: usize, invoke_id: u8, snapshot: Vec<u8>) -> Option<Vec<u8>> {
        let slot = self.slots[index].as_mut()?;
        let capacity = block_capacity(slot.max_apdu_size);
        let chunk_len = capacity.min(snapshot.len());
        let first = snapshot[..chunk_len].to_vec();
        log::debug!(
            "association {} long GET: {} bytes in {}-byte blocks",
            index,
            snapshot.len(),
            capacity
        );
        slot.long_get = Some(LongGetTransfer {
            invoke_id,
            snapshot,
            offset: chunk_len,
            block_number: 1,
        });
        Self::encode_get(GetResponse::WithDataBlock {
            invoke_id,
            last_block: false,
            block_number: 1,
            result: BlockResult::Raw(first),
        })
    }

    fn on_get_next(&mut self, index: usize, invoke_id: u8, block_number: u32) -> Option<Vec<u8>> {
        let slot = self.slots[index].as_mut()?;
        let Some(mut transfer) = slot.long_get.take() else {
            log::debug!("GET-next without a transfer on association {}", index);
            return Self::encode_get(GetResponse::WithDataBlock {
                invoke_id,
                last_block: true,
                block_number,
                result: BlockResult::AccessError(DataAccessResult::NoLongGetInProgress),
            });
        };
        if block_number != transfer.block_number {
            log::warn!(
                "association {} acknowledged block {}, expected {}; transfer dropped",
                index,
                block_number,
                transfer.block_number
            );
            return Self::encode_get(GetResponse::WithDataBlock {
                invoke_id,
                last_block: true,
                block_number,
                result: BlockResult::AccessError(DataAccessResult::DataBlockNumberInvalid),
            });
        }

        let capacity = block_capacity(slot.max_apdu_size);
        let end = (transfer.offset + capacity).min(transfer.snapshot.len());
        let chunk = transfer.snapshot[transfer.offset..end].to_vec();
        let last_block = end == transfer.snapshot.len();
        transfer.offset = end;
        transfer.block_number += 1;
        let response = GetResponse::WithDataBlock {
            invoke_id: transfer.invoke_id,
            last_block,
            block_number: transfer.block_number,
            result: BlockResult::Raw(chunk),
        };
        if !last_block {
            slot.long_get = Some(transfer);
        }
        Self::encode_get(response)
    }

    fn on_set(&mut self, index: usize, apdu: &[u8]) -> Option<Vec<u8>> {
        let request = match SetRequest::decode(apdu) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("SET-request decode failed: {}", e);
                return None;
            }
        };
        let Some(slot) = self.slots[index].as_ref() else {
            return None;
        };
        if !slot.associated {
            log::debug!("SET before association on slot {}", index);
            return None;
        }
        // A SET kills any block transfer but is served on its own terms
        self.abort_long_get(index);

        match request {
            SetRequest::Normal {
                invoke_id,
                item,
                value,
            } => {
                let result = self.write_attribute(index, &item, value);
                Self::encode_set(SetResponse::Normal { invoke_id, result })
            }
            SetRequest::WithList {
                invoke_id,
                items,
                values,
            } => {
                let results = items
                    .iter()
                    .zip(values)
                    .map(|(item, value)| self.write_attribute(index, item, value))
                    .collect();
                Self::encode_set(SetResponse::WithList { invoke_id, results })
            }
        }
    }

    fn read_attribute(&mut self, index: usize, item: &GetItem) -> GetDataResult {
        let descriptor = &item.descriptor;
        let Some(entry) = self.registry.find_mut(&descriptor.obis, descriptor.class_id) else {
            log::debug!("GET for unknown object {}", descriptor);
            return GetDataResult::AccessError(DataAccessResult::ObjectUndefined);
        };
        if !entry.rights.can_read(index, descriptor.attribute) {
            return GetDataResult::AccessError(DataAccessResult::ScopeOfAccessViolated);
        }
        if descriptor.attribute == 1 {
            return GetDataResult::Data(DataValue::octets(descriptor.obis.as_bytes()));
        }
        match entry
            .object
            .get_attribute(descriptor.attribute, item.selector.as_ref())
        {
            Ok(value) => GetDataResult::Data(value),
            Err(dar) => GetDataResult::AccessError(dar),
        }
    }

    fn write_attribute(&mut self, index: usize, item: &GetItem, value: DataValue) -> DataAccessResult {
        let descriptor = &item.descriptor;
        let Some(entry) = self.registry.find_mut(&descriptor.obis, descriptor.class_id) else {
            log::debug!("SET for unknown object {}", descriptor);
            return DataAccessResult::ObjectUndefined;
        };
        if descriptor.attribute == 1 || !entry.rights.can_write(index, descriptor.attribute) {
            return DataAccessResult::ReadWriteDenied;
        }
        match entry.object.set_attribute(descriptor.attribute, value) {
            Ok(()) => DataAccessResult::Success,
            Err(dar) => dar,
        }
    }

    /// Clears an in-progress block transfer, reporting whether one existed
    fn abort_long_get(&mut self, index: usize) -> bool {
        let aborted = self.slots[index]
            .as_mut()
            .is_some_and(|slot| slot.long_get.take().is_some());
        if aborted {
            log::debug!("block transfer aborted on association {}", index);
        }
        aborted
    }

    fn encode_aare(aare: Aare) -> Option<Vec<u8>> {
        match aare.encode() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::error!("AARE encode failed: {}", e);
                None
            }
        }
    }

    fn encode_get(response: GetResponse) -> Option<Vec<u8>> {
        match response.encode() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::error!("GET-response encode failed: {}", e);
                None
            }
        }
    }

    fn encode_set(response: SetResponse) -> Option<Vec<u8>> {
        match response.encode() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::error!("SET-response encode failed: {}", e);
                None
            }
        }
    }
}

/// Usable block payload under the negotiated APDU size
fn block_capacity(max_apdu: u16) -> usize {
    (max_apdu as usize).saturating_sub(BLOCK_OVERHEAD).max(1)
}

/// Raw form of a sliced list response: one count byte, then each
/// Get-Data-Result as its choice byte and payload
fn encode_result_list(results: &[GetDataResult]) -> g3plc_core::G3Result<Vec<u8>> {
    let mut out = vec![results.len() as u8];
    for result in results {
        match result {
            GetDataResult::Data(value) => {
                out.push(0x00);
                out.extend_from_slice(&axdr::encode_value(value)?);
            }
            GetDataResult::AccessError(dar) => {
                out.push(0x01);
                out.push(*dar as u8);
            }
        }
    }
    Ok(out)
}

/// Pre-scans a raw AARQ for an explicit protocol-version bit string.
///
/// The full decoder tolerates and skips this field, so the version check has
/// to look at the raw bytes. Returns `None` when the field is absent or the
/// APDU is too malformed to walk; the decoder reports those cases itself.
fn protocol_version_supported(bytes: &[u8]) -> Option<bool> {
    if bytes.first() != Some(&acse_tags::AARQ_APDU) {
        return None;
    }
    let (body_len, consumed) = decode_length(bytes.get(1..)?).ok()?;
    let body = bytes.get(1 + consumed..1 + consumed + body_len as usize)?;
    let mut offset = 0;
    while offset < body.len() {
        let tag = body[offset];
        let (field_len, len_consumed) = decode_length(body.get(offset + 1..)?).ok()?;
        let start = offset + 1 + len_consumed;
        let field = body.get(start..start + field_len as usize)?;
        if tag == acse_tags::AARQ_PROTOCOL_VERSION {
            // BIT STRING: pad count first, bits MSB-first; version1 is bit 0
            return Some(field.len() >= 2 && field[1] & 0x80 != 0);
        }
        offset = start + field_len as usize;
    }
    None
}

/// Checks the calling authentication value against the slot configuration,
/// returning the diagnostic to reject with
fn authentication_failure(
    config: &AssociationConfig,
    own_address: &Eui64,
    aarq: &Aarq,
) -> Option<ServiceUserDiagnostic> {
    match config.mechanism {
        AuthMechanism::Lowest => None,
        AuthMechanism::LowLevel => match aarq.mechanism_id {
            None => Some(ServiceUserDiagnostic::AuthenticationRequired),
            Some(mechanism::LOW_LEVEL) => {
                let expected = config.password_for(own_address);
                match (&aarq.password, expected) {
                    (Some(given), Some(wanted)) if given.as_slice() == wanted => None,
                    _ => Some(ServiceUserDiagnostic::AuthenticationFailure),
                }
            }
            Some(_) => Some(ServiceUserDiagnostic::AuthenticationMechanismNameNotRecognised),
        },
    }
}

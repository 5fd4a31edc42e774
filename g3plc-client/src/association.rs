//! Client-side association and request state machine
//!
//! One [`DlmsClient`] holds up to [`MAX_ASSOCIATIONS`] association slots,
//! each a configured port pair plus authentication settings. A slot is
//! bound to one meter at a time: the caller opens it with
//! [`DlmsClient::aarq_request`], runs GET/SET exchanges, releases it and
//! rebinds it to the next meter.
//!
//! The machine is sans-io. Outbound APDUs queue as [`DataRequest`]
//! values, completed exchanges queue as [`DataIndication`] values, and
//! response timeouts advance through [`DlmsClient::tick`]. Request
//! methods answer synchronously with a [`ClientResult`]: `Waiting` when
//! the APDU was queued, an error code otherwise (a rejected request
//! never queues anything).

use std::collections::VecDeque;

use g3plc_codec::acse::{Aare, AareUserInfo, Aarq, InitiateRequest, Rlre, Rlrq, tags as acse_tags};
use g3plc_codec::apdu::{
    BlockResult, GetDataResult, GetItem, GetRequest, GetResponse, SetRequest, SetResponse,
    tags as apdu_tags,
};
use g3plc_codec::axdr::AxdrDecoder;
use g3plc_core::{
    AssociationConfig, CLIENT_CONFORMANCE, ClientResult, DataAccessResult, DataValue, Eui64,
    G3Error, G3Result, MAX_ASSOCIATIONS, MAX_OBJECTS_PER_REQUEST, ReleaseReason, ShortAddress,
    VAA_NAME,
};

/// How long a sent request waits for its response
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u32 = 50_000;

/// client-max-receive-pdu-size proposed in the AARQ
pub const CLIENT_MAX_PDU_SIZE: u16 = 0x0400;

/// Lifecycle of one association slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssociationState {
    #[default]
    NotAssociated,
    /// AARQ sent, waiting for the AARE
    AssociationPending,
    Associated,
    /// RLRQ sent, waiting for the RLRE
    ReleasePending,
}

impl std::fmt::Display for AssociationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssociationState::NotAssociated => "not associated",
            AssociationState::AssociationPending => "association pending",
            AssociationState::Associated => "associated",
            AssociationState::ReleasePending => "release pending",
        };
        f.write_str(name)
    }
}

/// Outbound APDU with its addressing, handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub destination: ShortAddress,
    pub source_wport: u16,
    pub destination_wport: u16,
    pub apdu: Vec<u8>,
}

/// Payload of a completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    None,
    /// Parameters negotiated by an accepted AARE
    Association { conformance: u32, max_apdu_size: u16 },
    /// One result per requested attribute
    Get(Vec<GetDataResult>),
    /// One result per written attribute
    Set(Vec<DataAccessResult>),
    Release(ReleaseReason),
}

/// One exchange outcome delivered to the caller.
///
/// `last_fragment` is false for intermediate block-transfer fragments;
/// callers advancing on terminal results must check it together with
/// [`ClientResult::is_terminal`].
#[derive(Debug, Clone, PartialEq)]
pub struct DataIndication {
    pub association: usize,
    pub node: ShortAddress,
    pub result: ClientResult,
    pub last_fragment: bool,
    pub data: ResponseData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    Association,
    Get { with_list: bool },
    Set,
    Release,
}

#[derive(Debug)]
struct Pending {
    kind: PendingKind,
    invoke_id: u8,
    /// Block-transfer reassembly buffer
    assembled: Vec<u8>,
}

impl Pending {
    fn new(kind: PendingKind, invoke_id: u8) -> Self {
        Self {
            kind,
            invoke_id,
            assembled: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Association {
    config: AssociationConfig,
    state: AssociationState,
    node: Option<ShortAddress>,
    pending: Option<Pending>,
    timer: Option<u32>,
    invoke_counter: u8,
    negotiated_conformance: u32,
    server_max_pdu_size: u16,
}

impl Association {
    fn new(config: AssociationConfig) -> Self {
        Self {
            config,
            state: AssociationState::NotAssociated,
            node: None,
            pending: None,
            timer: None,
            invoke_counter: 0,
            negotiated_conformance: 0,
            server_max_pdu_size: 0,
        }
    }

    fn next_invoke_id(&mut self) -> u8 {
        self.invoke_counter = self.invoke_counter.wrapping_add(1);
        // high priority, confirmed service class
        0xC0 | (self.invoke_counter & 0x0F)
    }
}

/// DLMS client endpoint over up to four association slots.
pub struct DlmsClient {
    slots: [Option<Association>; MAX_ASSOCIATIONS],
    response_timeout_ms: u32,
    transmit: VecDeque<DataRequest>,
    indications: VecDeque<DataIndication>,
}

impl DlmsClient {
    pub fn new() -> Self {
        Self {
            slots: [None, None, None, None],
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            transmit: VecDeque::new(),
            indications: VecDeque::new(),
        }
    }

    /// Client with the stock four-slot layout: management, reading and
    /// firmware associations with their fixed passwords, plus the public
    /// client without authentication.
    pub fn with_reference_associations() -> Self {
        let mut client = Self::new();
        client.slots[0] = Some(Association::new(AssociationConfig::low_level(
            1,
            1,
            b"00000002",
        )));
        client.slots[1] = Some(Association::new(AssociationConfig::low_level(
            2,
            1,
            b"00000001",
        )));
        client.slots[2] = Some(Association::new(AssociationConfig::low_level(
            3,
            1,
            b"00000003",
        )));
        client.slots[3] = Some(Association::new(AssociationConfig::lowest_level(16, 1)));
        client
    }

    /// Install or replace the slot at `index`.
    pub fn add_association(&mut self, index: usize, config: AssociationConfig) -> G3Result<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| G3Error::Config(format!("association index {} out of range", index)))?;
        *slot = Some(Association::new(config));
        Ok(())
    }

    pub fn set_response_timeout(&mut self, timeout_ms: u32) {
        self.response_timeout_ms = timeout_ms;
    }

    pub fn state(&self, index: usize) -> AssociationState {
        self.slots
            .get(index)
            .and_then(|slot| slot.as_ref())
            .map(|slot| slot.state)
            .unwrap_or_default()
    }

    pub fn is_associated(&self, index: usize) -> bool {
        self.state(index) == AssociationState::Associated
    }

    /// Conformance and max APDU size granted by the server, once associated
    pub fn negotiated(&self, index: usize) -> Option<(u32, u16)> {
        let slot = self.slots.get(index)?.as_ref()?;
        (slot.state == AssociationState::Associated)
            .then_some((slot.negotiated_conformance, slot.server_max_pdu_size))
    }

    /// Slot whose port pair matches an inbound wrapper header
    pub fn assoc_for_ports(&self, source_wport: u16, destination_wport: u16) -> Option<usize> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            let slot = slot.as_ref()?;
            (slot.config.destination_wport == source_wport
                && slot.config.source_wport == destination_wport)
                .then_some(index)
        })
    }

    /// Take the next outbound APDU, if any
    pub fn poll_transmit(&mut self) -> Option<DataRequest> {
        self.transmit.pop_front()
    }

    /// Take the next completed exchange, if any
    pub fn poll_indication(&mut self) -> Option<DataIndication> {
        self.indications.pop_front()
    }

    /// Open the association at `index` towards the given meter.
    pub fn aarq_request(&mut self, index: usize, node: ShortAddress, peer: &Eui64) -> ClientResult {
        let timeout = self.response_timeout_ms;
        let Some(slot) = self.slots.get_mut(index).and_then(|slot| slot.as_mut()) else {
            return ClientResult::AaIdxError;
        };
        if slot.pending.is_some() {
            return ClientResult::TxError;
        }
        let initiate = InitiateRequest::new(CLIENT_CONFORMANCE, CLIENT_MAX_PDU_SIZE);
        let aarq = match slot.config.password_for(peer) {
            Some(password) => Aarq::low_level(&password, initiate),
            None => Aarq::lowest_level(initiate),
        };
        let apdu = match aarq.encode() {
            Ok(apdu) => apdu,
            Err(e) => {
                log::warn!("AARQ encode failed: {}", e);
                return ClientResult::FormatError;
            }
        };
        slot.node = Some(node);
        slot.state = AssociationState::AssociationPending;
        slot.pending = Some(Pending::new(PendingKind::Association, 0));
        slot.timer = Some(timeout);
        let request = DataRequest {
            destination: node,
            source_wport: slot.config.source_wport,
            destination_wport: slot.config.destination_wport,
            apdu,
        };
        self.transmit.push_back(request);
        ClientResult::Waiting
    }

    /// GET a single attribute.
    pub fn object_request(&mut self, index: usize, item: GetItem) -> ClientResult {
        let timeout = self.response_timeout_ms;
        let Some(slot) = self.slots.get_mut(index).and_then(|slot| slot.as_mut()) else {
            return ClientResult::AaIdxError;
        };
        if slot.state != AssociationState::Associated || slot.pending.is_some() {
            return ClientResult::TxError;
        }
        let invoke_id = slot.next_invoke_id();
        let request = GetRequest::Normal { invoke_id, item };
        Self::submit(
            slot,
            &mut self.transmit,
            request.encode(),
            Pending::new(PendingKind::Get { with_list: false }, invoke_id),
            timeout,
        )
    }

    /// GET several attributes in one request.
    pub fn list_request(&mut self, index: usize, items: Vec<GetItem>) -> ClientResult {
        if items.is_empty() || items.len() > MAX_OBJECTS_PER_REQUEST {
            return ClientResult::FormatError;
        }
        let timeout = self.response_timeout_ms;
        let Some(slot) = self.slots.get_mut(index).and_then(|slot| slot.as_mut()) else {
            return ClientResult::AaIdxError;
        };
        if slot.state != AssociationState::Associated || slot.pending.is_some() {
            return ClientResult::TxError;
        }
        let invoke_id = slot.next_invoke_id();
        let request = GetRequest::WithList { invoke_id, items };
        Self::submit(
            slot,
            &mut self.transmit,
            request.encode(),
            Pending::new(PendingKind::Get { with_list: true }, invoke_id),
            timeout,
        )
    }

    /// SET a single attribute.
    pub fn object_set(&mut self, index: usize, item: GetItem, value: DataValue) -> ClientResult {
        let timeout = self.response_timeout_ms;
        let Some(slot) = self.slots.get_mut(index).and_then(|slot| slot.as_mut()) else {
            return ClientResult::AaIdxError;
        };
        if slot.state != AssociationState::Associated || slot.pending.is_some() {
            return ClientResult::TxError;
        }
        let invoke_id = slot.next_invoke_id();
        let request = SetRequest::Normal {
            invoke_id,
            item,
            value,
        };
        Self::submit(
            slot,
            &mut self.transmit,
            request.encode(),
            Pending::new(PendingKind::Set, invoke_id),
            timeout,
        )
    }

    /// SET several attributes in one request.
    pub fn list_set(
        &mut self,
        index: usize,
        items: Vec<GetItem>,
        values: Vec<DataValue>,
    ) -> ClientResult {
        if items.is_empty() || items.len() > MAX_OBJECTS_PER_REQUEST || items.len() != values.len()
        {
            return ClientResult::FormatError;
        }
        let timeout = self.response_timeout_ms;
        let Some(slot) = self.slots.get_mut(index).and_then(|slot| slot.as_mut()) else {
            return ClientResult::AaIdxError;
        };
        if slot.state != AssociationState::Associated || slot.pending.is_some() {
            return ClientResult::TxError;
        }
        let invoke_id = slot.next_invoke_id();
        let request = SetRequest::WithList {
            invoke_id,
            items,
            values,
        };
        Self::submit(
            slot,
            &mut self.transmit,
            request.encode(),
            Pending::new(PendingKind::Set, invoke_id),
            timeout,
        )
    }

    /// Release the association at `index`.
    pub fn release_request(&mut self, index: usize, reason: ReleaseReason) -> ClientResult {
        let timeout = self.response_timeout_ms;
        let Some(slot) = self.slots.get_mut(index).and_then(|slot| slot.as_mut()) else {
            return ClientResult::AaIdxError;
        };
        if slot.state != AssociationState::Associated || slot.pending.is_some() {
            return ClientResult::TxError;
        }
        let apdu = Rlrq::new(reason).encode();
        let result = Self::submit(
            slot,
            &mut self.transmit,
            Ok(apdu),
            Pending::new(PendingKind::Release, 0),
            timeout,
        );
        if result == ClientResult::Waiting {
            slot.state = AssociationState::ReleasePending;
        }
        result
    }

    /// Abandon whatever the slot is doing and unbind it.
    pub fn abort(&mut self, index: usize) {
        let Some(slot) = self.slots.get_mut(index).and_then(|slot| slot.as_mut()) else {
            return;
        };
        slot.pending = None;
        slot.timer = None;
        slot.state = AssociationState::NotAssociated;
        slot.node = None;
    }

    /// The meter at `node` left the network; fail any slot bound to it.
    pub fn node_disconnected(&mut self, node: ShortAddress) {
        for index in 0..MAX_ASSOCIATIONS {
            let Some(slot) = self.slots[index].as_mut() else {
                continue;
            };
            if slot.node != Some(node) || slot.state == AssociationState::NotAssociated {
                continue;
            }
            slot.pending = None;
            slot.timer = None;
            slot.state = AssociationState::NotAssociated;
            slot.node = None;
            self.indications.push_back(DataIndication {
                association: index,
                node,
                result: ClientResult::Disconnected,
                last_fragment: true,
                data: ResponseData::None,
            });
        }
    }

    /// Advance response timers by `elapsed_ms` of wall time.
    pub fn tick(&mut self, elapsed_ms: u32) {
        for index in 0..MAX_ASSOCIATIONS {
            let Some(slot) = self.slots[index].as_mut() else {
                continue;
            };
            let Some(timer) = slot.timer else {
                continue;
            };
            let remaining = timer.saturating_sub(elapsed_ms);
            if remaining > 0 {
                slot.timer = Some(remaining);
                continue;
            }
            log::warn!("association {} response timeout", index);
            slot.timer = None;
            slot.pending = None;
            let node = slot.node.unwrap_or(ShortAddress::INVALID);
            if matches!(
                slot.state,
                AssociationState::AssociationPending | AssociationState::ReleasePending
            ) {
                slot.state = AssociationState::NotAssociated;
            }
            self.indications.push_back(DataIndication {
                association: index,
                node,
                result: ClientResult::Timeout,
                last_fragment: true,
                data: ResponseData::None,
            });
        }
    }

    /// Inbound APDU for the association at `index`.
    ///
    /// Unexpected or undecodable frames outside an exchange are dropped.
    pub fn handle_apdu(&mut self, index: usize, node: ShortAddress, apdu: &[u8]) {
        {
            let Some(slot) = self.slots.get(index).and_then(|slot| slot.as_ref()) else {
                log::debug!("APDU for unconfigured association {}", index);
                return;
            };
            if slot.node != Some(node) {
                log::debug!(
                    "APDU from unexpected node 0x{:04X} on association {}",
                    node.value(),
                    index
                );
                return;
            }
        }
        match apdu.first() {
            Some(&acse_tags::AARE_APDU) => self.on_aare(index, apdu),
            Some(&apdu_tags::GET_RESPONSE) => self.on_get_response(index, apdu),
            Some(&apdu_tags::SET_RESPONSE) => self.on_set_response(index, apdu),
            Some(&acse_tags::RLRE_APDU) => self.on_rlre(index, apdu),
            Some(tag) => {
                log::debug!("unhandled APDU tag 0x{:02X} on association {}", tag, index);
            }
            None => {}
        }
    }

    fn on_aare(&mut self, index: usize, apdu: &[u8]) {
        if !self.expects(index, |kind| kind == PendingKind::Association) {
            log::debug!("unsolicited AARE on association {}", index);
            return;
        }
        let aare = match Aare::decode(apdu) {
            Ok(aare) => aare,
            Err(e) => {
                log::warn!("AARE decode failed: {}", e);
                self.finish(index, ClientResult::RxFail, ResponseData::None);
                return;
            }
        };
        if !aare.is_accepted() {
            log::warn!(
                "association {} rejected: {:?} / {:?}",
                index,
                aare.result,
                aare.diagnostic
            );
            self.finish(index, ClientResult::Disconnected, ResponseData::None);
            return;
        }
        let Some(AareUserInfo::Initiate(response)) = aare.user_info else {
            log::warn!("accepted AARE without an InitiateResponse");
            self.finish(index, ClientResult::FormatError, ResponseData::None);
            return;
        };
        if response.vaa_name != VAA_NAME {
            log::warn!("AARE carries VAA name 0x{:04X}", response.vaa_name);
            self.finish(index, ClientResult::FormatError, ResponseData::None);
            return;
        }
        if let Some(slot) = self.slots[index].as_mut() {
            slot.state = AssociationState::Associated;
            slot.negotiated_conformance = response.negotiated_conformance;
            slot.server_max_pdu_size = response.server_max_pdu_size;
        }
        self.deliver(
            index,
            ClientResult::Success,
            ResponseData::Association {
                conformance: response.negotiated_conformance,
                max_apdu_size: response.server_max_pdu_size,
            },
        );
    }

    fn on_get_response(&mut self, index: usize, apdu: &[u8]) {
        if !self.expects(index, |kind| matches!(kind, PendingKind::Get { .. })) {
            log::debug!("unsolicited GET-response on association {}", index);
            return;
        }
        let response = match GetResponse::decode(apdu) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("GET-response decode failed: {}", e);
                self.finish(index, ClientResult::RxFail, ResponseData::None);
                return;
            }
        };
        match response {
            GetResponse::Normal { invoke_id, result } => {
                if !self.invoke_id_matches(index, invoke_id) {
                    return;
                }
                self.deliver(index, ClientResult::Success, ResponseData::Get(vec![result]));
            }
            GetResponse::WithList { invoke_id, results } => {
                if !self.invoke_id_matches(index, invoke_id) {
                    return;
                }
                self.deliver(index, ClientResult::Success, ResponseData::Get(results));
            }
            GetResponse::WithDataBlock {
                invoke_id,
                last_block,
                block_number,
                result,
            } => {
                if !self.invoke_id_matches(index, invoke_id) {
                    return;
                }
                self.on_data_block(index, last_block, block_number, result);
            }
        }
    }

    fn on_data_block(
        &mut self,
        index: usize,
        last_block: bool,
        block_number: u32,
        result: BlockResult,
    ) {
        let bytes = match result {
            BlockResult::Raw(bytes) => bytes,
            BlockResult::AccessError(dar) => {
                // The transfer died server-side; surface the code as the result
                self.deliver(
                    index,
                    ClientResult::Success,
                    ResponseData::Get(vec![GetDataResult::AccessError(dar)]),
                );
                return;
            }
        };

        let timeout = self.response_timeout_ms;
        let Some(slot) = self.slots[index].as_mut() else {
            return;
        };
        let Some(pending) = slot.pending.as_mut() else {
            return;
        };
        pending.assembled.extend_from_slice(&bytes);

        if !last_block {
            let next = GetRequest::Next {
                invoke_id: pending.invoke_id,
                block_number,
            };
            match next.encode() {
                Ok(apdu) => {
                    let node = slot.node.unwrap_or(ShortAddress::INVALID);
                    slot.timer = Some(timeout);
                    self.transmit.push_back(DataRequest {
                        destination: node,
                        source_wport: slot.config.source_wport,
                        destination_wport: slot.config.destination_wport,
                        apdu,
                    });
                    self.indications.push_back(DataIndication {
                        association: index,
                        node,
                        result: ClientResult::Waiting,
                        last_fragment: false,
                        data: ResponseData::None,
                    });
                }
                Err(e) => {
                    log::warn!("get-request-next encode failed: {}", e);
                    self.finish(index, ClientResult::FormatError, ResponseData::None);
                }
            }
            return;
        }

        let with_list = matches!(pending.kind, PendingKind::Get { with_list: true });
        let assembled = std::mem::take(&mut pending.assembled);
        match Self::parse_assembled(with_list, &assembled) {
            Ok(results) => self.deliver(index, ClientResult::Success, ResponseData::Get(results)),
            Err(e) => {
                log::warn!("block reassembly parse failed: {}", e);
                self.finish(index, ClientResult::RxFail, ResponseData::None);
            }
        }
    }

    fn on_set_response(&mut self, index: usize, apdu: &[u8]) {
        if !self.expects(index, |kind| kind == PendingKind::Set) {
            log::debug!("unsolicited SET-response on association {}", index);
            return;
        }
        let response = match SetResponse::decode(apdu) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("SET-response decode failed: {}", e);
                self.finish(index, ClientResult::RxFail, ResponseData::None);
                return;
            }
        };
        match response {
            SetResponse::Normal { invoke_id, result } => {
                if !self.invoke_id_matches(index, invoke_id) {
                    return;
                }
                self.deliver(index, ClientResult::Success, ResponseData::Set(vec![result]));
            }
            SetResponse::WithList { invoke_id, results } => {
                if !self.invoke_id_matches(index, invoke_id) {
                    return;
                }
                self.deliver(index, ClientResult::Success, ResponseData::Set(results));
            }
        }
    }

    fn on_rlre(&mut self, index: usize, apdu: &[u8]) {
        if !self.expects(index, |kind| kind == PendingKind::Release) {
            log::debug!("unsolicited RLRE on association {}", index);
            return;
        }
        let rlre = match Rlre::decode(apdu) {
            Ok(rlre) => rlre,
            Err(e) => {
                log::warn!("RLRE decode failed: {}", e);
                self.finish(index, ClientResult::RxFail, ResponseData::None);
                return;
            }
        };
        if let Some(slot) = self.slots[index].as_mut() {
            slot.state = AssociationState::NotAssociated;
        }
        self.deliver(
            index,
            ClientResult::Released,
            ResponseData::Release(rlre.reason),
        );
    }

    /// Queue an encoded APDU on the slot and arm its response timer
    fn submit(
        slot: &mut Association,
        transmit: &mut VecDeque<DataRequest>,
        encoded: G3Result<Vec<u8>>,
        pending: Pending,
        timeout_ms: u32,
    ) -> ClientResult {
        let apdu = match encoded {
            Ok(apdu) => apdu,
            Err(e) => {
                log::warn!("APDU encode failed: {}", e);
                return ClientResult::FormatError;
            }
        };
        let Some(node) = slot.node else {
            return ClientResult::TxError;
        };
        slot.pending = Some(pending);
        slot.timer = Some(timeout_ms);
        transmit.push_back(DataRequest {
            destination: node,
            source_wport: slot.config.source_wport,
            destination_wport: slot.config.destination_wport,
            apdu,
        });
        ClientResult::Waiting
    }

    /// Whether the slot has a pending exchange of the given kind
    fn expects(&self, index: usize, check: impl Fn(PendingKind) -> bool) -> bool {
        self.slots
            .get(index)
            .and_then(|slot| slot.as_ref())
            .and_then(|slot| slot.pending.as_ref())
            .is_some_and(|pending| check(pending.kind))
    }

    fn invoke_id_matches(&self, index: usize, invoke_id: u8) -> bool {
        let expected = self.slots[index]
            .as_ref()
            .and_then(|slot| slot.pending.as_ref())
            .map(|pending| pending.invoke_id);
        if expected == Some(invoke_id) {
            return true;
        }
        log::debug!(
            "stale invoke id 0x{:02X} on association {}, expected {:?}",
            invoke_id,
            index,
            expected
        );
        false
    }

    /// Terminal result for the current exchange
    fn deliver(&mut self, index: usize, result: ClientResult, data: ResponseData) {
        let node = self.clear_pending(index);
        self.indications.push_back(DataIndication {
            association: index,
            node,
            result,
            last_fragment: true,
            data,
        });
    }

    /// Terminal failure; pending association/release attempts fall back
    fn finish(&mut self, index: usize, result: ClientResult, data: ResponseData) {
        if let Some(slot) = self.slots[index].as_mut() {
            if matches!(
                slot.state,
                AssociationState::AssociationPending | AssociationState::ReleasePending
            ) {
                slot.state = AssociationState::NotAssociated;
            }
        }
        self.deliver(index, result, data);
    }

    fn clear_pending(&mut self, index: usize) -> ShortAddress {
        let Some(slot) = self.slots[index].as_mut() else {
            return ShortAddress::INVALID;
        };
        slot.pending = None;
        slot.timer = None;
        slot.node.unwrap_or(ShortAddress::INVALID)
    }

    fn parse_assembled(with_list: bool, bytes: &[u8]) -> G3Result<Vec<GetDataResult>> {
        let mut decoder = AxdrDecoder::new(bytes);
        if !with_list {
            let value = decoder.decode_data()?;
            return Ok(vec![GetDataResult::Data(value)]);
        }
        let count = decoder.read_u8()? as usize;
        let mut results = Vec::with_capacity(count);
        for _ in 0..count {
            match decoder.read_u8()? {
                0x00 => results.push(GetDataResult::Data(decoder.decode_data()?)),
                0x01 => {
                    let code = decoder.read_u8()?;
                    let dar =
                        DataAccessResult::from_u8(code).unwrap_or(DataAccessResult::OtherReason);
                    results.push(GetDataResult::AccessError(dar));
                }
                other => {
                    return Err(G3Error::Decode(format!(
                        "bad get-data-result choice 0x{:02X}",
                        other
                    )));
                }
            }
        }
        Ok(results)
    }
}

impl Default for DlmsClient {
    fn default() -> Self {
        Self::new()
    }
}

//! Meter polling cycle
//!
//! Visits every joined meter in rounds: associate, read the configured
//! object list one GET at a time, release, move on. Advancement is
//! strictly event- or timer-driven: a terminal result from the client
//! machine moves to the next step, and a guard countdown treats a
//! silent meter as timed out and forces the cycle onward.
//!
//! Per meter the manager keeps visit counters and a mean visit time
//! computed over successful visits only.

use serde::Serialize;

use g3plc_codec::apdu::GetItem;
use g3plc_core::{
    AttributeDescriptor, ClientResult, Eui64, ObisCode, ReleaseReason, ShortAddress,
};

use crate::association::{DataIndication, DlmsClient};

/// Pause between two polling rounds
pub const TIME_BETWEEN_CYCLES_MS: u32 = 20_000;

/// Guard armed for every awaited response; expiry forces the cycle on
pub const RESPONSE_TIMEOUT_MS: u32 = 50_000;

/// Pause between consecutive messages to the same meter
pub const TIME_BETWEEN_MESSAGES_MS: u32 = 600;

/// Settle time after start-up before the first round
pub const INITIAL_IDLE_MS: u32 = 120_000;

/// Upper bound of meters visited in one round
pub const MAX_CYCLE_NODES: usize = 50;

/// Where the cycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Waiting for the next round to begin
    Idle,
    /// Picking the next meter of the round
    NextNode,
    /// AARQ sent, waiting for the association verdict
    WaitAssociation,
    /// Message gap running before the next GET or the release
    NextRequest,
    /// GET sent, waiting for the attribute data
    WaitRequest,
    /// RLRQ sent, waiting for the release confirm
    WaitRelease,
}

/// Per-meter visit counters.
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatistics {
    pub address: Eui64,
    pub short_address: ShortAddress,
    /// Visits attempted
    pub cycles: u32,
    pub successes: u32,
    pub errors: u32,
    /// Mean visit duration over successful visits
    pub mean_cycle_ms: u32,
    pub last_cycle_ms: u32,
}

impl NodeStatistics {
    fn new(address: Eui64, short_address: ShortAddress) -> Self {
        Self {
            address,
            short_address,
            cycles: 0,
            successes: 0,
            errors: 0,
            mean_cycle_ms: 0,
            last_cycle_ms: 0,
        }
    }
}

/// Live join-table mirror entry.
#[derive(Debug, Clone, Copy)]
struct NodeRecord {
    address: Eui64,
    short_address: ShortAddress,
    connected: bool,
    stats_index: usize,
}

/// One meter of the running round.
#[derive(Debug, Clone, Copy)]
struct CycleNode {
    address: Eui64,
    short_address: ShortAddress,
    stats_index: usize,
    connected: bool,
}

/// Round-robin poller over one client association slot.
pub struct CycleManager {
    assoc_index: usize,
    objects: Vec<GetItem>,
    state: CycleState,
    timer: Option<u32>,
    /// Wall clock accumulated from ticks
    clock: u64,
    nodes: Vec<NodeRecord>,
    stats: Vec<NodeStatistics>,
    cycle: Vec<CycleNode>,
    position: usize,
    object_index: usize,
    visit_started_at: u64,
    cycles_completed: u32,
}

impl CycleManager {
    pub fn new(assoc_index: usize, objects: Vec<GetItem>) -> Self {
        Self {
            assoc_index,
            objects,
            state: CycleState::Idle,
            timer: Some(INITIAL_IDLE_MS),
            clock: 0,
            nodes: Vec::new(),
            stats: Vec::new(),
            cycle: Vec::new(),
            position: 0,
            object_index: 0,
            visit_started_at: 0,
            cycles_completed: 0,
        }
    }

    /// Poller over the stock meter read-out list
    pub fn with_reference_objects(assoc_index: usize) -> Self {
        Self::new(assoc_index, reference_object_list())
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn stats(&self) -> &[NodeStatistics] {
        &self.stats
    }

    /// Completed rounds since start-up
    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    /// Meters in the running round
    pub fn cycle_size(&self) -> usize {
        self.cycle.len()
    }

    /// Join-table feed: a meter joined or rejoined.
    pub fn node_joined(&mut self, address: Eui64, short_address: ShortAddress) {
        if let Some(record) = self.nodes.iter_mut().find(|r| r.address == address) {
            record.short_address = short_address;
            record.connected = true;
            self.stats[record.stats_index].short_address = short_address;
        } else {
            let stats_index = self.stats.len();
            self.stats.push(NodeStatistics::new(address, short_address));
            self.nodes.push(NodeRecord {
                address,
                short_address,
                connected: true,
                stats_index,
            });
        }
    }

    /// Join-table feed: a meter left. Marks it out of the running round
    /// and fails whatever exchange it had in flight.
    pub fn node_left(&mut self, address: &Eui64, client: &mut DlmsClient) {
        let Some(record) = self.nodes.iter_mut().find(|r| r.address == *address) else {
            return;
        };
        record.connected = false;
        let short_address = record.short_address;
        for entry in &mut self.cycle {
            if entry.short_address == short_address {
                entry.connected = false;
            }
        }
        client.node_disconnected(short_address);
    }

    /// Advance countdowns by `elapsed_ms` of wall time.
    pub fn tick(&mut self, elapsed_ms: u32, client: &mut DlmsClient) {
        self.clock += u64::from(elapsed_ms);
        let Some(timer) = self.timer else {
            return;
        };
        let remaining = timer.saturating_sub(elapsed_ms);
        if remaining > 0 {
            self.timer = Some(remaining);
            return;
        }
        self.timer = None;
        match self.state {
            CycleState::Idle => self.start_cycle(),
            CycleState::NextNode => self.visit_next(client),
            CycleState::NextRequest => self.send_next_message(client),
            CycleState::WaitAssociation | CycleState::WaitRequest | CycleState::WaitRelease => {
                log::warn!(
                    "no response from 0x{:04X}, forcing cycle onward",
                    self.current_short().map(|s| s.value()).unwrap_or(0xFFFF)
                );
                self.fail_visit(client);
            }
        }
    }

    /// Completed-exchange feed from the client machine.
    pub fn on_indication(&mut self, indication: &DataIndication, client: &mut DlmsClient) {
        if indication.association != self.assoc_index {
            return;
        }
        if !matches!(
            self.state,
            CycleState::WaitAssociation | CycleState::WaitRequest | CycleState::WaitRelease
        ) {
            log::debug!("stray indication in state {:?}", self.state);
            return;
        }
        let Some(current) = self.cycle.get(self.position) else {
            return;
        };
        if indication.node != current.short_address {
            log::debug!(
                "indication from 0x{:04X} while visiting 0x{:04X}",
                indication.node.value(),
                current.short_address.value()
            );
            return;
        }
        if !indication.result.is_terminal() || !indication.last_fragment {
            // Block transfer underway; the meter is alive, re-arm the guard
            self.timer = Some(RESPONSE_TIMEOUT_MS);
            return;
        }
        match self.state {
            CycleState::WaitAssociation => {
                if indication.result == ClientResult::Success {
                    self.object_index = 0;
                    self.state = CycleState::NextRequest;
                    self.timer = Some(TIME_BETWEEN_MESSAGES_MS);
                } else {
                    self.fail_visit(client);
                }
            }
            CycleState::WaitRequest => {
                if indication.result == ClientResult::Success {
                    self.object_index += 1;
                    self.state = CycleState::NextRequest;
                    self.timer = Some(TIME_BETWEEN_MESSAGES_MS);
                } else {
                    self.fail_visit(client);
                }
            }
            CycleState::WaitRelease => {
                if indication.result == ClientResult::Released {
                    self.complete_visit();
                } else {
                    self.fail_visit(client);
                }
            }
            _ => {}
        }
    }

    fn start_cycle(&mut self) {
        self.cycle = self
            .nodes
            .iter()
            .filter(|record| record.connected)
            .take(MAX_CYCLE_NODES)
            .map(|record| CycleNode {
                address: record.address,
                short_address: record.short_address,
                stats_index: record.stats_index,
                connected: true,
            })
            .collect();
        self.position = 0;
        if self.cycle.is_empty() {
            self.state = CycleState::Idle;
            self.timer = Some(TIME_BETWEEN_CYCLES_MS);
            return;
        }
        log::info!("polling cycle {} starting, {} meters", self.cycles_completed + 1, self.cycle.len());
        self.enter_next_node();
    }

    fn visit_next(&mut self, client: &mut DlmsClient) {
        if self.position >= self.cycle.len() {
            self.cycles_completed += 1;
            log::info!("polling cycle {} complete", self.cycles_completed);
            self.state = CycleState::Idle;
            self.timer = Some(TIME_BETWEEN_CYCLES_MS);
            return;
        }
        let node = self.cycle[self.position];
        if !node.connected {
            self.position += 1;
            self.enter_next_node();
            return;
        }
        self.visit_started_at = self.clock;
        match client.aarq_request(self.assoc_index, node.short_address, &node.address) {
            ClientResult::Waiting => {
                self.state = CycleState::WaitAssociation;
                self.timer = Some(RESPONSE_TIMEOUT_MS);
            }
            result => {
                log::warn!(
                    "association towards 0x{:04X} failed to start: {:?}",
                    node.short_address.value(),
                    result
                );
                self.record_error();
                self.position += 1;
                self.enter_next_node();
            }
        }
    }

    fn send_next_message(&mut self, client: &mut DlmsClient) {
        if self.object_index < self.objects.len() {
            let item = self.objects[self.object_index].clone();
            match client.object_request(self.assoc_index, item) {
                ClientResult::Waiting => {
                    self.state = CycleState::WaitRequest;
                    self.timer = Some(RESPONSE_TIMEOUT_MS);
                }
                _ => self.fail_visit(client),
            }
        } else {
            match client.release_request(self.assoc_index, ReleaseReason::Normal) {
                ClientResult::Waiting => {
                    self.state = CycleState::WaitRelease;
                    self.timer = Some(RESPONSE_TIMEOUT_MS);
                }
                _ => self.fail_visit(client),
            }
        }
    }

    /// Visit over with a clean release
    fn complete_visit(&mut self) {
        let elapsed = (self.clock - self.visit_started_at) as u32;
        if let Some(node) = self.cycle.get(self.position) {
            let stats = &mut self.stats[node.stats_index];
            stats.cycles += 1;
            stats.successes += 1;
            stats.last_cycle_ms = elapsed;
            let n = u64::from(stats.successes);
            stats.mean_cycle_ms =
                ((u64::from(stats.mean_cycle_ms) * (n - 1) + u64::from(elapsed)) / n) as u32;
        }
        self.position += 1;
        self.enter_next_node();
    }

    /// Visit over with an error; abandon the slot and move on
    fn fail_visit(&mut self, client: &mut DlmsClient) {
        self.record_error();
        client.abort(self.assoc_index);
        self.position += 1;
        self.enter_next_node();
    }

    fn record_error(&mut self) {
        if let Some(node) = self.cycle.get(self.position) {
            let stats = &mut self.stats[node.stats_index];
            stats.cycles += 1;
            stats.errors += 1;
        }
    }

    fn enter_next_node(&mut self) {
        self.state = CycleState::NextNode;
        self.timer = Some(0);
    }

    fn current_short(&self) -> Option<ShortAddress> {
        self.cycle.get(self.position).map(|node| node.short_address)
    }
}

/// Stock read-out list: clock, energy registers, a voltage register and
/// the PLC MAC counters.
pub fn reference_object_list() -> Vec<GetItem> {
    vec![
        GetItem::new(AttributeDescriptor::new(8, ObisCode::new(0, 0, 1, 0, 0, 255), 2)),
        GetItem::new(AttributeDescriptor::new(3, ObisCode::new(1, 0, 1, 8, 0, 255), 2)),
        GetItem::new(AttributeDescriptor::new(3, ObisCode::new(1, 0, 2, 8, 0, 255), 2)),
        GetItem::new(AttributeDescriptor::new(3, ObisCode::new(1, 0, 32, 7, 0, 255), 2)),
        GetItem::new(AttributeDescriptor::new(90, ObisCode::new(0, 0, 29, 0, 0, 255), 2)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use g3plc_codec::acse::{Aare, InitiateResponse, tags as acse_tags};
    use g3plc_codec::apdu::{GetDataResult, GetResponse, tags as apdu_tags};
    use g3plc_codec::acse::Rlre;
    use g3plc_core::{CLIENT_CONFORMANCE, DataValue, SERVER_CONFORMANCE, SERVER_MAX_APDU_SIZE};

    const NODE: ShortAddress = ShortAddress(0x0005);
    const PEER: Eui64 = Eui64::new([0x00, 0x80, 0xE1, 0x02, 0x5A, 0xB3, 0x00, 0x01]);

    fn accepted_aare() -> Vec<u8> {
        let granted = SERVER_CONFORMANCE & CLIENT_CONFORMANCE;
        Aare::accepted(InitiateResponse::new(granted, SERVER_MAX_APDU_SIZE))
            .encode()
            .unwrap()
    }

    fn pump(manager: &mut CycleManager, client: &mut DlmsClient) {
        while let Some(indication) = client.poll_indication() {
            manager.on_indication(&indication, client);
        }
    }

    /// Idle expiry builds the snapshot, the follow-up tick sends the AARQ
    fn run_to_association(manager: &mut CycleManager, client: &mut DlmsClient, idle_ms: u32) {
        manager.tick(idle_ms, client);
        assert_eq!(manager.state(), CycleState::NextNode);
        manager.tick(0, client);
        assert_eq!(manager.state(), CycleState::WaitAssociation);
    }

    #[test]
    fn test_first_cycle_waits_for_initial_idle() {
        let mut client = DlmsClient::with_reference_associations();
        let mut manager = CycleManager::new(0, reference_object_list());
        manager.node_joined(PEER, NODE);

        manager.tick(INITIAL_IDLE_MS - 1, &mut client);
        assert_eq!(manager.state(), CycleState::Idle);
        assert!(client.poll_transmit().is_none());

        run_to_association(&mut manager, &mut client, 1);
        let request = client.poll_transmit().unwrap();
        assert_eq!(request.apdu[0], acse_tags::AARQ_APDU);
        assert_eq!(request.destination, NODE);
    }

    #[test]
    fn test_empty_join_table_keeps_idling() {
        let mut client = DlmsClient::with_reference_associations();
        let mut manager = CycleManager::new(0, reference_object_list());
        manager.tick(INITIAL_IDLE_MS, &mut client);
        assert_eq!(manager.state(), CycleState::Idle);
        assert!(client.poll_transmit().is_none());
        assert_eq!(manager.cycles_completed(), 0);
    }

    #[test]
    fn test_full_visit_reads_objects_and_releases() {
        let mut client = DlmsClient::with_reference_associations();
        let objects = reference_object_list();
        let object_count = objects.len();
        let mut manager = CycleManager::new(0, objects);
        manager.node_joined(PEER, NODE);

        run_to_association(&mut manager, &mut client, INITIAL_IDLE_MS);
        client.poll_transmit();
        client.handle_apdu(0, NODE, &accepted_aare());
        pump(&mut manager, &mut client);
        assert_eq!(manager.state(), CycleState::NextRequest);

        for n in 0..object_count {
            manager.tick(TIME_BETWEEN_MESSAGES_MS, &mut client);
            assert_eq!(manager.state(), CycleState::WaitRequest);
            let request = client.poll_transmit().unwrap();
            assert_eq!(request.apdu[0], apdu_tags::GET_REQUEST);

            let response = GetResponse::Normal {
                invoke_id: 0xC1 + n as u8,
                result: GetDataResult::Data(DataValue::DoubleLongUnsigned(n as u32)),
            }
            .encode()
            .unwrap();
            client.handle_apdu(0, NODE, &response);
            pump(&mut manager, &mut client);
            assert_eq!(manager.state(), CycleState::NextRequest);
        }

        manager.tick(TIME_BETWEEN_MESSAGES_MS, &mut client);
        assert_eq!(manager.state(), CycleState::WaitRelease);
        let request = client.poll_transmit().unwrap();
        assert_eq!(request.apdu[0], acse_tags::RLRQ_APDU);
        client.handle_apdu(0, NODE, &Rlre::new(ReleaseReason::Normal).encode());
        pump(&mut manager, &mut client);

        assert_eq!(manager.state(), CycleState::NextNode);
        manager.tick(0, &mut client);
        assert_eq!(manager.state(), CycleState::Idle);
        assert_eq!(manager.cycles_completed(), 1);

        let stats = &manager.stats()[0];
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.errors, 0);
    }

    #[test]
    fn test_mean_visit_time_over_successes() {
        let mut client = DlmsClient::with_reference_associations();
        let mut manager = CycleManager::new(0, Vec::new());
        manager.node_joined(PEER, NODE);

        // First visit: 1000 ms before the AARE, 600 ms message gap
        run_to_association(&mut manager, &mut client, INITIAL_IDLE_MS);
        client.poll_transmit();
        manager.tick(1_000, &mut client);
        client.handle_apdu(0, NODE, &accepted_aare());
        pump(&mut manager, &mut client);
        manager.tick(TIME_BETWEEN_MESSAGES_MS, &mut client);
        assert_eq!(manager.state(), CycleState::WaitRelease);
        client.poll_transmit();
        client.handle_apdu(0, NODE, &Rlre::new(ReleaseReason::Normal).encode());
        pump(&mut manager, &mut client);
        manager.tick(0, &mut client);
        assert_eq!(manager.stats()[0].mean_cycle_ms, 1_600);
        assert_eq!(manager.stats()[0].last_cycle_ms, 1_600);

        // Second visit: 3000 ms before the AARE
        run_to_association(&mut manager, &mut client, TIME_BETWEEN_CYCLES_MS);
        client.poll_transmit();
        manager.tick(3_000, &mut client);
        client.handle_apdu(0, NODE, &accepted_aare());
        pump(&mut manager, &mut client);
        manager.tick(TIME_BETWEEN_MESSAGES_MS, &mut client);
        client.poll_transmit();
        client.handle_apdu(0, NODE, &Rlre::new(ReleaseReason::Normal).encode());
        pump(&mut manager, &mut client);

        let stats = &manager.stats()[0];
        assert_eq!(stats.last_cycle_ms, 3_600);
        assert_eq!(stats.mean_cycle_ms, (1_600 + 3_600) / 2);
        assert_eq!(stats.successes, 2);
    }

    #[test]
    fn test_silent_meter_forces_cycle_onward() {
        let mut client = DlmsClient::with_reference_associations();
        let mut manager = CycleManager::new(0, Vec::new());
        manager.node_joined(PEER, NODE);
        let second = Eui64::new([0x00, 0x80, 0xE1, 0x02, 0x5A, 0xB3, 0x00, 0x02]);
        manager.node_joined(second, ShortAddress(0x0006));

        run_to_association(&mut manager, &mut client, INITIAL_IDLE_MS);
        client.poll_transmit();

        manager.tick(RESPONSE_TIMEOUT_MS, &mut client);
        assert_eq!(manager.state(), CycleState::NextNode);
        assert_eq!(manager.stats()[0].errors, 1);
        assert_eq!(manager.stats()[0].successes, 0);

        // The round continues with the second meter
        manager.tick(0, &mut client);
        assert_eq!(manager.state(), CycleState::WaitAssociation);
        let request = client.poll_transmit().unwrap();
        assert_eq!(request.destination, ShortAddress(0x0006));
    }

    #[test]
    fn test_leave_mid_visit_counts_error_and_advances() {
        let mut client = DlmsClient::with_reference_associations();
        let mut manager = CycleManager::new(0, Vec::new());
        manager.node_joined(PEER, NODE);

        run_to_association(&mut manager, &mut client, INITIAL_IDLE_MS);
        client.poll_transmit();

        manager.node_left(&PEER, &mut client);
        pump(&mut manager, &mut client);
        assert_eq!(manager.state(), CycleState::NextNode);
        assert_eq!(manager.stats()[0].errors, 1);

        // With the only meter gone the next round has nothing to visit
        manager.tick(0, &mut client);
        assert_eq!(manager.state(), CycleState::Idle);
        manager.tick(TIME_BETWEEN_CYCLES_MS, &mut client);
        assert_eq!(manager.state(), CycleState::Idle);
        assert!(client.poll_transmit().is_none());
    }

    #[test]
    fn test_round_size_is_capped() {
        let mut client = DlmsClient::with_reference_associations();
        let mut manager = CycleManager::new(0, Vec::new());
        for i in 0..60u16 {
            let address = Eui64::new([0, 0x80, 0xE1, 0, 0, 0, (i >> 8) as u8, i as u8]);
            manager.node_joined(address, ShortAddress(0x100 + i));
        }
        manager.tick(INITIAL_IDLE_MS, &mut client);
        assert_eq!(manager.cycle_size(), MAX_CYCLE_NODES);
    }

    #[test]
    fn test_rejoin_updates_short_address_and_keeps_stats() {
        let mut client = DlmsClient::with_reference_associations();
        let mut manager = CycleManager::new(0, Vec::new());
        manager.node_joined(PEER, NODE);
        manager.node_left(&PEER, &mut client);
        manager.node_joined(PEER, ShortAddress(0x0009));

        assert_eq!(manager.stats().len(), 1);
        assert_eq!(manager.stats()[0].short_address, ShortAddress(0x0009));

        run_to_association(&mut manager, &mut client, INITIAL_IDLE_MS);
        let request = client.poll_transmit().unwrap();
        assert_eq!(request.destination, ShortAddress(0x0009));
    }
}

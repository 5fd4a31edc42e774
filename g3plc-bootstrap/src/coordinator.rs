//! Coordinator-side bootstrap: LBP server and join table
//!
//! The coordinator answers Joining requests with Accepted, Challenge or
//! Decline frames and maintains the short-address to EUI-64 table the
//! polling application consumes. Unlike the device side there are no
//! timers here; every inbound frame is answered in one shot.

use std::collections::HashMap;
use std::collections::VecDeque;

use g3plc_codec::lbp::{ConfigParam, LbpMessage, LbpMessageType, MediaType, encode_params};
use g3plc_core::{Eui64, PanId, ShortAddress};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::auth::{GroupKey, NONCE_LEN, Psk, challenge_response};

/// Capacity of the join table
pub const MAX_JOIN_ENTRIES: usize = 128;

/// Coordinator bootstrap settings.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub pan_id: PanId,
    pub psk: Psk,
    /// Challenge each device before accepting it
    pub challenge_devices: bool,
    /// Group key handed out inside Accepted messages
    pub group_key: Option<GroupKey>,
}

impl CoordinatorConfig {
    pub fn new(pan_id: PanId, psk: Psk) -> Self {
        Self {
            pan_id,
            psk,
            challenge_devices: false,
            group_key: None,
        }
    }
}

/// Work queued by the coordinator for the caller to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorAction {
    /// Transmit an LBP frame (destination is the embedded EUI-64's node)
    SendLbp(LbpMessage),
    /// A device completed its join
    DeviceJoined {
        address: Eui64,
        short_address: ShortAddress,
    },
    /// A device left, was kicked or failed its challenge
    DeviceLeft {
        address: Eui64,
        short_address: ShortAddress,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    /// Challenge sent, waiting for the keyed answer
    Challenged { nonce: [u8; NONCE_LEN] },
    Joined,
}

#[derive(Debug, Clone, Copy)]
struct JoinEntry {
    short_address: ShortAddress,
    state: EntryState,
}

/// LBP server bound to the coordinator role.
pub struct BootstrapCoordinator {
    config: CoordinatorConfig,
    rng: StdRng,
    table: HashMap<Eui64, JoinEntry>,
    /// Short addresses returned by kicks, reused before fresh ones
    freed: Vec<ShortAddress>,
    next_short: u16,
    actions: VecDeque<CoordinatorAction>,
}

impl BootstrapCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Build with a caller-supplied generator so nonces are reproducible
    pub fn with_rng(config: CoordinatorConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            table: HashMap::new(),
            freed: Vec::new(),
            next_short: 1,
            actions: VecDeque::new(),
        }
    }

    pub fn pan_id(&self) -> PanId {
        self.config.pan_id
    }

    /// Take the next queued action, if any
    pub fn poll_action(&mut self) -> Option<CoordinatorAction> {
        self.actions.pop_front()
    }

    /// Inbound LBP frame from the network.
    pub fn handle_lbp(&mut self, message: &LbpMessage) {
        if message.msg_type.is_from_server() {
            return;
        }
        match message.msg_type {
            LbpMessageType::Joining => {
                if message.payload.is_empty() {
                    self.on_join_request(message.address);
                } else {
                    self.on_challenge_answer(message.address, &message.payload);
                }
            }
            LbpMessageType::KickFromDevice => {
                if let Some(entry) = self.table.remove(&message.address) {
                    log::info!(
                        "device {} left the network (was 0x{:04X})",
                        message.address,
                        entry.short_address.value()
                    );
                    self.release(message.address, entry.short_address);
                }
            }
            _ => {}
        }
    }

    /// Evict a device by its EUI-64.
    pub fn kick(&mut self, address: &Eui64) -> bool {
        let Some(entry) = self.table.remove(address) else {
            return false;
        };
        self.actions
            .push_back(CoordinatorAction::SendLbp(LbpMessage::kick_to_device(
                *address,
            )));
        self.release(*address, entry.short_address);
        true
    }

    /// Evict a device by its short address.
    pub fn kick_by_short_address(&mut self, short_address: ShortAddress) -> bool {
        let Some(address) = self.device_of(short_address) else {
            return false;
        };
        self.kick(&address)
    }

    pub fn short_address_of(&self, address: &Eui64) -> Option<ShortAddress> {
        self.table.get(address).map(|entry| entry.short_address)
    }

    pub fn device_of(&self, short_address: ShortAddress) -> Option<Eui64> {
        self.table
            .iter()
            .find(|(_, entry)| entry.short_address == short_address)
            .map(|(address, _)| *address)
    }

    /// Devices that completed their join
    pub fn joined_devices(&self) -> impl Iterator<Item = (Eui64, ShortAddress)> + '_ {
        self.table
            .iter()
            .filter(|(_, entry)| entry.state == EntryState::Joined)
            .map(|(address, entry)| (*address, entry.short_address))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn on_join_request(&mut self, address: Eui64) {
        // A rejoining device keeps the short address it already holds
        let short_address = match self.table.get(&address) {
            Some(entry) => entry.short_address,
            None => match self.allocate_short_address() {
                Some(short) => short,
                None => {
                    log::warn!("join table full, declining {}", address);
                    self.decline(address);
                    return;
                }
            },
        };

        if self.config.challenge_devices {
            let mut nonce = [0u8; NONCE_LEN];
            self.rng.fill(&mut nonce[..]);
            self.table.insert(
                address,
                JoinEntry {
                    short_address,
                    state: EntryState::Challenged { nonce },
                },
            );
            log::debug!("challenging {}", address);
            self.actions
                .push_back(CoordinatorAction::SendLbp(LbpMessage::challenge(
                    address,
                    MediaType::Plc,
                    true,
                    nonce.to_vec(),
                )));
        } else {
            self.accept(address, short_address);
        }
    }

    fn on_challenge_answer(&mut self, address: Eui64, answer: &[u8]) {
        let Some(entry) = self.table.get(&address) else {
            log::debug!("challenge answer from unknown device {}", address);
            return;
        };
        let EntryState::Challenged { nonce } = entry.state else {
            log::debug!("unexpected challenge answer from {}", address);
            return;
        };
        let short_address = entry.short_address;

        let valid = challenge_response(&self.config.psk, &nonce, &address)
            .map(|expected| expected[..] == *answer)
            .unwrap_or(false);
        if valid {
            self.accept(address, short_address);
        } else {
            log::warn!("challenge answer from {} failed verification", address);
            self.table.remove(&address);
            self.freed.push(short_address);
            self.decline(address);
        }
    }

    fn accept(&mut self, address: Eui64, short_address: ShortAddress) {
        let mut params = vec![ConfigParam::ShortAddress(short_address)];
        if let Some(group_key) = self.config.group_key {
            params.push(ConfigParam::Gmk {
                key_id: group_key.key_id,
                key: group_key.key,
            });
            params.push(ConfigParam::GmkActivation {
                key_id: group_key.key_id,
            });
        }
        self.table.insert(
            address,
            JoinEntry {
                short_address,
                state: EntryState::Joined,
            },
        );
        log::info!("accepted {} as 0x{:04X}", address, short_address.value());
        self.actions
            .push_back(CoordinatorAction::SendLbp(LbpMessage::accepted(
                address,
                MediaType::Plc,
                true,
                encode_params(&params),
            )));
        self.actions.push_back(CoordinatorAction::DeviceJoined {
            address,
            short_address,
        });
    }

    fn decline(&mut self, address: Eui64) {
        self.actions
            .push_back(CoordinatorAction::SendLbp(LbpMessage::decline(
                address,
                MediaType::Plc,
                true,
            )));
    }

    fn release(&mut self, address: Eui64, short_address: ShortAddress) {
        self.freed.push(short_address);
        self.actions.push_back(CoordinatorAction::DeviceLeft {
            address,
            short_address,
        });
    }

    fn allocate_short_address(&mut self) -> Option<ShortAddress> {
        if self.table.len() >= MAX_JOIN_ENTRIES {
            return None;
        }
        if let Some(short) = self.freed.pop() {
            return Some(short);
        }
        // 0x0000 is the coordinator itself, 0xFFFF the invalid marker
        if self.next_short >= ShortAddress::INVALID.value() {
            return None;
        }
        let short = ShortAddress(self.next_short);
        self.next_short += 1;
        Some(short)
    }
}

impl std::fmt::Debug for BootstrapCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapCoordinator")
            .field("pan_id", &self.config.pan_id)
            .field("devices", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use g3plc_codec::lbp::decode_params;

    const TEST_PSK: Psk = Psk::new([
        0xAB, 0x10, 0x34, 0x11, 0x45, 0x11, 0x1B, 0xC3, 0xC1, 0x2D, 0xE8, 0xFF, 0x11, 0x14, 0x22,
        0x04,
    ]);

    fn eui(tail: u8) -> Eui64 {
        Eui64::new([0x00, 0x80, 0xE1, 0x02, 0x5A, 0xB3, 0x00, tail])
    }

    fn coordinator(config: CoordinatorConfig) -> BootstrapCoordinator {
        BootstrapCoordinator::with_rng(config, StdRng::seed_from_u64(0xC0))
    }

    fn drain(coordinator: &mut BootstrapCoordinator) -> Vec<CoordinatorAction> {
        let mut actions = Vec::new();
        while let Some(action) = coordinator.poll_action() {
            actions.push(action);
        }
        actions
    }

    fn joining(address: Eui64) -> LbpMessage {
        LbpMessage::joining(address, MediaType::Plc, Vec::new())
    }

    #[test]
    fn test_join_without_challenge_is_accepted() {
        let mut coordinator =
            coordinator(CoordinatorConfig::new(PanId(0x781D), TEST_PSK));
        coordinator.handle_lbp(&joining(eui(1)));

        let actions = drain(&mut coordinator);
        let CoordinatorAction::SendLbp(message) = &actions[0] else {
            panic!("expected the Accepted frame, got {:?}", actions[0]);
        };
        assert_eq!(message.msg_type, LbpMessageType::Accepted);
        let params = decode_params(&message.payload).unwrap();
        assert!(params.contains(&ConfigParam::ShortAddress(ShortAddress(1))));
        assert_eq!(
            actions[1],
            CoordinatorAction::DeviceJoined {
                address: eui(1),
                short_address: ShortAddress(1)
            }
        );
        assert_eq!(coordinator.short_address_of(&eui(1)), Some(ShortAddress(1)));
        assert_eq!(coordinator.device_of(ShortAddress(1)), Some(eui(1)));
    }

    #[test]
    fn test_group_key_is_distributed() {
        let mut config = CoordinatorConfig::new(PanId(0x781D), TEST_PSK);
        config.group_key = Some(GroupKey::new(0, [0x2A; 16]));
        let mut coordinator = coordinator(config);
        coordinator.handle_lbp(&joining(eui(1)));

        let actions = drain(&mut coordinator);
        let CoordinatorAction::SendLbp(message) = &actions[0] else {
            panic!("expected the Accepted frame, got {:?}", actions[0]);
        };
        let params = decode_params(&message.payload).unwrap();
        assert!(params.contains(&ConfigParam::Gmk {
            key_id: 0,
            key: [0x2A; 16]
        }));
        assert!(params.contains(&ConfigParam::GmkActivation { key_id: 0 }));
    }

    #[test]
    fn test_challenge_mode_verifies_digest() {
        let mut config = CoordinatorConfig::new(PanId(0x781D), TEST_PSK);
        config.challenge_devices = true;
        let mut coordinator = coordinator(config);

        coordinator.handle_lbp(&joining(eui(1)));
        let actions = drain(&mut coordinator);
        let CoordinatorAction::SendLbp(message) = &actions[0] else {
            panic!("expected the Challenge frame, got {:?}", actions[0]);
        };
        assert_eq!(message.msg_type, LbpMessageType::Challenge);
        assert_eq!(message.payload.len(), NONCE_LEN);
        assert!(coordinator.joined_devices().next().is_none());

        let answer = challenge_response(&TEST_PSK, &message.payload, &eui(1)).unwrap();
        coordinator.handle_lbp(&LbpMessage::joining(
            eui(1),
            MediaType::Plc,
            answer.to_vec(),
        ));
        let actions = drain(&mut coordinator);
        let CoordinatorAction::SendLbp(message) = &actions[0] else {
            panic!("expected the Accepted frame, got {:?}", actions[0]);
        };
        assert_eq!(message.msg_type, LbpMessageType::Accepted);
        assert_eq!(coordinator.joined_devices().count(), 1);
    }

    #[test]
    fn test_bad_challenge_answer_is_declined() {
        let mut config = CoordinatorConfig::new(PanId(0x781D), TEST_PSK);
        config.challenge_devices = true;
        let mut coordinator = coordinator(config);

        coordinator.handle_lbp(&joining(eui(1)));
        drain(&mut coordinator);
        coordinator.handle_lbp(&LbpMessage::joining(
            eui(1),
            MediaType::Plc,
            vec![0u8; 16],
        ));
        let actions = drain(&mut coordinator);
        let CoordinatorAction::SendLbp(message) = &actions[0] else {
            panic!("expected the Decline frame, got {:?}", actions[0]);
        };
        assert_eq!(message.msg_type, LbpMessageType::Decline);
        assert!(coordinator.is_empty());

        // The freed slot goes to the next joiner
        coordinator.handle_lbp(&joining(eui(2)));
        drain(&mut coordinator);
        assert_eq!(coordinator.short_address_of(&eui(2)), Some(ShortAddress(1)));
    }

    #[test]
    fn test_short_addresses_are_sequential_and_reused() {
        let mut coordinator =
            coordinator(CoordinatorConfig::new(PanId(0x781D), TEST_PSK));
        coordinator.handle_lbp(&joining(eui(1)));
        coordinator.handle_lbp(&joining(eui(2)));
        coordinator.handle_lbp(&joining(eui(3)));
        drain(&mut coordinator);
        assert_eq!(coordinator.short_address_of(&eui(2)), Some(ShortAddress(2)));

        assert!(coordinator.kick(&eui(2)));
        let actions = drain(&mut coordinator);
        let CoordinatorAction::SendLbp(message) = &actions[0] else {
            panic!("expected the kick frame, got {:?}", actions[0]);
        };
        assert_eq!(message.msg_type, LbpMessageType::KickToDevice);
        assert_eq!(
            actions[1],
            CoordinatorAction::DeviceLeft {
                address: eui(2),
                short_address: ShortAddress(2)
            }
        );

        coordinator.handle_lbp(&joining(eui(4)));
        drain(&mut coordinator);
        assert_eq!(coordinator.short_address_of(&eui(4)), Some(ShortAddress(2)));
        assert_eq!(coordinator.len(), 3);
    }

    #[test]
    fn test_rejoin_keeps_short_address() {
        let mut coordinator =
            coordinator(CoordinatorConfig::new(PanId(0x781D), TEST_PSK));
        coordinator.handle_lbp(&joining(eui(1)));
        coordinator.handle_lbp(&joining(eui(2)));
        drain(&mut coordinator);

        coordinator.handle_lbp(&joining(eui(1)));
        let actions = drain(&mut coordinator);
        assert_eq!(
            actions[1],
            CoordinatorAction::DeviceJoined {
                address: eui(1),
                short_address: ShortAddress(1)
            }
        );
        assert_eq!(coordinator.len(), 2);
    }

    #[test]
    fn test_full_table_declines() {
        let mut coordinator =
            coordinator(CoordinatorConfig::new(PanId(0x781D), TEST_PSK));
        for i in 0..MAX_JOIN_ENTRIES {
            coordinator.handle_lbp(&LbpMessage::joining(
                Eui64::new([0x10, 0x20, 0x30, 0x40, (i >> 8) as u8, i as u8, 0, 0]),
                MediaType::Plc,
                Vec::new(),
            ));
        }
        drain(&mut coordinator);
        assert_eq!(coordinator.len(), MAX_JOIN_ENTRIES);

        coordinator.handle_lbp(&joining(eui(0xEE)));
        let actions = drain(&mut coordinator);
        let CoordinatorAction::SendLbp(message) = &actions[0] else {
            panic!("expected the Decline frame, got {:?}", actions[0]);
        };
        assert_eq!(message.msg_type, LbpMessageType::Decline);
        assert_eq!(coordinator.len(), MAX_JOIN_ENTRIES);
    }

    #[test]
    fn test_device_initiated_leave_releases_entry() {
        let mut coordinator =
            coordinator(CoordinatorConfig::new(PanId(0x781D), TEST_PSK));
        coordinator.handle_lbp(&joining(eui(1)));
        drain(&mut coordinator);

        coordinator.handle_lbp(&LbpMessage::kick_from_device(eui(1)));
        let actions = drain(&mut coordinator);
        assert_eq!(
            actions[0],
            CoordinatorAction::DeviceLeft {
                address: eui(1),
                short_address: ShortAddress(1)
            }
        );
        assert!(coordinator.is_empty());
    }

    #[test]
    fn test_kick_by_short_address() {
        let mut coordinator =
            coordinator(CoordinatorConfig::new(PanId(0x781D), TEST_PSK));
        coordinator.handle_lbp(&joining(eui(1)));
        drain(&mut coordinator);

        assert!(coordinator.kick_by_short_address(ShortAddress(1)));
        assert!(!coordinator.kick_by_short_address(ShortAddress(1)));
        assert!(coordinator.is_empty());
    }

    #[test]
    fn test_server_frames_are_ignored() {
        let mut coordinator =
            coordinator(CoordinatorConfig::new(PanId(0x781D), TEST_PSK));
        coordinator.handle_lbp(&LbpMessage::accepted(
            eui(1),
            MediaType::Plc,
            true,
            Vec::new(),
        ));
        assert!(coordinator.is_empty());
        assert!(coordinator.poll_action().is_none());
    }
}

//! Device-side join state machine
//!
//! Drives a device from power-up to network membership: a randomized
//! startup delay, channel-checked PAN discovery, candidate selection,
//! and the LBP Joining/Challenge/Accepted exchange against the
//! coordinator's agent. The machine is tick-driven and never blocks;
//! waiting is a state plus a countdown decremented by [`DeviceJoin::tick`].
//! Within one tick at most one state transition occurs.
//!
//! Outgoing work (scan requests, LBP frames, join notifications) is
//! queued as [`DeviceCommand`] values for the caller to execute.

use std::collections::VecDeque;
use std::net::Ipv6Addr;

use g3plc_codec::lbp::{ConfigParam, LbpMessage, LbpMessageType, MediaType, ParameterResult, decode_params};
use g3plc_core::{Eui64, PanId, ShortAddress, link_local_address, unique_local_address};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::auth::{GroupKey, Psk, challenge_response};
use crate::backoff::{ContentionWindow, DISCOVERY_CHECK_MS, JOIN_CHECK_MS};
use crate::media::{MediaActivity, MediaMonitor};
use crate::pan::{PanDescriptor, PanSelector};

/// Upper bound of the randomized power-up delay
pub const STARTUP_DELAY_MAX_MS: u32 = 5_000;

/// Duration of one active discovery scan
pub const DISCOVERY_SCAN_MS: u32 = 15_000;

/// How long a sent Joining waits for Challenge/Accepted/Decline
pub const JOIN_WAIT_MS: u32 = 20_000;

/// Join attempts against one agent before falling back to rediscovery
pub const MAX_JOIN_ATTEMPTS: u8 = 3;

/// Grace period past the scan duration before the confirm is given up on
const SCAN_CONFIRM_GRACE_MS: u32 = 1_000;

/// Bootstrap progress of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStatus {
    /// Randomized power-up delay running
    InitDelay,
    /// Idle, about to start a discovery round
    NotJoined,
    /// Sampling the medium ahead of a discovery scan
    CheckForBeacons,
    /// Backing off after a busy pre-scan check
    ScanBackoff,
    /// Active discovery scan in flight
    Scanning,
    /// Sampling the medium ahead of a join attempt
    CheckForLbpTraffic,
    /// Backing off after a busy pre-join check
    JoinBackoff,
    /// Joining sent, waiting for the coordinator's verdict
    Joining,
    /// Member of a PAN
    Joined,
}

impl std::fmt::Display for JoinStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JoinStatus::InitDelay => "init delay",
            JoinStatus::NotJoined => "not joined",
            JoinStatus::CheckForBeacons => "check for beacons",
            JoinStatus::ScanBackoff => "scan backoff",
            JoinStatus::Scanning => "scanning",
            JoinStatus::CheckForLbpTraffic => "check for LBP traffic",
            JoinStatus::JoinBackoff => "join backoff",
            JoinStatus::Joining => "joining",
            JoinStatus::Joined => "joined",
        };
        f.write_str(name)
    }
}

/// Network membership parameters established by a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub pan_id: PanId,
    /// Short address assigned by the coordinator
    pub short_address: ShortAddress,
    /// Agent the join ran through
    pub lba_address: ShortAddress,
    pub link_local: Ipv6Addr,
    pub unique_local: Ipv6Addr,
    /// Group master key delivered in the Accepted message, if any
    pub group_key: Option<GroupKey>,
    /// Key slot activated for outgoing traffic
    pub active_key_id: Option<u8>,
}

/// Work queued by the join machine for the caller to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Run an active discovery scan for `duration_ms`
    StartDiscovery { duration_ms: u32 },
    /// Transmit an LBP frame to the given short address
    SendLbp {
        destination: ShortAddress,
        message: LbpMessage,
    },
    /// Membership established; addressing and keys are ready
    NetworkJoined(NetworkInfo),
    /// Membership lost (kick or voluntary leave)
    NetworkLeft,
    /// Fire a route discovery towards the given destination
    PathDiscovery { destination: ShortAddress },
}

/// Tick-driven join state machine for one device.
pub struct DeviceJoin {
    address: Eui64,
    psk: Psk,
    rng: StdRng,
    status: JoinStatus,
    timer: Option<u32>,
    monitor: MediaMonitor,
    discovery_window: ContentionWindow,
    join_window: ContentionWindow,
    selected: Option<PanDescriptor>,
    join_attempts: u8,
    network: Option<NetworkInfo>,
    commands: VecDeque<DeviceCommand>,
}

impl DeviceJoin {
    pub fn new(address: Eui64, psk: Psk) -> Self {
        Self::with_rng(address, psk, StdRng::from_entropy())
    }

    /// Build with a caller-supplied generator so delays are reproducible
    pub fn with_rng(address: Eui64, psk: Psk, rng: StdRng) -> Self {
        let mut device = Self {
            address,
            psk,
            rng,
            status: JoinStatus::InitDelay,
            timer: None,
            monitor: MediaMonitor::new(),
            discovery_window: ContentionWindow::discovery(),
            join_window: ContentionWindow::join(),
            selected: None,
            join_attempts: 0,
            network: None,
            commands: VecDeque::new(),
        };
        device.enter_init_delay();
        device
    }

    pub fn address(&self) -> &Eui64 {
        &self.address
    }

    pub fn status(&self) -> JoinStatus {
        self.status
    }

    pub fn is_joined(&self) -> bool {
        self.status == JoinStatus::Joined
    }

    /// Membership parameters while joined
    pub fn network(&self) -> Option<&NetworkInfo> {
        self.network.as_ref()
    }

    /// Take the next queued command, if any
    pub fn poll_command(&mut self) -> Option<DeviceCommand> {
        self.commands.pop_front()
    }

    /// Advance countdown timers by `elapsed_ms` of wall time.
    ///
    /// Performs at most one state transition per call.
    pub fn tick(&mut self, elapsed_ms: u32) {
        if self.status == JoinStatus::NotJoined {
            self.enter_check_for_beacons();
            return;
        }
        let Some(timer) = self.timer else {
            return;
        };
        let remaining = timer.saturating_sub(elapsed_ms);
        if remaining > 0 {
            self.timer = Some(remaining);
            return;
        }
        self.timer = None;
        match self.status {
            JoinStatus::InitDelay => {
                self.status = JoinStatus::NotJoined;
            }
            JoinStatus::CheckForBeacons => {
                if self.monitor.busy() {
                    self.discovery_window.widen();
                    let delay = self.discovery_window.delay(&mut self.rng);
                    log::debug!("medium busy before scan, backing off {} ms", delay);
                    self.status = JoinStatus::ScanBackoff;
                    self.timer = Some(delay);
                } else {
                    self.discovery_window.narrow();
                    self.commands.push_back(DeviceCommand::StartDiscovery {
                        duration_ms: DISCOVERY_SCAN_MS,
                    });
                    self.status = JoinStatus::Scanning;
                    self.timer = Some(DISCOVERY_SCAN_MS + SCAN_CONFIRM_GRACE_MS);
                }
            }
            JoinStatus::ScanBackoff => self.enter_check_for_beacons(),
            JoinStatus::Scanning => {
                // Confirm never arrived
                log::warn!("discovery confirm missing, restarting discovery");
                self.enter_check_for_beacons();
            }
            JoinStatus::CheckForLbpTraffic => {
                if self.monitor.busy() {
                    self.join_window.widen();
                    let delay = self.join_window.delay(&mut self.rng);
                    log::debug!("medium busy before join, backing off {} ms", delay);
                    self.status = JoinStatus::JoinBackoff;
                    self.timer = Some(delay);
                } else {
                    self.join_window.narrow();
                    self.send_joining(Vec::new());
                }
            }
            JoinStatus::JoinBackoff => self.enter_check_for_lbp_traffic(),
            JoinStatus::Joining => {
                log::warn!("join attempt timed out");
                self.join_attempt_failed();
            }
            JoinStatus::NotJoined | JoinStatus::Joined => {}
        }
    }

    /// Result of the discovery scan started by a `StartDiscovery` command
    pub fn on_discovery_confirm(&mut self, descriptors: &[PanDescriptor]) {
        if self.status != JoinStatus::Scanning {
            log::debug!("discovery confirm ignored in state {}", self.status);
            return;
        }
        self.timer = None;
        let mut selector = PanSelector::new();
        for descriptor in descriptors {
            selector.offer(*descriptor);
        }
        match selector.take() {
            Some(best) => {
                log::info!(
                    "selected PAN 0x{:04X} via agent 0x{:04X} (cost {}, lqi {})",
                    best.pan_id.value(),
                    best.lba_address.value(),
                    best.route_cost,
                    best.link_quality
                );
                self.selected = Some(best);
                self.join_attempts = 0;
                self.enter_check_for_lbp_traffic();
            }
            None => {
                log::info!("discovery found no usable PAN, retrying");
                self.enter_check_for_beacons();
            }
        }
    }

    /// Inbound LBP frame. Frames for other devices only count as
    /// medium activity.
    pub fn on_lbp(&mut self, message: &LbpMessage) {
        if message.address != self.address {
            self.monitor.record(MediaActivity::Bootstrap);
            return;
        }
        if !message.msg_type.is_from_server() {
            return;
        }
        match message.msg_type {
            LbpMessageType::Challenge => self.on_challenge(message),
            LbpMessageType::Accepted => self.on_accepted(message),
            LbpMessageType::Decline => {
                if self.status == JoinStatus::Joining {
                    log::warn!("join declined by coordinator");
                    self.join_attempt_failed();
                }
            }
            LbpMessageType::KickToDevice => {
                if self.status == JoinStatus::Joined {
                    log::info!("kicked from network");
                    self.leave_network();
                }
            }
            _ => {}
        }
    }

    /// Traffic heard on the medium, fed into the current check window
    pub fn media_activity(&mut self, activity: MediaActivity) {
        self.monitor.record(activity);
    }

    /// Voluntarily leave the network
    pub fn leave(&mut self) {
        if self.status != JoinStatus::Joined {
            return;
        }
        self.commands.push_back(DeviceCommand::SendLbp {
            destination: ShortAddress::COORDINATOR,
            message: LbpMessage::kick_from_device(self.address),
        });
        self.leave_network();
    }

    fn on_challenge(&mut self, message: &LbpMessage) {
        if self.status != JoinStatus::Joining {
            return;
        }
        match challenge_response(&self.psk, &message.payload, &self.address) {
            Ok(response) => {
                log::debug!("answering join challenge");
                self.send_joining(response.to_vec());
            }
            Err(e) => {
                log::warn!("challenge response failed: {}", e);
                self.join_attempt_failed();
            }
        }
    }

    fn on_accepted(&mut self, message: &LbpMessage) {
        if self.status != JoinStatus::Joining {
            return;
        }
        let Some(selected) = self.selected else {
            return;
        };
        let params = match decode_params(&message.payload) {
            Ok(params) => params,
            Err(e) => {
                log::warn!("bad Accepted parameters: {}", e);
                self.join_attempt_failed();
                return;
            }
        };

        let mut short_address = None;
        let mut group_key = None;
        let mut active_key_id = None;
        for param in params {
            match param {
                ConfigParam::ShortAddress(address) => short_address = Some(address),
                ConfigParam::Gmk { key_id, key } => group_key = Some(GroupKey::new(key_id, key)),
                ConfigParam::GmkActivation { key_id } => active_key_id = Some(key_id),
                ConfigParam::GmkRemoval { .. } => {}
                ConfigParam::Result { code, attribute } => {
                    if code != ParameterResult::Success {
                        log::warn!("Accepted carries result {:?} for attribute 0x{:02X}", code, attribute);
                        self.join_attempt_failed();
                        return;
                    }
                }
            }
        }
        // A short address is the one parameter a join cannot do without
        let Some(short_address) = short_address else {
            log::warn!("Accepted without a short address");
            self.join_attempt_failed();
            return;
        };

        let info = NetworkInfo {
            pan_id: selected.pan_id,
            short_address,
            lba_address: selected.lba_address,
            link_local: link_local_address(selected.pan_id, short_address),
            unique_local: unique_local_address(selected.pan_id, &self.address),
            group_key,
            active_key_id,
        };
        log::info!(
            "joined PAN 0x{:04X} as 0x{:04X}",
            info.pan_id.value(),
            info.short_address.value()
        );
        self.status = JoinStatus::Joined;
        self.timer = None;
        self.join_attempts = 0;
        self.network = Some(info.clone());
        self.commands.push_back(DeviceCommand::NetworkJoined(info));
        self.commands.push_back(DeviceCommand::PathDiscovery {
            destination: ShortAddress::COORDINATOR,
        });
    }

    fn send_joining(&mut self, payload: Vec<u8>) {
        let Some(selected) = self.selected else {
            return;
        };
        self.commands.push_back(DeviceCommand::SendLbp {
            destination: selected.lba_address,
            message: LbpMessage::joining(self.address, MediaType::Plc, payload),
        });
        self.status = JoinStatus::Joining;
        self.timer = Some(JOIN_WAIT_MS);
    }

    fn join_attempt_failed(&mut self) {
        self.timer = None;
        self.join_attempts += 1;
        if self.join_attempts >= MAX_JOIN_ATTEMPTS {
            log::warn!("join attempts exhausted, falling back to rediscovery");
            self.join_attempts = 0;
            self.selected = None;
            self.status = JoinStatus::NotJoined;
        } else {
            self.enter_check_for_lbp_traffic();
        }
    }

    fn leave_network(&mut self) {
        self.network = None;
        self.commands.push_back(DeviceCommand::NetworkLeft);
        self.enter_init_delay();
    }

    fn enter_init_delay(&mut self) {
        self.status = JoinStatus::InitDelay;
        self.timer = Some(self.rng.gen_range(0..STARTUP_DELAY_MAX_MS));
        self.monitor.reset();
        self.discovery_window.reset();
        self.join_window.reset();
        self.selected = None;
        self.join_attempts = 0;
    }

    fn enter_check_for_beacons(&mut self) {
        self.status = JoinStatus::CheckForBeacons;
        self.timer = Some(DISCOVERY_CHECK_MS);
        self.monitor.reset();
    }

    fn enter_check_for_lbp_traffic(&mut self) {
        self.status = JoinStatus::CheckForLbpTraffic;
        self.timer = Some(JOIN_CHECK_MS);
        self.monitor.reset();
    }
}

impl std::fmt::Debug for DeviceJoin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceJoin")
            .field("address", &self.address)
            .field("status", &self.status)
            .field("timer", &self.timer)
            .field("join_attempts", &self.join_attempts)
            .finish()
    }
}

//! G3-PLC DLMS metering stack
//!
//! This library implements the DLMS/COSEM communication profile used on
//! G3-PLC smart-meter networks: LBP bootstrap for joining the PAN, the
//! client and server halves of the application layer and the wire codecs
//! underneath them.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `g3plc-core`: addresses, OBIS codes, data values, errors, configuration
//! - `g3plc-codec`: A-XDR, ACSE and xDLMS APDUs, LBP frames, MAC parameters
//! - `g3plc-transport`: serial, UDP and in-memory links to the PLC modem
//! - `g3plc-session`: wrapper and HDLC framing between ports
//! - `g3plc-bootstrap`: LBP join machines for device and coordinator
//! - `g3plc-client`: client associations, GET/SET services, cycle polling
//! - `g3plc-server`: server associations, object registry, interface classes
//!
//! # Usage
//!
//! ```no_run
//! use g3plc::client::DlmsClient;
//!
//! let client = DlmsClient::with_reference_associations();
//! ```

// Re-export core types
pub use g3plc_core::address::*;
pub use g3plc_core::data::*;
pub use g3plc_core::{G3Error, G3Result, ObisCode};

// Re-export the wire codecs
pub mod codec {
    pub use g3plc_codec::*;
}

// Re-export the transports
pub mod transport {
    pub use g3plc_transport::*;
}

// Re-export the session layer
pub mod session {
    pub use g3plc_session::*;
}

// Re-export the bootstrap layer
pub mod bootstrap {
    pub use g3plc_bootstrap::*;
}

// Re-export the client API
pub mod client {
    pub use g3plc_client::*;
}

// Re-export the server API
pub mod server {
    pub use g3plc_server::*;
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use g3plc_core::{
        AssociationConfig, AttributeDescriptor, CLIENT_CONFORMANCE, DataAccessResult,
        ReleaseReason, SERVER_CONFORMANCE, SERVER_MAX_APDU_SIZE,
    };

    use crate::bootstrap::backoff::{DISCOVERY_CHECK_MS, JOIN_CHECK_MS};
    use crate::bootstrap::device::STARTUP_DELAY_MAX_MS;
    use crate::bootstrap::{
        BootstrapCoordinator, CoordinatorAction, CoordinatorConfig, DeviceCommand, DeviceJoin,
        GroupKey, PanDescriptor, Psk,
    };
    use crate::client::{
        ClientResult, CycleManager, DataIndication, DlmsClient, ResponseData,
    };
    use crate::codec::{GetDataResult, GetItem};
    use crate::server::ic::association_ln::CURRENT_ASSOCIATION_OBIS;
    use crate::server::ic::{AssociationLn, Data, PibStore, Register, SharedPib, register};
    use crate::server::{AccessRights, DlmsServer};
    use crate::{DataValue, Eui64, ObisCode, PanId, ShortAddress};

    const METER_EUI: Eui64 = Eui64::new([0x00, 0x80, 0xE1, 0x02, 0x5A, 0xB3, 0x00, 0x01]);
    const METER_NODE: ShortAddress = ShortAddress(0x0005);
    const SERIAL_OBIS: ObisCode = ObisCode::new(0, 0, 96, 1, 0, 255);
    const ENERGY_OBIS: ObisCode = ObisCode::new(1, 0, 1, 8, 0, 255);
    const LOAD_CURVE_OBIS: ObisCode = ObisCode::new(0, 0, 99, 98, 0, 255);
    const TEST_PSK: Psk = Psk::new([
        0xAB, 0x10, 0x34, 0x11, 0x45, 0x11, 0x1B, 0xC3, 0xC1, 0x2D, 0xE8, 0xFF, 0x11, 0x14,
        0x22, 0x04,
    ]);

    /// Client and server wired onto the same low-level port pair.
    fn wired_pair() -> (DlmsClient, DlmsServer) {
        let mut client = DlmsClient::new();
        client
            .add_association(0, AssociationConfig::low_level(1, 1, b"00000002"))
            .unwrap();
        let mut server = DlmsServer::new(METER_EUI);
        server
            .add_association(AssociationConfig::low_level(1, 1, b"00000002"))
            .unwrap();
        server
            .registry_mut()
            .register(
                AccessRights::read_only(),
                Box::new(Data::new(SERIAL_OBIS, DataValue::octets(b"40061945"))),
            )
            .unwrap();
        server
            .registry_mut()
            .register(
                AccessRights::read_write(),
                Box::new(Register::new(ENERGY_OBIS, 0, register::units::WATT_HOUR)),
            )
            .unwrap();
        (client, server)
    }

    /// Ferry APDUs between the two machines until the air goes quiet.
    fn pump(client: &mut DlmsClient, server: &mut DlmsServer) {
        while let Some(request) = client.poll_transmit() {
            let Some(server_index) =
                server.association_for_ports(request.source_wport, request.destination_wport)
            else {
                continue;
            };
            let Some(response) = server.handle_apdu(server_index, &request.apdu) else {
                continue;
            };
            let Some(client_index) =
                client.assoc_for_ports(request.destination_wport, request.source_wport)
            else {
                continue;
            };
            client.handle_apdu(client_index, METER_NODE, &response);
        }
    }

    fn terminal_indication(client: &mut DlmsClient) -> DataIndication {
        let mut terminal = None;
        while let Some(indication) = client.poll_indication() {
            if indication.result.is_terminal() && indication.last_fragment {
                terminal = Some(indication);
            }
        }
        terminal.expect("no terminal indication delivered")
    }

    fn associate(client: &mut DlmsClient, server: &mut DlmsServer) {
        assert_eq!(
            client.aarq_request(0, METER_NODE, &METER_EUI),
            ClientResult::Waiting
        );
        pump(client, server);
        let indication = terminal_indication(client);
        assert_eq!(indication.result, ClientResult::Success);
    }

    #[test]
    fn test_join_handshake_end_to_end() {
        let mut config = CoordinatorConfig::new(PanId(0x781D), TEST_PSK);
        config.challenge_devices = true;
        config.group_key = Some(GroupKey::new(0, [0x11; 16]));
        let mut coordinator =
            BootstrapCoordinator::with_rng(config, StdRng::seed_from_u64(7));
        let mut device = DeviceJoin::with_rng(METER_EUI, TEST_PSK, StdRng::seed_from_u64(3));

        // Walk the device to the point where its Joining frame is on the air
        device.tick(STARTUP_DELAY_MAX_MS);
        device.tick(0);
        device.tick(DISCOVERY_CHECK_MS);
        device.on_discovery_confirm(&[PanDescriptor::new(
            coordinator.pan_id(),
            ShortAddress::COORDINATOR,
            8,
            120,
        )]);
        device.tick(JOIN_CHECK_MS);

        // Ferry LBP frames both ways until the handshake settles
        let mut joined = None;
        for _ in 0..8 {
            while let Some(command) = device.poll_command() {
                match command {
                    DeviceCommand::SendLbp { message, .. } => coordinator.handle_lbp(&message),
                    DeviceCommand::NetworkJoined(info) => joined = Some(info),
                    _ => {}
                }
            }
            while let Some(action) = coordinator.poll_action() {
                if let CoordinatorAction::SendLbp(message) = action {
                    device.on_lbp(&message);
                }
            }
        }

        let info = joined.expect("device never finished joining");
        assert!(device.is_joined());
        assert_eq!(info.pan_id, PanId(0x781D));
        assert_eq!(info.group_key, Some(GroupKey::new(0, [0x11; 16])));
        assert_eq!(info.active_key_id, Some(0));
        assert_eq!(
            coordinator.short_address_of(&METER_EUI),
            Some(info.short_address)
        );
        assert_eq!(coordinator.len(), 1);
    }

    #[test]
    fn test_association_get_and_set_round_trip() {
        let (mut client, mut server) = wired_pair();

        assert_eq!(
            client.aarq_request(0, METER_NODE, &METER_EUI),
            ClientResult::Waiting
        );
        pump(&mut client, &mut server);
        let indication = terminal_indication(&mut client);
        assert_eq!(indication.result, ClientResult::Success);
        assert_eq!(
            indication.data,
            ResponseData::Association {
                conformance: CLIENT_CONFORMANCE & SERVER_CONFORMANCE,
                max_apdu_size: SERVER_MAX_APDU_SIZE,
            }
        );
        assert!(client.is_associated(0));
        assert!(server.is_associated(0));

        // Read the serial number
        let serial = GetItem::new(AttributeDescriptor::new(1, SERIAL_OBIS, 2));
        assert_eq!(client.object_request(0, serial), ClientResult::Waiting);
        pump(&mut client, &mut server);
        assert_eq!(
            terminal_indication(&mut client).data,
            ResponseData::Get(vec![GetDataResult::Data(DataValue::octets(b"40061945"))])
        );

        // Write the energy register and read it back
        let energy = GetItem::new(AttributeDescriptor::new(3, ENERGY_OBIS, 2));
        assert_eq!(
            client.object_set(0, energy.clone(), DataValue::DoubleLongUnsigned(814)),
            ClientResult::Waiting
        );
        pump(&mut client, &mut server);
        assert_eq!(
            terminal_indication(&mut client).data,
            ResponseData::Set(vec![DataAccessResult::Success])
        );
        assert_eq!(client.object_request(0, energy), ClientResult::Waiting);
        pump(&mut client, &mut server);
        assert_eq!(
            terminal_indication(&mut client).data,
            ResponseData::Get(vec![GetDataResult::Data(DataValue::DoubleLongUnsigned(
                814
            ))])
        );

        // Orderly release tears both sides down
        assert_eq!(
            client.release_request(0, ReleaseReason::Normal),
            ClientResult::Waiting
        );
        pump(&mut client, &mut server);
        let indication = terminal_indication(&mut client);
        assert_eq!(indication.result, ClientResult::Released);
        assert_eq!(indication.data, ResponseData::Release(ReleaseReason::Normal));
        assert!(!client.is_associated(0));
        assert!(!server.is_associated(0));
    }

    #[test]
    fn test_block_transfer_reassembles_a_long_read() {
        let (mut client, mut server) = wired_pair();
        server
            .registry_mut()
            .register(
                AccessRights::read_only(),
                Box::new(Data::new(
                    LOAD_CURVE_OBIS,
                    DataValue::OctetString(vec![0x5A; 600]),
                )),
            )
            .unwrap();
        associate(&mut client, &mut server);

        let item = GetItem::new(AttributeDescriptor::new(1, LOAD_CURVE_OBIS, 2));
        assert_eq!(client.object_request(0, item), ClientResult::Waiting);
        // The pump also carries the client's block acknowledgements
        pump(&mut client, &mut server);
        let indication = terminal_indication(&mut client);
        assert_eq!(indication.result, ClientResult::Success);
        assert_eq!(
            indication.data,
            ResponseData::Get(vec![GetDataResult::Data(DataValue::OctetString(vec![
                0x5A;
                600
            ]))])
        );
    }

    #[test]
    fn test_object_discovery_through_the_association_object() {
        struct NullPib;

        impl PibStore for NullPib {
            fn mac_get(&mut self, _attribute: u32, _index: u16) -> Option<DataValue> {
                Some(DataValue::DoubleLongUnsigned(0))
            }

            fn adp_get(&mut self, _attribute: u32, _index: u16) -> Option<DataValue> {
                Some(DataValue::DoubleLongUnsigned(0))
            }
        }

        let pib: SharedPib = Arc::new(Mutex::new(NullPib));
        let mut registry = crate::server::ic::meter_registry(pib).unwrap();
        let mut entries = registry.descriptors();
        entries.push((15, CURRENT_ASSOCIATION_OBIS));
        let expected = entries.len();
        registry
            .register(
                AccessRights::read_only(),
                Box::new(AssociationLn::new(entries)),
            )
            .unwrap();

        let mut client = DlmsClient::new();
        client
            .add_association(0, AssociationConfig::low_level(1, 1, b"00000002"))
            .unwrap();
        let mut server = DlmsServer::new(METER_EUI);
        server
            .add_association(AssociationConfig::low_level(1, 1, b"00000002"))
            .unwrap();
        *server.registry_mut() = registry;
        associate(&mut client, &mut server);

        let list = GetItem::new(AttributeDescriptor::new(15, CURRENT_ASSOCIATION_OBIS, 2));
        assert_eq!(client.object_request(0, list), ClientResult::Waiting);
        pump(&mut client, &mut server);
        let indication = terminal_indication(&mut client);
        let ResponseData::Get(results) = indication.data else {
            panic!("expected GET data, got {:?}", indication.data);
        };
        let [GetDataResult::Data(DataValue::Array(objects))] = results.as_slice() else {
            panic!("expected the object list array, got {:?}", results);
        };
        assert_eq!(objects.len(), expected);
        // The association object lists itself alongside the clock
        let clock_entry = DataValue::Structure(vec![
            DataValue::LongUnsigned(8),
            DataValue::Unsigned(0),
            DataValue::octets(ObisCode::new(0, 0, 1, 0, 0, 255).as_bytes()),
        ]);
        let own_entry = DataValue::Structure(vec![
            DataValue::LongUnsigned(15),
            DataValue::Unsigned(0),
            DataValue::octets(CURRENT_ASSOCIATION_OBIS.as_bytes()),
        ]);
        assert!(objects.contains(&clock_entry));
        assert!(objects.contains(&own_entry));
    }

    #[test]
    fn test_polling_cycle_reads_a_live_meter() {
        let (mut client, mut server) = wired_pair();
        let objects = vec![
            GetItem::new(AttributeDescriptor::new(1, SERIAL_OBIS, 2)),
            GetItem::new(AttributeDescriptor::new(3, ENERGY_OBIS, 2)),
        ];
        let mut cycle = CycleManager::new(0, objects);
        cycle.node_joined(METER_EUI, METER_NODE);

        cycle.tick(crate::client::cycle::INITIAL_IDLE_MS, &mut client);
        for _ in 0..100 {
            cycle.tick(crate::client::cycle::TIME_BETWEEN_MESSAGES_MS, &mut client);
            pump(&mut client, &mut server);
            while let Some(indication) = client.poll_indication() {
                cycle.on_indication(&indication, &mut client);
            }
            if cycle.cycles_completed() >= 1 {
                break;
            }
        }

        assert_eq!(cycle.cycles_completed(), 1);
        assert_eq!(cycle.stats().len(), 1);
        assert_eq!(cycle.stats()[0].cycles, 1);
        assert_eq!(cycle.stats()[0].successes, 1);
        assert_eq!(cycle.stats()[0].errors, 0);
        // The visit released the association behind itself
        assert!(!client.is_associated(0));
        assert!(!server.is_associated(0));
    }
}

/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use radarbase::Error;
use radarbase::connection::auto_connect;
use radarbase::connection::backend::SimulatedProtocol;
use radarbase::connection::backend::sim_backend::{SimulatedPort, SimulatorConfig};
use radarbase::connection::port::RadarProtocol;

fn protocol_with_ports(ports: Vec<SimulatedPort>) -> SimulatedProtocol {
    SimulatedProtocol::new(SimulatorConfig {
        ports,
        ..SimulatorConfig::default()
    })
}

#[tokio::test]
async fn test_scan_stops_at_first_responsive_port() {
    let mut protocol = protocol_with_ports(vec![
        SimulatedPort::unresponsive("COM1"),
        SimulatedPort::unresponsive("COM2"),
        SimulatedPort::responsive("COM3"),
        SimulatedPort::responsive("COM4"),
    ]);

    let connection = auto_connect(&mut protocol).await.unwrap();

    assert_eq!(connection.port_name(), "COM3");
    // First session opened by the simulator.
    assert_eq!(connection.handle(), 0);
    assert_eq!(protocol.connect_attempts(), &["COM1", "COM2", "COM3"]);
}

#[tokio::test]
async fn test_empty_port_list_fails_without_connecting() {
    let mut protocol = protocol_with_ports(vec![]);

    let err = auto_connect(&mut protocol).await.err().unwrap();

    assert!(matches!(err, Error::NoPorts));
    assert!(protocol.connect_attempts().is_empty());
}

#[tokio::test]
async fn test_all_ports_failing_reports_attempt_count() {
    let mut protocol = protocol_with_ports(vec![
        SimulatedPort::unresponsive("/dev/ttyACM0"),
        SimulatedPort::unresponsive("/dev/ttyACM1"),
    ]);

    let err = auto_connect(&mut protocol).await.err().unwrap();

    assert!(matches!(err, Error::ConnectFailed { tried: 2 }));
    assert_eq!(protocol.connect_attempts().len(), 2);
}

#[tokio::test]
async fn test_endpoint_lookup_picks_radar_base() {
    let mut protocol = SimulatedProtocol::position2go();
    assert_eq!(protocol.name(), "simulator");

    let mut connection = auto_connect(&mut protocol).await.unwrap();

    assert_eq!(connection.find_radar_base_endpoint().await.unwrap(), Some(1));
    connection.disconnect().await.unwrap();
}

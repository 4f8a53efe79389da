//! Sends real sACN packets over loopback and checks what arrives.

use std::sync::Arc;

use folje_core::{BroadcastConfig, E131Connector, FollowConsole};
use folje_fixtures::Fixture;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Duration};

async fn receive(socket: &UdpSocket) -> Vec<u8> {
    let mut buffer = [0u8; 1024];
    let (length, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
        .await
        .expect("timed out waiting for sACN packet")
        .unwrap();
    buffer[..length].to_vec()
}

#[tokio::test]
async fn test_unicast_frames_stop_at_shutdown() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = receiver.local_addr().unwrap().port();

    let config = BroadcastConfig {
        source_address: "127.0.0.1".to_string(),
        fps: 50,
        multicast: false,
        destinations: vec![format!("127.0.0.1:{}", port)],
    };
    let mut console =
        FollowConsole::with_connector(config, Arc::new(E131Connector::new("Loopback")));
    console.set_fixtures(vec![Fixture::new("spot", "Spot", 9, 0, 1, 2, 3)]);
    console.set_pan_tilt_for_fixture("spot", 0x1234, 0xABCD).unwrap();

    console.initialize().await.unwrap();

    let packet = receive(&receiver).await;
    assert_eq!(packet.len(), 638);
    assert_eq!(&packet[4..16], b"ASC-E1.17\0\0\0");
    assert_eq!(&packet[44..52], b"Loopback");
    assert_eq!(u16::from_be_bytes([packet[113], packet[114]]), 9);
    assert_eq!(packet[112] & 0x40, 0);
    assert_eq!(packet[125], 0);
    assert_eq!(&packet[126..130], &[0x12, 0x34, 0xAB, 0xCD]);

    console.shutdown().await.unwrap();

    // Frames already on the wire may still be queued at the receiver.
    let mut buffer = [0u8; 1024];
    while timeout(Duration::from_millis(100), receiver.recv_from(&mut buffer))
        .await
        .is_ok()
    {}

    let late = timeout(Duration::from_millis(300), receiver.recv_from(&mut buffer)).await;
    assert!(late.is_err(), "a frame arrived after shutdown");
}

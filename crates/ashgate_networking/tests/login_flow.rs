//! Login service over real sockets.

mod common;

use std::net::Ipv4Addr;

use ashgate_networking::login::INVALID_CREDENTIALS;
use ashgate_networking::protocol::handshake::encode_login;
use ashgate_networking::protocol::packets::tags;
use ashgate_networking::PacketReader;
use ashgate_shared::constants::{CLIENT_VERSION, GAME_PORT};

use common::{config, pump, Client, Fixture, KEY};

#[test]
fn test_login_returns_character_list_then_closes() {
    let fixture = Fixture::new(config());
    let mut server = fixture.login_server();
    let mut client = Client::connect(server.local_addr());

    client.send(&encode_login(&fixture.rsa, CLIENT_VERSION, &KEY, b"tester", b"secret").unwrap());
    let payload = client.recv_payload(&mut server, &KEY);

    let mut reader = PacketReader::new(&payload);
    assert_eq!(reader.read_u8(), Some(tags::MOTD));
    assert_eq!(reader.read_string(256), Some(&b"1\nWelcome to Ashgate!"[..]));
    assert_eq!(reader.read_u8(), Some(tags::CHARACTER_LIST));
    assert_eq!(reader.read_u8(), Some(2));
    for name in [&b"Knight"[..], &b"Druid"[..]] {
        assert_eq!(reader.read_string(32), Some(name));
        assert_eq!(reader.read_string(32), Some(&b"Ashgate"[..]));
        assert_eq!(
            reader.read_u32(),
            Some(u32::from_le_bytes(Ipv4Addr::LOCALHOST.octets()))
        );
        assert_eq!(reader.read_u16(), Some(GAME_PORT));
    }
    assert_eq!(reader.read_u16(), Some(30));
    assert_eq!(reader.remaining(), 0);

    assert!(client.wait_closed(&mut server).is_empty());
    pump(&mut server, |m| m.live_connections() == 0);
    assert_eq!(server.stats().closed, 1);
    assert_eq!(server.stats().aborted, 0);
}

#[test]
fn test_wrong_password_is_rejected() {
    let fixture = Fixture::new(config());
    let mut server = fixture.login_server();
    let mut client = Client::connect(server.local_addr());

    client.send(&encode_login(&fixture.rsa, CLIENT_VERSION, &KEY, b"tester", b"guess").unwrap());
    let payload = client.recv_payload(&mut server, &KEY);

    let mut reader = PacketReader::new(&payload);
    assert_eq!(reader.read_u8(), Some(tags::LOGIN_DISCONNECT));
    assert_eq!(reader.read_string(256), Some(INVALID_CREDENTIALS.as_bytes()));
    client.wait_closed(&mut server);
}

#[test]
fn test_old_client_is_told_which_version_to_use() {
    let fixture = Fixture::new(config());
    let mut server = fixture.login_server();
    let mut client = Client::connect(server.local_addr());

    client.send(&encode_login(&fixture.rsa, 854, &KEY, b"tester", b"secret").unwrap());
    let payload = client.recv_payload(&mut server, &KEY);

    let mut reader = PacketReader::new(&payload);
    assert_eq!(reader.read_u8(), Some(tags::LOGIN_DISCONNECT));
    assert_eq!(
        reader.read_string(256),
        Some(&b"This server requires client version 8.60."[..])
    );
    client.wait_closed(&mut server);
}

#[test]
fn test_garbage_handshake_closes_without_reply() {
    let fixture = Fixture::new(config());
    let mut server = fixture.login_server();
    let mut client = Client::connect(server.local_addr());

    client.send(&[0x5A; 149]);
    assert!(client.wait_closed(&mut server).is_empty());
}

#[test]
fn test_oversize_frame_aborts() {
    let fixture = Fixture::new(config());
    let mut server = fixture.login_server();
    let mut client = Client::connect(server.local_addr());

    client.send_raw(&300u16.to_le_bytes());
    pump(&mut server, |m| m.stats().aborted == 1);
    assert_eq!(server.stats().messages_read, 0);
    assert!(client.wait_closed(&mut server).is_empty());
}

#[test]
fn test_slot_is_reused_after_close() {
    let mut config = config();
    config.login.max_connections = 1;
    let fixture = Fixture::new(config);
    let mut server = fixture.login_server();

    for _ in 0..3 {
        let mut client = Client::connect(server.local_addr());
        client.send(&encode_login(&fixture.rsa, CLIENT_VERSION, &KEY, b"tester", b"secret").unwrap());
        client.recv_payload(&mut server, &KEY);
        client.wait_closed(&mut server);
        pump(&mut server, |m| m.live_connections() == 0);
    }

    assert_eq!(server.stats().accepted, 3);
    assert_eq!(server.stats().rejected, 0);
    let session = server
        .handler()
        .session(ashgate_networking::ConnectionId(0))
        .unwrap();
    assert!(session.is_vacant());
}

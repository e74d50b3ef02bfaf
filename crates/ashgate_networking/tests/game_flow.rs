//! Game service over real sockets.

mod common;

use ashgate_networking::game::{CHALLENGE, INVALID_CHARACTER};
use ashgate_networking::protocol::codec;
use ashgate_networking::protocol::handshake::encode_game;
use ashgate_networking::protocol::packets::{tags, world_login_len};
use ashgate_networking::{ConnectionId, GameService, Multiplexer, PacketReader};
use ashgate_shared::constants::CLIENT_VERSION;

use common::{config, pump, Client, Fixture, KEY};

fn say(text: &[u8]) -> Vec<u8> {
    let mut payload = vec![tags::CLIENT_SAY, 0x01];
    payload.extend_from_slice(&u16::try_from(text.len()).unwrap().to_le_bytes());
    payload.extend_from_slice(text);
    payload
}

/// Connects, answers the challenge and consumes the world snapshot.
fn enter_world(fixture: &Fixture, server: &mut Multiplexer<GameService>) -> Client {
    let mut client = Client::connect(server.local_addr());
    assert_eq!(client.recv_frame(server), &CHALLENGE[2..]);

    client.send(
        &encode_game(&fixture.rsa, CLIENT_VERSION, &KEY, b"tester", b"Druid", b"secret").unwrap(),
    );
    let snapshot = client.recv_payload(server, &KEY);
    assert_eq!(snapshot.len(), world_login_len(5));
    assert_eq!(snapshot[0], tags::WORLD_LOGIN);
    client
}

#[test]
fn test_challenge_is_sent_on_connect() {
    let fixture = Fixture::new(config());
    let mut server = fixture.game_server();
    let mut client = Client::connect(server.local_addr());

    let body = client.recv_frame(&mut server);
    assert_eq!(body, &CHALLENGE[2..]);
}

#[test]
fn test_world_login_and_commands() {
    let fixture = Fixture::new(config());
    let mut server = fixture.game_server();
    let mut client = enter_world(&fixture, &mut server);

    client.send_sealed(&say(b"2400"), &KEY);
    assert_eq!(
        client.recv_payload(&mut server, &KEY),
        vec![tags::INVENTORY_ITEM, 6, 0x60, 0x09]
    );

    client.send_sealed(&say(b"15"), &KEY);
    assert_eq!(client.recv_payload(&mut server, &KEY), vec![tags::RELOGIN]);

    client.send_sealed(&[tags::CLIENT_LOGOUT], &KEY);
    assert!(client.wait_closed(&mut server).is_empty());
    pump(&mut server, |m| m.live_connections() == 0);
    assert_eq!(server.stats().closed, 1);
}

#[test]
fn test_say_fourteen_sends_reason_then_closes() {
    let fixture = Fixture::new(config());
    let mut server = fixture.game_server();
    let mut client = enter_world(&fixture, &mut server);

    client.send_sealed(&say(b"14"), &KEY);
    let payload = client.recv_payload(&mut server, &KEY);
    let mut reader = PacketReader::new(&payload);
    assert_eq!(reader.read_u8(), Some(tags::GAME_DISCONNECT));
    assert_eq!(reader.read_string(256), Some(&b"test"[..]));
    assert!(client.wait_closed(&mut server).is_empty());
}

#[test]
fn test_unknown_character_is_rejected() {
    let fixture = Fixture::new(config());
    let mut server = fixture.game_server();
    let mut client = Client::connect(server.local_addr());
    client.recv_frame(&mut server);

    client.send(
        &encode_game(&fixture.rsa, CLIENT_VERSION, &KEY, b"tester", b"Paladin", b"secret").unwrap(),
    );
    let payload = client.recv_payload(&mut server, &KEY);
    let mut reader = PacketReader::new(&payload);
    assert_eq!(reader.read_u8(), Some(tags::GAME_DISCONNECT));
    assert_eq!(reader.read_string(256), Some(INVALID_CHARACTER.as_bytes()));
    assert!(client.wait_closed(&mut server).is_empty());
}

#[test]
fn test_corrupt_frame_closes_without_reply() {
    let fixture = Fixture::new(config());
    let mut server = fixture.game_server();
    let mut client = enter_world(&fixture, &mut server);

    let payload = say(b"2400");
    let mut frame = vec![0u8; codec::sealed_len(payload.len())];
    let len = codec::wrap(&payload, &KEY, &mut frame).unwrap();
    frame[len - 1] ^= 0x01;
    client.send_raw(&frame[..len]);

    assert!(client.wait_closed(&mut server).is_empty());
    pump(&mut server, |m| m.live_connections() == 0);
    let session = server.handler().session(ConnectionId(0)).unwrap();
    assert!(session.is_vacant());
}

#[test]
fn test_full_server_rejects_then_reuses_slot() {
    let mut config = config();
    config.game.max_connections = 1;
    let fixture = Fixture::new(config);
    let mut server = fixture.game_server();

    let mut first = enter_world(&fixture, &mut server);

    let mut second = Client::connect(server.local_addr());
    pump(&mut server, |m| m.stats().rejected == 1);
    assert!(second.wait_closed(&mut server).is_empty());

    first.send_sealed(&[tags::CLIENT_LOGOUT], &KEY);
    first.wait_closed(&mut server);
    pump(&mut server, |m| m.live_connections() == 0);
    assert_eq!(server.handler().pool().available(), server.handler().pool().allocated());

    let _third = enter_world(&fixture, &mut server);
    assert_eq!(server.stats().accepted, 2);
}

//! # Packet Definitions
//!
//! Server-to-client messages. Every builder appends one message to a
//! [`PacketWriter`]; several messages may share one frame.

use std::net::Ipv4Addr;

use super::serialization::PacketWriter;

/// Message tags, first byte of every message.
pub mod tags {
    /// Login: disconnect with reason.
    pub const LOGIN_DISCONNECT: u8 = 0x0A;
    /// Login: message of the day.
    pub const MOTD: u8 = 0x14;
    /// Login: character list.
    pub const CHARACTER_LIST: u8 = 0x64;

    /// Game: login snapshot.
    pub const WORLD_LOGIN: u8 = 0x0A;
    /// Game: disconnect with reason.
    pub const GAME_DISCONNECT: u8 = 0x14;
    /// Game: relogin prompt.
    pub const RELOGIN: u8 = 0x28;
    /// Game: map description.
    pub const MAP_DESCRIPTION: u8 = 0x64;
    /// Game: inventory slot update.
    pub const INVENTORY_ITEM: u8 = 0x78;
    /// Game: world light.
    pub const WORLD_LIGHT: u8 = 0x82;
    /// Game: player stats.
    pub const PLAYER_STATS: u8 = 0xA0;
    /// Game: player skills.
    pub const PLAYER_SKILLS: u8 = 0xA1;

    /// Client: logout.
    pub const CLIENT_LOGOUT: u8 = 0x14;
    /// Client: say something.
    pub const CLIENT_SAY: u8 = 0x96;
}

/// Id the server gives the logged-in player's creature.
pub const PLAYER_CREATURE_ID: u32 = 0x1000_0000;

/// Where every player spawns.
pub const SPAWN_POSITION: (u16, u16, u8) = (100, 100, 7);

/// Visible map window.
const MAP_WIDTH: u16 = 18;
const MAP_HEIGHT: u16 = 14;
/// Player tile inside the window, on the ground floor.
const PLAYER_TILE: (u16, u16) = (8, 6);
const GROUND_FLOOR: u8 = 7;

const GRASS: u16 = 106;
const DECORATION: u16 = 1998;
const FILLER: u16 = 2400;
const TILE_END: u16 = 0xFF00;
const CREATURE_UNKNOWN: u16 = 0x61;

/// Bytes [`write_world_login`] emits for a character name of `name_len` bytes.
#[must_use]
pub const fn world_login_len(name_len: usize) -> usize {
    12_200 + name_len
}

// =============================================================================
// LOGIN SERVICE
// =============================================================================

/// One character-list row.
#[derive(Debug, Clone, Copy)]
pub struct CharacterEntry<'a> {
    /// Character name.
    pub name: &'a [u8],
    /// World the character lives on.
    pub world: &'a [u8],
    /// Game service address.
    pub host: Ipv4Addr,
    /// Game service port.
    pub port: u16,
}

/// Message of the day.
pub fn write_motd(writer: &mut PacketWriter<'_>, motd: &[u8]) {
    writer.write_u8(tags::MOTD);
    writer.write_string(motd);
}

/// Character list with trailing premium days.
///
/// The address goes out as the in-memory form of the octets read as a
/// little-endian integer, so 127.0.0.1 is 16777343.
pub fn write_character_list<'a, I>(writer: &mut PacketWriter<'_>, characters: I, premium_days: u16)
where
    I: ExactSizeIterator<Item = CharacterEntry<'a>>,
{
    writer.write_u8(tags::CHARACTER_LIST);
    let Ok(count) = u8::try_from(characters.len()) else {
        writer.poison();
        return;
    };
    writer.write_u8(count);
    for entry in characters {
        writer.write_string(entry.name);
        writer.write_string(entry.world);
        writer.write_u32(u32::from_le_bytes(entry.host.octets()));
        writer.write_u16(entry.port);
    }
    writer.write_u16(premium_days);
}

/// Login disconnect with a reason shown to the player.
pub fn write_login_disconnect(writer: &mut PacketWriter<'_>, reason: &[u8]) {
    writer.write_u8(tags::LOGIN_DISCONNECT);
    writer.write_string(reason);
}

// =============================================================================
// GAME SERVICE
// =============================================================================

/// Game disconnect with a reason shown to the player.
pub fn write_game_disconnect(writer: &mut PacketWriter<'_>, reason: &[u8]) {
    writer.write_u8(tags::GAME_DISCONNECT);
    writer.write_string(reason);
}

/// Inventory slot update.
pub fn write_inventory_item(writer: &mut PacketWriter<'_>, slot: u8, item_id: u16) {
    writer.write_u8(tags::INVENTORY_ITEM);
    writer.write_u8(slot);
    writer.write_u16(item_id);
}

/// Relogin prompt.
pub fn write_relogin_prompt(writer: &mut PacketWriter<'_>) {
    writer.write_u8(tags::RELOGIN);
}

/// Everything the client needs to enter the world.
///
/// Login header, an 8-floor map window with the player at its center, empty
/// inventory, stats, skills and world light.
pub fn write_world_login(writer: &mut PacketWriter<'_>, character: &[u8]) {
    writer.write_u8(tags::WORLD_LOGIN);
    writer.write_u32(PLAYER_CREATURE_ID);
    writer.write_u16(0x0032); // draw speed
    writer.write_u8(0); // can report bugs

    let (x, y, z) = SPAWN_POSITION;
    writer.write_u8(tags::MAP_DESCRIPTION);
    writer.write_u16(x);
    writer.write_u16(y);
    writer.write_u8(z);

    for floor in (0..=GROUND_FLOOR).rev() {
        for tile_x in 0..MAP_WIDTH {
            for tile_y in 0..MAP_HEIGHT {
                writer.write_u16(GRASS);
                let on_ground = floor == GROUND_FLOOR && tile_y == PLAYER_TILE.1;
                if on_ground && tile_x == PLAYER_TILE.0 {
                    write_player_creature(writer, character);
                } else if on_ground && tile_x == PLAYER_TILE.0 + 1 {
                    writer.write_u16(DECORATION);
                } else {
                    writer.write_u16(FILLER);
                }
                writer.write_u16(TILE_END);
            }
        }
    }

    // Ten empty inventory slots: 0x79 plus slot number.
    for slot in 1..=10u16 {
        writer.write_u16((slot << 8) | 0x79);
    }

    writer.write_u8(tags::PLAYER_STATS);
    writer.write_u16(125); // health
    writer.write_u16(150); // max health
    writer.write_u32(100 * 100); // free capacity
    writer.write_u32(155); // experience
    writer.write_u16(15); // level
    writer.write_u8(50); // level percent
    writer.write_u16(123); // mana
    writer.write_u16(321); // max mana
    writer.write_u8(25); // magic level
    writer.write_u8(75); // magic level percent
    writer.write_u8(97); // soul
    writer.write_u16(61); // stamina minutes

    writer.write_u8(tags::PLAYER_SKILLS);
    for (level, percent) in [(11, 90), (12, 80), (13, 70), (14, 60), (15, 50), (16, 40), (17, 30)] {
        writer.write_u8(level);
        writer.write_u8(percent);
    }

    writer.write_u8(tags::WORLD_LIGHT);
    writer.write_u8(70);
    writer.write_u8(0xD7);
}

fn write_player_creature(writer: &mut PacketWriter<'_>, name: &[u8]) {
    writer.write_u16(CREATURE_UNKNOWN);
    writer.write_u32(0); // creature to forget
    writer.write_u32(PLAYER_CREATURE_ID);
    writer.write_string(name);
    writer.write_u8(100); // health percent
    writer.write_u8(2); // direction
    writer.write_u16(136); // outfit
    writer.write_bytes(&[10, 10, 10, 10]); // head, body, legs, feet
    writer.write_u8(0); // addons
    writer.write_u8(0); // light level
    writer.write_u8(0); // light color
    writer.write_u16(100); // step speed
    writer.write_u8(3); // skull
    writer.write_u8(3); // party shield
    writer.write_u8(1); // war emblem
    writer.write_u8(1); // blocks path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::serialization::PacketReader;

    #[test]
    fn test_character_list_layout() {
        let mut buf = [0u8; 64];
        let mut writer = PacketWriter::new(&mut buf);
        let entry = CharacterEntry {
            name: b"Player",
            world: b"World",
            host: Ipv4Addr::LOCALHOST,
            port: 7172,
        };
        write_character_list(&mut writer, std::iter::once(entry), 1);
        assert!(writer.is_ok());
        let len = writer.position();

        let mut reader = PacketReader::new(&buf[..len]);
        assert_eq!(reader.read_u8(), Some(tags::CHARACTER_LIST));
        assert_eq!(reader.read_u8(), Some(1));
        assert_eq!(reader.read_string(64), Some(&b"Player"[..]));
        assert_eq!(reader.read_string(64), Some(&b"World"[..]));
        assert_eq!(reader.read_u32(), Some(16_777_343));
        assert_eq!(reader.read_u16(), Some(7172));
        assert_eq!(reader.read_u16(), Some(1));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_world_login_length() {
        let mut buf = vec![0u8; 16 * 1024];
        let mut writer = PacketWriter::new(&mut buf);
        write_world_login(&mut writer, b"Player");
        assert!(writer.is_ok());
        assert_eq!(writer.position(), world_login_len(6));
    }

    #[test]
    fn test_world_login_header_and_tail() {
        let mut buf = vec![0u8; 16 * 1024];
        let mut writer = PacketWriter::new(&mut buf);
        write_world_login(&mut writer, b"Player");
        let len = writer.position();

        assert_eq!(&buf[..8], &[0x0A, 0x00, 0x00, 0x00, 0x10, 0x32, 0x00, 0x00]);
        assert_eq!(&buf[8..14], &[0x64, 100, 0, 100, 0, 7]);
        assert_eq!(&buf[len - 3..len], &[0x82, 70, 0xD7]);
    }

    #[test]
    fn test_small_messages() {
        let mut buf = [0u8; 16];
        let mut writer = PacketWriter::new(&mut buf);
        write_inventory_item(&mut writer, 6, 2400);
        write_relogin_prompt(&mut writer);
        let len = writer.position();
        assert_eq!(&buf[..len], &[0x78, 6, 0x60, 0x09, 0x28]);
    }

    #[test]
    fn test_disconnect_overflow_detected() {
        let mut buf = [0u8; 8];
        let mut writer = PacketWriter::new(&mut buf);
        write_game_disconnect(&mut writer, b"a reason that is too long");
        assert!(!writer.is_ok());
    }
}

//! Helpers shared by the service integration tests.

#![allow(dead_code)]

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::rc::Rc;
use std::time::{Duration, Instant};

use ashgate_core::Arena;
use ashgate_crypto::{RsaKey, XteaKey};
use ashgate_networking::protocol::codec;
use ashgate_networking::{
    ConnectionHandler, GameService, LoginService, Multiplexer, MultiplexerSettings,
};
use ashgate_shared::{AccountConfig, ServiceConfig};

pub const KEY: XteaKey = XteaKey::new([0xA1B2_C3D4, 0x0102_0304, 0xCAFE_BABE, 0x7777_0001]);

/// Loopback config with room for two connections per service.
pub fn config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.login.bind = "127.0.0.1:0".parse().unwrap();
    config.login.max_connections = 2;
    config.game.bind = "127.0.0.1:0".parse().unwrap();
    config.game.max_connections = 2;
    config.accounts = vec![AccountConfig {
        name: "tester".to_string(),
        password: "secret".to_string(),
        premium_days: 30,
        characters: vec!["Knight".to_string(), "Druid".to_string()],
    }];
    config
}

pub struct Fixture {
    pub arena: Rc<Arena>,
    pub rsa: Rc<RsaKey>,
    pub config: Rc<ServiceConfig>,
}

impl Fixture {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            arena: Rc::new(Arena::reserve(8 << 20, 1 << 16).unwrap()),
            rsa: Rc::new(RsaKey::builtin().unwrap()),
            config: Rc::new(config),
        }
    }

    pub fn login_server(&self) -> Multiplexer<LoginService> {
        let service = LoginService::new(&self.arena, Rc::clone(&self.rsa), Rc::clone(&self.config));
        Multiplexer::bind(MultiplexerSettings::login(&self.config.login), service, &self.arena)
            .unwrap()
    }

    pub fn game_server(&self) -> Multiplexer<GameService> {
        let service =
            GameService::new(Rc::clone(&self.arena), Rc::clone(&self.rsa), Rc::clone(&self.config));
        Multiplexer::bind(MultiplexerSettings::game(&self.config.game), service, &self.arena)
            .unwrap()
    }
}

/// Polls `mux` until `until` holds.
pub fn pump<H: ConnectionHandler>(mux: &mut Multiplexer<H>, until: impl Fn(&Multiplexer<H>) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !until(&*mux) {
        assert!(Instant::now() < deadline, "timed out");
        mux.poll().unwrap();
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// A blocking-style client driven from the test thread.
///
/// The socket is non-blocking; every wait polls the server in between reads.
pub struct Client {
    stream: TcpStream,
    inbox: Vec<u8>,
    closed: bool,
}

impl Client {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_nonblocking(true).unwrap();
        stream.set_nodelay(true).unwrap();
        Self {
            stream,
            inbox: Vec::new(),
            closed: false,
        }
    }

    /// Sends `len | body`.
    pub fn send(&mut self, body: &[u8]) {
        let mut bytes = u16::try_from(body.len()).unwrap().to_le_bytes().to_vec();
        bytes.extend_from_slice(body);
        self.send_raw(&bytes);
    }

    /// Sends `payload` sealed under `key`.
    pub fn send_sealed(&mut self, payload: &[u8], key: &XteaKey) {
        let mut frame = vec![0u8; codec::sealed_len(payload.len())];
        let len = codec::wrap(payload, key, &mut frame).unwrap();
        self.send_raw(&frame[..len]);
    }

    pub fn send_raw(&mut self, bytes: &[u8]) {
        let mut written = 0;
        while written < bytes.len() {
            match self.stream.write(&bytes[written..]) {
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => std::thread::yield_now(),
                Err(e) => panic!("send failed: {e}"),
            }
        }
    }

    fn fill<H: ConnectionHandler>(&mut self, mux: &mut Multiplexer<H>) {
        let mut buf = [0u8; 4096];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    self.closed = true;
                    return;
                }
                Ok(n) => self.inbox.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                    self.closed = true;
                    return;
                }
                Err(e) => panic!("read failed: {e}"),
            }
        }
        mux.poll().unwrap();
        std::thread::sleep(Duration::from_millis(1));
    }

    /// Waits for one frame and returns it without its outer length.
    pub fn recv_frame<H: ConnectionHandler>(&mut self, mux: &mut Multiplexer<H>) -> Vec<u8> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if self.inbox.len() >= 2 {
                let len = usize::from(u16::from_le_bytes([self.inbox[0], self.inbox[1]]));
                if self.inbox.len() >= 2 + len {
                    let body = self.inbox[2..2 + len].to_vec();
                    self.inbox.drain(..2 + len);
                    return body;
                }
            }
            assert!(!self.closed, "connection closed before a full frame arrived");
            assert!(Instant::now() < deadline, "timed out waiting for a frame");
            self.fill(mux);
        }
    }

    /// Waits for a frame and decrypts it.
    pub fn recv_payload<H: ConnectionHandler>(
        &mut self,
        mux: &mut Multiplexer<H>,
        key: &XteaKey,
    ) -> Vec<u8> {
        let mut body = self.recv_frame(mux);
        codec::unwrap(&mut body, key).unwrap().to_vec()
    }

    /// Waits for the server to end the connection; returns unread bytes.
    pub fn wait_closed<H: ConnectionHandler>(&mut self, mux: &mut Multiplexer<H>) -> Vec<u8> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.closed {
            assert!(Instant::now() < deadline, "timed out waiting for close");
            self.fill(mux);
        }
        std::mem::take(&mut self.inbox)
    }
}

//! # Service Loop
//!
//! Owns both multiplexers and paces them with a [`TickLoop`].
//!
//! ## Design
//!
//! - Login is polled before game on every tick
//! - A poller failure ends the loop; connection failures never do
//! - Timing and connection counters are logged every [`STATUS_INTERVAL`]

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use ashgate_core::{Arena, ArenaError};
use ashgate_crypto::{CryptoError, RsaKey};
use ashgate_networking::{
    GameService, LoginService, Multiplexer, MultiplexerSettings, NetworkError, NetworkResult,
    TickLoop,
};
use ashgate_shared::{ConfigError, ServiceConfig};
use thiserror::Error;

/// How often the loop logs its counters.
pub const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Errors that stop the services from starting or running.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The arena could not be reserved.
    #[error("arena: {0}")]
    Arena(#[from] ArenaError),

    /// The configured RSA key is unusable.
    #[error("rsa key: {0}")]
    Rsa(#[from] CryptoError),

    /// A listener could not be bound, or the poller failed.
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Both services and the tick that drives them.
pub struct ServiceLoop {
    arena: Rc<Arena>,
    login: Multiplexer<LoginService>,
    game: Multiplexer<GameService>,
    ticks: TickLoop,
    last_status: Instant,
}

impl ServiceLoop {
    /// Reserves the arena, loads the RSA key and binds both services.
    ///
    /// `config` is expected to be validated already.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Arena`], [`ServiceError::Rsa`] or
    /// [`ServiceError::Network`] if a listener cannot be bound.
    pub fn build(config: ServiceConfig) -> Result<Self, ServiceError> {
        let config = Rc::new(config);
        let arena = Rc::new(Arena::reserve(
            config.arena.reserve_bytes,
            config.arena.granule_bytes,
        )?);

        let rsa = match &config.rsa {
            Some(key) => RsaKey::from_decimal(&key.p, &key.q, &key.e)?,
            None => RsaKey::builtin()?,
        };
        tracing::info!(bits = rsa.modulus_bits(), "RSA key loaded");
        let rsa = Rc::new(rsa);

        let login = Multiplexer::bind(
            MultiplexerSettings::login(&config.login),
            LoginService::new(&arena, Rc::clone(&rsa), Rc::clone(&config)),
            &arena,
        )?;
        let game = Multiplexer::bind(
            MultiplexerSettings::game(&config.game),
            GameService::new(Rc::clone(&arena), rsa, Rc::clone(&config)),
            &arena,
        )?;

        tracing::info!(
            arena_used = arena.used(),
            arena_reserved = arena.reserved(),
            "Services ready"
        );

        Ok(Self {
            arena,
            login,
            game,
            ticks: TickLoop::new(config.tick_interval()),
            last_status: Instant::now(),
        })
    }

    /// Returns the login multiplexer.
    #[must_use]
    pub const fn login(&self) -> &Multiplexer<LoginService> {
        &self.login
    }

    /// Returns the game multiplexer.
    #[must_use]
    pub const fn game(&self) -> &Multiplexer<GameService> {
        &self.game
    }

    /// Returns the tick loop.
    #[must_use]
    pub const fn ticks(&self) -> &TickLoop {
        &self.ticks
    }

    /// Polls login then game once.
    ///
    /// # Errors
    ///
    /// [`NetworkError::Poll`] if either poller fails.
    pub fn run_once(&mut self) -> NetworkResult<()> {
        self.login.poll()?;
        self.game.poll()
    }

    /// Ticks until `running` is cleared.
    ///
    /// # Errors
    ///
    /// As [`ServiceLoop::run_once`].
    pub fn run(&mut self, running: &AtomicBool) -> NetworkResult<()> {
        tracing::info!(
            interval = ?self.ticks.tick_duration(),
            "Service loop started"
        );

        while running.load(Ordering::Relaxed) {
            if !self.ticks.should_tick() {
                self.ticks.wait_for_next_tick();
                continue;
            }

            let start = self.ticks.begin_tick();
            self.run_once()?;
            self.ticks.end_tick(start);

            if self.last_status.elapsed() >= STATUS_INTERVAL {
                self.log_status();
                self.last_status = Instant::now();
            }
        }

        tracing::info!(ticks = self.ticks.tick_count(), "Service loop stopped");
        Ok(())
    }

    fn log_status(&mut self) {
        let ticks = *self.ticks.stats();
        let login = self.login.stats();
        let game = self.game.stats();
        tracing::info!(
            tick = self.ticks.tick_count(),
            avg_us = ticks.avg_tick_us,
            max_us = ticks.max_tick_us,
            late = ticks.late_ticks,
            login_live = self.login.live_connections(),
            login_accepted = login.accepted,
            game_live = self.game.live_connections(),
            game_accepted = game.accepted,
            game_buffers = self.game.handler().pool().allocated(),
            arena_used = self.arena.used(),
            "Status"
        );
        if ticks.late_ticks > 0 {
            tracing::warn!(late = ticks.late_ticks, total = ticks.total_ticks, "Ticks ran long");
        }
        self.ticks.reset_stats();
    }
}

impl std::fmt::Debug for ServiceLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceLoop")
            .field("login", &self.login)
            .field("game", &self.game)
            .field("tick_count", &self.ticks.tick_count())
            .finish_non_exhaustive()
    }
}

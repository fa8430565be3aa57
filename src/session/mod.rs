//! The session controller (spec §4.8): connection lifecycle, the four
//! independent timeouts, keepalive, retry with backoff, and the circuit
//! breaker, wired around the transport/telnet/protocol/screen modules.
//!
//! Grounded in the reference `controller.rs`'s `start_network_thread`/
//! `cancel_connect`/`disconnect`: an `Arc<Mutex<_>>`-guarded controller
//! driven from a plain `std::thread::spawn` loop, with a lock-retry-with-
//! backoff sequence (`MAX_RETRIES` attempts, `10 * 2^n` ms sleeps) standing
//! in for a proper async runtime. Per spec §9's explicit neutrality between
//! cooperative tasks and OS threads, this controller exposes its reader/
//! dispatcher/timer work as one synchronous `service()` call a caller drives
//! from whichever thread it likes — [`spawn_background`] wraps that in the
//! reference's own thread-plus-backoff shape for callers who want it run
//! for them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::config::SessionConfig;
use crate::error::{Result, TimeoutKind, Tn5250Error};
use crate::protocol::{AidKey, Dispatcher, Opcode, RecordHeader};
use crate::screen::Screen;
use crate::telnet::{FramerEvent, Negotiator, TelnetFramer};
use crate::transport::{self, Transport};

/// Connection lifecycle state (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Disconnected,
    Connecting,
    Negotiating,
    Connected,
    Disconnecting,
}

/// Something observers are told about, dispatched synchronously on whatever
/// thread drives the controller (spec §4.8 "Observer pattern").
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged { from: LifecycleState, to: LifecycleState },
    TimeoutOccurred(TimeoutKind),
    RecordReceived { len: usize },
    RecordSent { len: usize },
    OiaChanged,
    /// A non-fatal diagnostic raised while dispatching a record's orders
    /// (spec §8 scenario E: an out-of-range SBA is clamped, not wrapped,
    /// and the clamp itself is reported here rather than silently dropped).
    Diagnostic(Tn5250Error),
}

pub trait Observer: Send {
    fn on_event(&mut self, event: &SessionEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Opens after `threshold` consecutive connect failures; a single failure
/// while half-open re-opens it immediately (spec §4.8).
struct CircuitBreaker {
    threshold: u32,
    cooloff: Duration,
    consecutive_failures: u32,
    state: BreakerState,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    fn new(threshold: u32, cooloff: Duration) -> Self {
        CircuitBreaker { threshold, cooloff, consecutive_failures: 0, state: BreakerState::Closed, opened_at: None }
    }

    fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let cooled_off = self.opened_at.map(|at| at.elapsed() >= self.cooloff).unwrap_or(true);
                if cooled_off {
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.state = BreakerState::Closed;
        self.opened_at = None;
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.state == BreakerState::HalfOpen || self.consecutive_failures >= self.threshold.max(1) {
            self.state = BreakerState::Open;
            self.opened_at = Some(Instant::now());
        }
    }
}

/// Owns the transport, telnet framer/negotiator, protocol dispatcher, and
/// screen for one session. One instance per connection.
pub struct SessionController {
    id: String,
    config: SessionConfig,
    screen: Screen,
    dispatcher: Dispatcher,
    framer: TelnetFramer,
    negotiator: Option<Negotiator>,
    transport: Option<Box<dyn Transport>>,
    state: LifecycleState,
    breaker: CircuitBreaker,
    observers: Vec<Box<dyn Observer>>,
    last_activity: Instant,
    sequence: u8,
}

impl SessionController {
    pub fn new(config: SessionConfig) -> Self {
        let screen = Screen::new(config.screen_size.rows(), config.screen_size.cols());
        let dispatcher = Dispatcher::new(config.code_page, config.enhanced_5250);
        let breaker = CircuitBreaker::new(config.breaker_threshold, Duration::from_millis(config.breaker_cooloff_ms));
        SessionController {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            screen,
            dispatcher,
            framer: TelnetFramer::new(),
            negotiator: None,
            transport: None,
            state: LifecycleState::Disconnected,
            breaker,
            observers: Vec::new(),
            last_activity: Instant::now(),
            sequence: 0,
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// A unique identifier for this controller instance, for correlating
    /// log lines and observer events across a process that may run more
    /// than one session concurrently.
    pub fn id(&self) -> &str {
        &self.id
    }

    fn emit(&mut self, event: SessionEvent) {
        for observer in self.observers.iter_mut() {
            observer.on_event(&event);
        }
    }

    fn transition(&mut self, to: LifecycleState) {
        let from = self.state;
        debug!("session {} ({}:{}) {from:?} -> {to:?}", self.id, self.config.host, self.config.port);
        self.state = to;
        self.emit(SessionEvent::StateChanged { from, to });
    }

    /// Connects with retry and backoff up to `config.max_retries`, doubling
    /// the delay each attempt and capping at 5000ms, then negotiates. Fails
    /// immediately with [`Tn5250Error::BreakerOpen`] without touching the
    /// network if the circuit breaker is open (spec scenario A).
    pub fn connect(&mut self) -> Result<()> {
        if !self.breaker.allow() {
            return Err(Tn5250Error::BreakerOpen);
        }
        self.transition(LifecycleState::Connecting);

        let mut delay = Duration::from_millis(self.config.initial_retry_delay_ms.max(1));
        let attempts_allowed = self.config.max_retries + 1;
        let mut last_err = None;
        for attempt in 0..attempts_allowed {
            let deadline = Instant::now() + Duration::from_millis(self.config.connect_timeout_ms.max(1));
            match transport::connect(&self.config.host, self.config.port, self.config.tls, deadline) {
                Ok(t) => {
                    self.transport = Some(t);
                    last_err = None;
                    break;
                }
                Err(e) => {
                    self.breaker.record_failure();
                    warn!("connect attempt {}/{} to {} failed: {e}", attempt + 1, attempts_allowed, self.config.host);
                    if let Tn5250Error::Timeout { kind } = e {
                        self.emit(SessionEvent::TimeoutOccurred(kind));
                    }
                    last_err = Some(e);
                    if attempt + 1 < attempts_allowed {
                        thread::sleep(delay);
                        delay = (delay * 2).min(Duration::from_millis(5000));
                    }
                }
            }
        }
        if let Some(e) = last_err {
            self.transition(LifecycleState::Disconnected);
            return Err(e);
        }

        self.breaker.record_success();
        self.transition(LifecycleState::Negotiating);
        if let Err(e) = self.run_negotiation() {
            self.transport = None;
            self.transition(LifecycleState::Disconnected);
            return Err(e);
        }
        self.last_activity = Instant::now();
        self.transition(LifecycleState::Connected);
        Ok(())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(self.config.write_timeout_ms.max(1));
        self.transport.as_mut().ok_or(Tn5250Error::StreamEnded)?.write_all(bytes, deadline)
    }

    /// Drives Telnet option negotiation and, if enabled, the TN5250E device
    /// sub-negotiation, to completion or a fixed one-second deadline. A host
    /// is free to start sending 5250 records before negotiation settles on
    /// its end; any such records are buffered and dispatched immediately
    /// after negotiation completes rather than silently dropped.
    fn run_negotiation(&mut self) -> Result<()> {
        let mut negotiator = Negotiator::new(&self.config);
        let start_bytes = negotiator.start();
        self.write_raw(&start_bytes)?;

        let deadline = Instant::now() + Duration::from_secs(1);
        let mut basic_done = false;
        let mut device_requested = !self.config.enhanced_5250;
        let mut device_done = !self.config.enhanced_5250;
        let mut early_records = Vec::new();

        while !(basic_done && device_done) {
            let mut buf = [0u8; 4096];
            let n = match self.transport.as_mut().ok_or(Tn5250Error::StreamEnded)?.read(&mut buf, deadline) {
                Ok(n) => n,
                Err(Tn5250Error::Timeout { .. }) => {
                    return Err(Tn5250Error::NegotiationFailed { reason: "timed out waiting for option negotiation".into() });
                }
                Err(e) => return Err(e),
            };
            if n == 0 {
                return Err(Tn5250Error::StreamEnded);
            }
            for event in self.framer.feed(&buf[..n])? {
                if let FramerEvent::Record(record) = event {
                    early_records.push(record);
                    continue;
                }
                let outcome = negotiator.handle(event)?;
                if !outcome.reply.is_empty() {
                    self.write_raw(&outcome.reply)?;
                }
                if let Some(reason) = outcome.failed {
                    return Err(Tn5250Error::NegotiationFailed { reason });
                }
                if outcome.basic_complete {
                    basic_done = true;
                    if !device_requested {
                        let req = negotiator.encode_tnescfg_request(self.config.screen_size);
                        self.write_raw(&req)?;
                        device_requested = true;
                    }
                }
                if outcome.device.is_some() {
                    device_done = true;
                }
            }
        }
        self.negotiator = Some(negotiator);
        for record in early_records {
            self.dispatch_record(&record)?;
        }
        Ok(())
    }

    /// One pump cycle: reads whatever is available (bounded by the
    /// configured read timeout), feeds the framer, and dispatches any
    /// complete records. Returns the number of records dispatched. A read
    /// timeout checks inactivity and returns `Ok(0)` rather than failing the
    /// session outright, so callers can poll this in a loop.
    pub fn service(&mut self) -> Result<usize> {
        let deadline = Instant::now() + Duration::from_millis(self.config.read_timeout_ms.max(1));
        let mut buf = [0u8; 4096];
        let n = match self.transport.as_mut().ok_or(Tn5250Error::StreamEnded)?.read(&mut buf, deadline) {
            Ok(n) => n,
            Err(Tn5250Error::Timeout { kind }) => {
                self.emit(SessionEvent::TimeoutOccurred(kind));
                self.check_inactivity()?;
                return Ok(0);
            }
            Err(e) => return Err(e),
        };
        if n == 0 {
            self.framer.on_eof()?;
            return Ok(0);
        }
        self.last_activity = Instant::now();

        let mut processed = 0;
        for event in self.framer.feed(&buf[..n])? {
            match event {
                FramerEvent::Record(record) => {
                    self.dispatch_record(&record)?;
                    processed += 1;
                }
                other => {
                    if let Some(negotiator) = self.negotiator.as_mut() {
                        let outcome = negotiator.handle(other)?;
                        if !outcome.reply.is_empty() {
                            self.write_raw(&outcome.reply)?;
                        }
                    }
                }
            }
        }
        Ok(processed)
    }

    fn check_inactivity(&mut self) -> Result<()> {
        if self.config.inactivity_timeout_ms > 0 && self.last_activity.elapsed() >= Duration::from_millis(self.config.inactivity_timeout_ms) {
            return Err(Tn5250Error::Timeout { kind: TimeoutKind::Inactivity });
        }
        Ok(())
    }

    fn dispatch_record(&mut self, record: &[u8]) -> Result<()> {
        let (header, stream) = RecordHeader::parse(record)?;
        self.emit(SessionEvent::RecordReceived { len: record.len() });
        let outbound = self.dispatcher.dispatch(&mut self.screen, stream)?;
        for diagnostic in self.dispatcher.take_diagnostics() {
            self.emit(SessionEvent::Diagnostic(diagnostic));
        }
        self.emit(SessionEvent::OiaChanged);
        if !outbound.is_empty() {
            self.sequence = self.sequence.wrapping_add(1);
            let out_record = RecordHeader::build(header.flags, Opcode::NoOp, self.sequence, &outbound);
            self.transmit_record(&out_record)?;
        }
        Ok(())
    }

    fn transmit_record(&mut self, record: &[u8]) -> Result<()> {
        let framed = TelnetFramer::encode_record(record);
        self.write_raw(&framed)?;
        self.emit(SessionEvent::RecordSent { len: record.len() });
        Ok(())
    }

    /// Builds and transmits the AID response, then locks the keyboard to
    /// reflect "waiting for host" (spec §4.7) — distinct from the error-state
    /// clearing [`Dispatcher::handle_aid`]/`OutboundBuilder` already did
    /// while composing the response body.
    pub fn send_aid(&mut self, key: AidKey) -> Result<()> {
        let body = self.dispatcher.handle_aid(&mut self.screen, key)?;
        self.sequence = self.sequence.wrapping_add(1);
        let record = RecordHeader::build(0, Opcode::NoOp, self.sequence, &body);
        self.transmit_record(&record)?;
        self.screen.oia_mut().lock_keyboard();
        self.emit(SessionEvent::OiaChanged);
        Ok(())
    }

    /// Sends an empty no-op record if `keepalive_interval_ms` has elapsed
    /// since the last inbound activity and keepalive is enabled.
    pub fn send_keepalive_if_due(&mut self) -> Result<()> {
        if !self.config.keepalive_enabled {
            return Ok(());
        }
        if self.last_activity.elapsed() < Duration::from_millis(self.config.keepalive_interval_ms) {
            return Ok(());
        }
        self.sequence = self.sequence.wrapping_add(1);
        let record = RecordHeader::build(0, Opcode::NoOp, self.sequence, &[]);
        self.transmit_record(&record)?;
        self.last_activity = Instant::now();
        Ok(())
    }

    /// Tears the session down: closes the transport, drops negotiation
    /// state, and returns to `Disconnected` regardless of prior state.
    pub fn disconnect(&mut self) -> Result<()> {
        self.transition(LifecycleState::Disconnecting);
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close();
        }
        self.negotiator = None;
        self.transition(LifecycleState::Disconnected);
        Ok(())
    }
}

/// Drives `service()`/`send_keepalive_if_due()` in a loop on a background
/// thread until cancelled or the connection drops, mirroring the reference
/// `start_network_thread`'s lock-retry-with-backoff discipline
/// (`MAX_RETRIES = 3`, `10 * 2^n` ms sleeps) around an `Arc<Mutex<_>>`.
pub fn spawn_background(controller: Arc<Mutex<SessionController>>, cancel: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    const MAX_RETRIES: u32 = 3;
    thread::spawn(move || loop {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let mut retry_count = 0u32;
        let mut guard = None;
        while guard.is_none() {
            match controller.try_lock() {
                Ok(g) => guard = Some(g),
                Err(_) if retry_count < MAX_RETRIES => {
                    retry_count += 1;
                    thread::sleep(Duration::from_millis(10 * (1u64 << retry_count)));
                }
                Err(_) => break,
            }
        }
        let Some(mut guard) = guard else { continue };
        if guard.state() != LifecycleState::Connected {
            break;
        }
        if guard.service().is_err() {
            break;
        }
        if guard.send_keepalive_if_due().is_err() {
            break;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::atomic::AtomicUsize;

    fn cfg(port: u16) -> SessionConfig {
        let mut c = SessionConfig::new("127.0.0.1", port, "DSP01");
        c.connect_timeout_ms = 200;
        c.max_retries = 0;
        c
    }

    #[test]
    fn breaker_opens_after_threshold_failures_and_rejects_without_io() {
        let mut controller = SessionController::new(cfg(1)); // port 1: connection refused
        controller.config.connect_timeout_ms = 50;
        controller.config.breaker_threshold = 2;
        controller.config.max_retries = 0;

        assert!(controller.connect().is_err());
        assert!(controller.connect().is_err());
        // Breaker is now open; a third attempt must fail as BreakerOpen.
        let err = controller.connect().unwrap_err();
        assert_eq!(err, Tn5250Error::BreakerOpen);
    }

    #[test]
    fn retry_succeeds_once_the_listener_comes_up() {
        use crate::telnet::{TelnetFramer, DO, OPT_BINARY, OPT_EOR, OPT_SGA, WILL};
        use std::io::{Read, Write};

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // address reserved but nothing listening yet

        let mut config = SessionConfig::new("127.0.0.1", addr.port(), "DSP01");
        config.connect_timeout_ms = 50;
        config.read_timeout_ms = 2_000;
        config.max_retries = 3;
        config.initial_retry_delay_ms = 10;
        config.enhanced_5250 = false;
        let mut controller = SessionController::new(config);

        // First connect attempt(s) fail (nothing listening yet); before the
        // retries are exhausted, stand up a listener that completes basic
        // negotiation so a later attempt succeeds end-to-end.
        let accept_thread = thread::spawn(move || {
            let listener = TcpListener::bind(addr).unwrap();
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap();
            assert!(n > 0);
            let mut ack = Vec::new();
            for &opt in &[OPT_BINARY, OPT_EOR, OPT_SGA] {
                ack.extend(TelnetFramer::encode_option(DO, opt));
                ack.extend(TelnetFramer::encode_option(WILL, opt));
            }
            stream.write_all(&ack).unwrap();
        });
        thread::sleep(Duration::from_millis(20));

        controller.connect().unwrap();
        assert_eq!(controller.state(), LifecycleState::Connected);
        accept_thread.join().unwrap();
    }

    struct CountingObserver(Arc<AtomicUsize>);
    impl Observer for CountingObserver {
        fn on_event(&mut self, _event: &SessionEvent) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn state_transitions_notify_observers() {
        let mut controller = SessionController::new(cfg(1));
        let count = Arc::new(AtomicUsize::new(0));
        controller.add_observer(Box::new(CountingObserver(count.clone())));
        controller.config.connect_timeout_ms = 20;
        controller.config.max_retries = 0;
        let _ = controller.connect();
        assert!(count.load(Ordering::Relaxed) >= 2); // Connecting, then Disconnected
    }

    #[test]
    fn keepalive_is_a_no_op_when_disabled() {
        let mut controller = SessionController::new(cfg(1));
        controller.config.keepalive_enabled = false;
        assert!(controller.send_keepalive_if_due().is_ok());
    }

    #[test]
    fn send_aid_without_a_transport_is_rejected_cleanly() {
        let mut controller = SessionController::new(cfg(1));
        let err = controller.send_aid(AidKey::Enter).unwrap_err();
        assert_eq!(err, Tn5250Error::StreamEnded);
    }
}

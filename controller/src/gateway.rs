use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use irgate_common::{
    config::format_hex_code,
    dispatch::{resolve_key, resolve_volume},
    CommandSlot, DebounceFilter, Direction, GatewayConfig, GatewayStatus, GestureAction,
    MuteGesture, MuteOutcome, OutboundCommand, RemoteButton, RemoteEvent, SendOutcome, Transport,
};

use crate::{
    senders::{TcpSender, UdpSender},
    store::ConfigSource,
};

pub trait WallClock: Send {
    fn now_utc(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What became of one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Numeric code outside the three configured buttons.
    Unrecognized,
    /// Same code again inside the repeat window.
    Repeat,
    /// Symbolic key that names no command slot.
    UnknownKey,
    /// The resolved command slot is empty in the configuration.
    NotConfigured,
    Dispatched(SendOutcome),
    MuteIgnored,
    MuteCounted {
        counter: u32,
        sends: Vec<SendOutcome>,
    },
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unrecognized => "unrecognized",
            Self::Repeat => "repeat",
            Self::UnknownKey => "unknown_key",
            Self::NotConfigured => "not_configured",
            Self::Dispatched(_) => "dispatched",
            Self::MuteIgnored => "mute_ignored",
            Self::MuteCounted { .. } => "mute_counted",
        }
    }

    pub fn sent(&self) -> bool {
        match self {
            Self::Dispatched(outcome) => outcome.is_sent(),
            Self::MuteCounted { sends, .. } => sends.iter().any(|outcome| outcome.is_sent()),
            _ => false,
        }
    }
}

/// Event interpretation for both inbound paths.
///
/// Owns the debounce filter, the mute gesture and both senders. Callers share
/// it behind one lock so a physical press and a simulated press never
/// interleave.
pub struct Gateway {
    config: Arc<dyn ConfigSource>,
    clock: Box<dyn WallClock>,
    debounce: DebounceFilter,
    gesture: MuteGesture,
    udp: UdpSender,
    tcp: TcpSender,
}

impl Gateway {
    pub fn new(
        config: Arc<dyn ConfigSource>,
        clock: Box<dyn WallClock>,
        udp: UdpSender,
        tcp: TcpSender,
    ) -> Self {
        Self {
            config,
            clock,
            debounce: DebounceFilter::new(),
            gesture: MuteGesture::new(),
            udp,
            tcp,
        }
    }

    pub fn handle_event(&mut self, event: RemoteEvent, now_ms: u64) -> Disposition {
        match event {
            RemoteEvent::NumericCode(code) => self.handle_code(code, now_ms),
            RemoteEvent::SymbolicKey(key) => {
                info!("simulated command received: {key}");
                self.dispatch_key(&key)
            }
        }
    }

    /// Volume press routed to whichever device the configuration targets.
    fn dispatch_volume(&mut self, config: &GatewayConfig, direction: Direction) -> Disposition {
        let command = resolve_volume(config, direction);
        debug!(
            "volume {} routed to {}",
            direction.as_str(),
            config.volume_target.as_str()
        );
        self.dispatch(&command, config)
    }

    /// Button press from the control interface, addressed by slot name.
    pub fn dispatch_key(&mut self, key: &str) -> Disposition {
        let config = self.config.current();
        let Some(command) = resolve_key(&config, key) else {
            warn!("unknown button action: {key}");
            return Disposition::UnknownKey;
        };
        self.dispatch(&command, &config)
    }

    pub fn status(&self, now_ms: u64) -> GatewayStatus {
        let config = self.config.current();
        let gesture = config.gesture();
        let cooldown_remaining_ms = self.gesture.cooldown_remaining_ms(now_ms, &gesture);

        GatewayStatus {
            volume_target: config.volume_target.as_str(),
            phase: self.gesture.phase(now_ms, &gesture).as_str(),
            mute_counter: self.gesture.counter(),
            mute_hold_trigger: gesture.hold_trigger,
            in_cooldown: cooldown_remaining_ms > 0,
            cooldown_remaining_ms,
            last_reset_date: self.gesture.last_reset_date().map(|date| date.to_string()),
            udp_failure_count: self.udp.failure_count(),
            udp_failure_threshold: config.enomem_threshold,
            udp_socket_open: self.udp.socket_open(),
            sent_commands: self.udp.sent() + self.tcp.sent(),
            failed_commands: self.udp.failed() + self.tcp.failed(),
            last_code: self.debounce.last_code().map(format_hex_code),
            time_synced: config.local_now(self.clock.now_utc()).is_some(),
            timezone: config.timezone,
        }
    }

    fn handle_code(&mut self, code: u32, now_ms: u64) -> Disposition {
        let config = self.config.current();
        let Some(button) = config.classify(code) else {
            debug!("ignoring unrecognized code {}", format_hex_code(code));
            return Disposition::Unrecognized;
        };

        if !self
            .debounce
            .accept(code, now_ms, config.ir_repeat_ignore_ms)
        {
            debug!("suppressed repeat of {}", format_hex_code(code));
            return Disposition::Repeat;
        }

        info!("ir code {} ({button:?})", format_hex_code(code));
        match button {
            RemoteButton::VolumeUp => self.dispatch_volume(&config, Direction::Up),
            RemoteButton::VolumeDown => self.dispatch_volume(&config, Direction::Down),
            RemoteButton::Mute => self.process_mute(&config, now_ms),
        }
    }

    /// Mute press fed to the power gesture.
    fn process_mute(&mut self, config: &GatewayConfig, now_ms: u64) -> Disposition {
        let local_now = config.local_now(self.clock.now_utc());
        match self.gesture.on_mute(now_ms, local_now, &config.gesture()) {
            MuteOutcome::Ignored {
                cooldown_remaining_ms,
            } => {
                info!("mute ignored, recent power off ({cooldown_remaining_ms} ms cooldown left)");
                Disposition::MuteIgnored
            }
            MuteOutcome::Counted {
                daily_reset,
                counter,
                actions,
            } => {
                if daily_reset {
                    info!(
                        "mute counter reset for the day (reset hour {})",
                        config.reset_hour
                    );
                }
                info!("mute counter: {counter}");

                let mut sends = Vec::with_capacity(actions.len());
                for action in actions {
                    let slot = match action {
                        GestureAction::PowerOn => CommandSlot::PowerOn,
                        GestureAction::PowerOff => CommandSlot::PowerOff,
                    };
                    info!("mute gesture: {}", slot.key());
                    let command = OutboundCommand::resolve(slot, config);
                    if let Disposition::Dispatched(outcome) = self.dispatch(&command, config) {
                        sends.push(outcome);
                    }
                }

                Disposition::MuteCounted { counter, sends }
            }
        }
    }

    fn dispatch(&mut self, command: &OutboundCommand, config: &GatewayConfig) -> Disposition {
        if command.payload.is_empty() {
            warn!("{} is not configured, nothing sent", command.slot.key());
            return Disposition::NotConfigured;
        }

        debug!(
            "dispatching {} over {}",
            command.slot.key(),
            command.transport.as_str()
        );
        let outcome = match command.transport {
            Transport::Udp => self.udp.send(&command.payload, config.enomem_threshold),
            Transport::Tcp => self.tcp.send(&command.payload),
        };
        Disposition::Dispatched(outcome)
    }
}

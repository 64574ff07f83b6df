use crate::{
    config::GatewayConfig,
    types::{Direction, Transport, VolumeTarget},
};

/// A configured command, addressed by the key name the control interface
/// uses for its buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSlot {
    MarantzVolumeUp,
    MarantzVolumeDown,
    GiraVolumeUp,
    GiraVolumeDown,
    PowerOn,
    PowerOff,
}

impl CommandSlot {
    pub const ALL: [CommandSlot; 6] = [
        Self::MarantzVolumeUp,
        Self::MarantzVolumeDown,
        Self::GiraVolumeUp,
        Self::GiraVolumeDown,
        Self::PowerOn,
        Self::PowerOff,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.key() == key)
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::MarantzVolumeUp => "MARANTZ_COMMAND_VOL_UP",
            Self::MarantzVolumeDown => "MARANTZ_COMMAND_VOL_DOWN",
            Self::GiraVolumeUp => "GIRA_COMMAND_VOL_UP",
            Self::GiraVolumeDown => "GIRA_COMMAND_VOL_DOWN",
            Self::PowerOn => "COMMAND_PWR_ON",
            Self::PowerOff => "COMMAND_PWR_OFF",
        }
    }

    /// Receiver slots go over TCP, panel and power slots over UDP.
    pub fn transport(self) -> Transport {
        match self {
            Self::MarantzVolumeUp | Self::MarantzVolumeDown => Transport::Tcp,
            Self::GiraVolumeUp | Self::GiraVolumeDown | Self::PowerOn | Self::PowerOff => {
                Transport::Udp
            }
        }
    }

    pub fn command(self, config: &GatewayConfig) -> &str {
        match self {
            Self::MarantzVolumeUp => &config.marantz_command_vol_up,
            Self::MarantzVolumeDown => &config.marantz_command_vol_down,
            Self::GiraVolumeUp => &config.gira_command_vol_up,
            Self::GiraVolumeDown => &config.gira_command_vol_down,
            Self::PowerOn => &config.command_pwr_on,
            Self::PowerOff => &config.command_pwr_off,
        }
    }

    pub fn volume(target: VolumeTarget, direction: Direction) -> Self {
        match (target, direction) {
            (VolumeTarget::Marantz, Direction::Up) => Self::MarantzVolumeUp,
            (VolumeTarget::Marantz, Direction::Down) => Self::MarantzVolumeDown,
            (VolumeTarget::Gira, Direction::Up) => Self::GiraVolumeUp,
            (VolumeTarget::Gira, Direction::Down) => Self::GiraVolumeDown,
        }
    }
}

/// A concrete command ready for a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    pub slot: CommandSlot,
    pub transport: Transport,
    pub payload: String,
}

impl OutboundCommand {
    pub fn resolve(slot: CommandSlot, config: &GatewayConfig) -> Self {
        Self {
            slot,
            transport: slot.transport(),
            payload: slot.command(config).to_string(),
        }
    }
}

/// Volume press from the remote: the configured target picks the device.
pub fn resolve_volume(config: &GatewayConfig, direction: Direction) -> OutboundCommand {
    OutboundCommand::resolve(CommandSlot::volume(config.volume_target, direction), config)
}

/// Button press from the control interface. Unknown keys resolve to nothing.
pub fn resolve_key(config: &GatewayConfig, key: &str) -> Option<OutboundCommand> {
    CommandSlot::from_key(key).map(|slot| OutboundCommand::resolve(slot, config))
}

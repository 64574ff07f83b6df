use serde::{Deserialize, Deserializer, Serialize};

/// An inbound event, tagged at ingress by where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    /// Decoded code from the infrared receiver.
    NumericCode(u32),
    /// Command slot name from the control interface.
    SymbolicKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

/// The physical buttons the gateway reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteButton {
    VolumeUp,
    VolumeDown,
    Mute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolumeTarget {
    #[default]
    Gira,
    Marantz,
}

impl VolumeTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gira => "GIRA",
            Self::Marantz => "MARANTZ",
        }
    }

    /// Anything that is not `MARANTZ` (in any case) selects the panel.
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("MARANTZ") {
            Self::Marantz
        } else {
            Self::Gira
        }
    }
}

impl<'de> Deserialize<'de> for VolumeTarget {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Udp => "UDP",
            Self::Tcp => "TCP",
        }
    }
}

/// Result of one outbound send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    TransientFailure,
    ResourceExhausted,
}

impl SendOutcome {
    pub fn is_sent(self) -> bool {
        matches!(self, Self::Sent)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    #[serde(rename = "volumeTarget")]
    pub volume_target: &'static str,
    pub phase: &'static str,
    #[serde(rename = "muteCounter")]
    pub mute_counter: u32,
    #[serde(rename = "muteHoldTrigger")]
    pub mute_hold_trigger: u32,
    #[serde(rename = "inCooldown")]
    pub in_cooldown: bool,
    #[serde(rename = "cooldownRemainingMs")]
    pub cooldown_remaining_ms: u64,
    #[serde(rename = "lastResetDate")]
    pub last_reset_date: Option<String>,
    #[serde(rename = "udpFailureCount")]
    pub udp_failure_count: u32,
    #[serde(rename = "udpFailureThreshold")]
    pub udp_failure_threshold: u32,
    #[serde(rename = "udpSocketOpen")]
    pub udp_socket_open: bool,
    #[serde(rename = "sentCommands")]
    pub sent_commands: u64,
    #[serde(rename = "failedCommands")]
    pub failed_commands: u64,
    #[serde(rename = "lastCode")]
    pub last_code: Option<String>,
    #[serde(rename = "timeSynced")]
    pub time_synced: bool,
    pub timezone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_target_is_case_insensitive() {
        let target: VolumeTarget = serde_json::from_str("\"marantz\"").unwrap();
        assert_eq!(target, VolumeTarget::Marantz);

        let target: VolumeTarget = serde_json::from_str("\"Gira\"").unwrap();
        assert_eq!(target, VolumeTarget::Gira);
    }

    #[test]
    fn unknown_volume_target_falls_back_to_panel() {
        assert_eq!(VolumeTarget::parse_lenient("sonos"), VolumeTarget::Gira);
        assert_eq!(VolumeTarget::parse_lenient(""), VolumeTarget::Gira);
    }
}

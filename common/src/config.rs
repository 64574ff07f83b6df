use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::{RemoteButton, VolumeTarget};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid timezone `{0}`")]
    InvalidTimezone(String),
    #[error("{key} must be between 1 and 65535")]
    InvalidPort { key: &'static str },
    #[error("{key} cannot be empty")]
    EmptyHost { key: &'static str },
    #[error("invalid hexadecimal code `{0}`")]
    InvalidCode(String),
}

/// The device configuration file. Keys keep the device's upper-case naming so
/// existing `config.json` files load unchanged; keys owned by other parts of
/// the firmware (WiFi credentials and the like) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct GatewayConfig {
    pub gira_ip: String,
    pub gira_port: u16,
    pub marantz_ip: String,
    pub marantz_port: u16,
    pub volume_target: VolumeTarget,

    #[serde(deserialize_with = "deserialize_flag")]
    pub ntp_time_status: bool,
    pub timezone: String,
    pub reset_hour: u32,
    pub mute_hold_trigger: u32,

    pub marantz_command_vol_up: String,
    pub marantz_command_vol_down: String,
    pub gira_command_vol_up: String,
    pub gira_command_vol_down: String,
    pub command_pwr_on: String,
    pub command_pwr_off: String,

    #[serde(
        deserialize_with = "deserialize_hex_code",
        serialize_with = "serialize_hex_code"
    )]
    pub ir_code_vol_up: Option<u32>,
    #[serde(
        deserialize_with = "deserialize_hex_code",
        serialize_with = "serialize_hex_code"
    )]
    pub ir_code_vol_down: Option<u32>,
    #[serde(
        deserialize_with = "deserialize_hex_code",
        serialize_with = "serialize_hex_code"
    )]
    pub ir_code_mute: Option<u32>,

    pub ir_repeat_ignore_ms: u64,
    pub mute_ignore_after_poweroff_ms: u64,
    pub enomem_threshold: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gira_ip: "192.168.1.50".to_string(),
            gira_port: 8888,
            marantz_ip: "192.168.1.60".to_string(),
            marantz_port: 23,
            volume_target: VolumeTarget::Gira,
            ntp_time_status: false,
            timezone: "Europe/Amsterdam".to_string(),
            reset_hour: 5,
            mute_hold_trigger: 3,
            marantz_command_vol_up: "MVUP\r".to_string(),
            marantz_command_vol_down: "MVDOWN\r".to_string(),
            gira_command_vol_up: String::new(),
            gira_command_vol_down: String::new(),
            command_pwr_on: String::new(),
            command_pwr_off: String::new(),
            ir_code_vol_up: None,
            ir_code_vol_down: None,
            ir_code_mute: None,
            ir_repeat_ignore_ms: 100,
            mute_ignore_after_poweroff_ms: 10_000,
            enomem_threshold: 3,
        }
    }
}

/// Thresholds consumed by the mute gesture on each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureConfig {
    pub hold_trigger: u32,
    pub reset_hour: u32,
    pub cooldown_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            hold_trigger: 3,
            reset_hour: 5,
            cooldown_ms: 10_000,
        }
    }
}

impl GatewayConfig {
    pub fn sanitize(&mut self) {
        self.mute_hold_trigger = self.mute_hold_trigger.max(1);
        self.reset_hour = self.reset_hour.min(23);
        self.enomem_threshold = self.enomem_threshold.max(1);
        self.gira_ip = self.gira_ip.trim().to_string();
        self.marantz_ip = self.marantz_ip.trim().to_string();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gira_ip.is_empty() {
            return Err(ConfigError::EmptyHost { key: "GIRA_IP" });
        }
        if self.gira_port == 0 {
            return Err(ConfigError::InvalidPort { key: "GIRA_PORT" });
        }
        if self.marantz_ip.is_empty() {
            return Err(ConfigError::EmptyHost { key: "MARANTZ_IP" });
        }
        if self.marantz_port == 0 {
            return Err(ConfigError::InvalidPort {
                key: "MARANTZ_PORT",
            });
        }
        self.tz()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }

    /// Local wall-clock time, only when time synchronization is enabled and
    /// the configured zone resolves.
    pub fn local_now(&self, utc: DateTime<Utc>) -> Option<NaiveDateTime> {
        if !self.ntp_time_status {
            return None;
        }
        let tz = self.tz().ok()?;
        Some(utc.with_timezone(&tz).naive_local())
    }

    pub fn classify(&self, code: u32) -> Option<RemoteButton> {
        if self.ir_code_vol_up == Some(code) {
            Some(RemoteButton::VolumeUp)
        } else if self.ir_code_vol_down == Some(code) {
            Some(RemoteButton::VolumeDown)
        } else if self.ir_code_mute == Some(code) {
            Some(RemoteButton::Mute)
        } else {
            None
        }
    }

    pub fn gesture(&self) -> GestureConfig {
        GestureConfig {
            hold_trigger: self.mute_hold_trigger.max(1),
            reset_hour: self.reset_hour,
            cooldown_ms: self.mute_ignore_after_poweroff_ms,
        }
    }

    pub fn gira_endpoint(&self) -> String {
        format!("{}:{}", self.gira_ip, self.gira_port)
    }

    pub fn marantz_endpoint(&self) -> String {
        format!("{}:{}", self.marantz_ip, self.marantz_port)
    }

    /// Destinations are bound when the senders are built; changing them
    /// needs a restart.
    pub fn endpoints_changed(&self, other: &Self) -> bool {
        self.gira_ip != other.gira_ip
            || self.gira_port != other.gira_port
            || self.marantz_ip != other.marantz_ip
            || self.marantz_port != other.marantz_port
    }
}

pub fn parse_hex_code(raw: &str) -> Result<u32, ConfigError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(digits, 16).map_err(|_| ConfigError::InvalidCode(raw.to_string()))
}

pub fn format_hex_code(code: u32) -> String {
    format!("0x{code:X}")
}

fn deserialize_hex_code<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(value) if !value.trim().is_empty() => parse_hex_code(&value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

fn serialize_hex_code<S>(code: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match code {
        Some(code) => serializer.serialize_str(&format_hex_code(*code)),
        None => serializer.serialize_none(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match FlagValue::deserialize(deserializer)? {
        FlagValue::Bool(value) => value,
        FlagValue::Text(value) => value.trim().eq_ignore_ascii_case("true"),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;

    const DEVICE_CONFIG: &str = r#"{
        "SSID": "home",
        "PASSWORD": "secret",
        "GIRA_IP": "10.0.0.5",
        "GIRA_PORT": 9000,
        "MARANTZ_IP": "10.0.0.6",
        "MARANTZ_PORT": 23,
        "VOLUME_TARGET": "marantz",
        "NTP_TIME_STATUS": "True",
        "MARANTZ_COMMAND_VOL_UP": "MVUP\r",
        "MARANTZ_COMMAND_VOL_DOWN": "MVDOWN\r",
        "GIRA_COMMAND_VOL_UP": "vol+",
        "GIRA_COMMAND_VOL_DOWN": "vol-",
        "COMMAND_PWR_ON": "pwr-on",
        "COMMAND_PWR_OFF": "pwr-off",
        "IR_CODE_VOL_UP": "0x20DF40BF",
        "IR_CODE_VOL_DOWN": "20df c03f",
        "IR_CODE_MUTE": "0x20DF906F"
    }"#;

    #[test]
    fn rejects_malformed_codes() {
        assert!(serde_json::from_str::<GatewayConfig>(DEVICE_CONFIG).is_err());
    }

    #[test]
    fn loads_device_config_with_defaults() {
        let raw = DEVICE_CONFIG.replace("20df c03f", "20DFC03F");
        let config: GatewayConfig = serde_json::from_str(&raw).unwrap();

        assert_eq!(config.gira_endpoint(), "10.0.0.5:9000");
        assert_eq!(config.volume_target, VolumeTarget::Marantz);
        assert!(config.ntp_time_status);
        assert_eq!(config.ir_code_vol_up, Some(0x20DF_40BF));
        assert_eq!(config.ir_code_vol_down, Some(0x20DF_C03F));
        assert_eq!(config.ir_code_mute, Some(0x20DF_906F));
        assert_eq!(config.reset_hour, 5);
        assert_eq!(config.mute_hold_trigger, 3);
        assert_eq!(config.ir_repeat_ignore_ms, 100);
        assert_eq!(config.mute_ignore_after_poweroff_ms, 10_000);
        assert_eq!(config.enomem_threshold, 3);
        assert_eq!(config.timezone, "Europe/Amsterdam");
    }

    #[test]
    fn classifies_only_configured_codes() {
        let config = GatewayConfig {
            ir_code_vol_up: Some(0x10),
            ir_code_vol_down: Some(0x20),
            ir_code_mute: Some(0x30),
            ..GatewayConfig::default()
        };

        assert_eq!(config.classify(0x10), Some(RemoteButton::VolumeUp));
        assert_eq!(config.classify(0x20), Some(RemoteButton::VolumeDown));
        assert_eq!(config.classify(0x30), Some(RemoteButton::Mute));
        assert_eq!(config.classify(0x40), None);
    }

    #[test]
    fn hex_codes_round_trip_through_json() {
        let config = GatewayConfig {
            ir_code_mute: Some(0xABCD),
            ..GatewayConfig::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["IR_CODE_MUTE"], "0xABCD");
        assert_eq!(json["IR_CODE_VOL_UP"], serde_json::Value::Null);

        let reloaded: GatewayConfig = serde_json::from_value(json).unwrap();
        assert_eq!(reloaded.ir_code_vol_up, None);
        assert_eq!(reloaded.ir_code_mute, Some(0xABCD));
    }

    #[test]
    fn sanitize_clamps_thresholds() {
        let mut config = GatewayConfig {
            mute_hold_trigger: 0,
            reset_hour: 30,
            enomem_threshold: 0,
            gira_ip: " 10.0.0.5 ".to_string(),
            ..GatewayConfig::default()
        };
        config.sanitize();

        assert_eq!(config.mute_hold_trigger, 1);
        assert_eq!(config.reset_hour, 23);
        assert_eq!(config.enomem_threshold, 1);
        assert_eq!(config.gira_ip, "10.0.0.5");
    }

    #[test]
    fn validate_reports_bad_fields() {
        let config = GatewayConfig {
            timezone: "Mars/Olympus".to_string(),
            ..GatewayConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidTimezone("Mars/Olympus".to_string()))
        );

        let config = GatewayConfig {
            marantz_port: 0,
            ..GatewayConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidPort {
                key: "MARANTZ_PORT"
            })
        );
    }

    #[test]
    fn local_time_requires_time_sync() {
        let utc = Utc.with_ymd_and_hms(2024, 6, 1, 3, 30, 0).unwrap();
        let mut config = GatewayConfig::default();
        assert_eq!(config.local_now(utc), None);

        config.ntp_time_status = true;
        let expected = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(5, 30, 0)
            .unwrap();
        assert_eq!(config.local_now(utc), Some(expected));
    }

    #[test]
    fn parses_hex_with_and_without_prefix() {
        assert_eq!(parse_hex_code("0xff"), Ok(0xFF));
        assert_eq!(parse_hex_code("FF"), Ok(0xFF));
        assert_eq!(parse_hex_code(" 0X1a "), Ok(0x1A));
        assert!(parse_hex_code("zz").is_err());
    }
}

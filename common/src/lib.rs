pub mod config;
pub mod debounce;
pub mod dispatch;
pub mod escalation;
pub mod gesture;
pub mod types;

pub use config::{ConfigError, GatewayConfig, GestureConfig};
pub use debounce::DebounceFilter;
pub use dispatch::{CommandSlot, OutboundCommand};
pub use escalation::{Escalation, FailureTracker};
pub use gesture::{GestureAction, GesturePhase, MuteGesture, MuteOutcome};
pub use types::{
    Direction, GatewayStatus, RemoteButton, RemoteEvent, SendOutcome, Transport, VolumeTarget,
};

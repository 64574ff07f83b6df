use tracing::{debug, error};

/// Exit status the service supervisor treats as "restart me".
const RESTART_EXIT_CODE: i32 = 75;

/// Board-level primitives the senders rely on.
pub trait DeviceControl: Send + Sync {
    /// Brief visual acknowledgment after a command went out.
    fn flash_ack(&self);

    /// Irreversible full restart. Never returns.
    fn restart(&self) -> !;
}

pub struct HostDevice;

impl DeviceControl for HostDevice {
    fn flash_ack(&self) {
        debug!("status led flash");
    }

    fn restart(&self) -> ! {
        error!("restarting device now");
        std::process::exit(RESTART_EXIT_CODE)
    }
}

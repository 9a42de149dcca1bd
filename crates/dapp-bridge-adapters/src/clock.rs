use std::time::{SystemTime, UNIX_EPOCH};

use dapp_bridge_core::{ClockPort, PortError};

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now_ms(&self) -> Result<u64, PortError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| PortError::Transport(format!("time error: {e}")))?;
        Ok(u64::try_from(now.as_millis()).unwrap_or(u64::MAX))
    }
}

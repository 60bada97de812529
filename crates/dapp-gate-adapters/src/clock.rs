use dapp_gate_core::ports::ClockPort;
use dapp_gate_core::PortError;

#[derive(Debug, Clone, Default)]
pub struct SystemClockAdapter;

impl ClockPort for SystemClockAdapter {
    fn now_ms(&self) -> Result<u64, PortError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| PortError::Transport(format!("time error: {e}")))?;
        u64::try_from(now.as_millis())
            .map_err(|e| PortError::Transport(format!("time out of range: {e}")))
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use dapp_gate_core::domain::WcSession;
use dapp_gate_core::ports::WalletConnectPort;
use dapp_gate_core::PortError;

/// Registry of approved WalletConnect sessions, keyed by topic.
#[derive(Debug, Clone, Default)]
pub struct WalletConnectAdapter {
    inner: Arc<Mutex<HashMap<String, WcSession>>>,
}

impl WalletConnectAdapter {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn insert_session(&self, session: WcSession) -> Result<(), PortError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|e| PortError::Transport(format!("wc lock poisoned: {e}")))?;
        info!(topic = %session.topic, "wc session stored");
        g.insert(session.topic.clone(), session);
        Ok(())
    }

    pub fn disconnect(&self, topic: &str) -> Result<(), PortError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|e| PortError::Transport(format!("wc lock poisoned: {e}")))?;
        g.remove(topic)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("wc session missing: {topic}")))
    }

    pub fn list_sessions(&self) -> Result<Vec<WcSession>, PortError> {
        let g = self
            .inner
            .lock()
            .map_err(|e| PortError::Transport(format!("wc lock poisoned: {e}")))?;
        let mut sessions: Vec<WcSession> = g.values().cloned().collect();
        sessions.sort_by(|a, b| a.topic.cmp(&b.topic));
        Ok(sessions)
    }
}

impl WalletConnectPort for WalletConnectAdapter {
    fn get_session(&self, topic: &str) -> Option<WcSession> {
        match self.inner.lock() {
            Ok(g) => g.get(topic).cloned(),
            Err(e) => {
                warn!("wc lock poisoned: {e}");
                None
            }
        }
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::cdp::{CdpConfig, CdpSession};
use crate::error::BridgeError;
use crate::registry::{TargetRef, TargetRegistry};

/// Global mutable state is confined to one CDP Session instance per target;
/// the Dispatcher holds a registry of sessions keyed by target id rather
/// than a process-wide singleton.
///
/// Connection reuse: a session already open to the requested target is
/// returned as-is. A request for a *different* target than the one
/// currently cached under a lazily-resolved (tab-less) call closes the
/// previous session before opening the new one.
pub struct SessionRegistry {
    registry: TargetRegistry,
    config: CdpConfig,
    sessions: Mutex<HashMap<String, Arc<CdpSession>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(registry: TargetRegistry, config: CdpConfig) -> Self {
        Self {
            registry,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `tab_id` to a live session, reusing an open connection to
    /// that target if one exists.
    ///
    /// # Errors
    ///
    /// Propagates target-resolution errors (`IndexOutOfRange`, `NotFound`,
    /// `BrowserUnavailable`) and CDP connection errors.
    pub async fn session_for(&self, tab_id: Option<&str>) -> Result<Arc<CdpSession>, BridgeError> {
        let target_ref = TargetRef::parse(tab_id);
        let target = self.registry.resolve(&target_ref).await?;

        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(&target.id)
            && existing.is_connected()
        {
            return Ok(Arc::clone(existing));
        }

        let ws_url = target
            .ws_url
            .as_deref()
            .ok_or_else(|| BridgeError::not_found(format!("no debugger URL for target {}", target.id)))?;
        let session = CdpSession::connect(&target.id, ws_url, self.config.clone())
            .await
            .map_err(BridgeError::from)?;
        let session = Arc::new(session);
        sessions.insert(target.id.clone(), Arc::clone(&session));
        Ok(session)
    }

    /// Drop and close the cached session for `target_id`, if any. Used when
    /// a target is explicitly closed via the Target Registry so a later
    /// lookup reconnects instead of reusing a dead handle.
    pub async fn forget(&self, target_id: &str) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.remove(target_id) {
            let _ = session.close().await;
        }
    }

    #[must_use]
    pub fn target_registry(&self) -> &TargetRegistry {
        &self.registry
    }
}

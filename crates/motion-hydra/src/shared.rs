//! Process-wide registry of shared controller connections.
//!
//! A multi-axis Hydra multiplexes all of its axes over one socket, so
//! every [`crate::HydraAxis`] for the same address must reuse the same
//! [`HydraConnection`]. The registry hands out one connection per
//! address and closes it when the last attachment is released.

use crate::conn::HydraConnection;
use motion_core::MotionResult;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

struct Entry {
    conn: Arc<HydraConnection>,
    attached: usize,
}

type Registry = tokio::sync::Mutex<HashMap<String, Entry>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| tokio::sync::Mutex::new(HashMap::new()))
}

/// Connection for `addr`, dialing on first use and reusing afterwards.
pub async fn get_or_connect(addr: &str) -> MotionResult<Arc<HydraConnection>> {
    let mut map = registry().lock().await;
    if let Some(entry) = map.get_mut(addr) {
        entry.attached += 1;
        if entry.attached > 2 {
            // The protocol has no correlation identifiers; heavy
            // sharing makes accidental interleaving more likely.
            warn!(%addr, attached = entry.attached, "many axes sharing one controller connection");
        }
        return Ok(entry.conn.clone());
    }
    let conn = Arc::new(HydraConnection::connect(addr.to_string()).await?);
    info!(%addr, "opened shared controller connection");
    map.insert(
        addr.to_string(),
        Entry {
            conn: conn.clone(),
            attached: 1,
        },
    );
    Ok(conn)
}

/// Release one attachment; the connection closes when the count
/// reaches zero. Releasing an unknown address is a no-op.
pub async fn release(addr: &str) -> MotionResult<()> {
    let conn = {
        let mut map = registry().lock().await;
        match map.get_mut(addr) {
            Some(entry) => {
                entry.attached = entry.attached.saturating_sub(1);
                if entry.attached > 0 {
                    return Ok(());
                }
                map.remove(addr).map(|e| e.conn)
            }
            None => None,
        }
    };
    match conn {
        Some(conn) => {
            info!(%addr, "last attachment released, closing shared connection");
            conn.close().await
        }
        None => Ok(()),
    }
}

/// Attachment count for `addr`, for diagnostics.
pub async fn attached(addr: &str) -> usize {
    registry()
        .lock()
        .await
        .get(addr)
        .map_or(0, |e| e.attached)
}

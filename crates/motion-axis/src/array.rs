//! Fixed-order composition of axes over one configuration namespace.

use crate::axis::{Axis, AxisDefaults};
use motion_core::{AxisSpi, ConfigStore, MotionResult};
use std::sync::Arc;
use tracing::instrument;

/// One slot in an [`AxisArray`]: the axis name, its hardware binding
/// and its hard-coded defaults.
pub struct AxisMember {
    pub name: String,
    pub spi: Arc<dyn AxisSpi>,
    pub defaults: AxisDefaults,
}

impl AxisMember {
    pub fn new(name: impl Into<String>, spi: Arc<dyn AxisSpi>, defaults: AxisDefaults) -> Self {
        Self {
            name: name.into(),
            spi,
            defaults,
        }
    }
}

/// A fixed, ordered group of axes sharing one config store.
///
/// Each axis persists under `<root>/<name>/...`. Construction loads the
/// persisted configuration for every member and writes the merged set
/// back, so defaults for previously unseen axes land in the store. An
/// axis whose persisted configuration is malformed is kept in the array
/// in its degraded (disconnected) state rather than aborting the whole
/// group.
pub struct AxisArray {
    axes: Vec<Axis>,
}

impl AxisArray {
    #[instrument(skip(store, members), fields(root, count = members.len()), err)]
    pub fn new(
        store: Arc<dyn ConfigStore>,
        root: &str,
        members: Vec<AxisMember>,
    ) -> MotionResult<Self> {
        let mut axes = Vec::with_capacity(members.len());
        for m in members {
            let axis = Axis::new(m.name, m.spi, store.clone(), root, m.defaults)?;
            if let Err(e) = axis.load_configs() {
                tracing::error!(axis = %axis.name(), error = %e, "axis kept in degraded state");
            }
            axes.push(axis);
        }
        let array = Self { axes };
        array.save_configs();
        Ok(array)
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Axis by positional index.
    pub fn get(&self, index: usize) -> Option<&Axis> {
        self.axes.get(index)
    }

    /// Axis by name.
    pub fn by_name(&self, name: &str) -> Option<&Axis> {
        self.axes.iter().find(|a| a.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Axis> {
        self.axes.iter()
    }

    /// Reload every axis from the store, continuing past failures.
    pub fn load_configs(&self) {
        for axis in &self.axes {
            if let Err(e) = axis.load_configs() {
                tracing::error!(axis = %axis.name(), error = %e, "config reload failed");
            }
        }
    }

    /// Persist every axis, continuing past failures.
    pub fn save_configs(&self) {
        for axis in &self.axes {
            if let Err(e) = axis.save_configs() {
                tracing::warn!(axis = %axis.name(), error = %e, "config save failed");
            }
        }
    }

    /// Disconnect every axis. Failures are logged and the remaining
    /// axes are still shut down.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        for axis in &self.axes {
            if let Err(e) = axis.disconnect().await {
                tracing::warn!(axis = %axis.name(), error = %e, "axis shutdown failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motion_core::TomlStore;
    use motion_sim::SimAxis;

    fn members(names: &[&str]) -> Vec<AxisMember> {
        names
            .iter()
            .map(|n| AxisMember::new(*n, Arc::new(SimAxis::new()) as _, AxisDefaults::default()))
            .collect()
    }

    #[tokio::test]
    async fn test_lookup_by_index_and_name() {
        let store = Arc::new(TomlStore::in_memory());
        let array = AxisArray::new(store, "stage", members(&["x", "y", "z"])).unwrap();
        assert_eq!(array.len(), 3);
        assert_eq!(array.get(1).unwrap().name(), "y");
        assert_eq!(array.by_name("z").unwrap().name(), "z");
        assert!(array.get(3).is_none());
        assert!(array.by_name("w").is_none());
    }

    #[tokio::test]
    async fn test_construction_seeds_defaults_into_store() {
        let store = Arc::new(TomlStore::in_memory());
        let _array = AxisArray::new(store.clone(), "stage", members(&["x"])).unwrap();
        // The merged configuration is written back on construction.
        assert_eq!(store.get_f64("stage/x/scale", f64::NAN), 1.0);
        assert_eq!(store.get_str("stage/x/units", ""), "mm");
    }

    #[tokio::test]
    async fn test_degraded_axis_does_not_sink_the_array() {
        let store = Arc::new(TomlStore::in_memory());
        store.put_f64("stage/x/lower_limit_soft_raw", 10.0);
        store.put_f64("stage/x/upper_limit_soft_raw", -10.0);

        let array = AxisArray::new(store, "stage", members(&["x", "y"])).unwrap();
        assert_eq!(array.len(), 2);
        assert!(array.by_name("x").unwrap().is_disconnected());
        assert!(!array.by_name("y").unwrap().is_disconnected());
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_all() {
        let store = Arc::new(TomlStore::in_memory());
        let array = AxisArray::new(store, "stage", members(&["x", "y"])).unwrap();
        array.shutdown().await;
        assert!(array.iter().all(Axis::is_disconnected));
    }
}

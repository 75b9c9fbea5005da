//! Network Application (NApp) lifecycle: load, start, unload.
//!
//! A NApp is a pluggable module that subscribes to events and may publish
//! its own. Lifecycle: UNLOADED -> LOADED (constructed, listeners merged,
//! `start` invoked) -> RUNNING -> UNLOADING (`shutdown` invoked, listeners
//! removed) -> UNLOADED. Registration happens only after the NApp is
//! successfully constructed, and is rolled back if `start` fails, so a NApp
//! that never finishes loading never leaves listeners behind.

use std::sync::Arc;
use tracing::{info, warn};

use crate::controller::Controller;
use crate::error::{CoreError, Result};
use crate::listener::{ListenerFn, ListenerHandle};

/// A loaded application module.
pub trait NApp: Send + Sync {
    /// `"author/napp"`-shaped unique name.
    fn name(&self) -> &str;

    /// The listeners this NApp wants registered, as (pattern, callback)
    /// pairs. Called once, right after construction.
    fn listeners(&self) -> Vec<(String, ListenerFn)>;

    /// Called once all of this NApp's listeners are registered.
    fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Called before this NApp's listeners are removed.
    fn shutdown(&self) {}

    /// Core NApps are skipped by `unload_napps()` / `NAppManager::unload_all`
    /// and are unloaded last, by the controller itself.
    fn is_core(&self) -> bool {
        false
    }
}

/// Constructs a [`NApp`] given a handle back to the controller.
pub type NAppFactory = Arc<dyn Fn(Controller) -> Arc<dyn NApp> + Send + Sync>;

struct Loaded {
    napp: Arc<dyn NApp>,
    registrations: Vec<(String, ListenerHandle)>,
}

/// Loads, starts, stops, and unloads NApps, keeping the listener table
/// consistent with the set of currently-loaded NApps.
///
/// `NAppManager` does not hold a `Controller` itself — every operation
/// takes one by reference — so it can be constructed and owned inside
/// `ControllerInner` without creating a reference cycle.
#[derive(Default)]
pub struct NAppManager {
    registry: parking_lot::Mutex<Vec<(String, NAppFactory)>>,
    loaded: parking_lot::Mutex<Vec<Loaded>>,
}

impl NAppManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a `(name, factory)` pair to be loaded by `load_napps`.
    pub fn register(&self, name: impl Into<String>, factory: NAppFactory) {
        self.registry.lock().push((name.into(), factory));
    }

    /// Load every registered NApp. An empty registry is logged and is not
    /// an error.
    pub fn load_napps(&self, controller: &Controller) {
        let registry = self.registry.lock().clone();
        if registry.is_empty() {
            info!("no NApps registered");
            return;
        }
        for (name, factory) in &registry {
            if let Err(e) = self.load_napp(name, factory, controller) {
                warn!(napp = name.as_str(), error = %e, "failed to load NApp");
            }
        }
    }

    /// Instantiate `factory`, register its listeners, and start it.
    ///
    /// If `start()` fails, every listener just registered for this NApp is
    /// unsubscribed before the error is returned, so a failed load never
    /// leaves partial listener state behind.
    pub fn load_napp(
        &self,
        name: &str,
        factory: &NAppFactory,
        controller: &Controller,
    ) -> Result<()> {
        let napp = factory(controller.clone());

        let mut registrations = Vec::new();
        for (pattern, listener) in napp.listeners() {
            let handle = controller.listeners().subscribe(&pattern, listener)?;
            registrations.push((pattern, handle));
        }

        if let Err(e) = napp.start() {
            for (pattern, handle) in registrations {
                controller.listeners().unsubscribe(&pattern, handle);
            }
            return Err(CoreError::napp_load(name, e.to_string()));
        }

        info!(napp = name, "loaded");
        self.loaded.lock().push(Loaded {
            napp,
            registrations,
        });
        Ok(())
    }

    /// Unload the named NApp: run `shutdown()`, remove its listeners, and
    /// drop it from the loaded set.
    pub fn unload_napp(&self, name: &str, controller: &Controller) {
        let entry = {
            let mut loaded = self.loaded.lock();
            let Some(idx) = loaded.iter().position(|l| l.napp.name() == name) else {
                return;
            };
            loaded.remove(idx)
        };
        entry.napp.shutdown();
        for (pattern, handle) in entry.registrations {
            controller.listeners().unsubscribe(&pattern, handle);
        }
        info!(napp = name, "unloaded");
    }

    /// Unload every loaded non-core NApp.
    pub fn unload_all(&self, controller: &Controller) {
        let names: Vec<String> = self
            .loaded
            .lock()
            .iter()
            .filter(|l| !l.napp.is_core())
            .map(|l| l.napp.name().to_string())
            .collect();
        for name in names {
            self.unload_napp(&name, controller);
        }
    }

    /// Unload every loaded core NApp. Called by the controller itself after
    /// `unload_all` has removed every regular NApp.
    pub fn unload_core(&self, controller: &Controller) {
        let names: Vec<String> = self
            .loaded
            .lock()
            .iter()
            .filter(|l| l.napp.is_core())
            .map(|l| l.napp.name().to_string())
            .collect();
        for name in names {
            self.unload_napp(&name, controller);
        }
    }

    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.lock().iter().any(|l| l.napp.name() == name)
    }
}

//! Universe store
//!
//! Universes are created the first time anything refers to their id and
//! collected once nothing is patched to or connected with them. Collection
//! is deferred: a universe that goes idle is only queued, and
//! [`garbage_collect`](UniverseStore::garbage_collect) removes it later if
//! it is still idle then. Name and merge mode of collected universes are
//! remembered and restored if the id comes back.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::{LumenConfig, UniverseSettings};
use crate::owner::OwnerId;
use crate::port::{InputPort, OutputPort};
use crate::universe::{Universe, UniverseContext};

/// What one housekeeping pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    /// Universes that started periodic discovery
    pub discoveries_started: usize,
    /// Universes garbage collected
    pub universes_collected: usize,
}

/// Owns every universe of the daemon
pub struct UniverseStore {
    universes: BTreeMap<u32, Universe>,
    context: UniverseContext,
    presets: BTreeMap<u32, UniverseSettings>,
    remembered: BTreeMap<u32, UniverseSettings>,
    discovery_interval: Duration,
}

impl UniverseStore {
    /// An empty store
    pub fn new(context: UniverseContext) -> Self {
        Self {
            universes: BTreeMap::new(),
            context,
            presets: BTreeMap::new(),
            remembered: BTreeMap::new(),
            discovery_interval: Duration::ZERO,
        }
    }

    /// An empty store with universe presets and RDM settings from `config`
    pub fn with_config(context: UniverseContext, config: &LumenConfig) -> Self {
        let mut store = Self::new(context);
        store.presets = config
            .universes
            .iter()
            .map(|settings| (settings.id, settings.clone()))
            .collect();
        store.discovery_interval = config.rdm.discovery_interval();
        store
    }

    pub fn context(&self) -> &UniverseContext {
        &self.context
    }

    pub fn get(&self, id: u32) -> Option<&Universe> {
        self.universes.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Universe> {
        self.universes.get_mut(&id)
    }

    /// The universe `id`, created if it doesn't exist yet
    pub fn get_or_create(&mut self, id: u32) -> &mut Universe {
        let context = &self.context;
        let presets = &self.presets;
        let remembered = &self.remembered;
        let discovery_interval = self.discovery_interval;

        self.universes.entry(id).or_insert_with(|| {
            let mut universe = Universe::new(id, context);
            universe.set_rdm_discovery_interval(discovery_interval);
            if let Some(settings) = remembered.get(&id).or_else(|| presets.get(&id)) {
                if let Some(name) = &settings.name {
                    universe.set_name(name.clone());
                }
                universe.set_merge_mode(settings.merge_mode);
            }
            info!(universe = id, name = universe.name(), "Universe created");
            universe
        })
    }

    pub fn universe_count(&self) -> usize {
        self.universes.len()
    }

    pub fn universe_ids(&self) -> Vec<u32> {
        self.universes.keys().copied().collect()
    }

    /// Queue a universe for the next collection
    pub fn mark_for_collection(&self, id: u32) {
        self.context.collection().borrow_mut().insert(id);
    }

    /// Remove queued universes that are still idle. Returns how many went.
    pub fn garbage_collect(&mut self) -> usize {
        let queued = std::mem::take(&mut *self.context.collection().borrow_mut());
        let mut collected = 0;
        for id in queued {
            let idle = matches!(self.universes.get(&id), Some(universe) if !universe.is_active());
            if !idle {
                continue;
            }
            if let Some(universe) = self.universes.remove(&id) {
                self.remember(&universe);
                debug!(universe = id, "Garbage collected universe");
                collected += 1;
            }
        }
        collected
    }

    /// Drop every universe, remembering their settings
    pub fn delete_all(&mut self) {
        let universes = std::mem::take(&mut self.universes);
        for universe in universes.values() {
            self.remember(universe);
        }
        self.context.collection().borrow_mut().clear();
        info!(count = universes.len(), "Deleted all universes");
    }

    /// Patch an input port to `universe_id`, moving it if it is patched
    /// elsewhere
    pub fn patch_input_port(&mut self, port: Rc<dyn InputPort>, universe_id: u32) -> bool {
        let id = port.unique_id();
        let current = self
            .universes
            .values()
            .find(|universe| universe.contains_input_port(&id))
            .map(Universe::id);
        if current == Some(universe_id) {
            return true;
        }
        if current.is_some() {
            self.unpatch_input_port(&id);
        }

        let patched = self.get_or_create(universe_id).add_input_port(port);
        if patched {
            info!(port = %id, universe = universe_id, "Patched input port");
        }
        patched
    }

    /// Patch an output port to `universe_id`, moving it if it is patched
    /// elsewhere
    pub fn patch_output_port(&mut self, port: Rc<dyn OutputPort>, universe_id: u32) -> bool {
        let id = port.unique_id();
        let current = self
            .universes
            .values()
            .find(|universe| universe.contains_output_port(&id))
            .map(Universe::id);
        if current == Some(universe_id) {
            return true;
        }
        if current.is_some() {
            self.unpatch_output_port(&id);
        }

        let universe = self.get_or_create(universe_id);
        let patched = universe.add_output_port(Rc::clone(&port));
        if patched {
            port.universe_name_changed(universe.name());
            info!(port = %id, universe = universe_id, "Patched output port");
        }
        patched
    }

    /// Unpatch an input port. In-flight completions for it are discarded.
    pub fn unpatch_input_port(&mut self, id: &OwnerId) -> bool {
        self.universes
            .values_mut()
            .find(|universe| universe.contains_input_port(id))
            .map_or(false, |universe| universe.remove_input_port(id))
    }

    /// Unpatch an output port. In-flight completions for it are discarded.
    pub fn unpatch_output_port(&mut self, id: &OwnerId) -> bool {
        self.universes
            .values_mut()
            .find(|universe| universe.contains_output_port(id))
            .map_or(false, |universe| universe.remove_output_port(id))
    }

    /// Periodic maintenance
    ///
    /// Sweeps stale source clients, starts incremental discovery where the
    /// discovery interval has elapsed, then garbage collects.
    pub fn housekeeping(&mut self, now: Instant) -> HousekeepingReport {
        let mut report = HousekeepingReport::default();
        for universe in self.universes.values_mut() {
            universe.clean_stale_source_clients();

            if universe.discovery_due(now) {
                let id = universe.id();
                universe.run_rdm_discovery(
                    Box::new(move |uids| {
                        debug!(universe = id, uids = uids.len(), "Periodic discovery complete");
                    }),
                    false,
                );
                report.discoveries_started += 1;
            }
        }
        report.universes_collected = self.garbage_collect();
        report
    }

    fn remember(&mut self, universe: &Universe) {
        self.remembered.insert(
            universe.id(),
            UniverseSettings {
                id: universe.id(),
                name: Some(universe.name().to_string()),
                merge_mode: universe.merge_mode(),
            },
        );
    }
}

impl std::fmt::Debug for UniverseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniverseStore")
            .field("universes", &self.universe_ids())
            .field("remembered", &self.remembered.len())
            .finish()
    }
}

use listsync::{DensityMode, Record, StateStore};

use crate::{RenderSurface, apply_anchor, capture_anchor};

/// Extra visual gap (px) applied under the denser mode when anchoring.
pub const DENSITY_GAP: i64 = 8;

/// Persistence for the density preference: one namespaced key, independent of
/// the filter state and the URL. The host backs this with whatever it has
/// (browser storage, a config file, an in-memory map for tests).
pub trait DensityStore {
    fn load(&self) -> Option<String>;
    fn save(&mut self, value: &str);
}

/// The collaborator that paints the cache: given the record set and a target
/// density, it produces/updates the visual elements on the surface.
pub trait Renderer {
    fn render(&mut self, records: &[Record], mode: DensityMode, surface: &mut dyn RenderSurface);
}

/// Replays the cached record set under an alternate rendering density without
/// refetching, preserving the visual scroll position via an anchor.
pub struct DensitySwitcher<S> {
    header_offset: i64,
    store: S,
}

impl<S: DensityStore> DensitySwitcher<S> {
    pub fn new(header_offset: i64, store: S) -> Self {
        Self {
            header_offset,
            store,
        }
    }

    /// Loads the persisted preference; absent or invalid values fall back to
    /// the default mode.
    pub fn stored_mode(&self) -> DensityMode {
        DensityMode::from_stored(self.store.load().as_deref())
    }

    fn gap_for(mode: DensityMode) -> i64 {
        match mode {
            DensityMode::Full => 0,
            DensityMode::Mini => DENSITY_GAP,
        }
    }

    /// Switches the rendering density. No-op returning `false` if `mode`
    /// already is the current mode.
    ///
    /// Otherwise: captures the anchor under the current mode, updates the
    /// mode in the state store silently (density changes must not re-trigger
    /// filter derivation), replays the entire cached record set under the new
    /// mode's template with no network call, and restores the scroll position
    /// by re-aligning the anchor.
    pub fn switch(
        &mut self,
        mode: DensityMode,
        state: &StateStore,
        records: &[Record],
        renderer: &mut dyn Renderer,
        surface: &mut dyn RenderSurface,
    ) -> bool {
        let current = state.density();
        if current == mode {
            return false;
        }

        let anchor = capture_anchor(surface, self.header_offset, Self::gap_for(current));
        state.set_density(mode, true);
        self.store.save(mode.as_str());

        renderer.render(records, mode, surface);

        if let Some(anchor) = &anchor {
            apply_anchor(surface, anchor, self.header_offset, Self::gap_for(mode));
        }
        true
    }
}

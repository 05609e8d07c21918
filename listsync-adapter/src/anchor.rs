use serde::{Deserialize, Serialize};

/// What the external renderer must expose for anchoring: the geometry of the
/// currently rendered record elements and a way to move the viewport.
///
/// All positions are in pixels, relative to the document top; the viewport
/// top is the current scroll position.
pub trait RenderSurface {
    /// Calls `f` with `(record id, element top edge)` for every currently
    /// rendered record, in document order.
    fn for_each_rendered(&self, f: &mut dyn FnMut(&str, i64));

    /// The top edge of the rendered element for `id`, if any.
    fn record_top(&self, id: &str) -> Option<i64>;

    /// The viewport's current top edge (scroll position).
    fn viewport_top(&self) -> i64;

    /// Scrolls the viewport so its top edge sits at `top` (clamped by the
    /// host as needed).
    fn scroll_to(&mut self, top: i64);
}

/// The record identifier used as a fixed reference to preserve visual scroll
/// position across a non-fetching re-render.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollAnchor {
    pub id: String,
    /// Distance from the effective viewport top down to the anchor's top
    /// edge (non-positive: the anchor sits at or above that line).
    pub offset_from_top: i64,
}

/// Captures an anchor: among the rendered records, the one whose top edge is
/// closest to, but not below, the effective viewport top.
///
/// `header_offset` accounts for a fixed header overlaying the viewport;
/// `extra_gap` is the denser mode's additional visual gap. Returns `None`
/// when nothing is rendered at or above that line.
pub fn capture_anchor(
    surface: &dyn RenderSurface,
    header_offset: i64,
    extra_gap: i64,
) -> Option<ScrollAnchor> {
    let line = surface.viewport_top() + header_offset + extra_gap;
    let mut best: Option<(String, i64)> = None;
    surface.for_each_rendered(&mut |id, top| {
        if top > line {
            return;
        }
        match &best {
            Some((_, best_top)) if *best_top >= top => {}
            _ => best = Some((id.to_owned(), top)),
        }
    });
    best.map(|(id, top)| ScrollAnchor {
        id,
        offset_from_top: top - line,
    })
}

/// Re-aligns a previously captured anchor after a re-render: locates the
/// anchor's identifier in the new output and restores the same visual
/// top-edge offset. Returns `false` when the identifier is gone.
pub fn apply_anchor(
    surface: &mut dyn RenderSurface,
    anchor: &ScrollAnchor,
    header_offset: i64,
    extra_gap: i64,
) -> bool {
    let Some(top) = surface.record_top(&anchor.id) else {
        return false;
    };
    surface.scroll_to(top - anchor.offset_from_top - header_offset - extra_gap);
    true
}

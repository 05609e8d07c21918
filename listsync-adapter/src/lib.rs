//! Adapter utilities for the `listsync` crate.
//!
//! The `listsync` crate is transport- and UI-agnostic and focuses on the core
//! state and ordering guarantees. This crate provides the framework-neutral
//! helpers a host needs on top:
//!
//! - Scroll anchoring (preserve the visual position across a non-fetching
//!   re-render)
//! - Density switching (replay the cached record set under an alternate
//!   rendering density, no refetch)
//! - A [`Controller`] that wires the store, the codec, the route context, and
//!   the fetch coordinator into an effect queue the host drains
//!
//! This crate is intentionally framework-agnostic (no DOM/ratatui bindings).
#![forbid(unsafe_code)]

mod anchor;
mod controller;
mod density;


pub use anchor::{RenderSurface, ScrollAnchor, apply_anchor, capture_anchor};
pub use controller::{Controller, ControllerOptions, Effect};
pub use density::{DENSITY_GAP, DensityStore, DensitySwitcher, Renderer};

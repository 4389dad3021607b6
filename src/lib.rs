//! Interactive, physically-simulated 3D node-link graphs for Bevy scenes.
//!
//! The host adds [`ForceGraphPlugin`] plus the camera and input plugins,
//! supplies a [`GraphConfig`] resource, and treats the spawned graph root as
//! one opaque entity: layout stepping, auto-fit, per-node content, picking
//! and the optional shared-state channel all happen inside this crate.

pub mod camera;
pub mod config;
pub mod document;
pub mod graph;
pub mod input;
pub mod sim;
pub mod visual;

pub use camera::{CameraPlugin, MainCamera};
pub use config::{Accessor, GraphConfig};
pub use sim::SimulationEngine;
pub use visual::plugin::{ForceGraphPlugin, LayoutConverged};
pub use visual::sync::{SharedStateBridge, SharedTransport};

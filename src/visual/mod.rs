pub mod billboard;
pub mod content;
pub mod fitter;
pub mod interactions;
pub mod plugin;
pub mod scene;
pub mod sync;
pub mod utils;

pub use plugin::{ForceGraphPlugin, LayoutConverged};

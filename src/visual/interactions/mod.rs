pub mod pointer;

pub use pointer::{GraphHit, InteractionState, handle_pointer_input, intersect_graph};

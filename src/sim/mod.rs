pub mod forces;

use std::collections::HashMap;

use bevy::math::Vec3;
use bevy::prelude::Resource;
use rand::Rng;

use crate::config::GraphConfig;
use crate::graph::Graph;
use forces::{Force, ForceKind, DEFAULT_LINK_STRENGTH};

/// Velocity retained per step (exponential damping).
const DAMPING: f32 = 0.9;

/// Steps whose peak node speed stays below this count toward convergence.
const CONVERGENCE_TOLERANCE: f32 = 0.05;

/// Consecutive calm steps required before the engine stops.
const CALM_STEPS_REQUIRED: u32 = 15;

/// Spacing of the initial placement spiral.
const INITIAL_RADIUS: f32 = 2.0;

/// Fraction of the spiral radius used as random placement jitter, breaking
/// exactly symmetric starting configurations.
const PLACEMENT_JITTER: f32 = 0.02;

/// Largest dt a single step will integrate; longer frames are clamped.
const MAX_DT: f32 = 0.05;

/// Axis-aligned bounding box over node positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn max_extent(&self) -> f32 {
        let e = self.extent();
        e.x.max(e.y).max(e.z)
    }
}

/// Iterative force-directed layout over an owned [`Graph`].
///
/// Runs from graph build until the motion metric stays below tolerance long
/// enough, then stops; `step` is a no-op while stopped and only [`reheat`]
/// restarts it. The converged signal is raised exactly once per heat cycle.
///
/// [`reheat`]: SimulationEngine::reheat
#[derive(Debug, Resource, Default)]
pub struct SimulationEngine {
    graph: Graph,
    forces: HashMap<String, Force>,
    running: bool,
    signaled: bool,
    calm_steps: u32,
    bounds: Option<Aabb>,
    bounds_dirty: bool,
    scratch: Vec<Vec3>,
}

impl SimulationEngine {
    /// Take ownership of a freshly built graph, seed initial positions and
    /// install the configured force set.
    pub fn new(mut graph: Graph, config: &GraphConfig) -> Self {
        seed_positions(&mut graph);

        let mut forces = HashMap::new();
        forces.insert(
            "charge".to_string(),
            Force {
                kind: ForceKind::Charge,
                strength: config.charge_force,
            },
        );
        forces.insert(
            "link".to_string(),
            Force {
                kind: ForceKind::Link,
                strength: DEFAULT_LINK_STRENGTH,
            },
        );
        forces.insert(
            "x".to_string(),
            Force {
                kind: ForceKind::AxisX,
                strength: config.x_force,
            },
        );
        forces.insert(
            "y".to_string(),
            Force {
                kind: ForceKind::AxisY,
                strength: config.y_force,
            },
        );
        forces.insert(
            "z".to_string(),
            Force {
                kind: ForceKind::AxisZ,
                strength: config.z_force,
            },
        );

        let running = !graph.is_empty();
        SimulationEngine {
            graph,
            forces,
            running,
            signaled: false,
            calm_steps: 0,
            bounds: None,
            bounds_dirty: true,
            scratch: Vec::new(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Consecutive calm steps accumulated so far (diagnostics).
    pub fn calm_steps(&self) -> u32 {
        self.calm_steps
    }

    /// Install or retune a named force.
    ///
    /// A strength of exactly zero disables the contribution without deleting
    /// the entry, so re-enabling later needs no rebuild. Retuning never
    /// touches the convergence accumulator or the running flag — only that
    /// force's contribution changes. Unknown names are inferred from the
    /// fixed kind set; anything else is rejected with a warning.
    pub fn configure_force(&mut self, name: &str, strength: f32) {
        if let Some(force) = self.forces.get_mut(name) {
            force.strength = strength;
            return;
        }
        match ForceKind::from_name(name) {
            Some(kind) => {
                self.forces.insert(name.to_string(), Force { kind, strength });
            }
            None => log::warn!("ignoring unknown force '{}'", name),
        }
    }

    pub fn force_strength(&self, name: &str) -> Option<f32> {
        self.forces.get(name).map(|f| f.strength)
    }

    /// Advance one integration increment.
    ///
    /// Accumulates every enabled force, integrates velocity then position,
    /// and tracks the convergence metric (peak node speed). Returns `true`
    /// exactly once per heat cycle, on the step where the engine stops.
    pub fn step(&mut self, dt: f32) -> bool {
        if !self.running || dt <= 0.0 {
            return false;
        }
        let dt = dt.min(MAX_DT);

        self.scratch.clear();
        self.scratch.resize(self.graph.nodes.len(), Vec3::ZERO);
        for force in self.forces.values() {
            forces::accumulate(force, &self.graph, &mut self.scratch);
        }

        let mut peak_speed = 0.0f32;
        for (node, force) in self.graph.nodes.iter_mut().zip(&self.scratch) {
            let acceleration = *force / node.value;
            node.velocity = (node.velocity + acceleration * dt) * DAMPING;
            node.position += node.velocity * dt;
            peak_speed = peak_speed.max(node.velocity.length());
        }
        self.bounds_dirty = true;

        if peak_speed < CONVERGENCE_TOLERANCE {
            self.calm_steps += 1;
        } else {
            self.calm_steps = 0;
        }

        if self.calm_steps >= CALM_STEPS_REQUIRED && !self.signaled {
            self.running = false;
            self.signaled = true;
            return true;
        }
        false
    }

    /// Stopped → running; the converged signal becomes armed again.
    pub fn reheat(&mut self) {
        if self.graph.is_empty() {
            return;
        }
        self.running = true;
        self.signaled = false;
        self.calm_steps = 0;
    }

    /// Bounding box over current node positions, recomputed lazily and
    /// cached until the next step. `None` for an empty graph.
    pub fn bounding_box(&mut self) -> Option<Aabb> {
        if self.bounds_dirty {
            self.bounds = compute_bounds(&self.graph);
            self.bounds_dirty = false;
        }
        self.bounds
    }
}

fn compute_bounds(graph: &Graph) -> Option<Aabb> {
    let first = graph.nodes.first()?;
    let mut bounds = Aabb {
        min: first.position,
        max: first.position,
    };
    for node in &graph.nodes[1..] {
        bounds.min = bounds.min.min(node.position);
        bounds.max = bounds.max.max(node.position);
    }
    Some(bounds)
}

/// Place nodes on a loose spiral so the first steps have meaningful
/// separations to work with, plus a little jitter so exactly coincident or
/// symmetric layouts cannot survive step one.
fn seed_positions(graph: &mut Graph) {
    let golden_angle = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
    let count = graph.nodes.len().max(1) as f32;
    let mut rng = rand::rng();

    for (i, node) in graph.nodes.iter_mut().enumerate() {
        let idx = i as f32 + 0.5;
        let radius = INITIAL_RADIUS * idx.sqrt();
        let theta = golden_angle * idx;
        let lift = (idx / count) * 2.0 - 1.0;

        node.position = Vec3::new(
            radius * theta.cos(),
            radius * lift * 0.5,
            radius * theta.sin(),
        );
        node.position += Vec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        ) * (radius * PLACEMENT_JITTER);
        node.velocity = Vec3::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::GraphDocument;
    use crate::visual::fitter::SceneBoundsFitter;

    const DT: f32 = 1.0 / 60.0;

    fn engine_from_json(json: &str, config: &GraphConfig) -> SimulationEngine {
        let doc = GraphDocument::from_json(json).unwrap();
        let graph = Graph::build(&doc, config).unwrap();
        SimulationEngine::new(graph, config)
    }

    fn two_node_engine(config: &GraphConfig) -> SimulationEngine {
        engine_from_json(
            r#"{
                "nodes": [{"id": "a", "group": 1}, {"id": "b", "group": 2}],
                "links": [{"source": "a", "target": "b"}]
            }"#,
            config,
        )
    }

    fn zeroed(mut config: GraphConfig) -> GraphConfig {
        config.charge_force = 0.0;
        config.x_force = 0.0;
        config.y_force = 0.0;
        config.z_force = 0.0;
        config
    }

    /// Step until the engine signals convergence, with a generous cap.
    fn run_to_convergence(engine: &mut SimulationEngine) -> usize {
        for i in 0..20_000 {
            if engine.step(DT) {
                return i + 1;
            }
        }
        panic!("engine never converged");
    }

    #[test]
    fn test_zero_strength_force_applies_no_impulse() {
        let mut config = zeroed(GraphConfig::default());
        config.y_force = 0.1;
        let mut engine = two_node_engine(&config);
        engine.configure_force("link", 0.0);

        engine.step(DT);

        for node in &engine.graph().nodes {
            assert_eq!(node.velocity.x, 0.0, "disabled x force must stay silent");
            assert_eq!(node.velocity.z, 0.0, "disabled z force must stay silent");
            assert_ne!(node.velocity.y, 0.0, "enabled y force must act");
        }
    }

    #[test]
    fn test_disabled_force_keeps_configuration() {
        let mut engine = two_node_engine(&GraphConfig::default());

        engine.configure_force("charge", 0.0);
        assert_eq!(engine.force_strength("charge"), Some(0.0));

        // Re-enabling is a plain retune, no rebuild involved.
        engine.configure_force("charge", -30.0);
        assert_eq!(engine.force_strength("charge"), Some(-30.0));
    }

    #[test]
    fn test_unknown_force_is_rejected() {
        let mut engine = two_node_engine(&GraphConfig::default());
        engine.configure_force("gravity-well", 9.8);
        assert_eq!(engine.force_strength("gravity-well"), None);
    }

    #[test]
    fn test_converged_fires_exactly_once_per_cycle() {
        // All forces silent: the engine goes calm immediately and must stop
        // after exactly the required streak.
        let config = zeroed(GraphConfig::default());
        let mut engine = two_node_engine(&config);
        engine.configure_force("link", 0.0);

        let mut signals = 0;
        for _ in 0..100 {
            if engine.step(DT) {
                signals += 1;
            }
        }
        assert_eq!(signals, 1);
        assert!(!engine.is_running());

        // Reheat arms the signal again.
        engine.reheat();
        assert!(engine.is_running());
        let mut second = 0;
        for _ in 0..100 {
            if engine.step(DT) {
                second += 1;
            }
        }
        assert_eq!(second, 1);
    }

    #[test]
    fn test_step_is_noop_while_stopped() {
        let config = zeroed(GraphConfig::default());
        let mut engine = two_node_engine(&config);
        engine.configure_force("link", 0.0);
        run_to_convergence(&mut engine);

        let before: Vec<Vec3> = engine.graph().nodes.iter().map(|n| n.position).collect();
        for _ in 0..10 {
            assert!(!engine.step(DT));
        }
        let after: Vec<Vec3> = engine.graph().nodes.iter().map(|n| n.position).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_retune_preserves_convergence_accumulator() {
        let config = zeroed(GraphConfig::default());
        let mut engine = two_node_engine(&config);
        engine.configure_force("link", 0.0);

        for _ in 0..10 {
            engine.step(DT);
        }
        assert_eq!(engine.calm_steps(), 10);

        // Retuning a (still zero) force must not reset the streak.
        engine.configure_force("charge", 0.0);
        assert_eq!(engine.calm_steps(), 10);
        assert!(engine.is_running());

        let mut remaining = 0;
        while !engine.step(DT) {
            remaining += 1;
            assert!(remaining < 10, "streak was reset by the retune");
        }
        assert_eq!(remaining as u32, CALM_STEPS_REQUIRED - 10 - 1);
    }

    #[test]
    fn test_bounding_box_cached_until_step() {
        let mut engine = two_node_engine(&GraphConfig::default());

        let first = engine.bounding_box().unwrap();
        assert_eq!(engine.bounding_box().unwrap(), first);

        engine.step(DT);
        // Charge is repulsive: after a step the box must have changed.
        assert_ne!(engine.bounding_box().unwrap(), first);
    }

    #[test]
    fn test_empty_graph_has_no_bounds_and_never_runs() {
        let config = GraphConfig::default();
        let mut engine = SimulationEngine::new(Graph::default(), &config);
        assert!(!engine.is_running());
        assert!(engine.bounding_box().is_none());
        assert!(!engine.step(DT));
        engine.reheat();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_two_node_layout_separates_and_fits() {
        // End-to-end: charge -50, all three axis forces 0.1, one link.
        let config = GraphConfig::default();
        let mut engine = two_node_engine(&config);

        run_to_convergence(&mut engine);

        let a = engine.graph().nodes[0].position;
        let b = engine.graph().nodes[1].position;
        assert!(
            a.distance(b) > 1.0,
            "repulsion must hold the nodes apart, got {}",
            a.distance(b)
        );

        let bounds = engine.bounding_box().unwrap();
        let mut fitter = SceneBoundsFitter::new(config.width, config.height);
        let scale = fitter.fit(&bounds).unwrap();

        let extent = bounds.extent() * scale;
        assert!(extent.y <= config.height + 1e-3);
        assert!(extent.x.max(extent.z) <= config.width + 1e-3);
    }
}

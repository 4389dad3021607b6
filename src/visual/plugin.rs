use bevy::prelude::*;
use bevy::tasks::{AsyncComputeTaskPool, Task, block_on, futures_lite::future};
use serde_json::json;

use crate::config::GraphConfig;
use crate::document::{DocumentError, GraphDocument, fetch_document};
use crate::graph::Graph;
use crate::sim::SimulationEngine;
use crate::visual::billboard::{BillboardScratch, update_billboards};
use crate::visual::content::{poll_rich_builds, tick_node_content};
use crate::visual::fitter::SceneBoundsFitter;
use crate::visual::interactions::{InteractionState, handle_pointer_input};
use crate::visual::scene::{self, GraphMeshes, GraphRoot, LinkVisual, NodeContainer};
use crate::visual::sync::{SharedRecord, SharedStateBridge};

/// Raised exactly once per heat cycle, on the frame the engine stops.
#[derive(Message)]
pub struct LayoutConverged;

/// Radians of root rotation per pixel of drag.
const DRAG_ROTATE_SPEED: f32 = 0.005;

/// Auto-fit bookkeeping: the fitter itself plus a pending flag so a fit
/// requested during a drag waits for the release instead of being dropped.
#[derive(Resource)]
struct SceneFitter {
    fitter: SceneBoundsFitter,
    pending: bool,
}

impl Default for SceneFitter {
    fn default() -> Self {
        let config = GraphConfig::default();
        SceneFitter {
            fitter: SceneBoundsFitter::new(config.width, config.height),
            pending: false,
        }
    }
}

/// In-flight document fetch, polled once per frame.
#[derive(Resource, Default)]
struct DocumentLoader {
    task: Option<Task<Result<GraphDocument, DocumentError>>>,
}

/// The frame scheduler: wires the simulation engine, interaction controller,
/// content factory, bounds fitter and shared-state bridge into one fixed
/// per-frame order.
pub struct ForceGraphPlugin;

impl Plugin for ForceGraphPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GraphConfig>()
            .init_resource::<SimulationEngine>()
            .init_resource::<InteractionState>()
            .init_resource::<SharedStateBridge>()
            .init_resource::<BillboardScratch>()
            .init_resource::<SceneFitter>()
            .init_resource::<DocumentLoader>()
            .add_message::<LayoutConverged>()
            .add_systems(Startup, scene::setup_graph_root)
            .add_systems(
                Update,
                (
                    // Maintenance: configuration watching and document loads.
                    watch_config,
                    poll_document_load,
                    // The per-frame order proper: interaction, shared state,
                    // one simulation step, billboards, content, fit.
                    handle_pointer_input,
                    apply_drag_rotation,
                    apply_shared_state,
                    step_simulation,
                    scene::sync_graph_transforms,
                    update_billboards,
                    poll_rich_builds,
                    tick_node_content,
                    fit_on_convergence,
                    // Transform recomputation across all descendants happens
                    // in Bevy's PostUpdate propagation pass, after this
                    // chain: that pass is what hands freshly reparented
                    // children (rich content in particular) their world
                    // transforms.
                )
                    .chain(),
            );
    }
}

/// React to configuration changes: shape-affecting options rebuild the graph
/// and content pipeline, force strengths retune the running engine in place.
fn watch_config(
    config: Res<GraphConfig>,
    mut previous: Local<Option<GraphConfig>>,
    mut engine: ResMut<SimulationEngine>,
    mut loader: ResMut<DocumentLoader>,
    mut fitter: ResMut<SceneFitter>,
) {
    if !config.is_changed() {
        return;
    }

    let rebuild = match previous.as_ref() {
        None => true,
        Some(prev) if config.needs_rebuild(prev) => true,
        Some(prev) => {
            if config.forces_changed(prev) {
                // Retune only: the convergence accumulator is untouched.
                engine.configure_force("charge", config.charge_force);
                engine.configure_force("x", config.x_force);
                engine.configure_force("y", config.y_force);
                engine.configure_force("z", config.z_force);
                info!("force strengths retuned");
            }
            if config.width != prev.width || config.height != prev.height {
                fitter.fitter.set_targets(config.width, config.height);
                fitter.pending = true;
            }
            false
        }
    };
    *previous = Some(config.clone());

    if rebuild {
        let url = config.document_url.clone();
        loader.task = Some(AsyncComputeTaskPool::get().spawn(async move {
            if url.is_empty() {
                Ok(GraphDocument::default())
            } else {
                fetch_document(&url)
            }
        }));
    }
}

/// Apply a finished document fetch: tear down the old visual tree, build the
/// new graph (fetch/parse/build failures leave it empty, non-fatally) and
/// spawn the content pipeline for it.
fn poll_document_load(
    mut commands: Commands,
    mut loader: ResMut<DocumentLoader>,
    config: Res<GraphConfig>,
    mut engine: ResMut<SimulationEngine>,
    mut fitter: ResMut<SceneFitter>,
    graph_meshes: Res<GraphMeshes>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut root: Query<(Entity, &mut Transform), With<GraphRoot>>,
    stale: Query<Entity, Or<(With<NodeContainer>, With<LinkVisual>)>>,
) {
    let Some(task) = loader.task.as_mut() else {
        return;
    };
    let Some(result) = block_on(future::poll_once(task)) else {
        return;
    };
    loader.task = None;

    let Ok((root_entity, mut root_transform)) = root.single_mut() else {
        return;
    };

    // The previous pipeline goes away wholesale; in-flight rich builds die
    // with their containers.
    for entity in &stale {
        commands.entity(entity).despawn();
    }

    let graph = match result {
        Ok(doc) => match Graph::build(&doc, &config) {
            Ok(graph) => graph,
            Err(e) => {
                warn!("graph build failed: {e}; leaving the graph empty");
                Graph::default()
            }
        },
        Err(e) => {
            warn!("{e}; leaving the graph empty");
            Graph::default()
        }
    };

    info!(
        "graph ready: {} nodes, {} links",
        graph.node_count(),
        graph.links.len()
    );
    *engine = SimulationEngine::new(graph, &config);
    fitter.fitter = SceneBoundsFitter::new(config.width, config.height);
    fitter.pending = false;
    root_transform.scale = Vec3::ONE;

    if !engine.graph().is_empty() {
        scene::spawn_graph_visuals(
            &mut commands,
            &engine,
            &config,
            &graph_meshes,
            &mut materials,
            root_entity,
        );
    }
}

/// One simulation step per frame; announces the converged transition.
fn step_simulation(
    time: Res<Time>,
    mut engine: ResMut<SimulationEngine>,
    mut converged: MessageWriter<LayoutConverged>,
) {
    if engine.step(time.delta_secs()) {
        info!("layout converged");
        converged.write(LayoutConverged);
    }
}

/// The demo interpretation of a drag: rotate the whole graph. The
/// interaction controller only supplies lifecycle and delta; this is the
/// caller side of that contract. When networked, the resulting rotation is
/// the shared record.
fn apply_drag_rotation(
    config: Res<GraphConfig>,
    state: Res<InteractionState>,
    mut applied: Local<Vec2>,
    mut bridge: ResMut<SharedStateBridge>,
    mut root: Query<&mut Transform, With<GraphRoot>>,
) {
    if !state.is_dragging() {
        *applied = Vec2::ZERO;
        return;
    }
    let Ok(mut transform) = root.single_mut() else {
        return;
    };

    let step = state.drag_delta() - *applied;
    *applied = state.drag_delta();
    if step == Vec2::ZERO {
        return;
    }

    let yaw = Quat::from_rotation_y(step.x * DRAG_ROTATE_SPEED);
    let pitch = Quat::from_rotation_x(-step.y * DRAG_ROTATE_SPEED);
    transform.rotation = yaw * pitch * transform.rotation;

    if config.is_networked {
        bridge.set_shared_data(rotation_record(transform.rotation));
    }
}

/// Apply a pending remote record and clear the changed flag.
fn apply_shared_state(
    mut bridge: ResMut<SharedStateBridge>,
    mut root: Query<&mut Transform, With<GraphRoot>>,
) {
    bridge.pump();
    if !bridge.changed() {
        return;
    }
    if let Some(rotation) = shared_rotation(bridge.get_shared_data()) {
        if let Ok(mut transform) = root.single_mut() {
            transform.rotation = rotation;
        }
    }
    bridge.clear_changed();
}

/// Fit the converged layout into the configured footprint. Deferred while a
/// drag is in progress and skipped entirely for degenerate bounds.
fn fit_on_convergence(
    mut converged: MessageReader<LayoutConverged>,
    state: Res<InteractionState>,
    mut engine: ResMut<SimulationEngine>,
    mut fitter: ResMut<SceneFitter>,
    mut root: Query<&mut Transform, With<GraphRoot>>,
) {
    if !converged.is_empty() {
        converged.clear();
        fitter.pending = true;
    }
    if !fitter.pending || state.is_dragging() || engine.is_running() {
        return;
    }

    let Some(bounds) = engine.bounding_box() else {
        fitter.pending = false;
        return;
    };
    if let Ok(mut transform) = root.single_mut() {
        if let Some(scale) = fitter.fitter.fit(&bounds) {
            transform.scale = Vec3::splat(scale);
            info!("layout fitted, absolute scale {:.3}", scale);
        }
    }
    fitter.pending = false;
}

/// Encode the graph rotation as the demo's shared record.
pub fn rotation_record(rotation: Quat) -> SharedRecord {
    json!({ "rotation": rotation.to_array() })
}

/// Decode a shared record back into a rotation, rejecting malformed ones.
pub fn shared_rotation(record: &SharedRecord) -> Option<Quat> {
    let parts = record.get("rotation")?.as_array()?;
    if parts.len() != 4 {
        return None;
    }
    let mut q = [0.0f32; 4];
    for (slot, part) in q.iter_mut().zip(parts) {
        *slot = part.as_f64()? as f32;
    }
    let quat = Quat::from_array(q);
    (quat.length_squared() > 1e-6).then(|| quat.normalize())
}

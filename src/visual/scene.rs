use bevy::prelude::*;

use crate::config::GraphConfig;
use crate::graph::NodeId;
use crate::sim::SimulationEngine;
use crate::visual::content;

/// The single entity the host scene sees. Every node container and link
/// visual is a descendant; picking inside it is this crate's job.
#[derive(Component)]
pub struct GraphRoot;

/// Owning container for one node's content tree.
#[derive(Component)]
pub struct NodeContainer {
    pub node: NodeId,
}

/// Visual for one link, indexed into the engine's link list.
#[derive(Component)]
pub struct LinkVisual {
    pub index: usize,
}

/// Shared unit meshes, scaled per instance.
#[derive(Resource)]
pub struct GraphMeshes {
    pub placeholder: Handle<Mesh>,
    pub link: Handle<Mesh>,
}

/// Opaque below 1.0 opacity switches to alpha blending.
pub fn tinted_material(color: Vec4, opacity: f32) -> StandardMaterial {
    let alpha = (color.w * opacity).clamp(0.0, 1.0);
    StandardMaterial {
        base_color: Color::srgba(color.x, color.y, color.z, alpha),
        alpha_mode: if alpha < 1.0 {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        },
        ..default()
    }
}

pub fn setup_graph_root(mut commands: Commands, mut meshes: ResMut<Assets<Mesh>>) {
    commands.spawn((GraphRoot, Transform::IDENTITY, Visibility::default()));
    commands.insert_resource(GraphMeshes {
        placeholder: meshes.add(Cuboid::new(1.0, 1.0, 1.0)),
        link: meshes.add(Cuboid::new(1.0, 1.0, 1.0)),
    });
}

/// Spawn the full visual tree for a freshly built graph: one container per
/// node (placeholder now, rich content later) and one stretched cuboid per
/// link.
pub fn spawn_graph_visuals(
    commands: &mut Commands,
    engine: &SimulationEngine,
    config: &GraphConfig,
    graph_meshes: &GraphMeshes,
    materials: &mut Assets<StandardMaterial>,
    root: Entity,
) {
    for (index, node) in engine.graph().nodes.iter().enumerate() {
        content::spawn_node_content(
            commands,
            graph_meshes,
            materials,
            node,
            NodeId(index as u32),
            config.text_size,
            root,
        );
    }

    for (index, link) in engine.graph().links.iter().enumerate() {
        commands.spawn((
            LinkVisual { index },
            Mesh3d(graph_meshes.link.clone()),
            MeshMaterial3d(materials.add(tinted_material(link.color, link.opacity))),
            Transform::IDENTITY,
            if link.visible {
                Visibility::Inherited
            } else {
                Visibility::Hidden
            },
            ChildOf(root),
        ));
    }
}

/// Copy engine positions onto node containers and restretch link visuals
/// between their endpoints. Runs right after the simulation step.
pub fn sync_graph_transforms(
    engine: Res<SimulationEngine>,
    mut containers: Query<(&NodeContainer, &mut Transform)>,
    mut links: Query<
        (&LinkVisual, &mut Transform, &mut Visibility),
        Without<NodeContainer>,
    >,
) {
    let graph = engine.graph();

    for (container, mut transform) in &mut containers {
        if let Some(node) = graph.nodes.get(container.node.index()) {
            transform.translation = node.position;
        }
    }

    for (visual, mut transform, mut visibility) in &mut links {
        let Some(link) = graph.links.get(visual.index) else {
            continue;
        };
        let source = graph.nodes[link.source.index()].position;
        let target = graph.nodes[link.target.index()].position;
        let delta = target - source;
        let length = delta.length();

        if !link.visible || length < 1e-4 {
            *visibility = Visibility::Hidden;
            continue;
        }
        *visibility = Visibility::Inherited;

        transform.translation = (source + target) * 0.5;
        transform.rotation = Quat::from_rotation_arc(Vec3::Y, delta / length);
        transform.scale = Vec3::new(link.width, length, link.width);
    }
}

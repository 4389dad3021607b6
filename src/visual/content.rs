use bevy::prelude::*;
use bevy::tasks::{AsyncComputeTaskPool, Task, block_on, futures_lite::future};

use crate::graph::{Node, NodeId};
use crate::visual::scene::{GraphMeshes, NodeContainer, tinted_material};
use crate::visual::utils::ease_out_cubic;

/// World radius of a node visual per unit of cube-rooted value.
pub const NODE_REL_SIZE: f32 = 2.0;

/// Placeholder spin rate, radians per second.
const PLACEHOLDER_SPIN_SPEED: f32 = 2.4;

/// Rich grow-in speed, full scale per 1/rate seconds.
const RICH_GROW_RATE: f32 = 3.0;

pub fn node_radius(value: f32) -> f32 {
    NODE_REL_SIZE * value.cbrt()
}

/// Content handle of one node container: the placeholder entity until the
/// rich build lands, the rich entity afterwards. The placeholder slot is
/// cleared exactly once, at attach time.
#[derive(Component)]
pub struct NodeContent {
    pub placeholder: Option<Entity>,
    pub rich: Option<Entity>,
    pub spin: f32,
}

#[derive(Component)]
pub struct PlaceholderVisual;

#[derive(Component)]
pub struct RichVisual {
    pub grow: f32,
}

/// In-flight rich build for a container. Dropped (and thereby cancelled for
/// all observable purposes) together with the container.
#[derive(Component)]
pub struct RichBuild(Task<RichContent>);

/// Everything the async build produces: generated meshes plus the appearance
/// captured when the build started.
pub struct RichContent {
    sphere: Mesh,
    plate: Mesh,
    plate_offset: f32,
    color: Vec4,
    opacity: f32,
}

/// Create one node's container: placeholder child immediately, rich build
/// started in the background. Returns the container synchronously; the
/// caller never waits on the build.
pub fn spawn_node_content(
    commands: &mut Commands,
    graph_meshes: &GraphMeshes,
    materials: &mut Assets<StandardMaterial>,
    node: &Node,
    node_id: NodeId,
    text_size: f32,
    root: Entity,
) -> Entity {
    let radius = node_radius(node.value);

    let container = commands
        .spawn((
            NodeContainer { node: node_id },
            Transform::from_translation(node.position),
            Visibility::default(),
            ChildOf(root),
        ))
        .id();

    let placeholder = commands
        .spawn((
            PlaceholderVisual,
            Mesh3d(graph_meshes.placeholder.clone()),
            MeshMaterial3d(materials.add(tinted_material(node.color, node.opacity))),
            Transform::from_scale(Vec3::splat(radius * 1.2)),
            ChildOf(container),
        ))
        .id();

    // The build captures the node's appearance as of this moment; later
    // configuration changes do not reach an already-started build.
    let name = node.id.clone();
    let color = node.color;
    let opacity = node.opacity;
    let task = AsyncComputeTaskPool::get()
        .spawn(async move { build_rich_content(&name, color, opacity, radius, text_size) });

    commands.entity(container).insert((
        NodeContent {
            placeholder: Some(placeholder),
            rich: None,
            spin: 0.0,
        },
        RichBuild(task),
    ));

    container
}

/// Generate the rich visual off the frame loop: a sphere sized by value and
/// a nameplate quad proportioned to the node's name.
fn build_rich_content(
    name: &str,
    color: Vec4,
    opacity: f32,
    radius: f32,
    text_size: f32,
) -> RichContent {
    let sphere = Mesh::from(Sphere::new(radius));
    let plate_width = name.chars().count().max(1) as f32 * text_size * 0.6;
    let plate = Mesh::from(Rectangle::new(plate_width, text_size));

    RichContent {
        sphere,
        plate,
        plate_offset: -(radius + text_size * 0.75),
        color,
        opacity,
    }
}

/// Attach finished rich builds. Completion runs here, on the frame schedule,
/// so the attach + placeholder-clear pair is atomic with respect to a frame;
/// a container torn down mid-build simply never matches this query again.
pub fn poll_rich_builds(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut query: Query<(Entity, &mut RichBuild, &mut NodeContent)>,
) {
    for (container, mut build, mut content) in &mut query {
        let Some(built) = block_on(future::poll_once(&mut build.0)) else {
            continue;
        };
        // Liveness check before mutating the tree.
        let Ok(mut container_commands) = commands.get_entity(container) else {
            continue;
        };
        container_commands.remove::<RichBuild>();

        let RichContent {
            sphere,
            plate,
            plate_offset,
            color,
            opacity,
        } = built;

        let rich = commands
            .spawn((
                RichVisual { grow: 0.0 },
                Mesh3d(meshes.add(sphere)),
                MeshMaterial3d(materials.add(tinted_material(color, opacity))),
                Transform::from_scale(Vec3::splat(1e-3)),
                ChildOf(container),
            ))
            .id();
        commands.spawn((
            Mesh3d(meshes.add(plate)),
            MeshMaterial3d(materials.add(tinted_material(color, opacity * 0.8))),
            Transform::from_translation(Vec3::new(0.0, plate_offset, 0.0)),
            ChildOf(rich),
        ));

        // Single transition point: from here on the node is rich-ready.
        if let Some(placeholder) = content.placeholder.take() {
            commands.entity(placeholder).despawn();
        }
        content.rich = Some(rich);
    }
}

/// Per-frame content tick: spin the placeholder while it exists, forward a
/// refresh (grow-in) tick to the rich visual once it has replaced it. The
/// rich tick can never run before the transition because the placeholder
/// slot is only cleared at attach time.
pub fn tick_node_content(
    time: Res<Time>,
    mut contents: Query<&mut NodeContent>,
    mut placeholders: Query<&mut Transform, With<PlaceholderVisual>>,
    mut riches: Query<
        (&mut RichVisual, &mut Transform),
        (With<RichVisual>, Without<PlaceholderVisual>),
    >,
) {
    let dt = time.delta_secs();

    for mut content in &mut contents {
        if let Some(placeholder) = content.placeholder {
            content.spin += PLACEHOLDER_SPIN_SPEED * dt;
            if let Ok(mut transform) = placeholders.get_mut(placeholder) {
                transform.rotation = Quat::from_rotation_y(content.spin);
            }
        } else if let Some(rich) = content.rich {
            if let Ok((mut visual, mut transform)) = riches.get_mut(rich) {
                if visual.grow < 1.0 {
                    visual.grow = (visual.grow + dt * RICH_GROW_RATE).min(1.0);
                    transform.scale = Vec3::splat(ease_out_cubic(visual.grow).max(1e-3));
                }
            }
        }
    }
}

use bevy::prelude::*;

use crate::camera::MainCamera;
use crate::config::GraphConfig;
use crate::graph::{Graph, NodeId};
use crate::input::{ActivePointers, PointerEvent, PointerEventType, pointer_ray};
use crate::sim::SimulationEngine;
use crate::visual::content::node_radius;
use crate::visual::scene::GraphRoot;

/// Pixels of pointer travel before a click becomes a drag.
const DRAG_THRESHOLD: f32 = 4.0;

/// Extra pick radius around links so hairline widths stay clickable.
const LINK_PICK_SLACK: f32 = 0.25;

/// What a pointer ray resolved to inside the composite tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphHit {
    Node(NodeId),
    Link(usize),
}

/// Click/drag/hover state over the composite node/link tree.
///
/// The host delivers raw pointer events against the opaque root entity; the
/// fine-grained resolution against individual nodes and links happens here.
/// The controller owns lifecycle and the accumulated drag delta only — what
/// a drag means is the caller's business.
#[derive(Resource, Default)]
pub struct InteractionState {
    click_target: Option<GraphHit>,
    dragging: bool,
    drag_delta: Vec2,
    press_position: Option<Vec2>,
    hovered: Vec<(u64, GraphHit)>,
}

impl InteractionState {
    /// Valid only between click and release.
    pub fn click_target(&self) -> Option<GraphHit> {
        self.click_target
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Accumulated 2D offset in the plane perpendicular to the view,
    /// available every frame while dragging.
    pub fn drag_delta(&self) -> Vec2 {
        self.drag_delta
    }

    /// Pointer sources currently intersecting the tree: 0, 1 or 2 entries,
    /// rebuilt every frame.
    pub fn hovered(&self) -> &[(u64, GraphHit)] {
        &self.hovered
    }

    pub fn begin_click(&mut self, hit: GraphHit, at: Vec2) {
        self.click_target = Some(hit);
        self.press_position = Some(at);
        self.dragging = false;
        self.drag_delta = Vec2::ZERO;
    }

    pub fn pointer_moved(&mut self, at: Vec2, drag_enabled: bool) {
        let (Some(_), Some(press)) = (self.click_target, self.press_position) else {
            return;
        };
        if !drag_enabled {
            return;
        }
        let delta = at - press;
        if !self.dragging && delta.length() > DRAG_THRESHOLD {
            self.dragging = true;
        }
        if self.dragging {
            self.drag_delta = delta;
        }
    }

    /// Release clears the target; nothing about the finished interaction
    /// survives into the next one.
    pub fn release(&mut self) {
        self.click_target = None;
        self.press_position = None;
        self.dragging = false;
        self.drag_delta = Vec2::ZERO;
    }

    pub fn clear(&mut self) {
        self.release();
        self.hovered.clear();
    }

    pub fn set_hovered(&mut self, mut hits: Vec<(u64, GraphHit)>) {
        hits.truncate(crate::input::MAX_POINTER_SOURCES);
        self.hovered = hits;
    }
}

/// System: poll hover sources and route click/drag events, every frame.
pub fn handle_pointer_input(
    config: Res<GraphConfig>,
    engine: Res<SimulationEngine>,
    pointers: Res<ActivePointers>,
    mut events: MessageReader<PointerEvent>,
    camera: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    root: Query<&GlobalTransform, With<GraphRoot>>,
    mut state: ResMut<InteractionState>,
) {
    if !config.is_interactive {
        events.clear();
        state.clear();
        return;
    }
    let Ok((camera, camera_transform)) = camera.single() else {
        return;
    };
    let Ok(root_transform) = root.single() else {
        return;
    };
    let graph = engine.graph();

    // Hover polling is independent of click state and rebuilt from scratch,
    // so a stale frame can never leak through.
    let mut hovered = Vec::new();
    for (id, position) in pointers.iter() {
        let Some(ray) = pointer_ray(position, camera, camera_transform) else {
            continue;
        };
        if let Some(hit) = intersect_graph(ray, graph, root_transform) {
            hovered.push((id, hit));
        }
    }
    state.set_hovered(hovered);

    for event in events.read() {
        match event.event_type {
            PointerEventType::Down => {
                let hit = pointer_ray(event.position, camera, camera_transform)
                    .and_then(|ray| intersect_graph(ray, graph, root_transform));
                match hit {
                    Some(hit) => state.begin_click(hit, event.position),
                    // The host's coarse hit test produced the event but the
                    // fine-grained one found nothing: log and drop just this
                    // interaction.
                    None => warn!(
                        "pointer {} clicked the graph with no resolvable intersection",
                        event.id
                    ),
                }
            }
            PointerEventType::Move => state.pointer_moved(event.position, config.is_draggable),
            PointerEventType::Up => state.release(),
        }
    }
}

/// Resolve a world-space ray against every node sphere and visible link of
/// the composite tree, in graph-root local space. Nearest hit wins.
pub fn intersect_graph(ray: Ray3d, graph: &Graph, root: &GlobalTransform) -> Option<GraphHit> {
    let inverse = root.affine().inverse();
    let origin = inverse.transform_point3(ray.origin);
    let direction = inverse.transform_vector3(*ray.direction).normalize_or_zero();
    if direction == Vec3::ZERO {
        return None;
    }

    let mut best: Option<(f32, GraphHit)> = None;
    let mut consider = |t: f32, hit: GraphHit, best: &mut Option<(f32, GraphHit)>| {
        if best.map_or(true, |(bt, _)| t < bt) {
            *best = Some((t, hit));
        }
    };

    for (index, node) in graph.nodes.iter().enumerate() {
        let radius = node_radius(node.value);
        if let Some(t) = ray_sphere(origin, direction, node.position, radius) {
            consider(t, GraphHit::Node(NodeId(index as u32)), &mut best);
        }
    }

    for (index, link) in graph.links.iter().enumerate() {
        if !link.visible {
            continue;
        }
        let a = graph.nodes[link.source.index()].position;
        let b = graph.nodes[link.target.index()].position;
        let pick_radius = link.width * 0.5 + LINK_PICK_SLACK;
        if let Some(t) = ray_segment(origin, direction, a, b, pick_radius) {
            consider(t, GraphHit::Link(index), &mut best);
        }
    }

    best.map(|(_, hit)| hit)
}

/// `dir` must be unit length. Returns the ray parameter of the closest
/// approach when it passes within `radius` of `center`, ahead of the origin.
fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let to_center = center - origin;
    let t = to_center.dot(dir);
    if t < 0.0 {
        return None;
    }
    let closest_sq = to_center.length_squared() - t * t;
    (closest_sq <= radius * radius).then_some(t)
}

/// Closest approach between the ray and the segment `a..b`; a hit when it
/// comes within `radius`.
fn ray_segment(origin: Vec3, dir: Vec3, a: Vec3, b: Vec3, radius: f32) -> Option<f32> {
    let seg = b - a;
    let seg_len_sq = seg.length_squared();
    if seg_len_sq < 1e-9 {
        return ray_sphere(origin, dir, a, radius);
    }

    let r = origin - a;
    let b_dot = dir.dot(seg);
    let d = dir.dot(r);
    let e = seg.dot(r);

    // Unconstrained minimum of |origin + t*dir - (a + s*seg)|^2.
    let denom = seg_len_sq - b_dot * b_dot;
    let mut t = if denom.abs() > 1e-9 {
        (b_dot * e - seg_len_sq * d) / denom
    } else {
        (-d).max(0.0) // parallel: foot of the segment start on the ray
    };
    let mut s = (e + t * b_dot) / seg_len_sq;

    // Clamp into the segment and ahead of the ray origin, re-deriving the
    // dependent parameter after each clamp.
    if !(0.0..=1.0).contains(&s) {
        s = s.clamp(0.0, 1.0);
        t = s * b_dot - d;
    }
    if t < 0.0 {
        t = 0.0;
        s = (e / seg_len_sq).clamp(0.0, 1.0);
    }

    let closest = r + dir * t - seg * s;
    (closest.length_squared() <= radius * radius).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::GraphDocument;

    fn hit_graph() -> Graph {
        let doc = GraphDocument::from_json(
            r#"{
                "nodes": [{"id": "a"}, {"id": "b"}],
                "links": [{"source": "a", "target": "b"}]
            }"#,
        )
        .unwrap();
        let mut graph = Graph::build(&doc, &GraphConfig::default()).unwrap();
        graph.nodes[0].position = Vec3::new(-5.0, 0.0, 0.0);
        graph.nodes[1].position = Vec3::new(5.0, 0.0, 0.0);
        graph
    }

    fn ray(origin: Vec3, toward: Vec3) -> Ray3d {
        Ray3d::new(origin, Dir3::new(toward - origin).unwrap())
    }

    #[test]
    fn test_ray_hits_node_sphere() {
        let graph = hit_graph();
        let root = GlobalTransform::IDENTITY;

        let hit = intersect_graph(
            ray(Vec3::new(-5.0, 0.0, 20.0), Vec3::new(-5.0, 0.0, 0.0)),
            &graph,
            &root,
        );
        assert_eq!(hit, Some(GraphHit::Node(NodeId(0))));
    }

    #[test]
    fn test_ray_miss_resolves_to_none() {
        let graph = hit_graph();
        let root = GlobalTransform::IDENTITY;

        let hit = intersect_graph(
            ray(Vec3::new(50.0, 50.0, 20.0), Vec3::new(50.0, 50.0, 0.0)),
            &graph,
            &root,
        );
        assert_eq!(hit, None);
    }

    #[test]
    fn test_ray_hits_link_between_nodes() {
        let graph = hit_graph();
        let root = GlobalTransform::IDENTITY;

        // Straight through the segment midpoint, far from both spheres.
        let hit = intersect_graph(ray(Vec3::new(0.0, 0.0, 20.0), Vec3::ZERO), &graph, &root);
        assert_eq!(hit, Some(GraphHit::Link(0)));
    }

    #[test]
    fn test_hidden_links_are_not_pickable() {
        let mut graph = hit_graph();
        graph.links[0].visible = false;
        let root = GlobalTransform::IDENTITY;

        let hit = intersect_graph(ray(Vec3::new(0.0, 0.0, 20.0), Vec3::ZERO), &graph, &root);
        assert_eq!(hit, None);
    }

    #[test]
    fn test_nearest_hit_wins() {
        let graph = hit_graph();
        let root = GlobalTransform::IDENTITY;

        // Along the link axis from the left: node a sits in front of the
        // link body and of node b.
        let hit = intersect_graph(ray(Vec3::new(-30.0, 0.0, 0.0), Vec3::ZERO), &graph, &root);
        assert_eq!(hit, Some(GraphHit::Node(NodeId(0))));
    }

    #[test]
    fn test_hit_test_respects_root_transform() {
        let graph = hit_graph();
        // Root scaled down: world x=-5 is local x=-10 (a miss), while world
        // x=-2.5 lands on node a.
        let root = GlobalTransform::from(Transform::from_scale(Vec3::splat(0.5)));

        let miss = intersect_graph(
            ray(Vec3::new(-5.0, 0.0, 20.0), Vec3::new(-5.0, 0.0, 0.0)),
            &graph,
            &root,
        );
        assert_eq!(miss, None);

        let hit = intersect_graph(
            ray(Vec3::new(-2.5, 0.0, 20.0), Vec3::new(-2.5, 0.0, 0.0)),
            &graph,
            &root,
        );
        assert_eq!(hit, Some(GraphHit::Node(NodeId(0))));
    }

    #[test]
    fn test_click_drag_release_lifecycle() {
        let mut state = InteractionState::default();
        let hit = GraphHit::Node(NodeId(0));

        state.begin_click(hit, Vec2::new(100.0, 100.0));
        assert_eq!(state.click_target(), Some(hit));
        assert!(!state.is_dragging());

        // Below the threshold: still a click.
        state.pointer_moved(Vec2::new(102.0, 100.0), true);
        assert!(!state.is_dragging());

        // Past the threshold: dragging, delta accumulates.
        state.pointer_moved(Vec2::new(120.0, 90.0), true);
        assert!(state.is_dragging());
        assert_eq!(state.drag_delta(), Vec2::new(20.0, -10.0));

        state.pointer_moved(Vec2::new(130.0, 90.0), true);
        assert_eq!(state.drag_delta(), Vec2::new(30.0, -10.0));

        // Release clears everything.
        state.release();
        assert_eq!(state.click_target(), None);
        assert!(!state.is_dragging());
        assert_eq!(state.drag_delta(), Vec2::ZERO);
    }

    #[test]
    fn test_drag_disabled_keeps_click_state_only() {
        let mut state = InteractionState::default();
        state.begin_click(GraphHit::Link(0), Vec2::ZERO);

        state.pointer_moved(Vec2::new(200.0, 200.0), false);
        assert!(!state.is_dragging());
        assert_eq!(state.drag_delta(), Vec2::ZERO);
        assert_eq!(state.click_target(), Some(GraphHit::Link(0)));
    }

    #[test]
    fn test_hovered_is_capped_and_replaced() {
        let mut state = InteractionState::default();
        state.set_hovered(vec![
            (0, GraphHit::Node(NodeId(0))),
            (1, GraphHit::Node(NodeId(1))),
            (2, GraphHit::Link(0)),
        ]);
        assert_eq!(state.hovered().len(), 2);

        // Next frame rebuilds from scratch; nothing carries over.
        state.set_hovered(Vec::new());
        assert!(state.hovered().is_empty());
    }
}

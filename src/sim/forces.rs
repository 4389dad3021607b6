use bevy::math::Vec3;

use crate::graph::Graph;

/// Rest length of the link spring, in layout units.
pub const LINK_REST_LENGTH: f32 = 10.0;

/// Default strength of the link spring force.
pub const DEFAULT_LINK_STRENGTH: f32 = 1.0;

/// Below this separation the charge force stops growing.
const MIN_CHARGE_DISTANCE: f32 = 0.1;

/// What a named force does when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceKind {
    /// Pairwise charge between all node pairs. Negative strength repels.
    Charge,
    /// Spring along each link toward [`LINK_REST_LENGTH`].
    Link,
    /// Centering pull toward the origin along one axis.
    AxisX,
    AxisY,
    AxisZ,
}

impl ForceKind {
    pub fn from_name(name: &str) -> Option<ForceKind> {
        match name {
            "charge" => Some(ForceKind::Charge),
            "link" => Some(ForceKind::Link),
            "x" => Some(ForceKind::AxisX),
            "y" => Some(ForceKind::AxisY),
            "z" => Some(ForceKind::AxisZ),
            _ => None,
        }
    }
}

/// An installed force: its semantics plus the current strength. A strength
/// of exactly zero keeps the entry but contributes nothing.
#[derive(Debug, Clone, Copy)]
pub struct Force {
    pub kind: ForceKind,
    pub strength: f32,
}

/// Accumulate one force's contribution for every node into `out`.
///
/// `out` is the caller's scratch buffer, one slot per node, already zeroed
/// at the start of the step.
pub fn accumulate(force: &Force, graph: &Graph, out: &mut [Vec3]) {
    if force.strength == 0.0 {
        return;
    }

    match force.kind {
        ForceKind::Charge => accumulate_charge(force.strength, graph, out),
        ForceKind::Link => accumulate_link_springs(force.strength, graph, out),
        ForceKind::AxisX => accumulate_axis(force.strength, graph, out, 0),
        ForceKind::AxisY => accumulate_axis(force.strength, graph, out, 1),
        ForceKind::AxisZ => accumulate_axis(force.strength, graph, out, 2),
    }
}

/// Naive pairwise charge. Negative strength pushes pairs apart with an
/// inverse-square falloff, capped near zero separation.
fn accumulate_charge(strength: f32, graph: &Graph, out: &mut [Vec3]) {
    let max_magnitude = strength.abs() * 10.0;

    for i in 0..graph.nodes.len() {
        for j in (i + 1)..graph.nodes.len() {
            let delta = graph.nodes[j].position - graph.nodes[i].position;
            let distance = delta.length().max(MIN_CHARGE_DISTANCE);
            let magnitude = (strength / (distance * distance)).clamp(-max_magnitude, max_magnitude);

            // Positive strength attracts i toward j; negative repels.
            let pull = delta / distance * magnitude;
            out[i] += pull;
            out[j] -= pull;
        }
    }
}

/// Hooke spring along each link: F = k * (current - rest).
fn accumulate_link_springs(strength: f32, graph: &Graph, out: &mut [Vec3]) {
    for link in &graph.links {
        let source = link.source.index();
        let target = link.target.index();

        let delta = graph.nodes[target].position - graph.nodes[source].position;
        let current = delta.length();
        if current < 1e-3 {
            continue;
        }

        let extension = current - LINK_REST_LENGTH;
        let pull = delta / current * (strength * extension);
        out[source] += pull;
        out[target] -= pull;
    }
}

/// Independent per-axis centering: pulls every node's coordinate on one axis
/// toward the origin with the given strength.
fn accumulate_axis(strength: f32, graph: &Graph, out: &mut [Vec3], axis: usize) {
    for (node, slot) in graph.nodes.iter().zip(out.iter_mut()) {
        slot[axis] += -node.position[axis] * strength;
    }
}

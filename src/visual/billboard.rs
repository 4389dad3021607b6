use bevy::prelude::*;

use crate::camera::MainCamera;
use crate::visual::scene::{GraphRoot, NodeContainer};

/// Scratch quaternions for the billboard computation, owned by the frame
/// scheduler and reused every frame instead of living as hidden per-node
/// state.
#[derive(Resource, Default)]
pub struct BillboardScratch {
    pub root_inverse: Quat,
    pub viewer: Quat,
}

/// Face every node's content toward the viewer regardless of the overall
/// scene orientation: compose the inverse of the root's world rotation with
/// the viewer's world rotation and apply it as each container's local
/// rotation.
pub fn update_billboards(
    mut scratch: ResMut<BillboardScratch>,
    root: Query<&GlobalTransform, With<GraphRoot>>,
    viewer: Query<&GlobalTransform, With<MainCamera>>,
    mut containers: Query<&mut Transform, With<NodeContainer>>,
) {
    let (Ok(root_transform), Ok(viewer_transform)) = (root.single(), viewer.single()) else {
        return;
    };

    scratch.root_inverse = root_transform.rotation().inverse();
    scratch.viewer = viewer_transform.rotation();
    let facing = scratch.root_inverse * scratch.viewer;

    for mut transform in &mut containers {
        transform.rotation = facing;
    }
}

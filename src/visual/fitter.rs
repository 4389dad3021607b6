use crate::sim::Aabb;

/// Extents at or below this are treated as degenerate and skipped.
const DEGENERATE_EPSILON: f32 = 1e-6;

/// Rescales a finished layout to occupy a target footprint: a width spanning
/// the two horizontal axes and a height on the vertical axis, proportions
/// preserved.
///
/// The absolute uniform scale is tracked here, not as relative deltas: each
/// fit multiplies it by a factor computed against the *already scaled*
/// extents, so a second invocation with an unchanged bounding box computes
/// factor 1.0 and is a no-op instead of compounding.
#[derive(Debug, Clone)]
pub struct SceneBoundsFitter {
    target_width: f32,
    target_height: f32,
    scale: f32,
}

impl SceneBoundsFitter {
    pub fn new(target_width: f32, target_height: f32) -> Self {
        SceneBoundsFitter {
            target_width,
            target_height,
            scale: 1.0,
        }
    }

    /// Current absolute uniform scale of the fitted object.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Change the footprint without disturbing the tracked scale; the next
    /// fit moves the object into the new targets from wherever it is now.
    pub fn set_targets(&mut self, target_width: f32, target_height: f32) {
        self.target_width = target_width;
        self.target_height = target_height;
    }

    /// Fit the layout bounds into the target footprint and return the new
    /// absolute scale. Degenerate extents (a collapsed graph) skip the
    /// rescale entirely rather than dividing by zero.
    pub fn fit(&mut self, layout_bounds: &Aabb) -> Option<f32> {
        let extent = layout_bounds.extent();
        let size_h = extent.y * self.scale;
        let size_w = extent.x.max(extent.z) * self.scale;
        if size_h <= DEGENERATE_EPSILON || size_w <= DEGENERATE_EPSILON {
            return None;
        }

        let factor = (self.target_height / size_h).min(self.target_width / size_w);
        self.scale *= factor;
        Some(self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Vec3;

    fn bounds(extent: Vec3) -> Aabb {
        Aabb {
            min: -extent / 2.0,
            max: extent / 2.0,
        }
    }

    #[test]
    fn test_fit_bounds_layout_within_footprint() {
        let mut fitter = SceneBoundsFitter::new(100.0, 50.0);
        let b = bounds(Vec3::new(400.0, 400.0, 200.0));

        let scale = fitter.fit(&b).unwrap();

        let fitted = b.extent() * scale;
        assert!(fitted.y <= 50.0 + 1e-3);
        assert!(fitted.x.max(fitted.z) <= 100.0 + 1e-3);
        // The binding axis touches its target exactly.
        assert!((fitted.y - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_fit_is_idempotent_for_unchanged_bounds() {
        let mut fitter = SceneBoundsFitter::new(100.0, 100.0);
        let b = bounds(Vec3::new(37.0, 11.0, 59.0));

        let first = fitter.fit(&b).unwrap();
        let second = fitter.fit(&b).unwrap();
        let third = fitter.fit(&b).unwrap();

        assert!((first - second).abs() < 1e-5);
        assert!((second - third).abs() < 1e-5);
    }

    #[test]
    fn test_fit_grows_small_layouts() {
        let mut fitter = SceneBoundsFitter::new(100.0, 100.0);
        let scale = fitter.fit(&bounds(Vec3::splat(10.0))).unwrap();
        assert!(scale > 1.0);
    }

    #[test]
    fn test_degenerate_bounds_are_skipped() {
        let mut fitter = SceneBoundsFitter::new(100.0, 100.0);

        // All nodes coincident.
        assert_eq!(fitter.fit(&bounds(Vec3::ZERO)), None);
        // Flat in the vertical axis.
        assert_eq!(fitter.fit(&bounds(Vec3::new(10.0, 0.0, 10.0))), None);
        // Skipping must not disturb the tracked scale.
        assert_eq!(fitter.scale(), 1.0);
    }

    #[test]
    fn test_retarget_refits_from_current_scale() {
        let mut fitter = SceneBoundsFitter::new(100.0, 100.0);
        let b = bounds(Vec3::splat(200.0));

        fitter.fit(&b).unwrap();
        assert!((fitter.scale() - 0.5).abs() < 1e-5);

        fitter.set_targets(50.0, 50.0);
        let scale = fitter.fit(&b).unwrap();
        assert!((scale - 0.25).abs() < 1e-5);
        assert!((200.0 * scale - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_refit_after_bounds_change() {
        let mut fitter = SceneBoundsFitter::new(100.0, 100.0);

        fitter.fit(&bounds(Vec3::splat(200.0))).unwrap();
        let scale = fitter.fit(&bounds(Vec3::splat(400.0))).unwrap();

        // 400 layout units * scale fits the 100-unit footprint again.
        assert!((400.0 * scale - 100.0).abs() < 1e-3);
    }
}

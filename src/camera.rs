use bevy::prelude::*;

/// Distance from which the viewer looks at the graph origin. Far enough to
/// keep a default-footprint layout fully in frame.
const VIEWER_DISTANCE: f32 = 280.0;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_camera);
    }
}

/// The camera whose rays drive picking and whose orientation drives node
/// billboards.
#[derive(Component)]
pub struct MainCamera;

fn setup_camera(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 0.0, VIEWER_DISTANCE).looking_at(Vec3::ZERO, Vec3::Y),
        MainCamera,
    ));

    commands.spawn((
        DirectionalLight::default(),
        Transform::from_xyz(80.0, 160.0, 120.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 250.0,
        ..default()
    });
}

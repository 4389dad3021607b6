use bevy::prelude::*;

use bevy::window::WindowResolution;
use forcescene::camera::CameraPlugin;
use forcescene::config::GraphConfig;
use forcescene::input::InputPlugin;
use forcescene::visual::plugin::ForceGraphPlugin;

fn main() {
    let mut app = App::new();

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "Force Scene".into(),
            resolution: WindowResolution::new(1280, 800),
            resizable: true,
            ..default()
        }),
        ..default()
    }))
    .add_plugins(CameraPlugin)
    .add_plugins(InputPlugin)
    .add_plugins(ForceGraphPlugin)
    .insert_resource(GraphConfig {
        name: "demo".into(),
        document_url: "assets/demo_graph.json".into(),
        node_auto_color_by: Some("group".into()),
        ..default()
    });

    app.run();
}

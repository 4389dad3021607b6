use bevy::input::touch::{TouchInput, TouchPhase};
use bevy::prelude::*;
use bevy::window::CursorMoved;

/// Most pointer sources tracked at once: one per physical control ray.
pub const MAX_POINTER_SOURCES: usize = 2;

pub struct InputPlugin;
impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ActivePointers>()
            .add_message::<PointerEvent>()
            .add_systems(Update, (track_pointers, collect_pointer_events));
    }
}

#[derive(Message, Debug, Clone)]
pub struct PointerEvent {
    /// Window (logical) coordinates: pixels from bottom-left
    pub position: Vec2,
    pub event_type: PointerEventType,
    /// 0 = mouse, >0 = touch id
    pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventType {
    Down,
    Move,
    Up,
}

/// Convert window coords to a world-space pick ray using a camera.
pub fn pointer_ray(
    position: Vec2,
    camera: &Camera,
    camera_transform: &GlobalTransform,
) -> Option<Ray3d> {
    camera.viewport_to_world(camera_transform, position).ok()
}

/// The currently live pointer sources (mouse cursor and/or touches), capped
/// at [`MAX_POINTER_SOURCES`]. Hover polling walks this table every frame.
#[derive(Resource, Default, Debug, Clone)]
pub struct ActivePointers {
    entries: Vec<(u64, Vec2)>,
}

impl ActivePointers {
    pub fn set(&mut self, id: u64, position: Vec2) {
        if let Some(entry) = self.entries.iter_mut().find(|(eid, _)| *eid == id) {
            entry.1 = position;
            return;
        }
        if self.entries.len() < MAX_POINTER_SOURCES {
            self.entries.push((id, position));
        }
    }

    pub fn remove(&mut self, id: u64) {
        self.entries.retain(|(eid, _)| *eid != id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, Vec2)> + '_ {
        self.entries.iter().copied()
    }

    pub fn get(&self, id: u64) -> Option<Vec2> {
        self.entries
            .iter()
            .find(|(eid, _)| *eid == id)
            .map(|(_, p)| *p)
    }
}

fn track_pointers(
    mut ev_cursor: MessageReader<CursorMoved>,
    mut ev_touch: MessageReader<TouchInput>,
    mut pointers: ResMut<ActivePointers>,
) {
    for e in ev_cursor.read() {
        // last event wins; bottom-left origin already
        pointers.set(0, e.position);
    }
    for e in ev_touch.read() {
        match e.phase {
            TouchPhase::Started | TouchPhase::Moved => pointers.set(e.id.max(1), e.position),
            TouchPhase::Ended | TouchPhase::Canceled => pointers.remove(e.id.max(1)),
        }
    }
}

fn collect_pointer_events(
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    mut touch_events: MessageReader<TouchInput>,
    pointers: Res<ActivePointers>,
    mut out: MessageWriter<PointerEvent>,
) {
    if let Some(p) = pointers.get(0) {
        if mouse_buttons.just_pressed(MouseButton::Left) {
            out.write(PointerEvent {
                position: p,
                event_type: PointerEventType::Down,
                id: 0,
            });
        }
        if mouse_buttons.pressed(MouseButton::Left) {
            out.write(PointerEvent {
                position: p,
                event_type: PointerEventType::Move,
                id: 0,
            });
        }
        if mouse_buttons.just_released(MouseButton::Left) {
            out.write(PointerEvent {
                position: p,
                event_type: PointerEventType::Up,
                id: 0,
            });
        }
    }

    for ev in touch_events.read() {
        let event_type = match ev.phase {
            TouchPhase::Started => PointerEventType::Down,
            TouchPhase::Moved => PointerEventType::Move,
            TouchPhase::Ended | TouchPhase::Canceled => PointerEventType::Up,
        };
        out.write(PointerEvent {
            position: ev.position,
            event_type,
            id: ev.id.max(1),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_pointers_capped_at_two() {
        let mut pointers = ActivePointers::default();
        pointers.set(0, Vec2::new(1.0, 1.0));
        pointers.set(1, Vec2::new(2.0, 2.0));
        pointers.set(2, Vec2::new(3.0, 3.0));

        assert_eq!(pointers.iter().count(), 2);
        assert!(pointers.get(2).is_none());
    }

    #[test]
    fn test_active_pointers_update_and_remove() {
        let mut pointers = ActivePointers::default();
        pointers.set(0, Vec2::ZERO);
        pointers.set(0, Vec2::new(5.0, 5.0));
        assert_eq!(pointers.iter().count(), 1);
        assert_eq!(pointers.get(0), Some(Vec2::new(5.0, 5.0)));

        pointers.remove(0);
        assert!(pointers.get(0).is_none());
    }
}

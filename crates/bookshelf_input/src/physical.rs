use glam::Vec2;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u16)]
pub enum MouseButtonId {
    Left = 0,
    Right = 1,
    Middle = 2,
    Back = 3,
    Forward = 4,
    Other(u16),
}

/// Bounding rect of the input surface in client (logical) pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    pub fn from_size(width: f32, height: f32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width,
            height,
        }
    }

    /// Client coordinates to normalized device coordinates, Y up.
    pub fn to_ndc(&self, client: Vec2) -> Vec2 {
        let width = self.width.max(1.0);
        let height = self.height.max(1.0);
        Vec2::new(
            ((client.x - self.left) / width) * 2.0 - 1.0,
            -((client.y - self.top) / height) * 2.0 + 1.0,
        )
    }
}

/// Raw pointer state as reported by the window.
#[derive(Clone, Debug, Default)]
pub struct PointerState {
    pub position: Vec2,
    pub delta: Vec2,
    pub pressed: Vec<MouseButtonId>,
}

impl PointerState {
    pub fn moved_to(&mut self, position: Vec2) {
        self.delta = position - self.position;
        self.position = position;
    }

    pub fn press(&mut self, button: MouseButtonId) {
        if !self.pressed.contains(&button) {
            self.pressed.push(button);
        }
    }

    pub fn release(&mut self, button: MouseButtonId) {
        self.pressed.retain(|b| *b != button);
    }

    pub fn is_pressed(&self, button: MouseButtonId) -> bool {
        self.pressed.contains(&button)
    }
}

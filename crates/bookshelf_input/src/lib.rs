pub mod physical;
pub mod pick;
pub mod raycast;

pub use physical::{MouseButtonId, PointerState, SurfaceRect};
pub use pick::{PickService, PointerEvent};
pub use raycast::Hit;

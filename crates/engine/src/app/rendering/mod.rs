mod renderer;
mod text;
mod transform;

pub use renderer::Renderer;
pub use text::TextPanel;
pub use transform::{Viewport, ViewportFit};

pub(crate) const PLACEHOLDER_HALF_SIZE_PX: i32 = 8;

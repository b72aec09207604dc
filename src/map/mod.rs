mod geometry;
mod projection;
mod renderer;
mod selection;

pub use projection::{Bounds, Viewport};
pub use renderer::{ChoroplethRenderer, DisplaySettings};
pub use selection::SelectionSet;

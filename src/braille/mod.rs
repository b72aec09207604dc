mod canvas;

pub use canvas::{BrailleCanvas, Fill};

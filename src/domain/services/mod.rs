//! Pure text services: record rendering and the formatting helpers it uses.

mod content_renderer;
mod text;

pub use content_renderer::*;
pub use text::*;

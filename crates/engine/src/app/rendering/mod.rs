mod frame;
mod renderer;

pub use frame::CLEAR_COLOR;
pub use renderer::Renderer;

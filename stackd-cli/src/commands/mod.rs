//! CLI command implementations

pub mod notify;
pub mod profiles;
pub mod render;
pub mod rules;

pub use notify::notify;
pub use profiles::profiles;
pub use render::render;
pub use rules::rules;

//! CLI command implementations.

pub(crate) mod extract;
pub(crate) mod render;

pub(crate) use extract::ExtractArgs;
pub(crate) use render::RenderArgs;

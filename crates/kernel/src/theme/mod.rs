//! Template rendering.
//!
//! Handlers build a `tera::Context` and hand it to a [`Renderer`] with a
//! view name. Production uses [`TeraRenderer`] over the templates
//! directory; [`JsonRenderer`] emits the context itself, which lets tests
//! inspect exactly what a page would have shown.

mod engine;

pub use engine::{JsonRenderer, Renderer, TeraRenderer};

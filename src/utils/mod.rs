//! Utilities for abstracta.

mod escape;
mod float;
mod join;
mod locatable;
mod location;

pub use escape::{escape_str, EscapeError};
pub(crate) use escape::unescape_str;
pub use float::Float;
pub use join::Join;
pub use locatable::Locatable;
pub use location::{LineIndex, Location, Span};

//! Metadata resolution for Glyph.
//!
//! A resolved document is a structured JSON blob with its companion image
//! embedded as a data URI. The resolver tolerates a missing image (it
//! substitutes a deterministic placeholder) but never a missing document.

pub mod error;
pub mod placeholder;
pub mod resolver;

pub use error::{ResolveError, ResolveResult};
pub use placeholder::placeholder_svg;
pub use resolver::{MetadataResolver, Resolution};

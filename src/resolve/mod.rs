//! Variable resolution: context templates and synthetic values

pub mod resolver;
pub mod synthetic;
pub mod template;

pub use resolver::{Resolution, VariableResolver};
pub use synthetic::{Generator, GeneratorKind, Locale};

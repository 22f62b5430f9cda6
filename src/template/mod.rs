//! Templates in build files.
//!
//! Two syntaxes, for two audiences:
//!
//! - `{{.Field}}` ([`render`], [`CommandWrapper`]) for values the builder
//!   fills in itself, like the command being wrapped or a device name
//! - `${name}` ([`resolve_string`]) for user references to state values,
//!   environment variables and builtins in step commands

pub mod interpolation;
pub mod wrapper;

pub use interpolation::{
    extract_variables, has_interpolation, parse_interpolation, resolve_string,
    unterminated_reference, InterpolationContext, Segment,
};
pub use wrapper::{
    parse_template, render, CommandWrapper, TemplateData, TemplateSegment, IDENTITY_WRAPPER,
};

//! Procedural macros for the DataConnect plugin host.
//!
//! Provides `#[derive(TagPlugin)]`, the reflection-free equivalent of the
//! annotation-driven tag wiring described for the host's auto-wire step.
//! Rust has no runtime reflection, so instead of scanning a live object for
//! attribute-carrying members, the derive macro expands, at compile time,
//! into an explicit `tagbus_framework::TagPlugin` implementation that the
//! host calls to obtain the same `{path, role, auto_publish_interval_ms}`
//! bindings it would have gotten from reflection.
//!
//! ```rust,ignore
//! use tagbus_macros::TagPlugin;
//!
//! #[derive(Default, TagPlugin)]
//! struct Sensor {
//!     #[tag(producer, path = "plant/line1/temperature", auto_publish_interval_ms = 1000)]
//!     temperature: f64,
//! }
//!
//! #[derive(Default, TagPlugin)]
//! struct Logic {
//!     #[tag(consumer, path = "plant/line1/temperature")]
//!     temperature: f64,
//! }
//! ```

mod tag;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `tagbus_framework::TagPlugin` from `#[tag(producer|consumer, path = "...")]`
/// field attributes.
///
/// - `#[tag(producer, path = "...", auto_publish_interval_ms = N)]` marks a
///   field the host periodically reads and publishes. Omitting the interval
///   declares the tag without starting a periodic task.
/// - `#[tag(consumer, path = "...")]` marks a field the host writes back into
///   whenever the backplane delivers a new value, via [`tagbus_core::TagCoerce`].
#[proc_macro_derive(TagPlugin, attributes(tag))]
pub fn derive_tag_plugin(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match tag::derive_tag_plugin(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

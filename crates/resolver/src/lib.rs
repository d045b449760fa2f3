//! Cart → recommendation resolution.
//!
//! Resolution is a pure function of the cart, the rule table snapshot and the
//! options: no I/O, no mutation, identical inputs give identical output.

pub mod explain;
pub mod resolver;

pub use explain::{explain, MatchExplanation, MatchType};
pub use resolver::{resolve, resolve_with, Recommendation, ResolveOptions, DEFAULT_LIMIT};

#[cfg(test)]
mod tests;

//! OAuth2 token model, token sources, and the bearer transport layer.

pub mod source;
pub mod token;

pub use source::*;
pub use token::{secret::*, *};

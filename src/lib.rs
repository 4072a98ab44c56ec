//! Typed array views over detachable byte buffers.
//!
//! [`Engine`] hosts the `%TypedArray%` family of builtins on a small object
//! model: element kinds, inline and external buffer storage, species-aware
//! result construction and overlap-safe bulk copies.

pub mod engine;
pub mod types;

pub use engine::{
    Completion, ContentType, Element, ElementKind, Engine, EngineConfig, ErrorType, JsResult,
    ViewError,
};
pub use types::{JsBigInt, JsObject, JsString, JsValue};

//! The wire-level message shape, and the `message_type!` declaration macro
//! that stands in for pydcop's `message_type(name, fields)` factory: it
//! produces a tagged record type supporting positional or keyword
//! construction, structural equality, and canonical JSON serialization.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// One message in flight: a type tag (used for handler dispatch), its
/// payload, and a reported size (pydcop computations report message size
/// for load-estimation purposes, e.g. `DpopMessage.size`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub type_tag: String,
    pub content: Json,
    pub size: usize,
}

impl Message {
    pub fn new(type_tag: impl Into<String>, content: Json, size: usize) -> Self {
        Message {
            type_tag: type_tag.into(),
            content,
            size,
        }
    }
}

/// Declares a message payload type: a plain struct deriving `Serialize`,
/// `Deserialize`, `Debug`, `Clone`, `PartialEq`, plus a `new` constructor for
/// positional construction (struct-literal syntax gives keyword
/// construction for free). Mirrors pydcop's `message_type` factory without
/// the runtime reflection, since Rust's type system already gives field
/// exhaustiveness and structural equality at compile time.
#[macro_export]
macro_rules! message_type {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            $(pub $field: $ty),*
        }

        impl $name {
            pub fn new($($field: $ty),*) -> Self {
                $name { $($field),* }
            }
        }
    };
}

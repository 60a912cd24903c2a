//! Protocol registry primitives.
//!
//! Descriptors say how long a header is; bindings say which header comes
//! next. Both are registered once through [`RegistryBuilder`] and frozen
//! into a [`ProtocolRegistry`] that the scanner consults for every frame.

pub mod binding;
pub mod descriptor;
pub mod error;
pub mod id;
pub mod registry;

pub use binding::{Binding, BindingInput, BindingPredicate, BindingPriority};
pub use descriptor::{HeaderLengthFn, ProtocolDescriptor};
pub use error::RegistryError;
pub use id::{MAX_PROTOCOL_ID, ProtocolId, ProtocolSet};
pub use registry::{ProtocolRegistry, RegistryBuilder};

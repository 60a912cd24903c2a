//! Definition errors raised while populating a registry.

use thiserror::Error;

use super::{MAX_PROTOCOL_ID, ProtocolId};

/// Errors returned by [`RegistryBuilder`](crate::protocol::RegistryBuilder).
///
/// All of these are detected when the offending definition is registered or
/// when the registry is built, never while scanning frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// A descriptor with the same id was already registered.
    #[error("protocol id {0} was already registered")]
    DuplicateId(ProtocolId),
    /// A descriptor with the same name was already registered.
    #[error("protocol name `{name}` was already registered as {existing}")]
    DuplicateName { name: String, existing: ProtocolId },
    /// A binding for the same source/target pair already exists.
    #[error("binding {} -> {target} was already registered", display_source(.from))]
    DuplicateBinding {
        from: Option<ProtocolId>,
        target: ProtocolId,
    },
    /// A binding lists its own target as a dependency.
    #[error("binding {} -> {target} depends on its own target", display_source(.from))]
    SelfDependency {
        from: Option<ProtocolId>,
        target: ProtocolId,
    },
    /// The id does not fit the supported range.
    #[error("protocol id {0} exceeds the maximum of {max}", max = MAX_PROTOCOL_ID)]
    IdOutOfRange(ProtocolId),
    /// The payload sentinel cannot be registered or bound to.
    #[error("protocol id {0} is reserved for the payload sentinel")]
    ReservedId(ProtocolId),
    /// A binding references a protocol that was never registered.
    #[error("binding references unregistered protocol {0}")]
    UnknownProtocol(ProtocolId),
}

fn display_source(from: &Option<ProtocolId>) -> String {
    from.map_or_else(|| "*".to_owned(), |id| id.to_string())
}

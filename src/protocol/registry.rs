//! Lookup tables from protocol id to descriptor and outgoing bindings.
//!
//! A [`ProtocolRegistry`] is populated once through [`RegistryBuilder`] and
//! is immutable afterwards. It is shared behind an [`Arc`] by the scanner
//! and the pipeline, so reads never take a lock.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::debug;

use super::{Binding, BindingPriority, ProtocolDescriptor, ProtocolId, RegistryError};

/// Immutable mapping from protocol id to descriptor and bindings.
#[derive(Debug)]
pub struct ProtocolRegistry {
    descriptors: HashMap<ProtocolId, ProtocolDescriptor>,
    names: HashMap<String, ProtocolId>,
    /// Per-source evaluation order with wildcards already merged in.
    outgoing: HashMap<ProtocolId, Vec<Binding>>,
    /// Evaluation order for sources that only see wildcard bindings.
    wildcards: Vec<Binding>,
}

impl ProtocolRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder { RegistryBuilder::default() }

    /// Descriptor registered under `id`.
    #[must_use]
    pub fn descriptor(&self, id: ProtocolId) -> Option<&ProtocolDescriptor> {
        self.descriptors.get(&id)
    }

    /// Id registered under `name`.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<ProtocolId> { self.names.get(name).copied() }

    /// Human name for `id`, with `"payload"` for the sentinel.
    #[must_use]
    pub fn name_of(&self, id: ProtocolId) -> Option<&str> {
        if id.is_payload() {
            return Some("payload");
        }
        self.descriptor(id).map(ProtocolDescriptor::name)
    }

    /// Bindings to evaluate after a header of `source`, in evaluation order.
    ///
    /// Primary bindings come before heuristic ones; within each tier,
    /// source-specific bindings keep their declaration order and are
    /// followed by wildcard bindings.
    #[must_use]
    pub fn bindings_for(&self, source: ProtocolId) -> &[Binding] {
        self.outgoing
            .get(&source)
            .map_or(self.wildcards.as_slice(), Vec::as_slice)
    }

    /// Number of registered descriptors.
    #[must_use]
    pub fn len(&self) -> usize { self.descriptors.len() }

    /// Whether no descriptor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.descriptors.is_empty() }
}

/// Consuming builder for [`ProtocolRegistry`].
///
/// # Examples
///
/// ```
/// use flowframe::{Binding, ProtocolDescriptor, ProtocolId, ProtocolRegistry};
///
/// const OUTER: ProtocolId = ProtocolId::new(10);
/// const INNER: ProtocolId = ProtocolId::new(11);
///
/// let registry = ProtocolRegistry::builder()
///     .register(ProtocolDescriptor::fixed(OUTER, "outer", 4), [])
///     .and_then(|b| {
///         b.register(
///             ProtocolDescriptor::fixed(INNER, "inner", 2),
///             [Binding::primary(OUTER, INNER, |input| {
///                 input.source_view().get_u8(0) == Some(1)
///             })],
///         )
///     })
///     .and_then(|b| b.build())
///     .expect("valid registry");
/// assert_eq!(registry.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    descriptors: HashMap<ProtocolId, ProtocolDescriptor>,
    names: HashMap<String, ProtocolId>,
    bindings: Vec<Binding>,
    pairs: HashSet<(Option<ProtocolId>, ProtocolId)>,
}

impl RegistryBuilder {
    /// Register a descriptor together with bindings (usually the bindings
    /// that lead *to* it).
    ///
    /// The call is atomic: when any part is rejected nothing is registered.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateId`] or
    /// [`RegistryError::DuplicateName`] when the descriptor clashes with an
    /// earlier one, [`RegistryError::IdOutOfRange`] or
    /// [`RegistryError::ReservedId`] for unusable ids, and any error
    /// [`bind`](Self::bind) would return for the bindings.
    pub fn register(
        mut self,
        descriptor: ProtocolDescriptor,
        bindings: impl IntoIterator<Item = Binding>,
    ) -> Result<Self, RegistryError> {
        let id = descriptor.id();
        Self::check_id(id)?;
        if self.descriptors.contains_key(&id) {
            debug!(%id, "rejected duplicate protocol id");
            return Err(RegistryError::DuplicateId(id));
        }
        if let Some(existing) = self.names.get(descriptor.name()) {
            debug!(%id, name = descriptor.name(), "rejected duplicate protocol name");
            return Err(RegistryError::DuplicateName {
                name: descriptor.name().to_owned(),
                existing: *existing,
            });
        }

        let bindings: Vec<Binding> = bindings.into_iter().collect();
        let mut staged = HashSet::new();
        for binding in &bindings {
            self.check_binding(binding)?;
            if !staged.insert((binding.source(), binding.target())) {
                return Err(RegistryError::DuplicateBinding {
                    from: binding.source(),
                    target: binding.target(),
                });
            }
        }

        self.names.insert(descriptor.name().to_owned(), id);
        self.descriptors.insert(id, descriptor);
        for binding in bindings {
            self.pairs.insert((binding.source(), binding.target()));
            self.bindings.push(binding);
        }
        Ok(self)
    }

    /// Register a standalone binding.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateBinding`] when a binding with the
    /// same source and target exists, [`RegistryError::SelfDependency`] when
    /// the binding depends on its own target, and
    /// [`RegistryError::ReservedId`] / [`RegistryError::IdOutOfRange`] for
    /// unusable ids.
    pub fn bind(mut self, binding: Binding) -> Result<Self, RegistryError> {
        self.check_binding(&binding)?;
        self.pairs.insert((binding.source(), binding.target()));
        self.bindings.push(binding);
        Ok(self)
    }

    /// Freeze the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownProtocol`] when a binding refers to a
    /// source, target or dependency that was never registered.
    pub fn build(self) -> Result<Arc<ProtocolRegistry>, RegistryError> {
        for binding in &self.bindings {
            let referenced = binding
                .source()
                .into_iter()
                .chain([binding.target()])
                .chain(binding.dependencies().iter().copied());
            for id in referenced {
                if !self.descriptors.contains_key(&id) {
                    return Err(RegistryError::UnknownProtocol(id));
                }
            }
        }

        let wildcards = Self::ordered(self.bindings.iter().filter(|b| b.source().is_none()));
        let mut outgoing = HashMap::new();
        for id in self.descriptors.keys() {
            let relevant = self
                .bindings
                .iter()
                .filter(|b| b.source().is_none_or(|source| source == *id));
            let ordered = Self::ordered(relevant);
            if !ordered.is_empty() {
                outgoing.insert(*id, ordered);
            }
        }

        Ok(Arc::new(ProtocolRegistry {
            descriptors: self.descriptors,
            names: self.names,
            outgoing,
            wildcards,
        }))
    }

    fn check_id(id: ProtocolId) -> Result<(), RegistryError> {
        if id.is_payload() {
            return Err(RegistryError::ReservedId(id));
        }
        if !id.in_range() {
            return Err(RegistryError::IdOutOfRange(id));
        }
        Ok(())
    }

    fn check_binding(&self, binding: &Binding) -> Result<(), RegistryError> {
        Self::check_id(binding.target())?;
        if let Some(source) = binding.source() {
            Self::check_id(source)?;
        }
        for dependency in binding.dependencies() {
            Self::check_id(*dependency)?;
        }
        if binding.dependencies().contains(&binding.target()) {
            debug!(target_id = %binding.target(), "rejected self-dependent binding");
            return Err(RegistryError::SelfDependency {
                from: binding.source(),
                target: binding.target(),
            });
        }
        if self.pairs.contains(&(binding.source(), binding.target())) {
            debug!(target_id = %binding.target(), "rejected duplicate binding");
            return Err(RegistryError::DuplicateBinding {
                from: binding.source(),
                target: binding.target(),
            });
        }
        Ok(())
    }

    /// Order bindings by tier, then specific before wildcard, then
    /// declaration order.
    fn ordered<'a>(bindings: impl Iterator<Item = &'a Binding>) -> Vec<Binding> {
        let mut ordered: Vec<(usize, &Binding)> = bindings.enumerate().collect();
        ordered.sort_by_key(|(declared, binding)| {
            let tier = match binding.priority() {
                BindingPriority::Primary => 0_u8,
                BindingPriority::Heuristic => 1,
            };
            (tier, binding.source().is_none(), *declared)
        });
        ordered.into_iter().map(|(_, b)| b.clone()).collect()
    }
}

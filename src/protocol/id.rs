//! Protocol identifiers and fixed-size id bitmaps.

use std::fmt;

use static_assertions::const_assert_eq;

/// Highest identifier a protocol may be registered under.
pub const MAX_PROTOCOL_ID: u16 = 511;

const SET_WORDS: usize = 8;

const_assert_eq!((MAX_PROTOCOL_ID as usize) + 1, SET_WORDS * 64);

/// Stable numeric identifier of a header type.
///
/// Identifiers are bounded by [`MAX_PROTOCOL_ID`] so membership can be
/// tracked in a fixed bitmap. The value `0` is reserved for
/// [`ProtocolId::PAYLOAD`], the opaque remainder of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolId(u16);

impl ProtocolId {
    /// Sentinel for the unparsed remainder of a frame.
    pub const PAYLOAD: Self = Self(0);

    /// Wrap a raw identifier. Range checks happen at registration time.
    #[must_use]
    pub const fn new(raw: u16) -> Self { Self(raw) }

    /// Return the raw identifier.
    #[must_use]
    pub const fn get(self) -> u16 { self.0 }

    /// Whether this is the [`PAYLOAD`](Self::PAYLOAD) sentinel.
    #[must_use]
    pub const fn is_payload(self) -> bool { self.0 == 0 }

    /// Whether the identifier fits inside a [`ProtocolSet`].
    #[must_use]
    pub const fn in_range(self) -> bool { self.0 <= MAX_PROTOCOL_ID }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

impl From<u16> for ProtocolId {
    fn from(value: u16) -> Self { Self(value) }
}

/// Bitmap of protocol identifiers.
///
/// Used both for "headers present in this frame" and for the set of
/// protocols an analyzer subscribes to.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ProtocolSet([u64; SET_WORDS]);

impl ProtocolSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self { Self([0; SET_WORDS]) }

    /// Add `id` to the set.
    ///
    /// Returns `false` when `id` lies outside the supported range; such ids
    /// are never members.
    pub fn insert(&mut self, id: ProtocolId) -> bool {
        if !id.in_range() {
            return false;
        }
        let (word, bit) = Self::slot(id);
        self.0[word] |= bit;
        true
    }

    /// Builder-style insertion.
    #[must_use]
    pub fn with(mut self, id: ProtocolId) -> Self {
        self.insert(id);
        self
    }

    /// Whether `id` is a member.
    #[must_use]
    pub fn contains(&self, id: ProtocolId) -> bool {
        if !id.in_range() {
            return false;
        }
        let (word, bit) = Self::slot(id);
        self.0[word] & bit != 0
    }

    /// Whether the two sets share at least one member.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.0.iter().zip(other.0.iter()).any(|(a, b)| a & b != 0)
    }

    /// Whether the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.iter().all(|word| *word == 0) }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize { self.0.iter().map(|word| word.count_ones() as usize).sum() }

    /// Iterate members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = ProtocolId> + '_ {
        (0..=MAX_PROTOCOL_ID)
            .map(ProtocolId::new)
            .filter(|id| self.contains(*id))
    }

    fn slot(id: ProtocolId) -> (usize, u64) {
        let raw = usize::from(id.get());
        (raw / 64, 1_u64 << (raw % 64))
    }
}

impl FromIterator<ProtocolId> for ProtocolSet {
    fn from_iter<T: IntoIterator<Item = ProtocolId>>(iter: T) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl fmt::Debug for ProtocolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_set().entries(self.iter()).finish() }
}

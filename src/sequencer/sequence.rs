//! Accumulated state of one in-flight reassembly.

use std::{collections::BTreeMap, fmt};

use bytes::{Bytes, BytesMut};

use super::SequenceError;
use crate::frame::Timestamp;

/// Opaque key grouping the fragments of one flow or datagram.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowHash(u64);

impl FlowHash {
    /// Wrap a caller-computed hash.
    #[must_use]
    pub const fn new(raw: u64) -> Self { Self(raw) }

    /// Raw hash value.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

impl fmt::Display for FlowHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:016x}", self.0) }
}

/// One member of a sequence: where its payload sits and, optionally, the
/// payload itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub frame_number: u64,
    pub timestamp: Timestamp,
    /// Offset of the payload relative to the start of the sequence.
    pub offset: usize,
    pub length: usize,
    /// Payload bytes. Read modes that never materialise the flow leave this
    /// empty and only track lengths.
    pub data: Option<Bytes>,
    /// Whether this fragment is known to terminate the sequence.
    pub last: bool,
}

impl Fragment {
    /// Fragment carrying `data` at `offset`.
    #[must_use]
    pub fn with_data(frame_number: u64, timestamp: Timestamp, offset: usize, data: Bytes) -> Self {
        Self {
            frame_number,
            timestamp,
            offset,
            length: data.len(),
            data: Some(data),
            last: false,
        }
    }

    /// Fragment that only records its extent.
    #[must_use]
    pub const fn without_data(
        frame_number: u64,
        timestamp: Timestamp,
        offset: usize,
        length: usize,
    ) -> Self {
        Self {
            frame_number,
            timestamp,
            offset,
            length,
            data: None,
            last: false,
        }
    }

    /// Mark the fragment as the final one.
    #[must_use]
    pub fn last(mut self) -> Self {
        self.last = true;
        self
    }

    /// Offset one past the payload end.
    #[must_use]
    pub const fn end(&self) -> usize { self.offset + self.length }
}

/// Progress flags of a [`FragmentSequence`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequenceFlags {
    pub has_first: bool,
    pub has_last: bool,
    pub has_all: bool,
}

/// State of one reassembly, keyed by [`FlowHash`].
///
/// Members are kept in arrival order; [`reassemble`](Self::reassemble)
/// lays them out by offset. Members tracked without data are merged into
/// extents as they touch, so streamed flows keep a handful of members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentSequence {
    hash: FlowHash,
    generation: u64,
    members: Vec<Fragment>,
    /// Disjoint covered ranges, start to end.
    covered: BTreeMap<usize, usize>,
    total_length: Option<usize>,
    accumulated: usize,
    flags: SequenceFlags,
    started_at: Timestamp,
    deadline: Timestamp,
}

impl FragmentSequence {
    pub(crate) fn new(
        hash: FlowHash,
        generation: u64,
        started_at: Timestamp,
        deadline: Timestamp,
    ) -> Self {
        Self {
            hash,
            generation,
            members: Vec::new(),
            covered: BTreeMap::new(),
            total_length: None,
            accumulated: 0,
            flags: SequenceFlags::default(),
            started_at,
            deadline,
        }
    }

    /// Key of this sequence.
    #[must_use]
    pub const fn hash(&self) -> FlowHash { self.hash }

    pub(crate) const fn generation(&self) -> u64 { self.generation }

    /// Members in arrival order.
    #[must_use]
    pub fn members(&self) -> &[Fragment] { &self.members }

    /// Expected total length, once known.
    #[must_use]
    pub const fn total_length(&self) -> Option<usize> { self.total_length }

    /// Number of distinct offsets covered by members. Overlapping bytes
    /// count once.
    #[must_use]
    pub const fn accumulated(&self) -> usize { self.accumulated }

    /// Progress flags.
    #[must_use]
    pub const fn flags(&self) -> SequenceFlags { self.flags }

    /// Processing time at which the sequence was created.
    #[must_use]
    pub const fn started_at(&self) -> Timestamp { self.started_at }

    /// Processing time at which the sequence is evicted if still incomplete.
    #[must_use]
    pub const fn deadline(&self) -> Timestamp { self.deadline }

    /// Complete iff the accumulated length matches the known total and the
    /// last fragment has been seen.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.flags.has_last && self.total_length == Some(self.accumulated)
    }

    /// Whether `fragment` repeats an existing member or adds no new bytes
    /// and no end marker.
    pub(crate) fn is_duplicate(&self, fragment: &Fragment) -> bool {
        let exact = self
            .members
            .iter()
            .any(|m| m.offset == fragment.offset && m.length == fragment.length);
        exact
            || (!fragment.last
                && fragment.length > 0
                && self.uncovered(fragment.offset, fragment.end()) == 0)
    }

    /// Offset one past the furthest covered byte.
    fn covered_end(&self) -> usize {
        self.covered.last_key_value().map_or(0, |(_, end)| *end)
    }

    /// Number of bytes in `start..end` not covered by any member.
    fn uncovered(&self, start: usize, end: usize) -> usize {
        let mut missing = end.saturating_sub(start);
        for (&from, &to) in self.covered.range(..end).rev() {
            if to <= start {
                break;
            }
            missing -= to.min(end) - from.max(start);
        }
        missing
    }

    fn cover(&mut self, mut start: usize, mut end: usize) {
        if start >= end {
            return;
        }
        loop {
            let Some((&from, &to)) = self.covered.range(..=end).next_back() else {
                break;
            };
            if to < start {
                break;
            }
            self.covered.remove(&from);
            start = start.min(from);
            end = end.max(to);
        }
        self.covered.insert(start, end);
    }

    /// Validate a prospective member against the known total and `limit`.
    pub(crate) fn check_fits(&self, fragment: &Fragment, limit: usize) -> Result<(), SequenceError> {
        let bound = self.total_length.map_or(limit, |total| total.min(limit));
        let end = fragment.end();
        if end > bound {
            return Err(SequenceError::LengthOverrun {
                hash: self.hash,
                end,
                limit: bound,
            });
        }
        if fragment.last {
            self.check_total(fragment.end())?;
        }
        Ok(())
    }

    pub(crate) fn check_total(&self, proposed: usize) -> Result<(), SequenceError> {
        match self.total_length {
            Some(existing) if existing != proposed => Err(SequenceError::TotalLengthConflict {
                hash: self.hash,
                existing,
                proposed,
            }),
            _ if proposed < self.covered_end() => Err(SequenceError::LengthOverrun {
                hash: self.hash,
                end: self.covered_end(),
                limit: proposed,
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn push(&mut self, fragment: Fragment) {
        if self.members.is_empty() {
            self.flags.has_first = true;
        }
        if fragment.last {
            self.total_length = Some(fragment.end());
            self.flags.has_last = true;
        }
        let (start, end) = (fragment.offset, fragment.end());
        self.accumulated += self.uncovered(start, end);
        self.cover(start, end);
        self.merge_or_append(fragment);
        self.flags.has_all = self.is_complete();
    }

    fn merge_or_append(&mut self, fragment: Fragment) {
        if fragment.data.is_none()
            && let Some(extent) = self.members.iter_mut().find(|m| {
                m.data.is_none() && m.offset <= fragment.end() && fragment.offset <= m.end()
            })
        {
            let end = extent.end().max(fragment.end());
            extent.offset = extent.offset.min(fragment.offset);
            extent.length = end - extent.offset;
            extent.last |= fragment.last;
            return;
        }
        self.members.push(fragment);
    }

    pub(crate) fn set_total(&mut self, total: usize, last: bool) {
        self.total_length = Some(total);
        self.flags.has_last |= last;
        self.flags.has_all = self.is_complete();
    }

    /// Lay the members out by offset into one contiguous buffer.
    ///
    /// Where members overlap, bytes already laid out win. The result
    /// covers `0..total_length`, or up to the highest member end when the
    /// total is still unknown.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::MissingPayload`] when a member was tracked
    /// without data and [`SequenceError::Gap`] when some offset is not
    /// covered by any member.
    pub fn reassemble(&self) -> Result<Bytes, SequenceError> {
        let end = self.total_length.unwrap_or_else(|| {
            self.members.iter().map(Fragment::end).max().unwrap_or_default()
        });
        let mut ordered: Vec<&Fragment> = self.members.iter().collect();
        // Stable sort keeps arrival order among equal offsets.
        ordered.sort_by_key(|m| m.offset);

        let mut out = BytesMut::with_capacity(end);
        for member in ordered {
            let data = member.data.as_ref().ok_or(SequenceError::MissingPayload {
                hash: self.hash,
                frame_number: member.frame_number,
            })?;
            let written = out.len();
            if member.offset > written {
                return Err(SequenceError::Gap {
                    hash: self.hash,
                    offset: written,
                });
            }
            if member.end() > written {
                let skip = written - member.offset;
                let take = member.end().min(end) - written;
                out.extend_from_slice(&data[skip..skip + take]);
            }
            if out.len() >= end {
                break;
            }
        }
        if out.len() < end {
            return Err(SequenceError::Gap {
                hash: self.hash,
                offset: out.len(),
            });
        }
        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rstest::rstest;

    use super::{FlowHash, Fragment, FragmentSequence};
    use crate::{frame::Timestamp, sequencer::SequenceError};

    fn sequence_with(parts: &[(usize, &'static str)]) -> FragmentSequence {
        let mut sequence =
            FragmentSequence::new(FlowHash::new(1), 0, Timestamp::ZERO, Timestamp::from_secs(1));
        for (index, (offset, data)) in parts.iter().enumerate() {
            sequence.push(Fragment::with_data(
                index as u64,
                Timestamp::ZERO,
                *offset,
                Bytes::from_static(data.as_bytes()),
            ));
        }
        sequence
    }

    #[test]
    fn reassembles_by_offset() {
        let sequence = sequence_with(&[(4, "cd"), (0, "ab"), (2, "xx")]);
        assert_eq!(sequence.reassemble(), Ok(Bytes::from_static(b"abxxcd")));
    }

    #[test]
    fn overlap_keeps_earlier_bytes() {
        let sequence = sequence_with(&[(0, "abcd"), (2, "XYZ")]);
        assert_eq!(sequence.reassemble(), Ok(Bytes::from_static(b"abcdZ")));
    }

    #[test]
    fn bridging_member_joins_covered_ranges() {
        let sequence = sequence_with(&[(4, "ef"), (0, "ab"), (1, "bcdefg")]);
        assert_eq!(sequence.accumulated(), 7);
        assert_eq!(sequence.reassemble(), Ok(Bytes::from_static(b"abcdefg")));
    }

    #[rstest]
    #[case::hole(&[(0, "ab"), (4, "cd")], 2)]
    #[case::missing_start(&[(2, "cd")], 0)]
    fn gaps_are_reported(#[case] parts: &[(usize, &'static str)], #[case] offset: usize) {
        let sequence = sequence_with(parts);
        assert_eq!(
            sequence.reassemble(),
            Err(SequenceError::Gap {
                hash: FlowHash::new(1),
                offset,
            })
        );
    }

    #[test]
    fn length_only_members_cannot_be_reassembled() {
        let mut sequence =
            FragmentSequence::new(FlowHash::new(1), 0, Timestamp::ZERO, Timestamp::from_secs(1));
        sequence.push(Fragment::without_data(7, Timestamp::ZERO, 0, 3));
        assert!(matches!(
            sequence.reassemble(),
            Err(SequenceError::MissingPayload { frame_number: 7, .. })
        ));
    }
}

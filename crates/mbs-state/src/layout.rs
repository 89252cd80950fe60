//! Global vector layout computed when the system reaches `Model`.
//!
//! Each pool (Q, U, Z, QErr, UErr, UDotErr) is laid out by walking the
//! subsystems in registration order and appending each subsystem's block:
//!
//! ```text
//! Y    = [ Q(s0) Q(s1) … | U(s0) U(s1) … | Z(s0) Z(s1) … ]
//! YErr = [ QErr(s0) QErr(s1) … | UErr(s0) UErr(s1) … ]
//! ```
//!
//! YDot shares Y's layout and QDotDot shares Q's.  UDotErr has its own
//! per-subsystem layout but no combined super-vector.

use std::ops::Range;

use crate::slot::SubsystemSlot;

/// One subsystem's block inside a pool.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    pub start: usize,
    pub len:   usize,
}

impl Segment {
    #[inline]
    pub fn range(self) -> Range<usize> {
        self.start..self.start + self.len
    }

    /// The same block shifted by `offset` (e.g. U's position within Y).
    #[inline]
    pub fn shifted(self, offset: usize) -> Segment {
        Segment { start: self.start + offset, len: self.len }
    }
}

/// Per-subsystem segments of a single pool, in registration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct BlockLayout {
    segments: Vec<Segment>,
    total:    usize,
}

impl BlockLayout {
    pub(crate) fn from_lengths(lengths: impl IntoIterator<Item = usize>) -> Self {
        let mut total = 0;
        let segments = lengths
            .into_iter()
            .map(|len| {
                let seg = Segment { start: total, len };
                total += len;
                seg
            })
            .collect();
        Self { segments, total }
    }

    #[inline]
    pub(crate) fn total(&self) -> usize {
        self.total
    }

    #[inline]
    pub(crate) fn segment(&self, subsys: usize) -> Segment {
        self.segments[subsys]
    }

    pub(crate) fn lengths(&self) -> impl Iterator<Item = usize> + '_ {
        self.segments.iter().map(|s| s.len)
    }
}

/// Layout of every global pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct GlobalLayout {
    pub(crate) q:       BlockLayout,
    pub(crate) u:       BlockLayout,
    pub(crate) z:       BlockLayout,
    pub(crate) qerr:    BlockLayout,
    pub(crate) uerr:    BlockLayout,
    pub(crate) udoterr: BlockLayout,
}

impl GlobalLayout {
    pub(crate) fn from_slots(slots: &[SubsystemSlot]) -> Self {
        Self {
            q:       BlockLayout::from_lengths(slots.iter().map(|s| s.q.len())),
            u:       BlockLayout::from_lengths(slots.iter().map(|s| s.u.len())),
            z:       BlockLayout::from_lengths(slots.iter().map(|s| s.z.len())),
            qerr:    BlockLayout::from_lengths(slots.iter().map(|s| s.nqerr)),
            uerr:    BlockLayout::from_lengths(slots.iter().map(|s| s.nuerr)),
            udoterr: BlockLayout::from_lengths(slots.iter().map(|s| s.nudoterr)),
        }
    }

    #[inline]
    pub(crate) fn ny(&self) -> usize {
        self.q.total() + self.u.total() + self.z.total()
    }

    #[inline]
    pub(crate) fn nyerr(&self) -> usize {
        self.qerr.total() + self.uerr.total()
    }

    /// Offsets of the Q, U and Z blocks within Y.
    #[inline]
    pub(crate) fn q_start(&self) -> usize {
        0
    }

    #[inline]
    pub(crate) fn u_start(&self) -> usize {
        self.q.total()
    }

    #[inline]
    pub(crate) fn z_start(&self) -> usize {
        self.q.total() + self.u.total()
    }

    #[inline]
    pub(crate) fn qerr_start(&self) -> usize {
        0
    }

    #[inline]
    pub(crate) fn uerr_start(&self) -> usize {
        self.qerr.total()
    }

    /// Build Y from the slots' authoritative values.
    pub(crate) fn gather_y(&self, slots: &[SubsystemSlot]) -> Vec<f64> {
        let mut y = Vec::with_capacity(self.ny());
        y.extend(slots.iter().flat_map(|s| s.q.iter().copied()));
        y.extend(slots.iter().flat_map(|s| s.u.iter().copied()));
        y.extend(slots.iter().flat_map(|s| s.z.iter().copied()));
        y
    }

    /// Copy Y back into the slots before the layout is discarded.
    pub(crate) fn scatter_y(&self, y: &[f64], slots: &mut [SubsystemSlot]) {
        for (i, slot) in slots.iter_mut().enumerate() {
            let q = self.q.segment(i).shifted(self.q_start());
            let u = self.u.segment(i).shifted(self.u_start());
            let z = self.z.segment(i).shifted(self.z_start());
            slot.q.copy_from_slice(&y[q.range()]);
            slot.u.copy_from_slice(&y[u.range()]);
            slot.z.copy_from_slice(&y[z.range()]);
        }
    }
}

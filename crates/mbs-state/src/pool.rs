//! Global storage pools that exist only while the system is at or above
//! `Model`.
//!
//! | Pool              | Contents                                                  |
//! |-------------------|-----------------------------------------------------------|
//! | [`VariablePool`]  | Y = [Q\|U\|Z] (state), QDot, UDot, ZDot, QDotDot          |
//! | [`ErrorPool`]     | QErr, UErr, UDotErr                                       |
//!
//! Every cache block is a [`SegmentedCache`]: one `RefCell` per subsystem,
//! created empty and sized on first touch, which may happen through a shared
//! `&State` read.  Disjoint segments borrow independently.  A view spanning
//! several segments (QDot, or YDot = [QDot|UDot|ZDot]) holds every segment's
//! borrow and works on a joined copy; a mutable one writes the copy back
//! when dropped.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::ops::{Deref, DerefMut};

use mbs_core::{StageError, StageResult, SubsystemIndex};
use tracing::trace;

use crate::layout::{BlockLayout, GlobalLayout};

// ── SegmentedCache ────────────────────────────────────────────────────────────

struct SegmentCell {
    len:  usize,
    data: RefCell<Vec<f64>>,
}

/// One cache block laid out like its [`BlockLayout`], one cell per subsystem.
pub(crate) struct SegmentedCache {
    what:  &'static str,
    fill:  f64,
    cells: Vec<SegmentCell>,
}

impl SegmentedCache {
    pub(crate) fn new(what: &'static str, block: &BlockLayout, fill: f64) -> Self {
        let cells = block
            .lengths()
            .map(|len| SegmentCell { len, data: RefCell::new(Vec::new()) })
            .collect();
        Self { what, fill, cells }
    }

    fn busy(&self) -> StageError {
        StageError::CacheBorrowed { what: self.what }
    }

    fn cell(&self, subsys: SubsystemIndex) -> StageResult<&SegmentCell> {
        let cell = self.cells.get(subsys.index()).ok_or(StageError::InvalidHandle {
            subsystem: subsys,
            what:      self.what,
            index:     subsys.index(),
        })?;
        if cell.data.try_borrow().map_err(|_| self.busy())?.len() != cell.len {
            let mut data = cell.data.try_borrow_mut().map_err(|_| self.busy())?;
            trace!(
                cache = self.what,
                subsystem = %subsys,
                len = cell.len,
                "materializing cache segment"
            );
            data.resize(cell.len, self.fill);
        }
        Ok(cell)
    }

    fn borrow(&self, subsys: SubsystemIndex) -> StageResult<Ref<'_, Vec<f64>>> {
        self.cell(subsys)?.data.try_borrow().map_err(|_| self.busy())
    }

    fn borrow_mut(&self, subsys: SubsystemIndex) -> StageResult<RefMut<'_, Vec<f64>>> {
        self.cell(subsys)?.data.try_borrow_mut().map_err(|_| self.busy())
    }

    fn subsystems(&self) -> impl Iterator<Item = SubsystemIndex> {
        (0..self.cells.len()).map(|i| SubsystemIndex(i as u32))
    }
}

/// Segments covered by a view: one subsystem's segment of each block, or
/// every segment of each block in order.
fn segments<'a>(
    blocks: &[&'a SegmentedCache],
    subsys: Option<SubsystemIndex>,
) -> Vec<(&'a SegmentedCache, SubsystemIndex)> {
    let mut out = Vec::new();
    for &block in blocks {
        match subsys {
            Some(s) => out.push((block, s)),
            None => out.extend(block.subsystems().map(|s| (block, s))),
        }
    }
    out
}

// ── Views ─────────────────────────────────────────────────────────────────────

/// Shared view of a cache vector or one subsystem's part of it.
pub struct CacheView<'a> {
    held:   Vec<Ref<'a, Vec<f64>>>,
    joined: Vec<f64>,
}

impl<'a> CacheView<'a> {
    pub(crate) fn new(
        blocks: &[&'a SegmentedCache],
        subsys: Option<SubsystemIndex>,
    ) -> StageResult<Self> {
        let held = segments(blocks, subsys)
            .into_iter()
            .map(|(block, s)| block.borrow(s))
            .collect::<StageResult<Vec<_>>>()?;
        let joined = match held.len() {
            1 => Vec::new(),
            _ => held.iter().flat_map(|seg| seg.iter().copied()).collect(),
        };
        Ok(Self { held, joined })
    }
}

impl Deref for CacheView<'_> {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        match self.held.as_slice() {
            [one] => one.as_slice(),
            _ => &self.joined,
        }
    }
}

impl fmt::Debug for CacheView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Exclusive view of a cache vector or one subsystem's part of it.
///
/// A view over several segments edits a joined copy and writes it back into
/// the segments on drop.
pub struct CacheViewMut<'a> {
    held:   Vec<RefMut<'a, Vec<f64>>>,
    joined: Vec<f64>,
}

impl<'a> CacheViewMut<'a> {
    pub(crate) fn new(
        blocks: &[&'a SegmentedCache],
        subsys: Option<SubsystemIndex>,
    ) -> StageResult<Self> {
        let held = segments(blocks, subsys)
            .into_iter()
            .map(|(block, s)| block.borrow_mut(s))
            .collect::<StageResult<Vec<_>>>()?;
        let joined = match held.len() {
            1 => Vec::new(),
            _ => held.iter().flat_map(|seg| seg.iter().copied()).collect(),
        };
        Ok(Self { held, joined })
    }
}

impl Deref for CacheViewMut<'_> {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        match self.held.as_slice() {
            [one] => one.as_slice(),
            _ => &self.joined,
        }
    }
}

impl DerefMut for CacheViewMut<'_> {
    fn deref_mut(&mut self) -> &mut [f64] {
        match self.held.as_mut_slice() {
            [one] => one.as_mut_slice(),
            _ => &mut self.joined,
        }
    }
}

impl fmt::Debug for CacheViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl Drop for CacheViewMut<'_> {
    fn drop(&mut self) {
        if self.held.len() == 1 {
            return;
        }
        let mut rest = self.joined.as_slice();
        for seg in &mut self.held {
            let (head, tail) = rest.split_at(seg.len());
            seg.copy_from_slice(head);
            rest = tail;
        }
    }
}

// ── VariablePool ──────────────────────────────────────────────────────────────

pub(crate) struct VariablePool {
    /// Continuous state, owned outright (mutated through `&mut State`).
    pub(crate) y:       Vec<f64>,
    pub(crate) qdot:    SegmentedCache,
    pub(crate) udot:    SegmentedCache,
    pub(crate) zdot:    SegmentedCache,
    pub(crate) qdotdot: SegmentedCache,
}

// ── ErrorPool ─────────────────────────────────────────────────────────────────

pub(crate) struct ErrorPool {
    pub(crate) qerr:    SegmentedCache,
    pub(crate) uerr:    SegmentedCache,
    pub(crate) udoterr: SegmentedCache,
}

// ── Assembly ──────────────────────────────────────────────────────────────────

/// Everything built when the system advances into `Model`.
pub(crate) struct Assembly {
    pub(crate) layout:    GlobalLayout,
    pub(crate) variables: VariablePool,
    pub(crate) errors:    ErrorPool,
}

impl Assembly {
    pub(crate) fn new(layout: GlobalLayout, y: Vec<f64>, fill: f64) -> Self {
        let variables = VariablePool {
            qdot:    SegmentedCache::new("qdot", &layout.q, fill),
            udot:    SegmentedCache::new("udot", &layout.u, fill),
            zdot:    SegmentedCache::new("zdot", &layout.z, fill),
            qdotdot: SegmentedCache::new("qdotdot", &layout.q, fill),
            y,
        };
        let errors = ErrorPool {
            qerr:    SegmentedCache::new("qerr", &layout.qerr, fill),
            uerr:    SegmentedCache::new("uerr", &layout.uerr, fill),
            udoterr: SegmentedCache::new("udoterr", &layout.udoterr, fill),
        };
        Self { layout, variables, errors }
    }
}

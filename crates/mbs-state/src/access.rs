//! Access to the assembled global vectors and their per-subsystem views.
//!
//! Nothing here works before the system reaches `Model`; every accessor
//! fails with `GlobalStateNotAssembled` until then.
//!
//! # State variables (`&self` / `&mut self`)
//!
//! | Accessor            | Readable at | Writing invalidates |
//! |---------------------|-------------|---------------------|
//! | `time`              | Model       | Time                |
//! | `y`                 | Model       | Position            |
//! | `q`, `q_of`         | Model       | Position            |
//! | `u`, `u_of`         | Model       | Velocity            |
//! | `z`, `z_of`         | Model       | Dynamics            |
//!
//! # Cache vectors (`&self`, interior mutability)
//!
//! | Accessor               | Readable at  | Writable at   |
//! |------------------------|--------------|---------------|
//! | `qdot`, `qdot_of`      | Velocity     | Position      |
//! | `zdot`, `zdot_of`      | Dynamics     | Velocity      |
//! | `udot`, `udot_of`      | Acceleration | Dynamics      |
//! | `ydot`                 | Acceleration | Dynamics      |
//! | `qdotdot`, `_of`       | Acceleration | Dynamics      |
//! | `qerr`, `qerr_of`      | Position     | Time          |
//! | `uerr`, `uerr_of`      | Velocity     | Position      |
//! | `yerr`                 | Velocity     | Position      |
//! | `udoterr`, `_of`       | Acceleration | Dynamics      |
//!
//! Global views are gated on the system stage; `*_of(subsys)` views are
//! gated on that subsystem's own stage.  Writing a cache never invalidates.
//! Views of different blocks or different subsystems borrow independently;
//! only overlapping views conflict with `CacheBorrowed`.

use std::ops::Range;

use mbs_core::{Stage, StageResult, SubsystemIndex};

use crate::State;
use crate::layout::{BlockLayout, GlobalLayout, Segment};
use crate::pool::{Assembly, CacheView, CacheViewMut, SegmentedCache};

// ── State-variable parts of Y ─────────────────────────────────────────────────

#[derive(Copy, Clone)]
enum Part {
    Q,
    U,
    Z,
}

impl Part {
    fn block(self, layout: &GlobalLayout) -> &BlockLayout {
        match self {
            Part::Q => &layout.q,
            Part::U => &layout.u,
            Part::Z => &layout.z,
        }
    }

    fn offset(self, layout: &GlobalLayout) -> usize {
        match self {
            Part::Q => layout.q_start(),
            Part::U => layout.u_start(),
            Part::Z => layout.z_start(),
        }
    }

    /// Range in Y (and YDot), for the whole block or one subsystem.
    fn range(self, layout: &GlobalLayout, subsys: Option<SubsystemIndex>) -> Range<usize> {
        let block = self.block(layout);
        let offset = self.offset(layout);
        match subsys {
            Some(s) => block.segment(s.index()).shifted(offset).range(),
            None => offset..offset + block.total(),
        }
    }

    /// Writing this part backs everything from this stage up.
    fn invalidates(self) -> Stage {
        match self {
            Part::Q => Stage::Position,
            Part::U => Stage::Velocity,
            Part::Z => Stage::Dynamics,
        }
    }
}

// ── Cache vectors ─────────────────────────────────────────────────────────────

#[derive(Copy, Clone)]
enum Cache {
    YDot,
    QDot,
    UDot,
    ZDot,
    QDotDot,
    YErr,
    QErr,
    UErr,
    UDotErr,
}

impl Cache {
    fn what(self) -> &'static str {
        match self {
            Cache::YDot    => "ydot",
            Cache::QDot    => "qdot",
            Cache::UDot    => "udot",
            Cache::ZDot    => "zdot",
            Cache::QDotDot => "qdotdot",
            Cache::YErr    => "yerr",
            Cache::QErr    => "qerr",
            Cache::UErr    => "uerr",
            Cache::UDotErr => "udoterr",
        }
    }

    fn readable_at(self) -> Stage {
        match self {
            Cache::QErr                 => Stage::Position,
            Cache::QDot | Cache::UErr   => Stage::Velocity,
            Cache::YErr                 => Stage::Velocity,
            Cache::ZDot                 => Stage::Dynamics,
            Cache::YDot | Cache::UDot   => Stage::Acceleration,
            Cache::QDotDot              => Stage::Acceleration,
            Cache::UDotErr              => Stage::Acceleration,
        }
    }

    /// Caches may be filled while advancing toward their stage.
    fn writable_at(self) -> Stage {
        let readable = self.readable_at();
        readable.prev().unwrap_or(readable)
    }

    /// Blocks making up the vector, in order.
    fn blocks(self, asm: &Assembly) -> Vec<&SegmentedCache> {
        let (v, e) = (&asm.variables, &asm.errors);
        match self {
            Cache::YDot    => vec![&v.qdot, &v.udot, &v.zdot],
            Cache::QDot    => vec![&v.qdot],
            Cache::UDot    => vec![&v.udot],
            Cache::ZDot    => vec![&v.zdot],
            Cache::QDotDot => vec![&v.qdotdot],
            Cache::YErr    => vec![&e.qerr, &e.uerr],
            Cache::QErr    => vec![&e.qerr],
            Cache::UErr    => vec![&e.uerr],
            Cache::UDotErr => vec![&e.udoterr],
        }
    }
}

impl State {
    // ── Dimensions ────────────────────────────────────────────────────────

    /// nq + nu + nz.
    pub fn ny(&self) -> StageResult<usize> {
        Ok(self.assembly()?.layout.ny())
    }

    pub fn nq(&self) -> StageResult<usize> {
        Ok(self.assembly()?.layout.q.total())
    }

    pub fn nu(&self) -> StageResult<usize> {
        Ok(self.assembly()?.layout.u.total())
    }

    pub fn nz(&self) -> StageResult<usize> {
        Ok(self.assembly()?.layout.z.total())
    }

    /// nqerr + nuerr.
    pub fn nyerr(&self) -> StageResult<usize> {
        Ok(self.assembly()?.layout.nyerr())
    }

    pub fn nqerr(&self) -> StageResult<usize> {
        Ok(self.assembly()?.layout.qerr.total())
    }

    pub fn nuerr(&self) -> StageResult<usize> {
        Ok(self.assembly()?.layout.uerr.total())
    }

    pub fn nudoterr(&self) -> StageResult<usize> {
        Ok(self.assembly()?.layout.udoterr.total())
    }

    /// Offset of Q within Y (always 0).
    pub fn q_start(&self) -> StageResult<usize> {
        Ok(self.assembly()?.layout.q_start())
    }

    /// Offset of U within Y.
    pub fn u_start(&self) -> StageResult<usize> {
        Ok(self.assembly()?.layout.u_start())
    }

    /// Offset of Z within Y.
    pub fn z_start(&self) -> StageResult<usize> {
        Ok(self.assembly()?.layout.z_start())
    }

    /// Offset of QErr within YErr (always 0).
    pub fn qerr_start(&self) -> StageResult<usize> {
        Ok(self.assembly()?.layout.qerr_start())
    }

    /// Offset of UErr within YErr.
    pub fn uerr_start(&self) -> StageResult<usize> {
        Ok(self.assembly()?.layout.uerr_start())
    }

    fn segment_of(
        &self,
        subsys: SubsystemIndex,
        block:  fn(&GlobalLayout) -> &BlockLayout,
    ) -> StageResult<Segment> {
        self.slot(subsys)?;
        Ok(block(&self.assembly()?.layout).segment(subsys.index()))
    }

    /// `subsys`'s block within the global Q (start is relative to Q).
    pub fn q_segment(&self, subsys: SubsystemIndex) -> StageResult<Segment> {
        self.segment_of(subsys, |l| &l.q)
    }

    /// `subsys`'s block within the global U (start is relative to U).
    pub fn u_segment(&self, subsys: SubsystemIndex) -> StageResult<Segment> {
        self.segment_of(subsys, |l| &l.u)
    }

    /// `subsys`'s block within the global Z (start is relative to Z).
    pub fn z_segment(&self, subsys: SubsystemIndex) -> StageResult<Segment> {
        self.segment_of(subsys, |l| &l.z)
    }

    pub fn qerr_segment(&self, subsys: SubsystemIndex) -> StageResult<Segment> {
        self.segment_of(subsys, |l| &l.qerr)
    }

    pub fn uerr_segment(&self, subsys: SubsystemIndex) -> StageResult<Segment> {
        self.segment_of(subsys, |l| &l.uerr)
    }

    pub fn udoterr_segment(&self, subsys: SubsystemIndex) -> StageResult<Segment> {
        self.segment_of(subsys, |l| &l.udoterr)
    }

    // ── Time ──────────────────────────────────────────────────────────────

    pub fn time(&self) -> StageResult<f64> {
        self.assembly()?;
        Ok(self.rep.time)
    }

    /// Mutable time; backs every tracker up to `Instance`.
    pub fn upd_time(&mut self) -> StageResult<&mut f64> {
        self.assembly()?;
        self.invalidate_all(Stage::Time);
        Ok(&mut self.rep.time)
    }

    // ── Continuous state ──────────────────────────────────────────────────

    /// Y = [Q | U | Z].
    pub fn y(&self) -> StageResult<&[f64]> {
        Ok(&self.assembly()?.variables.y)
    }

    /// Mutable Y; backs every tracker up to `Time` (Position − 1).
    pub fn upd_y(&mut self) -> StageResult<&mut [f64]> {
        self.assembly()?;
        self.invalidate_all(Stage::Position);
        Ok(&mut self.assembly_mut()?.variables.y)
    }

    fn part(&self, part: Part, subsys: Option<SubsystemIndex>) -> StageResult<&[f64]> {
        if let Some(s) = subsys {
            self.slot(s)?;
        }
        let asm = self.assembly()?;
        Ok(&asm.variables.y[part.range(&asm.layout, subsys)])
    }

    fn upd_part(&mut self, part: Part, subsys: Option<SubsystemIndex>) -> StageResult<&mut [f64]> {
        if let Some(s) = subsys {
            self.slot(s)?;
        }
        let range = part.range(&self.assembly()?.layout, subsys);
        self.invalidate_all(part.invalidates());
        Ok(&mut self.assembly_mut()?.variables.y[range])
    }

    /// Global Q (view into Y).
    pub fn q(&self) -> StageResult<&[f64]> {
        self.part(Part::Q, None)
    }

    /// Global U (view into Y).
    pub fn u(&self) -> StageResult<&[f64]> {
        self.part(Part::U, None)
    }

    /// Global Z (view into Y).
    pub fn z(&self) -> StageResult<&[f64]> {
        self.part(Part::Z, None)
    }

    /// Mutable global Q; backs every tracker up to `Time`.
    pub fn upd_q(&mut self) -> StageResult<&mut [f64]> {
        self.upd_part(Part::Q, None)
    }

    /// Mutable global U; backs every tracker up to `Position`.
    pub fn upd_u(&mut self) -> StageResult<&mut [f64]> {
        self.upd_part(Part::U, None)
    }

    /// Mutable global Z; backs every tracker up to `Velocity`.
    pub fn upd_z(&mut self) -> StageResult<&mut [f64]> {
        self.upd_part(Part::Z, None)
    }

    /// `subsys`'s q's, indexed by the offsets returned from `allocate_q`.
    pub fn q_of(&self, subsys: SubsystemIndex) -> StageResult<&[f64]> {
        self.part(Part::Q, Some(subsys))
    }

    pub fn u_of(&self, subsys: SubsystemIndex) -> StageResult<&[f64]> {
        self.part(Part::U, Some(subsys))
    }

    pub fn z_of(&self, subsys: SubsystemIndex) -> StageResult<&[f64]> {
        self.part(Part::Z, Some(subsys))
    }

    pub fn upd_q_of(&mut self, subsys: SubsystemIndex) -> StageResult<&mut [f64]> {
        self.upd_part(Part::Q, Some(subsys))
    }

    pub fn upd_u_of(&mut self, subsys: SubsystemIndex) -> StageResult<&mut [f64]> {
        self.upd_part(Part::U, Some(subsys))
    }

    pub fn upd_z_of(&mut self, subsys: SubsystemIndex) -> StageResult<&mut [f64]> {
        self.upd_part(Part::Z, Some(subsys))
    }

    // ── Cache vectors ─────────────────────────────────────────────────────

    fn check_cache(
        &self,
        cache:    Cache,
        subsys:   Option<SubsystemIndex>,
        required: Stage,
    ) -> StageResult<&Assembly> {
        if let Some(s) = subsys {
            self.slot(s)?;
        }
        let asm = self.assembly()?;
        match subsys {
            Some(s) => self.require_subsystem(s, cache.what(), required)?,
            None => self.require_system(cache.what(), required)?,
        }
        Ok(asm)
    }

    fn cache(&self, cache: Cache, subsys: Option<SubsystemIndex>) -> StageResult<CacheView<'_>> {
        let asm = self.check_cache(cache, subsys, cache.readable_at())?;
        CacheView::new(&cache.blocks(asm), subsys)
    }

    fn upd_cache(
        &self,
        cache:  Cache,
        subsys: Option<SubsystemIndex>,
    ) -> StageResult<CacheViewMut<'_>> {
        let asm = self.check_cache(cache, subsys, cache.writable_at())?;
        CacheViewMut::new(&cache.blocks(asm), subsys)
    }

    /// YDot = [QDot | UDot | ZDot].
    pub fn ydot(&self) -> StageResult<CacheView<'_>> {
        self.cache(Cache::YDot, None)
    }

    pub fn qdot(&self) -> StageResult<CacheView<'_>> {
        self.cache(Cache::QDot, None)
    }

    pub fn udot(&self) -> StageResult<CacheView<'_>> {
        self.cache(Cache::UDot, None)
    }

    pub fn zdot(&self) -> StageResult<CacheView<'_>> {
        self.cache(Cache::ZDot, None)
    }

    /// Separate from YDot.
    pub fn qdotdot(&self) -> StageResult<CacheView<'_>> {
        self.cache(Cache::QDotDot, None)
    }

    pub fn upd_ydot(&self) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::YDot, None)
    }

    pub fn upd_qdot(&self) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::QDot, None)
    }

    pub fn upd_udot(&self) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::UDot, None)
    }

    pub fn upd_zdot(&self) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::ZDot, None)
    }

    pub fn upd_qdotdot(&self) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::QDotDot, None)
    }

    pub fn qdot_of(&self, subsys: SubsystemIndex) -> StageResult<CacheView<'_>> {
        self.cache(Cache::QDot, Some(subsys))
    }

    pub fn udot_of(&self, subsys: SubsystemIndex) -> StageResult<CacheView<'_>> {
        self.cache(Cache::UDot, Some(subsys))
    }

    pub fn zdot_of(&self, subsys: SubsystemIndex) -> StageResult<CacheView<'_>> {
        self.cache(Cache::ZDot, Some(subsys))
    }

    pub fn qdotdot_of(&self, subsys: SubsystemIndex) -> StageResult<CacheView<'_>> {
        self.cache(Cache::QDotDot, Some(subsys))
    }

    pub fn upd_qdot_of(&self, subsys: SubsystemIndex) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::QDot, Some(subsys))
    }

    pub fn upd_udot_of(&self, subsys: SubsystemIndex) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::UDot, Some(subsys))
    }

    pub fn upd_zdot_of(&self, subsys: SubsystemIndex) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::ZDot, Some(subsys))
    }

    pub fn upd_qdotdot_of(&self, subsys: SubsystemIndex) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::QDotDot, Some(subsys))
    }

    /// YErr = [QErr | UErr].
    pub fn yerr(&self) -> StageResult<CacheView<'_>> {
        self.cache(Cache::YErr, None)
    }

    pub fn qerr(&self) -> StageResult<CacheView<'_>> {
        self.cache(Cache::QErr, None)
    }

    pub fn uerr(&self) -> StageResult<CacheView<'_>> {
        self.cache(Cache::UErr, None)
    }

    /// Separate from YErr.
    pub fn udoterr(&self) -> StageResult<CacheView<'_>> {
        self.cache(Cache::UDotErr, None)
    }

    pub fn upd_yerr(&self) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::YErr, None)
    }

    pub fn upd_qerr(&self) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::QErr, None)
    }

    pub fn upd_uerr(&self) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::UErr, None)
    }

    pub fn upd_udoterr(&self) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::UDotErr, None)
    }

    pub fn qerr_of(&self, subsys: SubsystemIndex) -> StageResult<CacheView<'_>> {
        self.cache(Cache::QErr, Some(subsys))
    }

    pub fn uerr_of(&self, subsys: SubsystemIndex) -> StageResult<CacheView<'_>> {
        self.cache(Cache::UErr, Some(subsys))
    }

    pub fn udoterr_of(&self, subsys: SubsystemIndex) -> StageResult<CacheView<'_>> {
        self.cache(Cache::UDotErr, Some(subsys))
    }

    pub fn upd_qerr_of(&self, subsys: SubsystemIndex) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::QErr, Some(subsys))
    }

    pub fn upd_uerr_of(&self, subsys: SubsystemIndex) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::UErr, Some(subsys))
    }

    pub fn upd_udoterr_of(&self, subsys: SubsystemIndex) -> StageResult<CacheViewMut<'_>> {
        self.upd_cache(Cache::UDotErr, Some(subsys))
    }
}

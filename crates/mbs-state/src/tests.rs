//! Unit tests for mbs-state.

#[cfg(test)]
mod fixtures {
    use mbs_core::{Stage, SubsystemIndex};

    use crate::State;

    /// Walk every subsystem, then the system, one rung at a time up to
    /// `target`.
    pub fn realize_to(state: &mut State, target: Stage) {
        while state.system_stage() < target {
            let next = state.system_stage().next().unwrap();
            for i in 0..state.n_subsystems() {
                let s = SubsystemIndex(i as u32);
                if state.subsystem_stage(s).unwrap() < next {
                    state.advance_subsystem_to_stage(s, next).unwrap();
                }
            }
            state.advance_system_to_stage(next).unwrap();
        }
    }

    /// Two subsystems: `a` with 3 q's and 3 u's, `b` with 2 of each.
    /// Q = [1 2 3 | 4 5], U = [10 20 30 | 40 50].
    pub fn two_bodies() -> (State, SubsystemIndex, SubsystemIndex) {
        let mut state = State::new();
        let a = state.register_subsystem("arm", "1.0");
        let b = state.register_subsystem("hand", "0.3");
        state.allocate_q(a, &[1.0, 2.0, 3.0]).unwrap();
        state.allocate_q(b, &[4.0, 5.0]).unwrap();
        state.allocate_u(a, &[10.0, 20.0, 30.0]).unwrap();
        state.allocate_u(b, &[40.0, 50.0]).unwrap();
        (state, a, b)
    }
}

#[cfg(test)]
mod allocation {
    use mbs_core::{
        DiscreteVariableIndex, QErrIndex, QIndex, Stage, StageError, SubsystemIndex, UErrIndex,
    };

    use super::fixtures::realize_to;
    use crate::{State, StateConfig};

    #[test]
    fn indices_are_offsets_into_own_block() {
        let mut state = State::new();
        let a = state.register_subsystem("a", "1");
        let b = state.register_subsystem("b", "1");
        assert_eq!(state.allocate_q(a, &[0.0; 3]).unwrap(), QIndex(0));
        assert_eq!(state.allocate_q(a, &[0.0; 2]).unwrap(), QIndex(3));
        // b's numbering is independent of a's.
        assert_eq!(state.allocate_q(b, &[0.0]).unwrap(), QIndex(0));
        assert_eq!(state.allocate_uerr(a, 2).unwrap(), UErrIndex(0));
        assert_eq!(state.allocate_uerr(a, 1).unwrap(), UErrIndex(2));

        let h0 = state.allocate_discrete_variable(a, Stage::Instance, 1_u32).unwrap();
        let h1 = state.allocate_discrete_variable(a, Stage::Instance, 2_u32).unwrap();
        assert_eq!(h0.index, DiscreteVariableIndex(0));
        assert_eq!(h1.index, DiscreteVariableIndex(1));
        assert_eq!(h1.subsystem, a);
    }

    #[test]
    fn construction_window_accepts_everything() {
        let mut state = State::new();
        let a = state.register_subsystem("a", "1");
        assert!(state.allocate_discrete_variable(a, Stage::Model, 0.5_f64).is_ok());
        assert!(state.allocate_cache_entry(a, Stage::Topology, 0_i64).is_ok());
        assert!(state.allocate_z(a, &[0.0]).is_ok());
        assert!(state.allocate_udoterr(a, 4).is_ok());
    }

    #[test]
    fn modeling_window_rejects_model_stage_values() {
        let mut state = State::new();
        let a = state.register_subsystem("a", "1");
        state.advance_subsystem_to_stage(a, Stage::Topology).unwrap();

        let err = state.allocate_discrete_variable(a, Stage::Model, 1_u8).unwrap_err();
        assert_eq!(
            err,
            StageError::AllocationAfterLock {
                subsystem:       a,
                subsystem_stage: Stage::Topology,
                what:            "discrete variable",
            }
        );
        assert!(state.allocate_cache_entry(a, Stage::Topology, 0_u8).is_err());

        // Above-Model values, continuous variables and error slots are fine.
        assert!(state.allocate_discrete_variable(a, Stage::Instance, 1_u8).is_ok());
        assert!(state.allocate_cache_entry(a, Stage::Model, 0_u8).is_ok());
        assert!(state.allocate_q(a, &[0.0]).is_ok());
        assert!(state.allocate_qerr(a, 1).is_ok());
    }

    #[test]
    fn lenient_config_accepts_late_model_values() {
        let config = StateConfig { strict_allocation_windows: false, ..StateConfig::default() };
        let mut state = State::with_config(config);
        let a = state.register_subsystem("a", "1");
        state.advance_subsystem_to_stage(a, Stage::Topology).unwrap();
        assert!(state.allocate_discrete_variable(a, Stage::Model, 1_u8).is_ok());
        assert!(state.allocate_cache_entry(a, Stage::Empty, 1_u8).is_ok());

        // The lock at Model still holds.
        state.advance_subsystem_to_stage(a, Stage::Model).unwrap();
        assert!(state.allocate_q(a, &[0.0]).is_err());
    }

    #[test]
    fn every_kind_fails_after_model() {
        let mut state = State::new();
        let a = state.register_subsystem("a", "1");
        realize_to(&mut state, Stage::Model);

        let locked = |r: Result<(), StageError>| {
            assert!(
                matches!(r, Err(StageError::AllocationAfterLock { subsystem_stage: Stage::Model, .. })),
                "expected AllocationAfterLock, got {r:?}"
            );
        };
        locked(state.allocate_q(a, &[0.0]).map(drop));
        locked(state.allocate_u(a, &[0.0]).map(drop));
        locked(state.allocate_z(a, &[0.0]).map(drop));
        locked(state.allocate_qerr(a, 1).map(drop));
        locked(state.allocate_uerr(a, 1).map(drop));
        locked(state.allocate_udoterr(a, 1).map(drop));
        locked(state.allocate_discrete_variable(a, Stage::Report, 0_u8).map(drop));
        locked(state.allocate_cache_entry(a, Stage::Report, 0_u8).map(drop));
    }

    #[test]
    fn lock_is_per_subsystem() {
        let mut state = State::new();
        let a = state.register_subsystem("a", "1");
        let b = state.register_subsystem("b", "1");
        state.advance_subsystem_to_stage(a, Stage::Topology).unwrap();
        state.advance_subsystem_to_stage(a, Stage::Model).unwrap();
        assert!(state.allocate_q(a, &[0.0]).is_err());
        assert!(state.allocate_q(b, &[0.0]).is_ok());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn index_past_u32_is_reported() {
        let mut state = State::new();
        let a = state.register_subsystem("a", "1");
        let n = u32::MAX as usize + 1;
        assert_eq!(state.allocate_qerr(a, n).unwrap(), QErrIndex(0));
        assert_eq!(
            state.allocate_qerr(a, 1).unwrap_err(),
            StageError::IndexOverflow { subsystem: a, what: "qerr", len: n }
        );
    }

    #[test]
    fn unknown_subsystem_is_invalid_handle() {
        let mut state = State::new();
        state.register_subsystem("a", "1");
        let ghost = SubsystemIndex(7);
        assert!(matches!(
            state.allocate_q(ghost, &[0.0]),
            Err(StageError::InvalidHandle { what: "subsystem", index: 7, .. })
        ));
    }
}

#[cfg(test)]
mod advance {
    use mbs_core::{Stage, StageError};

    use super::fixtures::{realize_to, two_bodies};

    #[test]
    fn subsystem_advances_one_rung_at_a_time() {
        let (mut state, a, _) = two_bodies();
        let err = state.advance_subsystem_to_stage(a, Stage::Model).unwrap_err();
        assert_eq!(
            err,
            StageError::OutOfOrderAdvance { current: Stage::Empty, requested: Stage::Model }
        );
        assert_eq!(state.subsystem_stage(a).unwrap(), Stage::Empty);
    }

    #[test]
    fn system_waits_for_slowest_subsystem() {
        let (mut state, a, b) = two_bodies();
        state.advance_subsystem_to_stage(a, Stage::Topology).unwrap();
        let err = state.advance_system_to_stage(Stage::Topology).unwrap_err();
        assert_eq!(
            err,
            StageError::SubsystemsNotReady {
                requested:       Stage::Topology,
                subsystem:       b,
                subsystem_stage: Stage::Empty,
            }
        );
        assert_eq!(state.system_stage(), Stage::Empty);
    }

    #[test]
    fn nothing_above_report() {
        let (mut state, a, _) = two_bodies();
        realize_to(&mut state, Stage::Report);
        assert!(state.advance_subsystem_to_stage(a, Stage::Report).is_err());
        assert!(state.advance_system_to_stage(Stage::Report).is_err());
    }

    #[test]
    fn assembly_waits_for_system_model() {
        let (mut state, a, b) = two_bodies();
        for s in [a, b] {
            state.advance_subsystem_to_stage(s, Stage::Topology).unwrap();
            state.advance_subsystem_to_stage(s, Stage::Model).unwrap();
        }
        state.advance_system_to_stage(Stage::Topology).unwrap();
        assert!(!state.is_assembled());
        assert_eq!(
            state.q().unwrap_err(),
            StageError::GlobalStateNotAssembled { system_stage: Stage::Topology }
        );

        state.advance_system_to_stage(Stage::Model).unwrap();
        assert!(state.is_assembled());
        assert_eq!(state.nq().unwrap(), 5);
    }

    #[test]
    fn late_registration_caps_system() {
        let (mut state, _, _) = two_bodies();
        realize_to(&mut state, Stage::Position);
        let c = state.register_subsystem("tool", "2");
        assert_eq!(state.system_stage(), Stage::Empty);
        assert!(!state.is_assembled());
        assert_eq!(state.subsystem_stage(c).unwrap(), Stage::Empty);
        assert_eq!(state.subsystem_name(c).unwrap(), "tool");
        assert_eq!(state.subsystem_version(c).unwrap(), "2");
        assert_eq!(state.n_subsystems(), 3);
    }
}

#[cfg(test)]
mod assembly {
    use mbs_core::Stage;

    use super::fixtures::{realize_to, two_bodies};
    use crate::Segment;

    #[test]
    fn q_blocks_follow_registration_order() {
        let (mut state, a, b) = two_bodies();
        realize_to(&mut state, Stage::Model);

        assert_eq!(state.nq().unwrap(), 5);
        assert_eq!(state.q_segment(a).unwrap(), Segment { start: 0, len: 3 });
        assert_eq!(state.q_segment(b).unwrap(), Segment { start: 3, len: 2 });
        assert_eq!(state.q().unwrap(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(state.q_of(b).unwrap(), &[4.0, 5.0]);
    }

    #[test]
    fn y_is_q_then_u_then_z() {
        let (mut state, a, b) = two_bodies();
        state.allocate_z(b, &[100.0]).unwrap();
        realize_to(&mut state, Stage::Model);

        assert_eq!(state.ny().unwrap(), 11);
        assert_eq!(state.u_start().unwrap(), 5);
        assert_eq!(state.z_start().unwrap(), 10);
        assert_eq!(
            state.y().unwrap(),
            &[1.0, 2.0, 3.0, 4.0, 5.0, 10.0, 20.0, 30.0, 40.0, 50.0, 100.0]
        );
        assert_eq!(state.u_of(a).unwrap(), &[10.0, 20.0, 30.0]);
        assert_eq!(state.z_of(a).unwrap(), &[] as &[f64]);
        assert_eq!(state.z_segment(b).unwrap(), Segment { start: 0, len: 1 });
    }

    #[test]
    fn yerr_is_qerr_then_uerr() {
        let (mut state, a, b) = two_bodies();
        state.allocate_qerr(a, 2).unwrap();
        state.allocate_qerr(b, 1).unwrap();
        state.allocate_uerr(b, 2).unwrap();
        state.allocate_udoterr(a, 1).unwrap();
        realize_to(&mut state, Stage::Model);

        assert_eq!(state.nqerr().unwrap(), 3);
        assert_eq!(state.nuerr().unwrap(), 2);
        assert_eq!(state.nyerr().unwrap(), 5);
        assert_eq!(state.nudoterr().unwrap(), 1);
        assert_eq!(state.qerr_start().unwrap(), 0);
        assert_eq!(state.uerr_start().unwrap(), 3);
        assert_eq!(state.qerr_segment(b).unwrap(), Segment { start: 2, len: 1 });
        assert_eq!(state.uerr_segment(a).unwrap(), Segment { start: 0, len: 0 });
        assert_eq!(state.udoterr_segment(a).unwrap(), Segment { start: 0, len: 1 });
    }

    #[test]
    fn dimensions_need_assembly() {
        let (state, _, _) = two_bodies();
        assert!(state.ny().is_err());
        assert!(state.time().is_err());
        assert!(state.ydot().is_err());
    }
}

#[cfg(test)]
mod invalidation {
    use mbs_core::{Stage, StageError};

    use super::fixtures::{realize_to, two_bodies};

    #[test]
    fn writing_q_backs_up_to_time() {
        let (mut state, a, b) = two_bodies();
        realize_to(&mut state, Stage::Acceleration);
        state.upd_q_of(a).unwrap()[0] = 9.0;
        assert_eq!(state.system_stage(), Stage::Time);
        assert_eq!(state.subsystem_stage(a).unwrap(), Stage::Time);
        assert_eq!(state.subsystem_stage(b).unwrap(), Stage::Time);
        assert_eq!(state.q().unwrap()[0], 9.0);
    }

    #[test]
    fn each_variable_has_its_own_backup_target() {
        let cases: [(&str, Stage); 5] = [
            ("time", Stage::Instance),
            ("y", Stage::Time),
            ("q", Stage::Time),
            ("u", Stage::Position),
            ("z", Stage::Velocity),
        ];
        for (which, expected) in cases {
            let (mut state, _, _) = two_bodies();
            realize_to(&mut state, Stage::Report);
            match which {
                "time" => *state.upd_time().unwrap() = 1.0,
                "y" => state.upd_y().unwrap()[0] = 1.0,
                "q" => state.upd_q().unwrap()[0] = 1.0,
                "u" => state.upd_u().unwrap()[0] = 1.0,
                _ => {
                    state.upd_z().unwrap();
                }
            }
            assert_eq!(state.system_stage(), expected, "after writing {which}");
        }
    }

    #[test]
    fn trackers_below_the_stage_are_untouched() {
        let (mut state, _, _) = two_bodies();
        realize_to(&mut state, Stage::Position);
        state.invalidate_all(Stage::Dynamics);
        assert_eq!(state.system_stage(), Stage::Position);
    }

    #[test]
    fn invalidating_empty_clamps() {
        let (mut state, a, _) = two_bodies();
        realize_to(&mut state, Stage::Velocity);
        state.invalidate_all(Stage::Empty);
        assert_eq!(state.system_stage(), Stage::Empty);
        assert_eq!(state.subsystem_stage(a).unwrap(), Stage::Empty);
        assert!(!state.is_assembled());
    }

    #[test]
    fn failed_write_does_not_invalidate() {
        let (mut state, a, _) = two_bodies();
        let h = state.allocate_discrete_variable(a, Stage::Instance, 1.0_f64).unwrap();
        realize_to(&mut state, Stage::Dynamics);
        let err = state.upd_discrete_variable::<i32>(a, h).unwrap_err();
        assert!(matches!(err, StageError::ValueTypeMismatch { .. }));
        assert_eq!(state.system_stage(), Stage::Dynamics);
    }
}

#[cfg(test)]
mod caches {
    use mbs_core::{Stage, StageError};

    use super::fixtures::{realize_to, two_bodies};
    use crate::{State, StateConfig};

    #[test]
    fn qdot_is_written_early_and_read_at_velocity() {
        let (mut state, _, _) = two_bodies();
        realize_to(&mut state, Stage::Position);

        assert_eq!(
            state.qdot().unwrap_err(),
            StageError::StageNotRealized {
                what:     "qdot",
                required: Stage::Velocity,
                current:  Stage::Position,
            }
        );
        state.upd_qdot().unwrap().copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(state.system_stage(), Stage::Position);

        realize_to(&mut state, Stage::Velocity);
        assert_eq!(&*state.qdot().unwrap(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        // QDot is the leading block of YDot.
        realize_to(&mut state, Stage::Acceleration);
        assert_eq!(&state.ydot().unwrap()[..5], &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn uncomputed_entries_are_nan_by_default() {
        let (mut state, _, _) = two_bodies();
        realize_to(&mut state, Stage::Acceleration);
        assert_eq!(state.udot().unwrap().len(), 5);
        assert!(state.udot().unwrap().iter().all(|v| v.is_nan()));
        assert_eq!(state.qdotdot().unwrap().len(), 5);
    }

    #[test]
    fn uncomputed_value_is_configurable() {
        let config = StateConfig { uncomputed_cache_value: 0.0, ..StateConfig::default() };
        let mut state = State::with_config(config);
        let a = state.register_subsystem("a", "1");
        state.allocate_qerr(a, 2).unwrap();
        realize_to(&mut state, Stage::Position);
        assert_eq!(&*state.qerr().unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn write_needs_the_stage_below() {
        let (mut state, _, _) = two_bodies();
        realize_to(&mut state, Stage::Position);
        assert!(matches!(
            state.upd_ydot(),
            Err(StageError::StageNotRealized { required: Stage::Dynamics, .. })
        ));
        assert!(state.upd_uerr().is_ok());
        assert!(state.upd_zdot().is_err());
    }

    #[test]
    fn overlapping_borrow_is_reported() {
        let (mut state, a, _) = two_bodies();
        realize_to(&mut state, Stage::Velocity);
        let guard = state.upd_qdot().unwrap();
        assert_eq!(state.qdot_of(a).unwrap_err(), StageError::CacheBorrowed { what: "qdot" });
        drop(guard);
        assert!(state.qdot_of(a).is_ok());
    }

    #[test]
    fn disjoint_blocks_borrow_independently() {
        let (mut state, _, _) = two_bodies();
        realize_to(&mut state, Stage::Position);
        state.upd_qdot().unwrap().fill(2.0);
        realize_to(&mut state, Stage::Dynamics);

        let qdot = state.qdot().unwrap();
        let mut udot = state.upd_udot().unwrap();
        for (d, &v) in udot.iter_mut().zip(qdot.iter()) {
            *d = -v;
        }
        drop(udot);
        drop(qdot);

        realize_to(&mut state, Stage::Acceleration);
        assert!(state.udot().unwrap().iter().all(|&v| v == -2.0));
    }

    #[test]
    fn subsystems_write_their_segments_together() {
        let (mut state, a, b) = two_bodies();
        realize_to(&mut state, Stage::Position);
        let mut qa = state.upd_qdot_of(a).unwrap();
        let mut qb = state.upd_qdot_of(b).unwrap();
        qa.fill(1.0);
        qb.copy_from_slice(&[4.0, 5.0]);
        drop((qa, qb));

        realize_to(&mut state, Stage::Velocity);
        assert_eq!(&*state.qdot().unwrap(), &[1.0, 1.0, 1.0, 4.0, 5.0]);
    }

    #[test]
    fn global_write_reaches_every_segment() {
        let (mut state, a, b) = two_bodies();
        realize_to(&mut state, Stage::Dynamics);
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        state.upd_ydot().unwrap().copy_from_slice(&values);

        realize_to(&mut state, Stage::Acceleration);
        assert_eq!(&*state.qdot_of(b).unwrap(), &[3.0, 4.0]);
        assert_eq!(&*state.udot_of(a).unwrap(), &[5.0, 6.0, 7.0]);
        assert_eq!(&*state.ydot().unwrap(), values.as_slice());
    }

    #[test]
    fn subsystem_view_follows_subsystem_stage() {
        let (mut state, a, b) = two_bodies();
        realize_to(&mut state, Stage::Position);
        state.advance_subsystem_to_stage(a, Stage::Velocity).unwrap();

        state.upd_qdot_of(a).unwrap().fill(7.0);
        assert_eq!(&*state.qdot_of(a).unwrap(), &[7.0, 7.0, 7.0]);
        assert!(state.qdot_of(b).is_err());
        assert!(state.qdot().is_err());
    }

    #[test]
    fn yerr_joins_qerr_and_uerr() {
        let (mut state, a, b) = two_bodies();
        state.allocate_qerr(a, 1).unwrap();
        state.allocate_uerr(b, 2).unwrap();
        realize_to(&mut state, Stage::Position);

        state.upd_qerr_of(a).unwrap()[0] = 0.5;
        state.upd_uerr_of(b).unwrap().copy_from_slice(&[1.5, 2.5]);
        realize_to(&mut state, Stage::Velocity);
        assert_eq!(&*state.yerr().unwrap(), &[0.5, 1.5, 2.5]);
        assert_eq!(&*state.uerr().unwrap(), &[1.5, 2.5]);
    }
}

#[cfg(test)]
mod values {
    use mbs_core::{
        CacheEntryHandle, CacheEntryIndex, DiscreteVariableHandle, DiscreteVariableIndex, Stage,
        StageError,
    };

    use super::fixtures::{realize_to, two_bodies};

    #[test]
    fn cache_entry_filled_at_position_read_at_velocity() {
        let (mut state, a, _) = two_bodies();
        let h = state.allocate_cache_entry(a, Stage::Velocity, 0.0_f64).unwrap();
        realize_to(&mut state, Stage::Position);

        *state.upd_cache_entry::<f64>(a, h).unwrap() = 3.5;
        assert_eq!(state.system_stage(), Stage::Position);
        assert_eq!(
            state.cache_entry::<f64>(a, h).unwrap_err(),
            StageError::StageNotRealized {
                what:     "cache entry",
                required: Stage::Velocity,
                current:  Stage::Position,
            }
        );

        realize_to(&mut state, Stage::Velocity);
        assert_eq!(*state.cache_entry::<f64>(a, h).unwrap(), 3.5);
        assert_eq!(state.cache_entry_stage(a, h).unwrap(), Stage::Velocity);
    }

    #[test]
    fn discrete_write_backs_up_past_dependent_caches() {
        let (mut state, a, _) = two_bodies();
        let mass = state.allocate_discrete_variable(a, Stage::Instance, 1.0_f64).unwrap();
        let force = state.allocate_cache_entry(a, Stage::Dynamics, 0.0_f64).unwrap();
        realize_to(&mut state, Stage::Dynamics);
        *state.upd_cache_entry::<f64>(a, force).unwrap() = 9.81;
        assert_eq!(*state.cache_entry::<f64>(a, force).unwrap(), 9.81);

        *state.upd_discrete_variable::<f64>(a, mass).unwrap() = 2.0;
        assert_eq!(state.system_stage(), Stage::Model);
        assert_eq!(state.subsystem_stage(a).unwrap(), Stage::Model);
        assert!(matches!(
            state.cache_entry::<f64>(a, force),
            Err(StageError::StageNotRealized { required: Stage::Dynamics, current: Stage::Model, .. })
        ));

        realize_to(&mut state, Stage::Instance);
        assert_eq!(*state.discrete_variable::<f64>(a, mass).unwrap(), 2.0);
    }

    #[test]
    fn wrong_type_is_reported() {
        let (mut state, a, _) = two_bodies();
        let h = state.allocate_discrete_variable(a, Stage::Instance, 1.0_f64).unwrap();
        let c = state.allocate_cache_entry(a, Stage::Instance, String::from("x")).unwrap();
        realize_to(&mut state, Stage::Instance);

        assert_eq!(
            state.discrete_variable::<i32>(a, h).unwrap_err(),
            StageError::ValueTypeMismatch {
                what:     "discrete variable",
                expected: "i32",
                actual:   "f64",
            }
        );
        assert!(matches!(
            state.cache_entry::<u8>(a, c),
            Err(StageError::ValueTypeMismatch { what: "cache entry", .. })
        ));
        assert_eq!(&*state.cache_entry::<String>(a, c).unwrap(), "x");
    }

    #[test]
    fn handle_from_another_subsystem_is_rejected() {
        let (mut state, a, b) = two_bodies();
        let h = state.allocate_discrete_variable(a, Stage::Instance, 1_u32).unwrap();
        state.allocate_discrete_variable(b, Stage::Instance, 2_u32).unwrap();
        realize_to(&mut state, Stage::Instance);

        assert_eq!(
            state.discrete_variable::<u32>(b, h).unwrap_err(),
            StageError::InvalidHandle { subsystem: b, what: "discrete variable", index: 0 }
        );
        assert_eq!(*state.discrete_variable::<u32>(a, h).unwrap(), 1);
    }

    #[test]
    fn out_of_range_handle_is_rejected() {
        let (mut state, a, _) = two_bodies();
        realize_to(&mut state, Stage::Report);
        let dv = DiscreteVariableHandle { subsystem: a, index: DiscreteVariableIndex(5) };
        let ce = CacheEntryHandle { subsystem: a, index: CacheEntryIndex(0) };
        assert!(matches!(
            state.discrete_variable::<f64>(a, dv),
            Err(StageError::InvalidHandle { index: 5, .. })
        ));
        assert!(matches!(
            state.upd_cache_entry::<f64>(a, ce),
            Err(StageError::InvalidHandle { what: "cache entry", .. })
        ));
    }

    #[test]
    fn borrowed_cache_entry_is_reported() {
        let (mut state, a, _) = two_bodies();
        let h = state.allocate_cache_entry(a, Stage::Model, vec![0_u8; 4]).unwrap();
        realize_to(&mut state, Stage::Model);
        let mut guard = state.upd_cache_entry::<Vec<u8>>(a, h).unwrap();
        guard.push(1);
        assert_eq!(
            state.cache_entry::<Vec<u8>>(a, h).unwrap_err(),
            StageError::CacheBorrowed { what: "cache entry" }
        );
        drop(guard);
        assert_eq!(state.cache_entry::<Vec<u8>>(a, h).unwrap().len(), 5);
    }
}

#[cfg(test)]
mod reassembly {
    use mbs_core::{QIndex, Stage, StageError};

    use super::fixtures::{realize_to, two_bodies};

    #[test]
    fn values_survive_dropping_below_model() {
        let (mut state, a, b) = two_bodies();
        realize_to(&mut state, Stage::Position);
        state.upd_q_of(a).unwrap().copy_from_slice(&[7.0, 8.0, 9.0]);

        state.invalidate_all(Stage::Model);
        assert_eq!(state.system_stage(), Stage::Topology);
        assert_eq!(
            state.q().unwrap_err(),
            StageError::GlobalStateNotAssembled { system_stage: Stage::Topology }
        );

        // Window 2 is open again for b.
        assert_eq!(state.allocate_q(b, &[6.0]).unwrap(), QIndex(2));
        realize_to(&mut state, Stage::Model);
        assert_eq!(state.nq().unwrap(), 6);
        assert_eq!(state.q().unwrap(), &[7.0, 8.0, 9.0, 4.0, 5.0, 6.0]);
        assert_eq!(state.u_start().unwrap(), 6);
    }

    #[test]
    fn reassembly_starts_with_fresh_caches() {
        let (mut state, _, _) = two_bodies();
        realize_to(&mut state, Stage::Velocity);
        state.upd_qdot().unwrap().fill(1.0);
        state.invalidate_all(Stage::Model);
        realize_to(&mut state, Stage::Velocity);
        assert!(state.qdot().unwrap().iter().all(|v| v.is_nan()));
    }
}

#[cfg(test)]
mod copy {
    use mbs_core::Stage;

    use super::fixtures::{realize_to, two_bodies};

    #[test]
    fn copy_keeps_state_and_drops_derived() {
        let (mut state, a, _) = two_bodies();
        let h = state.allocate_discrete_variable(a, Stage::Instance, 4_i32).unwrap();
        let c = state.allocate_cache_entry(a, Stage::Model, 1.25_f64).unwrap();
        realize_to(&mut state, Stage::Dynamics);
        state.upd_q().unwrap()[1] = -2.0;
        *state.upd_cache_entry::<f64>(a, c).unwrap() = 9.0;
        realize_to(&mut state, Stage::Dynamics);
        state.upd_udot().unwrap().fill(3.0);
        *state.upd_time().unwrap() = 0.5;
        realize_to(&mut state, Stage::Acceleration);

        let mut copy = state.clone();
        assert_eq!(copy.system_stage(), Stage::Model);
        assert_eq!(copy.subsystem_stage(a).unwrap(), Stage::Model);
        assert!(copy.is_assembled());
        assert_eq!(copy.q().unwrap(), state.q().unwrap());
        assert_eq!(copy.time().unwrap(), 0.5);
        // Cache entries start over from their allocation-time value.
        assert_eq!(*copy.cache_entry::<f64>(a, c).unwrap(), 1.25);
        assert_eq!(*state.cache_entry::<f64>(a, c).unwrap(), 9.0);

        realize_to(&mut copy, Stage::Acceleration);
        assert_eq!(*copy.discrete_variable::<i32>(a, h).unwrap(), 4);
        assert!(copy.udot().unwrap().iter().all(|v| v.is_nan()));
        assert!(state.udot().unwrap().iter().all(|&v| v == 3.0));

        // Independent storage.
        copy.upd_q().unwrap()[0] = 100.0;
        assert_eq!(state.q().unwrap()[0], 1.0);
    }

    #[test]
    fn copy_below_model_stays_put() {
        let (mut state, a, _) = two_bodies();
        state.advance_subsystem_to_stage(a, Stage::Topology).unwrap();
        let copy = state.clone();
        assert_eq!(copy.subsystem_stage(a).unwrap(), Stage::Topology);
        assert_eq!(copy.system_stage(), Stage::Empty);
        assert!(!copy.is_assembled());
    }

    #[test]
    fn copy_ignores_borrowed_entry() {
        let (mut state, a, _) = two_bodies();
        let c = state.allocate_cache_entry(a, Stage::Model, 0_u8).unwrap();
        realize_to(&mut state, Stage::Model);
        let mut guard = state.upd_cache_entry::<u8>(a, c).unwrap();
        *guard = 7;
        let copy = state.clone();
        drop(guard);
        assert_eq!(*copy.cache_entry::<u8>(a, c).unwrap(), 0);
        assert_eq!(*state.cache_entry::<u8>(a, c).unwrap(), 7);
    }
}

#[cfg(test)]
mod props {
    use mbs_core::{Stage, SubsystemIndex};
    use proptest::prelude::*;

    use super::fixtures::realize_to;
    use crate::{Segment, State};

    #[derive(Clone, Debug)]
    enum Op {
        AdvanceSubsystem(usize),
        AdvanceSystem,
        Invalidate(Stage),
    }

    fn arb_stage() -> impl Strategy<Value = Stage> {
        (0usize..Stage::ALL.len()).prop_map(|i| Stage::ALL[i])
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3).prop_map(Op::AdvanceSubsystem),
            Just(Op::AdvanceSystem),
            arb_stage().prop_map(Op::Invalidate),
        ]
    }

    proptest! {
        #[test]
        fn system_never_passes_slowest_subsystem(ops in prop::collection::vec(arb_op(), 0..60)) {
            let mut state = State::new();
            for i in 0..3 {
                let s = state.register_subsystem(format!("s{i}"), "1");
                state.allocate_q(s, &vec![i as f64; i + 1]).unwrap();
            }
            for op in ops {
                match op {
                    Op::AdvanceSubsystem(i) => {
                        let s = SubsystemIndex(i as u32);
                        if let Some(next) = state.subsystem_stage(s).unwrap().next() {
                            let _ = state.advance_subsystem_to_stage(s, next);
                        }
                    }
                    Op::AdvanceSystem => {
                        if let Some(next) = state.system_stage().next() {
                            let _ = state.advance_system_to_stage(next);
                        }
                    }
                    Op::Invalidate(stage) => state.invalidate_all(stage),
                }
                let lowest = (0..3)
                    .map(|i| state.subsystem_stage(SubsystemIndex(i)).unwrap())
                    .min()
                    .unwrap();
                prop_assert!(state.system_stage() <= lowest);
                prop_assert_eq!(state.is_assembled(), state.system_stage() >= Stage::Model);
                if state.is_assembled() {
                    prop_assert_eq!(state.y().unwrap(), &[0.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
                }
            }
        }

        #[test]
        fn blocks_are_contiguous_prefix_sums(
            lens in prop::collection::vec((0usize..4, 0usize..4, 0usize..4), 1..5),
        ) {
            let mut state = State::new();
            let ids: Vec<_> = lens
                .iter()
                .enumerate()
                .map(|(i, &(nq, nu, nz))| {
                    let s = state.register_subsystem(format!("s{i}"), "1");
                    state.allocate_q(s, &vec![i as f64; nq]).unwrap();
                    state.allocate_u(s, &vec![i as f64; nu]).unwrap();
                    state.allocate_z(s, &vec![i as f64; nz]).unwrap();
                    s
                })
                .collect();
            realize_to(&mut state, Stage::Model);

            let nq: usize = lens.iter().map(|l| l.0).sum();
            let nu: usize = lens.iter().map(|l| l.1).sum();
            let nz: usize = lens.iter().map(|l| l.2).sum();
            prop_assert_eq!(state.ny().unwrap(), nq + nu + nz);
            prop_assert_eq!(state.y().unwrap().len(), nq + nu + nz);
            prop_assert_eq!(state.u_start().unwrap(), nq);
            prop_assert_eq!(state.z_start().unwrap(), nq + nu);

            let mut start = 0;
            for (i, &s) in ids.iter().enumerate() {
                let len = lens[i].0;
                prop_assert_eq!(state.q_segment(s).unwrap(), Segment { start, len });
                prop_assert!(state.q_of(s).unwrap().iter().all(|&v| v == i as f64));
                start += len;
            }
        }
    }
}

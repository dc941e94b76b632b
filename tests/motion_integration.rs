//! Integration tests for continuous motion control
//!
//! These tests pin the two motion invariants:
//! - the inertia ramp is strictly monotonic and reaches its target exactly
//!   at the inertia boundary, for any ramp length and target
//! - pitch stays inside [-90, 90] for any rate history

use proptest::prelude::*;
use std::time::{Duration, Instant};

use tether::motion::MotionState;

fn active_state(inertia_ticks: u32) -> MotionState {
    let mut state = MotionState::new(inertia_ticks, 180.0);
    state.set_active(true);
    state
}

/// Reversing the target mid-ramp continues the ramp from the current
/// velocity: one tick after `move -1`, velocity is strictly between the
/// prior value and -1 (no instantaneous jump).
#[test]
fn test_move_reversal_ramps_instead_of_jumping() {
    let mut state = active_state(6);
    state.apply_command("move", "1");
    for _ in 0..6 {
        state.advance(Instant::now());
    }
    let before_reversal = state.velocity;
    assert!((before_reversal - 1.0).abs() < f32::EPSILON);

    state.apply_command("move", "-1");
    state.advance(Instant::now());

    assert!(state.velocity < before_reversal);
    assert!(state.velocity > -1.0);
}

proptest! {
    /// After exactly N ticks the velocity equals the target (within float
    /// epsilon), and every tick before that moves strictly toward it.
    #[test]
    fn prop_ramp_monotonic_and_exact(
        inertia_ticks in 1u32..20,
        target in -1.0f32..1.0,
    ) {
        prop_assume!(target.abs() > 1e-3);
        let mut state = active_state(inertia_ticks);
        state.apply_command("move", &target.to_string());

        let mut previous = 0.0f32;
        for _ in 0..inertia_ticks {
            state.advance(Instant::now());
            let toward = (target - previous).abs();
            let toward_now = (target - state.velocity).abs();
            // Strictly closer every tick, up to f32 resolution once the
            // residual dips below an ulp of the target.
            prop_assert!(
                toward_now < toward || toward_now < 1e-5,
                "velocity must move toward the target"
            );
            previous = state.velocity;
        }
        prop_assert!((state.velocity - target).abs() < 1e-5);

        // Further ticks hold the target.
        state.advance(Instant::now());
        prop_assert!((state.velocity - target).abs() < 1e-5);
    }

    /// Pitch stays clamped no matter the rate history.
    #[test]
    fn prop_pitch_always_within_vertical_limits(
        rates in proptest::collection::vec(-1.0f32..1.0, 1..30),
        step_millis in 10u64..2000,
    ) {
        let mut state = active_state(0);
        let base = Instant::now();
        let mut elapsed = 0u64;
        for rate in rates {
            state.apply_command("pitch", &rate.to_string());
            elapsed += step_millis;
            state.advance(base + Duration::from_millis(elapsed));
            prop_assert!(state.pitch >= -90.0 && state.pitch <= 90.0);
        }
    }
}

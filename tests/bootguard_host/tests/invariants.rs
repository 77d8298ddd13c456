// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Property-based tests for the boot-health state machine
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 4 properties
//!
//! TEST_SCOPE:
//!   - Validation only after an unbroken connectivity streak
//!   - Validated monitors never touch persisted state again
//!   - Timeout classification follows the final connectivity sample
//!   - Crash-loop budget counts unvalidated boots exactly
//!
//! TEST_SCENARIOS:
//!   - validation_requires_full_streak(): random samples, streak tracked alongside
//!   - validated_monitor_is_inert(): arbitrary polls after validation are no-ops
//!   - timeout_reason_matches_last_sample(): restarts carry the classified reason
//!   - crash_loop_fires_on_first_excess_boot(): boots 1..=max continue, max+1 restarts

use std::time::Duration;

use bootguard::{Directive, FailureReason, Millis, Restart};
use bootguard_host::{fast_config, fresh_monitor, reboot};
use proptest::prelude::*;

/// One poll: milliseconds since the previous poll, link, service.
fn arb_samples() -> impl Strategy<Value = Vec<(u64, bool, bool)>> {
    prop::collection::vec((0u64..2_000, any::<bool>(), any::<bool>()), 1..200)
}

proptest! {
    #[test]
    fn validation_requires_full_streak(
        stability in 1_000u64..5_000,
        samples in arb_samples(),
    ) {
        let config = fast_config(3, stability, u64::MAX / 2);
        let mut monitor = fresh_monitor(config);
        prop_assert_eq!(monitor.initialize(Millis(0)), Ok(Directive::Continue));

        let mut now = 0u64;
        let mut streak: Option<u64> = None;
        for (delta, link, service) in samples {
            now += delta;
            streak = if link && service {
                Some(streak.unwrap_or(now))
            } else {
                None
            };
            match monitor.poll(Millis(now), link, service) {
                Ok(Directive::Validated) => {
                    let start = streak.expect("validated without a streak");
                    prop_assert!(now - start > stability);
                    return Ok(());
                }
                Ok(Directive::Continue) => {
                    if let Some(start) = streak {
                        prop_assert!(now - start <= stability);
                    }
                }
                other => prop_assert!(false, "unexpected poll result {:?}", other),
            }
        }
    }

    #[test]
    fn validated_monitor_is_inert(samples in arb_samples()) {
        let mut monitor = fresh_monitor(fast_config(3, 100, 10_000));
        monitor.initialize(Millis(0)).expect("init");
        monitor.poll(Millis(0), true, true).expect("poll");
        let directive = monitor.poll(Millis(101), true, true);
        prop_assert_eq!(directive, Ok(Directive::Validated));

        let snapshot = monitor.store().clone();
        let mut now = 101u64;
        for (delta, link, service) in samples {
            // Far past the probation deadline as well.
            now += delta * 100;
            let directive = monitor.poll(Millis(now), link, service);
            prop_assert_eq!(directive, Ok(Directive::Continue));
        }
        prop_assert_eq!(monitor.store(), &snapshot);
        prop_assert_eq!(monitor.bootloader().rollbacks, 0);
    }

    #[test]
    fn timeout_reason_matches_last_sample(
        probation in 1_000u64..10_000,
        link in any::<bool>(),
        service in any::<bool>(),
    ) {
        // Stability longer than probation can never be met.
        let mut monitor = fresh_monitor(fast_config(3, probation * 2, probation));
        monitor.initialize(Millis(0)).expect("init");
        let directive = monitor.poll(Millis(probation), link, service);
        prop_assert_eq!(directive, Ok(Directive::Continue));

        let expected = FailureReason::classify_timeout(link, service);
        let directive = monitor
            .poll(Millis(probation + 1), link, service)
            .expect("poll");
        let restart = Restart {
            reason: expected,
            rolled_back: true,
            delay: Duration::ZERO,
        };
        prop_assert_eq!(directive, Directive::Restart(restart));
        prop_assert!(expected.is_failure());
        prop_assert_eq!(monitor.last_failure_reason(), Ok(expected));
    }

    #[test]
    fn crash_loop_fires_on_first_excess_boot(max in 1u32..8) {
        let mut monitor = fresh_monitor(fast_config(max, 1_000, 10_000));
        for boot in 1..=max {
            let directive = monitor.initialize(Millis(0));
            prop_assert_eq!(directive, Ok(Directive::Continue));
            prop_assert_eq!(monitor.boot_count(), Ok(boot));
            monitor = reboot(monitor);
        }
        let directive = monitor.initialize(Millis(0)).expect("init");
        let Directive::Restart(restart) = directive else {
            panic!("expected restart, got {directive:?}");
        };
        prop_assert_eq!(restart.reason, FailureReason::CrashLoop);
        prop_assert!(restart.rolled_back);
        prop_assert_eq!(monitor.boot_count(), Ok(0));
        prop_assert_eq!(monitor.bootloader().rollbacks, 1);
    }
}

//! Millisecond clock and periodic interval helper
//!
//! The packet loop and the bridge do periodic work (channel RSSI scans,
//! statistics) without owning a timer, so they take a [`Clock`].

/// Monotonic millisecond clock
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Fires once per period
///
/// The first check only records the starting point, so nothing fires at
/// start-up.
#[derive(Debug, Clone)]
pub struct Interval {
    period_ms: u64,
    last_ms: Option<u64>,
}

impl Interval {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            last_ms: None,
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Returns the elapsed time when the period has passed
    pub fn passed(&mut self, now_ms: u64) -> Option<u64> {
        let Some(last) = self.last_ms else {
            self.last_ms = Some(now_ms);
            return None;
        };

        let elapsed = now_ms.saturating_sub(last);
        if elapsed > self.period_ms {
            self.last_ms = Some(now_ms);
            Some(elapsed)
        } else {
            None
        }
    }
}

#[cfg(test)]
pub mod mock {
    //! Mock clock and delay for testing

    use super::*;
    use embedded_hal::delay::DelayNs;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Clock advanced by hand, or by a [`MockDelay`] sharing its counter
    #[derive(Clone, Default)]
    pub struct ManualClock {
        now: Rc<Cell<u64>>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn advance(&self, ms: u64) {
            self.now.set(self.now.get() + ms);
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> u64 {
            self.now.get()
        }
    }

    /// Delay that never sleeps, it only accounts for the time requested
    #[derive(Clone, Default)]
    pub struct MockDelay {
        total_ns: Rc<Cell<u64>>,
        clock: ManualClock,
    }

    impl MockDelay {
        pub fn new() -> Self {
            Self::default()
        }

        /// A clock that moves forward whenever this delay is used
        pub fn clock(&self) -> ManualClock {
            self.clock.clone()
        }

        /// Total delay requested so far, in milliseconds
        pub fn total_ms(&self) -> u64 {
            self.total_ns.get() / 1_000_000
        }
    }

    impl MockDelay {
        fn account(&mut self, ns: u64) {
            let before = self.total_ns.get();
            let total = before + ns;
            self.total_ns.set(total);
            self.clock.advance(total / 1_000_000 - before / 1_000_000);
        }
    }

    impl DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.account(ns as u64);
        }

        fn delay_us(&mut self, us: u32) {
            self.account(us as u64 * 1_000);
        }

        fn delay_ms(&mut self, ms: u32) {
            self.account(ms as u64 * 1_000_000);
        }
    }
}

//! Busy-Wait Spinner
//!
//! Parked threads wait by spinning on the controller's atomics, never on a
//! blocking primitive: the blocking primitives are the ones being
//! instrumented. The spinner issues `spin_loop` hints for a short burst, then
//! asks the provider to relax between checks. There is no timeout; a
//! deadlocked program spins until the driver kills it.

use super::primitives::PrimitiveProvider;

/// Checks spent in the hot spin before relaxing
const SPIN_LIMIT: u32 = 100;

/// Wait state for one handoff
#[derive(Debug, Default)]
pub struct Spinner {
    spins: u32,
}

impl Spinner {
    /// Fresh spinner
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait one step
    #[inline]
    pub fn spin<P: PrimitiveProvider>(&mut self, provider: &P) {
        if self.spins < SPIN_LIMIT {
            self.spins += 1;
            std::hint::spin_loop();
        } else {
            provider.relax();
        }
    }

    /// Spin until `done` returns `true`
    pub fn wait_until<P, F>(provider: &P, mut done: F)
    where
        P: PrimitiveProvider,
        F: FnMut() -> bool,
    {
        let mut spinner = Self::new();
        while !done() {
            spinner.spin(provider);
        }
    }

    /// Number of hot spins issued so far
    #[inline(always)]
    pub fn spins(&self) -> u32 {
        self.spins
    }
}

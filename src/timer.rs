/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! A one-shot countdown timer.

use time;

const NS_PER_MS: u64 = 1_000_000;

/// A countdown timer measured in milliseconds.
#[derive(Debug, Default)]
pub struct Timer {
    /// The clock reading (in nanoseconds) at which the countdown ends, if one
    /// has been started.
    deadline: Option<u64>,
}

impl Timer {
    /// Returns a new timer which has not been started.
    pub fn new() -> Self {
        Timer::default()
    }

    /// Starts counting down from the given number of milliseconds, replacing
    /// any countdown in progress.
    pub fn start(&mut self, ms: u32) {
        self.deadline = Some(time::precise_time_ns() + ms as u64 * NS_PER_MS);
    }

    /// Returns the number of milliseconds left in the countdown, rounded up.
    ///
    /// This is 0 once the countdown has finished or if it was never started.
    pub fn remaining(&self) -> u32 {
        match self.deadline {
            Some(deadline) => {
                let now = time::precise_time_ns();
                if now >= deadline {
                    0
                } else {
                    ((deadline - now + NS_PER_MS - 1) / NS_PER_MS) as u32
                }
            }
            None => 0,
        }
    }
}

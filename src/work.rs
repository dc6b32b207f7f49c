//! Timed workload primitives used to shape a trial between acquire and
//! release: a non-eliminable CPU burn, a cooperative yield, and a hybrid
//! park/spin sleep with sub-millisecond precision.

use std::hint::black_box;
use std::thread;
use std::time::{Duration, Instant};

/// Remaining-delay threshold below which [`sleep_micros`] stops parking the
/// thread and spins with yields instead. OS wake-ups routinely overshoot by
/// tens of microseconds, so the final tail is busy-polled to land close to
/// the target.
pub const SPIN_THRESHOLD: Duration = Duration::from_nanos(50_000);

const LCG_MULTIPLIER: u64 = 0x5DEECE66D;
const LCG_ADDEND: u64 = 0xB;

/// Burns `amount` units of CPU work that the optimizer cannot remove.
///
/// Each unit is one step of a linear-congruential recurrence; the final
/// value is routed through [`black_box`] so the whole chain stays live even
/// though nothing reads it. `consume_cpu(0)` returns immediately.
pub fn consume_cpu(amount: u64) {
    if amount == 0 {
        return;
    }
    let mut t = black_box(LCG_MULTIPLIER);
    for _ in 0..amount {
        t = t.wrapping_mul(LCG_MULTIPLIER).wrapping_add(LCG_ADDEND);
    }
    black_box(t);
}

/// Relinquishes the current thread's scheduling turn once when `flag` is set.
pub fn yield_if(flag: bool) {
    if flag {
        thread::yield_now();
    }
}

/// Blocks the calling thread for approximately `us` microseconds.
///
/// While more than [`SPIN_THRESHOLD`] remains the thread parks for the
/// remainder; the short tail is spun with [`thread::yield_now`] re-checking a
/// monotonic clock. Never returns early. Spurious unparks (for example a
/// stale token left by an unrelated `unpark`) only cause an extra pass
/// through the loop.
pub fn sleep_micros(us: u64) {
    if us == 0 {
        return;
    }
    let target = Duration::from_micros(us);
    let started = Instant::now();
    loop {
        let elapsed = started.elapsed();
        if elapsed >= target {
            return;
        }
        let remaining = target - elapsed;
        if remaining > SPIN_THRESHOLD {
            thread::park_timeout(remaining);
        } else {
            thread::yield_now();
        }
    }
}

//! Compile-time timing budgets for the encoder and the receiver.
//!
//! Everything here is `const` so that a clock/speed combination that cannot be
//! met is rejected while building, not discovered on the bench.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DshotSpeed {
    DShot150,
    DShot300,
    DShot600,
    DShot1200,
}

impl DshotSpeed {
    #[must_use]
    pub const fn baud_rate(self) -> u32 {
        match self {
            Self::DShot150 => 150_000,
            Self::DShot300 => 300_000,
            Self::DShot600 => 600_000,
            Self::DShot1200 => 1_200_000,
        }
    }

    /// Width of a `0` pulse.
    #[must_use]
    pub const fn short_pulse_nanos(self) -> u32 {
        match self {
            Self::DShot150 => 2500,
            Self::DShot300 => 1250,
            Self::DShot600 => 625,
            Self::DShot1200 => 313,
        }
    }

    /// Width of a `1` pulse.
    #[must_use]
    pub const fn long_pulse_nanos(self) -> u32 {
        self.short_pulse_nanos() * 2
    }

    #[must_use]
    pub const fn bit_period_nanos(self) -> u32 {
        div_round(1_000_000_000, self.baud_rate() as u64) as u32
    }

    /// The fastest speed a clock of `cpu_hz` comfortably handles.
    #[must_use]
    pub const fn nominal(cpu_hz: u32) -> Self {
        if cpu_hz == 16_000_000 {
            Self::DShot300
        } else {
            Self::DShot150
        }
    }
}

const fn div_round(n: u64, d: u64) -> u64 {
    (n + d / 2) / d
}

const fn nanos_to_cycles(nanos: u32, cpu_hz: u32) -> u32 {
    div_round(nanos as u64 * cpu_hz as u64, 1_000_000_000) as u32
}

const fn cycles_to_nanos(cycles: u32, cpu_hz: u32) -> u32 {
    div_round(cycles as u64 * 1_000_000_000, cpu_hz as u64) as u32
}

/// `actual` within 5% of `target`.
const fn within_tolerance(actual: u32, target: u32) -> bool {
    let error = if actual > target {
        actual - target
    } else {
        target - actual
    };
    error as u64 * 20 <= target as u64
}

/// Clock cycles of the AVR instructions on the timed paths.
pub mod ticks {
    /// Interrupt entry: push PC, clear I, vector fetch.
    pub const ISR: u32 = 5;
    pub const JMP: u32 = 3;
    pub const IJMP: u32 = 2;
    pub const RJMP: u32 = 2;
    /// `sbic`/`sbis` skipping a one-word instruction.
    pub const SKIP_1_WORD: u32 = 2;
    pub const LDI: u32 = 1;
    pub const OUT: u32 = 1;
    pub const LDS: u32 = 2;

    /// Encoder: shift, assert and branch-not-taken before delay A starts counting.
    pub const PULSE_LEAD: u32 = 3;
    /// Encoder: branch taken into delay B and the jump back.
    pub const LONG_BRANCH: u32 = 3;
    /// Encoder: de-assert, bit counter and loop jump around delay C.
    pub const BIT_LOOP: u32 = 6;
}

/// Busy-wait windows of one encoded bit, in CPU cycles.
///
/// A `0` is `on, A, off, C` and a `1` is `on, A, B, off, C`. With balancing the
/// `0` path also waits `D` after going off so both bits take the same time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PulseMath {
    pub short_cycles: u32,
    pub long_cycles: u32,
    pub period_cycles: u32,
    pub delay_a: i32,
    pub delay_b: i32,
    pub delay_c: i32,
    pub delay_d: i32,
    short_nanos: u32,
    long_nanos: u32,
    period_nanos: u32,
    cpu_hz: u32,
}

impl PulseMath {
    #[must_use]
    pub const fn new(cpu_hz: u32, speed: DshotSpeed) -> Self {
        let short_nanos = speed.short_pulse_nanos();
        let long_nanos = speed.long_pulse_nanos();
        let period_nanos = speed.bit_period_nanos();
        let short_cycles = nanos_to_cycles(short_nanos, cpu_hz);
        let long_cycles = nanos_to_cycles(long_nanos, cpu_hz);
        let period_cycles = nanos_to_cycles(period_nanos, cpu_hz);
        Self {
            short_cycles,
            long_cycles,
            period_cycles,
            delay_a: short_cycles as i32 - ticks::PULSE_LEAD as i32,
            delay_b: long_cycles as i32 - short_cycles as i32 - ticks::LONG_BRANCH as i32,
            delay_c: period_cycles as i32 - long_cycles as i32 - ticks::BIT_LOOP as i32,
            delay_d: long_cycles as i32 - short_cycles as i32,
            short_nanos,
            long_nanos,
            period_nanos,
            cpu_hz,
        }
    }

    /// # Panics
    ///
    /// Panics (at compile time when used in a `const`) if a window is negative
    /// or a pulse rounds too far from its nominal width.
    #[must_use]
    pub const fn check(self) -> Self {
        assert!(self.delay_a >= 0, "CPU too slow for the short pulse");
        assert!(self.delay_b >= 0, "CPU too slow for the long pulse");
        assert!(self.delay_c >= 0, "CPU too slow for the bit period");
        assert!(
            within_tolerance(cycles_to_nanos(self.short_cycles, self.cpu_hz), self.short_nanos),
            "short pulse rounding error exceeds 5%"
        );
        assert!(
            within_tolerance(cycles_to_nanos(self.long_cycles, self.cpu_hz), self.long_nanos),
            "long pulse rounding error exceeds 5%"
        );
        assert!(
            within_tolerance(cycles_to_nanos(self.period_cycles, self.cpu_hz), self.period_nanos),
            "bit period rounding error exceeds 5%"
        );
        self
    }

    /// A window as a cycle count, once [`check`](Self::check) has passed.
    #[must_use]
    pub const fn cycles(window: i32) -> u32 {
        if window < 0 {
            0
        } else {
            window as u32
        }
    }
}

/// Receiver budgets, in timer ticks (prescaler 1, so also CPU cycles).
///
/// The reply is sent at 5/4 of the command bit rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiveTiming {
    pub period_ticks: u32,
    pub half_period_ticks: u32,
    /// Where a sample lands, counted from the edge that starts its bit.
    ///
    /// Midway between `adjust_sync_ticks` and the end of the bit. A match
    /// earlier than `adjust_sync_ticks` would fire before the resync write and
    /// sample the same bit twice, so this leaves equal room for a slow and a
    /// fast ESC clock to drift over the edgeless bits of a GCR symbol.
    pub sample_point_ticks: u32,

    pub timeout_ticks: u32,
    /// Overflows tolerated before the reply is declared missing.
    pub timeout_overflows: u32,
    /// Counter value that makes the last overflow land on the timeout.
    pub timeout_preload: u8,

    pub ticks_from_overflow_to_isr_sample: u32,
    pub ticks_initial_spin_loop: u32,
    pub ticks_initial_spin_loop_worst_case: u32,
    pub ticks_from_transition_to_initial_timer_sync: u32,
    pub ticks_spin_loop: u32,
    pub ticks_from_transition_to_timer_sync: u32,

    pub adjust_initial_ticks: u32,
    pub adjust_sync_ticks: u32,

    /// Loaded on the start bit's falling edge: first sample one bit plus the
    /// sample point later.
    pub counter_initial: u8,
    /// Loaded on every later edge: next sample at the sample point.
    pub counter_sync: u8,
    /// Compare value for the bit-sampling mode.
    pub top: u8,
}

impl ReceiveTiming {
    #[must_use]
    pub const fn new(
        cpu_hz: u32,
        speed: DshotSpeed,
        response_timeout_us: u32,
        sample_handler_ticks: u32,
    ) -> Self {
        let cpu = cpu_hz as u64;
        let baud = speed.baud_rate() as u64;
        let period_ticks = div_round(4 * cpu, 5 * baud) as u32;
        let half_period_ticks = div_round(4 * cpu, 10 * baud) as u32;

        let timeout_ticks = (cpu * response_timeout_us as u64 / 1_000_000) as u32;
        // Full wraps after the first one; the preload shortens the first.
        let timeout_overflows = timeout_ticks.saturating_sub(1) >> 8;
        let first_wrap_ticks = timeout_ticks - (timeout_overflows << 8);

        // Interrupt entry, vector table jump, then the handler up to the pin read.
        let ticks_from_overflow_to_isr_sample = ticks::ISR + ticks::JMP + sample_handler_ticks;
        // Pin test skipping the exit, flag test not skipping, loop.
        let ticks_initial_spin_loop = ticks::SKIP_1_WORD + 1 + ticks::RJMP;
        // As above plus the overflow bookkeeping.
        let ticks_initial_spin_loop_worst_case =
            ticks::SKIP_1_WORD + ticks::SKIP_1_WORD + 1 + 1 + 1 + ticks::RJMP;
        let ticks_from_transition_to_initial_timer_sync = 1 + ticks::RJMP + ticks::LDI + ticks::OUT;
        // Pin test, done-flag load and test, loop.
        let ticks_spin_loop = 1 + ticks::LDS + 1 + ticks::RJMP;
        let ticks_from_transition_to_timer_sync = ticks::SKIP_1_WORD + ticks::OUT;

        let adjust_initial_ticks = ticks_initial_spin_loop / 2
            + ticks_from_transition_to_initial_timer_sync
            + ticks_from_overflow_to_isr_sample;
        let adjust_sync_ticks = ticks_spin_loop / 2
            + ticks_from_transition_to_timer_sync
            + ticks_from_overflow_to_isr_sample;
        let sample_point_ticks = (period_ticks + adjust_sync_ticks) / 2;

        Self {
            period_ticks,
            half_period_ticks,
            sample_point_ticks,
            timeout_ticks,
            timeout_overflows,
            timeout_preload: (first_wrap_ticks as u8).wrapping_neg(),
            ticks_from_overflow_to_isr_sample,
            ticks_initial_spin_loop,
            ticks_initial_spin_loop_worst_case,
            ticks_from_transition_to_initial_timer_sync,
            ticks_spin_loop,
            ticks_from_transition_to_timer_sync,
            adjust_initial_ticks,
            adjust_sync_ticks,
            counter_initial: (adjust_initial_ticks as u8).wrapping_sub(sample_point_ticks as u8),
            counter_sync: (period_ticks + adjust_sync_ticks).saturating_sub(sample_point_ticks) as u8,
            top: period_ticks.saturating_sub(1) as u8,
        }
    }

    /// # Panics
    ///
    /// Panics (at compile time when used in a `const`) if the receive loop
    /// cannot keep up with the reply at this clock.
    #[must_use]
    pub const fn check(self) -> Self {
        assert!(self.period_ticks < 200, "bit period too long for an 8-bit timer");
        assert!(
            self.period_ticks > self.adjust_initial_ticks,
            "bit period shorter than the initial sync latency"
        );
        assert!(
            self.half_period_ticks > self.ticks_initial_spin_loop_worst_case,
            "initial spin loop too slow for this bit rate"
        );
        assert!(
            self.ticks_initial_spin_loop_worst_case < self.ticks_initial_spin_loop * 3,
            "initial spin loop worst case is curiously large"
        );
        assert!(
            (self.counter_sync as u32) < self.period_ticks - 1,
            "edge resync would land past the compare value"
        );
        // The sample point must absorb 5% ESC clock skew over three bits
        // without an edge.
        assert!(
            (self.period_ticks.saturating_sub(self.adjust_sync_ticks)) * 10 >= self.period_ticks * 3,
            "sample window too narrow to follow ESC clock skew"
        );
        assert!(self.timeout_overflows < 256, "response timeout too long");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_table() {
        assert_eq!(DshotSpeed::DShot300.bit_period_nanos(), 3333);
        assert_eq!(DshotSpeed::DShot1200.long_pulse_nanos(), 626);
        assert_eq!(DshotSpeed::nominal(16_000_000), DshotSpeed::DShot300);
        assert_eq!(DshotSpeed::nominal(8_000_000), DshotSpeed::DShot150);
    }

    #[test]
    fn pulse_windows_at_16mhz_dshot300() {
        let math = PulseMath::new(16_000_000, DshotSpeed::DShot300).check();
        assert_eq!(math.short_cycles, 20);
        assert_eq!(math.long_cycles, 40);
        assert_eq!(math.period_cycles, 53);
        assert_eq!(math.delay_a, 17);
        assert_eq!(math.delay_b, 17);
        assert_eq!(math.delay_c, 7);
        assert_eq!(math.delay_d, 20);
    }

    #[test]
    fn same_cycle_budget_at_half_clock_and_half_speed() {
        let fast = PulseMath::new(16_000_000, DshotSpeed::DShot300);
        let slow = PulseMath::new(8_000_000, DshotSpeed::DShot150);
        assert_eq!(fast.delay_a, slow.delay_a);
        assert_eq!(fast.delay_c, slow.delay_c);
    }

    #[test]
    #[should_panic(expected = "bit period")]
    fn dshot1200_is_too_fast_for_16mhz() {
        let _ = PulseMath::new(16_000_000, DshotSpeed::DShot1200).check();
    }

    #[test]
    fn receive_budget_at_16mhz_dshot300() {
        let t = ReceiveTiming::new(16_000_000, DshotSpeed::DShot300, 50, ticks::IJMP).check();
        assert_eq!(t.period_ticks, 43);
        assert_eq!(t.half_period_ticks, 21);
        assert_eq!(t.sample_point_ticks, 29);
        assert_eq!(t.top, 42);

        assert_eq!(t.ticks_from_overflow_to_isr_sample, 10);
        assert_eq!(t.ticks_initial_spin_loop, 5);
        assert_eq!(t.ticks_initial_spin_loop_worst_case, 9);
        assert_eq!(t.ticks_spin_loop, 6);
        assert_eq!(t.adjust_initial_ticks, 17);
        assert_eq!(t.adjust_sync_ticks, 16);
        assert_eq!(t.counter_initial, 244);
        assert_eq!(t.counter_sync, 30);
    }

    #[test]
    fn resync_sample_lands_on_the_sample_point() {
        let t = ReceiveTiming::new(16_000_000, DshotSpeed::DShot300, 50, ticks::IJMP).check();
        // Detection latency, counter run-up to the compare value, ISR latency.
        let edge_to_sample = t.ticks_spin_loop / 2
            + t.ticks_from_transition_to_timer_sync
            + (u32::from(t.top) + 1 - u32::from(t.counter_sync))
            + t.ticks_from_overflow_to_isr_sample;
        assert_eq!(edge_to_sample, t.sample_point_ticks);
        // Past the resync write, so no match can slip in ahead of it.
        assert!(t.sample_point_ticks > t.adjust_sync_ticks);
        assert!(t.sample_point_ticks > t.half_period_ticks);
    }

    #[test]
    fn sample_point_leaves_room_for_skew_both_ways() {
        let t = ReceiveTiming::new(16_000_000, DshotSpeed::DShot300, 50, ticks::IJMP).check();
        // Three bits without an edge at 5% skew, either direction.
        let drift = 3 * t.period_ticks / 20;
        assert!(t.sample_point_ticks - drift >= t.adjust_sync_ticks);
        assert!(t.sample_point_ticks + drift < t.period_ticks);
    }

    #[test]
    fn timeout_preload_lands_on_the_deadline() {
        let t = ReceiveTiming::new(16_000_000, DshotSpeed::DShot300, 50, ticks::IJMP);
        assert_eq!(t.timeout_ticks, 800);
        assert_eq!(t.timeout_overflows, 3);
        assert_eq!(t.timeout_preload, 224);
        // First overflow after the preload, then one per full timer period.
        let deadline = |t: &ReceiveTiming| (256 - u32::from(t.timeout_preload)) + 256 * t.timeout_overflows;
        assert_eq!(deadline(&t), t.timeout_ticks);

        let t = ReceiveTiming::new(8_000_000, DshotSpeed::DShot150, 50, ticks::IJMP).check();
        assert_eq!(t.timeout_overflows, 1);
        assert_eq!(t.timeout_preload, 112);
        assert_eq!(t.period_ticks, 43);
        assert_eq!(deadline(&t), t.timeout_ticks);

        // Whole multiples of the timer range: a full first wrap, no extra one.
        let t = ReceiveTiming::new(16_000_000, DshotSpeed::DShot300, 16, ticks::IJMP);
        assert_eq!(t.timeout_ticks, 256);
        assert_eq!(t.timeout_overflows, 0);
        assert_eq!(t.timeout_preload, 0);
        assert_eq!(deadline(&t), 256);

        let t = ReceiveTiming::new(16_000_000, DshotSpeed::DShot300, 32, ticks::IJMP);
        assert_eq!(t.timeout_ticks, 512);
        assert_eq!(t.timeout_overflows, 1);
        assert_eq!(t.timeout_preload, 0);
        assert_eq!(deadline(&t), 512);
    }

    #[test]
    fn initial_preload_skips_the_start_bit() {
        let t = ReceiveTiming::new(16_000_000, DshotSpeed::DShot300, 50, ticks::IJMP);
        // Detection latency, counter run-up to the compare value, ISR latency.
        let to_match = (256 - u32::from(t.counter_initial)) + u32::from(t.top) + 1;
        let edge_to_sample = t.ticks_initial_spin_loop / 2
            + t.ticks_from_transition_to_initial_timer_sync
            + to_match
            + t.ticks_from_overflow_to_isr_sample;
        assert!(
            edge_to_sample.abs_diff(t.period_ticks + t.sample_point_ticks) <= 2,
            "{edge_to_sample}"
        );
    }

    #[test]
    #[should_panic(expected = "response timeout")]
    fn oversized_timeout_is_rejected() {
        let _ = ReceiveTiming::new(16_000_000, DshotSpeed::DShot300, 5_000, ticks::IJMP).check();
    }
}

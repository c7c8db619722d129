use core::arch::asm;

use crate::traits::CycleDelay;

/// Busy wait in whole CPU cycles.
///
/// Exact when `cycles` is a constant the compiler can fold, which is how the
/// encoder calls it.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsmDelay;

impl CycleDelay for AsmDelay {
    #[inline(always)]
    fn delay_cycles(&mut self, cycles: u32) {
        let mut remaining = cycles;
        // ldi (1) + n * (dec + brne) - 1 for the untaken branch: 3n cycles.
        while remaining >= 3 {
            let rounds = (remaining / 3).min(255) as u8;
            // SAFETY: register-only countdown.
            unsafe {
                asm!(
                    "1:",
                    "dec {n}",
                    "brne 1b",
                    n = inout(reg_upper) rounds => _,
                    options(nomem, nostack),
                );
            }
            remaining -= u32::from(rounds) * 3;
        }
        for _ in 0..remaining {
            // SAFETY: no operands.
            unsafe { asm!("nop", options(nomem, nostack, preserves_flags)) };
        }
    }
}

//! PIT channel 0 programming and the system tick counter.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::arch::{Cpu, PortIo};
use crate::config::TIMER_FREQUENCY;

pub const PIT_FREQUENCY: u32 = 1_193_182;
pub const PIT_CHANNEL0: u16 = 0x40;
pub const PIT_COMMAND: u16 = 0x43;
/// Channel 0, lobyte/hibyte access, mode 3 (square wave).
pub const PIT_MODE_RATE: u8 = 0x36;

pub struct Pit;

impl Pit {
    /// Reload value for `frequency`, clamped to what the 16-bit counter
    /// can hold.
    pub fn divisor(frequency: u32) -> u16 {
        let divisor = PIT_FREQUENCY / frequency.max(1);
        divisor.clamp(1, u32::from(u16::MAX)) as u16
    }

    pub fn program(ports: &mut impl PortIo, frequency: u32) -> u16 {
        let divisor = Self::divisor(frequency);
        let [low, high] = divisor.to_le_bytes();
        ports.write_u8(PIT_COMMAND, PIT_MODE_RATE);
        ports.write_u8(PIT_CHANNEL0, low);
        ports.write_u8(PIT_CHANNEL0, high);
        divisor
    }
}

/// Tick counter advanced by IRQ0.
pub struct Timer {
    ticks: AtomicU64,
    frequency: AtomicU32,
}

pub static TIMER: Timer = Timer::new(TIMER_FREQUENCY);

impl Timer {
    pub const fn new(frequency: u32) -> Self {
        Self {
            ticks: AtomicU64::new(0),
            frequency: AtomicU32::new(frequency),
        }
    }

    pub fn set_frequency(&self, frequency: u32) {
        self.frequency.store(frequency.max(1), Ordering::Relaxed);
    }

    pub fn frequency(&self) -> u32 {
        self.frequency.load(Ordering::Relaxed)
    }

    /// Returns the new tick count.
    pub fn advance(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn seconds(&self) -> u64 {
        self.ticks() / u64::from(self.frequency())
    }

    pub fn uptime_ms(&self) -> u64 {
        self.ticks() * 1000 / u64::from(self.frequency())
    }

    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        ms * u64::from(self.frequency()) / 1000
    }

    /// Halts until the counter reaches `target`.
    pub fn wait_until(&self, target: u64, cpu: &mut impl Cpu) {
        while self.ticks() < target {
            cpu.halt();
        }
    }

    pub fn wait_ticks(&self, ticks: u64, cpu: &mut impl Cpu) {
        let target = self.ticks() + ticks;
        self.wait_until(target, cpu);
    }

    pub fn sleep_ms(&self, ms: u64, cpu: &mut impl Cpu) {
        self.wait_ticks(self.ms_to_ticks(ms), cpu);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{journal, Event, MockCpu, RecordingPorts};

    #[test]
    fn programs_channel_zero() {
        let mut ports = RecordingPorts::new();
        let divisor = Pit::program(&mut ports, 100);
        assert_eq!(divisor, 11931);
        assert_eq!(
            journal(),
            [
                Event::Write { port: PIT_COMMAND, value: 0x36 },
                Event::Write { port: PIT_CHANNEL0, value: 0x9B },
                Event::Write { port: PIT_CHANNEL0, value: 0x2E },
            ]
        );
    }

    #[test]
    fn divisor_is_clamped() {
        assert_eq!(Pit::divisor(1), u16::MAX);
        assert_eq!(Pit::divisor(0), u16::MAX);
        assert_eq!(Pit::divisor(2_000_000), 1);
    }

    #[test]
    fn uptime_conversions() {
        let timer = Timer::new(100);
        for _ in 0..250 {
            timer.advance();
        }
        assert_eq!(timer.ticks(), 250);
        assert_eq!(timer.seconds(), 2);
        assert_eq!(timer.uptime_ms(), 2500);
        assert_eq!(timer.ms_to_ticks(30), 3);
    }

    #[test]
    fn waits_halt_until_target() {
        let timer = Timer::new(100);
        let mut cpu = MockCpu::ticking(&timer);
        timer.wait_ticks(5, &mut cpu);
        assert_eq!(timer.ticks(), 5);
        assert_eq!(cpu.halts, 5);

        timer.sleep_ms(100, &mut cpu);
        assert_eq!(timer.ticks(), 15);

        // target already passed
        timer.wait_until(3, &mut cpu);
        assert_eq!(cpu.halts, 15);
    }
}

//! Periodic timer driving the scan interrupt.
//!
//! The engine never owns an interrupt vector. Instead the application binds
//! its timer interrupt handler to [`crate::Hub75::on_timer`], and the engine
//! talks to the timer peripheral through this trait to arm it and to change
//! the period between interrupts.

/// Hardware timer that fires the scan interrupt.
///
/// Tick units are whatever the implementation counts in; the engine only
/// ever doubles and compares them.
pub trait Timer {
    /// Arm the periodic interrupt. Called once from configure; the timer
    /// should stay stopped until [`Timer::resume`].
    fn init(&mut self);

    /// Stop counting and return the ticks elapsed in the current period.
    fn pause(&mut self) -> u32;

    /// Start counting at `start` ticks and fire once `period` ticks have
    /// elapsed, repeating every `period` ticks afterwards.
    fn resume(&mut self, start: u32, period: u32);
}

impl<T: Timer + ?Sized> Timer for &mut T {
    fn init(&mut self) {
        T::init(self);
    }

    fn pause(&mut self) -> u32 {
        T::pause(self)
    }

    fn resume(&mut self, start: u32, period: u32) {
        T::resume(self, start, period);
    }
}

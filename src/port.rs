//! GPIO lines, port alignment, and the batched-write capability.
//!
//! A HUB75 scan spends nearly all of its time toggling the six colour lines
//! and the clock. When a group of lines lives in one GPIO port register the
//! whole group can be updated with a single register write instead of one
//! write per line, which roughly halves the time spent in the interrupt.
//!
//! [`alignment`] answers the question "can these lines be written together?"
//! once, at configuration time. The engine then branches on the answer once
//! per group rather than once per bit.

/// A single logical GPIO line, identified by its port register and the bit
/// position it occupies inside that register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Line {
    /// Port (register bank) index
    pub port: u8,
    /// Bit position within the port, `0..32`
    pub bit: u8,
}

impl Line {
    /// Number of lines in one port register.
    pub const PORT_WIDTH: u8 = 32;

    /// Create a line from its port index and bit position.
    #[must_use]
    pub const fn new(port: u8, bit: u8) -> Self {
        Self { port, bit }
    }

    /// Create a line from a flat pin number, where pins `0..32` are port 0,
    /// `32..64` port 1 and so on.
    #[must_use]
    pub const fn from_pin(pin: u16) -> Self {
        Self {
            port: (pin / Self::PORT_WIDTH as u16) as u8,
            bit: (pin % Self::PORT_WIDTH as u16) as u8,
        }
    }

    /// Single-bit mask of this line within its port register.
    #[inline]
    #[must_use]
    pub const fn mask(self) -> u32 {
        1 << (self.bit % Self::PORT_WIDTH)
    }
}

/// A group of lines found to share one port register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlignedPort {
    /// The shared port index
    pub port: u8,
    /// Bit position of the first line in the group
    pub offset: u8,
    /// Union of the bit masks of every line in the group
    pub mask: u32,
}

/// Determine whether all `lines` can be driven by one write to one port
/// register.
///
/// Returns `None` for an empty group, when the lines span more than one
/// port, when a bit position is out of range, or when two lines claim the
/// same bit (a batched write could not give them different levels).
///
/// This is only called while configuring, never from the scan interrupt.
#[must_use]
pub fn alignment(lines: &[Line]) -> Option<AlignedPort> {
    let first = lines.first()?;
    let mut mask = 0u32;
    for line in lines {
        if line.port != first.port || line.bit >= Line::PORT_WIDTH {
            return None;
        }
        if mask & line.mask() != 0 {
            return None;
        }
        mask |= line.mask();
    }
    Some(AlignedPort {
        port: first.port,
        offset: first.bit,
        mask,
    })
}

/// Spread the low bits of `value` onto `lines`: bit `i` of `value` drives
/// `lines[i]`. Lines are assumed to share one port.
#[inline]
#[must_use]
pub fn scatter(lines: &[Line], value: usize) -> u32 {
    lines
        .iter()
        .enumerate()
        .filter(|(i, _)| value & (1 << i) != 0)
        .fold(0, |bits, (_, line)| bits | line.mask())
}

/// GPIO capability injected into the scan engine.
///
/// Writes are fire-and-forget: the engine has no way to observe or recover
/// from a failed write, so none of these methods return a result.
pub trait Gpio {
    /// Put `line` in push-pull output mode.
    fn configure_output(&mut self, line: Line);

    /// Drive a single line high or low.
    fn set_level(&mut self, line: Line, high: bool);

    /// Drive every line selected by `mask` in `port` to the matching bit of
    /// `bits` with one register write. Lines outside `mask` keep their level.
    fn write_port(&mut self, port: u8, mask: u32, bits: u32);
}

impl<G: Gpio + ?Sized> Gpio for &mut G {
    fn configure_output(&mut self, line: Line) {
        G::configure_output(self, line);
    }

    #[inline]
    fn set_level(&mut self, line: Line, high: bool) {
        G::set_level(self, line, high);
    }

    #[inline]
    fn write_port(&mut self, port: u8, mask: u32, bits: u32) {
        G::write_port(self, port, mask, bits);
    }
}

/// Raw port registers that can only be written whole and never read back.
pub trait PortRegisters {
    /// Put `line` in push-pull output mode.
    fn configure_output(&mut self, line: Line);

    /// Store `value` into the output register of `port`.
    fn store(&mut self, port: u8, value: u32);
}

/// Adapts write-only [`PortRegisters`] into a [`Gpio`] by keeping a software
/// copy of the last value written to each port.
///
/// Every write is computed from the shadow plus the requested change, and
/// the shadow is updated after the store. Single-line writes go through the
/// same shadow so they never clobber a line that a batched write set.
///
/// Ports at or beyond `PORTS` are ignored.
// TODO: ports with a toggle register could drive the clock pulse as two
// toggles computed from the shadow instead of two full stores.
#[derive(Debug)]
pub struct Shadowed<R, const PORTS: usize> {
    registers: R,
    shadow: [u32; PORTS],
}

impl<R: PortRegisters, const PORTS: usize> Shadowed<R, PORTS> {
    /// Wrap `registers`, assuming every output currently reads low.
    pub const fn new(registers: R) -> Self {
        Self {
            registers,
            shadow: [0; PORTS],
        }
    }

    /// Last value written to `port`, if the port is tracked.
    #[must_use]
    pub fn shadow(&self, port: u8) -> Option<u32> {
        self.shadow.get(usize::from(port)).copied()
    }

    /// Give back the wrapped registers.
    pub fn into_inner(self) -> R {
        self.registers
    }
}

impl<R: PortRegisters, const PORTS: usize> Gpio for Shadowed<R, PORTS> {
    fn configure_output(&mut self, line: Line) {
        self.registers.configure_output(line);
    }

    #[inline]
    fn set_level(&mut self, line: Line, high: bool) {
        let bits = if high { line.mask() } else { 0 };
        self.write_port(line.port, line.mask(), bits);
    }

    #[inline]
    fn write_port(&mut self, port: u8, mask: u32, bits: u32) {
        let Some(shadow) = self.shadow.get_mut(usize::from(port)) else {
            return;
        };
        let next = (*shadow & !mask) | (bits & mask);
        self.registers.store(port, next);
        *shadow = next;
    }
}

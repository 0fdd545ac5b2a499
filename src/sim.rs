//! Simulated HUB75 panel and timer used by the unit tests.
//!
//! The panel watches its port registers the way the real shift registers
//! would: colour lines are sampled on every rising CLK edge, and the last
//! `width` columns are committed on LAT together with the row address that
//! is on the address lines when LAT falls.

extern crate std;

use std::vec::Vec;

use crate::config::Pins;
use crate::port::{Gpio, Line};
use crate::timer::Timer;

const PORTS: usize = 4;

/// One latch pulse as seen by the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Latch {
    /// Row address on the address lines when LAT fell
    pub row: usize,
    /// 6-bit colour word per column, `r1 g1 b1 r2 g2 b2` from bit 0 up
    pub columns: Vec<u8>,
    /// OE was high (LEDs off) when LAT rose
    pub blanked: bool,
}

pub(crate) struct Panel<const ADDR: usize> {
    pins: Pins<ADDR>,
    width: usize,
    pub ports: [u32; PORTS],
    pub configured: Vec<Line>,
    pub writes: usize,
    pub addr_writes: usize,
    pub shift: Vec<u8>,
    pub latches: Vec<Latch>,
    pending: Option<(Vec<u8>, bool)>,
}

impl<const ADDR: usize> Panel<ADDR> {
    pub fn new(pins: Pins<ADDR>, width: usize) -> Self {
        Self {
            pins,
            width,
            ports: [0; PORTS],
            configured: Vec::new(),
            writes: 0,
            addr_writes: 0,
            shift: Vec::new(),
            latches: Vec::new(),
            pending: None,
        }
    }

    pub fn level(&self, line: Line) -> bool {
        self.ports[usize::from(line.port)] & line.mask() != 0
    }

    fn level_in(ports: &[u32; PORTS], line: Line) -> bool {
        ports[usize::from(line.port)] & line.mask() != 0
    }

    fn address(&self) -> usize {
        self.pins
            .addr
            .iter()
            .enumerate()
            .filter(|(_, line)| self.level(**line))
            .fold(0, |row, (i, _)| row | (1 << i))
    }

    fn word(&self) -> u8 {
        self.pins
            .rgb
            .iter()
            .enumerate()
            .filter(|(_, line)| self.level(**line))
            .fold(0, |word, (i, _)| word | (1 << i))
    }

    fn apply(&mut self, port: u8, mask: u32, bits: u32) {
        let before = self.ports;
        let reg = &mut self.ports[usize::from(port)];
        *reg = (*reg & !mask) | (bits & mask);
        self.writes += 1;
        if self
            .pins
            .addr
            .iter()
            .any(|line| line.port == port && mask & line.mask() != 0)
        {
            self.addr_writes += 1;
        }

        let after = self.ports;
        let rose = |line: Line| !Self::level_in(&before, line) && Self::level_in(&after, line);
        let fell = |line: Line| Self::level_in(&before, line) && !Self::level_in(&after, line);

        if rose(self.pins.clk) {
            let word = self.word();
            self.shift.push(word);
        }
        if rose(self.pins.lat) {
            let start = self.shift.len().saturating_sub(self.width);
            let mut columns = self.shift[start..].to_vec();
            columns.resize(self.width, 0);
            let blanked = self.level(self.pins.oe);
            self.pending = Some((columns, blanked));
        }
        if fell(self.pins.lat) {
            if let Some((columns, blanked)) = self.pending.take() {
                let row = self.address();
                self.latches.push(Latch {
                    row,
                    columns,
                    blanked,
                });
            }
        }
    }
}

impl<const ADDR: usize> Gpio for Panel<ADDR> {
    fn configure_output(&mut self, line: Line) {
        self.configured.push(line);
    }

    fn set_level(&mut self, line: Line, high: bool) {
        self.apply(line.port, line.mask(), if high { line.mask() } else { 0 });
    }

    fn write_port(&mut self, port: u8, mask: u32, bits: u32) {
        self.apply(port, mask, bits);
    }
}

#[derive(Debug, Default)]
pub(crate) struct Clock {
    pub inits: usize,
    pub pauses: usize,
    pub running: bool,
    pub elapsed: u32,
    pub resumes: Vec<(u32, u32)>,
}

impl Timer for Clock {
    fn init(&mut self) {
        self.inits += 1;
    }

    fn pause(&mut self) -> u32 {
        self.pauses += 1;
        self.running = false;
        self.elapsed
    }

    fn resume(&mut self, start: u32, period: u32) {
        self.running = true;
        self.resumes.push((start, period));
    }
}

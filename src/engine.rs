//! Timer-driven scan engine.
//!
//! [`Hub75::on_timer`] is the whole real-time part of the crate. Each call
//! lights one row pair for one bitplane:
//!
//! 1. Pause the timer and restart it from zero with the current bitplane's
//!    period. Pausing first means a period shorter than the time already
//!    elapsed can never double-fire on timers without an atomic reload.
//! 2. Blank the panel (OE high) and open the latch, committing the columns
//!    shifted out by the *previous* call.
//! 3. Drive the row address, skipped when it has not changed.
//! 4. Advance the scan cursor.
//! 5. Close the latch, light the panel (OE low) and shift out one bit per
//!    column for the new row pair and bitplane.
//!
//! Data shifted out in one call is only shown from the start of the next, so
//! the display always runs one step behind the shift registers.
//!
//! # Example
//! ```rust
//! use hub75_scan::{Config, Gpio, Hub75, Line, Pins, Timer};
//! use embedded_graphics::pixelcolor::RgbColor;
//! use embedded_graphics::prelude::Point;
//!
//! # struct NoGpio;
//! # impl Gpio for NoGpio {
//! #     fn configure_output(&mut self, _: Line) {}
//! #     fn set_level(&mut self, _: Line, _: bool) {}
//! #     fn write_port(&mut self, _: u8, _: u32, _: u32) {}
//! # }
//! # struct NoTimer;
//! # impl Timer for NoTimer {
//! #     fn init(&mut self) {}
//! #     fn pause(&mut self) -> u32 { 0 }
//! #     fn resume(&mut self, _: u32, _: u32) {}
//! # }
//! let pins = Pins {
//!     oe: Line::from_pin(14),
//!     lat: Line::from_pin(15),
//!     clk: Line::from_pin(16),
//!     rgb: [1, 2, 3, 4, 5, 6].map(Line::from_pin),
//!     addr: [32, 33, 34, 35].map(Line::from_pin),
//! };
//!
//! let mut hub = Hub75::<_, _, 32, 64, 4>::new(NoGpio, NoTimer, pins);
//! hub.configure(Config::new().width(64).height(32)).unwrap();
//! hub.set_pixel(Point::new(3, 4), hub75_scan::Color::RED);
//! hub.display();
//!
//! // from the timer interrupt handler:
//! hub.on_timer();
//! ```

use core::convert::Infallible;

use bitfield::bitfield;
use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::prelude::{OriginDimensions, Point, Size};

use crate::config::{Config, ConfigError, DataBus, Layout, Pins};
use crate::framebuffer::{FrameBuffer, Rgba};
use crate::port::{scatter, AlignedPort, Gpio, Line};
use crate::scan::ScanState;
use crate::timer::Timer;
use crate::Color;

bitfield! {
    /// The six colour bits clocked out for one column.
    ///
    /// The bit layout follows the order of [`Pins::rgb`]:
    /// - Bit 5: Blue, lower half
    /// - Bit 4: Green, lower half
    /// - Bit 3: Red, lower half
    /// - Bit 2: Blue, upper half
    /// - Bit 1: Green, upper half
    /// - Bit 0: Red, upper half
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    struct DataWord(u8);
    impl Debug;
    pub blu2, set_blu2: 5;
    pub grn2, set_grn2: 4;
    pub red2, set_red2: 3;
    pub blu1, set_blu1: 2;
    pub grn1, set_grn1: 1;
    pub red1, set_red1: 0;
}

impl DataWord {
    const fn new() -> Self {
        Self(0)
    }

    #[inline(always)]
    fn set_upper(&mut self, (r, g, b): (bool, bool, bool)) {
        self.set_red1(r);
        self.set_grn1(g);
        self.set_blu1(b);
    }

    #[inline(always)]
    fn set_lower(&mut self, (r, g, b): (bool, bool, bool)) {
        self.set_red2(r);
        self.set_grn2(g);
        self.set_blu2(b);
    }
}

/// Layout and cursor of a configured engine.
#[derive(Debug)]
struct Active {
    layout: Layout,
    scan: ScanState,
    /// Period the timer was last started with
    armed: u32,
}

/// HUB75 scan engine driving a panel chain through plain GPIO.
///
/// # Type Parameters
/// - `G`: GPIO capability, see [`Gpio`]
/// - `T`: scan interrupt timer, see [`Timer`]
/// - `ROWS`: framebuffer row capacity
/// - `COLS`: framebuffer column capacity
/// - `ADDR`: number of row address lines
///
/// The framebuffer lives inside the engine, so large panels usually want the
/// engine in a `static`. The application shares it between its interrupt
/// handler and the rest of the program with whatever mutex it already uses.
pub struct Hub75<G, T, const ROWS: usize, const COLS: usize, const ADDR: usize> {
    gpio: G,
    timer: T,
    pins: Pins<ADDR>,
    fb: FrameBuffer<ROWS, COLS>,
    active: Option<Active>,
    running: bool,
    elapsed: u32,
}

impl<G, T, const ROWS: usize, const COLS: usize, const ADDR: usize> Hub75<G, T, ROWS, COLS, ADDR>
where
    G: Gpio,
    T: Timer,
{
    /// Create an engine. Nothing is touched until [`Hub75::configure`].
    pub const fn new(gpio: G, timer: T, pins: Pins<ADDR>) -> Self {
        Self {
            gpio,
            timer,
            pins,
            fb: FrameBuffer::new(),
            active: None,
            running: false,
            elapsed: 0,
        }
    }

    /// Validate `config`, initialise every line and the shift registers,
    /// clear the framebuffer and arm the timer.
    ///
    /// The timer is left paused; call [`Hub75::display`] to start scanning.
    /// Reconfiguring a running engine pauses it first.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] without touching any line, the timer, the
    /// framebuffer or the current scan state.
    pub fn configure(&mut self, config: Config) -> Result<(), ConfigError> {
        let layout = Layout::resolve(&config, &self.pins, ROWS, COLS).inspect_err(|err| {
            warn!("hub75: configuration rejected: {}", err);
        })?;

        if self.running {
            self.timer.pause();
            self.running = false;
        }

        for line in self.pins.all() {
            self.gpio.configure_output(line);
        }
        initialize(&mut self.gpio, &self.pins, &layout);
        self.fb.resize(layout.width, layout.height);

        debug!(
            "hub75: {}x{} depth {} rows {} addr port {} clk+data port {}",
            layout.width,
            layout.height,
            layout.color_depth,
            layout.num_addr_rows,
            layout.addr_port.is_some(),
            layout.data.clk.is_some()
        );

        self.active = Some(Active {
            scan: ScanState::primed(&layout),
            armed: layout.base_period,
            layout,
        });
        self.elapsed = 0;
        self.timer.init();
        Ok(())
    }

    /// Scan interrupt handler. Call this from the timer interrupt; it does
    /// nothing until the engine is configured.
    pub fn on_timer(&mut self) {
        let Self {
            gpio,
            timer,
            pins,
            fb,
            active,
            running,
            ..
        } = self;
        let Some(Active {
            layout,
            scan,
            armed,
        }) = active
        else {
            return;
        };

        timer.pause();
        timer.resume(0, scan.period());
        *armed = scan.period();
        *running = true;

        gpio.set_level(pins.oe, true);
        gpio.set_level(pins.lat, true);

        if let Some(row) = scan.select(scan.upper_row(), layout) {
            select_row(gpio, &pins.addr, layout.addr_port, row);
        }
        scan.advance(layout);

        gpio.set_level(pins.lat, false);
        gpio.set_level(pins.oe, false);

        shift_out(gpio, pins.clk, fb, layout, scan);
    }

    /// Stop refreshing, remembering how far into the current bitplane the
    /// timer was. Does nothing unless the refresh is running.
    pub fn pause(&mut self) {
        if self.running {
            self.elapsed = self.timer.pause();
            self.running = false;
        }
    }

    /// Restart refreshing exactly where [`Hub75::pause`] stopped. Does
    /// nothing while the refresh is already running.
    pub fn resume(&mut self) {
        if self.running {
            return;
        }
        if let Some(active) = &self.active {
            self.timer.resume(self.elapsed, active.armed);
            self.running = true;
        }
    }

    /// Whether the scan timer is live.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Show the framebuffer; starts the refresh if it is not running.
    pub fn display(&mut self) {
        self.resume();
    }

    /// Set a pixel. Points outside the panel are ignored.
    pub fn set_pixel(&mut self, p: Point, color: impl Into<Rgba>) {
        self.fb.set_pixel(p, color);
    }

    /// Read a pixel back.
    #[must_use]
    pub fn get_pixel(&self, p: Point) -> Option<Rgba> {
        self.fb.get_pixel(p)
    }

    /// Set every pixel to transparent black.
    pub fn clear(&mut self) {
        self.fb.clear();
    }

    /// Panel size as `(width, height)`: the configured layout, or the
    /// framebuffer capacity before the first successful configure.
    #[must_use]
    pub fn size(&self) -> (usize, usize) {
        match &self.active {
            Some(active) => (active.layout.width, active.layout.height),
            None => (self.fb.width(), self.fb.height()),
        }
    }

    /// The framebuffer being scanned. Draw through the engine itself; its
    /// size only changes in [`Hub75::configure`].
    #[must_use]
    pub fn framebuffer(&self) -> &FrameBuffer<ROWS, COLS> {
        &self.fb
    }

    /// Layout of the current configuration.
    #[must_use]
    pub fn layout(&self) -> Option<&Layout> {
        self.active.as_ref().map(|active| &active.layout)
    }

    /// Scan cursor of the current configuration.
    #[must_use]
    pub fn scan_state(&self) -> Option<&ScanState> {
        self.active.as_ref().map(|active| &active.scan)
    }

    /// The lines this engine drives.
    #[must_use]
    pub const fn pins(&self) -> &Pins<ADDR> {
        &self.pins
    }

    /// Stop refreshing and hand back the GPIO and timer.
    pub fn release(mut self) -> (G, T) {
        self.pause();
        (self.gpio, self.timer)
    }
}

/// Drive every line to its idle level and flush the shift registers with
/// black so nothing stale is shown when output is first enabled.
fn initialize<G: Gpio, const ADDR: usize>(gpio: &mut G, pins: &Pins<ADDR>, layout: &Layout) {
    gpio.set_level(pins.oe, true);
    gpio.set_level(pins.lat, false);
    gpio.set_level(pins.clk, false);
    gpio.write_port(layout.data.port.port, layout.data.port.mask, 0);
    for line in pins.addr {
        gpio.set_level(line, false);
    }

    for _ in 0..layout.width {
        gpio.set_level(pins.clk, true);
        gpio.set_level(pins.clk, false);
    }
    gpio.set_level(pins.lat, true);
    gpio.set_level(pins.lat, false);
}

/// Put `row` on the address lines, in one write when they share a port.
#[inline]
fn select_row<G: Gpio>(gpio: &mut G, addr: &[Line], port: Option<AlignedPort>, row: usize) {
    match port {
        Some(port) => gpio.write_port(port.port, port.mask, scatter(addr, row)),
        None => {
            for (i, line) in addr.iter().enumerate() {
                gpio.set_level(*line, row & (1 << i) != 0);
            }
        }
    }
}

/// Port bits for column `x` of the current row pair and bitplane.
#[inline(always)]
fn column_bits<const ROWS: usize, const COLS: usize>(
    fb: &FrameBuffer<ROWS, COLS>,
    data: &DataBus,
    x: usize,
    scan: &ScanState,
) -> u32 {
    let mut word = DataWord::new();
    // SAFETY: the layout keeps width <= COLS and height <= ROWS, the cursor
    // keeps upper_row < lower_row < height, and color_depth <= 8.
    unsafe {
        word.set_upper(fb.rgb_bit_unchecked(x, scan.upper_row(), scan.bitplane()));
        word.set_lower(fb.rgb_bit_unchecked(x, scan.lower_row(), scan.bitplane()));
    }
    data.scatter[usize::from(word.0 & 0x3f)]
}

/// Clock one bitplane of the current row pair into the shift registers.
#[inline]
fn shift_out<G: Gpio, const ROWS: usize, const COLS: usize>(
    gpio: &mut G,
    clk: Line,
    fb: &FrameBuffer<ROWS, COLS>,
    layout: &Layout,
    scan: &ScanState,
) {
    let data = &layout.data;
    let port = data.port.port;
    let mask = data.port.mask;

    if let Some(clk_mask) = data.clk {
        // colour bits go out with CLK low, then CLK rises on its own
        for x in 0..layout.width {
            let bits = column_bits(fb, data, x, scan);
            gpio.write_port(port, mask | clk_mask, bits);
            gpio.write_port(port, clk_mask, clk_mask);
        }
        gpio.write_port(port, clk_mask, 0);
    } else {
        for x in 0..layout.width {
            let bits = column_bits(fb, data, x, scan);
            gpio.write_port(port, mask, bits);
            gpio.set_level(clk, true);
            gpio.set_level(clk, false);
            gpio.write_port(port, mask, 0);
        }
    }
}

impl<G, T, const ROWS: usize, const COLS: usize, const ADDR: usize> OriginDimensions
    for Hub75<G, T, ROWS, COLS, ADDR>
{
    fn size(&self) -> Size {
        self.fb.size()
    }
}

impl<G, T, const ROWS: usize, const COLS: usize, const ADDR: usize> DrawTarget
    for Hub75<G, T, ROWS, COLS, ADDR>
{
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        self.fb.draw_iter(pixels)
    }
}

impl<G, T, const ROWS: usize, const COLS: usize, const ADDR: usize> core::fmt::Debug
    for Hub75<G, T, ROWS, COLS, ADDR>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hub75")
            .field("pins", &self.pins)
            .field("fb", &self.fb)
            .field("layout", &self.active.as_ref().map(|active| &active.layout))
            .field("scan", &self.active.as_ref().map(|active| &active.scan))
            .field("running", &self.running)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

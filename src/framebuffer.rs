//! RGBA framebuffer read by the scan interrupt.
//!
//! The buffer owns storage for `ROWS × COLS` pixels but only the active
//! `width × height` window, chosen when the engine is configured, is scanned
//! and drawable. Pixels are stored as one packed 32-bit word each so that
//! reading one bit of all three colour channels is a single load and shift.
//!
//! # Example
//! ```rust
//! use embedded_graphics::pixelcolor::RgbColor;
//! use embedded_graphics::prelude::*;
//! use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
//! use hub75_scan::framebuffer::FrameBuffer;
//! use hub75_scan::Color;
//!
//! let mut fb = FrameBuffer::<32, 64>::new();
//! fb.resize(64, 32);
//!
//! Rectangle::new(Point::new(4, 4), Size::new(8, 8))
//!     .into_styled(PrimitiveStyle::with_fill(Color::GREEN))
//!     .draw(&mut fb)
//!     .unwrap();
//!
//! assert_eq!(fb.rgb_bit(Point::new(5, 5), 7), Some((false, true, false)));
//! ```

use core::convert::Infallible;

use bitfield::bitfield;
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::{OriginDimensions, Point, Size};

use crate::Color;

/// 8-bit-per-channel colour with alpha.
///
/// Alpha is stored but not displayed; a HUB75 panel has no notion of
/// transparency, so a fully transparent pixel shows whatever its RGB bits
/// say.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgba {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black, the value of a cleared pixel.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Create a colour from its four channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque colour.
    #[must_use]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, u8::MAX)
    }
}

impl From<Rgb888> for Rgba {
    fn from(color: Rgb888) -> Self {
        Self::opaque(color.r(), color.g(), color.b())
    }
}

impl From<Rgba> for Rgb888 {
    fn from(color: Rgba) -> Self {
        Rgb888::new(color.r, color.g, color.b)
    }
}

bitfield! {
    /// One pixel as stored in the framebuffer.
    ///
    /// The bit layout is as follows:
    /// - Bits 31-24: Alpha
    /// - Bits 23-16: Blue
    /// - Bits 15-8: Green
    /// - Bits 7-0: Red
    ///
    /// Keeping the channels a byte apart means bit `n` of red, green and blue
    /// sit at `n`, `n + 8` and `n + 16` after a single shift.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    struct Packed(u32);
    impl Debug;
    u8;
    pub alpha, set_alpha: 31, 24;
    pub blue, set_blue: 23, 16;
    pub green, set_green: 15, 8;
    pub red, set_red: 7, 0;
}

impl Packed {
    const GREEN_BIT: u32 = 1 << 8;
    const BLUE_BIT: u32 = 1 << 16;

    const fn new() -> Self {
        Self(0)
    }

    fn pack(color: Rgba) -> Self {
        let mut packed = Self::new();
        packed.set_red(color.r);
        packed.set_green(color.g);
        packed.set_blue(color.b);
        packed.set_alpha(color.a);
        packed
    }

    fn unpack(self) -> Rgba {
        Rgba::new(self.red(), self.green(), self.blue(), self.alpha())
    }

    #[inline(always)]
    fn rgb_bit(self, n: u8) -> (bool, bool, bool) {
        let word = self.0 >> n;
        (
            word & 1 != 0,
            word & Self::GREEN_BIT != 0,
            word & Self::BLUE_BIT != 0,
        )
    }
}

/// Framebuffer with storage for `ROWS × COLS` pixels.
///
/// # Type Parameters
/// - `ROWS`: Row capacity (maximum panel height)
/// - `COLS`: Column capacity (maximum total chain width)
#[derive(Clone)]
pub struct FrameBuffer<const ROWS: usize, const COLS: usize> {
    pixels: [[Packed; COLS]; ROWS],
    width: usize,
    height: usize,
}

impl<const ROWS: usize, const COLS: usize> Default for FrameBuffer<ROWS, COLS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const ROWS: usize, const COLS: usize> FrameBuffer<ROWS, COLS> {
    /// Create a cleared framebuffer whose active size is its full capacity.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pixels: [[Packed::new(); COLS]; ROWS],
            width: COLS,
            height: ROWS,
        }
    }

    /// Active width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Active height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Change the active window and clear every pixel.
    ///
    /// Sizes beyond the capacity are clamped to it. This must not be called
    /// while the scan interrupt is running; the engine only calls it from
    /// configure, with the timer paused.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width.min(COLS);
        self.height = height.min(ROWS);
        self.clear();
    }

    /// Set every pixel to transparent black.
    pub fn clear(&mut self) {
        for row in &mut self.pixels {
            row.fill(Packed::new());
        }
    }

    /// Set a pixel. Points outside the active window are ignored so that
    /// partially off-panel drawing never disturbs the display.
    pub fn set_pixel(&mut self, p: Point, color: impl Into<Rgba>) {
        if p.x < 0 || p.y < 0 {
            return;
        }
        self.set_pixel_internal(p.x as usize, p.y as usize, color.into());
    }

    #[inline]
    fn set_pixel_internal(&mut self, x: usize, y: usize, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.pixels[y][x] = Packed::pack(color);
    }

    /// Read a pixel back, or `None` outside the active window.
    #[must_use]
    pub fn get_pixel(&self, p: Point) -> Option<Rgba> {
        let (x, y) = self.index(p)?;
        Some(self.pixels[y][x].unpack())
    }

    /// Bit `n` of the red, green and blue channels at `p`.
    ///
    /// Returns `None` outside the active window or for `n >= 8`.
    #[must_use]
    pub fn rgb_bit(&self, p: Point, n: u8) -> Option<(bool, bool, bool)> {
        if n >= 8 {
            return None;
        }
        let (x, y) = self.index(p)?;
        Some(self.pixels[y][x].rgb_bit(n))
    }

    /// Bit `n` of the red, green and blue channels at column `x`, row `y`,
    /// without any range checks.
    ///
    /// This is the innermost read of the scan interrupt, called twice per
    /// column on every interrupt.
    ///
    /// # Safety
    /// `x < COLS`, `y < ROWS` and `n < 8` must all hold.
    #[inline(always)]
    #[must_use]
    pub unsafe fn rgb_bit_unchecked(&self, x: usize, y: usize, n: u8) -> (bool, bool, bool) {
        debug_assert!(x < COLS && y < ROWS && n < 8);
        // SAFETY: bounds are guaranteed by the caller.
        unsafe { self.pixels.get_unchecked(y).get_unchecked(x).rgb_bit(n) }
    }

    fn index(&self, p: Point) -> Option<(usize, usize)> {
        if p.x < 0 || p.y < 0 {
            return None;
        }
        let (x, y) = (p.x as usize, p.y as usize);
        (x < self.width && y < self.height).then_some((x, y))
    }
}

impl<const ROWS: usize, const COLS: usize> OriginDimensions for FrameBuffer<ROWS, COLS> {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

impl<const ROWS: usize, const COLS: usize> embedded_graphics::draw_target::DrawTarget
    for FrameBuffer<ROWS, COLS>
{
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for pixel in pixels {
            self.set_pixel(pixel.0, pixel.1);
        }
        Ok(())
    }
}

impl<const ROWS: usize, const COLS: usize> core::fmt::Debug for FrameBuffer<ROWS, COLS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("capacity", &(COLS, ROWS))
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &core::mem::size_of_val(&self.pixels))
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<const ROWS: usize, const COLS: usize> defmt::Format for FrameBuffer<ROWS, COLS> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "FrameBuffer<{}, {}>", ROWS, COLS);
        defmt::write!(f, " active: {}x{}", self.width, self.height);
    }
}

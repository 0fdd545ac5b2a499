//! Timer-driven refresh engine for HUB75 LED matrix displays.
//!
//! ## How HUB75 LED Displays Work
//!
//! HUB75 RGB LED matrix panels are scanned, time-multiplexed displays that behave like a long
//! daisy-chained shift register rather than a random-access framebuffer.
//!
//! ### Signal names
//! - **R1 G1 B1 / R2 G2 B2** – Serial colour data for the upper and lower halves of the active scan line
//! - **CLK** – Shift-register clock; every rising edge pushes the six colour bits one pixel along the chain
//! - **LAT / STB** – Latch; copies the shift-register contents to the LED drivers
//! - **OE** – Output-Enable (active LOW): LEDs are lit while OE is LOW and blanked when it is HIGH
//! - **A B C D (E)** – Row-address select lines (choose which pair of rows is lit)
//!
//! Two rows are always lit together: row `y` and row `y + height / 2`. A panel with `N`
//! address lines can therefore select `2^N` row pairs, or `2^(N+1)` rows.
//!
//! ### Brightness and colour depth (Binary Code Modulation)
//! Each row pair is visited once per bit of colour depth. On visit `k` the panel shows
//! bit `k` of every channel and stays lit for `base_period << k` timer ticks, so the eye
//! integrates each channel to its binary value. See [Batsocks – LED dimming using Binary
//! Code Modulation](https://www.batsocks.co.uk/readme/art_bcm_1.htm) for a deeper explanation.
//!
//! Only the low `color_depth` bits of each 8-bit channel are shown: at 4 bits, `15` and
//! `255` are both full brightness and `16` is black.
//!
//! ## How this crate drives a panel
//!
//! There is no DMA and no dedicated peripheral: [`Hub75`] bit-bangs every line through
//! the [`Gpio`] capability from a periodic [`Timer`] interrupt. One interrupt lights one
//! row pair for one bitplane and shifts out the next one, so the display runs one
//! interrupt behind the shift registers. See the [`engine`] module for the exact order.
//!
//! Throughput hinges on how many register writes each column costs. At configure time
//! [`port::alignment`] checks which line groups share a GPIO port:
//! - the six colour lines **must** share a port, with the first one above bit 0; they are
//!   always written together
//! - when CLK shares that port too, a column costs two writes instead of four
//! - when all address lines share a port, a row change is one write instead of one per line
//!
//! Ports whose output register cannot be read back can be wrapped in [`port::Shadowed`],
//! which keeps the last written value in software.
//!
//! ## Concurrency
//!
//! The scan interrupt reads the framebuffer one pixel at a time while the application may
//! be drawing into it; a change can show up partway through a frame and is complete by the
//! next one. Reconfiguring (which resizes the framebuffer) pauses the refresh first.
//!
//! ## Available Feature Flags
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public types and logs configuration through `defmt`.
//! No functional changes.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use embedded_graphics::pixelcolor::Rgb888;

#[macro_use]
mod fmt;

pub mod config;
pub mod engine;
pub mod framebuffer;
pub mod port;
pub mod scan;
pub mod timer;

#[cfg(test)]
mod sim;

pub use config::{Config, ConfigError, Layout, Pins};
pub use engine::Hub75;
pub use framebuffer::{FrameBuffer, Rgba};
pub use port::{AlignedPort, Gpio, Line};
pub use scan::ScanState;
pub use timer::Timer;

/// Color type used for drawing with `embedded-graphics`
pub type Color = Rgb888;

/// Computes the number of row-pair addresses for a panel height
///
/// # Arguments
///
/// * `height` - Total number of rows in the display
///
/// # Returns
///
/// Number of distinct row addresses; the upper and lower halves share one
#[must_use]
pub const fn compute_rows(height: usize) -> usize {
    height / 2
}

/// Computes the tallest panel a number of row address lines can drive
///
/// # Arguments
///
/// * `addr_lines` - Number of row address lines wired
///
/// # Returns
///
/// Maximum height in rows, `2^(addr_lines + 1)`
#[must_use]
pub const fn compute_max_height(addr_lines: usize) -> usize {
    1 << (addr_lines + 1)
}

/// Computes how long a bitplane is lit
///
/// # Arguments
///
/// * `base_period` - Ticks bitplane 0 is lit
/// * `bitplane` - Bitplane index
///
/// # Returns
///
/// Timer period for `bitplane`, `base_period · 2^bitplane`
#[must_use]
pub const fn compute_bcm_period(base_period: u32, bitplane: u8) -> u32 {
    base_period << bitplane
}

/// Computes the total time one row pair is lit per frame
///
/// # Arguments
///
/// * `base_period` - Ticks bitplane 0 is lit
/// * `bits` - Number of bits per color channel
///
/// # Returns
///
/// Sum of all bitplane periods, `(2^bits - 1) · base_period`
#[must_use]
pub const fn compute_row_ticks(base_period: u32, bits: u8) -> u32 {
    ((1u32 << bits) - 1) * base_period
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::RgbColor;

    #[test]
    fn test_compute_rows() {
        // Test typical panel sizes
        assert_eq!(compute_rows(32), 16);
        assert_eq!(compute_rows(64), 32);
        assert_eq!(compute_rows(16), 8);

        // Odd heights round down; the last row is never addressed
        assert_eq!(compute_rows(15), 7);
        assert_eq!(compute_rows(2), 1);
    }

    #[test]
    fn test_compute_max_height() {
        assert_eq!(compute_max_height(3), 16); // A B C
        assert_eq!(compute_max_height(4), 32); // A B C D
        assert_eq!(compute_max_height(5), 64); // A B C D E
        assert_eq!(compute_max_height(0), 2);
    }

    #[test]
    fn test_compute_bcm_period_doubles() {
        assert_eq!(compute_bcm_period(2000, 0), 2000);
        for bit in 0..7 {
            assert_eq!(
                compute_bcm_period(100, bit + 1),
                2 * compute_bcm_period(100, bit)
            );
        }
    }

    #[test]
    fn test_compute_row_ticks_is_sum_of_periods() {
        for bits in 1..=8 {
            let sum: u32 = (0..bits).map(|bit| compute_bcm_period(7, bit)).sum();
            assert_eq!(compute_row_ticks(7, bits), sum);
        }
        assert_eq!(compute_row_ticks(2000, 4), 15 * 2000);
    }

    #[test]
    fn test_helper_functions_const() {
        const HEIGHT: usize = 32;
        const NROWS: usize = compute_rows(HEIGHT);
        const MAX: usize = compute_max_height(4);
        const TICKS: u32 = compute_row_ticks(1, 4);

        assert_eq!(NROWS, 16);
        assert_eq!(MAX, HEIGHT);
        assert_eq!(TICKS, 15);
    }

    #[test]
    fn test_color_type_alias() {
        let red: Color = Color::RED;
        assert_eq!(red, Rgb888::RED);
        assert_eq!(Rgba::from(red), Rgba::opaque(255, 0, 0));
    }
}

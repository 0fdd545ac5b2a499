//! Row and bitplane cursor of the scan interrupt.
//!
//! Every interrupt lights one row pair for one bitplane. A row pair is
//! visited `color_depth` times in a row, bitplane 0 first, and the timer
//! period doubles on each visit so that bit `k` is lit for
//! `base_period << k` ticks. After the last bitplane the cursor moves to the
//! next row pair, and after the last row pair the frame counter advances.

use crate::config::Layout;

/// Mutable cursor of the scan interrupt.
///
/// Only the engine mutates it, once per interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanState {
    frame: u32,
    prev_row: Option<usize>,
    upper_row: usize,
    lower_row: usize,
    bitplane: u8,
    period: u32,
}

impl ScanState {
    /// A cursor positioned just past the last bitplane of the last row pair,
    /// so the first interrupt rolls it over to row 0, bitplane 0 and always
    /// drives the address lines.
    #[must_use]
    pub const fn primed(layout: &Layout) -> Self {
        Self {
            frame: 0,
            prev_row: None,
            upper_row: layout.num_addr_rows,
            lower_row: layout.height,
            bitplane: layout.color_depth,
            period: layout.base_period,
        }
    }

    /// Completed frame count; wraps silently.
    #[must_use]
    pub const fn frame(&self) -> u32 {
        self.frame
    }

    /// Upper row whose address was last driven, if any.
    #[must_use]
    pub const fn prev_row(&self) -> Option<usize> {
        self.prev_row
    }

    /// Upper row of the current row pair.
    #[must_use]
    pub const fn upper_row(&self) -> usize {
        self.upper_row
    }

    /// Lower row of the current row pair, `num_addr_rows` below the upper.
    #[must_use]
    pub const fn lower_row(&self) -> usize {
        self.lower_row
    }

    /// Current bitplane, `0..color_depth`.
    #[must_use]
    pub const fn bitplane(&self) -> u8 {
        self.bitplane
    }

    /// Timer period of the current bitplane.
    #[must_use]
    pub const fn period(&self) -> u32 {
        self.period
    }

    /// Move to the next bitplane, row pair or frame.
    #[inline]
    pub fn advance(&mut self, layout: &Layout) {
        self.bitplane += 1;
        self.period <<= 1;
        if self.bitplane >= layout.color_depth {
            self.bitplane = 0;
            self.period = layout.base_period;
            self.upper_row += 1;
            self.lower_row += 1;
            if self.upper_row >= layout.num_addr_rows {
                self.upper_row = 0;
                self.lower_row = layout.num_addr_rows;
                self.frame = self.frame.wrapping_add(1);
            }
        }
    }

    /// Decide whether the address lines must change to select `row`.
    ///
    /// Either row of a pair selects the pair, so a lower-half index is
    /// translated to its upper partner. Returns the address to drive, or
    /// `None` when `row` is off the panel or already selected.
    #[inline]
    pub fn select(&mut self, row: usize, layout: &Layout) -> Option<usize> {
        if row >= layout.height {
            return None;
        }
        let row = if row >= layout.num_addr_rows {
            row - layout.num_addr_rows
        } else {
            row
        };
        if self.prev_row == Some(row) {
            return None;
        }
        self.prev_row = Some(row);
        Some(row)
    }
}

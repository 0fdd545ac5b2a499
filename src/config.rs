//! Panel wiring, user configuration and the validated layout derived from
//! them.
//!
//! [`Layout::resolve`] does all of the checking and derivation up front and
//! touches no hardware, so a rejected configuration leaves a running engine
//! exactly as it was.

use crate::port::{alignment, scatter, AlignedPort, Line};
use crate::{compute_max_height, compute_rows};

/// Default total width of the panel chain, in pixels.
pub const DEFAULT_WIDTH: usize = 64;

/// Default colour depth, in bits per channel.
pub const DEFAULT_COLOR_DEPTH: u8 = 4;

/// Default timer period of the least significant bitplane, in timer ticks.
pub const DEFAULT_BASE_PERIOD: u32 = 2000;

/// Highest supported colour depth; framebuffer channels are 8 bits wide.
pub const MAX_COLOR_DEPTH: u8 = 8;

/// The GPIO lines wired to the HUB75 connector.
///
/// `ADDR` is the number of row address lines (A, B, C, ...). It bounds the
/// panel height at `2^(ADDR + 1)` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pins<const ADDR: usize> {
    /// Output enable, active low
    pub oe: Line,
    /// Latch / strobe
    pub lat: Line,
    /// Shift clock
    pub clk: Line,
    /// Colour data, ordered upper R, G, B then lower R, G, B. All six must
    /// share one port, and the first must not be bit 0.
    pub rgb: [Line; 6],
    /// Row address lines, least significant first
    pub addr: [Line; ADDR],
}

impl<const ADDR: usize> Pins<ADDR> {
    /// Every line on the connector, in the order they are configured.
    pub(crate) fn all(&self) -> impl Iterator<Item = Line> + '_ {
        [self.oe, self.lat, self.clk]
            .into_iter()
            .chain(self.rgb)
            .chain(self.addr.iter().copied())
    }
}

/// Requested configuration. Unset fields fall back to defaults.
///
/// # Example
/// ```rust
/// use hub75_scan::Config;
///
/// let config = Config::new().width(32).height(16).color_depth(5);
/// assert_eq!(config.width, Some(32));
/// assert_eq!(config.base_period, None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Total width of the panel chain; default [`DEFAULT_WIDTH`]
    pub width: Option<usize>,
    /// Total height; default is the most the address lines can select
    pub height: Option<usize>,
    /// Bits per colour channel; default [`DEFAULT_COLOR_DEPTH`]
    pub color_depth: Option<u8>,
    /// Ticks the least significant bitplane is lit; default
    /// [`DEFAULT_BASE_PERIOD`]
    pub base_period: Option<u32>,
}

impl Config {
    /// A configuration with every field left at its default.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            width: None,
            height: None,
            color_depth: None,
            base_period: None,
        }
    }

    /// Set the panel chain width.
    #[must_use]
    pub const fn width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    /// Set the panel height.
    #[must_use]
    pub const fn height(mut self, height: usize) -> Self {
        self.height = Some(height);
        self
    }

    /// Set the colour depth in bits per channel.
    #[must_use]
    pub const fn color_depth(mut self, bits: u8) -> Self {
        self.color_depth = Some(bits);
        self
    }

    /// Set the base bitplane period in timer ticks.
    #[must_use]
    pub const fn base_period(mut self, ticks: u32) -> Self {
        self.base_period = Some(ticks);
        self
    }
}

/// Reasons a configuration is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The six RGB data lines are not on one common GPIO port, or the first
    /// of them is bit 0 of that port
    InvalidDataPins,
    /// Height is above what the address lines (or the framebuffer) can
    /// hold, or below two rows
    InvalidHeight {
        /// Requested height
        height: usize,
        /// Largest height allowed
        max: usize,
    },
    /// Width is above the framebuffer's column capacity
    InvalidWidth {
        /// Requested width
        width: usize,
        /// Largest width allowed
        max: usize,
    },
    /// Colour depth is above [`MAX_COLOR_DEPTH`]
    InvalidColorDepth(u8),
    /// Base period is zero, or doubling it for every bitplane overflows
    InvalidBasePeriod(u32),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidDataPins => {
                f.write_str("RGB data pins must be on a common GPIO port, above bit 0")
            }
            Self::InvalidHeight { height, max } => write!(
                f,
                "invalid matrix height {height} for given number of row address pins (max {max})"
            ),
            Self::InvalidWidth { width, max } => {
                write!(f, "invalid matrix width {width} (max {max})")
            }
            Self::InvalidColorDepth(bits) => {
                write!(f, "invalid color depth {bits} (1..={MAX_COLOR_DEPTH})")
            }
            Self::InvalidBasePeriod(ticks) => write!(f, "invalid base period {ticks}"),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Colour data lines and how they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBus {
    /// Port shared by all six colour lines
    pub port: AlignedPort,
    /// Clock mask when the clock shares the colour port, so a column can be
    /// written and clocked with one combined write
    pub clk: Option<u32>,
    /// Port bits for every 6-bit colour word, indexed by
    /// `r1 | g1 << 1 | b1 << 2 | r2 << 3 | g2 << 4 | b2 << 5`
    pub scatter: [u32; 64],
}

/// The validated, derived configuration of a running engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Active width in pixels
    pub width: usize,
    /// Active height in pixels
    pub height: usize,
    /// Bits per colour channel
    pub color_depth: u8,
    /// Period of bitplane 0 in timer ticks
    pub base_period: u32,
    /// Number of row-pair addresses, `height / 2`
    pub num_addr_rows: usize,
    /// Tallest panel the address lines can select
    pub max_height: usize,
    /// Set when every address line shares one port
    pub addr_port: Option<AlignedPort>,
    /// Colour data lines
    pub data: DataBus,
}

impl Layout {
    /// Validate `config` against the wiring and the framebuffer capacity and
    /// derive everything the scan interrupt needs.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found. Nothing is derived partially.
    pub fn resolve<const ADDR: usize>(
        config: &Config,
        pins: &Pins<ADDR>,
        max_rows: usize,
        max_cols: usize,
    ) -> Result<Self, ConfigError> {
        let max_height = compute_max_height(ADDR);

        let width = match config.width {
            Some(width) if width > max_cols => {
                return Err(ConfigError::InvalidWidth {
                    width,
                    max: max_cols,
                })
            }
            Some(width) if width > 0 => width,
            _ => DEFAULT_WIDTH.min(max_cols),
        };

        let height_limit = max_height.min(max_rows);
        let height = match config.height {
            Some(height) if height > 0 => height,
            _ => height_limit,
        };
        // a single row has no row pair, and the default can be that small
        // when the framebuffer has fewer than two rows
        if height > height_limit || height < 2 {
            return Err(ConfigError::InvalidHeight {
                height,
                max: height_limit,
            });
        }

        let color_depth = match config.color_depth {
            None | Some(0) => DEFAULT_COLOR_DEPTH,
            Some(bits) if bits > MAX_COLOR_DEPTH => {
                return Err(ConfigError::InvalidColorDepth(bits))
            }
            Some(bits) => bits,
        };

        // the last bitplane runs for base_period << (color_depth - 1) ticks
        let base_period = config.base_period.unwrap_or(DEFAULT_BASE_PERIOD);
        if base_period == 0 || base_period.leading_zeros() < u32::from(color_depth - 1) {
            return Err(ConfigError::InvalidBasePeriod(base_period));
        }

        // a data group starting at bit 0 counts as not aligned
        let data_port = alignment(&pins.rgb)
            .filter(|port| port.offset != 0)
            .ok_or(ConfigError::InvalidDataPins)?;
        // the data lines share a port, so comparing the clock with any one of
        // them is enough
        let clk = alignment(&[pins.rgb[0], pins.clk])
            .map(|_| pins.clk.mask())
            .filter(|clk| clk & data_port.mask == 0);
        let mut scatter_table = [0u32; 64];
        for (word, bits) in scatter_table.iter_mut().enumerate() {
            *bits = scatter(&pins.rgb, word);
        }

        Ok(Self {
            width,
            height,
            color_depth,
            base_period,
            num_addr_rows: compute_rows(height),
            max_height,
            addr_port: alignment(&pins.addr),
            data: DataBus {
                port: data_port,
                clk,
                scatter: scatter_table,
            },
        })
    }
}

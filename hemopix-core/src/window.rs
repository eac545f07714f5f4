//! Intensity windowing.
//!
//! A window maps raw stored values to a display range in four steps:
//!
//! 1. Rescale: `hu = value * slope + intercept`
//! 2. Bounds: `low = center - width / 2`, `high = center + width / 2`
//! 3. Clip `hu` into `[low, high]`
//! 4. Linearly map `low → range.min`, `high → range.max`
//!
//! All functions here are pure: they never mutate their input and return
//! bit-identical output for identical arguments.
#![allow(clippy::cast_precision_loss)]

use crate::calibration::CalibrationParams;
use crate::error::{Error, Result};
use ndarray::{Array2, Array3, ArrayBase, ArrayView2, Axis, Data, Ix2, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Output value range of a window.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayRange {
    /// Value assigned to the lower window bound.
    pub min: f32,
    /// Value assigned to the upper window bound.
    pub max: f32,
}

impl DisplayRange {
    /// `[0, 1]`, the range model inputs are fed in.
    pub const UNIT: Self = Self { min: 0.0, max: 1.0 };

    /// `[0, 255]`, for 8-bit image export.
    pub const BYTE: Self = Self {
        min: 0.0,
        max: 255.0,
    };

    /// Midpoint of the range.
    #[must_use]
    pub fn midpoint(&self) -> f32 {
        (self.min + self.max) / 2.0
    }
}

impl Default for DisplayRange {
    fn default() -> Self {
        Self::UNIT
    }
}

/// A visualization window given by its center and (positive) width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindowSpec {
    center: i32,
    width: i32,
}

impl WindowSpec {
    /// Brain window.
    pub const BRAIN: Self = Self::from_valid(40, 80);
    /// Subdural window.
    pub const SUBDURAL: Self = Self::from_valid(80, 200);
    /// Bone window.
    pub const BONE: Self = Self::from_valid(600, 2800);

    /// Creates a window.
    ///
    /// # Errors
    /// Returns [`Error::InvalidWindow`] if `width <= 0`.
    pub fn new(center: i32, width: i32) -> Result<Self> {
        if width <= 0 {
            return Err(Error::InvalidWindow { center, width });
        }
        Ok(Self { center, width })
    }

    /// Width must already be known to be positive.
    pub(crate) const fn from_valid(center: i32, width: i32) -> Self {
        Self { center, width }
    }

    /// Window center.
    #[must_use]
    pub const fn center(&self) -> i32 {
        self.center
    }

    /// Window width.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Returns `(low, high)`.
    #[must_use]
    pub fn bounds(&self) -> (f32, f32) {
        let center = self.center as f32;
        let half = self.width as f32 / 2.0;
        (center - half, center + half)
    }
}

impl TryFrom<(i32, i32)> for WindowSpec {
    type Error = Error;

    fn try_from((center, width): (i32, i32)) -> Result<Self> {
        Self::new(center, width)
    }
}

/// Precomputed per-value mapping for one window.
#[derive(Debug, Clone, Copy)]
struct WindowMap {
    slope: f32,
    intercept: f32,
    low: f32,
    high: f32,
    range: DisplayRange,
}

impl WindowMap {
    fn new(window: WindowSpec, intercept: i32, slope: i32, range: DisplayRange) -> Self {
        let (low, high) = window.bounds();
        Self {
            slope: slope as f32,
            intercept: intercept as f32,
            low,
            high,
            range,
        }
    }

    #[inline]
    fn map(&self, value: f32) -> f32 {
        let hu = value * self.slope + self.intercept;
        let clipped = hu.clamp(self.low, self.high);
        (clipped - self.low) / (self.high - self.low) * (self.range.max - self.range.min)
            + self.range.min
    }
}

/// Applies one window to an image, producing values in `[0, 1]`.
#[must_use]
pub fn apply_window<S>(
    image: &ArrayBase<S, Ix2>,
    window: WindowSpec,
    intercept: i32,
    slope: i32,
) -> Array2<f32>
where
    S: Data<Elem = f32>,
{
    apply_window_with_range(image, window, intercept, slope, DisplayRange::UNIT)
}

/// Applies one window to an image, producing values in `range`.
#[must_use]
pub fn apply_window_with_range<S>(
    image: &ArrayBase<S, Ix2>,
    window: WindowSpec,
    intercept: i32,
    slope: i32,
    range: DisplayRange,
) -> Array2<f32>
where
    S: Data<Elem = f32>,
{
    let map = WindowMap::new(window, intercept, slope, range);
    image.mapv(|v| map.map(v))
}

/// Stacks one windowed channel per entry of `windows`, in order.
///
/// The result has shape `(windows.len(), rows, cols)`; an empty window list
/// yields zero channels.
#[must_use]
pub fn build_channels<S>(
    image: &ArrayBase<S, Ix2>,
    windows: &[WindowSpec],
    intercept: i32,
    slope: i32,
) -> Array3<f32>
where
    S: Data<Elem = f32>,
{
    build_channels_with_range(image, windows, intercept, slope, DisplayRange::UNIT)
}

/// [`build_channels`] with an explicit output range.
#[must_use]
pub fn build_channels_with_range<S>(
    image: &ArrayBase<S, Ix2>,
    windows: &[WindowSpec],
    intercept: i32,
    slope: i32,
    range: DisplayRange,
) -> Array3<f32>
where
    S: Data<Elem = f32>,
{
    let (rows, cols) = image.dim();
    let mut channels = Array3::<f32>::zeros((windows.len(), rows, cols));
    for (mut channel, &window) in channels.axis_iter_mut(Axis(0)).zip(windows) {
        let map = WindowMap::new(window, intercept, slope, range);
        Zip::from(&mut channel)
            .and(image)
            .for_each(|out, &value| *out = map.map(value));
    }
    channels
}

/// Channel-stacked model input: the image's default window first, then
/// caller windows in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedTensor {
    data: Array3<f32>,
}

impl WindowedTensor {
    /// Windows `image` with its own calibration, followed by `extra` windows.
    #[must_use]
    pub fn build<S>(
        image: &ArrayBase<S, Ix2>,
        calibration: &CalibrationParams,
        extra: &[WindowSpec],
    ) -> Self
    where
        S: Data<Elem = f32>,
    {
        Self::build_with_range(image, calibration, extra, DisplayRange::UNIT)
    }

    /// [`WindowedTensor::build`] with an explicit output range.
    #[must_use]
    pub fn build_with_range<S>(
        image: &ArrayBase<S, Ix2>,
        calibration: &CalibrationParams,
        extra: &[WindowSpec],
        range: DisplayRange,
    ) -> Self
    where
        S: Data<Elem = f32>,
    {
        let mut windows = Vec::with_capacity(extra.len() + 1);
        windows.push(calibration.default_window());
        windows.extend_from_slice(extra);
        Self {
            data: build_channels_with_range(
                image,
                &windows,
                calibration.intercept(),
                calibration.slope(),
                range,
            ),
        }
    }

    /// Number of channels (at least one).
    #[must_use]
    pub fn channels(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Returns one channel.
    ///
    /// # Panics
    /// Panics if `index >= self.channels()`.
    #[must_use]
    pub fn channel(&self, index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), index)
    }

    /// Borrows the `(channels, rows, cols)` array.
    #[must_use]
    pub fn as_array(&self) -> &Array3<f32> {
        &self.data
    }

    /// Consumes the tensor, returning the underlying array.
    #[must_use]
    pub fn into_array(self) -> Array3<f32> {
        self.data
    }
}

//! Per-image calibration parameters.
#![allow(clippy::cast_possible_truncation)]

use crate::error::{Error, Result};
use crate::window::WindowSpec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A calibration field as stored in image metadata.
///
/// Scanner metadata may hold either a single value or a sequence of values
/// for the same field (e.g. several display windows). Consumers only ever
/// need the first one, via [`CalibrationValue::first`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CalibrationValue {
    /// Single value.
    Scalar(i32),
    /// Multi-valued field; never empty.
    MultiValue(Vec<i32>),
}

impl CalibrationValue {
    /// Builds a value from decoded decimal strings, truncating toward zero.
    ///
    /// Returns `None` when `values` is empty or contains a non-finite or
    /// out-of-range entry.
    #[must_use]
    pub fn from_decimals(values: &[f64]) -> Option<Self> {
        let ints = values
            .iter()
            .map(|&v| {
                let t = v.trunc();
                (t.is_finite() && t >= f64::from(i32::MIN) && t <= f64::from(i32::MAX))
                    .then_some(t as i32)
            })
            .collect::<Option<Vec<i32>>>()?;
        match ints.as_slice() {
            [] => None,
            [single] => Some(Self::Scalar(*single)),
            _ => Some(Self::MultiValue(ints)),
        }
    }

    /// Returns the scalar, or the first entry of a multi-valued field.
    #[must_use]
    pub fn first(&self) -> Option<i32> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::MultiValue(values) => values.first().copied(),
        }
    }
}

/// Window and rescale parameters attached to a single image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationParams {
    center: i32,
    width: i32,
    intercept: i32,
    slope: i32,
}

impl CalibrationParams {
    /// Fixed calibration for sources without embedded metadata (volumes, masks).
    pub const FIXED_BRAIN: Self = Self {
        center: 40,
        width: 120,
        intercept: 0,
        slope: 1,
    };

    /// Creates calibration parameters.
    ///
    /// # Errors
    /// Returns [`Error::InvalidWindow`] if `width <= 0`.
    pub fn new(center: i32, width: i32, intercept: i32, slope: i32) -> Result<Self> {
        if width <= 0 {
            return Err(Error::InvalidWindow { center, width });
        }
        Ok(Self {
            center,
            width,
            intercept,
            slope,
        })
    }

    /// Resolves the four metadata fields into calibration parameters.
    ///
    /// # Errors
    /// Returns [`Error::InvalidWindow`] if the resolved width is not positive.
    ///
    /// Returns `Ok(None)` if any field is an empty sequence.
    pub fn from_values(
        center: &CalibrationValue,
        width: &CalibrationValue,
        intercept: &CalibrationValue,
        slope: &CalibrationValue,
    ) -> Result<Option<Self>> {
        let (Some(c), Some(w), Some(i), Some(s)) =
            (center.first(), width.first(), intercept.first(), slope.first())
        else {
            return Ok(None);
        };
        Self::new(c, w, i, s).map(Some)
    }

    /// Default window center.
    #[must_use]
    pub const fn center(&self) -> i32 {
        self.center
    }

    /// Default window width (always positive).
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Rescale intercept.
    #[must_use]
    pub const fn intercept(&self) -> i32 {
        self.intercept
    }

    /// Rescale slope.
    #[must_use]
    pub const fn slope(&self) -> i32 {
        self.slope
    }

    /// The image's own display window.
    #[must_use]
    pub fn default_window(&self) -> WindowSpec {
        WindowSpec::from_valid(self.center, self.width)
    }
}

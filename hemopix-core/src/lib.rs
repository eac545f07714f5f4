//! hemopix-core: Core types and windowing for CT intensity data.
//!
//! This crate provides the data model shared by the readers and the
//! dataset adapters: calibration parameters, window specifications,
//! the windowing engine, slice rotation, and the persisted split record.
//!

pub mod calibration;
pub mod error;
pub mod split;
pub mod volume;
pub mod window;

pub use calibration::{CalibrationParams, CalibrationValue};
pub use error::{Error, Result};
pub use split::SplitRecord;
pub use volume::{rotate_slice, rotate_slices, RawImage, RawVolume, Rotation};
pub use window::{
    apply_window, apply_window_with_range, build_channels, build_channels_with_range,
    DisplayRange, WindowSpec, WindowedTensor,
};

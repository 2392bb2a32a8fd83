//! PrintKit Slicer Crate
//!
//! Drives an external slicer: finds the executable, renders the printer
//! profile it loads, and runs it as a background job.

pub mod job;
pub mod locate;
pub mod profile;

pub use job::{SliceHandle, SliceObserver, SliceRequest, SlicingJob, MODEL_EXTENSIONS};
pub use locate::{well_known_locations, SlicerLocator, SLICER_NAMES};
pub use profile::{render_ini, SliceOptions};

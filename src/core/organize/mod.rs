//! Library organization.
//!
//! Places incoming media into the `YYYY/MM/DD` tree under the library root,
//! resolving name collisions with numeric suffixes.

mod placer;

pub use placer::PathOrganizer;

pub mod boundary;

pub use boundary::BoundaryDetector;

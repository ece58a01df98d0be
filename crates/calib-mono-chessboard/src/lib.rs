//! Checkerboard interior-corner detector.
//!
//! Pipeline for one grayscale frame:
//! 1. Ring-sample corner response over the image, relative threshold +
//!    non-maximum suppression (`response`).
//! 2. Assemble candidates into a 4-connected grid graph (kd-tree neighbor
//!    search, orientation/spacing gating, BFS integer coordinates) and
//!    accept only an exact cols x rows topology (`grid`).
//! 3. Refine every accepted corner with an iterative gradient-symmetry
//!    search inside an odd-sized window (`refine`).
//!
//! Detection is all-or-nothing: any missing corner, topology mismatch, or
//! ambiguous assembly rejects the whole frame.

mod detector;
mod grid;
mod params;
mod refine;
mod response;

pub use detector::ChessboardDetector;
pub use params::DetectorParams;

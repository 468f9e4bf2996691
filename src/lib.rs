//! Online kernel density estimation.
//!
//! `okde` maintains a compact Gaussian mixture approximation of a density
//! from a stream of weighted samples. Samples are folded in incrementally
//! and never revisited: each one becomes a Gaussian kernel whose width
//! (the bandwidth) is re-estimated from the data seen so far, and the
//! mixture is kept small by merging components whose union is
//! well-described by a single Gaussian.
//!
//! # Example
//!
//! ```
//! use nalgebra::{DMatrix, DVector};
//! use okde::prelude::*;
//!
//! let mut session = Session::new(2, 1.0, 0.02).unwrap();
//!
//! // A batch of weighted samples; the second one carries its own
//! // measurement uncertainty
//! let batch = vec![
//!     Sample::new(DVector::from_column_slice(&[0.0, 0.0])),
//!     Sample::new(DVector::from_column_slice(&[1.0, 0.5]))
//!         .with_cov(DMatrix::identity(2, 2) * 0.1)
//!         .with_weight(2.0),
//! ];
//! session.update(&batch).unwrap();
//!
//! let weights = session.mixture().weights();
//! assert!((weights[1] - 2.0 / 3.0).abs() < 1E-12);
//!
//! let density = session.evaluate(&DVector::from_column_slice(&[0.5, 0.25]));
//! assert!(density.unwrap() > 0.0);
//! ```
//!
//! # Logging
//!
//! Bandwidth fallbacks, pruning and compression are reported through the
//! [`log`](https://docs.rs/log) facade at `debug` level, individual merges
//! at `trace` level. No logger is installed.
pub mod bandwidth;
pub mod compress;
pub mod config;
pub mod consts;
pub mod dist;
pub mod misc;
pub mod prelude;
pub mod result;
pub mod session;
pub mod traits;
pub mod update;

//! Gaussian components and the mixtures built from them
mod component;
mod mixture;

pub use component::GaussianComponent;
pub use mixture::{Mixture, MixtureKind, SampleState};

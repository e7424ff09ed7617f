//! Discontinuous Galerkin discretisation of the aerosol general dynamic equation, with
//! Kalman filtering and smoothing for joint estimation of the size distribution and an
//! unknown process rate.
//!
//! The size distribution `n(x, t)` is expanded in Legendre polynomials on every element of
//! a one-dimensional mesh over the size coordinate. [`model::GdeModelBuilder`] assembles
//! condensation, deposition and coagulation into a [`model::GdeModel`], which
//! [`linearize::CrankNicolson`] turns into one affine transition per time step for the
//! estimator in [`estimation`].
pub mod assembly;
pub mod basis;
pub mod calculus;
pub mod config;
pub mod error;
pub mod estimation;
pub mod jacobian;
pub mod kalman;
pub mod linearize;
pub mod mesh;
pub mod model;
pub mod noise;
pub mod parameter;
pub mod physics;
pub mod projection;
pub mod quadrature;
pub mod rate;
pub mod state;

pub extern crate nalgebra;

pub use gde_traits::Real;

//! Error types for layout construction and validation.
//!
//! Infeasible candidate fields are not errors; they are reported through
//! [`crate::field::FieldOutcome`]. The variants here cover inputs that cannot
//! describe a field or obstruction at all.

use thiserror::Error;

/// Failure to build one of the layout primitives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// Topology tag is not one of the six supported shapes.
    #[error("Unsupported obstruction topology '{0}' (expected one of B, S, U, T, L, BL)")]
    InvalidTopology(String),

    /// Obstruction widths must be finite and non-negative.
    #[error("Invalid obstruction dimensions: x width {x_width}, y width {y_width}")]
    InvalidDimensions {
        /// The requested x width.
        x_width: f64,
        /// The requested y width.
        y_width: f64,
    },

    /// Borehole spacing must be finite and strictly positive.
    #[error("Invalid borehole spacing: x {x}, y {y}")]
    InvalidSpacing {
        /// The requested x spacing.
        x: f64,
        /// The requested y spacing.
        y: f64,
    },

    /// A sweep axis cannot be enumerated.
    #[error("Invalid sweep axis '{name}': {reason}")]
    InvalidAxis {
        /// Name of the offending axis.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The product of all axis lengths does not fit in `usize`.
    #[error("Sweep grid is too large to enumerate: the product of {0} axis lengths overflows")]
    GridTooLarge(usize),
}

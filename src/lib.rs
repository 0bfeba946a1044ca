#![doc = include_str!("../README.md")]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, missing_docs)]
#![allow(
    clippy::similar_names,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

/// Various datastructures.
pub mod datastructures;
/// Types and datastructures to represent and manage formulas effectively.
pub mod formulas;
/// Handlers for more control during some calculations.
pub mod handlers;
/// Transformations for formulas.
pub mod operations;
/// Additional utility.
pub mod util;

/// A transformation takes a formula as input and returns another formula, thus
/// transforming the input formula. The transformations here are normal form
/// conversions.
pub mod transformations;

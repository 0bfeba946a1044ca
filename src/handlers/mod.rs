mod factorization_handler;
mod handler;
mod timeout_handler;

pub use factorization_handler::*;
pub use handler::*;
pub use timeout_handler::*;

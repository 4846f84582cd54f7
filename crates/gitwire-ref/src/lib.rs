//! Reference names as they appear in ref advertisements and push commands.

mod error;
mod name;

pub use error::RefError;
pub use name::RefName;

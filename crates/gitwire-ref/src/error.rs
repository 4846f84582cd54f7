/// Errors produced by reference name handling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefError {
    #[error("invalid ref name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("ref name is not valid UTF-8")]
    NotUtf8,
}

mod identifier;

pub use identifier::*;

/// Identity data attached to every context by [crate::context_tools::context_macro].
/// Constructors initialize it with `context_info: Default::default()`.
#[derive(Default, Debug)]
pub struct ContextInfo {
    /// The context's identifier
    pub id: identifier::Identifier,
}

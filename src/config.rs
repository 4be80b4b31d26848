/// Registry configuration.
///
/// - `register_builtins` seeds the registry with the built-in aggregations.
/// - `allow_replacement` lets a later registration replace an existing name instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    pub register_builtins: bool,
    pub allow_replacement: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { register_builtins: true, allow_replacement: false }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(register_builtins: bool, allow_replacement: bool) -> Self {
        Self { register_builtins, allow_replacement }
    }

    /// Convenience: an empty registry that only holds what the caller registers.
    pub fn empty() -> Self {
        Self { register_builtins: false, allow_replacement: false }
    }

    pub fn replaceable() -> Self {
        Self { register_builtins: true, allow_replacement: true }
    }
}

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::types::{SqlType, TypeManager, TypeSignature, BIGINT, BOOLEAN, DOUBLE, INTEGER, VARBINARY, VARCHAR};

/// Shared catalog holding only the built-in types.
pub static BUILTIN_TYPES: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::with_builtins);

/// In-memory type catalog.
///
/// Plain types are looked up by exact signature. The parametric `array(T)` and `map(K,V)`
/// resolve whenever all of their parameters do.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<TypeSignature, SqlType>,
}

impl TypeRegistry {
    pub fn new() -> Self { Self { types: IndexMap::new() } }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for name in [BIGINT, INTEGER, DOUBLE, BOOLEAN, VARCHAR, VARBINARY] {
            registry.register(SqlType::simple(name));
        }
        registry
    }

    /// Add a type, returning the previous entry with the same signature.
    pub fn register(&mut self, ty: SqlType) -> Option<SqlType> {
        self.types.insert(ty.signature.clone(), ty)
    }

    pub fn list(&self) -> Vec<String> {
        self.types.keys().map(|s| s.to_string()).collect()
    }

    fn parametric_arity(base: &str) -> Option<usize> {
        match base {
            "array" => Some(1),
            "map" => Some(2),
            _ => None,
        }
    }
}

impl TypeManager for TypeRegistry {
    fn get_type(&self, signature: &TypeSignature) -> Option<SqlType> {
        if let Some(ty) = self.types.get(signature) {
            return Some(ty.clone());
        }
        let arity = Self::parametric_arity(&signature.base)?;
        if signature.parameters.len() != arity {
            return None;
        }
        if signature.parameters.iter().all(|p| self.get_type(p).is_some()) {
            Some(SqlType::new(signature.clone()))
        } else {
            None
        }
    }
}

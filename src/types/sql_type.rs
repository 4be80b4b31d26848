use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::types::TypeSignature;

pub const BIGINT: &str = "bigint";
pub const INTEGER: &str = "integer";
pub const DOUBLE: &str = "double";
pub const BOOLEAN: &str = "boolean";
pub const VARCHAR: &str = "varchar";
pub const VARBINARY: &str = "varbinary";

/// Semantic type descriptor handed out by a `TypeManager`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SqlType {
    pub signature: TypeSignature,
}

impl SqlType {
    pub fn new(signature: TypeSignature) -> Self {
        Self { signature }
    }

    pub fn simple(base: &str) -> Self {
        Self::new(TypeSignature::simple(base))
    }

    pub fn name(&self) -> String {
        self.signature.to_string()
    }
}

impl Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature)
    }
}

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::{aggregation::AggregationError, types::{SqlType, TypeManager}};

/// What a formal parameter of an input or intermediate function is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterRole {
    State,
    InputChannel,
    NullableInputChannel,
    BlockIndex,
    SampleWeight,
}

impl ParameterRole {
    pub fn is_channel(&self) -> bool {
        matches!(self, ParameterRole::InputChannel | ParameterRole::NullableInputChannel)
    }
}

impl Display for ParameterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParameterRole::State => "STATE",
            ParameterRole::InputChannel => "INPUT_CHANNEL",
            ParameterRole::NullableInputChannel => "NULLABLE_INPUT_CHANNEL",
            ParameterRole::BlockIndex => "BLOCK_INDEX",
            ParameterRole::SampleWeight => "SAMPLE_WEIGHT",
        };
        f.write_str(s)
    }
}

/// A classified parameter. `semantic_type` is present exactly for channel roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawParameterSpec")]
pub struct ParameterSpec {
    role: ParameterRole,
    semantic_type: Option<SqlType>,
}

// Deserialized fields, checked by `ParameterSpec::new`.
#[derive(Deserialize)]
struct RawParameterSpec {
    role: ParameterRole,
    semantic_type: Option<SqlType>,
}

impl TryFrom<RawParameterSpec> for ParameterSpec {
    type Error = AggregationError;

    fn try_from(raw: RawParameterSpec) -> Result<Self, Self::Error> {
        ParameterSpec::new(raw.role, raw.semantic_type)
    }
}

impl ParameterSpec {
    pub fn new(role: ParameterRole, semantic_type: Option<SqlType>) -> Result<Self, AggregationError> {
        if semantic_type.is_some() != role.is_channel() {
            return AggregationError::malformed(
                &role.to_string(),
                "a type must be provided only for input channels",
            ).err();
        }
        Ok(Self { role, semantic_type })
    }

    pub fn state() -> Self { Self { role: ParameterRole::State, semantic_type: None } }

    pub fn block_index() -> Self { Self { role: ParameterRole::BlockIndex, semantic_type: None } }

    pub fn sample_weight() -> Self { Self { role: ParameterRole::SampleWeight, semantic_type: None } }

    pub fn input_channel(ty: SqlType) -> Self {
        Self { role: ParameterRole::InputChannel, semantic_type: Some(ty) }
    }

    pub fn nullable_input_channel(ty: SqlType) -> Self {
        Self { role: ParameterRole::NullableInputChannel, semantic_type: Some(ty) }
    }

    pub fn role(&self) -> ParameterRole { self.role }

    pub fn semantic_type(&self) -> Option<&SqlType> { self.semantic_type.as_ref() }

    /// Classify one parameter from its declared markers.
    ///
    /// Exactly one base marker (`SqlType`, `BlockIndex`, `SampleWeight`) is required; `Nullable`
    /// may only accompany `SqlType`. Typed channels resolve their type through `types`.
    pub fn from_markers(markers: &[ParameterMarker], function: &str, types: &dyn TypeManager) -> Result<Self, AggregationError> {
        let bases: Vec<&ParameterMarker> = markers.iter().filter(|m| m.is_base()).collect();
        let nullable = markers.iter().any(|m| matches!(m, ParameterMarker::Nullable));

        let [base] = bases.as_slice() else {
            return AggregationError::malformed(
                function,
                format!("parameter must have exactly one of SqlType, BlockIndex and SampleWeight, found {}", bases.len()),
            ).err();
        };

        match base {
            ParameterMarker::SqlType(name) => {
                let ty = types.resolve(name)?;
                if nullable {
                    Ok(Self::nullable_input_channel(ty))
                } else {
                    Ok(Self::input_channel(ty))
                }
            }
            _ if nullable => AggregationError::malformed(
                function,
                format!("Nullable may only be combined with SqlType, found {}", base),
            ).err(),
            ParameterMarker::BlockIndex => Ok(Self::block_index()),
            ParameterMarker::SampleWeight => Ok(Self::sample_weight()),
            ParameterMarker::Nullable => AggregationError::malformed(function, "Nullable is not a base marker").err(),
        }
    }
}

/// A role marker as declared on a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterMarker {
    SqlType(String),
    BlockIndex,
    SampleWeight,
    Nullable,
}

impl ParameterMarker {
    pub fn sql_type(name: &str) -> Self { ParameterMarker::SqlType(name.to_string()) }

    fn is_base(&self) -> bool {
        !matches!(self, ParameterMarker::Nullable)
    }
}

impl Display for ParameterMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterMarker::SqlType(name) => write!(f, "SqlType({})", name),
            ParameterMarker::BlockIndex => f.write_str("BlockIndex"),
            ParameterMarker::SampleWeight => f.write_str("SampleWeight"),
            ParameterMarker::Nullable => f.write_str("Nullable"),
        }
    }
}

/// A parameter as written by an aggregation author: either the leading state parameter or a
/// parameter carrying role markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterDeclaration {
    State,
    Annotated(Vec<ParameterMarker>),
}

impl ParameterDeclaration {
    pub fn channel(type_name: &str) -> Self {
        Self::Annotated(vec![ParameterMarker::sql_type(type_name)])
    }

    pub fn nullable_channel(type_name: &str) -> Self {
        Self::Annotated(vec![ParameterMarker::sql_type(type_name), ParameterMarker::Nullable])
    }

    pub fn block_index() -> Self { Self::Annotated(vec![ParameterMarker::BlockIndex]) }

    pub fn sample_weight() -> Self { Self::Annotated(vec![ParameterMarker::SampleWeight]) }

    pub fn classify(&self, function: &str, types: &dyn TypeManager) -> Result<ParameterSpec, AggregationError> {
        match self {
            ParameterDeclaration::State => Ok(ParameterSpec::state()),
            ParameterDeclaration::Annotated(markers) => ParameterSpec::from_markers(markers, function, types),
        }
    }
}

pub fn classify_all(declarations: &[ParameterDeclaration], function: &str, types: &dyn TypeManager) -> Result<Vec<ParameterSpec>, AggregationError> {
    declarations.iter().map(|d| d.classify(function, types)).collect()
}

/// Number of parameters bound to an input channel, nullable or not.
pub fn count_input_channels(specs: &[ParameterSpec]) -> usize {
    specs.iter().filter(|s| s.role.is_channel()).count()
}

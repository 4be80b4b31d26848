use std::{
    any::{type_name, Any, TypeId},
    fmt::{self, Display},
    marker::PhantomData,
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    aggregation::AggregationError,
    types::{SqlType, VARBINARY},
};

/// Per-group mutable accumulation state. Bodies downcast it to their concrete state type.
pub type AccumulatorState = dyn Any + Send;

/// Identifies the state shape shared by every function of one aggregation.
#[derive(Debug, Clone, Copy, Eq)]
pub struct StateCapability {
    name: &'static str,
    type_id: TypeId,
}

impl StateCapability {
    /// Named after the last path segment of `S`, without generic arguments.
    pub fn of<S: Any>() -> Self {
        let full = type_name::<S>();
        let path = full.split('<').next().unwrap_or(full);
        let name = path.rsplit("::").next().unwrap_or(path);
        Self { name, type_id: TypeId::of::<S>() }
    }

    pub fn name(&self) -> &'static str { self.name }

    pub fn type_id(&self) -> TypeId { self.type_id }
}

impl PartialEq for StateCapability {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Display for StateCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Builds a fresh, empty state when a group starts.
pub trait StateFactory: Send + Sync {
    fn capability(&self) -> StateCapability;

    fn create_state(&self) -> Box<AccumulatorState>;
}

/// Moves a state across a stage boundary as a single channel value.
pub trait StateSerializer: Send + Sync {
    fn capability(&self) -> StateCapability;

    /// Type of the channel value produced by `encode`.
    fn serialized_type(&self) -> SqlType;

    fn encode(&self, state: &AccumulatorState) -> Result<Value, AggregationError>;

    fn decode(&self, value: &Value) -> Result<Box<AccumulatorState>, AggregationError>;
}

/// Factory for any `Default` state.
pub struct DefaultStateFactory<S> {
    _state: PhantomData<fn() -> S>,
}

impl<S> DefaultStateFactory<S> {
    pub fn new() -> Self { Self { _state: PhantomData } }
}

impl<S> Default for DefaultStateFactory<S> {
    fn default() -> Self { Self::new() }
}

impl<S: Default + Any + Send> StateFactory for DefaultStateFactory<S> {
    fn capability(&self) -> StateCapability {
        StateCapability::of::<S>()
    }

    fn create_state(&self) -> Box<AccumulatorState> {
        Box::new(S::default())
    }
}

/// Serializes a state as JSON text carried in a `varbinary` channel.
pub struct JsonStateSerializer<S> {
    _state: PhantomData<fn() -> S>,
}

impl<S> JsonStateSerializer<S> {
    pub fn new() -> Self { Self { _state: PhantomData } }
}

impl<S> Default for JsonStateSerializer<S> {
    fn default() -> Self { Self::new() }
}

impl<S: Serialize + DeserializeOwned + Any + Send> StateSerializer for JsonStateSerializer<S> {
    fn capability(&self) -> StateCapability {
        StateCapability::of::<S>()
    }

    fn serialized_type(&self) -> SqlType {
        SqlType::simple(VARBINARY)
    }

    fn encode(&self, state: &AccumulatorState) -> Result<Value, AggregationError> {
        let state = downcast_ref::<S>(state)?;
        serde_json::to_string(state)
            .map(Value::String)
            .map_err(|e| AggregationError::Execution(format!("cannot encode {}: {}", self.capability(), e)))
    }

    fn decode(&self, value: &Value) -> Result<Box<AccumulatorState>, AggregationError> {
        let text = value.as_str().ok_or_else(|| AggregationError::Execution(
            format!("serialized {} must be a varbinary value, got {}", self.capability(), value)
        ))?;
        let state: S = serde_json::from_str(text)
            .map_err(|e| AggregationError::Execution(format!("cannot decode {}: {}", self.capability(), e)))?;
        Ok(Box::new(state))
    }
}

pub fn downcast_ref<S: Any>(state: &AccumulatorState) -> Result<&S, AggregationError> {
    state.downcast_ref::<S>().ok_or_else(|| AggregationError::Execution(
        format!("state is not {}", StateCapability::of::<S>())
    ))
}

pub fn downcast_mut<S: Any>(state: &mut AccumulatorState) -> Result<&mut S, AggregationError> {
    state.downcast_mut::<S>().ok_or_else(|| AggregationError::Execution(
        format!("state is not {}", StateCapability::of::<S>())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Tally { n: i64 }

    #[derive(Default)]
    struct Other;

    struct Wrapper<T>(T);

    #[test]
    fn capability_compares_by_type() {
        assert_eq!(StateCapability::of::<Tally>(), StateCapability::of::<Tally>());
        assert_ne!(StateCapability::of::<Tally>(), StateCapability::of::<Other>());
        assert_eq!(StateCapability::of::<Tally>().to_string(), "Tally");
        assert_eq!(StateCapability::of::<Wrapper<Tally>>().name(), "Wrapper");
        assert_ne!(StateCapability::of::<Wrapper<Tally>>(), StateCapability::of::<Wrapper<Other>>());
    }

    #[test]
    fn factory_creates_empty_state() {
        let factory = DefaultStateFactory::<Tally>::new();
        let state = factory.create_state();
        assert_eq!(downcast_ref::<Tally>(state.as_ref()).unwrap(), &Tally { n: 0 });
        assert!(downcast_ref::<Other>(state.as_ref()).is_err());
    }

    #[test]
    fn json_serializer_round_trips() {
        let serializer = JsonStateSerializer::<Tally>::new();
        let encoded = serializer.encode(&Tally { n: 42 }).unwrap();
        assert_eq!(encoded, Value::String("{\"n\":42}".into()));
        let decoded = serializer.decode(&encoded).unwrap();
        assert_eq!(downcast_ref::<Tally>(decoded.as_ref()).unwrap().n, 42);

        assert!(matches!(serializer.decode(&Value::Bool(true)), Err(AggregationError::Execution(_))));
        assert!(matches!(serializer.encode(&Other), Err(AggregationError::Execution(_))));
    }
}

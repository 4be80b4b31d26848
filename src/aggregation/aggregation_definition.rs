use std::{any::Any, fmt, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::{
    aggregation::{
        classify_all, count_input_channels, AccumulatorState, AggregationError, DefaultStateFactory,
        FunctionHandle, JsonStateSerializer, ParameterDeclaration, ParameterSpec, SignatureValidator,
        StateCapability, StateFactory, StateSerializer,
    },
    types::{SqlType, TypeManager},
};

/// How partial states of one group are merged. Fixed when the definition is built.
#[derive(Debug, Clone)]
pub enum MergeStrategy {
    /// `combine(state_a, state_b)`: `state_a` absorbs `state_b`.
    Combine(FunctionHandle),
    /// `function(state, ...)` folds a serialized partial state bound to the single channel in
    /// `parameters`.
    IntermediateMerge { parameters: Vec<ParameterSpec>, function: FunctionHandle },
}

#[derive(Debug, Clone)]
pub enum OutputFunction {
    /// `(state, sink)`, or no output step at all.
    Exact(Option<FunctionHandle>),
    /// `(state, confidence, sink)`.
    Approximate(FunctionHandle),
}

impl OutputFunction {
    pub fn function(&self) -> Option<&FunctionHandle> {
        match self {
            OutputFunction::Exact(function) => function.as_ref(),
            OutputFunction::Approximate(function) => Some(function),
        }
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self, OutputFunction::Approximate(_))
    }
}

/// A validated aggregation contract. Immutable once built and safe to share across queries.
pub struct AggregationDefinition {
    name: String,
    output_type: SqlType,
    input_parameters: Vec<ParameterSpec>,
    input_function: FunctionHandle,
    merge_strategy: MergeStrategy,
    output_function: OutputFunction,
    state_capability: StateCapability,
    state_factory: Arc<dyn StateFactory>,
    state_serializer: Arc<dyn StateSerializer>,
}

impl AggregationDefinition {
    pub fn builder(name: &str, output_type: SqlType) -> AggregationDefinitionBuilder {
        AggregationDefinitionBuilder::new().name(name).output_type(output_type)
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn output_type(&self) -> &SqlType { &self.output_type }

    pub fn is_approximate(&self) -> bool { self.output_function.is_approximate() }

    pub fn input_parameters(&self) -> &[ParameterSpec] { &self.input_parameters }

    pub fn input_function(&self) -> &FunctionHandle { &self.input_function }

    pub fn merge_strategy(&self) -> &MergeStrategy { &self.merge_strategy }

    pub fn combine_function(&self) -> Option<&FunctionHandle> {
        match &self.merge_strategy {
            MergeStrategy::Combine(function) => Some(function),
            MergeStrategy::IntermediateMerge { .. } => None,
        }
    }

    pub fn intermediate_input_parameters(&self) -> Option<&[ParameterSpec]> {
        match &self.merge_strategy {
            MergeStrategy::IntermediateMerge { parameters, .. } => Some(parameters),
            MergeStrategy::Combine(_) => None,
        }
    }

    pub fn intermediate_input_function(&self) -> Option<&FunctionHandle> {
        match &self.merge_strategy {
            MergeStrategy::IntermediateMerge { function, .. } => Some(function),
            MergeStrategy::Combine(_) => None,
        }
    }

    pub fn output(&self) -> &OutputFunction { &self.output_function }

    pub fn output_function(&self) -> Option<&FunctionHandle> { self.output_function.function() }

    pub fn state_capability(&self) -> StateCapability { self.state_capability }

    pub fn state_factory(&self) -> &dyn StateFactory { self.state_factory.as_ref() }

    pub fn state_serializer(&self) -> &dyn StateSerializer { self.state_serializer.as_ref() }

    pub fn create_state(&self) -> Box<AccumulatorState> {
        self.state_factory.create_state()
    }
}

impl fmt::Debug for AggregationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregationDefinition")
            .field("name", &self.name)
            .field("output_type", &self.output_type)
            .field("input_parameters", &self.input_parameters)
            .field("input_function", &self.input_function)
            .field("merge_strategy", &self.merge_strategy)
            .field("output_function", &self.output_function)
            .field("state_capability", &self.state_capability)
            .finish()
    }
}

type StateBinding = (StateCapability, Arc<dyn StateFactory>, Arc<dyn StateSerializer>);

/// Collects the raw fields of an aggregation; `build` validates them all-or-nothing.
#[derive(Default)]
pub struct AggregationDefinitionBuilder {
    name: Option<String>,
    output_type: Option<SqlType>,
    approximate: bool,
    input_parameters: Vec<ParameterDeclaration>,
    input_function: Option<FunctionHandle>,
    intermediate_input_parameters: Option<Vec<ParameterDeclaration>>,
    intermediate_input_function: Option<FunctionHandle>,
    combine_function: Option<FunctionHandle>,
    output_function: Option<FunctionHandle>,
    state: Option<StateBinding>,
}

impl AggregationDefinitionBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn output_type(mut self, output_type: SqlType) -> Self {
        self.output_type = Some(output_type);
        self
    }

    pub fn approximate(mut self, approximate: bool) -> Self {
        self.approximate = approximate;
        self
    }

    pub fn input_function(mut self, parameters: Vec<ParameterDeclaration>, function: FunctionHandle) -> Self {
        self.input_parameters = parameters;
        self.input_function = Some(function);
        self
    }

    pub fn intermediate_input_parameters(mut self, parameters: Vec<ParameterDeclaration>) -> Self {
        self.intermediate_input_parameters = Some(parameters);
        self
    }

    pub fn intermediate_input_function(mut self, function: FunctionHandle) -> Self {
        self.intermediate_input_function = Some(function);
        self
    }

    pub fn combine_function(mut self, function: FunctionHandle) -> Self {
        self.combine_function = Some(function);
        self
    }

    pub fn output_function(mut self, function: FunctionHandle) -> Self {
        self.output_function = Some(function);
        self
    }

    pub fn state(mut self, capability: StateCapability, factory: Arc<dyn StateFactory>, serializer: Arc<dyn StateSerializer>) -> Self {
        self.state = Some((capability, factory, serializer));
        self
    }

    /// Use `S::default()` for fresh states and JSON in a `varbinary` channel for serialized ones.
    pub fn json_state<S>(self) -> Self
    where
        S: Default + Serialize + DeserializeOwned + Any + Send,
    {
        self.state(
            StateCapability::of::<S>(),
            Arc::new(DefaultStateFactory::<S>::new()),
            Arc::new(JsonStateSerializer::<S>::new()),
        )
    }

    pub fn build(self, types: &dyn TypeManager) -> Result<AggregationDefinition, AggregationError> {
        let label = self.name.clone().unwrap_or_default();
        let result = self.validate(types);
        match &result {
            Ok(definition) => debug!(
                name = %definition.name,
                approximate = definition.is_approximate(),
                combine = definition.combine_function().is_some(),
                "aggregation definition validated"
            ),
            Err(error) => warn!(name = %label, %error, "aggregation definition rejected"),
        }
        result
    }

    fn validate(self, types: &dyn TypeManager) -> Result<AggregationDefinition, AggregationError> {
        let name = self.name.filter(|n| !n.is_empty())
            .ok_or_else(|| AggregationError::Configuration("aggregation name is required".into()))?;
        let output_type = self.output_type
            .ok_or_else(|| AggregationError::Configuration(format!("{} has no output type", name)))?;
        let input_function = self.input_function
            .ok_or_else(|| AggregationError::Configuration(format!("{} has no input function", name)))?;
        let (state_capability, state_factory, state_serializer) = self.state
            .ok_or_else(|| AggregationError::Configuration(format!("{} has no state", name)))?;

        if state_factory.capability() != state_capability || state_serializer.capability() != state_capability {
            return Err(AggregationError::Configuration(format!(
                "{}: state factory ({}) and serializer ({}) must both produce {}",
                name, state_factory.capability(), state_serializer.capability(), state_capability
            )));
        }

        let pending_merge = match (self.combine_function, self.intermediate_input_function, self.intermediate_input_parameters) {
            (Some(combine), None, None) => PendingMerge::Combine(combine),
            (None, Some(function), Some(parameters)) => PendingMerge::Intermediate(parameters, function),
            (None, None, None) => {
                return Err(AggregationError::Configuration(format!(
                    "{} must have either a combine or an intermediate input function", name
                )));
            }
            (Some(_), _, _) => {
                return Err(AggregationError::Configuration(format!(
                    "{} cannot have both a combine and an intermediate input function", name
                )));
            }
            (None, _, _) => {
                return Err(AggregationError::Configuration(format!(
                    "{}: intermediate input parameters must be specified iff an intermediate function is provided", name
                )));
            }
        };

        let input_parameters = classify_all(&self.input_parameters, input_function.name(), types)?;
        SignatureValidator::validate_input_signature(&input_function, &input_parameters, state_capability)?;

        let merge_strategy = match pending_merge {
            PendingMerge::Intermediate(declarations, function) => {
                let parameters = classify_all(&declarations, function.name(), types)?;
                let channels = count_input_channels(&parameters);
                if channels != 1 {
                    return Err(AggregationError::Configuration(format!(
                        "{}: intermediate input function may only have one input channel, found {}", name, channels
                    )));
                }
                SignatureValidator::validate_input_signature(&function, &parameters, state_capability)?;
                MergeStrategy::IntermediateMerge { parameters, function }
            }
            PendingMerge::Combine(function) => {
                SignatureValidator::validate_combine_signature(&function, state_capability)?;
                MergeStrategy::Combine(function)
            }
        };

        SignatureValidator::validate_output_signature(self.output_function.as_ref(), state_capability, self.approximate)?;
        // approximate without a function was rejected above
        let output_function = match self.output_function {
            Some(function) if self.approximate => OutputFunction::Approximate(function),
            function => OutputFunction::Exact(function),
        };

        Ok(AggregationDefinition {
            name,
            output_type,
            input_parameters,
            input_function,
            merge_strategy,
            output_function,
            state_capability,
            state_factory,
            state_serializer,
        })
    }
}

enum PendingMerge {
    Combine(FunctionHandle),
    Intermediate(Vec<ParameterDeclaration>, FunctionHandle),
}

use crate::aggregation::{
    count_input_channels, AggregationError, FormalKind, FunctionHandle, ParameterRole, ParameterSpec,
    StateCapability, SUPPORTED_CHANNEL_KINDS,
};

/// Registration-time checks of function handles against declared roles and the state capability.
/// All checks are pure; nothing here runs per row.
pub struct SignatureValidator;

impl SignatureValidator {
    pub fn validate_input_signature(function: &FunctionHandle, specs: &[ParameterSpec], state: StateCapability) -> Result<(), AggregationError> {
        Self::verify_static_and_public(function)?;
        let formals = function.formals();
        let name = function.name();

        if formals.len() != specs.len() {
            return AggregationError::mismatch(
                name,
                None,
                format!("{} parameters", specs.len()),
                format!("{} parameters {}", formals.len(), function.signature()),
            ).err();
        }
        let (Some(first_spec), Some(first_formal)) = (specs.first(), formals.first()) else {
            return AggregationError::mismatch(name, None, format!("({}, ...)", state), "()").err();
        };
        if first_spec.role() != ParameterRole::State {
            return AggregationError::mismatch(name, Some(0), ParameterRole::State.to_string(), first_spec.role().to_string()).err();
        }
        if *first_formal != FormalKind::State(state) {
            return AggregationError::mismatch(name, Some(0), state.to_string(), first_formal.to_string()).err();
        }

        for (position, (spec, formal)) in specs.iter().zip(formals).enumerate().skip(1) {
            let accepted = match spec.role() {
                ParameterRole::NullableInputChannel => *formal == FormalKind::Block,
                ParameterRole::InputChannel => SUPPORTED_CHANNEL_KINDS.contains(formal),
                ParameterRole::BlockIndex => *formal == FormalKind::Int,
                ParameterRole::SampleWeight => *formal == FormalKind::Long,
                ParameterRole::State => {
                    return AggregationError::mismatch(name, Some(position), "a non-state role", "STATE").err();
                }
            };
            if !accepted {
                return AggregationError::mismatch(
                    name,
                    Some(position),
                    Self::expected_for(spec.role()),
                    formal.to_string(),
                ).err();
            }
        }
        Ok(())
    }

    pub fn validate_combine_signature(function: &FunctionHandle, state: StateCapability) -> Result<(), AggregationError> {
        Self::verify_static_and_public(function)?;
        let expected = [FormalKind::State(state), FormalKind::State(state)];
        Self::verify_exact_formals(function, &expected)
    }

    /// Approximate aggregations require `(state, f64, sink)`; exact ones accept `(state, sink)`
    /// or no output function at all.
    pub fn validate_output_signature(function: Option<&FunctionHandle>, state: StateCapability, approximate: bool) -> Result<(), AggregationError> {
        match (function, approximate) {
            (None, true) => Err(AggregationError::Configuration(
                "approximate aggregations must specify an output function".into(),
            )),
            (None, false) => Ok(()),
            (Some(function), true) => {
                Self::verify_static_and_public(function)?;
                Self::verify_exact_formals(function, &[FormalKind::State(state), FormalKind::Double, FormalKind::Sink])
            }
            (Some(function), false) => {
                Self::verify_static_and_public(function)?;
                Self::verify_exact_formals(function, &[FormalKind::State(state), FormalKind::Sink])
            }
        }
    }

    pub fn count_input_channels(specs: &[ParameterSpec]) -> usize {
        count_input_channels(specs)
    }

    fn verify_static_and_public(function: &FunctionHandle) -> Result<(), AggregationError> {
        if !function.is_static() {
            return AggregationError::mismatch(function.name(), None, "a static function", "an instance method").err();
        }
        if !function.is_public() {
            return AggregationError::mismatch(function.name(), None, "a public function", "a private function").err();
        }
        Ok(())
    }

    fn verify_exact_formals(function: &FunctionHandle, expected: &[FormalKind]) -> Result<(), AggregationError> {
        if function.formals() == expected {
            return Ok(());
        }
        let expected: Vec<String> = expected.iter().map(|k| k.to_string()).collect();
        AggregationError::mismatch(
            function.name(),
            None,
            format!("({})", expected.join(", ")),
            function.signature(),
        ).err()
    }

    fn expected_for(role: ParameterRole) -> String {
        match role {
            ParameterRole::NullableInputChannel => "Block (nullable channels)".into(),
            ParameterRole::InputChannel => {
                let kinds: Vec<String> = SUPPORTED_CHANNEL_KINDS.iter().map(|k| k.to_string()).collect();
                format!("one of {}", kinds.join(", "))
            }
            ParameterRole::BlockIndex => FormalKind::Int.to_string(),
            ParameterRole::SampleWeight => FormalKind::Long.to_string(),
            ParameterRole::State => "STATE".into(),
        }
    }
}

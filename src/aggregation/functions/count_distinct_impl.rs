use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    aggregation::{
        exact_arguments, AggregateImpl, AggregationDefinition, AggregationError, FormalKind,
        FunctionHandle, ParameterDeclaration, StateCapability,
    },
    types::{TypeManager, BIGINT, VARBINARY, VARCHAR},
};

/// COUNT(DISTINCT varchar).
///
/// The state owns a set, so partial states are merged by rebuilding the set from its
/// serialized form rather than through a combine function.
pub struct CountDistinctImpl;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DistinctState {
    pub values: BTreeSet<String>,
}

impl AggregateImpl for CountDistinctImpl {
    fn name(&self) -> &'static str { "count_distinct" }

    fn definition(&self, types: &dyn TypeManager) -> Result<AggregationDefinition, AggregationError> {
        let state = FormalKind::State(StateCapability::of::<DistinctState>());

        let input = FunctionHandle::new("count_distinct_input", vec![state, FormalKind::Slice], |args| {
            let [s, value] = exact_arguments::<2>(args)?;
            let value = String::from_utf8_lossy(value.slice()?).into_owned();
            s.state_mut::<DistinctState>()?.values.insert(value);
            Ok(())
        });
        let intermediate = FunctionHandle::new("count_distinct_intermediate", vec![state, FormalKind::Slice], |args| {
            let [s, serialized] = exact_arguments::<2>(args)?;
            let partial: DistinctState = serde_json::from_slice(serialized.slice()?)
                .map_err(|e| AggregationError::Execution(format!("cannot decode DistinctState: {}", e)))?;
            s.state_mut::<DistinctState>()?.values.extend(partial.values);
            Ok(())
        });
        let output = FunctionHandle::new("count_distinct_output", vec![state, FormalKind::Sink], |args| {
            let [s, sink] = exact_arguments::<2>(args)?;
            let count = s.state_ref::<DistinctState>()?.values.len() as i64;
            sink.sink()?.append(count);
            Ok(())
        });

        AggregationDefinition::builder(self.name(), types.resolve(BIGINT)?)
            .input_function(vec![ParameterDeclaration::State, ParameterDeclaration::channel(VARCHAR)], input)
            .intermediate_input_parameters(vec![ParameterDeclaration::State, ParameterDeclaration::channel(VARBINARY)])
            .intermediate_input_function(intermediate)
            .output_function(output)
            .json_state::<DistinctState>()
            .build(types)
    }
}

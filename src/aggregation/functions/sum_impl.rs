use serde::{Deserialize, Serialize};

use crate::{
    aggregation::{
        exact_arguments, AggregateImpl, AggregationDefinition, AggregationError, FormalKind,
        FunctionHandle, ParameterDeclaration, StateCapability,
    },
    types::{TypeManager, BIGINT},
};

/// SUM(bigint). NULL when no value was seen.
pub struct SumImpl;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SumState {
    pub sum: i64,
    pub seen: bool,
}

impl SumState {
    fn add(&mut self, value: i64) -> Result<(), AggregationError> {
        self.sum = self.sum.checked_add(value)
            .ok_or_else(|| AggregationError::Execution("bigint overflow in sum".into()))?;
        self.seen = true;
        Ok(())
    }
}

impl AggregateImpl for SumImpl {
    fn name(&self) -> &'static str { "sum" }

    fn definition(&self, types: &dyn TypeManager) -> Result<AggregationDefinition, AggregationError> {
        let state = FormalKind::State(StateCapability::of::<SumState>());

        let input = FunctionHandle::new("sum_input", vec![state, FormalKind::Long], |args| {
            let [s, value] = exact_arguments::<2>(args)?;
            let value = value.long()?;
            s.state_mut::<SumState>()?.add(value)
        });
        let combine = FunctionHandle::new("sum_combine", vec![state, state], |args| {
            let [a, b] = exact_arguments::<2>(args)?;
            let other = b.state_ref::<SumState>()?;
            let (sum, seen) = (other.sum, other.seen);
            if seen {
                a.state_mut::<SumState>()?.add(sum)?;
            }
            Ok(())
        });
        let output = FunctionHandle::new("sum_output", vec![state, FormalKind::Sink], |args| {
            let [s, sink] = exact_arguments::<2>(args)?;
            let state = s.state_ref::<SumState>()?;
            let (sum, seen) = (state.sum, state.seen);
            let sink = sink.sink()?;
            if seen { sink.append(sum) } else { sink.append_null() }
            Ok(())
        });

        AggregationDefinition::builder(self.name(), types.resolve(BIGINT)?)
            .input_function(vec![ParameterDeclaration::State, ParameterDeclaration::channel(BIGINT)], input)
            .combine_function(combine)
            .output_function(output)
            .json_state::<SumState>()
            .build(types)
    }
}

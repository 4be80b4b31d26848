use serde::{Deserialize, Serialize};

use crate::{
    aggregation::{
        exact_arguments, AggregateImpl, AggregationDefinition, AggregationError, FormalKind,
        FunctionHandle, ParameterDeclaration, StateCapability,
    },
    types::{TypeManager, DOUBLE},
};

pub struct AvgImpl;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AvgState {
    pub sum: f64,
    pub count: i64,
}

impl AggregateImpl for AvgImpl {
    fn name(&self) -> &'static str { "avg" }

    fn definition(&self, types: &dyn TypeManager) -> Result<AggregationDefinition, AggregationError> {
        let state = FormalKind::State(StateCapability::of::<AvgState>());

        let input = FunctionHandle::new("avg_input", vec![state, FormalKind::Double], |args| {
            let [s, value] = exact_arguments::<2>(args)?;
            let value = value.double()?;
            let state = s.state_mut::<AvgState>()?;
            state.sum += value;
            state.count += 1;
            Ok(())
        });
        let combine = FunctionHandle::new("avg_combine", vec![state, state], |args| {
            let [a, b] = exact_arguments::<2>(args)?;
            let other = b.state_ref::<AvgState>()?;
            let (sum, count) = (other.sum, other.count);
            let state = a.state_mut::<AvgState>()?;
            state.sum += sum;
            state.count += count;
            Ok(())
        });
        let output = FunctionHandle::new("avg_output", vec![state, FormalKind::Sink], |args| {
            let [s, sink] = exact_arguments::<2>(args)?;
            let state = s.state_ref::<AvgState>()?;
            let avg = (state.count > 0).then(|| state.sum / state.count as f64);
            match avg.and_then(serde_json::Number::from_f64) {
                Some(n) => sink.sink()?.append(n),
                None => sink.sink()?.append_null(),
            }
            Ok(())
        });

        AggregationDefinition::builder(self.name(), types.resolve(DOUBLE)?)
            .input_function(vec![ParameterDeclaration::State, ParameterDeclaration::channel(DOUBLE)], input)
            .combine_function(combine)
            .output_function(output)
            .json_state::<AvgState>()
            .build(types)
    }
}

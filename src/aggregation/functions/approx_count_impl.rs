use serde::{Deserialize, Serialize};

use crate::{
    aggregation::{
        exact_arguments, AggregateImpl, AggregationDefinition, AggregationError, FormalKind,
        FunctionHandle, ParameterDeclaration, StateCapability,
    },
    types::{TypeManager, BIGINT},
};

/// Row count over a sample, scaled up by the sampling ratio at output time.
pub struct ApproxCountImpl;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WeightedCountState {
    pub weight: i64,
}

impl AggregateImpl for ApproxCountImpl {
    fn name(&self) -> &'static str { "approx_count" }

    fn definition(&self, types: &dyn TypeManager) -> Result<AggregationDefinition, AggregationError> {
        let state = FormalKind::State(StateCapability::of::<WeightedCountState>());

        let input = FunctionHandle::new("approx_count_input", vec![state, FormalKind::Long], |args| {
            let [s, weight] = exact_arguments::<2>(args)?;
            let weight = weight.long()?;
            s.state_mut::<WeightedCountState>()?.weight += weight;
            Ok(())
        });
        let combine = FunctionHandle::new("approx_count_combine", vec![state, state], |args| {
            let [a, b] = exact_arguments::<2>(args)?;
            let other = b.state_ref::<WeightedCountState>()?.weight;
            a.state_mut::<WeightedCountState>()?.weight += other;
            Ok(())
        });
        let output = FunctionHandle::new(
            "approx_count_output",
            vec![state, FormalKind::Double, FormalKind::Sink],
            |args| {
                let [s, confidence, sink] = exact_arguments::<3>(args)?;
                let weight = s.state_ref::<WeightedCountState>()?.weight;
                let estimate = (weight as f64 / confidence.double()?).round() as i64;
                sink.sink()?.append(estimate);
                Ok(())
            },
        );

        AggregationDefinition::builder(self.name(), types.resolve(BIGINT)?)
            .approximate(true)
            .input_function(vec![ParameterDeclaration::State, ParameterDeclaration::sample_weight()], input)
            .combine_function(combine)
            .output_function(output)
            .json_state::<WeightedCountState>()
            .build(types)
    }
}

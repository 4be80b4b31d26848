use serde::{Deserialize, Serialize};

use crate::{
    aggregation::{
        exact_arguments, AggregateImpl, AggregationDefinition, AggregationError, FormalKind,
        FunctionHandle, ParameterDeclaration, StateCapability,
    },
    types::{TypeManager, BIGINT},
};

/// COUNT(expr): number of non-null values.
pub struct CountImpl;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CountState {
    pub count: i64,
}

impl AggregateImpl for CountImpl {
    fn name(&self) -> &'static str { "count" }

    fn definition(&self, types: &dyn TypeManager) -> Result<AggregationDefinition, AggregationError> {
        let state = FormalKind::State(StateCapability::of::<CountState>());

        // nulls are visible through the block, so the channel is declared nullable
        let input = FunctionHandle::new(
            "count_input",
            vec![state, FormalKind::Block, FormalKind::Int],
            |args| {
                let [s, values, position] = exact_arguments::<3>(args)?;
                if !values.block()?.is_null(position.int()? as usize)? {
                    s.state_mut::<CountState>()?.count += 1;
                }
                Ok(())
            },
        );
        let combine = FunctionHandle::new("count_combine", vec![state, state], |args| {
            let [a, b] = exact_arguments::<2>(args)?;
            let other = b.state_ref::<CountState>()?.count;
            a.state_mut::<CountState>()?.count += other;
            Ok(())
        });
        let output = FunctionHandle::new("count_output", vec![state, FormalKind::Sink], |args| {
            let [s, sink] = exact_arguments::<2>(args)?;
            let count = s.state_ref::<CountState>()?.count;
            sink.sink()?.append(count);
            Ok(())
        });

        AggregationDefinition::builder(self.name(), types.resolve(BIGINT)?)
            .input_function(
                vec![
                    ParameterDeclaration::State,
                    ParameterDeclaration::nullable_channel(BIGINT),
                    ParameterDeclaration::block_index(),
                ],
                input,
            )
            .combine_function(combine)
            .output_function(output)
            .json_state::<CountState>()
            .build(types)
    }
}

use std::sync::Arc;

use ordered_float::NotNan;

use crate::{
    aggregation::{
        count_input_channels, AccumulatorState, AggregationDefinition, AggregationError, Argument,
        FormalKind, MergeStrategy, OutputFunction, ParameterRole, ParameterSpec,
    },
    block::{Block, BlockBuilder, Page},
};

/// Sampling ratio handed to approximate output functions, in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Confidence(NotNan<f64>);

impl Confidence {
    pub fn new(ratio: f64) -> Result<Self, AggregationError> {
        let invalid = || AggregationError::Execution(format!("confidence must be in (0, 1], got {}", ratio));
        let ratio = NotNan::new(ratio).map_err(|_| invalid())?;
        if *ratio <= 0.0 || *ratio > 1.0 {
            return Err(invalid());
        }
        Ok(Self(ratio))
    }

    pub fn full() -> Self {
        Self(NotNan::from(1u8))
    }

    pub fn value(&self) -> f64 {
        self.0.into_inner()
    }
}

impl Default for Confidence {
    fn default() -> Self { Self::full() }
}

/// Drives one group's state through a definition: accumulate, merge, then a single output.
///
/// The accumulator is owned by exactly one operator at a time; `evaluate_final` consumes it so
/// nothing can follow the output call.
pub struct GroupAccumulator {
    definition: Arc<AggregationDefinition>,
    input_channels: Vec<usize>,
    state: Box<AccumulatorState>,
}

impl GroupAccumulator {
    /// `input_channels[i]` is the page channel feeding the i-th channel parameter of the input
    /// function.
    pub fn new(definition: Arc<AggregationDefinition>, input_channels: Vec<usize>) -> Result<Self, AggregationError> {
        let expected = count_input_channels(definition.input_parameters());
        if input_channels.len() != expected {
            return Err(AggregationError::Execution(format!(
                "{} takes {} input channels, got {}", definition.name(), expected, input_channels.len()
            )));
        }
        let state = definition.create_state();
        Ok(Self { definition, input_channels, state })
    }

    pub fn definition(&self) -> &Arc<AggregationDefinition> { &self.definition }

    pub fn state(&self) -> &AccumulatorState { self.state.as_ref() }

    /// Feed one row. Returns `false` when the row was skipped because a non-nullable channel
    /// held a null.
    pub fn add_input(&mut self, page: &Page, position: usize) -> Result<bool, AggregationError> {
        self.add_weighted_input(page, position, 1)
    }

    pub fn add_weighted_input(&mut self, page: &Page, position: usize, sample_weight: i64) -> Result<bool, AggregationError> {
        let columns = self.columns(page)?;
        self.accumulate(&columns, position, sample_weight)
    }

    /// Feed every row of a page, returning how many rows reached the input function.
    pub fn add_page(&mut self, page: &Page) -> Result<usize, AggregationError> {
        let columns = self.columns(page)?;
        let mut accepted = 0;
        for position in 0..page.position_count() {
            if self.accumulate(&columns, position, 1)? {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Fold a serialized partial state (as produced by `evaluate_intermediate`) into this group.
    pub fn add_intermediate(&mut self, block: &Block, position: usize) -> Result<(), AggregationError> {
        match self.definition.merge_strategy() {
            MergeStrategy::IntermediateMerge { parameters, function } => {
                let bound = bind_arguments(parameters, function.formals(), self.state.as_mut(), &[block], position, 1)?;
                match bound {
                    Some(mut args) => function.invoke(&mut args),
                    None => Ok(()),
                }
            }
            MergeStrategy::Combine(function) => {
                let value = block.get(position).ok_or_else(|| AggregationError::Execution(
                    format!("position {} out of range for intermediate block", position)
                ))?;
                if value.is_null() {
                    return Ok(());
                }
                let mut partial = self.definition.state_serializer().decode(value)?;
                function.invoke(&mut [Argument::State(self.state.as_mut()), Argument::State(partial.as_mut())])
            }
        }
    }

    /// Absorb another accumulator of the same definition and group.
    pub fn combine(&mut self, mut other: GroupAccumulator) -> Result<(), AggregationError> {
        if !Arc::ptr_eq(&self.definition, &other.definition) {
            return Err(AggregationError::Execution(format!(
                "cannot combine {} with {}", self.definition.name(), other.definition.name()
            )));
        }
        match self.definition.merge_strategy() {
            MergeStrategy::Combine(function) => function.invoke(&mut [
                Argument::State(self.state.as_mut()),
                Argument::State(other.state.as_mut()),
            ]),
            MergeStrategy::IntermediateMerge { .. } => {
                let encoded = self.definition.state_serializer().encode(other.state.as_ref())?;
                self.add_intermediate(&Block::new(vec![encoded]), 0)
            }
        }
    }

    /// Append this group's serialized state to `out`.
    pub fn evaluate_intermediate(&self, out: &mut BlockBuilder) -> Result<(), AggregationError> {
        out.append(self.definition.state_serializer().encode(self.state.as_ref())?);
        Ok(())
    }

    /// Append the group's single output value to `out`. `confidence` only reaches approximate
    /// output functions; an exact definition without an output function emits its serialized
    /// state.
    pub fn evaluate_final(mut self, confidence: Confidence, out: &mut BlockBuilder) -> Result<(), AggregationError> {
        let before = out.position_count();
        let result = self.emit_output(confidence, out).and_then(|_| {
            let appended = out.position_count().saturating_sub(before);
            if appended != 1 {
                return Err(AggregationError::Execution(format!(
                    "{} output must append exactly one value, appended {}", self.definition.name(), appended
                )));
            }
            Ok(())
        });
        if result.is_err() {
            out.truncate(before);
        }
        result
    }

    fn emit_output(&mut self, confidence: Confidence, out: &mut BlockBuilder) -> Result<(), AggregationError> {
        match self.definition.output() {
            OutputFunction::Approximate(function) => function.invoke(&mut [
                Argument::State(self.state.as_mut()),
                Argument::Double(confidence.value()),
                Argument::Sink(&mut *out),
            ]),
            OutputFunction::Exact(Some(function)) => function.invoke(&mut [
                Argument::State(self.state.as_mut()),
                Argument::Sink(&mut *out),
            ]),
            OutputFunction::Exact(None) => {
                out.append(self.definition.state_serializer().encode(self.state.as_ref())?);
                Ok(())
            }
        }
    }

    fn columns<'p>(&self, page: &'p Page) -> Result<Vec<&'p Block>, AggregationError> {
        self.input_channels.iter().map(|&channel| page.block(channel)).collect()
    }

    fn accumulate(&mut self, columns: &[&Block], position: usize, sample_weight: i64) -> Result<bool, AggregationError> {
        let function = self.definition.input_function();
        let bound = bind_arguments(
            self.definition.input_parameters(),
            function.formals(),
            self.state.as_mut(),
            columns,
            position,
            sample_weight,
        )?;
        match bound {
            Some(mut args) => function.invoke(&mut args).map(|_| true),
            None => Ok(false),
        }
    }
}

/// Resolve one call's arguments from declared roles. `None` means a plain input channel was
/// null at `position` and the row must not reach the function.
fn bind_arguments<'a>(
    parameters: &[ParameterSpec],
    formals: &[FormalKind],
    state: &'a mut AccumulatorState,
    columns: &[&'a Block],
    position: usize,
    sample_weight: i64,
) -> Result<Option<Vec<Argument<'a>>>, AggregationError> {
    let mut state = Some(state);
    let mut channels = columns.iter().copied();
    let mut next_channel = move || channels.next().ok_or_else(|| {
        AggregationError::Execution("not enough channels bound".into())
    });

    let mut args = Vec::with_capacity(parameters.len());
    for (spec, formal) in parameters.iter().zip(formals) {
        let arg = match spec.role() {
            ParameterRole::State => Argument::State(state.take().ok_or_else(|| {
                AggregationError::Execution("state parameter bound twice".into())
            })?),
            ParameterRole::NullableInputChannel => Argument::Block(next_channel()?),
            ParameterRole::InputChannel => {
                let block = next_channel()?;
                if block.is_null(position)? {
                    return Ok(None);
                }
                match formal {
                    FormalKind::Block => Argument::Block(block),
                    FormalKind::Long => Argument::Long(block.get_long(position)?),
                    FormalKind::Double => Argument::Double(block.get_double(position)?),
                    FormalKind::Boolean => Argument::Boolean(block.get_boolean(position)?),
                    FormalKind::Slice => Argument::Slice(block.get_slice(position)?),
                    other => {
                        return Err(AggregationError::Execution(format!("cannot bind a channel to {}", other)));
                    }
                }
            }
            ParameterRole::BlockIndex => Argument::Int(i32::try_from(position).map_err(|_| {
                AggregationError::Execution(format!("position {} does not fit a block index", position))
            })?),
            ParameterRole::SampleWeight => Argument::Long(sample_weight),
        };
        args.push(arg);
    }
    Ok(Some(args))
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    use super::*;
    use crate::{
        aggregation::{downcast_ref, exact_arguments, FunctionHandle, ParameterDeclaration, StateCapability},
        types::{TypeRegistry, BIGINT, DOUBLE},
    };

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Trace { calls: Vec<(i64, f64, i32, i64)> }

    fn state() -> FormalKind { FormalKind::State(StateCapability::of::<Trace>()) }

    // records (value, nullable value or -1, index, weight) per call
    fn trace_definition(output: FunctionHandle) -> Arc<AggregationDefinition> {
        let input = FunctionHandle::new(
            "trace_input",
            vec![state(), FormalKind::Long, FormalKind::Block, FormalKind::Int, FormalKind::Long],
            |args| {
                let [s, value, nullable, index, weight] = exact_arguments::<5>(args)?;
                let index = index.int()?;
                let block = nullable.block()?;
                let second = if block.is_null(index as usize)? { -1.0 } else { block.get_double(index as usize)? };
                let entry = (value.long()?, second, index, weight.long()?);
                s.state_mut::<Trace>()?.calls.push(entry);
                Ok(())
            },
        );
        let combine = FunctionHandle::new("trace_combine", vec![state(), state()], |args| {
            let [a, b] = exact_arguments::<2>(args)?;
            let other = std::mem::take(&mut b.state_mut::<Trace>()?.calls);
            a.state_mut::<Trace>()?.calls.extend(other);
            Ok(())
        });
        let definition = AggregationDefinition::builder("trace", crate::types::SqlType::simple(BIGINT))
            .input_function(
                vec![
                    ParameterDeclaration::State,
                    ParameterDeclaration::channel(BIGINT),
                    ParameterDeclaration::nullable_channel(DOUBLE),
                    ParameterDeclaration::block_index(),
                    ParameterDeclaration::sample_weight(),
                ],
                input,
            )
            .combine_function(combine)
            .output_function(output)
            .json_state::<Trace>()
            .build(&TypeRegistry::with_builtins())
            .unwrap();
        Arc::new(definition)
    }

    fn calls_output() -> FunctionHandle {
        FunctionHandle::new("trace_output", vec![state(), FormalKind::Sink], |args| {
            let [s, sink] = exact_arguments::<2>(args)?;
            let n = s.state_ref::<Trace>()?.calls.len();
            sink.sink()?.append(n as i64);
            Ok(())
        })
    }

    fn page() -> Page {
        Page::new(vec![
            Block::new(vec![json!(10), Value::Null, json!(30)]),
            Block::new(vec![json!(0.5), json!(1.5), Value::Null]),
        ]).unwrap()
    }

    fn calls(acc: &GroupAccumulator) -> Vec<(i64, f64, i32, i64)> {
        downcast_ref::<Trace>(acc.state()).unwrap().calls.clone()
    }

    #[test]
    fn binds_roles_and_skips_null_plain_channels() {
        let mut acc = GroupAccumulator::new(trace_definition(calls_output()), vec![0, 1]).unwrap();
        let page = page();
        assert!(acc.add_input(&page, 0).unwrap());
        assert!(!acc.add_input(&page, 1).unwrap());
        assert!(acc.add_weighted_input(&page, 2, 4).unwrap());
        assert_eq!(calls(&acc), vec![(10, 0.5, 0, 1), (30, -1.0, 2, 4)]);
    }

    #[test]
    fn add_page_counts_accepted_rows() {
        let mut acc = GroupAccumulator::new(trace_definition(calls_output()), vec![0, 1]).unwrap();
        assert_eq!(acc.add_page(&page()).unwrap(), 2);
    }

    #[test]
    fn channel_mapping_must_match_definition() {
        let definition = trace_definition(calls_output());
        assert!(matches!(GroupAccumulator::new(definition.clone(), vec![0]), Err(AggregationError::Execution(_))));

        let mut acc = GroupAccumulator::new(definition, vec![0, 7]).unwrap();
        assert!(matches!(acc.add_input(&page(), 0), Err(AggregationError::Execution(_))));
    }

    #[test]
    fn combine_and_intermediate_round_trip() {
        let definition = trace_definition(calls_output());
        let page = page();

        let mut a = GroupAccumulator::new(definition.clone(), vec![0, 1]).unwrap();
        a.add_input(&page, 0).unwrap();
        let mut b = GroupAccumulator::new(definition.clone(), vec![0, 1]).unwrap();
        b.add_input(&page, 2).unwrap();

        let mut serialized = BlockBuilder::new();
        b.evaluate_intermediate(&mut serialized).unwrap();
        serialized.append_null();
        let serialized = serialized.build();

        let mut merged = GroupAccumulator::new(definition.clone(), vec![0, 1]).unwrap();
        merged.add_intermediate(&serialized, 0).unwrap();
        merged.add_intermediate(&serialized, 1).unwrap();
        merged.combine(a).unwrap();
        assert_eq!(calls(&merged), vec![(30, -1.0, 2, 1), (10, 0.5, 0, 1)]);

        let mut out = BlockBuilder::new();
        merged.evaluate_final(Confidence::full(), &mut out).unwrap();
        assert_eq!(out.build().values(), &[json!(2)]);
    }

    #[test]
    fn combine_rejects_other_definitions() {
        let mut a = GroupAccumulator::new(trace_definition(calls_output()), vec![0, 1]).unwrap();
        let b = GroupAccumulator::new(trace_definition(calls_output()), vec![0, 1]).unwrap();
        assert!(matches!(a.combine(b), Err(AggregationError::Execution(_))));
    }

    #[test]
    fn output_must_append_exactly_one_value() {
        let silent = FunctionHandle::new("silent", vec![state(), FormalKind::Sink], |_| Ok(()));
        let acc = GroupAccumulator::new(trace_definition(silent), vec![0, 1]).unwrap();
        let mut out = BlockBuilder::new();
        let err = acc.evaluate_final(Confidence::full(), &mut out).unwrap_err();
        assert_eq!(err, AggregationError::Execution("trace output must append exactly one value, appended 0".into()));
    }

    #[test]
    fn rejected_output_leaves_sink_untouched() {
        let twice = FunctionHandle::new("twice", vec![state(), FormalKind::Sink], |args| {
            let [_, sink] = exact_arguments::<2>(args)?;
            let sink = sink.sink()?;
            sink.append(1);
            sink.append(2);
            Ok(())
        });
        let acc = GroupAccumulator::new(trace_definition(twice), vec![0, 1]).unwrap();
        let mut out = BlockBuilder::new();
        out.append("earlier group");
        let err = acc.evaluate_final(Confidence::full(), &mut out).unwrap_err();
        assert_eq!(err, AggregationError::Execution("trace output must append exactly one value, appended 2".into()));
        assert_eq!(out.position_count(), 1);
        assert_eq!(out.build().values(), &[json!("earlier group")]);
    }

    #[test]
    fn confidence_bounds() {
        assert_eq!(Confidence::full().value(), 1.0);
        assert_eq!(Confidence::default(), Confidence::full());
        assert_eq!(Confidence::new(0.25).unwrap().value(), 0.25);
        for bad in [0.0, -0.5, 1.01, f64::NAN] {
            assert!(Confidence::new(bad).is_err(), "{bad}");
        }
    }
}

use std::{
    any::Any,
    fmt::{self, Display},
    sync::Arc,
};

use crate::{
    aggregation::{downcast_mut, downcast_ref, AccumulatorState, AggregationError, StateCapability},
    block::{Block, BlockBuilder},
};

/// Runtime tag describing one formal parameter of a function handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormalKind {
    State(StateCapability),
    /// Generic column block plus position; the only kind that can observe nulls.
    Block,
    Long,
    Double,
    Boolean,
    Slice,
    Int,
    /// Output sink.
    Sink,
}

/// Representations an input channel may bind to.
pub const SUPPORTED_CHANNEL_KINDS: [FormalKind; 5] = [
    FormalKind::Block,
    FormalKind::Long,
    FormalKind::Double,
    FormalKind::Boolean,
    FormalKind::Slice,
];

impl Display for FormalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormalKind::State(capability) => write!(f, "{}", capability),
            FormalKind::Block => f.write_str("Block"),
            FormalKind::Long => f.write_str("i64"),
            FormalKind::Double => f.write_str("f64"),
            FormalKind::Boolean => f.write_str("bool"),
            FormalKind::Slice => f.write_str("&[u8]"),
            FormalKind::Int => f.write_str("i32"),
            FormalKind::Sink => f.write_str("BlockBuilder"),
        }
    }
}

/// One bound argument of a call into a function handle.
pub enum Argument<'a> {
    State(&'a mut AccumulatorState),
    Block(&'a Block),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Slice(&'a [u8]),
    Int(i32),
    Sink(&'a mut BlockBuilder),
}

impl<'a> Argument<'a> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Argument::State(_) => "state",
            Argument::Block(_) => "Block",
            Argument::Long(_) => "i64",
            Argument::Double(_) => "f64",
            Argument::Boolean(_) => "bool",
            Argument::Slice(_) => "&[u8]",
            Argument::Int(_) => "i32",
            Argument::Sink(_) => "BlockBuilder",
        }
    }

    pub fn state_mut<S: Any>(&mut self) -> Result<&mut S, AggregationError> {
        match self {
            Argument::State(state) => downcast_mut::<S>(&mut **state),
            other => Err(Self::unexpected("state", other.kind_name())),
        }
    }

    pub fn state_ref<S: Any>(&self) -> Result<&S, AggregationError> {
        match self {
            Argument::State(state) => downcast_ref::<S>(&**state),
            other => Err(Self::unexpected("state", other.kind_name())),
        }
    }

    pub fn block(&self) -> Result<&'a Block, AggregationError> {
        match self {
            Argument::Block(block) => Ok(*block),
            other => Err(Self::unexpected("Block", other.kind_name())),
        }
    }

    pub fn long(&self) -> Result<i64, AggregationError> {
        match self {
            Argument::Long(v) => Ok(*v),
            other => Err(Self::unexpected("i64", other.kind_name())),
        }
    }

    pub fn double(&self) -> Result<f64, AggregationError> {
        match self {
            Argument::Double(v) => Ok(*v),
            other => Err(Self::unexpected("f64", other.kind_name())),
        }
    }

    pub fn boolean(&self) -> Result<bool, AggregationError> {
        match self {
            Argument::Boolean(v) => Ok(*v),
            other => Err(Self::unexpected("bool", other.kind_name())),
        }
    }

    pub fn slice(&self) -> Result<&'a [u8], AggregationError> {
        match self {
            Argument::Slice(v) => Ok(*v),
            other => Err(Self::unexpected("&[u8]", other.kind_name())),
        }
    }

    pub fn int(&self) -> Result<i32, AggregationError> {
        match self {
            Argument::Int(v) => Ok(*v),
            other => Err(Self::unexpected("i32", other.kind_name())),
        }
    }

    pub fn sink(&mut self) -> Result<&mut BlockBuilder, AggregationError> {
        match self {
            Argument::Sink(sink) => Ok(&mut **sink),
            other => Err(Self::unexpected("BlockBuilder", other.kind_name())),
        }
    }

    fn unexpected(expected: &str, actual: &str) -> AggregationError {
        AggregationError::Execution(format!("expected {} argument, got {}", expected, actual))
    }
}

/// Destructure a call's arguments into a fixed-size array.
pub fn exact_arguments<'s, 'a, const N: usize>(args: &'s mut [Argument<'a>]) -> Result<&'s mut [Argument<'a>; N], AggregationError> {
    let len = args.len();
    args.try_into()
        .map_err(|_| AggregationError::Execution(format!("expected {} arguments, got {}", N, len)))
}

type FunctionBody = dyn Fn(&mut [Argument<'_>]) -> Result<(), AggregationError> + Send + Sync;

/// A callable aggregation function together with the kinds of its formals.
///
/// The formals are what registration checks against declared roles; the body is trusted to
/// accept arguments of those kinds. Handles are free and public unless marked otherwise.
#[derive(Clone)]
pub struct FunctionHandle {
    name: String,
    formals: Vec<FormalKind>,
    is_static: bool,
    is_public: bool,
    body: Arc<FunctionBody>,
}

impl FunctionHandle {
    pub fn new<F>(name: &str, formals: Vec<FormalKind>, body: F) -> Self
    where
        F: Fn(&mut [Argument<'_>]) -> Result<(), AggregationError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            formals,
            is_static: true,
            is_public: true,
            body: Arc::new(body),
        }
    }

    /// Mark the handle as bound to a receiver instead of being a free function.
    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }

    /// Mark the handle as not externally callable.
    pub fn private(mut self) -> Self {
        self.is_public = false;
        self
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn formals(&self) -> &[FormalKind] { &self.formals }

    pub fn is_static(&self) -> bool { self.is_static }

    pub fn is_public(&self) -> bool { self.is_public }

    /// Formal kinds rendered as `(A, B, ...)`.
    pub fn signature(&self) -> String {
        let kinds: Vec<String> = self.formals.iter().map(|k| k.to_string()).collect();
        format!("({})", kinds.join(", "))
    }

    pub fn invoke(&self, args: &mut [Argument<'_>]) -> Result<(), AggregationError> {
        if args.len() != self.formals.len() {
            return Err(AggregationError::Execution(format!(
                "{} takes {} arguments, got {}", self.name, self.formals.len(), args.len()
            )));
        }
        (self.body)(args)
    }
}

impl fmt::Debug for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionHandle({}{})", self.name, self.signature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Tally { n: i64 }

    fn add_function() -> FunctionHandle {
        FunctionHandle::new(
            "add",
            vec![FormalKind::State(StateCapability::of::<Tally>()), FormalKind::Long],
            |args| {
                let [state, value] = exact_arguments::<2>(args)?;
                state.state_mut::<Tally>()?.n += value.long()?;
                Ok(())
            },
        )
    }

    #[test]
    fn invoke_binds_state_and_value() {
        let add = add_function();
        let mut state: Box<AccumulatorState> = Box::new(Tally::default());
        add.invoke(&mut [Argument::State(state.as_mut()), Argument::Long(4)]).unwrap();
        add.invoke(&mut [Argument::State(state.as_mut()), Argument::Long(3)]).unwrap();
        assert_eq!(downcast_ref::<Tally>(state.as_ref()).unwrap().n, 7);
        assert_eq!(add.signature(), "(Tally, i64)");
        assert_eq!(format!("{add:?}"), "FunctionHandle(add(Tally, i64))");
    }

    #[test]
    fn invoke_rejects_wrong_arity_and_kind() {
        let add = add_function();
        let mut state: Box<AccumulatorState> = Box::new(Tally::default());
        assert!(matches!(
            add.invoke(&mut [Argument::State(state.as_mut())]),
            Err(AggregationError::Execution(_))
        ));
        let err = add.invoke(&mut [Argument::State(state.as_mut()), Argument::Double(1.0)]).unwrap_err();
        assert_eq!(err, AggregationError::Execution("expected i64 argument, got f64".into()));
    }

    #[test]
    fn visibility_markers() {
        let f = add_function();
        assert!(f.is_static() && f.is_public());
        let f = f.instance().private();
        assert!(!f.is_static() && !f.is_public());
    }
}

use std::fmt::Display;

/// Failures raised while binding an aggregation or while driving one of its functions.
///
/// The first four kinds are structural: they are only produced while a definition is being
/// built, never while rows are processed. `Execution` covers a bound function body being handed
/// arguments it cannot use.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationError {
    /// Invalid combination of role markers on one parameter.
    MalformedParameter { function: String, message: String },
    /// A function handle's arity or formal kinds disagree with its declared roles or state.
    SignatureMismatch {
        function: String,
        position: Option<usize>,
        expected: String,
        actual: String,
    },
    /// Mutually exclusive or required definition fields violated.
    Configuration(String),
    /// The type catalog does not know the declared type name.
    UnknownType(String),
    Execution(String),
}

impl AggregationError {
    pub fn malformed(function: &str, message: impl Into<String>) -> Self {
        Self::MalformedParameter { function: function.to_string(), message: message.into() }
    }

    pub fn mismatch(function: &str, position: Option<usize>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::SignatureMismatch {
            function: function.to_string(),
            position,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn err<T>(self) -> Result<T, AggregationError> {
        Err(self)
    }
}

impl Display for AggregationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationError::MalformedParameter { function, message } =>
                write!(f, "MalformedParameter: {} in {}", message, function),
            AggregationError::SignatureMismatch { function, position: Some(p), expected, actual } =>
                write!(f, "SignatureMismatch: {} parameter {} must be {}, got {}", function, p, expected, actual),
            AggregationError::SignatureMismatch { function, position: None, expected, actual } =>
                write!(f, "SignatureMismatch: {} must have the signature {}, got {}", function, expected, actual),
            AggregationError::Configuration(message) => write!(f, "Configuration: {}", message),
            AggregationError::UnknownType(name) => write!(f, "UnknownType: '{}'", name),
            AggregationError::Execution(message) => write!(f, "Execution: {}", message),
        }
    }
}

impl std::error::Error for AggregationError {}

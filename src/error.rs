use thiserror::Error;

/// Model output that could not be read as a turn at all.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("could not find {0} in the model output")]
    MissingSection(&'static str),

    #[error("no action call found in the model output")]
    NoActionCall,
}

/// Everything that can finalize a turn as failed.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The model named an action outside the catalog.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Arity or type mismatch; the browser is never touched.
    #[error("bad arguments for {action}: {detail}")]
    BadArguments { action: String, detail: String },

    /// The browser operation itself raised.
    #[error("execution failed: {0}")]
    Execution(String),

    /// Best-effort diff computation failed; logged, never fails a turn.
    #[error("could not compute page diff: {0}")]
    Diff(String),
}

//! Error hierarchy for the bridge.
//!
//! Three layers, matching the phases a failure can occur in:
//!
//! - [`ScriptError`]: a failure inside one script operation or callable.
//!   Includes the intentional recoverable class ([`ScriptError::Fault`])
//!   a dissector raises to abort the current packet.
//! - [`CallFailure`]: a [`ScriptError`] enriched with the traceback
//!   captured by the protected-call machinery.
//! - [`BridgeError`]: the transparent top-level wrapper the lifecycle API
//!   returns.

use thiserror::Error;
use wirescript_engine::Fault;

use crate::handle::HandleKind;

/// A failure raised by a script operation or callable.
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    /// An argument had the wrong script type.
    #[error("bad argument #{index}: {expected} expected, got {found}")]
    ArgError {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// A handle argument carried the wrong kind tag.
    #[error("bad argument #{index}: {expected} handle expected, got {found}")]
    TypeMismatch {
        index: usize,
        expected: HandleKind,
        found: HandleKind,
    },

    /// A handle outlived the table it was boxed in.
    #[error("stale {kind} handle (slot {slot})")]
    StaleHandle { kind: HandleKind, slot: u32 },

    /// A script-level runtime error with a free-form message.
    #[error("{0}")]
    Runtime(String),

    /// A recoverable dissection fault, re-raised through the bridge
    /// without loss.
    #[error(transparent)]
    Fault(#[from] Fault),
}

impl ScriptError {
    pub fn runtime(msg: impl Into<String>) -> Self {
        ScriptError::Runtime(msg.into())
    }
}

/// Call frames captured when a protected call fails, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Traceback(Vec<String>);

impl Traceback {
    pub fn from_frames(frames: Vec<String>) -> Self {
        Traceback(frames)
    }

    pub fn frames(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Traceback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "traceback:")?;
        for frame in &self.0 {
            writeln!(f, "\tin {frame}")?;
        }
        Ok(())
    }
}

/// A failed protected call: the original error plus the traceback that was
/// live when it surfaced.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct CallFailure {
    pub error: ScriptError,
    pub traceback: Traceback,
}

impl CallFailure {
    /// Maps a failure onto the engine's fault type, as dispatch reports it.
    /// An intentional fault passes through verbatim; anything else becomes
    /// a dissector error carrying the message and traceback.
    pub fn into_fault(self) -> Fault {
        match self.error {
            ScriptError::Fault(fault) => fault,
            other => Fault::Dissector(format!("{other}\n{}", self.traceback)),
        }
    }
}

/// Top-level error for the lifecycle and loading API.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Call(#[from] CallFailure),

    #[error(transparent)]
    Fault(#[from] Fault),

    /// A module could not be produced by the loader.
    #[error("module load failed: {0}")]
    Load(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_passes_through_verbatim() {
        let failure = CallFailure {
            error: ScriptError::Fault(Fault::Malformed("short header".into())),
            traceback: Traceback::from_frames(vec!["dissect_demo".into()]),
        };
        assert_eq!(failure.into_fault(), Fault::Malformed("short header".into()));
    }

    #[test]
    fn script_error_becomes_dissector_fault_with_traceback() {
        let failure = CallFailure {
            error: ScriptError::runtime("boom"),
            traceback: Traceback::from_frames(vec!["inner".into(), "outer".into()]),
        };
        match failure.into_fault() {
            Fault::Dissector(msg) => {
                assert!(msg.contains("boom"));
                assert!(msg.contains("inner"));
                assert!(msg.contains("outer"));
            }
            other => panic!("unexpected fault: {other:?}"),
        }
    }

    #[test]
    fn messages_name_the_argument() {
        let err = ScriptError::TypeMismatch {
            index: 3,
            expected: HandleKind::Field,
            found: HandleKind::Protocol,
        };
        assert_eq!(
            err.to_string(),
            "bad argument #3: Field handle expected, got Protocol"
        );
    }
}

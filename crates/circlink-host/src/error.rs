use std::path::PathBuf;

use circlink_abi::SUPPORTED_REVISIONS;

// LoadFailed, MissingSymbol and RevisionMismatch are fatal configuration
// errors, always detected before any domain call executes. Call carries the
// module's own error text verbatim. No retry policy at this layer.
#[derive(Debug)]
pub enum BridgeError {
    LoadFailed {
        path: PathBuf,
        reason: String,
    },
    MissingSymbol {
        name: String,
    },
    RevisionMismatch {
        found: u64,
    },
    Call(String),
    ConfigIdBusy(u64),
    ConfigIdMismatch {
        dispatcher: u64,
        call: u64,
    },
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::LoadFailed { path, reason } => {
                write!(f, "failed to load module {}: {reason}", path.display())
            }
            BridgeError::MissingSymbol { name } => {
                write!(f, "module does not export entry point {name:?}")
            }
            BridgeError::RevisionMismatch { found } => write!(
                f,
                "module speaks protocol revision {found}, host supports {SUPPORTED_REVISIONS:?}"
            ),
            BridgeError::Call(msg) => write!(f, "call failed: {msg}"),
            BridgeError::ConfigIdBusy(id) => {
                write!(f, "a hint handler is already registered for config id {id}")
            }
            BridgeError::ConfigIdMismatch { dispatcher, call } => write!(
                f,
                "hint dispatcher is registered for config id {dispatcher}, call uses {call}"
            ),
        }
    }
}

impl std::error::Error for BridgeError {}

use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown asset slot: {0}")]
    UnknownSlot(String),

    #[error("slot {slot} is not valid for {kind}")]
    SlotNotOwned { kind: String, slot: String },

    #[error("empty identifier")]
    EmptyId,
}

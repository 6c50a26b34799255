use thiserror::Error;

// Error
//------------------------------------------------------------------------------

/// Failure modes shared by every reader and writer.
///
/// `NotFound` means nothing symbol-like was located. `Format` and `Checksum` are only
/// produced once a candidate symbol has been located, so callers can tell "nothing there"
/// apart from "something there but unreadable".
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum BarcodeError {
    #[error("No barcode found")]
    NotFound,

    #[error("Barcode structure violates its format")]
    Format,

    #[error("Checksum or error correction failed")]
    Checksum,

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Arithmetic error: {0}")]
    Arithmetic(&'static str),
}

impl BarcodeError {
    pub(crate) fn illegal(msg: impl Into<String>) -> Self {
        Self::IllegalArgument(msg.into())
    }

    // Ranks errors so the most informative one survives when several readers fail
    pub(crate) fn specificity(&self) -> u8 {
        match self {
            Self::NotFound => 0,
            Self::Format => 1,
            Self::Checksum => 2,
            Self::Arithmetic(_) => 3,
            Self::IllegalArgument(_) => 4,
        }
    }
}

pub type BarcodeResult<T> = Result<T, BarcodeError>;

#[cfg(test)]
mod error_tests {
    use super::BarcodeError;

    #[test]
    fn test_display() {
        assert_eq!(BarcodeError::NotFound.to_string(), "No barcode found");
        assert_eq!(BarcodeError::illegal("bad width").to_string(), "Illegal argument: bad width");
    }

    #[test]
    fn test_specificity() {
        assert!(BarcodeError::Checksum.specificity() > BarcodeError::Format.specificity());
        assert!(BarcodeError::Format.specificity() > BarcodeError::NotFound.specificity());
    }
}

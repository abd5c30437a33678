use core::fmt;

/// Driver error, generic over the bus error type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error<E> {
    /// A register read or write failed.
    Bus(E),
    /// A multi-step mode transition stopped after a register write failed.
    ///
    /// Registers written before the failure keep their new values. Re-read status before trusting
    /// the charger's mode.
    SequenceAborted(E),
    /// The property is not readable or not writable, or the value has the wrong type.
    Unsupported,
}

impl<E> Error<E> {
    /// Mark a bus failure as having interrupted a register sequence.
    pub(crate) fn aborted(self) -> Self {
        match self {
            Error::Bus(e) => Error::SequenceAborted(e),
            other => other,
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "register access failed: {:?}", e),
            Error::SequenceAborted(e) => write!(f, "mode sequence aborted: {:?}", e),
            Error::Unsupported => f.write_str("unsupported property"),
        }
    }
}

/// Result alias used throughout the driver.
pub type Result<T, E> = core::result::Result<T, Error<E>>;

//! Error taxonomy for the fallible boundary operations (ROM loading,
//! save-state loading). The core itself is infallible once constructed —
//! every address dispatches to some handler, so no error path exists inside
//! `tick`.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum RomError {
    /// The file is shorter than the minimum cartridge size (0x8000 bytes).
    TooShort { len: usize },
    /// The cartridge type byte at 0x0147 is not a supported MBC.
    UnsupportedCartridgeType(u8),
    Io(io::Error),
}

impl fmt::Display for RomError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RomError::TooShort { len } => {
                write!(f, "ROM is {} bytes, shorter than the minimum 0x8000", len)
            }
            RomError::UnsupportedCartridgeType(kind) => {
                write!(f, "unsupported cartridge type 0x{:02X}", kind)
            }
            RomError::Io(e) => write!(f, "I/O error loading ROM: {}", e),
        }
    }
}

impl std::error::Error for RomError {}

impl From<io::Error> for RomError {
    fn from(e: io::Error) -> Self {
        RomError::Io(e)
    }
}

#[derive(Debug)]
pub enum SaveStateError {
    /// The computed schema digest does not match the one stored in the file.
    DigestMismatch,
    /// The blob is the wrong size to contain a digest plus every component.
    WrongSize { expected: usize, actual: usize },
    /// A save state was loaded before a cartridge was attached.
    NoCartridgeLoaded,
    Io(io::Error),
}

impl fmt::Display for SaveStateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SaveStateError::DigestMismatch => write!(f, "save-state schema digest mismatch"),
            SaveStateError::WrongSize { expected, actual } => write!(
                f,
                "save-state is {} bytes, expected {}",
                actual, expected
            ),
            SaveStateError::NoCartridgeLoaded => {
                write!(f, "cannot load a save state before a cartridge is attached")
            }
            SaveStateError::Io(e) => write!(f, "I/O error loading save state: {}", e),
        }
    }
}

impl std::error::Error for SaveStateError {}

impl From<io::Error> for SaveStateError {
    fn from(e: io::Error) -> Self {
        SaveStateError::Io(e)
    }
}

//! Result and errors.
use std::fmt::{self, Display, Formatter};

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// VM error during interpreter loop.
    Runtime(&'static str),
    /// Attempt to load a program that can't fit in memory.
    LargeProgram { size: usize },
    /// Memory was accessed outside of the 4KiB address space.
    OutOfBounds { address: usize },
    /// Subroutine call with every stack frame in use.
    StackOverflow,
    /// Return from subroutine with an empty call stack.
    StackUnderflow,
    /// Invalid configuration value.
    Config(String),
    Io(std::io::Error),
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runtime(msg) => write!(f, "runtime error: {}", msg),
            Self::LargeProgram { size } => {
                write!(f, "program too large for VM memory: {size} bytes")
            }
            Self::OutOfBounds { address } => {
                write!(f, "memory access out of bounds: 0x{address:04X}")
            }
            Self::StackOverflow => write!(f, "call stack overflow"),
            Self::StackUnderflow => write!(f, "call stack underflow"),
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Chip8Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Chip8Error {
    fn from(err: std::io::Error) -> Self {
        Chip8Error::Io(err)
    }
}

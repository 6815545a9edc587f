use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// The file is shorter than the location + timestamp tables.
    TooShort,
    /// A chunk header named a compression byte outside `{1, 2, 3}`.
    UnknownCompression(u8),
    /// A region's rebuilt sector count for one entry didn't fit in a byte.
    SectorCountOverflow { index: usize, sectors: usize },
    /// An `InhabitedTime` field decoded to a negative value.
    NegativeInhabitedTime(i64),
    Nbt(mcatrim_nbt::Error),
    /// Annotates an inner error with the region file name it happened in,
    /// mirroring `commands.py`'s note-on-exception behaviour.
    InRegion { name: String, source: Box<Error> },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn in_region(self, name: impl Into<String>) -> Error {
        Error::InRegion {
            name: name.into(),
            source: Box::new(self),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<mcatrim_nbt::Error> for Error {
    fn from(err: mcatrim_nbt::Error) -> Error {
        Error::Nbt(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::TooShort => write!(f, "region file shorter than the location/timestamp tables"),
            Error::UnknownCompression(scheme) => {
                write!(f, "compression scheme ({scheme}) was not recognised for chunk")
            }
            Error::SectorCountOverflow { index, sectors } => write!(
                f,
                "chunk at index {index} needs {sectors} sectors, which does not fit in one byte"
            ),
            Error::NegativeInhabitedTime(v) => {
                write!(f, "InhabitedTime was negative ({v})")
            }
            Error::Nbt(e) => write!(f, "{e}"),
            Error::InRegion { name, source } => write!(f, "region '{name}': {source}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Nbt(e) => Some(e),
            Error::InRegion { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A filesystem failure tied to a specific path, used by [`crate::manager`]
/// for backup/copy failures that should be reported but not abort the run.
#[derive(Debug)]
pub struct PathError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.source)
    }
}

impl std::error::Error for PathError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

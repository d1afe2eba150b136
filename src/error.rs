//! Error types

use crate::binary::read::ReadEof;
use crate::cff::charstring::CharStringError;
use crate::tag::DisplayTag;
use std::fmt;

/// Errors that originate when parsing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    BadEof,
    BadValue,
    BadVersion,
    BadOffset,
    BadIndex,
    LimitExceeded,
    MissingValue,
    MissingTable(u32),
    CompressionError,
    NotImplemented,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::LimitExceeded => write!(f, "limit exceeded"),
            ParseError::MissingValue => write!(f, "an expected data value was missing"),
            ParseError::MissingTable(tag) => {
                write!(f, "font is missing '{}' table", DisplayTag(*tag))
            }
            ParseError::CompressionError => write!(f, "compression error"),
            ParseError::NotImplemented => write!(f, "feature not implemented"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors that originate when writing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum WriteError {
    BadValue,
    NotImplemented,
    PlaceholderMismatch,
}

impl From<std::num::TryFromIntError> for WriteError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        WriteError::BadValue
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::BadValue => write!(f, "write: bad value"),
            WriteError::NotImplemented => write!(f, "writing in this format is not implemented"),
            WriteError::PlaceholderMismatch => {
                write!(f, "data written to placeholder did not match expected size")
            }
        }
    }
}

impl std::error::Error for WriteError {}

/// Enum that can hold read (`ParseError`) and write errors
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ReadWriteError {
    Read(ParseError),
    Write(WriteError),
}

impl From<ParseError> for ReadWriteError {
    fn from(error: ParseError) -> Self {
        ReadWriteError::Read(error)
    }
}

impl From<WriteError> for ReadWriteError {
    fn from(error: WriteError) -> Self {
        ReadWriteError::Write(error)
    }
}

impl From<ReadEof> for ReadWriteError {
    fn from(error: ReadEof) -> Self {
        ReadWriteError::Read(ParseError::from(error))
    }
}

impl fmt::Display for ReadWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadWriteError::Read(err) => write!(f, "read error: {}", err),
            ReadWriteError::Write(err) => write!(f, "write error: {}", err),
        }
    }
}

impl std::error::Error for ReadWriteError {}

/// Error returned when a font can't be opened
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum OpenError {
    /// The font data is truncated or otherwise invalid.
    Parse(ParseError),
    /// The requested font does not exist in the collection.
    FontIndexOutOfRange { index: usize, num_fonts: usize },
}

impl From<ParseError> for OpenError {
    fn from(error: ParseError) -> Self {
        OpenError::Parse(error)
    }
}

impl From<ReadEof> for OpenError {
    fn from(error: ReadEof) -> Self {
        OpenError::Parse(ParseError::from(error))
    }
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenError::Parse(err) => write!(f, "unable to open font: {}", err),
            OpenError::FontIndexOutOfRange { index, num_fonts } => write!(
                f,
                "font index {} is out of range, the collection holds {} font(s)",
                index, num_fonts
            ),
        }
    }
}

impl std::error::Error for OpenError {}

/// The reason a path command was rejected
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum PathErrorKind {
    /// The subpath holds no commands.
    EmptySubpath,
    /// The subpath does not start with a move.
    MissingMoveTo,
    /// The command tag is not one of `M`, `L`, `C`, `Q`, `Z`.
    UnknownCommand,
    /// The command has the wrong number of arguments.
    BadArity { expected: usize, found: usize },
    /// A move appears after the start of the subpath.
    MoveInsideSubpath,
    /// A command follows the close of the subpath.
    CommandAfterClose,
    /// A coordinate is not a finite number.
    NonFiniteCoordinate,
}

/// Error returned when an outline description is malformed
#[derive(Clone, PartialEq, Debug)]
pub struct MalformedPathError {
    /// Index of the offending subpath within the outline.
    pub subpath: usize,
    /// Index of the offending command within the subpath, if there is one.
    pub command: Option<usize>,
    /// The tag of the offending command as supplied.
    pub tag: String,
    pub kind: PathErrorKind,
}

impl fmt::Display for PathErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathErrorKind::EmptySubpath => write!(f, "subpath is empty"),
            PathErrorKind::MissingMoveTo => write!(f, "subpath must begin with a move"),
            PathErrorKind::UnknownCommand => write!(f, "unrecognised command"),
            PathErrorKind::BadArity { expected, found } => {
                write!(f, "expected {} argument(s), found {}", expected, found)
            }
            PathErrorKind::MoveInsideSubpath => write!(f, "move inside subpath"),
            PathErrorKind::CommandAfterClose => write!(f, "command after close"),
            PathErrorKind::NonFiniteCoordinate => write!(f, "coordinate is not finite"),
        }
    }
}

impl fmt::Display for MalformedPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command {
            Some(command) => write!(
                f,
                "malformed path: subpath {}, command {} ('{}'): {}",
                self.subpath, command, self.tag, self.kind
            ),
            None => write!(f, "malformed path: subpath {}: {}", self.subpath, self.kind),
        }
    }
}

impl std::error::Error for MalformedPathError {}

/// Error returned when an outline can't be encoded as a charstring
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum CompilationError {
    /// The outline has no subpaths.
    EmptyOutline,
    /// The outline has fewer than two points.
    TooFewPoints(usize),
    /// A value can't be represented as a charstring operand.
    ValueOutOfRange,
    Write(WriteError),
}

impl From<WriteError> for CompilationError {
    fn from(error: WriteError) -> Self {
        CompilationError::Write(error)
    }
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompilationError::EmptyOutline => write!(f, "outline is empty"),
            CompilationError::TooFewPoints(count) => {
                write!(f, "outline has {} point(s), at least 2 are required", count)
            }
            CompilationError::ValueOutOfRange => {
                write!(f, "value is outside the range of a charstring operand")
            }
            CompilationError::Write(err) => write!(f, "charstring: {}", err),
        }
    }
}

impl std::error::Error for CompilationError {}

/// Error returned when a glyph can't be spliced into the font's tables
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum RegistrationError {
    /// The font does not have CFF outlines.
    NotCff,
    /// A glyph with the requested name already exists.
    DuplicateGlyphName(String),
    /// The font can't hold any more glyphs.
    TooManyGlyphs,
    /// The font uses a predefined charset that new names can't be appended to.
    PredefinedCharset,
    /// The CID-keyed font's charset has no CIDs to derive the next one from.
    EmptyCharset,
    Parse(ParseError),
    Write(WriteError),
}

impl From<ParseError> for RegistrationError {
    fn from(error: ParseError) -> Self {
        RegistrationError::Parse(error)
    }
}

impl From<WriteError> for RegistrationError {
    fn from(error: WriteError) -> Self {
        RegistrationError::Write(error)
    }
}

impl From<ReadWriteError> for RegistrationError {
    fn from(error: ReadWriteError) -> Self {
        match error {
            ReadWriteError::Read(err) => RegistrationError::Parse(err),
            ReadWriteError::Write(err) => RegistrationError::Write(err),
        }
    }
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::NotCff => write!(f, "font does not contain CFF outlines"),
            RegistrationError::DuplicateGlyphName(name) => {
                write!(f, "glyph '{}' already exists", name)
            }
            RegistrationError::TooManyGlyphs => write!(f, "font has too many glyphs"),
            RegistrationError::PredefinedCharset => {
                write!(f, "font uses a predefined expert charset")
            }
            RegistrationError::EmptyCharset => {
                write!(f, "charset is empty, unable to derive the next CID")
            }
            RegistrationError::Parse(err) => write!(f, "registration: {}", err),
            RegistrationError::Write(err) => write!(f, "registration: {}", err),
        }
    }
}

impl std::error::Error for RegistrationError {}

/// Error returned when GSUB text can't be turned back into a table
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct TranscodeError {
    /// Position in the text reported by the parser, as `(line, column)`.
    pub position: Option<(usize, usize)>,
    /// Path to the offending table field, such as `LookupList[2].SubTables[0]`.
    pub field: Option<String>,
    pub message: String,
}

impl TranscodeError {
    pub(crate) fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        TranscodeError {
            position: None,
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub(crate) fn at(position: (usize, usize), message: impl Into<String>) -> Self {
        TranscodeError {
            position: Some(position),
            field: None,
            message: message.into(),
        }
    }

    pub(crate) fn message(message: impl Into<String>) -> Self {
        TranscodeError {
            position: None,
            field: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for TranscodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GSUB text")?;
        if let Some((line, column)) = self.position {
            write!(f, " at line {} column {}", line, column)?;
        }
        if let Some(field) = &self.field {
            write!(f, " in {}", field)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for TranscodeError {}

/// Error returned from `FontSession` operations
#[derive(Clone, PartialEq, Debug)]
pub enum SessionError {
    Open(OpenError),
    /// The session has already been closed.
    SessionClosed,
    MalformedPath(MalformedPathError),
    Compilation(CompilationError),
    /// The font's charset has no entries to derive a new CID from.
    EmptyCharset,
    Registration(RegistrationError),
    Transcode(TranscodeError),
    /// An existing charstring could not be interpreted.
    Outline(CharStringError),
    /// Reading or writing a table outside of the operations above failed.
    ReadWrite(ReadWriteError),
}

impl From<OpenError> for SessionError {
    fn from(error: OpenError) -> Self {
        SessionError::Open(error)
    }
}

impl From<MalformedPathError> for SessionError {
    fn from(error: MalformedPathError) -> Self {
        SessionError::MalformedPath(error)
    }
}

impl From<CompilationError> for SessionError {
    fn from(error: CompilationError) -> Self {
        SessionError::Compilation(error)
    }
}

impl From<RegistrationError> for SessionError {
    fn from(error: RegistrationError) -> Self {
        match error {
            RegistrationError::EmptyCharset => SessionError::EmptyCharset,
            error => SessionError::Registration(error),
        }
    }
}

impl From<TranscodeError> for SessionError {
    fn from(error: TranscodeError) -> Self {
        SessionError::Transcode(error)
    }
}

impl From<CharStringError> for SessionError {
    fn from(error: CharStringError) -> Self {
        SessionError::Outline(error)
    }
}

impl From<ReadWriteError> for SessionError {
    fn from(error: ReadWriteError) -> Self {
        SessionError::ReadWrite(error)
    }
}

impl From<ParseError> for SessionError {
    fn from(error: ParseError) -> Self {
        SessionError::ReadWrite(ReadWriteError::Read(error))
    }
}

impl From<WriteError> for SessionError {
    fn from(error: WriteError) -> Self {
        SessionError::ReadWrite(ReadWriteError::Write(error))
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Open(err) => err.fmt(f),
            SessionError::SessionClosed => write!(f, "font session has been closed"),
            SessionError::MalformedPath(err) => err.fmt(f),
            SessionError::Compilation(err) => write!(f, "compilation failed: {}", err),
            SessionError::EmptyCharset => {
                write!(f, "charset is empty, unable to derive the next CID")
            }
            SessionError::Registration(err) => write!(f, "registration failed: {}", err),
            SessionError::Transcode(err) => err.fmt(f),
            SessionError::Outline(err) => write!(f, "unable to read glyph outline: {}", err),
            SessionError::ReadWrite(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Open(err) => Some(err),
            SessionError::MalformedPath(err) => Some(err),
            SessionError::Compilation(err) => Some(err),
            SessionError::Registration(err) => Some(err),
            SessionError::Transcode(err) => Some(err),
            SessionError::Outline(err) => Some(err),
            SessionError::ReadWrite(err) => Some(err),
            SessionError::SessionClosed | SessionError::EmptyCharset => None,
        }
    }
}

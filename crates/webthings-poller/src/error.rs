use std::borrow::Cow;
use std::fmt;

/// All possible error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A scheduler cannot perform the requested transition.
    Scheduler,
    /// A property value could not be published.
    Publish,
    /// A property sink is missing or does not match the thing description.
    Binding,
    /// An invalid configuration value.
    Config,
}

impl ErrorKind {
    const fn description(self) -> &'static str {
        match self {
            Self::Scheduler => "Scheduler",
            Self::Publish => "Publish",
            Self::Binding => "Binding",
            Self::Config => "Config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A polling or publication error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    description: Cow<'static, str>,
    info: Option<Cow<'static, str>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)?;
        if let Some(info) = &self.info {
            write!(f, " ({info})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description.
    #[must_use]
    pub fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            description: description.into(),
            info: None,
        }
    }

    /// Creates an [`Error`] from an [`ErrorKind`], a description and
    /// additional information about the underlying failure.
    #[must_use]
    pub fn with_info(
        kind: ErrorKind,
        description: impl Into<Cow<'static, str>>,
        info: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            info: Some(info.into()),
        }
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A specialized `Result` type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

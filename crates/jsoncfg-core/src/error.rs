//! Error types for jsoncfg
//!
//! Loading errors (syntax, include cycles, expansion failures) abort the whole
//! load and carry as much context as the loader had at hand: the dotted key
//! path, the file and position, and the chain of including files.
//!
//! Accessor errors are different: they are collected on a
//! [`ConfigObject`](crate::ConfigObject) and reported together, see
//! [`AccessError`].

use std::fmt;

/// Result type alias for jsoncfg operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for loading and expanding configuration documents
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Dotted key path in the document where the error occurred (e.g., "server.listen")
    pub path: Option<String>,
    /// Source location (file, line, column) if available
    pub source_location: Option<SourceLocation>,
    /// Rendered source excerpt pointing at the offending position
    pub snippet: Option<String>,
    /// Files that included the failing document, innermost first
    pub included_from: Vec<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Location in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    /// Byte offset into the file
    pub offset: Option<usize>,
}

impl SourceLocation {
    /// A location naming only the file
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
            offset: None,
        }
    }
}

/// Categories of errors that can occur while loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed JSON
    Syntax,
    /// A document was re-entered while it was still being loaded
    IncludeCycle,
    /// An expression array could not be expanded
    Expansion(ExpansionErrorKind),
    /// A value outside the supported set, or in an unexpected position
    UnsupportedValue,
    /// A lookup path does not exist in the document
    PathNotFound,
    /// I/O error opening or reading a document
    Io,
}

/// Specific expansion error categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionErrorKind {
    /// Wrong number or type of arguments
    InvalidArguments { expander: String, message: String },
    /// A referenced environment variable is unset and no default was given
    EnvNotSet { var_name: String },
    /// A boolean-typed environment expression did not expand to a boolean literal
    BadBoolean { value: String },
    /// An include name could not be resolved to an existing file
    IncludeNotFound { name: String },
    /// A custom expander returned an error
    Custom { expander: String, message: String },
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            source_location: None,
            snippet: None,
            included_from: Vec::new(),
            help: None,
            cause: None,
        }
    }

    /// Create a JSON syntax error for the named document
    pub fn syntax(file: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::Syntax);
        err.source_location = Some(SourceLocation::file(file));
        err.cause = Some(message.into());
        err
    }

    /// Create an include cycle error from the chain of documents being loaded
    pub fn include_cycle(chain: Vec<String>) -> Self {
        let mut err = Self::new(ErrorKind::IncludeCycle);
        err.help = Some("Remove one of the _fileobj expressions forming the cycle".into());
        err.cause = Some(format!("Chain: {}", chain.join(" → ")));
        err
    }

    /// Create an invalid arguments error for an expander
    pub fn invalid_arguments(expander: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Expansion(ExpansionErrorKind::InvalidArguments {
            expander: expander.into(),
            message: message.into(),
        }))
    }

    /// Create an unset environment variable error
    pub fn env_not_set(var_name: impl Into<String>) -> Self {
        let var = var_name.into();
        let mut err = Self::new(ErrorKind::Expansion(ExpansionErrorKind::EnvNotSet {
            var_name: var.clone(),
        }));
        err.help = Some(format!(
            "Set the {} environment variable or provide a default: [\"_env\", \"${{{}}}\", \"value\"]",
            var, var
        ));
        err
    }

    /// Create a bad boolean error for a boolean-typed environment expression
    pub fn bad_boolean(value: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::Expansion(ExpansionErrorKind::BadBoolean {
            value: value.into(),
        }));
        err.help = Some("Use one of: true, false, t, f, 1, 0".into());
        err
    }

    /// Create an include not found error
    pub fn include_not_found(name: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::Expansion(ExpansionErrorKind::IncludeNotFound {
            name: name.into(),
        }));
        err.help = Some(
            "Check the path relative to the including file, or add its directory to JSONCFG_INCLUDE_PATH"
                .into(),
        );
        err
    }

    /// Create a custom expander error
    pub fn expander_custom(expander: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Expansion(ExpansionErrorKind::Custom {
            expander: expander.into(),
            message: message.into(),
        }))
    }

    /// Create an unsupported value error
    pub fn unsupported_value(message: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::UnsupportedValue);
        err.cause = Some(message.into());
        err
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        let path_str = path.into();
        let mut err = Self::new(ErrorKind::PathNotFound);
        err.help = Some(format!(
            "Check that '{}' exists in the configuration",
            path_str
        ));
        err.path = Some(path_str);
        err
    }

    /// Create an I/O error for the named document
    pub fn io(file: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::Io);
        err.source_location = Some(SourceLocation::file(file));
        err.cause = Some(message.into());
        err
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add source location to the error
    pub fn with_source_location(mut self, loc: SourceLocation) -> Self {
        self.source_location = Some(loc);
        self
    }

    /// Attach a rendered source excerpt
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Fill in the key path and file if an inner frame has not already done so
    pub(crate) fn in_document(mut self, file: &str, key_path: &str) -> Self {
        if self.path.is_none() && !key_path.is_empty() {
            self.path = Some(key_path.to_string());
        }
        if self.source_location.is_none() {
            self.source_location = Some(SourceLocation::file(file));
        }
        self
    }

    /// Record that the failing document was included from `file`
    pub(crate) fn included_from(mut self, file: impl Into<String>) -> Self {
        self.included_from.push(file.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Syntax => write!(f, "Syntax error in JSON document")?,
            ErrorKind::IncludeCycle => write!(f, "Include cycle detected")?,
            ErrorKind::Expansion(e) => match e {
                ExpansionErrorKind::InvalidArguments { expander, message } => {
                    write!(f, "Invalid {} expression: {}", expander, message)?
                }
                ExpansionErrorKind::EnvNotSet { var_name } => {
                    write!(f, "Environment variable not set: {}", var_name)?
                }
                ExpansionErrorKind::BadBoolean { value } => {
                    write!(f, "Expected a boolean, got {:?}", value)?
                }
                ExpansionErrorKind::IncludeNotFound { name } => {
                    write!(f, "Included config does not exist: {}", name)?
                }
                ExpansionErrorKind::Custom { expander, message } => {
                    write!(f, "Expander '{}' error: {}", expander, message)?
                }
            },
            ErrorKind::UnsupportedValue => write!(f, "Unsupported value")?,
            ErrorKind::PathNotFound => write!(f, "Path not found")?,
            ErrorKind::Io => write!(f, "I/O error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(loc) = &self.source_location {
            write!(f, "\n  File: {}", loc.file)?;
            if let Some(line) = loc.line {
                write!(f, ":{}", line)?;
                if let Some(column) = loc.column {
                    write!(f, ":{}", column)?;
                }
            }
            if let Some(offset) = loc.offset {
                write!(f, " (offset {})", offset)?;
            }
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(snippet) = &self.snippet {
            for line in snippet.lines() {
                write!(f, "\n    {}", line)?;
            }
        }

        for file in &self.included_from {
            write!(f, "\n  In file included from {}", file)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

/// Deferred error recorded by a [`ConfigObject`](crate::ConfigObject) accessor
///
/// These never abort a read; they accumulate until
/// [`ConfigObject::validate`](crate::ConfigObject::validate) is called.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// A required key is absent
    #[error("missing required config key {key:?} ({expected})")]
    MissingKey { key: String, expected: &'static str },

    /// A key is present but its value has the wrong type or range
    #[error("expected config key {key:?} to be {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: String,
    },

    /// A key is present in the document but was never read
    #[error("unknown key {key:?}")]
    UnknownKey { key: String },

    /// More than one of the above
    #[error("multiple errors: {}", join_messages(.0))]
    Multiple(Vec<AccessError>),
}

fn join_messages(errors: &[AccessError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

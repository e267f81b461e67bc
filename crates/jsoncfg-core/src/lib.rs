//! jsoncfg-core: JSON configuration loading with expressions and includes
//!
//! A configuration document is a JSON object. Any array whose first element
//! is a registered tag string is an *expression* and is replaced by the value
//! it expands to before the document is handed back:
//!
//! - `["_env", "${HOME}/data", "fallback"]` substitutes environment variables
//! - `["_fileobj", "common.json"]` loads another document in place
//!
//! The decoded tree is then read through a [`ConfigObject`], whose typed
//! accessors defer errors until [`ConfigObject::validate`].
//!
//! # Example
//!
//! ```rust
//! use jsoncfg_core::{ConfigObject, Loader};
//!
//! let json = r#"{"host": "localhost", "port": 5432}"#;
//! let value = Loader::new().load_str("db.json", json).unwrap();
//!
//! let mut config = ConfigObject::try_from(value).unwrap();
//! assert_eq!(config.required_string("host"), "localhost");
//! assert_eq!(config.required_uint("port"), 5432);
//! assert!(config.validate().is_ok());
//! ```

pub mod error;
pub mod expander;
pub mod include;
pub mod source;
pub mod value;

mod loader;
mod object;

pub use error::{AccessError, Error, ErrorKind, ExpansionErrorKind, Result, SourceLocation};
pub use expander::{Expander, ExpanderRegistry, FnExpander};
pub use include::{IncludeResolver, RelativeResolver, SearchPathResolver};
pub use loader::{read_file, ExpandContext, IncludeContext, Loader};
pub use object::{ConfigObject, ConfigType, StringOrObject};
pub use source::{DocumentSource, FsSource, MemorySource, SourceFile};
pub use value::{parse_bool, Value};

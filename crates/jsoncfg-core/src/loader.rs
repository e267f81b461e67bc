//! Recursive document loader
//!
//! Decodes a JSON document, walks it depth-first replacing expression arrays
//! with their expansion, and recurses into included documents. A document
//! that is still being loaded cannot be entered again: that is an include
//! cycle. Once a document has been fully loaded it may be included again from
//! elsewhere, so diamond-shaped include graphs are fine.

use std::collections::HashSet;
use std::io::{BufReader, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result, SourceLocation};
use crate::expander::ExpanderRegistry;
use crate::include::{IncludeResolver, SearchPathResolver};
use crate::object::ConfigObject;
use crate::source::{canonical_path, highlight_position, DocumentSource, FsSource, SourceFile};
use crate::value::Value;

/// Documents being loaded during one top-level load
///
/// A path is entered before its document is decoded and left once it is fully
/// expanded, whether or not that succeeded.
#[derive(Debug, Default)]
pub struct IncludeContext {
    active: HashSet<PathBuf>,
    stack: Vec<PathBuf>,
}

impl IncludeContext {
    /// Check if entering `path` would close a cycle
    pub fn would_cause_cycle(&self, path: &Path) -> bool {
        self.active.contains(path)
    }

    fn enter(&mut self, path: PathBuf) {
        self.active.insert(path.clone());
        self.stack.push(path);
    }

    fn leave(&mut self) {
        if let Some(path) = self.stack.pop() {
            self.active.remove(&path);
        }
    }

    /// The document currently being expanded
    pub fn current(&self) -> Option<&Path> {
        self.stack.last().map(PathBuf::as_path)
    }

    /// The inclusion chain, outermost first, for error reporting
    pub fn chain(&self) -> Vec<String> {
        self.stack.iter().map(|p| p.display().to_string()).collect()
    }

    /// Number of documents currently being loaded
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// State handed to expanders while a document is walked
pub struct ExpandContext<'a> {
    loader: &'a Loader,
    includes: &'a mut IncludeContext,
}

impl<'a> ExpandContext<'a> {
    /// The loader running this expansion
    pub fn loader(&self) -> &'a Loader {
        self.loader
    }

    /// The document currently being expanded, if any
    pub fn current_file(&self) -> Option<&Path> {
        self.includes.current()
    }

    /// The inclusion chain, outermost first
    pub fn include_chain(&self) -> Vec<String> {
        self.includes.chain()
    }

    /// Resolve `name` relative to the current document and load it
    ///
    /// Failures are annotated with the including document.
    pub fn load_include(&mut self, name: &str) -> Result<Value> {
        let including = self.includes.current().map(Path::to_path_buf);
        let annotate = |err: Error| match &including {
            Some(file) => err.included_from(file.display().to_string()),
            None => err,
        };

        let resolved = self
            .loader
            .include_resolver
            .resolve(name, including.as_deref())
            .map_err(annotate)?;
        log::debug!("Including {} as {}", name, resolved.display());
        self.loader
            .load_document(&resolved, self.includes)
            .map_err(annotate)
    }

    fn current_name(&self) -> String {
        self.includes
            .current()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }

    fn expand_object(&mut self, map: &mut IndexMap<String, Value>, prefix: &str) -> Result<()> {
        for (key, value) in map.iter_mut() {
            let path = join_key(prefix, key);
            self.expand_value(value, &path)?;
        }
        Ok(())
    }

    fn expand_value(&mut self, value: &mut Value, path: &str) -> Result<()> {
        if let Value::Array(items) = &*value {
            let loader = self.loader;
            if let Some(expander) = loader.expanders.for_expression(items) {
                log::trace!("Expanding {} expression at {}", expander.name(), path);
                let replacement = expander
                    .expand(&items[1..], self)
                    .map_err(|e| e.in_document(&self.current_name(), path))?;
                *value = replacement;
                return Ok(());
            }
        }

        match value {
            Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
            Value::Number(n) if n.is_finite() => Ok(()),
            Value::Number(n) => Err(Error::unsupported_value(format!(
                "non-finite number {}",
                n
            ))
            .in_document(&self.current_name(), path)),
            Value::Object(map) => self.expand_object(map, path),
            Value::Array(items) => {
                for (i, item) in items.iter_mut().enumerate() {
                    self.expand_value(item, &format!("{}[{}]", path, i))?;
                }
                Ok(())
            }
        }
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Loads and expands configuration documents
///
/// # Example
///
/// ```no_run
/// use jsoncfg_core::Loader;
///
/// let mut config = Loader::new().load_object("/etc/myapp/config.json")?;
/// let listen = config.required_string("listen");
/// let workers = config.optional_uint("workers", 4);
/// config.validate()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct Loader {
    source: Arc<dyn DocumentSource>,
    expanders: Arc<ExpanderRegistry>,
    include_resolver: Arc<dyn IncludeResolver>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("expanders", &self.expanders)
            .finish_non_exhaustive()
    }
}

impl Loader {
    /// Create a loader reading from the filesystem with the built-in expanders
    pub fn new() -> Self {
        Self {
            source: Arc::new(FsSource),
            expanders: Arc::new(ExpanderRegistry::with_builtins()),
            include_resolver: Arc::new(SearchPathResolver::new()),
        }
    }

    /// Use a different document source
    pub fn with_source(mut self, source: impl DocumentSource + 'static) -> Self {
        self.source = Arc::new(source);
        self
    }

    /// Use a different expander table
    pub fn with_expanders(mut self, expanders: ExpanderRegistry) -> Self {
        self.expanders = Arc::new(expanders);
        self
    }

    /// Use a different include resolver
    pub fn with_include_resolver(mut self, resolver: impl IncludeResolver + 'static) -> Self {
        self.include_resolver = Arc::new(resolver);
        self
    }

    /// The expander table in use
    pub fn expanders(&self) -> &ExpanderRegistry {
        &self.expanders
    }

    /// Load the document at `path`, returning its expanded root object
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Value> {
        let mut includes = IncludeContext::default();
        self.load_document(path.as_ref(), &mut includes)
    }

    /// Load the document at `path` and wrap it for typed access
    pub fn load_object(&self, path: impl AsRef<Path>) -> Result<ConfigObject> {
        ConfigObject::try_from(self.load(path)?)
    }

    /// Load a document held in memory
    ///
    /// `name` identifies the document in errors and anchors relative includes.
    pub fn load_str(&self, name: impl AsRef<Path>, json: &str) -> Result<Value> {
        let name = name.as_ref();
        let canonical = canonicalize(name)?;
        let display = name.display().to_string();
        let mut file = crate::source::memory_file(&display, json);

        let mut includes = IncludeContext::default();
        includes.enter(canonical);
        let result = self.decode(&mut *file, &display).and_then(|mut root| {
            ExpandContext {
                loader: self,
                includes: &mut includes,
            }
            .expand_object(&mut root, "")
            .map(|()| Value::Object(root))
        });
        includes.leave();
        result
    }

    /// Expand every expression in an already decoded tree
    ///
    /// Relative includes are resolved against the current directory.
    pub fn expand(&self, value: &mut Value) -> Result<()> {
        self.with_context(|ctx| ctx.expand_value(value, ""))
    }

    /// Check that a tree holds only plain data
    ///
    /// Fails on the first non-finite number or remaining expression array,
    /// naming its dotted key path.
    pub fn check_types(&self, value: &Value) -> Result<()> {
        self.check_value(value, "")
    }

    fn check_value(&self, value: &Value, path: &str) -> Result<()> {
        match value {
            Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
            Value::Number(n) if n.is_finite() => Ok(()),
            Value::Number(n) => {
                Err(Error::unsupported_value(format!("non-finite number {}", n)).with_path(path))
            }
            Value::Array(items) => {
                if let Some(expander) = self.expanders.for_expression(items) {
                    return Err(Error::unsupported_value(format!(
                        "unexpanded {} expression",
                        expander.name()
                    ))
                    .with_path(path));
                }
                items
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, item)| self.check_value(item, &format!("{}[{}]", path, i)))
            }
            Value::Object(map) => map
                .iter()
                .try_for_each(|(key, item)| self.check_value(item, &join_key(path, key))),
        }
    }

    /// Run `f` with a fresh expansion context
    pub fn with_context<T>(&self, f: impl FnOnce(&mut ExpandContext<'_>) -> T) -> T {
        let mut includes = IncludeContext::default();
        let mut ctx = ExpandContext {
            loader: self,
            includes: &mut includes,
        };
        f(&mut ctx)
    }

    pub(crate) fn load_document(&self, path: &Path, includes: &mut IncludeContext) -> Result<Value> {
        let canonical = canonicalize(path)?;
        if includes.would_cause_cycle(&canonical) {
            let mut chain = includes.chain();
            chain.push(canonical.display().to_string());
            return Err(Error::include_cycle(chain));
        }

        includes.enter(canonical.clone());
        let result = self.read_and_expand(&canonical, includes);
        includes.leave();
        result
    }

    fn read_and_expand(&self, path: &Path, includes: &mut IncludeContext) -> Result<Value> {
        let mut root = {
            let display = path.display().to_string();
            let mut file = self
                .source
                .open(path)
                .map_err(|e| Error::io(&display, format!("Failed to open config: {}", e)))?;
            let name = file.name().to_string();
            self.decode(&mut *file, &name)?
        };
        log::debug!(
            "Loaded config document {} (include depth {})",
            path.display(),
            includes.depth()
        );

        ExpandContext {
            loader: self,
            includes,
        }
        .expand_object(&mut root, "")?;
        Ok(Value::Object(root))
    }

    fn decode(&self, file: &mut dyn SourceFile, name: &str) -> Result<IndexMap<String, Value>> {
        let parsed: std::result::Result<serde_json::Value, _> =
            serde_json::from_reader(BufReader::new(&mut *file));
        let json = match parsed {
            Ok(json) => json,
            Err(e) => return Err(syntax_error(file, name, &e)),
        };

        match Value::from(json) {
            Value::Object(map) => Ok(map),
            other => Err(Error::unsupported_value(format!(
                "document root must be a JSON object, not {}",
                other.type_name()
            ))
            .with_source_location(SourceLocation::file(name))),
        }
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    canonical_path(path).map_err(|e| {
        Error::io(
            path.display().to_string(),
            format!("Failed to expand absolute path: {}", e),
        )
    })
}

fn syntax_error(file: &mut dyn SourceFile, name: &str, err: &serde_json::Error) -> Error {
    if err.is_io() {
        return Error::io(name, format!("Failed to read config: {}", err));
    }

    let base = Error::syntax(name, format!("error parsing JSON object: {}", err));
    let mut contents = Vec::new();
    if file.seek(SeekFrom::Start(0)).is_err() || file.read_to_end(&mut contents).is_err() {
        return base;
    }
    let contents = String::from_utf8_lossy(&contents);
    let (offset, snippet) = highlight_position(&contents, err.line(), err.column());
    base.with_source_location(SourceLocation {
        file: name.to_string(),
        line: Some(err.line()),
        column: Some(err.column()),
        offset: Some(offset),
    })
    .with_snippet(snippet)
}

/// Load `path` with the default loader and wrap it for typed access
pub fn read_file(path: impl AsRef<Path>) -> Result<ConfigObject> {
    Loader::new().load_object(path)
}

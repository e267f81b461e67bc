//! Expression expanders
//!
//! An expression is a JSON array whose first element is a registered tag:
//!
//! ```json
//! {
//!   "listen": ["_env", "${HOST}:${PORT}", "localhost:8080"],
//!   "debug":  ["_env", "${APP_DEBUG}", false],
//!   "db":     ["_fileobj", "db.json"]
//! }
//! ```
//!
//! The loader replaces each expression with the value its expander returns.
//! Arrays with an unregistered first element are ordinary data.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};

use crate::error::{Error, Result};
use crate::loader::ExpandContext;
use crate::value::{parse_bool, Value};

/// Tag of the environment-variable expander
pub const ENV_TAG: &str = "_env";

/// Tag of the file-inclusion expander
pub const FILEOBJ_TAG: &str = "_fileobj";

/// Trait for expander implementations
pub trait Expander: Send + Sync {
    /// Expand an expression
    ///
    /// # Arguments
    /// * `args` - The expression array without its leading tag
    /// * `ctx` - Expansion context, giving access to the loader for includes
    fn expand(&self, args: &[Value], ctx: &mut ExpandContext<'_>) -> Result<Value>;

    /// The tag this expander is registered under
    fn name(&self) -> &str;
}

/// A simple function-based expander
pub struct FnExpander<F>
where
    F: Fn(&[Value], &mut ExpandContext<'_>) -> Result<Value> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnExpander<F>
where
    F: Fn(&[Value], &mut ExpandContext<'_>) -> Result<Value> + Send + Sync,
{
    /// Create a new function-based expander
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Expander for FnExpander<F>
where
    F: Fn(&[Value], &mut ExpandContext<'_>) -> Result<Value> + Send + Sync,
{
    fn expand(&self, args: &[Value], ctx: &mut ExpandContext<'_>) -> Result<Value> {
        (self.func)(args, ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Table of expanders keyed by tag
///
/// Built up front and handed to a [`Loader`](crate::Loader), which never
/// mutates it.
#[derive(Clone, Default)]
pub struct ExpanderRegistry {
    expanders: HashMap<String, Arc<dyn Expander>>,
}

impl ExpanderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with `_env` and `_fileobj`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_fn(ENV_TAG, env_expander);
        registry.register_fn(FILEOBJ_TAG, fileobj_expander);
        registry
    }

    /// Register an expander, replacing any with the same tag
    pub fn register(&mut self, expander: Arc<dyn Expander>) {
        self.expanders
            .insert(expander.name().to_string(), expander);
    }

    /// Register a function as an expander
    pub fn register_fn<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&[Value], &mut ExpandContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnExpander::new(name, func)));
    }

    /// Get an expander by tag
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Expander>> {
        self.expanders.get(name)
    }

    /// Check if a tag is registered
    pub fn contains(&self, name: &str) -> bool {
        self.expanders.contains_key(name)
    }

    /// The expander for an expression array, if `items` is one
    pub fn for_expression(&self, items: &[Value]) -> Option<&Arc<dyn Expander>> {
        items.first()?.as_str().and_then(|tag| self.get(tag))
    }
}

impl std::fmt::Debug for ExpanderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<_> = self.expanders.keys().collect();
        tags.sort();
        f.debug_struct("ExpanderRegistry")
            .field("tags", &tags)
            .finish()
    }
}

static ENV_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("valid env pattern"));

/// Look up an environment variable, treating empty as unset
fn lookup_env(name: &str) -> Option<String> {
    let value = std::env::var(name).ok().filter(|v| !v.is_empty());
    if value.is_none() && name == "USER" && cfg!(windows) {
        return std::env::var("USERNAME").ok().filter(|v| !v.is_empty());
    }
    value
}

#[derive(Clone, Copy)]
enum EnvDefault<'a> {
    None,
    Text(&'a str),
    Bool(bool),
}

/// Built-in environment expander
///
/// Usage:
///   ["_env", "${VAR}"]                  - error if VAR is unset
///   ["_env", "${HOST}:${PORT}", "x"]    - each unset placeholder becomes "x"
///   ["_env", "${FLAG}", false]          - boolean; `false` when FLAG is unset
fn env_expander(args: &[Value], _ctx: &mut ExpandContext<'_>) -> Result<Value> {
    if args.is_empty() || args.len() > 2 {
        return Err(Error::invalid_arguments(
            ENV_TAG,
            format!("expected 1 or 2 args, got {}", args.len()),
        ));
    }
    let pattern = args[0].as_str().ok_or_else(|| {
        Error::invalid_arguments(
            ENV_TAG,
            format!("expected a string pattern, got {}", args[0].type_name()),
        )
    })?;
    let default = match args.get(1) {
        None => EnvDefault::None,
        Some(Value::String(s)) => EnvDefault::Text(s),
        Some(Value::Bool(b)) => EnvDefault::Bool(*b),
        Some(other) => {
            return Err(Error::invalid_arguments(
                ENV_TAG,
                format!(
                    "expected a string or boolean default in {:?}, got {}",
                    pattern,
                    other.type_name()
                ),
            ))
        }
    };
    let fallback = match default {
        EnvDefault::None => None,
        EnvDefault::Text(s) => Some(s),
        EnvDefault::Bool(_) => Some(""),
    };

    let mut missing: Option<String> = None;
    let expanded = ENV_PATTERN.replace_all(pattern, |caps: &Captures<'_>| {
        let name = &caps[1];
        match (lookup_env(name), fallback) {
            (Some(value), _) => value,
            (None, Some(def)) => def.to_string(),
            (None, None) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });
    if let Some(name) = missing {
        return Err(Error::env_not_set(name));
    }

    match default {
        EnvDefault::Bool(b) if expanded.is_empty() => Ok(Value::Bool(b)),
        EnvDefault::Bool(_) => parse_bool(&expanded)
            .map(Value::Bool)
            .ok_or_else(|| Error::bad_boolean(expanded.to_string())),
        _ => Ok(Value::String(expanded.into_owned())),
    }
}

/// Built-in file inclusion expander
///
/// Usage:
///   ["_fileobj", "path/to/other.json"]  - replaced by the expanded object of that file
fn fileobj_expander(args: &[Value], ctx: &mut ExpandContext<'_>) -> Result<Value> {
    if args.len() != 1 {
        return Err(Error::invalid_arguments(
            FILEOBJ_TAG,
            format!("expected 1 arg, got {}", args.len()),
        ));
    }
    let name = args[0].as_str().ok_or_else(|| {
        Error::invalid_arguments(
            FILEOBJ_TAG,
            format!("expected a string path, got {}", args[0].type_name()),
        )
    })?;
    ctx.load_include(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ExpansionErrorKind};
    use crate::loader::Loader;
    use pretty_assertions::assert_eq;

    fn expand_env(args: Vec<Value>) -> Result<Value> {
        let loader = Loader::new();
        loader.with_context(|ctx| env_expander(&args, ctx))
    }

    #[test]
    fn test_registry_builtins() {
        let registry = ExpanderRegistry::with_builtins();

        assert!(registry.contains("_env"));
        assert!(registry.contains("_fileobj"));
        assert!(!registry.contains("_nope"));
    }

    #[test]
    fn test_for_expression() {
        let registry = ExpanderRegistry::with_builtins();

        let expr = vec![Value::from("_env"), Value::from("${X}")];
        assert_eq!(registry.for_expression(&expr).unwrap().name(), "_env");
        assert!(registry.for_expression(&[]).is_none());
        assert!(registry
            .for_expression(&[Value::from("_other"), Value::from("x")])
            .is_none());
        assert!(registry.for_expression(&[Value::Number(1.0)]).is_none());
    }

    #[test]
    fn test_custom_expander() {
        let mut registry = ExpanderRegistry::new();
        registry.register_fn("_upper", |args, _ctx| {
            Ok(Value::String(
                args.first()
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_uppercase(),
            ))
        });

        let loader = Loader::new().with_expanders(registry);
        let value = loader
            .with_context(|ctx| {
                let expander = Arc::clone(loader.expanders().get("_upper").unwrap());
                expander.expand(&[Value::from("abc")], ctx)
            })
            .unwrap();
        assert_eq!(value, Value::from("ABC"));
    }

    #[test]
    fn test_env_substitutes_all_placeholders() {
        std::env::set_var("JSONCFG_TEST_HOST", "db.local");
        std::env::set_var("JSONCFG_TEST_PORT", "5432");

        let value = expand_env(vec!["${JSONCFG_TEST_HOST}:${JSONCFG_TEST_PORT}/x".into()]).unwrap();
        assert_eq!(value, Value::from("db.local:5432/x"));

        std::env::remove_var("JSONCFG_TEST_HOST");
        std::env::remove_var("JSONCFG_TEST_PORT");
    }

    #[test]
    fn test_env_literal_text_passes_through() {
        let value = expand_env(vec!["no placeholders, $HOME or ${not valid}".into()]).unwrap();
        assert_eq!(value, Value::from("no placeholders, $HOME or ${not valid}"));
    }

    #[test]
    fn test_env_unset_without_default_fails() {
        std::env::remove_var("JSONCFG_TEST_UNSET_A");

        let err = expand_env(vec!["${JSONCFG_TEST_UNSET_A}".into()]).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Expansion(ExpansionErrorKind::EnvNotSet {
                var_name: "JSONCFG_TEST_UNSET_A".into()
            })
        );
    }

    #[test]
    fn test_env_unset_with_string_default() {
        std::env::remove_var("JSONCFG_TEST_UNSET_B");

        let value = expand_env(vec!["${JSONCFG_TEST_UNSET_B}".into(), "fallback".into()]).unwrap();
        assert_eq!(value, Value::from("fallback"));

        let value =
            expand_env(vec!["pre-${JSONCFG_TEST_UNSET_B}-post".into(), "x".into()]).unwrap();
        assert_eq!(value, Value::from("pre-x-post"));
    }

    #[test]
    fn test_env_empty_counts_as_unset() {
        std::env::set_var("JSONCFG_TEST_EMPTY", "");

        assert!(expand_env(vec!["${JSONCFG_TEST_EMPTY}".into()]).is_err());
        let value = expand_env(vec!["${JSONCFG_TEST_EMPTY}".into(), "".into()]).unwrap();
        assert_eq!(value, Value::from(""));

        std::env::remove_var("JSONCFG_TEST_EMPTY");
    }

    #[test]
    fn test_env_bool_default_when_unset() {
        std::env::remove_var("JSONCFG_TEST_UNSET_C");

        let value = expand_env(vec!["${JSONCFG_TEST_UNSET_C}".into(), true.into()]).unwrap();
        assert_eq!(value, Value::Bool(true));
        let value = expand_env(vec!["${JSONCFG_TEST_UNSET_C}".into(), false.into()]).unwrap();
        assert_eq!(value, Value::Bool(false));
    }

    #[test]
    fn test_env_bool_parses_value() {
        std::env::set_var("JSONCFG_TEST_BOOL_ONE", "1");
        std::env::set_var("JSONCFG_TEST_BOOL_ZERO", "0");
        std::env::set_var("JSONCFG_TEST_BOOL_TRUE", "TRUE");
        std::env::set_var("JSONCFG_TEST_BOOL_BAD", "maybe");

        let one = expand_env(vec!["${JSONCFG_TEST_BOOL_ONE}".into(), false.into()]).unwrap();
        let zero = expand_env(vec!["${JSONCFG_TEST_BOOL_ZERO}".into(), true.into()]).unwrap();
        let upper = expand_env(vec!["${JSONCFG_TEST_BOOL_TRUE}".into(), false.into()]).unwrap();
        let bad = expand_env(vec!["${JSONCFG_TEST_BOOL_BAD}".into(), false.into()]).unwrap_err();

        assert_eq!(one, Value::Bool(true));
        assert_eq!(zero, Value::Bool(false));
        assert_eq!(upper, Value::Bool(true));
        assert_eq!(
            bad.kind,
            ErrorKind::Expansion(ExpansionErrorKind::BadBoolean {
                value: "maybe".into()
            })
        );

        std::env::remove_var("JSONCFG_TEST_BOOL_ONE");
        std::env::remove_var("JSONCFG_TEST_BOOL_ZERO");
        std::env::remove_var("JSONCFG_TEST_BOOL_TRUE");
        std::env::remove_var("JSONCFG_TEST_BOOL_BAD");
    }

    #[test]
    fn test_env_bool_literal_pattern() {
        let value = expand_env(vec!["true".into(), false.into()]).unwrap();
        assert_eq!(value, Value::Bool(true));

        let value = expand_env(vec!["".into(), true.into()]).unwrap();
        assert_eq!(value, Value::Bool(true));
    }

    #[test]
    fn test_env_invalid_arguments() {
        for args in [
            vec![],
            vec!["a".into(), "b".into(), "c".into()],
            vec![Value::Number(1.0)],
            vec!["${X}".into(), Value::Number(1.0)],
        ] {
            let err = expand_env(args).unwrap_err();
            assert!(
                matches!(
                    err.kind,
                    ErrorKind::Expansion(ExpansionErrorKind::InvalidArguments { .. })
                ),
                "unexpected error: {}",
                err
            );
        }
    }

    #[test]
    fn test_fileobj_invalid_arguments() {
        let loader = Loader::new();
        for args in [
            vec![],
            vec![Value::from("a.json"), Value::from("b.json")],
            vec![Value::Bool(true)],
        ] {
            let err = loader
                .with_context(|ctx| fileobj_expander(&args, ctx))
                .unwrap_err();
            assert!(matches!(
                err.kind,
                ErrorKind::Expansion(ExpansionErrorKind::InvalidArguments { .. })
            ));
        }
    }
}

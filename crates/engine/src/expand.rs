//! Placeholder expansion
//!
//! Templates contain flat `{name}` placeholders resolved against a
//! [`VariableStore`]. Expansion is a single substitution pass; values that
//! themselves contain placeholders are left as-is and can be followed step by
//! step with [`Expander::trace`].

use crate::variables::{PACKAGE_VARIABLE, VariableStore};
use crate::{Error, Result};
use indexmap::IndexMap;
use modlink_config::{Config, ExpansionConfig};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

/// Loose placeholder pattern used for usage analysis
static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([^{}]+)\}").expect("PLACEHOLDER_REGEX compilation should never fail")
});

/// Context used for traces, which are never cached
const TRACE_CONTEXT: &str = "trace";

/// Names of every well-formed placeholder in `template`, in order of appearance
///
/// ```
/// use modlink_engine::expand::placeholders;
///
/// assert_eq!(
///     placeholders("{base_path_library}/{Package}/models"),
///     vec!["base_path_library", "Package"]
/// );
/// ```
pub fn placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER_REGEX
        .captures_iter(template)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Counters reported by [`Expander::cache_stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries currently cached
    pub size: usize,
    /// Maximum number of entries
    pub capacity: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that had to expand
    pub misses: u64,
    /// False in lazy mode
    pub enabled: bool,
}

/// Bounded memo of `(template, context)` to expanded value
///
/// When full, the oldest entry is evicted.
#[derive(Debug, Clone)]
pub struct ExpansionCache {
    entries: IndexMap<(String, String), String>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl ExpansionCache {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity.min(1024)),
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up an entry, counting the hit or miss
    pub fn get(&mut self, template: &str, context: &str) -> Option<&String> {
        let found = self
            .entries
            .get(&(template.to_string(), context.to_string()));
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Store an entry, evicting the oldest when full
    pub fn insert(&mut self, template: &str, context: &str, value: String) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries
            .insert((template.to_string(), context.to_string()), value);
    }

    /// Drop every entry and reset the counters
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Current counters
    pub fn stats(&self, enabled: bool) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
            enabled,
        }
    }
}

/// One step of an expansion trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStep {
    /// 1-based step number
    pub step: usize,
    /// String before this step
    pub input: String,
    /// Placeholders found in `input`, sorted
    pub variables_used: Vec<String>,
    /// String after this step (equal to `input` when the step failed)
    pub output: String,
    /// Why the step failed, if it did
    pub error: Option<String>,
}

/// Where and how often variables are referenced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariableUsage {
    /// Referenced variables, sorted
    pub used: Vec<String>,
    /// Defined but never referenced, sorted
    pub unused: Vec<String>,
    /// Referenced but never defined, sorted
    pub missing: Vec<String>,
    /// Reference count per variable
    pub usage_count: BTreeMap<String, usize>,
    /// `section.key.role` locations per variable
    pub usage_locations: BTreeMap<String, Vec<String>>,
}

impl VariableUsage {
    fn record(&mut self, template: &str, location: &str) {
        for name in placeholders(template) {
            *self.usage_count.entry(name.to_string()).or_default() += 1;
            self.usage_locations
                .entry(name.to_string())
                .or_default()
                .push(location.to_string());
        }
    }
}

/// Placeholder expansion engine with an owned cache
#[derive(Debug, Clone)]
pub struct Expander {
    variables: VariableStore,
    cache: ExpansionCache,
    lazy: bool,
}

impl Expander {
    /// Create an expander over `variables`
    pub fn new(variables: VariableStore, settings: &ExpansionConfig) -> Self {
        Self {
            variables,
            cache: ExpansionCache::new(settings.cache_capacity),
            lazy: settings.lazy,
        }
    }

    /// Variables currently defined
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// Define or replace a variable, returning the previous value
    ///
    /// Cached expansions are keyed by context, not by variable values, so
    /// replacing an existing value with a different one clears the cache.
    pub fn define(&mut self, name: &str, value: &str) -> Option<String> {
        let previous = self.variables.insert(name, value);
        if previous.as_deref().is_some_and(|old| old != value) {
            self.cache.clear();
        }
        previous
    }

    /// Remove a variable, returning its value
    pub fn undefine(&mut self, name: &str) -> Option<String> {
        self.variables.remove(name)
    }

    /// Expand every placeholder in `template`
    ///
    /// `context` names where the template came from; it is part of the cache
    /// key and appears in error messages.
    ///
    /// # Errors
    ///
    /// Returns `VariableExpansion` for undefined variables and malformed
    /// placeholders (unclosed `{`, empty `{}`, nested `{`).
    pub fn expand(&mut self, template: &str, context: &str) -> Result<String> {
        if self.lazy {
            return self.expand_once(template, context);
        }
        if let Some(hit) = self.cache.get(template, context) {
            return Ok(hit.clone());
        }
        let expanded = self.expand_once(template, context)?;
        self.cache.insert(template, context, expanded.clone());
        Ok(expanded)
    }

    /// Single substitution pass, bypassing the cache
    pub fn expand_once(&self, template: &str, context: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                return Err(self.error(context, template, "unclosed placeholder", None));
            };
            let name = &after[..close];
            if name.is_empty() {
                return Err(self.error(context, template, "empty placeholder '{}'", None));
            }
            if name.contains('{') {
                return Err(self.error(
                    context,
                    template,
                    &format!("nested placeholder '{{{name}}}'"),
                    None,
                ));
            }
            match self.variables.get(name) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(self.error(
                        context,
                        template,
                        &format!("undefined variable '{name}'"),
                        Some(name),
                    ));
                }
            }
            rest = &after[close + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }

    fn error(&self, context: &str, template: &str, reason: &str, variable: Option<&str>) -> Error {
        Error::VariableExpansion {
            context: context.to_string(),
            template: template.to_string(),
            reason: reason.to_string(),
            variable: variable.map(str::to_string),
            available: self.variables.names_sorted(),
        }
    }

    /// Expand repeatedly, recording every step
    ///
    /// Stops when no placeholder is left, when a step changes nothing, on the
    /// first error, or after one step more than there are variables (a value
    /// that keeps re-introducing its own placeholder).
    pub fn trace(&self, template: &str) -> Vec<TraceStep> {
        let max_steps = self.variables.len() + 1;
        let mut steps = Vec::new();
        let mut current = template.to_string();

        for step in 1..=max_steps {
            if !current.contains('{') {
                return steps;
            }

            let variables_used: Vec<String> = placeholders(&current)
                .into_iter()
                .map(str::to_string)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            match self.expand_once(&current, TRACE_CONTEXT) {
                Ok(output) => {
                    let fixed_point = output == current;
                    steps.push(TraceStep {
                        step,
                        input: std::mem::take(&mut current),
                        variables_used,
                        output: output.clone(),
                        error: None,
                    });
                    if fixed_point {
                        return steps;
                    }
                    current = output;
                }
                Err(e) => {
                    let reason = match e {
                        Error::VariableExpansion { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    steps.push(TraceStep {
                        step,
                        input: current.clone(),
                        variables_used,
                        output: current,
                        error: Some(reason),
                    });
                    return steps;
                }
            }
        }

        if current.contains('{') {
            steps.push(TraceStep {
                step: max_steps + 1,
                input: current.clone(),
                variables_used: Vec::new(),
                output: current,
                error: Some(format!("nesting limit of {max_steps} steps exceeded")),
            });
        }
        steps
    }

    /// Scan every application section for variable references
    ///
    /// Covers `base_path` and `outputs` (source and target of every pair) and
    /// special folder mappings. `Package` is bound per section, so it never
    /// counts as missing.
    pub fn analyze_usage(&self, config: &Config) -> VariableUsage {
        let mut usage = VariableUsage::default();

        for (section, value) in config.section_values() {
            for key in ["base_path", "outputs"] {
                for pair in path_pairs(value.get(key)) {
                    for role in ["source", "target"] {
                        if let Some(template) = pair.get(role).and_then(toml::Value::as_str) {
                            usage.record(template, &format!("{section}.{key}.{role}"));
                        }
                    }
                }
            }
            if let Some(folders) = value.get("special_folders").and_then(toml::Value::as_table) {
                for (name, relative) in folders {
                    if let Some(template) = relative.as_str() {
                        usage.record(template, &format!("{section}.special_folders.{name}"));
                    }
                }
            }
        }

        usage.used = usage.usage_count.keys().cloned().collect();
        usage.missing = usage
            .used
            .iter()
            .filter(|name| *name != PACKAGE_VARIABLE && !self.variables.contains(name))
            .cloned()
            .collect();
        usage.unused = self
            .variables
            .names_sorted()
            .into_iter()
            .filter(|name| !usage.usage_count.contains_key(name))
            .collect();
        usage
    }

    /// Drop every cached expansion
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats(!self.lazy)
    }
}

/// Path pair tables under a `base_path`/`outputs` key (a lone table or an array)
fn path_pairs(value: Option<&toml::Value>) -> Vec<&toml::Table> {
    match value {
        Some(toml::Value::Table(table)) => vec![table],
        Some(toml::Value::Array(items)) => items.iter().filter_map(toml::Value::as_table).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    fn expander(vars: &[(&str, &str)]) -> Expander {
        Expander::new(
            vars.iter().copied().collect(),
            &ExpansionConfig::default(),
        )
    }

    #[test]
    fn test_placeholder_free_template_unchanged() {
        let mut e = expander(&[("a", "1")]);
        for template in ["", "/plain/path", "C:\\models", "closing } only"] {
            assert_eq!(e.expand(template, "ctx").unwrap(), template);
        }
    }

    #[test]
    fn test_expand_substitutes_every_placeholder() {
        let mut e = expander(&[("lib", "/data/lib"), ("Package", "comfy")]);
        assert_eq!(
            e.expand("{lib}/{Package}/{Package}", "App.base_path.source")
                .unwrap(),
            "/data/lib/comfy/comfy"
        );
    }

    #[test]
    fn test_expand_is_single_pass() {
        let mut e = expander(&[("outer", "{inner}/x"), ("inner", "/root")]);
        assert_eq!(e.expand("{outer}", "ctx").unwrap(), "{inner}/x");
    }

    #[test]
    fn test_undefined_variable_error() {
        let mut e = expander(&[("b", "2"), ("a", "1")]);
        let err = e.expand("{missing_var}/models", "App1.base_path.source").unwrap_err();
        match &err {
            Error::VariableExpansion {
                context,
                variable,
                available,
                ..
            } => {
                assert_eq!(context, "App1.base_path.source");
                assert_eq!(variable.as_deref(), Some("missing_var"));
                assert_eq!(available, &vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("missing_var"));
    }

    #[test]
    fn test_malformed_placeholders() {
        let e = expander(&[("a", "1")]);
        for (template, reason) in [
            ("{a", "unclosed"),
            ("x{}y", "empty"),
            ("{a{a}}", "nested"),
        ] {
            let err = e.expand_once(template, "ctx").unwrap_err();
            assert!(err.to_string().contains(reason), "{template}: {err}");
        }
    }

    #[test]
    fn test_cache_hits_and_lazy_bypass() {
        let mut e = expander(&[("a", "1")]);
        e.expand("{a}", "one").unwrap();
        e.expand("{a}", "one").unwrap();
        e.expand("{a}", "two").unwrap();
        let stats = e.cache_stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 2, 2));
        assert!(stats.enabled);

        let mut lazy = Expander::new(
            [("a", "1")].into_iter().collect(),
            &ExpansionConfig {
                lazy: true,
                ..ExpansionConfig::default()
            },
        );
        lazy.expand("{a}", "one").unwrap();
        lazy.expand("{a}", "one").unwrap();
        let stats = lazy.cache_stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (0, 0, 0));
        assert!(!stats.enabled);
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let mut cache = ExpansionCache::new(2);
        cache.insert("a", "c", "1".into());
        cache.insert("b", "c", "2".into());
        cache.insert("d", "c", "3".into());
        assert!(cache.get("a", "c").is_none());
        assert_eq!(cache.get("d", "c").map(String::as_str), Some("3"));
        assert_eq!(cache.stats(true).size, 2);
    }

    #[test]
    fn test_define_changed_value_clears_cache() {
        let mut e = expander(&[("a", "1")]);
        e.expand("{a}", "ctx").unwrap();
        e.define("a", "1");
        assert_eq!(e.cache_stats().size, 1);
        e.define("a", "2");
        assert_eq!(e.cache_stats().size, 0);
        assert_eq!(e.expand("{a}", "ctx").unwrap(), "2");
    }

    #[test]
    fn test_clear_cache() {
        let mut e = expander(&[("a", "1")]);
        e.expand("{a}", "ctx").unwrap();
        e.clear_cache();
        assert_eq!(e.cache_stats().size, 0);
        assert_eq!(e.cache_stats().hits, 0);
    }

    #[test]
    fn test_trace_nested_reaches_fixed_point() {
        let e = expander(&[
            ("root", "/data"),
            ("lib", "{root}/lib"),
            ("models", "{lib}/models"),
        ]);
        let trace = e.trace("{models}/{Package}x");
        // Package is undefined, so the first step fails
        assert_eq!(trace.len(), 1);
        assert!(trace[0].error.as_deref().unwrap().contains("Package"));

        let trace = e.trace("{models}/checkpoints");
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[0].variables_used, vec!["models"]);
        assert_eq!(trace[2].output, "/data/lib/models/checkpoints");
        assert!(trace.iter().all(|s| s.error.is_none()));
        assert!(trace.len() <= e.variables().len() + 1);
    }

    #[test]
    fn test_trace_placeholder_free_is_empty() {
        let e = expander(&[("a", "1")]);
        assert!(e.trace("/plain").is_empty());
    }

    #[test]
    fn test_trace_self_reference_terminates() {
        let e = expander(&[("a", "{a}")]);
        let trace = e.trace("{a}");
        assert_eq!(trace.len(), 1);
        assert_eq!(trace[0].output, "{a}");
    }

    #[test]
    fn test_trace_growing_self_reference_hits_limit() {
        let e = expander(&[("a", "x{a}")]);
        let trace = e.trace("{a}");
        let last = trace.last().unwrap();
        assert!(last.error.as_deref().unwrap().contains("nesting limit"));
        assert_eq!(trace.len(), 3);
    }

    #[test]
    fn test_analyze_usage() {
        let config = Config::from_toml_str(
            r#"
[library_path]
base_path_library = "/lib"
base_path_outputs = "/out"
unused_root = "/nowhere"

[App1]
Installer = "General"
Package = "app1"
base_path = [{ source = "/apps/{Package}/models", target = "{base_path_library}" }]
outputs = [{ source = "/apps/app1/output", target = "{missing_var}/app1" }]

[App2]
Installer = "Pinokio"
Package = "app2"
base_path = { source = "{missing_var}/models", target = "{base_path_library}" }

[App2.special_folders]
embeddings = "{base_path_outputs}/emb"
"#,
        )
        .unwrap();
        let e = Expander::new(VariableStore::from_config(&config), &config.expansion);
        let usage = e.analyze_usage(&config);

        assert_eq!(usage.missing, vec!["missing_var"]);
        assert_eq!(usage.unused, vec!["unused_root"]);
        assert!(usage.used.contains(&"Package".to_string()));
        assert_eq!(usage.usage_count["base_path_library"], 2);
        assert_eq!(
            usage.usage_locations["missing_var"],
            vec!["App1.outputs.target", "App2.base_path.source"]
        );
        assert_eq!(
            usage.usage_locations["base_path_outputs"],
            vec!["App2.special_folders.embeddings"]
        );
    }
}

//! Architectural layer classification
//!
//! Maps a symbol to a layer through a fixed cascade:
//! explicit path prefix, class-name suffix, directory name, then the same
//! three steps for each ancestor class. Every collection consulted is
//! ordered, so the answer never depends on hash iteration order.

use crate::analyzer::Ancestor;
use crate::config::ProjectConfig;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A named architectural partition (`Domain`, `UseCase`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Layer(String);

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Layer(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves symbols and files to layers using the project configuration
pub struct LayerClassifier {
    config: Arc<ProjectConfig>,
    /// Normalized prefixes, longest first; equal lengths keep config order
    prefixes: Vec<(String, Layer)>,
}

impl LayerClassifier {
    pub fn new(config: Arc<ProjectConfig>) -> Self {
        let mut prefixes: Vec<(String, Layer)> = config
            .layers
            .paths
            .iter()
            .map(|(prefix, layer)| (normalize_prefix(prefix), Layer::new(layer.as_str())))
            .filter(|(prefix, _)| !prefix.is_empty())
            .collect();
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self { config, prefixes }
    }

    /// Layer of `symbol_name` defined in `file_path`.
    ///
    /// `inheritance_chain` lists ancestors nearest first; it is only
    /// consulted when the symbol itself does not resolve.
    pub fn resolve(
        &self,
        symbol_name: &str,
        file_path: &Path,
        inheritance_chain: &[Ancestor],
    ) -> Option<Layer> {
        if let Some(layer) = self.resolve_direct(symbol_name, Some(file_path)) {
            return Some(layer);
        }
        inheritance_chain
            .iter()
            .find_map(|ancestor| self.resolve_direct(&ancestor.name, ancestor.path.as_deref()))
    }

    /// Layer of a file or module path regardless of the symbols inside
    pub fn classify_path(&self, path: &Path) -> Option<Layer> {
        let path = path_form(path);
        self.by_prefix(&path).or_else(|| self.by_directory(&path))
    }

    /// Layer of a dotted module name (`app.domain.user`)
    pub fn classify_module(&self, dotted: &str) -> Option<Layer> {
        self.classify_path(Path::new(&dotted.replace('.', "/")))
    }

    /// Position in the configured order, innermost = 0
    pub fn rank(&self, layer: &Layer) -> Option<usize> {
        self.config
            .layers
            .order
            .iter()
            .position(|name| name == layer.name())
    }

    pub fn is_immutable(&self, layer: &Layer) -> bool {
        self.config.is_immutable_layer(layer.name())
    }

    fn resolve_direct(&self, symbol_name: &str, file_path: Option<&Path>) -> Option<Layer> {
        let path = file_path.map(path_form);
        if let Some(layer) = path.as_deref().and_then(|p| self.by_prefix(p)) {
            return Some(layer);
        }
        if let Some(layer) = self.by_suffix(symbol_name) {
            return Some(layer);
        }
        path.as_deref().and_then(|p| self.by_directory(p))
    }

    fn by_prefix(&self, path: &str) -> Option<Layer> {
        let module_form = path.strip_suffix(".py").unwrap_or(path);
        self.prefixes
            .iter()
            .find(|(prefix, _)| {
                module_form == prefix
                    || module_form.starts_with(&format!("{}/", prefix))
            })
            .map(|(_, layer)| layer.clone())
    }

    fn by_suffix(&self, symbol_name: &str) -> Option<Layer> {
        if symbol_name.is_empty() {
            return None;
        }
        self.config
            .layers
            .suffixes
            .iter()
            .find(|s| !s.suffix.is_empty() && symbol_name.ends_with(&s.suffix))
            .map(|s| Layer::new(s.layer.as_str()))
    }

    fn by_directory(&self, path: &str) -> Option<Layer> {
        let module_form = path.strip_suffix(".py").unwrap_or(path);
        let segments: Vec<&str> = module_form.split('/').collect();
        self.config
            .layers
            .directories
            .iter()
            .find(|d| segments.iter().any(|s| *s == d.name))
            .map(|d| Layer::new(d.layer.as_str()))
    }
}

/// `./app\core/x.py` -> `app/core/x.py`
fn path_form(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    text.trim_start_matches("./").to_string()
}

/// Module prefixes (`app.core`) and path prefixes (`app/core/`) share one form
fn normalize_prefix(prefix: &str) -> String {
    let prefix = prefix.trim().trim_start_matches("./");
    let prefix = prefix.strip_suffix(".py").unwrap_or(prefix);
    let form = if prefix.contains('/') || prefix.contains('\\') {
        prefix.replace('\\', "/")
    } else {
        prefix.replace('.', "/")
    };
    form.trim_end_matches('/').to_string()
}

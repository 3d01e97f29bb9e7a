//! Python analyzer: parse cache, name resolution and type inference

use super::ast::{ClassDef, Expr, FunctionDef, Import, Literal, Module, Stmt};
use super::{python, Ancestor, InferenceScope, InferredType, SemanticAnalyzer, TypeRef};
use crate::cache::{CacheCoordinator, CacheLayer};
use crate::error::ParseError;
use dashmap::DashMap;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Import chains longer than this are treated as unresolvable
const MAX_RESOLUTION_DEPTH: usize = 8;

const BUILTIN_TYPES: &[&str] = &[
    "str", "int", "float", "bool", "bytes", "bytearray", "complex", "None", "object", "list",
    "dict", "set", "frozenset", "tuple", "type",
];

const BUILTIN_GENERICS: &[&str] = &["list", "dict", "set", "frozenset", "tuple", "type"];

/// Parsed modules keyed by absolute path
#[derive(Default)]
struct ParseCache {
    modules: DashMap<PathBuf, Arc<Module>>,
}

impl CacheLayer for ParseCache {
    fn name(&self) -> &str {
        "parse"
    }

    fn entry_count(&self) -> usize {
        self.modules.len()
    }

    fn invalidate_all(&self) {
        self.modules.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum InferenceKey {
    /// Resolved `->` annotation of a function
    Declared(PathBuf, String),
    /// Return type inferred from a function body, keyed by where the `def`
    /// starts so same-named definitions stay apart
    Body(PathBuf, String, usize),
}

#[derive(Default)]
struct InferenceCache {
    results: DashMap<InferenceKey, InferredType>,
}

impl CacheLayer for InferenceCache {
    fn name(&self) -> &str {
        "inference"
    }

    fn entry_count(&self) -> usize {
        self.results.len()
    }

    fn invalidate_all(&self) {
        self.results.clear();
    }
}

/// What a name is bound to
#[derive(Debug, Clone)]
enum Symbol {
    Class { module: String, name: String, path: PathBuf },
    Function { path: PathBuf, qualname: String },
    Module(String),
}

/// Tree-sitter backed [`SemanticAnalyzer`] for a Python project
pub struct PythonAnalyzer {
    root: PathBuf,
    parses: ParseCache,
    inferences: InferenceCache,
}

impl PythonAnalyzer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            parses: ParseCache::default(),
            inferences: InferenceCache::default(),
        }
    }

    /// Number of cached parses and inference results
    pub fn cached_entries(&self) -> usize {
        self.parses.entry_count() + self.inferences.entry_count()
    }

    fn coordinator(&self) -> CacheCoordinator<'_> {
        CacheCoordinator::new()
            .register(&self.parses)
            .register(&self.inferences)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || path.starts_with(&self.root) {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    /// File implementing a dotted module name, if it is part of the project
    fn module_file(&self, dotted: &str) -> Option<PathBuf> {
        if dotted.is_empty() {
            return None;
        }
        let rel: PathBuf = dotted.split('.').collect();
        let candidates = [
            self.root.join(&rel).with_extension("py"),
            self.root.join(&rel).join("__init__.py"),
        ];
        candidates.into_iter().find(|c| c.is_file())
    }

    /// Absolute dotted name of a `from ... import` source
    fn import_source(&self, module: &Module, import: &Import) -> Option<String> {
        let written = import.from_module.as_deref()?;
        if import.level == 0 {
            return Some(written.to_string());
        }

        let is_package = module
            .path
            .file_name()
            .is_some_and(|name| name == "__init__.py");
        let mut package: Vec<&str> = if module.name.is_empty() {
            Vec::new()
        } else {
            module.name.split('.').collect()
        };
        if !is_package {
            package.pop();
        }
        for _ in 1..import.level {
            package.pop()?;
        }
        if !written.is_empty() {
            package.push(written);
        }
        Some(package.join("."))
    }

    fn lookup_symbol(&self, module: &Module, name: &str, depth: usize) -> Option<Symbol> {
        if depth > MAX_RESOLUTION_DEPTH {
            return None;
        }

        // Python semantics: the last top-level binding wins
        let mut found = None;
        for stmt in &module.body {
            match stmt {
                Stmt::ClassDef(c) if c.name == name => {
                    found = Some(Symbol::Class {
                        module: module.name.clone(),
                        name: c.name.clone(),
                        path: module.path.clone(),
                    });
                }
                Stmt::FunctionDef(f) if f.name == name => {
                    found = Some(Symbol::Function {
                        path: module.path.clone(),
                        qualname: f.qualname.clone(),
                    });
                }
                Stmt::Import(import) if !import.wildcard => {
                    for imported in import.names.iter().filter(|n| n.bound_name() == name) {
                        found = if import.is_from() {
                            self.import_source(module, import).and_then(|source| {
                                self.lookup_in_module(&source, &imported.name, depth + 1)
                                    .or_else(|| {
                                        let submodule = if source.is_empty() {
                                            imported.name.clone()
                                        } else {
                                            format!("{}.{}", source, imported.name)
                                        };
                                        self.module_file(&submodule)
                                            .map(|_| Symbol::Module(submodule))
                                    })
                            })
                        } else if imported.alias.is_some() {
                            Some(Symbol::Module(imported.name.clone()))
                        } else {
                            Some(Symbol::Module(name.to_string()))
                        };
                    }
                }
                _ => {}
            }
        }
        found
    }

    fn lookup_in_module(&self, dotted: &str, name: &str, depth: usize) -> Option<Symbol> {
        let path = self.module_file(dotted)?;
        let module = self.parse(&path).ok()?;
        self.lookup_symbol(&module, name, depth)
    }

    /// The annotation a function declares, resolved in its own module
    fn declared_return(&self, path: &Path, qualname: &str) -> InferredType {
        let key = InferenceKey::Declared(self.absolute(path), qualname.to_string());
        if let Some(cached) = self.inferences.results.get(&key) {
            return cached.clone();
        }

        let result = match self.parse(path) {
            // which definition is live depends on runtime order
            Ok(module) if module.is_ambiguous(qualname) => InferredType::Unknown,
            Ok(module) => match module.find_function(qualname) {
                // calling a coroutine function yields an awaitable, not the annotation
                Some(f) if f.is_async => InferredType::Unknown,
                Some(f) => match &f.returns {
                    Some(annotation) => self.resolve_annotation(&module, &annotation.text),
                    None => InferredType::Unknown,
                },
                None => InferredType::Unknown,
            },
            Err(_) => InferredType::Unknown,
        };

        self.inferences.results.insert(key, result.clone());
        result
    }

    fn infer_expr(&self, scope: &InferenceScope<'_>, expr: &Expr, depth: usize) -> InferredType {
        if depth > MAX_RESOLUTION_DEPTH {
            return InferredType::Unknown;
        }
        match expr {
            Expr::Literal(lit, _) => match lit {
                Literal::Str | Literal::FStr => InferredType::builtin("str"),
                Literal::Bytes => InferredType::builtin("bytes"),
                Literal::Int => InferredType::builtin("int"),
                Literal::Float => InferredType::builtin("float"),
                Literal::Bool(_) => InferredType::builtin("bool"),
                Literal::None => InferredType::builtin("None"),
                Literal::Ellipsis => InferredType::Unknown,
            },
            Expr::Collection(kind, _, _) => {
                use super::ast::CollectionKind;
                let name = match kind {
                    CollectionKind::List => "list",
                    CollectionKind::Dict => "dict",
                    CollectionKind::Set => "set",
                    CollectionKind::Tuple => "tuple",
                };
                InferredType::builtin(name)
            }
            Expr::Name(name, _) => self.infer_name(scope, name, depth),
            Expr::Call { func, .. } => self.infer_call(scope, func),
            Expr::Attribute { .. } | Expr::Other(_) => InferredType::Unknown,
        }
    }

    /// A name is typed only when every binding of it agrees
    fn infer_name(&self, scope: &InferenceScope<'_>, name: &str, depth: usize) -> InferredType {
        let assignments = match scope.function {
            Some(function) => {
                if let Some(param) = function.param(name) {
                    return match &param.annotation {
                        Some(a) => self.resolve_annotation(scope.module, &a.text),
                        None => InferredType::Unknown,
                    };
                }
                function.local_assignments(name)
            }
            None => scope.module.global_assignments(name),
        };
        let Some(assignments) = assignments else {
            return InferredType::Unknown;
        };

        let mut inferred: Option<InferredType> = None;
        for assign in assignments {
            let ty = self.infer_assignment(scope, assign, depth);
            match (&inferred, &ty) {
                (_, InferredType::Unknown) => return InferredType::Unknown,
                (_, InferredType::Dynamic) => return InferredType::Dynamic,
                (None, _) => inferred = Some(ty),
                (Some(prev), _) if *prev == ty => {}
                (Some(_), _) => return InferredType::Unknown,
            }
        }
        inferred.unwrap_or(InferredType::Unknown)
    }

    fn infer_assignment(
        &self,
        scope: &InferenceScope<'_>,
        assign: &super::ast::Assign,
        depth: usize,
    ) -> InferredType {
        // tuple unpacking binds element types we do not track
        if assign.targets.len() != 1 {
            return InferredType::Unknown;
        }
        if let Some(annotation) = &assign.annotation {
            return self.resolve_annotation(scope.module, &annotation.text);
        }
        match &assign.value {
            Some(value) => self.infer_expr(scope, value, depth + 1),
            None => InferredType::Unknown,
        }
    }

    fn infer_call(&self, scope: &InferenceScope<'_>, func: &Expr) -> InferredType {
        match func {
            Expr::Name(name, _) => {
                if !scope.module.binds(name) {
                    if let Some(builtin) = builtin_call_type(name) {
                        return InferredType::builtin(builtin);
                    }
                }
                match self.lookup_symbol(scope.module, name, 0) {
                    Some(symbol) => self.symbol_call_type(symbol),
                    None => InferredType::Unknown,
                }
            }
            Expr::Attribute { value, attr, .. } => match value.as_ref() {
                Expr::Name(receiver, _) if receiver == "self" || receiver == "cls" => {
                    match scope.class.and_then(|c| c.method(attr)) {
                        Some(method) => self.declared_return(&scope.module.path, &method.qualname),
                        None => InferredType::Unknown,
                    }
                }
                Expr::Name(receiver, _) => {
                    match self.lookup_symbol(scope.module, receiver, 0) {
                        Some(Symbol::Module(dotted)) => {
                            match self.lookup_in_module(&dotted, attr, 1) {
                                Some(symbol) => self.symbol_call_type(symbol),
                                None => InferredType::Unknown,
                            }
                        }
                        Some(Symbol::Class { name, path, .. }) => {
                            self.classmethod_type(&path, &name, attr)
                        }
                        _ => InferredType::Unknown,
                    }
                }
                _ => InferredType::Unknown,
            },
            _ => InferredType::Unknown,
        }
    }

    fn symbol_call_type(&self, symbol: Symbol) -> InferredType {
        match symbol {
            Symbol::Class { module, name, .. } => {
                InferredType::Known(TypeRef::defined_in(name, module))
            }
            Symbol::Function { path, qualname } => self.declared_return(&path, &qualname),
            Symbol::Module(_) => InferredType::Unknown,
        }
    }

    fn classmethod_type(&self, path: &Path, class: &str, method: &str) -> InferredType {
        let Ok(module) = self.parse(path) else {
            return InferredType::Unknown;
        };
        match module.find_class(class).and_then(|c| c.method(method)) {
            Some(f) => self.declared_return(path, &f.qualname),
            None => InferredType::Unknown,
        }
    }

    fn body_return_type(&self, module: &Module, function: &FunctionDef) -> InferredType {
        if function.is_generator {
            return InferredType::Unknown;
        }

        let returns = function.returns();
        if returns.is_empty() {
            if function.is_stub() || function.contains_raise() {
                return InferredType::Unknown;
            }
            return InferredType::builtin("None");
        }

        // A value-returning function must not fall off the end
        let returns_value = returns.iter().any(|r| r.value.is_some());
        let ends_explicitly = matches!(
            function.effective_body().last(),
            Some(Stmt::Return(_)) | Some(Stmt::Raise(_))
        );
        if returns_value && !ends_explicitly {
            return InferredType::Unknown;
        }

        let scope = InferenceScope::function(module, function);
        let mut inferred: Option<InferredType> = None;
        for ret in returns {
            let ty = match &ret.value {
                Some(value) => self.infer_expr(&scope, value, 0),
                None => InferredType::builtin("None"),
            };
            match (&inferred, &ty) {
                (_, InferredType::Unknown) => return InferredType::Unknown,
                (_, InferredType::Dynamic) => return InferredType::Dynamic,
                (None, _) => inferred = Some(ty),
                (Some(prev), _) if *prev == ty => {}
                (Some(_), _) => return InferredType::Unknown,
            }
        }
        inferred.unwrap_or(InferredType::Unknown)
    }

    fn class_ancestors(
        &self,
        module: &Module,
        class: &ClassDef,
        queue: &mut VecDeque<(Arc<Module>, String)>,
        chain: &mut Vec<Ancestor>,
    ) {
        for base in &class.bases {
            let Some(dotted) = base.dotted_name() else {
                continue;
            };
            if dotted == "object" {
                continue;
            }
            let symbol = match dotted.rsplit_once('.') {
                None => self.lookup_symbol(module, &dotted, 0),
                Some((receiver, attr)) => match self.lookup_symbol(module, receiver, 0) {
                    Some(Symbol::Module(m)) => self.lookup_in_module(&m, attr, 1),
                    _ => None,
                },
            };
            match symbol {
                Some(Symbol::Class { name, path, .. }) => {
                    chain.push(Ancestor {
                        name: name.clone(),
                        path: Some(self.relative(&self.absolute(&path))),
                    });
                    if let Ok(defining) = self.parse(&path) {
                        queue.push_back((defining, name));
                    }
                }
                _ => {
                    let name = dotted.rsplit('.').next().unwrap_or(&dotted).to_string();
                    chain.push(Ancestor { name, path: None });
                }
            }
        }
    }
}

impl SemanticAnalyzer for PythonAnalyzer {
    fn root(&self) -> &Path {
        &self.root
    }

    fn parse(&self, path: &Path) -> Result<Arc<Module>, ParseError> {
        let absolute = self.absolute(path);
        if let Some(module) = self.parses.modules.get(&absolute) {
            return Ok(Arc::clone(&module));
        }

        let source = std::fs::read_to_string(&absolute).map_err(|source| ParseError::Io {
            path: absolute.clone(),
            source,
        })?;
        let relative = self.relative(&absolute);
        let module = Arc::new(python::parse_source(
            &source,
            &relative,
            &module_name(&relative),
        )?);
        self.parses.modules.insert(absolute, Arc::clone(&module));
        Ok(module)
    }

    fn infer_type(&self, scope: &InferenceScope<'_>, expr: &Expr) -> InferredType {
        self.infer_expr(scope, expr, 0)
    }

    fn infer_return_type(&self, module: &Module, function: &FunctionDef) -> InferredType {
        let key = InferenceKey::Body(
            self.absolute(&module.path),
            function.qualname.clone(),
            function.span.start_byte,
        );
        if let Some(cached) = self.inferences.results.get(&key) {
            return cached.clone();
        }
        let result = self.body_return_type(module, function);
        self.inferences.results.insert(key, result.clone());
        result
    }

    fn resolve_annotation(&self, module: &Module, annotation: &str) -> InferredType {
        let text = annotation
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim();

        let tokens: Vec<&str> = text
            .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.iter().any(|t| *t == "Any" || t.ends_with(".Any")) {
            return InferredType::Dynamic;
        }

        if BUILTIN_TYPES.contains(&text) {
            return InferredType::builtin(text);
        }

        // list[int], dict[str, int], int | None
        if text.contains('[') || text.contains('|') {
            let base = text.split('[').next().unwrap_or(text).trim();
            let base_ok = !text.contains('[') || BUILTIN_GENERICS.contains(&base);
            let all_builtin = tokens
                .iter()
                .all(|t| BUILTIN_TYPES.contains(t) || *t == "...");
            return if base_ok && all_builtin {
                InferredType::builtin(text)
            } else {
                InferredType::Unknown
            };
        }

        let symbol = match text.rsplit_once('.') {
            None => self.lookup_symbol(module, text, 0),
            Some((receiver, attr)) => match self.lookup_symbol(module, receiver, 0) {
                Some(Symbol::Module(dotted)) => self.lookup_in_module(&dotted, attr, 1),
                _ => None,
            },
        };
        match symbol {
            Some(Symbol::Class { module, name, .. }) => {
                InferredType::Known(TypeRef::defined_in(name, module))
            }
            _ => InferredType::Unknown,
        }
    }

    fn lookup_class_chain(&self, module: &Module, class: &ClassDef) -> Vec<Ancestor> {
        let mut chain = Vec::new();
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();

        self.class_ancestors(module, class, &mut queue, &mut chain);
        while let Some((defining, name)) = queue.pop_front() {
            if chain.len() > MAX_RESOLUTION_DEPTH * 4 {
                break;
            }
            if !seen.insert((defining.path.clone(), name.clone())) {
                continue;
            }
            if let Some(base_class) = defining.find_class(&name) {
                self.class_ancestors(&defining, base_class, &mut queue, &mut chain);
            }
        }
        chain
    }

    fn imported_modules(&self, module: &Module, import: &Import) -> Vec<String> {
        if import.is_from() {
            self.import_source(module, import)
                .filter(|m| !m.is_empty())
                .into_iter()
                .collect()
        } else {
            import.names.iter().map(|n| n.name.clone()).collect()
        }
    }

    fn is_reachable(&self, module: &Module, type_ref: &TypeRef) -> bool {
        let Some(defining) = &type_ref.module else {
            return true;
        };
        if *defining == module.name {
            return true;
        }
        matches!(
            self.lookup_symbol(module, &type_ref.name, 0),
            Some(Symbol::Class { module: m, name, .. }) if m == *defining && name == type_ref.name
        )
    }

    fn clear_cache(&self) {
        let coordinator = self.coordinator();
        debug!("Clearing {} cached analysis entries", self.cached_entries());
        coordinator.invalidate_all();
    }
}

/// `app/domain/user.py` -> `app.domain.user`, packages drop `__init__`
fn module_name(relative: &Path) -> String {
    let mut parts: Vec<String> = relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.last().is_some_and(|p| p == "__init__") {
        parts.pop();
    }
    parts.join(".")
}

fn builtin_call_type(name: &str) -> Option<&'static str> {
    let ty = match name {
        "str" | "repr" | "chr" | "format" | "input" => "str",
        "int" | "len" | "hash" | "ord" | "id" => "int",
        "float" => "float",
        "bool" | "isinstance" | "issubclass" | "callable" | "hasattr" => "bool",
        "bytes" => "bytes",
        "bytearray" => "bytearray",
        "list" | "sorted" => "list",
        "dict" => "dict",
        "set" => "set",
        "frozenset" => "frozenset",
        "tuple" => "tuple",
        _ => return None,
    };
    Some(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project(files: &[(&str, &str)]) -> (tempfile::TempDir, PythonAnalyzer) {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let analyzer = PythonAnalyzer::new(dir.path());
        (dir, analyzer)
    }

    fn body_type(analyzer: &PythonAnalyzer, path: &str, qualname: &str) -> InferredType {
        let module = analyzer.parse(Path::new(path)).unwrap();
        let function = module.find_function(qualname).unwrap();
        analyzer.infer_return_type(&module, function)
    }

    #[test]
    fn test_module_name() {
        assert_eq!(module_name(Path::new("app/domain/user.py")), "app.domain.user");
        assert_eq!(module_name(Path::new("app/__init__.py")), "app");
    }

    #[test]
    fn test_infers_literal_returns() {
        let (_dir, analyzer) = project(&[(
            "m.py",
            "def greeting():\n    return \"hello\"\n\ndef count():\n    return 1\n\ndef nothing():\n    print('x')\n",
        )]);
        assert_eq!(body_type(&analyzer, "m.py", "greeting"), InferredType::builtin("str"));
        assert_eq!(body_type(&analyzer, "m.py", "count"), InferredType::builtin("int"));
        assert_eq!(body_type(&analyzer, "m.py", "nothing"), InferredType::builtin("None"));
    }

    #[test]
    fn test_mixed_or_fallthrough_returns_are_unknown() {
        let (_dir, analyzer) = project(&[(
            "m.py",
            "def mixed(x):\n    if x:\n        return 1\n    return 'a'\n\ndef partial(x):\n    if x:\n        return 1\n    print(x)\n",
        )]);
        assert_eq!(body_type(&analyzer, "m.py", "mixed"), InferredType::Unknown);
        assert_eq!(body_type(&analyzer, "m.py", "partial"), InferredType::Unknown);
    }

    #[test]
    fn test_reassigned_locals_are_unknown() {
        let (_dir, analyzer) = project(&[(
            "m.py",
            "def first_truthy(items: list):\n    result = None\n    for item in items:\n        if item:\n            result = \"found\"\n            break\n    return result\n\n\
def label(n: int):\n    text = 0\n    text = \"n=\" + str(n)\n    return text\n\n\
def steady(flag: bool):\n    name = \"a\"\n    if flag:\n        name = \"b\"\n    return name\n",
        )]);
        assert_eq!(body_type(&analyzer, "m.py", "first_truthy"), InferredType::Unknown);
        assert_eq!(body_type(&analyzer, "m.py", "label"), InferredType::Unknown);
        assert_eq!(body_type(&analyzer, "m.py", "steady"), InferredType::builtin("str"));
    }

    #[test]
    fn test_other_binding_forms_make_names_unknown() {
        let (_dir, analyzer) = project(&[(
            "m.py",
            "def bumped():\n    n = 0\n    n += 1\n    return n\n\n\
def looped(items: list):\n    x = 0\n    for x in items:\n        pass\n    return x\n\n\
def walrus(data: list):\n    size = 0\n    if (size := len(data)) > 3:\n        pass\n    return size\n\n\
def opened(path: str):\n    handle = \"\"\n    with open(path) as handle:\n        pass\n    return handle\n\n\
def unpacked():\n    a, = (1,)\n    return a\n\n\
def chained():\n    a = b = 1\n    return b\n\n\
def outer():\n    count = 0\n\n    def inner():\n        nonlocal count\n        count = \"x\"\n\n    inner()\n    return count\n",
        )]);
        for name in ["bumped", "looped", "walrus", "opened", "unpacked", "chained", "outer"] {
            assert_eq!(body_type(&analyzer, "m.py", name), InferredType::Unknown, "{}", name);
        }
    }

    #[test]
    fn test_module_globals_need_every_binding_to_agree() {
        let (_dir, analyzer) = project(&[(
            "m.py",
            "LIMIT = 10\nMODE = 1\nif True:\n    MODE = \"fast\"\nSTATE = 0\n\n\
def reset():\n    global STATE\n    STATE = None\n\n\
def limit():\n    return LIMIT\n\n\
def mode():\n    return MODE\n\n\
def state():\n    return STATE\n",
        )]);
        let module = analyzer.parse(Path::new("m.py")).unwrap();
        let scope = InferenceScope::module(&module);
        let name = |n: &str| Expr::Name(n.to_string(), Default::default());
        assert_eq!(analyzer.infer_type(&scope, &name("LIMIT")), InferredType::builtin("int"));
        assert_eq!(analyzer.infer_type(&scope, &name("MODE")), InferredType::Unknown);
        assert_eq!(analyzer.infer_type(&scope, &name("STATE")), InferredType::Unknown);
    }

    #[test]
    fn test_same_qualname_definitions_do_not_share_results() {
        let (_dir, analyzer) = project(&[(
            "m.py",
            "import sys\n\nif sys.platform == \"win32\":\n    def sep():\n        return 1\nelse:\n    def sep():\n        return \"/\"\n",
        )]);
        let module = analyzer.parse(Path::new("m.py")).unwrap();
        assert!(module.is_ambiguous("sep"));

        let mut defs = Vec::new();
        for stmt in &module.body {
            if let Stmt::Compound(c) = stmt {
                for block in &c.blocks {
                    for inner in block {
                        if let Stmt::FunctionDef(f) = inner {
                            defs.push(f);
                        }
                    }
                }
            }
        }
        assert_eq!(defs.len(), 2);
        assert_eq!(analyzer.infer_return_type(&module, defs[0]), InferredType::builtin("int"));
        assert_eq!(analyzer.infer_return_type(&module, defs[1]), InferredType::builtin("str"));
    }

    #[test]
    fn test_call_site_uses_declared_annotation() {
        let (dir, analyzer) = project(&[(
            "m.py",
            "def greeting():\n    return 'hello'\n\ndef relay():\n    return greeting()\n",
        )]);
        assert_eq!(body_type(&analyzer, "m.py", "relay"), InferredType::Unknown);

        fs::write(
            dir.path().join("m.py"),
            "def greeting() -> str:\n    return 'hello'\n\ndef relay():\n    return greeting()\n",
        )
        .unwrap();
        // stale until the cache is cleared
        assert_eq!(body_type(&analyzer, "m.py", "relay"), InferredType::Unknown);
        analyzer.clear_cache();
        assert_eq!(body_type(&analyzer, "m.py", "relay"), InferredType::builtin("str"));
    }

    #[test]
    fn test_any_is_dynamic() {
        let (_dir, analyzer) = project(&[(
            "m.py",
            "from typing import Any\n\ndef load() -> Any:\n    return 1\n\ndef wrap():\n    return load()\n",
        )]);
        assert_eq!(body_type(&analyzer, "m.py", "wrap"), InferredType::Dynamic);
    }

    #[test]
    fn test_cross_module_class_resolution() {
        let (_dir, analyzer) = project(&[
            ("app/__init__.py", ""),
            ("app/domain/__init__.py", ""),
            ("app/domain/user.py", "class User:\n    pass\n"),
            (
                "app/services/users.py",
                "from ..domain.user import User\n\ndef make():\n    return User()\n",
            ),
        ]);
        assert_eq!(
            body_type(&analyzer, "app/services/users.py", "make"),
            InferredType::Known(TypeRef::defined_in("User", "app.domain.user"))
        );

        let module = analyzer.parse(Path::new("app/services/users.py")).unwrap();
        assert!(analyzer.is_reachable(&module, &TypeRef::defined_in("User", "app.domain.user")));
        assert!(!analyzer.is_reachable(&module, &TypeRef::defined_in("Order", "app.domain.order")));
    }

    #[test]
    fn test_self_method_call() {
        let (_dir, analyzer) = project(&[(
            "m.py",
            "class Greeter:\n    def name(self) -> str:\n        return 'x'\n\n    def hello(self):\n        return self.name()\n",
        )]);
        assert_eq!(
            body_type(&analyzer, "m.py", "Greeter.hello"),
            InferredType::builtin("str")
        );
    }

    #[test]
    fn test_annotation_resolution() {
        let (_dir, analyzer) = project(&[("m.py", "class Local:\n    pass\n")]);
        let module = analyzer.parse(Path::new("m.py")).unwrap();
        assert_eq!(
            analyzer.resolve_annotation(&module, "list[int]"),
            InferredType::builtin("list[int]")
        );
        assert_eq!(
            analyzer.resolve_annotation(&module, "dict[str, Any]"),
            InferredType::Dynamic
        );
        assert_eq!(
            analyzer.resolve_annotation(&module, "'Local'"),
            InferredType::Known(TypeRef::defined_in("Local", "m"))
        );
        assert_eq!(
            analyzer.resolve_annotation(&module, "Missing"),
            InferredType::Unknown
        );
    }

    #[test]
    fn test_class_chain_nearest_first() {
        let (_dir, analyzer) = project(&[
            ("base.py", "class Root:\n    pass\n\nclass Middle(Root):\n    pass\n"),
            ("leaf.py", "from base import Middle\n\nclass Leaf(Middle, Unknown):\n    pass\n"),
        ]);
        let module = analyzer.parse(Path::new("leaf.py")).unwrap();
        let class = module.find_class("Leaf").unwrap();
        let chain = analyzer.lookup_class_chain(&module, class);
        let names: Vec<_> = chain.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Middle", "Unknown", "Root"]);
        assert_eq!(chain[0].path.as_deref(), Some(Path::new("base.py")));
        assert_eq!(chain[1].path, None);
    }

    #[test]
    fn test_clear_cache_is_idempotent() {
        let (_dir, analyzer) = project(&[("m.py", "def f():\n    return 1\n")]);
        body_type(&analyzer, "m.py", "f");
        assert!(analyzer.cached_entries() > 0);
        analyzer.clear_cache();
        analyzer.clear_cache();
        assert_eq!(analyzer.cached_entries(), 0);
    }

    #[test]
    fn test_parse_error_on_invalid_syntax() {
        let (_dir, analyzer) = project(&[("bad.py", "def broken(:\n")]);
        assert!(matches!(
            analyzer.parse(Path::new("bad.py")),
            Err(ParseError::Syntax { .. })
        ));
    }
}

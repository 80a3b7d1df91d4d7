use std::collections::{BTreeMap, BTreeSet};

use super::graph::DependencyGraph;
use crate::core::{ImportKind, ImportRef, SourceFile};

#[derive(Debug, Clone)]
struct ModuleEntry {
    path: String,
    is_package: bool,
}

/// Maps dotted module names to project files.
///
/// Built once over the whole file set, after every extraction has
/// finished, then queried read-only.
#[derive(Debug, Clone, Default)]
pub struct ModuleResolver {
    modules: BTreeMap<String, ModuleEntry>,
    /// Source roots, longest first; `""` is the project root.
    roots: Vec<String>,
}

impl ModuleResolver {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_source_roots(paths, Vec::<String>::new())
    }

    /// Also names modules relative to each extra root, e.g. `src`.
    pub fn with_source_roots<I, S, R, T>(paths: I, roots: R) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        R: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut roots: Vec<String> = roots
            .into_iter()
            .map(|r| normalize_root(r.as_ref()))
            .collect();
        roots.push(String::new());
        roots.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        roots.dedup();

        let mut paths: Vec<String> = paths.into_iter().map(|p| p.as_ref().to_string()).collect();
        paths.sort();
        paths.dedup();

        let mut modules: BTreeMap<String, ModuleEntry> = BTreeMap::new();
        for path in &paths {
            for root in &roots {
                let Some(rel) = strip_root(path, root) else {
                    continue;
                };
                let Some((name, is_package)) = module_name_from_rel_path(rel) else {
                    continue;
                };
                match modules.get(&name) {
                    Some(existing) if existing.is_package || !is_package => {}
                    _ => {
                        modules.insert(
                            name,
                            ModuleEntry {
                                path: path.clone(),
                                is_package,
                            },
                        );
                    }
                }
            }
        }

        tracing::debug!(modules = modules.len(), roots = roots.len(), "module index built");
        Self { modules, roots }
    }

    pub fn from_files(files: &[SourceFile], roots: &[String]) -> Self {
        Self::with_source_roots(files.iter().map(|f| f.path.as_str()), roots)
    }

    /// File that defines a dotted module name.
    pub fn lookup(&self, module: &str) -> Option<&str> {
        self.modules.get(module).map(|entry| entry.path.as_str())
    }

    /// Project files that an import statement in `importer` refers to.
    /// External and unresolvable references yield nothing.
    pub fn resolve(&self, importer: &str, import: &ImportRef) -> BTreeSet<String> {
        let mut targets = BTreeSet::new();
        let Some(base) = self.base_module(importer, import) else {
            return targets;
        };
        let base_target = if base.is_empty() {
            None
        } else {
            self.lookup(&base.join("."))
        };

        match import.kind {
            ImportKind::Import => {
                if let Some(target) = base_target {
                    targets.insert(target.to_string());
                }
            }
            ImportKind::From => {
                // `from pkg import a` always depends on `pkg`. A bare
                // `from . import a` only does when `a` is not a submodule.
                let mut needs_base =
                    !import.raw_module.is_empty() || import.imported_names.is_empty();
                for name in &import.imported_names {
                    if name == "*" {
                        needs_base = true;
                        continue;
                    }
                    let mut candidate = base.clone();
                    candidate.extend(name.split('.').map(str::to_string));
                    match self.lookup(&candidate.join(".")) {
                        Some(target) => {
                            targets.insert(target.to_string());
                        }
                        None => needs_base = true,
                    }
                }
                if needs_base && let Some(target) = base_target {
                    targets.insert(target.to_string());
                }
            }
        }
        targets
    }

    /// Absolute module parts an import starts from. `None` when a relative
    /// import climbs above the root.
    fn base_module(&self, importer: &str, import: &ImportRef) -> Option<Vec<String>> {
        let tail = import
            .raw_module
            .split('.')
            .filter(|part| !part.is_empty())
            .map(str::to_string);

        if !import.is_relative() {
            let parts: Vec<String> = tail.collect();
            return if parts.is_empty() { None } else { Some(parts) };
        }

        let mut parts = self.package_parts(importer);
        let up = import.relative_level - 1;
        if up > parts.len() {
            tracing::debug!(importer, level = import.relative_level, "relative import above root");
            return None;
        }
        parts.truncate(parts.len() - up);
        parts.extend(tail);
        Some(parts)
    }

    /// Package containing a file: its directory, as module parts.
    fn package_parts(&self, path: &str) -> Vec<String> {
        let Some(rel) = self.relative_to_root(path) else {
            return Vec::new();
        };
        let mut parts: Vec<String> = rel.split('/').map(str::to_string).collect();
        parts.pop();
        parts
    }

    fn relative_to_root<'p>(&self, path: &'p str) -> Option<&'p str> {
        self.roots.iter().find_map(|root| strip_root(path, root))
    }
}

fn normalize_root(root: &str) -> String {
    let root = root.replace('\\', "/");
    let root = root.trim_matches('/');
    if root == "." {
        String::new()
    } else {
        root.trim_start_matches("./").to_string()
    }
}

fn strip_root<'p>(path: &'p str, root: &str) -> Option<&'p str> {
    if root.is_empty() {
        return Some(path);
    }
    path.strip_prefix(root)?.strip_prefix('/')
}

/// `a/b/c.py` → (`a.b.c`, false), `a/b/__init__.py` → (`a.b`, true).
pub fn module_name_from_rel_path(rel_path: &str) -> Option<(String, bool)> {
    let stem = rel_path.strip_suffix(".py")?;
    let mut parts: Vec<&str> = stem.split('/').collect();
    let is_package = parts.last() == Some(&"__init__");
    if is_package {
        parts.pop();
    }
    if parts.is_empty() || parts.iter().any(|p| p.is_empty() || p.contains('.')) {
        return None;
    }
    Some((parts.join("."), is_package))
}

/// One node per file; one edge per resolved project-local import.
pub fn build_dependency_graph(files: &[SourceFile], resolver: &ModuleResolver) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for file in files {
        graph.add_node(file.path.as_str());
    }

    for file in files {
        for import in &file.imports {
            for target in resolver.resolve(&file.path, import) {
                graph.add_edge(&file.path, &target);
            }
        }
    }

    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "dependency graph built"
    );
    graph
}

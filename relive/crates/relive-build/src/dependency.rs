//! Dependency index: which translation units to rebuild for a changed file.
//!
//! Units come from the factories a module exports. Each unit carries the
//! headers it includes, the libraries it links and the other sources it is
//! compiled with. Only headers declared *modifiable* fan out: editing one
//! rebuilds every unit known to include it.
//!
//! Relative paths are resolved against the index's base directory so that
//! declarations like `file!()` line up with the absolute paths a file
//! watcher reports.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use relive_core::{IncludeDecl, ObjectFactory};
use rustc_hash::FxHashMap;

/// Build inputs of one translation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitInfo {
    pub project: String,
    pub includes: Vec<IncludeDecl>,
    pub link_libraries: BTreeSet<String>,
    pub source_dependencies: BTreeSet<PathBuf>,
}

/// File to translation-unit dependency map.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    base: Option<PathBuf>,
    units: BTreeMap<PathBuf, UnitInfo>,
    /// Modifiable header to the units including it.
    dependents: FxHashMap<PathBuf, BTreeSet<PathBuf>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index that resolves relative paths against `base`.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
            ..Self::default()
        }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Record a unit's declarations, merging with earlier ones.
    pub fn register_unit(
        &mut self,
        project: &str,
        source: &Path,
        includes: &[IncludeDecl],
        link_libraries: &[String],
        source_dependencies: &[PathBuf],
    ) -> PathBuf {
        let source = self.resolve(source);
        let includes: Vec<IncludeDecl> = includes
            .iter()
            .map(|decl| IncludeDecl {
                path: self.resolve(&decl.path),
                modifiable: decl.modifiable,
            })
            .collect();
        let source_dependencies: Vec<PathBuf> =
            source_dependencies.iter().map(|path| self.resolve(path)).collect();

        for decl in includes.iter().filter(|decl| decl.modifiable) {
            self.dependents
                .entry(decl.path.clone())
                .or_default()
                .insert(source.clone());
        }

        let unit = self.units.entry(source.clone()).or_default();
        unit.project = project.to_string();
        for decl in includes {
            if !unit.includes.contains(&decl) {
                unit.includes.push(decl);
            }
        }
        unit.link_libraries.extend(link_libraries.iter().cloned());
        unit.source_dependencies.extend(source_dependencies);
        source
    }

    pub fn register_factory(&mut self, project: &str, factory: &dyn ObjectFactory) -> PathBuf {
        self.register_unit(
            project,
            factory.source_file(),
            factory.includes(),
            factory.link_libraries(),
            factory.source_dependencies(),
        )
    }

    pub fn unit(&self, source: &Path) -> Option<&UnitInfo> {
        self.units.get(&self.resolve(source))
    }

    pub fn contains_unit(&self, source: &Path) -> bool {
        self.unit(source).is_some()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn units(&self) -> impl Iterator<Item = (&Path, &UnitInfo)> {
        self.units.iter().map(|(path, info)| (path.as_path(), info))
    }

    /// Units that include the modifiable header `header`.
    pub fn dependents_of(&self, header: &Path) -> BTreeSet<PathBuf> {
        self.dependents
            .get(&self.resolve(header))
            .cloned()
            .unwrap_or_default()
    }

    /// Every path worth watching: units, their source dependencies and
    /// modifiable headers.
    pub fn watched_paths(&self) -> BTreeSet<PathBuf> {
        let mut paths: BTreeSet<PathBuf> = self.units.keys().cloned().collect();
        for unit in self.units.values() {
            paths.extend(unit.source_dependencies.iter().cloned());
        }
        paths.extend(self.dependents.keys().cloned());
        paths
    }

    /// Units to rebuild after `changed` were edited.
    ///
    /// A changed unit rebuilds itself; a changed modifiable header rebuilds
    /// its dependents; a changed source dependency rebuilds the units
    /// compiled with it. Anything else is ignored.
    pub fn rebuild_set(&self, changed: &[PathBuf]) -> BTreeSet<PathBuf> {
        let mut rebuild = BTreeSet::new();
        for path in changed {
            let path = self.resolve(path);
            if self.units.contains_key(&path) {
                rebuild.insert(path.clone());
            }
            if let Some(dependents) = self.dependents.get(&path) {
                rebuild.extend(dependents.iter().cloned());
            }
            for (unit, info) in &self.units {
                if info.source_dependencies.contains(&path) {
                    rebuild.insert(unit.clone());
                }
            }
        }
        rebuild
    }

    /// Sources to hand the compiler for `units`: the units plus the
    /// transitive closure of their source dependencies.
    pub fn compile_sources(&self, units: &BTreeSet<PathBuf>) -> BTreeSet<PathBuf> {
        let mut sources = BTreeSet::new();
        let mut pending: Vec<PathBuf> = units.iter().cloned().collect();
        while let Some(path) = pending.pop() {
            if !sources.insert(path.clone()) {
                continue;
            }
            if let Some(info) = self.units.get(&path) {
                pending.extend(info.source_dependencies.iter().cloned());
            }
        }
        sources
    }

    /// Libraries the given units link, deduplicated and sorted.
    pub fn link_libraries(&self, units: &BTreeSet<PathBuf>) -> BTreeSet<String> {
        units
            .iter()
            .filter_map(|unit| self.units.get(unit))
            .flat_map(|info| info.link_libraries.iter().cloned())
            .collect()
    }

    /// Split `units` by the project that owns them.
    pub fn by_project(&self, units: &BTreeSet<PathBuf>) -> BTreeMap<String, BTreeSet<PathBuf>> {
        let mut grouped: BTreeMap<String, BTreeSet<PathBuf>> = BTreeMap::new();
        for unit in units {
            if let Some(info) = self.units.get(unit) {
                grouped
                    .entry(info.project.clone())
                    .or_default()
                    .insert(unit.clone());
            }
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(values: &[&str]) -> BTreeSet<PathBuf> {
        values.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_changed_unit_rebuilds_itself() {
        let mut index = DependencyIndex::new();
        index.register_unit("game", Path::new("/p/a.c"), &[], &[], &[]);
        assert_eq!(index.rebuild_set(&[PathBuf::from("/p/a.c")]), paths(&["/p/a.c"]));
        assert!(index.rebuild_set(&[PathBuf::from("/p/unknown.c")]).is_empty());
    }

    #[test]
    fn test_plain_include_does_not_fan_out() {
        let mut index = DependencyIndex::new();
        index.register_unit("game", Path::new("/p/a.c"), &[IncludeDecl::new("/p/a.h")], &[], &[]);
        assert!(index.rebuild_set(&[PathBuf::from("/p/a.h")]).is_empty());
    }

    #[test]
    fn test_relative_paths_use_base() {
        let mut index = DependencyIndex::with_base("/work");
        let unit = index.register_unit(
            "game",
            Path::new("src/a.c"),
            &[IncludeDecl::modifiable("src/shared.h")],
            &[],
            &[],
        );
        assert_eq!(unit, PathBuf::from("/work/src/a.c"));
        assert_eq!(
            index.rebuild_set(&[PathBuf::from("/work/src/shared.h")]),
            paths(&["/work/src/a.c"])
        );
    }

    #[test]
    fn test_source_dependencies_are_closed_over() {
        let mut index = DependencyIndex::new();
        index.register_unit("game", Path::new("/p/a.c"), &[], &[], &[PathBuf::from("/p/b.c")]);
        index.register_unit("game", Path::new("/p/b.c"), &[], &[], &[PathBuf::from("/p/c.c")]);

        let sources = index.compile_sources(&paths(&["/p/a.c"]));
        assert_eq!(sources, paths(&["/p/a.c", "/p/b.c", "/p/c.c"]));

        // Editing a dependency rebuilds the unit compiled with it.
        assert_eq!(
            index.rebuild_set(&[PathBuf::from("/p/c.c")]),
            paths(&["/p/b.c"])
        );
    }

    #[test]
    fn test_libraries_and_projects() {
        let mut index = DependencyIndex::new();
        index.register_unit("game", Path::new("/p/a.c"), &[], &["m".to_string()], &[]);
        index.register_unit("tools", Path::new("/p/t.c"), &[], &["z".to_string(), "m".to_string()], &[]);

        let all = paths(&["/p/a.c", "/p/t.c"]);
        let libraries: Vec<_> = index.link_libraries(&all).into_iter().collect();
        assert_eq!(libraries, vec!["m", "z"]);

        let grouped = index.by_project(&all);
        assert_eq!(grouped["game"], paths(&["/p/a.c"]));
        assert_eq!(grouped["tools"], paths(&["/p/t.c"]));
    }

    #[test]
    fn test_reregistration_merges() {
        let mut index = DependencyIndex::new();
        let header = IncludeDecl::modifiable("/p/h.h");
        index.register_unit("game", Path::new("/p/a.c"), &[header.clone()], &[], &[]);
        index.register_unit("game", Path::new("/p/a.c"), &[header], &[], &[]);
        assert_eq!(index.unit(Path::new("/p/a.c")).map(|u| u.includes.len()), Some(1));
        assert_eq!(index.watched_paths(), paths(&["/p/a.c", "/p/h.h"]));
    }
}

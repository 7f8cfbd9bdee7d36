//! `Mapping`: the reconciliation engine. Given a multiset of requirements
//! grouped by package name, each carrying a predicate and (once built) a
//! wheel locator, choose one concrete version per package name that
//! satisfies every filed predicate — or report `VersionConflict`.
//!
//! This is the engine `Env::load_installer` drives after the
//! retrieve-and-build phase completes.

use std::collections::HashMap;

use rustc_hash::FxHashMap;
use spindle_requirement::{PackageName, Requirement};
use spindle_version::{Version, VersionSpec};

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("no version of {package} satisfies every filed predicate ({predicates})")]
    VersionConflict {
        package: PackageName,
        predicates: VersionSpec,
        requesters: Vec<Requirement>,
    },
}

/// Arbitrary per-requirement metadata attached via `set_data`/`get_data`:
/// the wheel locator, an attached exception, and the concrete built version
/// (parsed from the wheel filename by whoever calls `set_data`) since
/// `best_version` cannot otherwise tell which candidate version a filed
/// requirement's wheel represents.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Wheel(String),
    Version(Version),
    Exception(String),
}

impl DataValue {
    pub fn as_wheel(&self) -> Option<&str> {
        match self {
            DataValue::Wheel(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_version(&self) -> Option<&Version> {
        match self {
            DataValue::Version(v) => Some(v),
            _ => None,
        }
    }
}

struct Entry {
    requirement: Requirement,
    predicates: VersionSpec,
    dependency_of: Vec<Option<Requirement>>,
    data: HashMap<String, DataValue>,
}

/// Key: (package name, canonical predicate-set string). Multiple
/// requirements for the same package with distinct predicate text get
/// distinct entries; filing the same (name, predicate) pair twice updates
/// the existing entry in place.
#[derive(Default)]
pub struct Mapping {
    entries: FxHashMap<(PackageName, String), Entry>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_for(requirement: &Requirement) -> Option<(PackageName, String)> {
        let name = requirement.package_name()?.clone();
        let predicates = predicates_of(requirement).to_string();
        Some((name, predicates))
    }

    /// Record the `(name, predicate)` pair. Repeated calls for the same
    /// pair accumulate `dependency_of` requesters rather than overwrite.
    pub fn file_requirement(&mut self, requirement: Requirement, dependency_of: Option<Requirement>) {
        let Some(key) = Self::key_for(&requirement) else {
            return;
        };
        let entry = self.entries.entry(key).or_insert_with(|| Entry {
            requirement: requirement.clone(),
            predicates: predicates_of(&requirement).clone(),
            dependency_of: Vec::new(),
            data: HashMap::new(),
        });
        entry.dependency_of.push(dependency_of);
    }

    pub fn set_data(&mut self, requirement: &Requirement, key: &str, value: DataValue) {
        let Some(entry_key) = Self::key_for(requirement) else {
            return;
        };
        if let Some(entry) = self.entries.get_mut(&entry_key) {
            entry.data.insert(key.to_string(), value);
        }
    }

    pub fn get_data(&self, requirement: &Requirement, key: &str) -> Option<&DataValue> {
        let entry_key = Self::key_for(requirement)?;
        self.entries.get(&entry_key)?.data.get(key)
    }

    pub fn get_requirements_by_package_name(&self, name: &PackageName) -> Vec<Requirement> {
        self.entries
            .values()
            .filter(|e| matches_package(&e.requirement, name))
            .map(|e| e.requirement.clone())
            .collect()
    }

    pub fn dependency_of_for(&self, requirement: &Requirement) -> Vec<Option<Requirement>> {
        Self::key_for(requirement)
            .and_then(|k| self.entries.get(&k))
            .map(|e| e.dependency_of.clone())
            .unwrap_or_default()
    }

    /// Choose one concrete version for `name` satisfying every filed
    /// predicate, or fail with `VersionConflict`.
    ///
    /// Algorithm:
    /// 1. Intersect every filed predicate set for `name`.
    /// 2. Restrict to entries carrying a concrete built `Version`.
    /// 3. Pick the highest surviving version.
    /// 4. Tie-break: prefer a user-requested (`dependency_of: None`) entry,
    ///    else the lexicographically smallest `dependency_of`.
    pub fn best_version(&self, name: &PackageName) -> Result<(Version, Requirement), MappingError> {
        let entries: Vec<&Entry> = self
            .entries
            .values()
            .filter(|e| matches_package(&e.requirement, name))
            .collect();

        let intersection = entries
            .iter()
            .fold(VersionSpec::empty(), |acc, e| acc.intersect(&e.predicates));

        let mut candidates: Vec<(Version, &Entry)> = entries
            .iter()
            .filter_map(|e| {
                e.data
                    .get("version")
                    .and_then(DataValue::as_version)
                    .map(|v| (v.clone(), *e))
            })
            .filter(|(v, _)| intersection.matches(v))
            .collect();

        if candidates.is_empty() {
            return Err(MappingError::VersionConflict {
                package: name.clone(),
                predicates: intersection,
                requesters: entries.iter().map(|e| e.requirement.clone()).collect(),
            });
        }

        candidates.sort_by(|a, b| b.0.cmp(&a.0));
        let top_version = candidates[0].0.clone();
        let mut top: Vec<&Entry> = candidates
            .into_iter()
            .take_while(|(v, _)| *v == top_version)
            .map(|(_, e)| e)
            .collect();
        top.sort_by(|a, b| tie_break(a, b));

        Ok((top_version, top[0].requirement.clone()))
    }
}

fn predicates_of(requirement: &Requirement) -> &VersionSpec {
    use spindle_requirement::Requirement as R;
    static EMPTY: std::sync::OnceLock<VersionSpec> = std::sync::OnceLock::new();
    match requirement {
        R::Named(n) => &n.predicates,
        R::Url(_) => EMPTY.get_or_init(VersionSpec::empty),
    }
}

fn matches_package(requirement: &Requirement, name: &PackageName) -> bool {
    requirement.package_name() == Some(name)
}

fn tie_break(a: &&Entry, b: &&Entry) -> std::cmp::Ordering {
    let a_is_root = a.dependency_of.iter().any(Option::is_none);
    let b_is_root = b.dependency_of.iter().any(Option::is_none);
    match (a_is_root, b_is_root) {
        (true, false) => return std::cmp::Ordering::Less,
        (false, true) => return std::cmp::Ordering::Greater,
        _ => {}
    }
    let a_min = smallest_dependency_of(a);
    let b_min = smallest_dependency_of(b);
    a_min.cmp(&b_min)
}

fn smallest_dependency_of(entry: &Entry) -> Option<String> {
    entry
        .dependency_of
        .iter()
        .flatten()
        .map(ToString::to_string)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_requirement::Requirement;

    fn req(s: &str) -> Requirement {
        Requirement::parse(s).unwrap()
    }

    #[test]
    fn best_version_picks_highest_satisfying_candidate() {
        let mut mapping = Mapping::new();
        let r1 = req("sure (== 0.1.2)");
        mapping.file_requirement(r1.clone(), Some(req("curdling")));
        mapping.set_data(&r1, "wheel", DataValue::Wheel("/curds/sure.whl".into()));
        mapping.set_data(&r1, "version", DataValue::Version(Version::parse("0.1.2").unwrap()));

        let name = PackageName::new("sure");
        let (version, chosen) = mapping.best_version(&name).unwrap();
        assert_eq!(version, Version::parse("0.1.2").unwrap());
        assert_eq!(chosen, r1);
    }

    #[test]
    fn diamond_with_compatible_constraints_converges() {
        let mut mapping = Mapping::new();

        let a = req("forbiddenfruit (> 0.1.0)");
        let b = req("forbiddenfruit (>= 0.1.2)");
        mapping.file_requirement(a.clone(), Some(req("curdling")));
        mapping.file_requirement(b.clone(), Some(req("sure (== 0.1.2)")));

        for (r, v) in [(&a, "0.1.5"), (&b, "0.1.5")] {
            mapping.set_data(r, "wheel", DataValue::Wheel("/curds/forbiddenfruit.whl".into()));
            mapping.set_data(r, "version", DataValue::Version(Version::parse(v).unwrap()));
        }

        let name = PackageName::new("forbiddenfruit");
        let (version, _) = mapping.best_version(&name).unwrap();
        assert_eq!(version, Version::parse("0.1.5").unwrap());
    }

    #[test]
    fn conflicting_predicates_fail_with_every_requester_reported() {
        let mut mapping = Mapping::new();
        let b1 = req("B (== 1.0)");
        let b2 = req("B (== 2.0)");
        mapping.file_requirement(b1.clone(), Some(req("A")));
        mapping.file_requirement(b2.clone(), Some(req("A")));
        mapping.set_data(&b1, "wheel", DataValue::Wheel("/curds/b1.whl".into()));
        mapping.set_data(&b1, "version", DataValue::Version(Version::parse("1.0").unwrap()));
        mapping.set_data(&b2, "wheel", DataValue::Wheel("/curds/b2.whl".into()));
        mapping.set_data(&b2, "version", DataValue::Version(Version::parse("2.0").unwrap()));

        let name = PackageName::new("b");
        let err = mapping.best_version(&name).unwrap_err();
        match err {
            MappingError::VersionConflict { requesters, .. } => {
                assert_eq!(requesters.len(), 2);
                assert!(requesters.contains(&b1));
                assert!(requesters.contains(&b2));
            }
        }
    }

    #[test]
    fn tie_break_prefers_user_requested_root() {
        let mut mapping = Mapping::new();
        let from_dep = req("pkg (>= 1.0)");
        mapping.file_requirement(from_dep.clone(), Some(req("other")));
        mapping.file_requirement(from_dep.clone(), None);
        mapping.set_data(&from_dep, "wheel", DataValue::Wheel("/curds/pkg.whl".into()));
        mapping.set_data(&from_dep, "version", DataValue::Version(Version::parse("1.0.0").unwrap()));

        let name = PackageName::new("pkg");
        let (_, chosen) = mapping.best_version(&name).unwrap();
        assert_eq!(chosen, from_dep);
        let deps = mapping.dependency_of_for(&from_dep);
        assert!(deps.iter().any(Option::is_none));
    }

    #[test]
    fn filing_twice_accumulates_dependency_of_keeps_last_wheel() {
        let mut mapping = Mapping::new();
        let r = req("pkg (== 1.0.0)");
        mapping.file_requirement(r.clone(), Some(req("first")));
        mapping.set_data(&r, "wheel", DataValue::Wheel("/curds/first.whl".into()));
        mapping.file_requirement(r.clone(), Some(req("second")));
        mapping.set_data(&r, "wheel", DataValue::Wheel("/curds/second.whl".into()));

        let deps = mapping.dependency_of_for(&r);
        assert_eq!(deps.len(), 2);
        assert_eq!(
            mapping.get_data(&r, "wheel").unwrap().as_wheel(),
            Some("/curds/second.whl")
        );
    }
}

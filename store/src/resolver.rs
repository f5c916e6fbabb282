//! Dependency Resolver
//!
//! Depth-first expansion of a package's dependency graph into an install
//! order where every dependency precedes its dependents and the requested
//! package comes last. Traversal uses an explicit stack so arbitrarily deep
//! chains do not grow the call stack; a visited set breaks cycles and stops
//! shared dependencies from being expanded twice.

use std::collections::HashSet;

use crate::catalog::{Catalog, InstalledIndex, PackageDescriptor};

/// Ordered install set plus the dependency names that could not be found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub packages: Vec<PackageDescriptor>,
    /// Missing dependency names, in the order they were encountered
    pub missing: Vec<String>,
}

impl Resolution {
    pub fn names(&self) -> Vec<&str> {
        self.packages.iter().map(|pkg| pkg.name.as_str()).collect()
    }

    /// Log line for each missing dependency
    pub fn warnings(&self) -> impl Iterator<Item = String> + '_ {
        self.missing
            .iter()
            .map(|name| format!("[WARN] Dependency '{name}' not found."))
    }
}

/// Expand `target` against `catalog`
///
/// Dependencies are looked up by name (first catalog match) in listed order.
/// A name that is not in the catalog is recorded in `missing` and skipped.
pub fn resolve<'a>(target: &'a PackageDescriptor, catalog: &'a Catalog) -> Resolution {
    let mut visited: HashSet<&'a str> = HashSet::new();
    let mut resolution = Resolution::default();

    // (package, index of the next dependency to visit)
    let mut stack: Vec<(&'a PackageDescriptor, usize)> = Vec::new();
    visited.insert(target.name.as_str());
    stack.push((target, 0));

    while let Some((pkg, next)) = stack.last().copied() {
        let Some(dep_name) = pkg.dependencies.get(next) else {
            stack.pop();
            resolution.packages.push(pkg.clone());
            continue;
        };

        if let Some(top) = stack.last_mut() {
            top.1 += 1;
        }

        match catalog.find(dep_name) {
            Some(dep) => {
                if visited.insert(dep.name.as_str()) {
                    stack.push((dep, 0));
                }
            }
            None => {
                tracing::warn!(
                    package = %pkg.name,
                    dependency = %dep_name,
                    "Dependency not found in catalog"
                );
                resolution.missing.push(dep_name.clone());
            }
        }
    }

    resolution
}

/// Drop what is already installed
///
/// Dependencies are kept only when absent from `installed`. The requested
/// target is kept when absent or installed at a different version, so a
/// target can be reinstalled at the catalog version.
pub fn filter_installed(
    target: &str,
    packages: Vec<PackageDescriptor>,
    installed: &InstalledIndex,
) -> Vec<PackageDescriptor> {
    packages
        .into_iter()
        .filter(|pkg| {
            if pkg.name == target {
                installed.version_of(&pkg.name) != Some(pkg.version.as_str())
            } else {
                !installed.contains(&pkg.name)
            }
        })
        .collect()
}

/// Resolve and filter in one step; the result's `packages` is the install queue
pub fn install_queue(
    target: &PackageDescriptor,
    catalog: &Catalog,
    installed: &InstalledIndex,
) -> Resolution {
    let resolution = resolve(target, catalog);
    Resolution {
        packages: filter_installed(&target.name, resolution.packages, installed),
        missing: resolution.missing,
    }
}

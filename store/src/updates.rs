//! Update Reconciler
//!
//! Versions are opaque strings; any difference counts as an update.

use std::collections::HashSet;

use crate::catalog::{Catalog, InstalledIndex, PackageDescriptor};

/// Catalog packages installed at a version other than the catalog's
///
/// Names that appear more than once in the catalog are reported once, using
/// the first row.
pub fn compute_updates(catalog: &Catalog, installed: &InstalledIndex) -> Vec<PackageDescriptor> {
    let mut seen = HashSet::new();
    catalog
        .iter()
        .filter(|pkg| seen.insert(pkg.name.as_str()))
        .filter(|pkg| {
            installed
                .version_of(&pkg.name)
                .is_some_and(|version| version != pkg.version)
        })
        .cloned()
        .collect()
}

pub fn update_count(catalog: &Catalog, installed: &InstalledIndex) -> usize {
    compute_updates(catalog, installed).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_inequality_semantics() {
        let catalog = Catalog::new(vec![
            PackageDescriptor::new("Same", "1.0.0", "s.wpk"),
            PackageDescriptor::new("Patch", "1.0.1", "p.wpk"),
            PackageDescriptor::new("Older", "0.9", "o.wpk"),
            PackageDescriptor::new("Fresh", "3.0", "f.wpk"),
        ]);
        let installed: InstalledIndex =
            [("Same", "1.0.0"), ("Patch", "1.0.0"), ("Older", "1.0")].into_iter().collect();

        let updates = compute_updates(&catalog, &installed);
        let names: Vec<&str> = updates.iter().map(|p| p.name.as_str()).collect();
        // downgrades count too: no ordering is applied to versions
        assert_eq!(names, vec!["Patch", "Older"]);
        assert_eq!(update_count(&catalog, &installed), 2);
    }

    #[test]
    fn test_duplicate_names_reported_once() {
        let catalog = Catalog::new(vec![
            PackageDescriptor::new("A", "2.0", "a.wpk").with_repository("https://one/repo.json"),
            PackageDescriptor::new("A", "3.0", "a.wpk").with_repository("https://two/repo.json"),
        ]);
        let installed: InstalledIndex = [("A", "1.0")].into_iter().collect();
        let updates = compute_updates(&catalog, &installed);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].version, "2.0");
    }

    #[test]
    fn test_first_row_current_hides_later_duplicate() {
        let catalog = Catalog::new(vec![
            PackageDescriptor::new("A", "1.0", "a.wpk"),
            PackageDescriptor::new("A", "2.0", "a.wpk"),
        ]);
        let installed: InstalledIndex = [("A", "1.0")].into_iter().collect();
        assert!(compute_updates(&catalog, &installed).is_empty());
    }

    #[test]
    fn test_nothing_installed_means_no_updates() {
        let catalog = Catalog::new(vec![PackageDescriptor::new("A", "1.0", "a.wpk")]);
        assert_eq!(update_count(&catalog, &InstalledIndex::new()), 0);
    }
}

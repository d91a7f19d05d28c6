//! Page catalog and the role-filtered navigation built from it.

use serde::{Deserialize, Serialize};

use super::evaluator::AccessEvaluator;
use super::models::{Page, RoleId};

// ═══════════════════════════════════════════════════════════════════════════════
// Page Catalog
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered list of the application's pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCatalog {
    pages: Vec<Page>,
}

impl PageCatalog {
    /// Build a catalog. Later duplicates of a URL are dropped.
    pub fn new(pages: Vec<Page>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let pages = pages
            .into_iter()
            .filter(|p| seen.insert(p.url.clone()))
            .collect();
        Self { pages }
    }

    /// Pages of the stock business application.
    pub fn business_default() -> Self {
        Self::new(vec![
            Page::new("/dashboard", "Dashboard").in_category("General"),
            Page::new("/sales/orders", "Sales Orders").in_category("Sales"),
            Page::new("/sales/customers", "Customers").in_category("Sales"),
            Page::new("/production/work-orders", "Work Orders").in_category("Production"),
            Page::new("/production/planning", "Production Planning").in_category("Production"),
            Page::new("/accounting", "Accounting Overview").in_category("Accounting"),
            Page::new("/accounting/invoices", "Invoices").in_category("Accounting"),
            Page::new("/accounting/ledger", "General Ledger").in_category("Accounting"),
            Page::new("/inventory", "Inventory Overview").in_category("Inventory"),
            Page::new("/inventory/stock", "Stock Levels").in_category("Inventory"),
            Page::new("/settings/permissions", "Permissions").in_category("Settings"),
            Page::new("/settings/roles", "Roles").in_category("Settings"),
        ])
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn urls(&self) -> Vec<String> {
        self.pages.iter().map(|p| p.url.clone()).collect()
    }

    pub fn get(&self, url: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.url == url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    /// The page a location belongs to.
    ///
    /// Exact match first, then the longest catalog URL that is a whole-segment
    /// prefix of the location (`/inventory/stock/42` → `/inventory/stock`).
    /// Query strings and fragments are ignored.
    pub fn resolve(&self, location: &str) -> Option<&Page> {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or(location);
        let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };

        if let Some(page) = self.get(path) {
            return Some(page);
        }

        self.pages
            .iter()
            .filter(|p| {
                path.strip_prefix(p.url.as_str())
                    .map(|rest| rest.starts_with('/'))
                    .unwrap_or(false)
            })
            .max_by_key(|p| p.url.len())
    }

    /// Categories in order of first appearance.
    pub fn categories(&self) -> Vec<Option<&str>> {
        let mut out: Vec<Option<&str>> = Vec::new();
        for page in &self.pages {
            let category = page.category.as_deref();
            if !out.contains(&category) {
                out.push(category);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Navigation Filter
// ═══════════════════════════════════════════════════════════════════════════════

/// Accessible pages under one category heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationGroup {
    pub category: Option<String>,
    pub pages: Vec<Page>,
}

/// Narrows the catalog to what a role may view.
pub struct NavigationFilter<'a> {
    catalog: &'a PageCatalog,
    access: &'a dyn AccessEvaluator,
}

impl<'a> NavigationFilter<'a> {
    pub fn new(catalog: &'a PageCatalog, access: &'a dyn AccessEvaluator) -> Self {
        Self { catalog, access }
    }

    pub fn accessible_pages(&self, role_id: RoleId) -> Vec<Page> {
        self.catalog
            .pages()
            .iter()
            .filter(|p| self.access.can_view(role_id, &p.url))
            .cloned()
            .collect()
    }

    pub fn pages_by_category(&self, role_id: RoleId, category: &str) -> Vec<Page> {
        self.catalog
            .pages()
            .iter()
            .filter(|p| p.category.as_deref() == Some(category))
            .filter(|p| self.access.can_view(role_id, &p.url))
            .cloned()
            .collect()
    }

    pub fn category_has_any_access(&self, role_id: RoleId, category: &str) -> bool {
        self.catalog
            .pages()
            .iter()
            .filter(|p| p.category.as_deref() == Some(category))
            .any(|p| self.access.can_view(role_id, &p.url))
    }

    /// Menu groups for a role. Categories with nothing viewable are left out.
    pub fn navigation_groups(&self, role_id: RoleId) -> Vec<NavigationGroup> {
        let accessible = self.accessible_pages(role_id);
        self.catalog
            .categories()
            .into_iter()
            .filter_map(|category| {
                let pages: Vec<Page> = accessible
                    .iter()
                    .filter(|p| p.category.as_deref() == category)
                    .cloned()
                    .collect();
                (!pages.is_empty()).then(|| NavigationGroup {
                    category: category.map(str::to_string),
                    pages,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::evaluator::AccessControl;
    use crate::access::level::AccessLevel;
    use crate::access::models::RuleChange;
    use crate::access::roles::DefaultRole;

    fn setup() -> (PageCatalog, AccessControl) {
        let access = AccessControl::new();
        access.roles().replace_all(DefaultRole::all_roles());
        let sales = DefaultRole::Sales.id();
        access.matrix().apply(&[
            RuleChange::new("/dashboard", sales, AccessLevel::Read),
            RuleChange::new("/sales/orders", sales, AccessLevel::Create),
            RuleChange::new("/sales/customers", sales, AccessLevel::None),
            RuleChange::new("/inventory/stock", sales, AccessLevel::Read),
        ]);
        (PageCatalog::business_default(), access)
    }

    #[test]
    fn test_accessible_pages_only_viewable() {
        let (catalog, access) = setup();
        let nav = NavigationFilter::new(&catalog, &access);
        let sales = DefaultRole::Sales.id();

        let urls: Vec<String> = nav.accessible_pages(sales).into_iter().map(|p| p.url).collect();
        assert_eq!(urls, vec!["/dashboard", "/sales/orders", "/inventory/stock"]);
        for url in &urls {
            assert!(access.can_view(sales, url));
        }
    }

    #[test]
    fn test_pages_by_category_does_not_leak() {
        let (catalog, access) = setup();
        let nav = NavigationFilter::new(&catalog, &access);
        let sales = DefaultRole::Sales.id();

        let pages = nav.pages_by_category(sales, "Sales");
        assert_eq!(pages.len(), 1);
        assert!(pages.iter().all(|p| p.category.as_deref() == Some("Sales")));

        assert!(nav.category_has_any_access(sales, "Inventory"));
        assert!(!nav.category_has_any_access(sales, "Accounting"));
        assert!(!nav.category_has_any_access(sales, "Nonexistent"));
    }

    #[test]
    fn test_bypass_sees_everything() {
        let (catalog, access) = setup();
        let nav = NavigationFilter::new(&catalog, &access);
        assert_eq!(nav.accessible_pages(DefaultRole::Admin.id()).len(), catalog.len());
    }

    #[test]
    fn test_navigation_groups_skip_empty_categories() {
        let (catalog, access) = setup();
        let nav = NavigationFilter::new(&catalog, &access);

        let groups = nav.navigation_groups(DefaultRole::Sales.id());
        let names: Vec<Option<String>> = groups.iter().map(|g| g.category.clone()).collect();
        assert_eq!(
            names,
            vec![
                Some("General".to_string()),
                Some("Sales".to_string()),
                Some("Inventory".to_string()),
            ]
        );
    }

    #[test]
    fn test_resolve_location() {
        let catalog = PageCatalog::business_default();
        assert_eq!(catalog.resolve("/accounting").map(|p| p.url.as_str()), Some("/accounting"));
        assert_eq!(
            catalog.resolve("/accounting/invoices/2024-17?tab=lines").map(|p| p.url.as_str()),
            Some("/accounting/invoices")
        );
        assert_eq!(catalog.resolve("/inventory/").map(|p| p.url.as_str()), Some("/inventory"));
        assert!(catalog.resolve("/accountingx").is_none());
        assert!(catalog.resolve("/unknown").is_none());
    }

    #[test]
    fn test_catalog_drops_duplicate_urls() {
        let catalog = PageCatalog::new(vec![
            Page::new("/a", "First"),
            Page::new("/a", "Second"),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("/a").map(|p| p.name.as_str()), Some("First"));
    }
}

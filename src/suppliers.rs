use std::path::{Path, PathBuf};

use log::info;

use crate::error::{LedgerError, Result};
use crate::persist::write_atomic;
use crate::schema::Supplier;

/// Noise prefixes bank statements prepend to merchant names.
const NOISE_PREFIXES: &[&str] = &["sp ", "visa purchase ", "eftpos ", "paypal ", "sq "];

/// Corporate suffixes that carry no identity.
const NOISE_SUFFIXES: &[&str] = &["pty ltd", "ltd", "inc", "com", "au"];

/// Lowercases and replaces punctuation with spaces, collapsing runs.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_space = true;
    for c in name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_alphanumeric() {
            out.push(c);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim().to_string()
}

/// Normalized form with statement noise stripped from both ends.
pub fn strip_noise(name: &str) -> String {
    let mut current = normalize_name(name);
    loop {
        let mut changed = false;
        for prefix in NOISE_PREFIXES {
            if let Some(rest) = current.strip_prefix(prefix) {
                current = rest.trim_start().to_string();
                changed = true;
            }
        }
        for suffix in NOISE_SUFFIXES {
            if let Some(rest) = current.strip_suffix(suffix) {
                let rest = rest.trim_end();
                if !rest.is_empty() {
                    current = rest.to_string();
                    changed = true;
                }
            }
        }
        if !changed {
            return current;
        }
    }
}

/// Two names refer to the same supplier when they are equal, one contains
/// the other, or they are equal after noise stripping.
pub fn fuzzy_equal(a: &str, b: &str) -> bool {
    let na = normalize_name(a);
    let nb = normalize_name(b);
    if na == nb {
        return true;
    }
    if !na.is_empty() && !nb.is_empty() && (na.contains(&nb) || nb.contains(&na)) {
        return true;
    }
    let sa = strip_noise(a);
    let sb = strip_noise(b);
    if sa == sb {
        return true;
    }
    !sa.is_empty() && !sb.is_empty() && (sa.contains(&sb) || sb.contains(&sa))
}

/// Ranking score for candidate matching, 0.0..=1.0.
pub fn fuzzy_score(description: &str, supplier_name: &str) -> f64 {
    let nd = normalize_name(description);
    let ns = normalize_name(supplier_name);
    if nd.is_empty() || ns.is_empty() {
        return 0.0;
    }
    if nd == ns {
        return 1.0;
    }
    let sd = strip_noise(description);
    let ss = strip_noise(supplier_name);
    if sd == ss {
        return 0.95;
    }
    if nd.contains(&ns) || ns.contains(&nd) || sd.contains(&ss) || ss.contains(&sd) {
        let (short, long) = if ns.len() < nd.len() { (&ns, &nd) } else { (&nd, &ns) };
        return 0.6 + 0.3 * (short.len() as f64 / long.len() as f64);
    }
    // Token overlap as the weakest signal.
    let dt: Vec<&str> = sd.split_whitespace().collect();
    let st: Vec<&str> = ss.split_whitespace().collect();
    if dt.is_empty() || st.is_empty() {
        return 0.0;
    }
    let shared = st.iter().filter(|t| dt.contains(t)).count();
    let total = st.len().max(dt.len());
    0.5 * shared as f64 / total as f64
}

/// Sort orders accepted by `list_suppliers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupplierSort {
    #[default]
    Name,
    Account,
}

/// Fuzzy-matched supplier store persisted as a canonical JSON array sorted
/// by name, so equal logical content is byte-identical on disk.
#[derive(Debug, Default)]
pub struct SupplierRegistry {
    suppliers: Vec<Supplier>,
    path: Option<PathBuf>,
}

impl SupplierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut registry = Self {
            suppliers: Vec::new(),
            path: Some(path.to_path_buf()),
        };
        if !path.exists() {
            return Ok(registry);
        }
        let raw = std::fs::read_to_string(path)?;
        registry.suppliers = serde_json::from_str(&raw)?;
        registry.sort_canonical();
        info!("loaded {} suppliers from {}", registry.suppliers.len(), path.display());
        Ok(registry)
    }

    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone().ok_or_else(|| {
            LedgerError::Validation("supplier registry has no backing file".to_string())
        })?;
        self.sort_canonical();
        write_atomic(&path, &self.to_canonical_json()?)
    }

    /// Canonical serialized form: sorted by name, 2-space indentation,
    /// trailing newline.
    pub fn to_canonical_json(&self) -> Result<String> {
        let mut sorted = self.suppliers.clone();
        sort_suppliers(&mut sorted);
        let mut json = serde_json::to_string_pretty(&sorted)?;
        json.push('\n');
        Ok(json)
    }

    fn sort_canonical(&mut self) {
        sort_suppliers(&mut self.suppliers);
    }

    /// Creates a supplier. A fuzzy match against any existing name is a
    /// conflict; the caller is pointed at `update_supplier` instead.
    pub fn create(
        &mut self,
        name: &str,
        supplies: &str,
        account: Option<String>,
    ) -> Result<&Supplier> {
        if name.trim().is_empty() {
            return Err(LedgerError::Validation("supplier name must not be empty".to_string()));
        }
        if let Some(existing) = self.find_fuzzy(name) {
            return Err(LedgerError::Conflict(format!(
                "supplier '{}' already matches '{}'; use update_supplier to modify it",
                name, existing.name
            )));
        }
        self.suppliers.push(Supplier {
            name: name.trim().to_string(),
            supplies: supplies.to_string(),
            account,
        });
        self.sort_canonical();
        Ok(self.find_fuzzy(name).expect("just inserted"))
    }

    /// Looks a supplier up by name. With `exact` the query must equal the
    /// stored name case-insensitively; otherwise fuzzy matching applies.
    pub fn read(&self, query: &str, exact: bool) -> Result<&Supplier> {
        let found = if exact {
            self.suppliers
                .iter()
                .find(|s| s.name.eq_ignore_ascii_case(query.trim()))
        } else {
            self.find_fuzzy(query)
        };
        found.ok_or_else(|| LedgerError::NotFound(format!("supplier '{}' not found", query)))
    }

    pub fn update(
        &mut self,
        name: &str,
        supplies: Option<String>,
        account: Option<Option<String>>,
    ) -> Result<&Supplier> {
        let position = self
            .suppliers
            .iter()
            .position(|s| fuzzy_equal(&s.name, name))
            .ok_or_else(|| LedgerError::NotFound(format!("supplier '{}' not found", name)))?;
        {
            let supplier = &mut self.suppliers[position];
            if let Some(supplies) = supplies {
                supplier.supplies = supplies;
            }
            if let Some(account) = account {
                supplier.account = account;
            }
        }
        let canonical = self.suppliers[position].name.clone();
        self.sort_canonical();
        Ok(self
            .suppliers
            .iter()
            .find(|s| s.name == canonical)
            .expect("updated supplier present"))
    }

    /// Deletes by name. Destructive, so the caller must confirm.
    pub fn delete(&mut self, name: &str, confirm: bool) -> Result<Supplier> {
        if !confirm {
            return Err(LedgerError::Validation(format!(
                "deleting supplier '{}' requires confirm: true",
                name
            )));
        }
        let position = self
            .suppliers
            .iter()
            .position(|s| fuzzy_equal(&s.name, name))
            .ok_or_else(|| LedgerError::NotFound(format!("supplier '{}' not found", name)))?;
        Ok(self.suppliers.remove(position))
    }

    pub fn list(&self, filter: Option<&str>, sort: SupplierSort, limit: Option<usize>) -> Vec<&Supplier> {
        let mut out: Vec<&Supplier> = self
            .suppliers
            .iter()
            .filter(|s| match filter {
                Some(f) => {
                    let f = f.to_lowercase();
                    s.name.to_lowercase().contains(&f) || s.supplies.to_lowercase().contains(&f)
                }
                None => true,
            })
            .collect();
        match sort {
            SupplierSort::Name => {}
            SupplierSort::Account => out.sort_by(|a, b| a.account.cmp(&b.account)),
        }
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        out
    }

    pub fn all(&self) -> &[Supplier] {
        &self.suppliers
    }

    pub fn find_fuzzy(&self, name: &str) -> Option<&Supplier> {
        self.suppliers.iter().find(|s| fuzzy_equal(&s.name, name))
    }

    /// Best candidates for a raw statement description, ranked by score.
    pub fn match_candidates(&self, description: &str, max_candidates: usize) -> Vec<(f64, &Supplier)> {
        let mut scored: Vec<(f64, &Supplier)> = self
            .suppliers
            .iter()
            .map(|s| (fuzzy_score(description, &s.name), s))
            .filter(|(score, _)| *score > 0.2)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max_candidates);
        scored
    }
}

fn sort_suppliers(suppliers: &mut [Supplier]) {
    suppliers.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_strips_noise() {
        assert_eq!(normalize_name("Visa Purchase 04Feb Github.Com"), "visa purchase 04feb github com");
        assert_eq!(strip_noise("Sp Linkt"), "linkt");
        assert_eq!(strip_noise("GitHub Pty Ltd"), "github");
        assert_eq!(strip_noise("Github.Com"), "github");
    }

    #[test]
    fn test_fuzzy_equal_variants() {
        assert!(fuzzy_equal("Linkt Brisbane", "Sp Linkt Brisbane"));
        assert!(fuzzy_equal("GitHub", "Github.Com"));
        assert!(fuzzy_equal("Linkt Brisbane", "Linkt"));
        assert!(!fuzzy_equal("Linkt", "Coles"));
    }

    #[test]
    fn test_create_duplicate_is_conflict() {
        let mut registry = SupplierRegistry::new();
        registry.create("Linkt Brisbane", "tolls", None).unwrap();
        let err = registry.create("Sp Linkt", "tolls", None).unwrap_err();
        match err {
            LedgerError::Conflict(message) => assert!(message.contains("update_supplier")),
            other => panic!("expected Conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let mut registry = SupplierRegistry::new();
        registry.create("Linkt Brisbane", "tolls", None).unwrap();
        assert!(matches!(
            registry.delete("Linkt Brisbane", false),
            Err(LedgerError::Validation(_))
        ));
        registry.delete("Linkt Brisbane", true).unwrap();
        assert!(registry.all().is_empty());
    }

    #[test]
    fn test_match_candidates_ranks_github_first() {
        let mut registry = SupplierRegistry::new();
        registry.create("GitHub", "code hosting", Some("310".to_string())).unwrap();
        registry.create("Coles", "groceries", None).unwrap();
        let candidates = registry.match_candidates("Visa Purchase 04Feb Github.Com", 3);
        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].1.name, "GitHub");
    }

    #[test]
    fn test_canonical_json_is_byte_stable() {
        let mut a = SupplierRegistry::new();
        a.create("Zebra", "stripes", None).unwrap();
        a.create("Apple", "fruit", Some("200".to_string())).unwrap();

        let mut b = SupplierRegistry::new();
        b.create("Apple", "fruit", Some("200".to_string())).unwrap();
        b.create("Zebra", "stripes", None).unwrap();

        assert_eq!(a.to_canonical_json().unwrap(), b.to_canonical_json().unwrap());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supplier_list.json");
        let mut registry = SupplierRegistry::load(&path).unwrap();
        registry.create("GitHub", "code hosting", None).unwrap();
        registry.save().unwrap();

        let reloaded = SupplierRegistry::load(&path).unwrap();
        assert_eq!(reloaded.all(), registry.all());
    }
}

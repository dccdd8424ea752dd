// 💱 Commodity - Currencies and securities as values
//
// A commodity is identified by namespace + mnemonic. Two commodities are the
// same when those match, regardless of where the values came from, so
// accounts can hold their own copies and still compare equal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Namespace for ISO 4217 currencies
pub const NAMESPACE_ISO: &str = "ISO4217";

/// Namespace used for securities created without an explicit exchange
pub const NAMESPACE_SECURITY: &str = "SECURITY";

// ============================================================================
// COMMODITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commodity {
    /// e.g. "ISO4217", "NASDAQ"
    pub namespace: String,

    /// e.g. "USD", "AAPL"
    pub mnemonic: String,

    /// Human readable name, e.g. "US Dollar"
    pub fullname: String,
}

impl Commodity {
    pub fn new(namespace: &str, mnemonic: &str, fullname: &str) -> Self {
        Commodity {
            namespace: namespace.to_string(),
            mnemonic: mnemonic.to_string(),
            fullname: fullname.to_string(),
        }
    }

    /// ISO currency shorthand
    pub fn currency(mnemonic: &str, fullname: &str) -> Self {
        Self::new(NAMESPACE_ISO, mnemonic, fullname)
    }

    pub fn is_currency(&self) -> bool {
        self.namespace == NAMESPACE_ISO
    }

    /// Equivalence: same namespace and mnemonic. The full name is display
    /// data and does not take part.
    pub fn equiv(&self, other: &Commodity) -> bool {
        self.namespace == other.namespace && self.mnemonic == other.mnemonic
    }

    /// Display name, e.g. "USD (US Dollar)"
    pub fn printname(&self) -> String {
        if self.fullname.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} ({})", self.mnemonic, self.fullname)
        }
    }

    /// Unique key used for storage and table lookups
    pub fn unique_name(&self) -> String {
        format!("{}::{}", self.namespace, self.mnemonic)
    }
}

impl PartialEq for Commodity {
    fn eq(&self, other: &Self) -> bool {
        self.equiv(other)
    }
}

impl Eq for Commodity {}

/// Equivalence over optional commodities.
///
/// Two unset commodities are equivalent; an unset one never matches a set one.
pub fn commodity_equiv(a: Option<&Commodity>, b: Option<&Commodity>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.equiv(b),
        _ => false,
    }
}

/// Print name of an optional commodity, empty when unset
pub fn optional_printname(commodity: Option<&Commodity>) -> String {
    commodity.map(|c| c.printname()).unwrap_or_default()
}

// ============================================================================
// COMMODITY TABLE
// ============================================================================

/// Known commodities, keyed by namespace then mnemonic
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommodityTable {
    namespaces: BTreeMap<String, BTreeMap<String, Commodity>>,
}

impl CommodityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-loaded with the common ISO currencies
    pub fn with_iso_currencies() -> Self {
        let mut table = Self::new();
        for (mnemonic, fullname) in [
            ("USD", "US Dollar"),
            ("EUR", "Euro"),
            ("GBP", "British Pound"),
            ("JPY", "Japanese Yen"),
            ("CAD", "Canadian Dollar"),
            ("AUD", "Australian Dollar"),
            ("CHF", "Swiss Franc"),
            ("MXN", "Mexican Peso"),
            ("SEK", "Swedish Krona"),
            ("NZD", "New Zealand Dollar"),
        ] {
            table.insert(Commodity::currency(mnemonic, fullname));
        }
        table
    }

    /// Insert or replace. Returns the stored value.
    pub fn insert(&mut self, commodity: Commodity) -> Commodity {
        let stored = commodity.clone();
        self.namespaces
            .entry(commodity.namespace.clone())
            .or_default()
            .insert(commodity.mnemonic.clone(), commodity);
        stored
    }

    pub fn lookup(&self, namespace: &str, mnemonic: &str) -> Option<&Commodity> {
        self.namespaces.get(namespace)?.get(mnemonic)
    }

    /// Lookup by mnemonic only, ISO namespace first
    pub fn find_mnemonic(&self, mnemonic: &str) -> Option<&Commodity> {
        if let Some(c) = self.lookup(NAMESPACE_ISO, mnemonic) {
            return Some(c);
        }
        self.namespaces.values().find_map(|ns| ns.get(mnemonic))
    }

    /// Lookup by "NAMESPACE::MNEMONIC" or a bare mnemonic
    pub fn find(&self, name: &str) -> Option<&Commodity> {
        match name.split_once("::") {
            Some((namespace, mnemonic)) => self.lookup(namespace, mnemonic),
            None => self.find_mnemonic(name),
        }
    }

    /// Resolve a security given as `[NAMESPACE::]MNEMONIC[=Full Name]`,
    /// registering it when the table does not know it yet. Without a
    /// namespace the security lands in `NAMESPACE_SECURITY`. ISO currencies
    /// are never invented this way.
    pub fn find_or_register_security(&mut self, spec: &str) -> Option<Commodity> {
        let (name, fullname) = match spec.split_once('=') {
            Some((name, full)) => (name.trim(), Some(full.trim())),
            None => (spec.trim(), None),
        };
        if name.is_empty() {
            return None;
        }
        if let Some(existing) = self.find(name) {
            return Some(existing.clone());
        }

        let (namespace, mnemonic) = match name.split_once("::") {
            Some((ns, m)) => (ns.trim(), m.trim()),
            None => (NAMESPACE_SECURITY, name),
        };
        if namespace.is_empty() || mnemonic.is_empty() || namespace == NAMESPACE_ISO {
            return None;
        }

        let fullname = fullname.filter(|f| !f.is_empty()).unwrap_or(mnemonic);
        tracing::debug!(namespace, mnemonic, "registered security");
        Some(self.insert(Commodity::new(namespace, mnemonic, fullname)))
    }

    pub fn all(&self) -> Vec<&Commodity> {
        self.namespaces.values().flat_map(|ns| ns.values()).collect()
    }

    pub fn len(&self) -> usize {
        self.namespaces.values().map(|ns| ns.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalence_ignores_fullname() {
        let a = Commodity::currency("USD", "US Dollar");
        let b = Commodity::currency("USD", "Dollar");
        let c = Commodity::new("NASDAQ", "USD", "Not a currency");

        assert!(a.equiv(&b));
        assert_eq!(a, b);
        assert!(!a.equiv(&c));
    }

    #[test]
    fn test_optional_equivalence() {
        let usd = Commodity::currency("USD", "US Dollar");
        assert!(commodity_equiv(None, None));
        assert!(!commodity_equiv(Some(&usd), None));
        assert!(!commodity_equiv(None, Some(&usd)));
        assert!(commodity_equiv(Some(&usd), Some(&usd.clone())));
    }

    #[test]
    fn test_printname() {
        assert_eq!(Commodity::currency("EUR", "Euro").printname(), "EUR (Euro)");
        assert_eq!(Commodity::new("NYSE", "IBM", "").printname(), "IBM");
        assert_eq!(optional_printname(None), "");
    }

    #[test]
    fn test_table_lookup() {
        let mut table = CommodityTable::with_iso_currencies();
        table.insert(Commodity::new("NASDAQ", "AAPL", "Apple Inc."));

        assert_eq!(table.find("USD").unwrap().fullname, "US Dollar");
        assert_eq!(table.find("NASDAQ::AAPL").unwrap().mnemonic, "AAPL");
        assert_eq!(table.find("AAPL").unwrap().namespace, "NASDAQ");
        assert!(table.find("XXX").is_none());
        assert!(table.lookup(NAMESPACE_ISO, "AAPL").is_none());
    }

    #[test]
    fn test_register_security() {
        let mut table = CommodityTable::with_iso_currencies();

        let aapl = table.find_or_register_security("NASDAQ::AAPL=Apple Inc.").unwrap();
        assert_eq!(aapl.namespace, "NASDAQ");
        assert_eq!(aapl.fullname, "Apple Inc.");
        assert_eq!(table.find("AAPL").unwrap().namespace, "NASDAQ");

        // Known names resolve without re-registering
        let again = table.find_or_register_security("AAPL").unwrap();
        assert_eq!(again.fullname, "Apple Inc.");

        let vtsax = table.find_or_register_security("VTSAX").unwrap();
        assert_eq!(vtsax.namespace, NAMESPACE_SECURITY);
        assert_eq!(vtsax.fullname, "VTSAX");

        assert!(table.find_or_register_security("ISO4217::ZZZ").is_none());
        assert!(table.find_or_register_security("  ").is_none());
        assert!(table.lookup(NAMESPACE_ISO, "ZZZ").is_none());
    }
}

//! The application's logical document sections.
//!
//! The document store accepts any key; these five are the ones the client
//! application reads and writes, each with a known empty shape used to seed
//! new accounts and to fill gaps in a restored backup.

use serde_json::{Value, json};

use crate::document::Documents;

/// One of the well-known top-level documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Ledger of operations plus running balance (`DB`).
    Ledger,
    /// Reference data: income/expense categories, services, types (`REF`).
    Reference,
    /// Counterparty → category map (`cpMap`).
    CategoryMap,
    /// Auto-categorisation rules (`rules`).
    Rules,
    /// Financial position: assets, liabilities, balances (`FP`).
    FinancialPosition,
}

impl Section {
    /// Every section, in seeding order.
    pub const ALL: [Self; 5] = [
        Self::Ledger,
        Self::Reference,
        Self::CategoryMap,
        Self::Rules,
        Self::FinancialPosition,
    ];

    /// The document key this section is stored under.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Ledger => "DB",
            Self::Reference => "REF",
            Self::CategoryMap => "cpMap",
            Self::Rules => "rules",
            Self::FinancialPosition => "FP",
        }
    }

    /// Whether a backup must contain this section to be restorable.
    #[must_use]
    pub const fn is_mandatory(self) -> bool {
        matches!(self, Self::Ledger | Self::Reference)
    }

    /// The empty shape of this section.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::Ledger => json!({ "ops": [], "bal": 0 }),
            Self::Reference => json!({ "incCats": [], "svcs": [], "expCats": [], "expTypes": [] }),
            Self::CategoryMap => json!({}),
            Self::Rules => json!([]),
            Self::FinancialPosition => json!({
                "assets": [],
                "liabilities": [],
                "openBal": [],
                "clientObl": [],
                "accounts": [],
            }),
        }
    }
}

/// The document set every new account starts with.
#[must_use]
pub fn default_documents() -> Documents {
    Section::ALL
        .into_iter()
        .map(|section| (section.key().to_owned(), section.default_value()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_has_one_entry_per_section() {
        let docs = default_documents();
        assert_eq!(docs.len(), Section::ALL.len());
        assert_eq!(docs["cpMap"], json!({}));
        assert_eq!(docs["rules"], json!([]));
        assert_eq!(docs["DB"]["ops"], json!([]));
    }

    #[test]
    fn financial_position_has_five_empty_lists() {
        let fp = Section::FinancialPosition.default_value();
        let lists = fp.as_object().unwrap();
        assert_eq!(lists.len(), 5);
        assert!(lists.values().all(|v| v.as_array().is_some_and(Vec::is_empty)));
    }

    #[test]
    fn only_ledger_and_reference_are_mandatory() {
        let mandatory: Vec<&str> = Section::ALL
            .into_iter()
            .filter(|s| s.is_mandatory())
            .map(Section::key)
            .collect();
        assert_eq!(mandatory, ["DB", "REF"]);
    }
}

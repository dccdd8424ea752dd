// 📥 CSV Import - Bank exports into a Book
//
// Columns: Date, Num, Description, Account, Amount, Currency[, Memo]
// Every row becomes a two-split transaction. The second split balances the
// first against "Imbalance-<CUR>" so the book stays balanced until the user
// assigns the other side.

use crate::amount::parse_amount;
use crate::book::Book;
use crate::entities::{Account, AccountId, AccountType, Commodity};
use crate::error::LedgerError;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y"];

/// One row of an import file
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRow {
    #[serde(rename = "Date")]
    pub date: String,

    #[serde(rename = "Num", default)]
    pub num: String,

    #[serde(rename = "Description")]
    pub description: String,

    /// Separator-joined full account name
    #[serde(rename = "Account")]
    pub account: String,

    #[serde(rename = "Amount")]
    pub amount: String,

    #[serde(rename = "Currency", default)]
    pub currency: String,

    #[serde(rename = "Memo", default)]
    pub memo: String,
}

impl ImportRow {
    /// SHA-256 over the fields that identify a bank line
    pub fn idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}",
            self.date.trim(),
            self.num.trim(),
            self.description.trim(),
            self.amount.trim()
        ));
        format!("{:x}", hasher.finalize())
    }

    pub fn parsed_date(&self) -> Result<NaiveDate> {
        let text = self.date.trim();
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
            .with_context(|| format!("Unrecognized date: {:?}", self.date))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub imported: usize,
    pub duplicates: usize,
    pub accounts_created: usize,

    /// Hashes of the rows imported by this run
    pub new_hashes: Vec<String>,
}

pub fn load_rows(csv_path: &Path) -> Result<Vec<ImportRow>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file: {:?}", csv_path))?;
    read_rows(file)
}

pub fn read_rows<R: Read>(reader: R) -> Result<Vec<ImportRow>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut rows = Vec::new();
    for (index, result) in rdr.deserialize().enumerate() {
        // Line 1 is the header
        let row: ImportRow = result.with_context(|| format!("Failed to read CSV line {}", index + 2))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Find or create every component of `full_name`.
///
/// Created accounts are top-level-rooted Bank accounts in `currency`.
pub fn ensure_account_path(
    book: &mut Book,
    full_name: &str,
    separator: char,
    currency: &Commodity,
    created: &mut usize,
) -> Option<AccountId> {
    let mut parent: Option<AccountId> = None;
    for component in full_name.split(separator).map(str::trim) {
        if component.is_empty() {
            return None;
        }
        parent = match book.child_named(parent, component) {
            Some(existing) => Some(existing),
            None => {
                let account = Account::new(component, AccountType::Bank).with_currency(currency.clone());
                let id = book.insert_account(account, parent)?;
                tracing::debug!(account = %book.full_name(id, separator), "created account");
                *created += 1;
                Some(id)
            }
        };
    }
    parent
}

/// Add `rows` to `book`, skipping any whose hash is already in `known`.
///
/// Newly imported hashes are added to `known` and listed in the summary.
pub fn import_rows(
    book: &mut Book,
    rows: &[ImportRow],
    known: &mut HashSet<String>,
    separator: char,
    default_currency: &str,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for row in rows {
        let hash = row.idempotency_hash();
        if known.contains(&hash) {
            summary.duplicates += 1;
            continue;
        }

        let date = row.parsed_date()?;
        let amount = parse_amount(&row.amount)
            .with_context(|| format!("Bad amount in row {:?}", row.description))?;

        let mnemonic = if row.currency.trim().is_empty() {
            default_currency
        } else {
            row.currency.trim()
        };
        let currency = book
            .commodities()
            .find(mnemonic)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownCommodity(mnemonic.to_string()))?;

        let account = ensure_account_path(book, &row.account, separator, &currency, &mut summary.accounts_created)
            .ok_or_else(|| LedgerError::AccountNotFound(row.account.clone()))?;
        let imbalance_name = format!("Imbalance-{}", currency.mnemonic);
        let imbalance = ensure_account_path(book, &imbalance_name, separator, &currency, &mut summary.accounts_created)
            .ok_or(LedgerError::AccountNotFound(imbalance_name))?;

        let tx = book.new_transaction(date, &row.num, &row.description);
        book.add_split(tx, Some(account), amount, amount, &row.memo);
        book.add_split(tx, Some(imbalance), -amount, -amount, "");

        known.insert(hash.clone());
        summary.new_hashes.push(hash);
        summary.imported += 1;
    }

    tracing::info!(
        imported = summary.imported,
        duplicates = summary.duplicates,
        accounts_created = summary.accounts_created,
        "import finished"
    );
    Ok(summary)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Date,Num,Description,Account,Amount,Currency,Memo
2025-01-03,101,Payroll,Assets:Checking,\"2,500.00\",USD,January
01/05/2025,,Grocery Store,Assets:Checking,-84.12,USD,
2025-01-07,,Card payment,Liabilities:Visa,(120.00),,
";

    #[test]
    fn test_read_rows() {
        let rows = read_rows(SAMPLE.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].num, "101");
        assert_eq!(rows[0].memo, "January");
        assert_eq!(rows[1].parsed_date().unwrap(), NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
    }

    #[test]
    fn test_import_creates_accounts_and_balances() {
        let rows = read_rows(SAMPLE.as_bytes()).unwrap();
        let mut book = Book::new();
        let mut known = HashSet::new();

        let summary = import_rows(&mut book, &rows, &mut known, ':', "USD").unwrap();
        assert_eq!(summary.imported, 3);
        assert_eq!(summary.duplicates, 0);
        // Assets, Checking, Imbalance-USD, Liabilities, Visa
        assert_eq!(summary.accounts_created, 5);

        let checking = book.find_by_full_name("Assets:Checking", ':').unwrap();
        assert!((book.balance(checking) - 2415.88).abs() < 1e-9);

        let visa = book.find_by_full_name("Liabilities:Visa", ':').unwrap();
        assert_eq!(book.balance(visa), -120.0);

        let imbalance = book.find_by_full_name("Imbalance-USD", ':').unwrap();
        assert!((book.balance(imbalance) + 2295.88).abs() < 1e-9);
    }

    #[test]
    fn test_reimport_skips_duplicates() {
        let rows = read_rows(SAMPLE.as_bytes()).unwrap();
        let mut book = Book::new();
        let mut known = HashSet::new();

        import_rows(&mut book, &rows, &mut known, ':', "USD").unwrap();
        let again = import_rows(&mut book, &rows, &mut known, ':', "USD").unwrap();

        assert_eq!(again.imported, 0);
        assert_eq!(again.duplicates, 3);
        assert_eq!(book.transactions().count(), 3);
    }

    #[test]
    fn test_unknown_currency_is_an_error() {
        let csv = "Date,Num,Description,Account,Amount,Currency\n2025-01-01,,x,Cash,1.00,ZZZ\n";
        let rows = read_rows(csv.as_bytes()).unwrap();
        let mut book = Book::new();
        let err = import_rows(&mut book, &rows, &mut HashSet::new(), ':', "USD").unwrap_err();
        assert!(err.to_string().contains("ZZZ"));
    }

    #[test]
    fn test_existing_account_is_reused() {
        let mut book = Book::new();
        let usd = book.commodities().find("USD").cloned().unwrap();
        let cash = book
            .insert_account(Account::new("Cash", AccountType::Cash).with_currency(usd.clone()), None)
            .unwrap();

        let mut created = 0;
        let found = ensure_account_path(&mut book, "Cash", ':', &usd, &mut created);
        assert_eq!(found, Some(cash));
        assert_eq!(created, 0);
        assert_eq!(book.account(cash).unwrap().account_type, AccountType::Cash);
    }
}

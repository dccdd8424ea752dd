// End-to-end: import a statement, edit an account with propagation,
// reconcile, and reload everything from SQLite.

use chrono::NaiveDate;
use ledger_desk::db::{load_import_hashes, save_import_hashes};
use ledger_desk::propagation::ChangeRow;
use ledger_desk::reconcile::{FinishOutcome, ListKind};
use ledger_desk::{
    get_events_for_entity, import_rows, load_book, log_committed_accounts, open_database, save_book,
    AccountType, EditOutcome, LedgerConfig, ReconcileSession, UiSession,
};
use std::collections::HashSet;
use tempfile::TempDir;

const STATEMENT: &str = "\
Date,Num,Description,Account,Amount,Currency
2025-03-01,,Opening deposit,Assets:Checking,1000.00,USD
2025-03-02,,Move to savings,Assets:Savings,250.00,USD
2025-03-04,12,Rent,Assets:Checking,-700.00,USD
";

fn rows() -> Vec<ledger_desk::ImportRow> {
    ledger_desk::import::read_rows(STATEMENT.as_bytes()).unwrap()
}

#[test]
fn test_currency_edit_propagates_and_persists() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ledger.db");
    let mut conn = open_database(&db_path).unwrap();
    let config = LedgerConfig::default();

    let mut book = ledger_desk::Book::new();
    let mut known = HashSet::new();
    let summary = import_rows(&mut book, &rows(), &mut known, ':', "USD").unwrap();
    assert_eq!(summary.imported, 3);
    save_import_hashes(&conn, &summary.new_hashes).unwrap();
    save_book(&mut conn, &book).unwrap();
    book.clear_edit_log();

    let checking = book.find_by_full_name("Assets:Checking", ':').unwrap();
    let imbalance = book.find_by_full_name("Imbalance-USD", ':').unwrap();
    let eur = book.commodities().find("EUR").cloned().unwrap();

    let mut session = UiSession::new(config.clone());
    session.open_edit_window(&book, checking).unwrap().form.currency = Some(eur);

    let mut seen: Vec<ChangeRow> = Vec::new();
    let mut verifier = |rows: &[ChangeRow]| {
        seen.extend_from_slice(rows);
        true
    };
    let result = session.ok_edit_window(&mut book, checking, &mut verifier).unwrap();
    assert_eq!(result, Ok(EditOutcome::Committed(checking)));

    // Imbalance-USD shares transactions with Checking, Savings shares one
    // with Imbalance-USD: both follow the edit
    let names: Vec<&str> = seen.iter().map(|r| r.full_name.as_str()).collect();
    assert_eq!(names, vec!["Assets:Savings", "Imbalance-USD"]);
    assert_eq!(book.account(imbalance).unwrap().currency.as_ref().unwrap().mnemonic, "EUR");

    let savings = book.find_by_full_name("Assets:Savings", ':').unwrap();
    assert_eq!(book.account(savings).unwrap().currency.as_ref().unwrap().mnemonic, "EUR");

    // Assets has no splits and keeps its currency
    let assets = book.find_by_full_name("Assets", ':').unwrap();
    assert_eq!(book.account(assets).unwrap().currency.as_ref().unwrap().mnemonic, "USD");

    let logged = log_committed_accounts(&conn, &book, ':', "test").unwrap();
    assert_eq!(logged, 3);
    save_book(&mut conn, &book).unwrap();
    drop(conn);

    let conn = open_database(&db_path).unwrap();
    let reloaded = load_book(&conn).unwrap();
    let checking_again = reloaded.account(checking).unwrap();
    assert_eq!(checking_again.currency.as_ref().unwrap().mnemonic, "EUR");
    assert_eq!(load_import_hashes(&conn).unwrap().len(), 3);

    let events = get_events_for_entity(&conn, "account", &imbalance.to_string()).unwrap();
    assert_eq!(events.len(), 1);
}

#[test]
fn test_declined_edit_changes_nothing() {
    let mut book = ledger_desk::Book::new();
    import_rows(&mut book, &rows(), &mut HashSet::new(), ':', "USD").unwrap();
    book.clear_edit_log();

    let checking = book.find_by_full_name("Assets:Checking", ':').unwrap();
    let eur = book.commodities().find("EUR").cloned().unwrap();

    let mut session = UiSession::new(LedgerConfig::default());
    session.open_edit_window(&book, checking).unwrap().form.currency = Some(eur);

    let mut decline = |_: &[ChangeRow]| false;
    let result = session.ok_edit_window(&mut book, checking, &mut decline).unwrap();

    assert_eq!(result, Ok(EditOutcome::Declined));
    assert!(book.edit_log().is_empty());
    assert_eq!(session.edit_window_count(), 1);
    assert_eq!(book.account(checking).unwrap().currency.as_ref().unwrap().mnemonic, "USD");
}

#[test]
fn test_reconcile_then_reload() {
    let dir = TempDir::new().unwrap();
    let mut conn = open_database(dir.path().join("ledger.db")).unwrap();
    let config = LedgerConfig::default();

    let mut book = ledger_desk::Book::new();
    import_rows(&mut book, &rows(), &mut HashSet::new(), ':', "USD").unwrap();
    let checking = book.find_by_full_name("Assets:Checking", ':').unwrap();

    let date = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
    let mut session = ReconcileSession::open(&book, checking, 300.0, date, &config).unwrap();
    assert_eq!(session.list(ListKind::Debit).len(), 1);
    assert_eq!(session.list(ListKind::Credit).len(), 1);

    let deposit = session.list(ListKind::Debit).entries()[0].split;
    let rent = session.list(ListKind::Credit).entries()[0].split;
    session.toggle(ListKind::Debit, deposit);
    session.toggle(ListKind::Credit, rent);
    assert!(session.recalculate(&book).balanced);

    let outcome = session.finish(&mut book, &config, &mut |_: &str| false);
    assert!(matches!(outcome, FinishOutcome::Finished { reconciled: 2, payment: None }));
    save_book(&mut conn, &book).unwrap();

    let reloaded = load_book(&conn).unwrap();
    assert_eq!(reloaded.reconciled_balance(checking), 300.0);
    assert_eq!(reloaded.account(checking).unwrap().account_type, AccountType::Bank);
}

#[test]
fn test_registered_security_reaches_related_accounts() {
    let mut book = ledger_desk::Book::new();
    let usd = book.commodities().find("USD").cloned().unwrap();
    // Different currencies keep the transaction from being single-commodity
    let eur = book.commodities().find("EUR").cloned().unwrap();
    let old = book
        .commodities_mut()
        .find_or_register_security("OLDX")
        .unwrap();

    let brokerage = book
        .insert_account(
            ledger_desk::Account::new("Brokerage", AccountType::Stock)
                .with_currency(usd.clone())
                .with_security(old.clone()),
            None,
        )
        .unwrap();
    let lot = book
        .insert_account(
            ledger_desk::Account::new("Lot 1", AccountType::Stock)
                .with_currency(eur)
                .with_security(old),
            None,
        )
        .unwrap();
    let date = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
    let tx = book.new_transaction(date, "", "Transfer shares");
    book.add_split(tx, Some(brokerage), 0.0, 10.0, "");
    book.add_split(tx, Some(lot), 0.0, -10.0, "");
    book.clear_edit_log();

    let aapl = book
        .commodities_mut()
        .find_or_register_security("NASDAQ::AAPL=Apple Inc.")
        .unwrap();
    assert!(book.commodities().find("NASDAQ::AAPL").is_some());

    let mut session = UiSession::new(LedgerConfig::default());
    session.open_edit_window(&book, brokerage).unwrap().form.security = Some(aapl);

    let mut seen: Vec<ChangeRow> = Vec::new();
    let mut verifier = |rows: &[ChangeRow]| {
        seen.extend_from_slice(rows);
        true
    };
    let result = session.ok_edit_window(&mut book, brokerage, &mut verifier).unwrap();
    assert_eq!(result, Ok(EditOutcome::Committed(brokerage)));

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].full_name, "Lot 1");
    assert_eq!(seen[0].new_value, "AAPL (Apple Inc.)");
    for id in [brokerage, lot] {
        let security = book.account(id).unwrap().security.clone().unwrap();
        assert_eq!(security.unique_name(), "NASDAQ::AAPL");
    }
}

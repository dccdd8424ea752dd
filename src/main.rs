// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use std::collections::HashSet;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use ledger_desk::db::{load_import_hashes, load_or_new, save_import_hashes};
use ledger_desk::propagation::ChangeRow;
use ledger_desk::reconcile::{FinishOutcome, ReconcileSession, StatementDialog};
use ledger_desk::{
    import_rows, load_rows, log_committed_accounts, open_database, save_book, AccountId,
    AccountType, Book, EditOutcome, LedgerConfig, UiSession, ValidationError,
};

const CONFIG_ENV: &str = "LEDGER_DESK_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "ledger-desk.json";
const ACTOR: &str = "cli";

fn main() -> Result<()> {
    let config_path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = LedgerConfig::load_or_default(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("accounts");
    let rest = Args::new(args.iter().skip(1).cloned().collect());

    let mut conn = open_database(&config.database_path)?;
    let mut book = load_or_new(&conn)?;
    book.clear_edit_log();

    match command {
        "import" => run_import(&mut conn, &mut book, &config, &rest),
        "accounts" => run_accounts(&book),
        "edit" => run_edit(&mut conn, &mut book, &config, &rest),
        "new" => run_new(&mut conn, &mut book, &config, &rest),
        "reconcile" => run_reconcile(&mut conn, &mut book, &config, &rest),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            bail!("Unknown command: {}", other)
        }
    }
}

fn print_usage() {
    println!("ledger-desk {}", ledger_desk::VERSION);
    println!();
    println!("Usage:");
    println!("  ledger-desk import <csv>");
    println!("  ledger-desk accounts");
    println!("  ledger-desk edit <full-name> [--name N] [--type T] [--currency C]");
    println!("                   [--security [NAMESPACE::]MNEMONIC[=Full Name]]");
    println!("                   [--parent P | --top-level] [--yes]");
    println!("  ledger-desk new <name> --type T [--parent P] [--currency C]");
    println!("  ledger-desk reconcile <full-name> [--ending X] [--date YYYY-MM-DD]");
}

// ============================================================================
// ARGUMENTS
// ============================================================================

struct Args {
    positional: Vec<String>,
    options: Vec<(String, Option<String>)>,
}

impl Args {
    const SWITCHES: [&'static str; 2] = ["--yes", "--top-level"];

    fn new(raw: Vec<String>) -> Self {
        let mut positional = Vec::new();
        let mut options = Vec::new();
        let mut iter = raw.into_iter();
        while let Some(arg) = iter.next() {
            if Self::SWITCHES.contains(&arg.as_str()) {
                options.push((arg, None));
            } else if arg.starts_with("--") {
                let value = iter.next();
                options.push((arg, value));
            } else {
                positional.push(arg);
            }
        }
        Args { positional, options }
    }

    fn positional(&self, index: usize, name: &str) -> Result<&str> {
        self.positional
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("Missing argument: <{}>", name))
    }

    fn value(&self, flag: &str) -> Result<Option<&str>> {
        match self.options.iter().find(|(f, _)| f == flag) {
            None => Ok(None),
            Some((_, Some(v))) => Ok(Some(v.as_str())),
            Some((_, None)) => bail!("Missing value for {}", flag),
        }
    }

    fn flag(&self, flag: &str) -> bool {
        self.options.iter().any(|(f, _)| f == flag)
    }
}

fn find_account(book: &Book, config: &LedgerConfig, full_name: &str) -> Result<AccountId> {
    book.find_by_full_name(full_name, config.account_separator)
        .ok_or_else(|| anyhow!("Account not found: {}", full_name))
}

fn commit(conn: &mut Connection, book: &mut Book, config: &LedgerConfig) -> Result<()> {
    let logged = log_committed_accounts(conn, book, config.account_separator, ACTOR)?;
    save_book(conn, book)?;
    book.clear_edit_log();
    tracing::debug!(logged, "book committed");
    Ok(())
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_import(conn: &mut Connection, book: &mut Book, config: &LedgerConfig, args: &Args) -> Result<()> {
    let csv_path = Path::new(args.positional(0, "csv")?);

    println!("📂 Loading CSV...");
    let rows = load_rows(csv_path)?;
    println!("✓ Loaded {} rows from {:?}", rows.len(), csv_path);

    let mut known: HashSet<String> = load_import_hashes(conn)?;
    let summary = import_rows(
        book,
        &rows,
        &mut known,
        config.account_separator,
        &config.default_currency,
    )?;

    commit(conn, book, config)?;
    save_import_hashes(conn, &summary.new_hashes)?;

    println!("✓ Imported {} transactions", summary.imported);
    println!("✓ Duplicates skipped: {}", summary.duplicates);
    println!("✓ Accounts created: {}", summary.accounts_created);
    Ok(())
}

fn run_accounts(book: &Book) -> Result<()> {
    if book.account_count() == 0 {
        println!("No accounts yet. Run: ledger-desk import <csv>");
        return Ok(());
    }

    let mut stack: Vec<(usize, AccountId)> = book.top_level_accounts().iter().rev().map(|id| (0, *id)).collect();
    while let Some((depth, id)) = stack.pop() {
        let account = match book.account(id) {
            Some(a) => a,
            None => continue,
        };
        let mnemonic = account.currency.as_ref().map(|c| c.mnemonic.as_str()).unwrap_or("");
        let balance = if account.account_type.is_share_based() {
            book.share_balance(id)
        } else {
            book.balance(id)
        };
        let flags = ledger_desk::PrintFlags::for_shares(account.account_type.is_share_based());
        println!(
            "{:indent$}{:<30} {:<12} {:>18}",
            "",
            account.name,
            account.account_type.as_str(),
            ledger_desk::format_amount(balance, flags, mnemonic),
            indent = depth * 2
        );
        for child in account.children().iter().rev() {
            stack.push((depth + 1, *child));
        }
    }
    Ok(())
}

fn print_change_table(rows: &[ChangeRow]) {
    let width = rows.iter().map(|r| r.full_name.len()).max().unwrap_or(7).max(7);
    println!("The following accounts will also be changed:");
    println!("  {:<width$}  {:<8}  {:<24}  {}", "Account", "Field", "Old Value", "New Value", width = width);
    for row in rows {
        println!(
            "  {:<width$}  {:<8}  {:<24}  {}",
            row.full_name,
            row.field.label(),
            row.old_value,
            row.new_value,
            width = width
        );
    }
}

fn ask_yes_no(question: &str) -> bool {
    print!("{} [y/N] ", question);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes"),
        Err(_) => false,
    }
}

fn report(result: Option<Result<EditOutcome, ValidationError>>) -> Result<bool> {
    match result {
        Some(Ok(EditOutcome::Committed(_))) => Ok(true),
        Some(Ok(EditOutcome::Declined)) => {
            println!("Nothing changed.");
            Ok(false)
        }
        Some(Err(err)) => bail!("{}", err),
        None => bail!("The account window is no longer open"),
    }
}

fn run_edit(conn: &mut Connection, book: &mut Book, config: &LedgerConfig, args: &Args) -> Result<()> {
    let account = find_account(book, config, args.positional(0, "full-name")?)?;
    let mut session = UiSession::new(config.clone());

    let parent = if args.flag("--top-level") {
        Some(None)
    } else {
        match args.value("--parent")? {
            Some(name) => Some(Some(find_account(book, config, name)?)),
            None => None,
        }
    };
    let currency = args
        .value("--currency")?
        .map(|c| book.commodities().find(c).cloned().ok_or_else(|| anyhow!("Unknown currency: {}", c)))
        .transpose()?;
    let security = args
        .value("--security")?
        .map(|s| {
            book.commodities_mut()
                .find_or_register_security(s)
                .ok_or_else(|| anyhow!("Invalid security: {}", s))
        })
        .transpose()?;

    {
        let editor = session
            .open_edit_window(book, account)
            .context("Failed to open the edit window")?;
        if let Some(name) = args.value("--name")? {
            editor.form.name = name.to_string();
        }
        if let Some(parent) = parent {
            editor.form.parent = parent;
        }
        if currency.is_some() {
            editor.form.currency = currency;
        }
        if security.is_some() {
            editor.form.security = security;
        }
    }
    if let Some(kind) = args.value("--type")? {
        let kind: AccountType = kind.parse()?;
        if !session.select_type(account, kind) {
            bail!("Account type {} is not available here", kind);
        }
    }

    let assume_yes = args.flag("--yes");
    let mut verifier = |rows: &[ChangeRow]| {
        print_change_table(rows);
        assume_yes || ask_yes_no("Apply these changes?")
    };

    if report(session.ok_edit_window(book, account, &mut verifier))? {
        commit(conn, book, config)?;
        println!("✓ Saved {}", book.full_name(account, config.account_separator));
    }
    Ok(())
}

fn run_new(conn: &mut Connection, book: &mut Book, config: &LedgerConfig, args: &Args) -> Result<()> {
    let name = args.positional(0, "name")?;
    let kind: AccountType = args
        .value("--type")?
        .ok_or_else(|| anyhow!("Missing --type"))?
        .parse()?;
    let parent = args
        .value("--parent")?
        .map(|p| find_account(book, config, p))
        .transpose()?;

    let mut session = UiSession::new(config.clone());
    let pending = session.open_new_account_window(book, parent);
    {
        let editor = session
            .find_new_account_window(pending)
            .context("Failed to open the new account window")?;
        editor.form.name = name.to_string();
        if let Some(code) = args.value("--currency")? {
            editor.form.currency = Some(
                book.commodities()
                    .find(code)
                    .cloned()
                    .ok_or_else(|| anyhow!("Unknown currency: {}", code))?,
            );
        }
    }
    if !session.select_type(pending, kind) {
        bail!("Account type {} cannot be placed under that parent", kind);
    }

    let mut verifier = |_: &[ChangeRow]| true;
    if report(session.ok_new_account_window(book, pending, &mut verifier))? {
        commit(conn, book, config)?;
        println!("✓ Created {}", book.full_name(pending, config.account_separator));
    }
    Ok(())
}

fn run_reconcile(conn: &mut Connection, book: &mut Book, config: &LedgerConfig, args: &Args) -> Result<()> {
    let account = find_account(book, config, args.positional(0, "full-name")?)?;
    let today = Local::now().date_naive();

    let (ending, date) = statement_from_args(
        book,
        config,
        account,
        args.value("--ending")?,
        args.value("--date")?,
        today,
    )?;

    let session = ReconcileSession::open(book, account, ending, date, config)
        .context("Failed to open the reconcile window")?;

    let (outcome, modified) = run_reconcile_window(book, config, session)?;
    if modified {
        commit(conn, book, config)?;
    }

    if let Some(FinishOutcome::Finished { reconciled, payment }) = outcome {
        println!("✓ Reconciled {} splits", reconciled);
        if let Some(payment) = payment {
            let from = payment
                .from_account
                .map(|a| book.full_name(a, config.account_separator))
                .unwrap_or_else(|| "(choose an account)".to_string());
            println!(
                "Record a payment of {:.2} to {} from {}",
                payment.amount,
                book.full_name(payment.to_account, config.account_separator),
                from
            );
        }
    }
    Ok(())
}

/// Ending balance and date for a new reconcile window. `ending` is typed
/// the way the statement dialog shows it, so reverse-balance accounts get
/// their sign flipped back into book convention.
fn statement_from_args(
    book: &Book,
    config: &LedgerConfig,
    account: AccountId,
    ending: Option<&str>,
    date: Option<&str>,
    today: NaiveDate,
) -> Result<(f64, NaiveDate)> {
    let (default_ending, default_date) = UiSession::new(config.clone()).statement_defaults(book, account, today);
    let mut dialog = StatementDialog::new(book, account, default_ending, default_date, config)
        .context("Failed to open the statement dialog")?;

    if let Some(text) = ending {
        dialog.set_ending_entry(text);
    }
    if let Some(text) = date {
        dialog.date =
            NaiveDate::parse_from_str(text, "%Y-%m-%d").with_context(|| format!("Invalid date: {}", text))?;
    }

    Ok(dialog.accept()?)
}

#[cfg(feature = "tui")]
fn run_reconcile_window(
    book: &mut Book,
    config: &LedgerConfig,
    session: ReconcileSession,
) -> Result<(Option<FinishOutcome>, bool)> {
    let (exit, modified) = ui::run_reconcile_window(book, config, session)?;
    let outcome = match exit {
        ui::WindowExit::Finished(outcome) => Some(outcome),
        ui::WindowExit::Cancelled => None,
    };
    Ok((outcome, modified))
}

#[cfg(not(feature = "tui"))]
fn run_reconcile_window(
    book: &mut Book,
    _config: &LedgerConfig,
    session: ReconcileSession,
) -> Result<(Option<FinishOutcome>, bool)> {
    let [starting, ending, debit, credit, reconciled, difference] = session.summary_labels(book);
    println!("{}", session.title());
    println!("  Starting balance: {}", starting);
    println!("  Ending balance:   {}", ending);
    println!("  Total debits:     {}", debit);
    println!("  Total credits:    {}", credit);
    println!("  Reconciled:       {}", reconciled);
    println!("  Difference:       {}", difference);
    eprintln!("Interactive reconciling requires the \"tui\" feature.");
    Ok((None, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_desk::Account;

    fn credit_card_owing_30() -> (Book, AccountId) {
        let mut book = Book::new();
        let usd = book.commodities().find("USD").cloned().unwrap();
        let card = book
            .insert_account(Account::new("Visa", AccountType::Credit).with_currency(usd.clone()), None)
            .unwrap();
        let food = book
            .insert_account(Account::new("Food", AccountType::Expense).with_currency(usd), None)
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();
        let tx = book.new_transaction(date, "", "Groceries");
        book.add_split(tx, Some(card), -30.0, -30.0, "");
        book.add_split(tx, Some(food), 30.0, 30.0, "");
        (book, card)
    }

    #[test]
    fn test_statement_args_use_display_sign() {
        let (book, card) = credit_card_owing_30();
        let config = LedgerConfig::default();
        let today = NaiveDate::from_ymd_opt(2025, 4, 30).unwrap();

        let (ending, date) =
            statement_from_args(&book, &config, card, Some("30"), Some("2025-04-15"), today).unwrap();
        assert_eq!(ending, -30.0);
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 4, 15).unwrap());

        let (default_ending, default_date) = statement_from_args(&book, &config, card, None, None, today).unwrap();
        assert_eq!(default_ending, -30.0);
        assert_eq!(default_date, today);
    }

    #[test]
    fn test_credit_card_statement_suggests_payment() {
        let (mut book, card) = credit_card_owing_30();
        let config = LedgerConfig::default();
        let today = NaiveDate::from_ymd_opt(2025, 4, 30).unwrap();

        let (ending, date) = statement_from_args(&book, &config, card, Some("30.00"), None, today).unwrap();
        let mut session = ReconcileSession::open(&book, card, ending, date, &config).unwrap();
        let charge = session.list(ledger_desk::reconcile::ListKind::Credit).entries()[0].split;
        session.toggle(ledger_desk::reconcile::ListKind::Credit, charge);
        assert!(session.recalculate(&book).balanced);

        match session.finish(&mut book, &config, &mut |_: &str| false) {
            FinishOutcome::Finished { payment: Some(payment), .. } => {
                assert_eq!(payment.to_account, card);
                assert_eq!(payment.amount, 30.0);
            }
            other => panic!("expected a payment suggestion, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_statement_date_is_an_error() {
        let (book, card) = credit_card_owing_30();
        let today = NaiveDate::from_ymd_opt(2025, 4, 30).unwrap();
        let err = statement_from_args(&book, &LedgerConfig::default(), card, None, Some("04/15/2025"), today)
            .unwrap_err();
        assert!(err.to_string().contains("Invalid date"));
    }
}

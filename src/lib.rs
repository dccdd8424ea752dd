// Ledger Desk - Core Library
// Exposes all modules for use in the CLI, the terminal UI, and tests

pub mod account_editor;
pub mod amount;
pub mod book;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod import;
pub mod propagation;
pub mod reconcile;
pub mod session;

// Re-export commonly used types
pub use account_editor::{
    account_to_form, form_to_account, AccountEditor, AccountForm, EditOutcome, EditorMode,
};
pub use amount::{format_amount, parse_amount, PrintFlags};
pub use book::{Book, EditEvent, EditTarget};
pub use config::LedgerConfig;
pub use db::{
    get_events_for_entity, insert_event, load_book, log_committed_accounts, open_database,
    save_book, setup_database, Event,
};
pub use entities::{
    Account, AccountId, AccountType, Commodity, CommodityTable, ReconcileState, ReverseBalance,
    Split, SplitId, Transaction, TransactionId,
};
pub use error::{LedgerError, LedgerResult, ValidationError};
pub use import::{import_rows, load_rows, ImportRow, ImportSummary};
pub use propagation::{
    apply_changes, change_account_types, compute_currency_security_changes, confirm_changes,
    plan_edit, AccountChanges, AccountField, ChangeRow, ChangeVerifier, LedgerDisplays,
    NoLedgerDisplays,
};
pub use reconcile::{
    find_payment_account, BalanceSummary, Confirm, FinishOutcome, PaymentSuggestion,
    ReconcileList, ReconcileSession, StatementDialog,
};
pub use session::UiSession;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

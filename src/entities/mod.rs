// Entity Models
//
// Identity is a UUID newtype that never changes; everything else on an
// entity is a value the editor may replace.

pub mod account;
pub mod account_type;
pub mod commodity;
pub mod transaction;

pub use account::{Account, AccountId};
pub use account_type::{AccountType, ReverseBalance};
pub use commodity::{
    commodity_equiv, optional_printname, Commodity, CommodityTable, NAMESPACE_ISO, NAMESPACE_SECURITY,
};
pub use transaction::{ReconcileState, Split, SplitId, Transaction, TransactionId};

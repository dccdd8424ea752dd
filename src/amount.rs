// 💲 Amounts - Parsing and printing monetary and share quantities
//
// Both dialogs read amounts typed by the user and echo them back in a
// normalized form. Parsing is forgiving (thousands separators, currency
// prefix/suffix, parentheses for negatives); printing is fixed-format.

use crate::error::{LedgerError, LedgerResult};

/// Tolerance used when deciding that a balance is "zero"
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Decimal places for share quantities
const SHARE_DECIMALS: usize = 4;

/// Decimal places for monetary values
const MONEY_DECIMALS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrintFlags {
    /// Append the commodity mnemonic
    pub symbol: bool,
    /// Group thousands with ','
    pub separators: bool,
    /// Print as a share quantity
    pub shares: bool,
}

impl PrintFlags {
    pub fn money() -> Self {
        PrintFlags {
            symbol: true,
            separators: true,
            shares: false,
        }
    }

    /// Same as `money` but for share-based accounts
    pub fn for_shares(shares: bool) -> Self {
        PrintFlags {
            shares,
            ..Self::money()
        }
    }

    pub fn without_symbol(self) -> Self {
        PrintFlags {
            symbol: false,
            ..self
        }
    }
}

/// Approximate equality used for balance checks
pub fn amounts_equal(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Print an amount, e.g. `-1,234.50 USD` or `12.5000` for shares
pub fn format_amount(value: f64, flags: PrintFlags, mnemonic: &str) -> String {
    let decimals = if flags.shares { SHARE_DECIMALS } else { MONEY_DECIMALS };
    let mut value = value;
    if value.abs() < 0.5 * 10f64.powi(-(decimals as i32)) {
        value = 0.0;
    }

    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    let int_part = if flags.separators {
        group_thousands(int_part)
    } else {
        int_part.to_string()
    };

    let mut out = String::new();
    if value < 0.0 {
        out.push('-');
    }
    out.push_str(&int_part);
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    if flags.symbol && !mnemonic.is_empty() {
        out.push(' ');
        out.push_str(mnemonic);
    }
    out
}

/// Parse a user-typed amount.
///
/// Accepts `1,234.56`, `-12`, `(12.00)`, `$ 5`, `5 USD`. An empty string is
/// zero. Anything else that is not a number is an error.
pub fn parse_amount(input: &str) -> LedgerResult<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }

    let (negative_parens, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner.trim()),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
        .collect();

    // Letters are allowed only as a currency prefix/suffix, never between digits
    let first_digit = body.find(|c: char| c.is_ascii_digit());
    let last_digit = body.rfind(|c: char| c.is_ascii_digit());
    if let (Some(first), Some(last)) = (first_digit, last_digit) {
        if body[first..=last].chars().any(|c| c.is_alphabetic()) {
            return Err(LedgerError::InvalidAmount(input.to_string()));
        }
    }

    let value = cleaned
        .parse::<f64>()
        .map_err(|_| LedgerError::InvalidAmount(input.to_string()))?;

    Ok(if negative_parens { -value.abs() } else { value })
}

/// Parse and re-print without symbol, the way an entry is normalized when
/// it loses focus. Unparseable input normalizes to zero.
pub fn normalize_entry(input: &str, shares: bool, mnemonic: &str) -> String {
    let value = parse_amount(input).unwrap_or(0.0);
    format_amount(value, PrintFlags::for_shares(shares).without_symbol(), mnemonic)
}

// ============================================================================
// TESTS
// ============================================================================

//! Currency data needed to set up the note cassettes.
//!
//! Where this data comes from is up to the application; the driver only needs
//! something implementing [`BillTable`]. A plain slice of [`Currency`] rows
//! works:
//!
//! ```
//! use f56::{BillTable, Currency};
//!
//! const BILLS: &[Currency<'static>] = &[Currency {
//!     code: "USD",
//!     lengths: &[0x00, 0x9b, 0x9b, 0x9b],
//!     thickness: 0x0c,
//! }];
//!
//! let usd = BILLS.currency("USD").unwrap();
//! assert_eq!(usd.length(1), Some(0x9b));
//! ```

/// Note geometry for one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Currency<'a> {
    /// ISO 4217 code, e.g. `"USD"`.
    pub code: &'a str,
    /// Note length code, indexed by denomination.
    pub lengths: &'a [u8],
    /// Note thickness code. Same for every denomination.
    pub thickness: u8,
}

impl Currency<'_> {
    pub fn length(&self, denomination: usize) -> Option<u8> {
        self.lengths.get(denomination).copied()
    }
}

/// Read-only lookup from currency code to note geometry.
pub trait BillTable {
    fn currency(&self, code: &str) -> Option<&Currency<'_>>;
}

impl<'a> BillTable for [Currency<'a>] {
    fn currency(&self, code: &str) -> Option<&Currency<'_>> {
        self.iter().find(|c| c.code.eq_ignore_ascii_case(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[Currency<'static>] = &[
        Currency {
            code: "USD",
            lengths: &[0x00, 0x9b, 0x9b],
            thickness: 0x0c,
        },
        Currency {
            code: "EUR",
            lengths: &[0x00, 0x78, 0x7f, 0x85],
            thickness: 0x0b,
        },
    ];

    #[test]
    fn looks_up_currency() {
        let eur = TABLE.currency("EUR").unwrap();
        assert_eq!(eur.thickness, 0x0b);
        assert_eq!(eur.length(2), Some(0x7f));
        assert_eq!(eur.length(9), None);
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(TABLE.currency("usd").map(|c| c.code), Some("USD"));
    }

    #[test]
    fn unknown_currency() {
        assert!(TABLE.currency("GBP").is_none());
    }
}

//! Static loan product catalogue and repayment periods.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Loan product offered in the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LoanCategory {
    /// "Micro-Enterprise", 9.5% p.a.
    MicroEnterprise,
    /// "Agricultural Growth", 8.2% p.a.
    AgriculturalGrowth,
    /// "Education Excellence", 7.5% p.a.
    EducationExcellence,
    /// "Small Business Plus", 11.2% p.a.
    SmallBusinessPlus,
}

/// Raised when a category name is not in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown loan category: {name}")]
pub struct UnknownLoanCategory {
    /// Trimmed input that failed to match.
    pub name: String,
}

/// Catalogue entry: indicative rate and advertised amount range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanProduct {
    /// Category this entry describes.
    pub category: LoanCategory,
    /// Annual rate in basis points (950 = 9.5 % p.a.).
    pub annual_rate_bps: u32,
    /// Smallest advertised principal.
    pub min_amount: u64,
    /// Largest advertised principal.
    pub max_amount: u64,
    /// Short marketing badge shown next to the product.
    pub badge: &'static str,
}

static CATALOGUE: [LoanProduct; 4] = [
    LoanProduct {
        category: LoanCategory::MicroEnterprise,
        annual_rate_bps: 950,
        min_amount: 50_000,
        max_amount: 500_000,
        badge: "Popular",
    },
    LoanProduct {
        category: LoanCategory::AgriculturalGrowth,
        annual_rate_bps: 820,
        min_amount: 20_000,
        max_amount: 200_000,
        badge: "Eco-Friendly",
    },
    LoanProduct {
        category: LoanCategory::EducationExcellence,
        annual_rate_bps: 750,
        min_amount: 10_000,
        max_amount: 100_000,
        badge: "Scholar",
    },
    LoanProduct {
        category: LoanCategory::SmallBusinessPlus,
        annual_rate_bps: 1120,
        min_amount: 100_000,
        max_amount: 1_000_000,
        badge: "Expansion",
    },
];

impl LoanCategory {
    /// All categories in catalogue order.
    pub const ALL: [Self; 4] = [
        Self::MicroEnterprise,
        Self::AgriculturalGrowth,
        Self::EducationExcellence,
        Self::SmallBusinessPlus,
    ];

    /// Display name, also accepted by [`Self::parse`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MicroEnterprise => "Micro-Enterprise",
            Self::AgriculturalGrowth => "Agricultural Growth",
            Self::EducationExcellence => "Education Excellence",
            Self::SmallBusinessPlus => "Small Business Plus",
        }
    }

    /// Catalogue entry for this category.
    #[must_use]
    pub fn product(self) -> &'static LoanProduct {
        match self {
            Self::MicroEnterprise => &CATALOGUE[0],
            Self::AgriculturalGrowth => &CATALOGUE[1],
            Self::EducationExcellence => &CATALOGUE[2],
            Self::SmallBusinessPlus => &CATALOGUE[3],
        }
    }

    /// Parse a display name, ignoring case and surrounding whitespace.
    pub fn parse(name: &str) -> Result<Self, UnknownLoanCategory> {
        let trimmed = name.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownLoanCategory {
                name: trimmed.to_owned(),
            })
    }
}

/// Static catalogue listing every product.
#[must_use]
pub fn catalogue() -> &'static [LoanProduct] {
    &CATALOGUE
}

impl LoanProduct {
    /// Whether `amount` falls inside the advertised range (inclusive).
    #[must_use]
    pub const fn accepts_amount(&self, amount: u64) -> bool {
        amount >= self.min_amount && amount <= self.max_amount
    }

    /// Rate formatted the way the catalogue advertises it, e.g. `9.5% p.a.`.
    #[must_use]
    pub fn rate_label(&self) -> String {
        let bps = self.annual_rate_bps;
        let whole = bps.checked_div(100).unwrap_or_default();
        let tenths = bps
            .checked_rem(100)
            .and_then(|cents| cents.checked_div(10))
            .unwrap_or_default();
        format!("{whole}.{tenths}% p.a.")
    }
}

impl fmt::Display for LoanCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LoanCategory {
    type Err = UnknownLoanCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LoanCategory {
    type Error = UnknownLoanCategory;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LoanCategory> for String {
    fn from(value: LoanCategory) -> Self {
        value.name().to_owned()
    }
}

/// Repayment period offered by the loan request form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LoanPeriod {
    /// Six months.
    Months6,
    /// Twelve months.
    Months12,
    /// Eighteen months.
    Months18,
    /// Twenty-four months.
    Months24,
}

/// Raised when a period is not one of the offered terms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported loan period: {raw}")]
pub struct InvalidLoanPeriod {
    /// Input as received.
    pub raw: String,
}

impl LoanPeriod {
    /// Every offered term, shortest first.
    pub const ALL: [Self; 4] = [Self::Months6, Self::Months12, Self::Months18, Self::Months24];

    /// Term length in months.
    #[must_use]
    pub const fn months(self) -> u8 {
        match self {
            Self::Months6 => 6,
            Self::Months12 => 12,
            Self::Months18 => 18,
            Self::Months24 => 24,
        }
    }

    /// Map a month count onto an offered term.
    pub fn from_months(months: u8) -> Result<Self, InvalidLoanPeriod> {
        Self::ALL
            .into_iter()
            .find(|period| period.months() == months)
            .ok_or_else(|| InvalidLoanPeriod {
                raw: months.to_string(),
            })
    }

    /// Accepts `"12"`, `"12 Months"`, and `"12 months"`.
    pub fn parse(raw: &str) -> Result<Self, InvalidLoanPeriod> {
        let invalid = || InvalidLoanPeriod {
            raw: raw.trim().to_owned(),
        };
        let trimmed = raw.trim();
        let digits = trimmed
            .split_once(char::is_whitespace)
            .map_or(Some(trimmed), |(count, unit)| {
                unit.trim().eq_ignore_ascii_case("months").then_some(count)
            })
            .ok_or_else(invalid)?;
        let months: u8 = digits.parse().map_err(|_| invalid())?;
        Self::from_months(months).map_err(|_| invalid())
    }
}

impl fmt::Display for LoanPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Months", self.months())
    }
}

impl TryFrom<String> for LoanPeriod {
    type Error = InvalidLoanPeriod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LoanPeriod> for String {
    fn from(value: LoanPeriod) -> Self {
        value.to_string()
    }
}

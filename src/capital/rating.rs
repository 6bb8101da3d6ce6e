//! Synthetic credit rating from interest coverage.
//!
//! Coverage bands and default spreads follow the usual large-firm table
//! used for synthetic ratings. The rating is ordinal: `Ord` compares credit
//! quality, so `CreditRating::Aaa > CreditRating::Bbb`.

use crate::math::Ratio;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum CreditRating {
    #[serde(rename = "D")]
    D,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "CC")]
    Cc,
    #[serde(rename = "CCC")]
    Ccc,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "BB")]
    Bb,
    #[serde(rename = "BB+")]
    BbPlus,
    #[serde(rename = "BBB")]
    Bbb,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "AA")]
    Aa,
    #[serde(rename = "AAA")]
    Aaa,
}

/// (minimum coverage, rating, default spread), best first.
const RATING_TABLE: [(f64, CreditRating, f64); 15] = [
    (8.50, CreditRating::Aaa, 0.0063),
    (6.50, CreditRating::Aa, 0.0078),
    (5.50, CreditRating::APlus, 0.0098),
    (4.25, CreditRating::A, 0.0108),
    (3.00, CreditRating::AMinus, 0.0122),
    (2.50, CreditRating::Bbb, 0.0156),
    (2.25, CreditRating::BbPlus, 0.0200),
    (2.00, CreditRating::Bb, 0.0240),
    (1.75, CreditRating::BPlus, 0.0351),
    (1.50, CreditRating::B, 0.0421),
    (1.25, CreditRating::BMinus, 0.0515),
    (0.80, CreditRating::Ccc, 0.0820),
    (0.65, CreditRating::Cc, 0.0864),
    (0.20, CreditRating::C, 0.1134),
    (f64::NEG_INFINITY, CreditRating::D, 0.1512),
];

impl CreditRating {
    /// Rating implied by an interest coverage ratio.
    /// No interest expense (undefined coverage) rates as AAA.
    pub fn from_coverage(coverage: Ratio) -> Self {
        let Some(c) = coverage.value() else {
            return CreditRating::Aaa;
        };
        RATING_TABLE
            .iter()
            .find(|(min, _, _)| c >= *min)
            .map(|(_, rating, _)| *rating)
            .unwrap_or(CreditRating::D)
    }

    /// Default spread over the risk-free rate.
    pub fn spread(&self) -> f64 {
        RATING_TABLE
            .iter()
            .find(|(_, rating, _)| rating == self)
            .map(|(_, _, spread)| *spread)
            .unwrap_or(0.1512)
    }

    #[inline]
    pub fn is_investment_grade(&self) -> bool {
        *self >= CreditRating::Bbb
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Aaa => "AAA",
            Self::Aa => "AA",
            Self::APlus => "A+",
            Self::A => "A",
            Self::AMinus => "A-",
            Self::Bbb => "BBB",
            Self::BbPlus => "BB+",
            Self::Bb => "BB",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::BMinus => "B-",
            Self::Ccc => "CCC",
            Self::Cc => "CC",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl std::fmt::Display for CreditRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(CreditRating::from_coverage(Ratio::Defined(12.0)), CreditRating::Aaa);
        assert_eq!(CreditRating::from_coverage(Ratio::Defined(2.6)), CreditRating::Bbb);
        assert_eq!(CreditRating::from_coverage(Ratio::Defined(0.1)), CreditRating::D);
        assert_eq!(CreditRating::from_coverage(Ratio::Defined(-3.0)), CreditRating::D);
        assert_eq!(CreditRating::from_coverage(Ratio::Undefined), CreditRating::Aaa);
    }

    #[test]
    fn test_ordinal_and_spread_monotone() {
        assert!(CreditRating::Aaa > CreditRating::Bbb);
        assert!(CreditRating::Bbb.is_investment_grade());
        assert!(!CreditRating::BbPlus.is_investment_grade());
        for w in RATING_TABLE.windows(2) {
            assert!(w[0].1 > w[1].1, "table must be ordered best first");
            assert!(w[0].2 < w[1].2, "worse ratings must pay wider spreads");
        }
    }

    #[test]
    fn test_label_round_trips_through_serde() {
        let json = serde_json::to_string(&CreditRating::BbPlus).unwrap();
        assert_eq!(json, "\"BB+\"");
        let back: CreditRating = serde_json::from_str("\"A-\"").unwrap();
        assert_eq!(back, CreditRating::AMinus);
        assert_eq!(CreditRating::AMinus.to_string(), "A-");
    }
}

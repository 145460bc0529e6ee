use std::fmt;

macro_rules! string_wrapper {
    ($struct:ident, $what:literal) => {
        #[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
        #[cfg_attr(
            feature = "serde",
            derive(serde::Serialize, serde::Deserialize),
            serde(transparent)
        )]
        #[doc = concat!("The identifier of ", $what)]
        pub struct $struct(String);

        impl $struct {
            /// View the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $struct {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $struct {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $struct {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $struct {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_wrapper!(ZoneId, "a load zone");
string_wrapper!(PeriodId, "an investment period");
string_wrapper!(TimeseriesId, "a representative timeseries (e.g. a sample day)");
string_wrapper!(TimepointId, "a single timepoint within a timeseries");

/// The identifier of a bid.
///
/// Bid ids are assigned by the ledger in strictly increasing order, beginning at 1,
/// and are never reused.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct BidId(u64);

impl BidId {
    /// The id of the first bid of a run
    pub const FIRST: Self = Self(1);

    /// The id that follows this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The raw integer value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for BidId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for BidId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A commodity the flexible demand can buy or sell.
///
/// Energy is always traded. The reserve products are only traded when the run is
/// configured for them; their quantities are negative when the demand side provides
/// the reserve.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum Product {
    /// Energy delivered to the load zone
    Energy,
    /// Upward spinning reserve
    ReserveUp,
    /// Downward spinning reserve
    ReserveDown,
}

impl Product {
    /// Every product, energy first
    pub const ALL: [Product; 3] = [Product::Energy, Product::ReserveUp, Product::ReserveDown];

    /// The canonical label, as used in column headers of the bid log
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Energy => "energy",
            Self::ReserveUp => "energy up",
            Self::ReserveDown => "energy down",
        }
    }

    /// Whether this is one of the ancillary reserve products
    pub fn is_reserve(self) -> bool {
        !matches!(self, Self::Energy)
    }

    /// The product list of a run: energy, followed by the requested reserve products
    /// in the order given, skipping duplicates.
    pub fn with_reserves(reserves: &[Product]) -> Vec<Product> {
        let mut products = vec![Product::Energy];
        for &product in reserves {
            if !products.contains(&product) {
                products.push(product);
            }
        }
        products
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when a product label is not recognized
#[derive(Debug, Error)]
#[error("unknown product `{0}` (expected one of: energy, energy up, energy down)")]
pub struct UnknownProduct(pub String);

impl FromStr for Product {
    type Err = UnknownProduct;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "energy" => Ok(Self::Energy),
            "energy up" | "energy_up" => Ok(Self::ReserveUp),
            "energy down" | "energy_down" => Ok(Self::ReserveDown),
            other => Err(UnknownProduct(other.to_owned())),
        }
    }
}

impl TryFrom<String> for Product {
    type Error = UnknownProduct;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Product> for String {
    fn from(value: Product) -> Self {
        value.as_str().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Product::Energy)]
    #[case(Product::ReserveUp)]
    #[case(Product::ReserveDown)]
    fn label_parses_back(#[case] product: Product) {
        assert_eq!(product.as_str().parse::<Product>().unwrap(), product);
    }

    #[test]
    fn energy_always_leads() {
        let products = Product::with_reserves(&[Product::ReserveDown, Product::ReserveDown]);
        assert_eq!(products, vec![Product::Energy, Product::ReserveDown]);
    }

    #[test]
    fn deserializes_from_label() {
        let product: Product = serde_json::from_str("\"energy up\"").unwrap();
        assert_eq!(product, Product::ReserveUp);
        assert!(serde_json::from_str::<Product>("\"heat\"").is_err());
    }
}

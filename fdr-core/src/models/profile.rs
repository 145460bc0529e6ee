use crate::models::{Map, Product};

/// Per-product values over the timepoints of one timeseries.
///
/// A profile is used both for the prices offered to the demand model and for the
/// quantities it answers with. Values are ordered like the timepoints of the
/// timeseries; a product that is absent from the profile reads as zero.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Profile(Map<Product, Vec<f64>>);

impl Profile {
    /// Build a profile by evaluating `f(product, position)` for every product and position
    pub fn from_fn(products: &[Product], len: usize, mut f: impl FnMut(Product, usize) -> f64) -> Self {
        Self(
            products
                .iter()
                .map(|&product| (product, (0..len).map(|i| f(product, i)).collect()))
                .collect(),
        )
    }

    /// A profile of zeros
    pub fn zeros(products: &[Product], len: usize) -> Self {
        Self::from_fn(products, len, |_, _| 0.0)
    }

    /// The values of one product, if present
    pub fn get(&self, product: Product) -> Option<&[f64]> {
        self.0.get(&product).map(Vec::as_slice)
    }

    /// The value of one product at one position, zero if absent
    pub fn value(&self, product: Product, position: usize) -> f64 {
        self.0
            .get(&product)
            .and_then(|values| values.get(position))
            .copied()
            .unwrap_or(0.0)
    }

    /// Replace the values of one product
    pub fn set(&mut self, product: Product, values: Vec<f64>) {
        self.0.insert(product, values);
    }

    /// The products present in the profile
    pub fn products(&self) -> impl Iterator<Item = Product> + '_ {
        self.0.keys().copied()
    }

    /// Iterate over (product, values)
    pub fn iter(&self) -> impl Iterator<Item = (Product, &[f64])> {
        self.0.iter().map(|(&product, values)| (product, values.as_slice()))
    }

    /// Zero out every product other than energy
    pub fn zero_reserves(&mut self) {
        for (product, values) in self.0.iter_mut() {
            if product.is_reserve() {
                values.iter_mut().for_each(|v| *v = 0.0);
            }
        }
    }

    /// Restrict the profile to exactly `products`, each with `len` values.
    ///
    /// Missing products are filled with zeros; returns `None` if a present product
    /// has the wrong number of values.
    pub fn conform(mut self, products: &[Product], len: usize) -> Option<Self> {
        let mut conformed = Map::with_capacity(products.len());
        for &product in products {
            let values = self.0.swap_remove(&product).unwrap_or_else(|| vec![0.0; len]);
            if values.len() != len {
                return None;
            }
            conformed.insert(product, values);
        }
        Some(Self(conformed))
    }
}

impl FromIterator<(Product, Vec<f64>)> for Profile {
    fn from_iter<I: IntoIterator<Item = (Product, Vec<f64>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_products_read_as_zero() {
        let profile: Profile = [(Product::Energy, vec![1.0, 2.0])].into_iter().collect();
        assert_eq!(profile.value(Product::Energy, 1), 2.0);
        assert_eq!(profile.value(Product::ReserveUp, 1), 0.0);
        assert_eq!(profile.value(Product::Energy, 5), 0.0);
    }

    #[test]
    fn conform_fills_and_checks_lengths() {
        let products = [Product::Energy, Product::ReserveUp];
        let profile: Profile = [(Product::Energy, vec![1.0, 2.0])].into_iter().collect();
        let conformed = profile.clone().conform(&products, 2).unwrap();
        assert_eq!(conformed.get(Product::ReserveUp), Some(&[0.0, 0.0][..]));
        assert!(profile.conform(&products, 3).is_none());
    }

    #[test]
    fn zero_reserves_keeps_energy() {
        let mut profile = Profile::from_fn(&Product::ALL, 2, |_, _| 3.0);
        profile.zero_reserves();
        assert_eq!(profile.get(Product::Energy), Some(&[3.0, 3.0][..]));
        assert_eq!(profile.get(Product::ReserveDown), Some(&[0.0, 0.0][..]));
    }
}

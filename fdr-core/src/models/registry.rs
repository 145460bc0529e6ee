use crate::models::{Map, Product};
use thiserror::Error;

/// The name of the cost component carrying the welfare cost of the flexible demand
pub const DEMAND_WELFARE: &str = "dr_welfare_cost";

/// The name of the reserve provision made by the flexible demand
pub const DEMAND_RESPONSE_PROVISION: &str = "demand_response";

/// How a cost component is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostScope {
    /// The component is incurred at every timepoint
    PerTimepoint,
    /// The component is incurred once per period
    PerPeriod,
}

/// The named contributions to the objective and to each reserve requirement.
///
/// Modules register themselves here instead of appending to shared lists; the
/// dispatch model consults the registry when it assembles the program, and the
/// reports break costs down by the registered names.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    costs: Map<String, CostScope>,
    provisions: Map<Product, Vec<String>>,
}

impl ComponentRegistry {
    /// Register a named cost component
    pub fn register_cost_component(
        &mut self,
        name: &str,
        scope: CostScope,
    ) -> Result<(), RegistryError> {
        if self.costs.contains_key(name) {
            return Err(RegistryError::DuplicateCost(name.to_owned()));
        }
        self.costs.insert(name.to_owned(), scope);
        Ok(())
    }

    /// Register a named provision towards a reserve product
    pub fn register_reserve_provision(
        &mut self,
        product: Product,
        name: &str,
    ) -> Result<(), RegistryError> {
        if !product.is_reserve() {
            return Err(RegistryError::NotAReserve(product));
        }
        let names = self.provisions.entry(product).or_default();
        if names.iter().any(|n| n == name) {
            return Err(RegistryError::DuplicateProvision {
                product,
                name: name.to_owned(),
            });
        }
        names.push(name.to_owned());
        Ok(())
    }

    /// Whether a cost component is registered
    pub fn has_cost(&self, name: &str) -> bool {
        self.costs.contains_key(name)
    }

    /// Every registered cost component, in registration order
    pub fn cost_components(&self) -> impl Iterator<Item = (&str, CostScope)> {
        self.costs.iter().map(|(name, &scope)| (name.as_str(), scope))
    }

    /// Whether `name` provides the reserve `product`
    pub fn provides(&self, product: Product, name: &str) -> bool {
        self.provisions
            .get(&product)
            .is_some_and(|names| names.iter().any(|n| n == name))
    }

    /// The provisions registered for a reserve product
    pub fn reserve_provisions(&self, product: Product) -> &[String] {
        self.provisions
            .get(&product)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// The ways a registration can fail.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    /// A cost component with this name already exists
    #[error("cost component `{0}` is already registered")]
    DuplicateCost(String),
    /// A provision with this name already exists for the product
    #[error("reserve provision `{name}` is already registered for {product}")]
    DuplicateProvision {
        /// The reserve product
        product: Product,
        /// The provision name
        name: String,
    },
    /// Provisions can only be registered for reserve products
    #[error("{0} is not a reserve product")]
    NotAReserve(Product),
}

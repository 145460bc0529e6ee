use std::collections::BTreeSet;

/// A derived piece of the dispatch program.
///
/// The variants are declared in topological order: every component comes after the
/// components it is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    /// Generation, reserve, transmission and unserved-energy columns and their bounds
    Supply,
    /// One weight column per (bid, weight scope), numbered after the supply columns
    BidWeights,
    /// Weights within a scope sum to one; weights are non-negative
    ConvexRows,
    /// The flexible-demand expression: Σ weight · quantity, per zone, timepoint and product
    FlexibleDemand,
    /// Reserve sold by the flexible demand, summed over zones
    ReserveSales,
    /// Minus the weighted benefit of the bids
    Welfare,
    /// One energy balance row per zone and timepoint
    EnergyBalance,
    /// One reserve requirement row per product and timepoint
    ReserveBalance,
    /// The quadratic and linear objective terms
    Objective,
}

impl Component {
    /// Every component, in topological order
    pub const ALL: [Component; 9] = [
        Component::Supply,
        Component::BidWeights,
        Component::ConvexRows,
        Component::FlexibleDemand,
        Component::ReserveSales,
        Component::Welfare,
        Component::EnergyBalance,
        Component::ReserveBalance,
        Component::Objective,
    ];

    /// The components this one is derived from
    pub fn inputs(self) -> &'static [Component] {
        use Component::*;
        match self {
            Supply => &[],
            BidWeights => &[Supply],
            ConvexRows | FlexibleDemand | ReserveSales | Welfare => &[BidWeights],
            EnergyBalance => &[Supply, FlexibleDemand],
            ReserveBalance => &[Supply, ReserveSales],
            Objective => &[Supply, Welfare],
        }
    }
}

/// Tracks which components of the dispatch program are out of date.
///
/// Invalidating a component marks it and everything downstream of it dirty; a rebuild
/// then re-derives exactly the dirty components, inputs before outputs.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    dirty: BTreeSet<Component>,
}

impl Default for DependencyGraph {
    /// A fresh graph has never been built, so everything is dirty
    fn default() -> Self {
        Self {
            dirty: Component::ALL.into_iter().collect(),
        }
    }
}

impl DependencyGraph {
    /// Mark a component and all of its dependents dirty
    pub fn invalidate(&mut self, component: Component) {
        // ALL is topologically sorted, so a single forward pass reaches every dependent
        self.dirty.insert(component);
        for candidate in Component::ALL {
            if candidate
                .inputs()
                .iter()
                .any(|input| self.dirty.contains(input))
                && candidate > component
            {
                self.dirty.insert(candidate);
            }
        }
    }

    /// Whether any component needs rebuilding
    pub fn is_stale(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Whether a specific component needs rebuilding
    pub fn is_dirty(&self, component: Component) -> bool {
        self.dirty.contains(&component)
    }

    /// The dirty components, in the order they must be rebuilt
    pub fn pending(&self) -> Vec<Component> {
        self.dirty.iter().copied().collect()
    }

    /// Record that a component has been rebuilt
    pub fn mark_clean(&mut self, component: Component) {
        self.dirty.remove(&component);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Component::*;

    fn clean() -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for component in graph.pending() {
            graph.mark_clean(component);
        }
        graph
    }

    #[test]
    fn starts_dirty() {
        let graph = DependencyGraph::default();
        assert_eq!(graph.pending(), Component::ALL.to_vec());
    }

    #[test]
    fn new_bid_leaves_supply_alone() {
        let mut graph = clean();
        graph.invalidate(BidWeights);
        assert!(!graph.is_dirty(Supply));
        assert_eq!(
            graph.pending(),
            vec![
                BidWeights,
                ConvexRows,
                FlexibleDemand,
                ReserveSales,
                Welfare,
                EnergyBalance,
                ReserveBalance,
                Objective
            ]
        );
    }

    #[test]
    fn reserve_sales_only_touch_reserve_rows() {
        let mut graph = clean();
        graph.invalidate(ReserveSales);
        assert_eq!(graph.pending(), vec![ReserveSales, ReserveBalance]);
    }
}

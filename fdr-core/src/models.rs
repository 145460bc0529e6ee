mod baseline;
pub use baseline::*;

mod bid;
pub use bid::*;

mod ids;
pub use ids::*;

mod ledger;
pub use ledger::*;

mod map;
pub use map::*;

mod product;
pub use product::*;

mod profile;
pub use profile::*;

mod registry;
pub use registry::*;

mod report;
pub use report::*;

mod state;
pub use state::*;

mod timeline;
pub use timeline::*;

mod partition;
mod record;

pub use partition::Partition;
pub use record::{Attributes, PolygonRecord};

mod link;
mod overrides;

pub use link::{
    link, link_with_overrides, link_with_stats,
    Link, LinkResult, LinkSource, LinkStats, LinkedPartition, Resolution, Unlinked, UnlinkedSet,
};
pub use overrides::OverrideTable;

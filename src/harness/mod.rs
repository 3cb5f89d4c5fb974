//! Recording harness: the fake test framework modules and the state they
//! record into.

pub mod context;
pub mod fakes;
pub mod stub;

pub use context::{
    BreadcrumbGuard, BreadcrumbPolicy, ErrorDescriptor, FixtureRecord, HarvestContext,
    rule_identifier, rule_name,
};
pub use stub::{CallPath, PendingAction, PendingFixture};

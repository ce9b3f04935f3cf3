//! Directory resource definitions for azdir.
//!
//! Each definition maps a declarative model onto the
//! [`LifecycleCoordinator`](azdir_lifecycle::LifecycleCoordinator):
//! - [`ApplicationRegistrations`]: `azuread_application_registration`
//! - [`AdministrativeUnitMembers`]: `azuread_administrative_unit_member`
//! - [`PrivilegedAccessGroupSchedules`]: the
//!   `azuread_privileged_access_group_{assignment,eligibility}_schedule` pair
//! - [`UserLookup`]: the user data source
//!
//! [`DirectoryResources::from_graph`] wires all of them onto Microsoft Graph.

pub mod administrative_unit_member;
pub mod application_registration;
mod error;
pub mod privileged_access_group_schedule;
mod registry;
pub mod user;
pub mod validation;

pub use administrative_unit_member::{AdministrativeUnitMember, AdministrativeUnitMembers};
pub use application_registration::{ApplicationRegistration, ApplicationRegistrations};
pub use error::{ResourceError, ResourceResult};
pub use privileged_access_group_schedule::{
    PrivilegedAccessGroupSchedule, PrivilegedAccessGroupSchedules, ScheduleId, ScheduleKind,
    Teardown,
};
pub use registry::DirectoryResources;
pub use user::{DirectoryUser, UserArguments, UserLookup, UserSelector};

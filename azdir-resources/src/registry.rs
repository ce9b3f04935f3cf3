//! Wiring of every resource definition onto one set of clients.

use crate::administrative_unit_member::{AdministrativeUnitMembers, MEMBER_KIND};
use crate::application_registration::ApplicationRegistrations;
use crate::privileged_access_group_schedule::{PrivilegedAccessGroupSchedules, ScheduleKind};
use crate::user::UserLookup;
use azdir_client::{DirectoryClient, Endpoint, GraphDirectoryClient};
use azdir_lifecycle::NamedLocks;
use std::sync::Arc;

/// All resource definitions, sharing one lock registry.
#[derive(Debug)]
pub struct DirectoryResources {
    pub applications: ApplicationRegistrations,
    pub administrative_unit_members: AdministrativeUnitMembers,
    pub users: UserLookup,
    pub assignment_schedules: PrivilegedAccessGroupSchedules,
    pub eligibility_schedules: PrivilegedAccessGroupSchedules,
    locks: Arc<NamedLocks>,
}

fn schedules(
    graph: &GraphDirectoryClient,
    kind: ScheduleKind,
    locks: &Arc<NamedLocks>,
) -> PrivilegedAccessGroupSchedules {
    PrivilegedAccessGroupSchedules::new(
        kind,
        client(graph, &format!("{kind} request"), Endpoint::collection(kind.requests_path())),
        client(graph, &kind.to_string(), Endpoint::collection(kind.schedules_path())),
        Arc::clone(locks),
    )
}

fn client(graph: &GraphDirectoryClient, object_type: &str, endpoint: Endpoint) -> Arc<dyn DirectoryClient> {
    Arc::new(graph.for_endpoint(object_type, endpoint))
}

impl DirectoryResources {
    /// Builds every resource on clients derived from `graph`, so they share
    /// its connection pool and access token.
    pub fn from_graph(graph: &GraphDirectoryClient) -> Self {
        let locks = Arc::new(NamedLocks::new());
        Self {
            applications: ApplicationRegistrations::new(
                client(graph, "application", Endpoint::collection("applications")),
                Arc::clone(&locks),
            ),
            administrative_unit_members: AdministrativeUnitMembers::new(
                client(graph, "administrative unit", Endpoint::collection("administrativeUnits")),
                client(graph, "directory object", Endpoint::collection("directoryObjects")),
                client(
                    graph,
                    "administrative unit member",
                    Endpoint::references("administrativeUnits", "members", MEMBER_KIND),
                ),
                Arc::clone(&locks),
            ),
            users: UserLookup::new(
                client(graph, "user", Endpoint::collection("users")),
                client(graph, "manager", Endpoint::related("users", "manager")),
            ),
            assignment_schedules: schedules(graph, ScheduleKind::Assignment, &locks),
            eligibility_schedules: schedules(graph, ScheduleKind::Eligibility, &locks),
            locks,
        }
    }

    /// The lock registry shared by every resource.
    pub fn locks(&self) -> &Arc<NamedLocks> {
        &self.locks
    }
}

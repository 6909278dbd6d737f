use std::fmt;

use serde::{Deserialize, Serialize};
use tarpc::context;
use tracing::info;

use crate::DEFAULT_CUSTODIAN;

/// Status code reported for a successful create.
pub const STATUS_OK: i32 = 0;

/// Query key for [`OssProject::list_projects`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectName {
    pub name: String,
}

impl ProjectName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Project submitted to [`OssProject::create_project`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Matched projects. `names` and `custodians` are parallel: the same index
/// describes the same project.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTitles {
    pub names: Vec<String>,
    pub custodians: Vec<String>,
}

impl fmt::Display for ProjectTitles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "names={:?}, custodians={:?}", self.names, self.custodians)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCreateStatus {
    pub status: i32,
}

impl ProjectCreateStatus {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Tarpc service for querying and registering OSS projects.
#[tarpc::service]
pub trait OssProject {
    /// Lists the projects matching `request`.
    async fn list_projects(request: ProjectName) -> ProjectTitles;
    /// Registers a project and reports the outcome as a status code.
    async fn create_project(request: Project) -> ProjectCreateStatus;
}

/// Server-side implementation of the [`OssProject`] service.
///
/// Holds no state, so every request can run on its own task without
/// coordination. Listing echoes the queried name back as the only match,
/// owned by [`DEFAULT_CUSTODIAN`]; creating always succeeds and stores nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectService;

impl OssProject for ProjectService {
    async fn list_projects(self, _: context::Context, request: ProjectName) -> ProjectTitles {
        info!(name = %request.name, "received list projects request");
        ProjectTitles {
            names: vec![request.name],
            custodians: vec![DEFAULT_CUSTODIAN.to_string()],
        }
    }

    async fn create_project(self, _: context::Context, request: Project) -> ProjectCreateStatus {
        info!(name = %request.name, "received create project request");
        ProjectCreateStatus { status: STATUS_OK }
    }
}

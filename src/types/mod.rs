// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Project/server ids, project names, and release ids.

mod id;
mod project_name;
mod release_id;

pub use id::{Id, ProjectId, ServerId};
pub use project_name::{ProjectName, ProjectNameError};
pub use release_id::{RELEASE_ID_FORMAT, ReleaseId, ReleaseIdError};

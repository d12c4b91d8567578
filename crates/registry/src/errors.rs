use tabweaver_core_types::OpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("workspace '{0}' not found")]
    WorkspaceNotFound(String),
    #[error("tab '{0}' not found")]
    TabNotFound(String),
    #[error("token '{0}' not found")]
    TokenNotFound(String),
    #[error("no scope given and no workspace exists")]
    NoScope,
    #[error("tab '{tab}' is not a member of workspace '{workspace}'")]
    TabNotInWorkspace { workspace: String, tab: String },
    #[error("page error: {0}")]
    Page(#[from] page_port::PortError),
}

impl RegistryError {
    pub fn into_op_error(self) -> OpError {
        match &self {
            RegistryError::Page(err) => OpError::unknown(err.to_string()),
            _ => OpError::not_found(self.to_string()),
        }
    }
}

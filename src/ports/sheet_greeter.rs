use thiserror::Error;

use crate::domain::Role;

#[derive(Error, Debug)]
pub enum SheetGreeterError {
    #[error("Failed to fetch spreadsheet metadata")]
    FailedToFetchMetadata,
    #[error("Failed to add greeting sheet")]
    FailedToAddSheet,
    #[error("Failed to write greeting sheet")]
    FailedToWrite,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SheetGreeter: Send + Sync {
    /// Writes (or rewrites) the instructions tab into the spreadsheet and
    /// returns its title.
    async fn write_greeting(
        &self,
        spreadsheet_id: &str,
        join_link: &str,
        role: Role,
    ) -> error_stack::Result<String, SheetGreeterError>;
}

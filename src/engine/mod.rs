//! Seam between the batch runner and the vendor migration tool.
//!
//! The runner only needs four things from the tool: a destination session,
//! a source session per site, a dry-run check between the two, and a way to
//! export the detailed result of that check. Everything else about the tool
//! stays behind this trait.

use std::fmt;
use std::path::Path;

use anyhow::Result;

use crate::core::PreCheckResult;

mod powershell;

pub use powershell::{PowerShellEngine, PowerShellOptions, StagedReport};

#[derive(Clone)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Destination session. Obtained once per run and handed back through
/// [`MigrationEngine::release`].
#[derive(Debug)]
pub struct Destination {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct SourceSite {
    pub url: String,
    pub title: String,
}

#[derive(Debug)]
pub struct CheckOutcome<D> {
    pub result: PreCheckResult,
    pub detail: D,
}

pub trait MigrationEngine {
    /// Engine-owned handle on the detailed check result.
    type Detail;

    /// Fails when the tool itself is not installed or cannot start.
    fn ensure_available(&mut self) -> Result<()>;

    fn connect_destination(&mut self, url: &str, credential: &Credential) -> Result<Destination>;

    fn connect_source(&mut self, url: &str, credential: &Credential) -> Result<SourceSite>;

    /// Dry-run comparison; never changes either site.
    fn check(
        &mut self,
        source: &SourceSite,
        destination: &Destination,
        credential: &Credential,
    ) -> Result<CheckOutcome<Self::Detail>>;

    fn export(&mut self, detail: Self::Detail, target: &Path) -> Result<()>;

    fn release(&mut self, destination: Destination);
}

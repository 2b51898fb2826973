//! The sandboxed file namespace.
//!
//! Every client path is resolved against a single [`Root`] and must stay
//! beneath it:
//!
//! - [`resolver`]: client path strings to [`ResolvedPath`]
//! - [`guard`]: lexical and on-disk containment checks
//! - [`lister`]: directory listings in presentation order
//! - [`mutation`]: create, write, delete, rename, move, clear-all
//! - [`conflict`]: what happens when a destination already exists
//! - [`error`]: the failure taxonomy shared by all of the above

pub mod conflict;
pub mod error;
pub mod guard;
pub mod lister;
pub mod mutation;
pub mod resolver;

pub use conflict::ConflictPolicy;
pub use error::FsError;
pub use lister::{DirectoryEntry, EntryLister};
pub use mutation::MutationService;
pub use resolver::{validate_name, ResolvedPath, Root};

use tracing::info;

use crate::config::Config;

/// A root together with the services that operate on it.
#[derive(Debug, Clone)]
pub struct Namespace {
    root: Root,
    lister: EntryLister,
    mutations: MutationService,
    text_file_conflict: ConflictPolicy,
}

impl Namespace {
    /// Build a namespace with default policies.
    pub fn new(root: Root) -> Self {
        Self {
            lister: EntryLister::new(root.clone()),
            mutations: MutationService::new(root.clone()),
            root,
            text_file_conflict: ConflictPolicy::Overwrite,
        }
    }

    /// Open the configured root and apply the configured policies.
    pub fn from_config(config: &Config) -> Result<Self, FsError> {
        let root = Root::open(&config.storage.root, config.storage.create_root)?;
        info!(root = %root.path().display(), "Opened namespace root");

        let mutations = MutationService::new(root.clone())
            .with_rename_conflict(config.policy.rename_conflict)
            .with_text_suffix(config.storage.text_suffix.clone());

        Ok(Self {
            lister: EntryLister::new(root.clone()),
            mutations,
            root,
            text_file_conflict: config.policy.text_file_conflict,
        })
    }

    /// The namespace root.
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Directory listing service.
    pub fn lister(&self) -> &EntryLister {
        &self.lister
    }

    /// Mutation service.
    pub fn mutations(&self) -> &MutationService {
        &self.mutations
    }

    /// Policy for text file writes when the client does not say.
    pub fn text_file_conflict(&self) -> ConflictPolicy {
        self.text_file_conflict
    }
}

//! Database layer for Quire
//!
//! MongoDB in production, an in-memory store for tests and offline
//! development. Both sit behind [`store::Store`].
//! Pattern adapted from holo-host/rust/util_libs/db

pub mod memory;
pub mod mongo;
pub mod schemas;
pub mod store;

use std::sync::Arc;

pub use memory::MemoryStore;
pub use mongo::{MongoClient, MongoCollection};
pub use schemas::{
    AccountStatus, ApprovalDoc, DomainEntryDoc, ExpertiseDoc, GroupDoc, MeetingBookDoc,
    MeetingEvent, Metadata, ProposalDoc, ResourceDoc, Reviewer, SynopsisDoc, ThesisDoc, UserDoc,
    UserProfile, REGISTRATION_KIND,
};
pub use store::{insert_with_next_id, mutate, next_id, remove_checked, Query, Record, Store};

use crate::types::Result;

/// One store per collection
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn Store<UserDoc>>,
    pub groups: Arc<dyn Store<GroupDoc>>,
    pub theses: Arc<dyn Store<ThesisDoc>>,
    pub proposals: Arc<dyn Store<ProposalDoc>>,
    pub domains: Arc<dyn Store<DomainEntryDoc>>,
    pub expertise: Arc<dyn Store<ExpertiseDoc>>,
    pub synopses: Arc<dyn Store<SynopsisDoc>>,
    pub meetings: Arc<dyn Store<MeetingBookDoc>>,
    pub resources: Arc<dyn Store<ResourceDoc>>,
    pub approvals: Arc<dyn Store<ApprovalDoc>>,
}

impl Stores {
    /// Empty in-memory stores
    pub fn memory() -> Self {
        Self {
            users: Arc::new(MemoryStore::new()),
            groups: Arc::new(MemoryStore::new()),
            theses: Arc::new(MemoryStore::new()),
            proposals: Arc::new(MemoryStore::new()),
            domains: Arc::new(MemoryStore::new()),
            expertise: Arc::new(MemoryStore::new()),
            synopses: Arc::new(MemoryStore::new()),
            meetings: Arc::new(MemoryStore::new()),
            resources: Arc::new(MemoryStore::new()),
            approvals: Arc::new(MemoryStore::new()),
        }
    }

    /// Collections of a connected MongoDB database, with indexes applied
    pub async fn mongo(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: Arc::new(client.collection::<UserDoc>().await?),
            groups: Arc::new(client.collection::<GroupDoc>().await?),
            theses: Arc::new(client.collection::<ThesisDoc>().await?),
            proposals: Arc::new(client.collection::<ProposalDoc>().await?),
            domains: Arc::new(client.collection::<DomainEntryDoc>().await?),
            expertise: Arc::new(client.collection::<ExpertiseDoc>().await?),
            synopses: Arc::new(client.collection::<SynopsisDoc>().await?),
            meetings: Arc::new(client.collection::<MeetingBookDoc>().await?),
            resources: Arc::new(client.collection::<ResourceDoc>().await?),
            approvals: Arc::new(client.collection::<ApprovalDoc>().await?),
        })
    }

    /// Backend name reported by `/health`
    pub fn backend(&self) -> &'static str {
        self.users.backend()
    }
}

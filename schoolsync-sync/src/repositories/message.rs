//! Messages of one mailbox folder.
//!
//! Read state lives on the server, so besides the usual add/remove merge the
//! cached copies of surviving messages take over the fetched `unread` and
//! `has_attachments` flags.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use schoolsync_core::{CacheEntity, Mailbox, Message, MessageFolder, Student};

use crate::bound::{network_bound_resource, BoundResource};
use crate::diff::merge_plan;
use crate::error::SyncError;
use crate::remote::SchoolApi;
use crate::repositories::rows;
use crate::resource::Resource;
use crate::staleness::{FeatureSyncGate, RefreshKey};
use crate::store::{Dao, RowFilter};

pub const CACHE_KEY: &str = "message";

pub struct MessageRepository {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Message>>,
    gate: Arc<FeatureSyncGate>,
}

impl MessageRepository {
    pub fn new(
        api: Arc<dyn SchoolApi>,
        dao: Arc<dyn Dao<Message>>,
        gate: Arc<FeatureSyncGate>,
    ) -> Self {
        Self { api, dao, gate }
    }

    pub fn gate(&self) -> &Arc<FeatureSyncGate> {
        &self.gate
    }

    /// `mailbox = None` covers every mailbox of the account.
    pub fn get_messages(
        &self,
        student: &Student,
        mailbox: Option<&Mailbox>,
        folder: MessageFolder,
        force_refresh: bool,
        notify: bool,
    ) -> BoxStream<'static, Resource<Vec<Message>>> {
        let source = MessageSource {
            api: self.api.clone(),
            dao: self.dao.clone(),
            student: student.clone(),
            mailbox: mailbox.cloned(),
            folder,
            notify,
        };
        network_bound_resource(
            Arc::new(source),
            self.gate.clone(),
            RefreshKey::for_mailbox(CACHE_KEY, student, mailbox, folder),
            force_refresh,
        )
    }

    pub async fn messages_from_store(
        &self,
        student: &Student,
        mailbox: Option<&Mailbox>,
        folder: MessageFolder,
    ) -> Result<Vec<Message>, SyncError> {
        self.dao.load(folder_rows(student, mailbox, folder)).await
    }

    pub async fn update_messages(&self, messages: &[Message]) -> Result<(), SyncError> {
        self.dao.update_all(messages).await
    }
}

fn folder_rows(
    student: &Student,
    mailbox: Option<&Mailbox>,
    folder: MessageFolder,
) -> RowFilter<Message> {
    let student_id = student.student_id;
    let mailbox_key = mailbox.map(|m| m.global_key.clone());
    let folder_id = folder.id();
    rows(move |message: &Message| {
        message.student_id == student_id
            && message.folder_id == folder_id
            && mailbox_key
                .as_ref()
                .map_or(true, |key| &message.mailbox_key == key)
    })
}

/// Cached messages whose server-side flags changed.
fn messages_to_update(old: &[Message], new: &[Message]) -> Vec<Message> {
    let fetched: HashMap<_, &Message> = new.iter().map(|m| (m.natural_key(), m)).collect();
    old.iter()
        .filter_map(|cached| {
            let fresh = fetched.get(&cached.natural_key())?;
            if fresh.unread == cached.unread && fresh.has_attachments == cached.has_attachments {
                return None;
            }
            Some(Message {
                unread: fresh.unread,
                has_attachments: fresh.has_attachments,
                ..cached.clone()
            })
        })
        .collect()
}

struct MessageSource {
    api: Arc<dyn SchoolApi>,
    dao: Arc<dyn Dao<Message>>,
    student: Student,
    mailbox: Option<Mailbox>,
    folder: MessageFolder,
    notify: bool,
}

#[async_trait]
impl BoundResource for MessageSource {
    type Output = Vec<Message>;
    type Fetched = Vec<Message>;

    async fn query(&self) -> Result<Vec<Message>, SyncError> {
        let filter = folder_rows(&self.student, self.mailbox.as_ref(), self.folder);
        self.dao.load(filter).await
    }

    async fn fetch(&self) -> Result<Vec<Message>, SyncError> {
        self.api
            .messages(&self.student, self.mailbox.as_ref(), self.folder)
            .await
    }

    async fn save_fetch_result(
        &self,
        old: Vec<Message>,
        new: Vec<Message>,
    ) -> Result<(), SyncError> {
        let plan = merge_plan(&old, &new);
        let mut added = plan.added;
        for message in &mut added {
            message.is_notified = !(self.notify && message.unread);
        }
        self.dao.replace(&plan.removed, added).await?;
        self.dao.update_all(&messages_to_update(&old, &new)).await
    }

    fn is_result_empty(&self, data: &Vec<Message>) -> bool {
        data.is_empty()
    }
}

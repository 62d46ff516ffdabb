//! crates/threadboard_core/src/counters/engine.rs
//!
//! The counter maintenance engine. Each handler reacts to one committed change
//! and writes back through the `DocumentStore` port: counters only move through
//! the store's atomic `increment`, and creation bookkeeping is written once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::counters::buckets::week_buckets;
use crate::counters::{flag, Outcome, TriggerEvent, TriggerKind};
use crate::domain::{
    collections, fields, DocPath, Fields, MembershipRole, Resource, VoteDirection, VoteTarget,
};
use crate::policy::predicates::{string_field, unchanged};
use crate::ports::{DocumentStore, PortResult};

/// Source of server-assigned timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Keeps aggregate counters in step with their edge subcollections and stamps
/// creation-time bookkeeping onto posts and comments.
#[derive(Clone)]
pub struct CounterEngine {
    store: Arc<dyn DocumentStore>,
    clock: Clock,
}

fn fields_of<const N: usize>(pairs: [(&str, Value); N]) -> Fields {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

impl CounterEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_clock(store, Arc::new(Utc::now))
    }

    pub fn with_clock(store: Arc<dyn DocumentStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    /// Routes one trigger event to its handler.
    pub async fn dispatch(&self, event: &TriggerEvent) -> PortResult<Outcome> {
        let path = &event.path;
        match (path.classify(), event.kind) {
            (Resource::Category { .. }, TriggerKind::Created) => self.on_category_created(path).await,

            (Resource::Membership { role, .. }, kind) => match (role, kind) {
                (MembershipRole::Subscriber, TriggerKind::Created) => {
                    self.on_subscriber_edge_created(path).await
                }
                (MembershipRole::Subscriber, TriggerKind::Deleted) => {
                    self.on_subscriber_edge_deleted(path).await
                }
                (MembershipRole::Moderator, TriggerKind::Created) => {
                    self.on_moderator_edge_created(path).await
                }
                (MembershipRole::Moderator, TriggerKind::Deleted) => {
                    self.on_moderator_edge_deleted(path).await
                }
                _ => Ok(Outcome::Ignored),
            },

            (Resource::Post { .. }, TriggerKind::Created) => {
                self.on_post_created(path, event.after.as_ref()).await
            }
            (Resource::Post { .. }, TriggerKind::Updated) => match (&event.before, &event.after) {
                (Some(before), Some(after)) => self.on_post_updated(path, before, after).await,
                _ => Ok(Outcome::Ignored),
            },

            (Resource::Comment { .. }, TriggerKind::Created) => {
                self.on_comment_created(path, event.after.as_ref()).await
            }
            (Resource::Comment { .. }, TriggerKind::Deleted) => self.on_comment_deleted(path).await,
            (Resource::Comment { .. }, TriggerKind::Updated) => {
                match (&event.before, &event.after) {
                    (Some(before), Some(after)) => {
                        self.on_comment_updated(path, before, after).await
                    }
                    _ => Ok(Outcome::Ignored),
                }
            }

            (Resource::Vote { target, direction, .. }, TriggerKind::Created) => match target {
                VoteTarget::Post { .. } => self.on_post_vote_created(path, direction).await,
                VoteTarget::Comment { .. } => self.on_comment_vote_created(path, direction).await,
            },
            (Resource::Vote { target, direction, .. }, TriggerKind::Deleted) => match target {
                VoteTarget::Post { .. } => self.on_post_vote_deleted(path, direction).await,
                VoteTarget::Comment { .. } => self.on_comment_vote_deleted(path, direction).await,
            },

            _ => Ok(Outcome::Ignored),
        }
    }

    //=====================================================================================
    // Counter Adjustments
    //=====================================================================================

    /// Adds `delta` to `field` on the document owning `edge`'s collection.
    async fn adjust_parent(&self, edge: &DocPath, field: &'static str, delta: i64) -> PortResult<Outcome> {
        let Some(parent) = edge.parent_document() else {
            return Ok(Outcome::Ignored);
        };
        match self.store.increment(&parent, field, delta).await? {
            Some(value) => {
                debug!(parent = %parent, field, delta, value, "counter adjusted");
                Ok(Outcome::Adjusted { field, value })
            }
            None => {
                debug!(parent = %parent, field, "parent document missing, skipping");
                Ok(Outcome::Missing)
            }
        }
    }

    pub async fn on_subscriber_edge_created(&self, edge: &DocPath) -> PortResult<Outcome> {
        self.adjust_parent(edge, fields::NUM_OF_SUBSCRIBERS, 1).await
    }

    pub async fn on_subscriber_edge_deleted(&self, edge: &DocPath) -> PortResult<Outcome> {
        self.adjust_parent(edge, fields::NUM_OF_SUBSCRIBERS, -1).await
    }

    pub async fn on_moderator_edge_created(&self, edge: &DocPath) -> PortResult<Outcome> {
        self.adjust_parent(edge, fields::NUM_OF_MODERATORS, 1).await
    }

    pub async fn on_moderator_edge_deleted(&self, edge: &DocPath) -> PortResult<Outcome> {
        self.adjust_parent(edge, fields::NUM_OF_MODERATORS, -1).await
    }

    pub async fn on_post_vote_created(&self, edge: &DocPath, direction: VoteDirection) -> PortResult<Outcome> {
        self.adjust_parent(edge, fields::RATING, direction.weight()).await
    }

    pub async fn on_post_vote_deleted(&self, edge: &DocPath, direction: VoteDirection) -> PortResult<Outcome> {
        self.adjust_parent(edge, fields::RATING, -direction.weight()).await
    }

    /// Adjusts the comment's own rating, never the root post's.
    pub async fn on_comment_vote_created(&self, edge: &DocPath, direction: VoteDirection) -> PortResult<Outcome> {
        self.adjust_parent(edge, fields::RATING, direction.weight()).await
    }

    pub async fn on_comment_vote_deleted(&self, edge: &DocPath, direction: VoteDirection) -> PortResult<Outcome> {
        self.adjust_parent(edge, fields::RATING, -direction.weight()).await
    }

    /// Decrements `numOfComments` on the immediate parent (post or comment).
    pub async fn on_comment_deleted(&self, comment: &DocPath) -> PortResult<Outcome> {
        self.adjust_parent(comment, fields::NUM_OF_COMMENTS, -1).await
    }

    //=====================================================================================
    // Creation and Update Bookkeeping
    //=====================================================================================

    /// Zeroes both membership counters. Values that are already present are
    /// left alone, so replays and late deliveries cannot reset a live count.
    pub async fn on_category_created(&self, category: &DocPath) -> PortResult<Outcome> {
        let init = fields_of([
            (fields::NUM_OF_SUBSCRIBERS, Value::from(0)),
            (fields::NUM_OF_MODERATORS, Value::from(0)),
        ]);
        if self.store.merge_absent(category, init.clone()).await? {
            Ok(Outcome::Stamped(init))
        } else {
            Ok(Outcome::Missing)
        }
    }

    async fn username_of(&self, author_id: Option<&str>) -> PortResult<Option<String>> {
        let Some(author_id) = author_id else {
            return Ok(None);
        };
        let user = self
            .store
            .get(&DocPath::doc(collections::USERS, author_id))
            .await?;
        Ok(user
            .as_ref()
            .and_then(|u| string_field(u, fields::USERNAME))
            .map(str::to_string))
    }

    async fn current_or_stored(&self, path: &DocPath, doc: Option<&Fields>) -> PortResult<Option<Fields>> {
        match doc {
            Some(doc) => Ok(Some(doc.clone())),
            None => self.store.get(path).await,
        }
    }

    fn now_ms(&self) -> i64 {
        (self.clock)().timestamp_millis()
    }

    /// Writes creation bookkeeping once. Keys already present are kept, so a
    /// replayed creation event cannot move the timestamp or clobber counters
    /// that increments reached first.
    async fn stamp(&self, path: &DocPath, stamp: Fields) -> PortResult<Outcome> {
        if !self.store.merge_absent(path, stamp.clone()).await? {
            debug!(path = %path, "document missing, skipping stamp");
            return Ok(Outcome::Missing);
        }
        Ok(Outcome::Stamped(stamp))
    }

    /// Denormalises the author's username and stamps timestamp, day buckets and
    /// zeroed counters.
    pub async fn on_post_created(&self, post: &DocPath, doc: Option<&Fields>) -> PortResult<Outcome> {
        let Some(doc) = self.current_or_stored(post, doc).await? else {
            return Ok(Outcome::Missing);
        };
        let now = self.now_ms();

        let mut stamp = fields_of([
            (fields::TIMESTAMP, Value::from(now)),
            (fields::WEEK_BUCKETS, Value::from(week_buckets(now))),
        ]);
        if let Some(username) = self.username_of(string_field(&doc, fields::AUTHOR_ID)).await? {
            stamp.insert(fields::AUTHOR_USERNAME.to_string(), Value::from(username));
        }
        stamp.extend(fields_of([
            (fields::EDITED, Value::Bool(false)),
            (fields::RATING, Value::from(0)),
            (fields::NUM_OF_COMMENTS, Value::from(0)),
        ]));
        self.stamp(post, stamp).await
    }

    /// Sets `edited` once title or body change, and recomputes the day buckets
    /// after an out-of-band timestamp correction.
    pub async fn on_post_updated(&self, post: &DocPath, before: &Fields, after: &Fields) -> PortResult<Outcome> {
        let mut patch = Fields::new();

        let content_changed = !unchanged(before, after, fields::TITLE) || !unchanged(before, after, fields::BODY);
        if content_changed && !flag(Some(after), fields::EDITED) {
            patch.insert(fields::EDITED.to_string(), Value::Bool(true));
        }

        let retimed = !unchanged(before, after, fields::TIMESTAMP) && unchanged(before, after, fields::RATING);
        if retimed {
            if let Some(timestamp) = after.get(fields::TIMESTAMP).and_then(Value::as_i64) {
                patch.insert(fields::WEEK_BUCKETS.to_string(), Value::from(week_buckets(timestamp)));
            }
        }

        if patch.is_empty() {
            return Ok(Outcome::Unchanged);
        }
        if self.store.merge(post, patch.clone()).await? {
            Ok(Outcome::Stamped(patch))
        } else {
            Ok(Outcome::Missing)
        }
    }

    /// Stamps the new comment and increments `numOfComments` on its immediate
    /// parent. The returned outcome is the parent counter's.
    pub async fn on_comment_created(&self, comment: &DocPath, doc: Option<&Fields>) -> PortResult<Outcome> {
        let Resource::Comment {
            post_id,
            comment_id,
            ..
        } = comment.classify()
        else {
            return Ok(Outcome::Ignored);
        };

        if let Some(doc) = self.current_or_stored(comment, doc).await? {
            let root = self.store.get(&DocPath::doc(collections::POSTS, &post_id)).await?;
            let now = self.now_ms();

            let mut stamp = fields_of([
                (fields::POST_ID, Value::from(post_id)),
                (fields::COMMENT_ID, Value::from(comment_id)),
                (fields::TIMESTAMP, Value::from(now)),
            ]);
            if let Some(category_id) = root.as_ref().and_then(|p| string_field(p, fields::CATEGORY_ID)) {
                stamp.insert(fields::CATEGORY_ID.to_string(), Value::from(category_id));
            }
            if let Some(username) = self.username_of(string_field(&doc, fields::AUTHOR_ID)).await? {
                stamp.insert(fields::AUTHOR_USERNAME.to_string(), Value::from(username));
            }
            stamp.extend(fields_of([
                (fields::RATING, Value::from(0)),
                (fields::EDITED, Value::Bool(false)),
                (fields::NUM_OF_COMMENTS, Value::from(0)),
                (fields::DELETED, Value::Bool(false)),
            ]));
            self.stamp(comment, stamp).await?;
        }

        self.adjust_parent(comment, fields::NUM_OF_COMMENTS, 1).await
    }

    pub async fn on_comment_updated(&self, comment: &DocPath, before: &Fields, after: &Fields) -> PortResult<Outcome> {
        if unchanged(before, after, fields::BODY) || flag(Some(after), fields::EDITED) {
            return Ok(Outcome::Unchanged);
        }
        let patch = fields_of([(fields::EDITED, Value::Bool(true))]);
        if self.store.merge(comment, patch.clone()).await? {
            Ok(Outcome::Stamped(patch))
        } else {
            Ok(Outcome::Missing)
        }
    }

    //=====================================================================================
    // Repair
    //=====================================================================================

    async fn count(&self, parent: &DocPath, collection: &str) -> PortResult<i64> {
        Ok(self.store.list(&parent.collection(collection)).await?.len() as i64)
    }

    /// Recounts an aggregate's counters from its live subcollections and writes
    /// the true values. Meant for quiescent documents: increments that land
    /// between the count and the write are overwritten.
    pub async fn reconcile(&self, aggregate: &DocPath) -> PortResult<Outcome> {
        let counts = match aggregate.classify() {
            Resource::Category { .. } => fields_of([
                (
                    fields::NUM_OF_SUBSCRIBERS,
                    Value::from(self.count(aggregate, collections::SUBSCRIBER_IDS).await?),
                ),
                (
                    fields::NUM_OF_MODERATORS,
                    Value::from(self.count(aggregate, collections::MODERATOR_IDS).await?),
                ),
            ]),
            Resource::Post { .. } | Resource::Comment { .. } => {
                let up = self.count(aggregate, collections::UP_VOTE_IDS).await?;
                let down = self.count(aggregate, collections::DOWN_VOTE_IDS).await?;
                let comments = self.count(aggregate, collections::COMMENTS).await?;
                fields_of([
                    (fields::RATING, Value::from(up - down)),
                    (fields::NUM_OF_COMMENTS, Value::from(comments)),
                ])
            }
            _ => return Ok(Outcome::Ignored),
        };

        if self.store.merge(aggregate, counts.clone()).await? {
            info!(path = %aggregate, counts = ?counts, "counters reconciled");
            Ok(Outcome::Stamped(counts))
        } else {
            Ok(Outcome::Missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::counters::buckets::DAY_MS;
    use crate::memory::InMemoryDocumentStore;

    fn path(raw: &str) -> DocPath {
        DocPath::parse(raw).unwrap()
    }

    fn fixed_engine(store: Arc<InMemoryDocumentStore>) -> CounterEngine {
        let at = Utc.timestamp_millis_opt(20_000 * DAY_MS + 1_234).unwrap();
        CounterEngine::with_clock(store, Arc::new(move || at))
    }

    fn to_fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    async fn get(store: &InMemoryDocumentStore, raw: &str) -> Fields {
        store.get(&path(raw)).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn category_init_is_idempotent() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = fixed_engine(store.clone());
        let category = path("categories/meditation");
        store
            .set(&category, to_fields(json!({"ownerId": "u1"})))
            .await
            .unwrap();

        engine.on_category_created(&category).await.unwrap();
        engine.on_category_created(&category).await.unwrap();
        let doc = get(&store, "categories/meditation").await;
        assert_eq!(doc["numOfSubscribers"], 0);
        assert_eq!(doc["numOfModerators"], 0);

        engine
            .on_subscriber_edge_created(&path("categories/meditation/subscriberIds/u2"))
            .await
            .unwrap();
        engine.on_category_created(&category).await.unwrap();
        assert_eq!(get(&store, "categories/meditation").await["numOfSubscribers"], 1);
    }

    #[tokio::test]
    async fn missing_parent_is_a_no_op() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = fixed_engine(store.clone());
        let outcome = engine
            .on_moderator_edge_created(&path("categories/gone/moderatorIds/u1"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Missing);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn vote_direction_policy() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = fixed_engine(store.clone());
        store
            .set(&path("posts/p1"), to_fields(json!({"rating": 0})))
            .await
            .unwrap();
        let up = path("posts/p1/upVoteIds/u1");
        let down = path("posts/p1/downVoteIds/u2");

        assert_eq!(engine.on_post_vote_created(&up, VoteDirection::Up).await.unwrap().value(), Some(1));
        assert_eq!(engine.on_post_vote_created(&down, VoteDirection::Down).await.unwrap().value(), Some(0));
        assert_eq!(engine.on_post_vote_deleted(&down, VoteDirection::Down).await.unwrap().value(), Some(1));
        assert_eq!(engine.on_post_vote_deleted(&up, VoteDirection::Up).await.unwrap().value(), Some(0));
    }

    #[tokio::test]
    async fn comment_votes_target_the_comment_itself() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = fixed_engine(store.clone());
        store.set(&path("posts/p1"), to_fields(json!({"rating": 0}))).await.unwrap();
        store
            .set(&path("posts/p1/comments/c1"), to_fields(json!({"rating": 0})))
            .await
            .unwrap();

        let event = TriggerEvent::created(
            path("posts/p1/comments/c1/downVoteIds/u3"),
            to_fields(json!({"uid": "u3", "commentId": "c1"})),
        );
        engine.dispatch(&event).await.unwrap();

        assert_eq!(get(&store, "posts/p1/comments/c1").await["rating"], -1);
        assert_eq!(get(&store, "posts/p1").await["rating"], 0);
    }

    #[tokio::test]
    async fn post_creation_stamps_bookkeeping() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = fixed_engine(store.clone());
        store
            .set(&path("users/u2"), to_fields(json!({"username": "ada"})))
            .await
            .unwrap();
        let post = to_fields(json!({
            "title": "My post", "body": "text", "authorId": "u2", "categoryId": "meditation"
        }));
        store.set(&path("posts/p1"), post.clone()).await.unwrap();

        engine
            .dispatch(&TriggerEvent::created(path("posts/p1"), post))
            .await
            .unwrap();

        let doc = get(&store, "posts/p1").await;
        assert_eq!(doc["authorUsername"], "ada");
        assert_eq!(doc["rating"], 0);
        assert_eq!(doc["numOfComments"], 0);
        assert_eq!(doc["edited"], false);
        assert_eq!(doc["timestamp"], 20_000 * DAY_MS + 1_234);
        assert_eq!(doc["weekBuckets"], json!([20_000, 20_001, 20_002, 20_003, 20_004, 20_005, 20_006]));
    }

    #[tokio::test]
    async fn replayed_creation_keeps_the_first_timestamp() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let ticks = Arc::new(std::sync::atomic::AtomicI64::new(20_000 * DAY_MS));
        let clock_ticks = ticks.clone();
        let engine = CounterEngine::with_clock(
            store.clone(),
            Arc::new(move || {
                let ms = clock_ticks.fetch_add(3 * DAY_MS, std::sync::atomic::Ordering::SeqCst);
                Utc.timestamp_millis_opt(ms).unwrap()
            }),
        );
        let post = to_fields(json!({"title": "Hello", "body": "", "authorId": "u2", "categoryId": "abc"}));
        store.set(&path("posts/p1"), post.clone()).await.unwrap();
        let comment = to_fields(json!({"body": "hi", "authorId": "u2"}));
        store.set(&path("posts/p1/comments/c1"), comment.clone()).await.unwrap();

        let created = TriggerEvent::created(path("posts/p1"), post);
        let commented = TriggerEvent::created(path("posts/p1/comments/c1"), comment);
        for _ in 0..2 {
            engine.dispatch(&created).await.unwrap();
            engine.dispatch(&commented).await.unwrap();
        }

        let doc = get(&store, "posts/p1").await;
        assert_eq!(doc["timestamp"], 20_000 * DAY_MS);
        assert_eq!(doc["weekBuckets"][0], 20_000);
        assert_eq!(get(&store, "posts/p1/comments/c1").await["timestamp"], 20_003 * DAY_MS);
    }

    #[tokio::test]
    async fn late_creation_stamp_keeps_early_votes() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = fixed_engine(store.clone());
        let post = to_fields(json!({"title": "Hello", "body": "", "authorId": "u2", "categoryId": "abc"}));
        store.set(&path("posts/p1"), post.clone()).await.unwrap();

        engine
            .on_post_vote_created(&path("posts/p1/upVoteIds/u3"), VoteDirection::Up)
            .await
            .unwrap();
        engine.on_post_created(&path("posts/p1"), Some(&post)).await.unwrap();

        assert_eq!(get(&store, "posts/p1").await["rating"], 1);
    }

    #[tokio::test]
    async fn edited_flag_is_monotonic() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = fixed_engine(store.clone());
        let p = path("posts/p1");
        let original = to_fields(json!({"title": "Hello", "body": "a", "edited": false, "rating": 0}));
        store.set(&p, original.clone()).await.unwrap();

        let mut changed = original.clone();
        changed.insert("body".into(), json!("b"));
        engine.on_post_updated(&p, &original, &changed).await.unwrap();
        assert_eq!(get(&store, "posts/p1").await["edited"], true);

        // Reverting the body never clears the flag.
        let current = get(&store, "posts/p1").await;
        let mut reverted = current.clone();
        reverted.insert("body".into(), json!("a"));
        let outcome = engine.on_post_updated(&p, &current, &reverted).await.unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(get(&store, "posts/p1").await["edited"], true);
    }

    #[tokio::test]
    async fn timestamp_correction_recomputes_buckets() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = fixed_engine(store.clone());
        let p = path("posts/p1");
        let before = to_fields(json!({"title": "Hello", "body": "a", "rating": 2, "timestamp": 0}));
        store.set(&p, before.clone()).await.unwrap();

        let mut after = before.clone();
        after.insert("timestamp".into(), json!(3 * DAY_MS));
        engine.on_post_updated(&p, &before, &after).await.unwrap();
        assert_eq!(get(&store, "posts/p1").await["weekBuckets"], json!([3, 4, 5, 6, 7, 8, 9]));

        // A concurrent rating change means this update came from the engine, not a correction.
        let mut rated = after.clone();
        rated.insert("rating".into(), json!(3));
        rated.insert("timestamp".into(), json!(9 * DAY_MS));
        assert_eq!(
            engine.on_post_updated(&p, &after, &rated).await.unwrap(),
            Outcome::Unchanged
        );
    }

    #[tokio::test]
    async fn comment_creation_stamps_and_counts_on_immediate_parent() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = fixed_engine(store.clone());
        store
            .set(&path("users/u3"), to_fields(json!({"username": "bob"})))
            .await
            .unwrap();
        store
            .set(&path("posts/p1"), to_fields(json!({"categoryId": "meditation", "numOfComments": 1})))
            .await
            .unwrap();
        store
            .set(&path("posts/p1/comments/c1"), to_fields(json!({"body": "top", "numOfComments": 0})))
            .await
            .unwrap();
        let reply = to_fields(json!({"body": "reply", "authorId": "u3"}));
        let reply_path = path("posts/p1/comments/c1/comments/c2");
        store.set(&reply_path, reply.clone()).await.unwrap();

        let outcome = engine
            .dispatch(&TriggerEvent::created(reply_path.clone(), reply.clone()))
            .await
            .unwrap();
        assert_eq!(outcome.value(), Some(1));

        let doc = get(&store, "posts/p1/comments/c1/comments/c2").await;
        assert_eq!(doc["authorUsername"], "bob");
        assert_eq!(doc["categoryId"], "meditation");
        assert_eq!(doc["postId"], "p1");
        assert_eq!(doc["commentId"], "c2");
        assert_eq!(doc["deleted"], false);
        assert_eq!(get(&store, "posts/p1/comments/c1").await["numOfComments"], 1);
        assert_eq!(get(&store, "posts/p1").await["numOfComments"], 1);

        let removed = store.delete(&reply_path).await.unwrap().unwrap();
        engine
            .dispatch(&TriggerEvent::deleted(reply_path, removed))
            .await
            .unwrap();
        assert_eq!(get(&store, "posts/p1/comments/c1").await["numOfComments"], 0);
    }

    #[tokio::test]
    async fn comment_body_edit_sets_edited() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = fixed_engine(store.clone());
        let c = path("posts/p1/comments/c1");
        let before = to_fields(json!({"body": "a", "edited": false, "deleted": false}));
        store.set(&c, before.clone()).await.unwrap();

        let mut soft_deleted = before.clone();
        soft_deleted.insert("deleted".into(), json!(true));
        assert_eq!(
            engine.on_comment_updated(&c, &before, &soft_deleted).await.unwrap(),
            Outcome::Unchanged
        );

        let mut edited = before.clone();
        edited.insert("body".into(), json!("b"));
        engine
            .dispatch(&TriggerEvent::updated(c.clone(), before, edited))
            .await
            .unwrap();
        assert_eq!(get(&store, "posts/p1/comments/c1").await["edited"], true);
    }

    #[tokio::test]
    async fn bans_do_not_touch_counters() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = fixed_engine(store.clone());
        let event = TriggerEvent::created(path("categories/abc/bannedIds/u2"), Fields::new());
        assert_eq!(engine.dispatch(&event).await.unwrap(), Outcome::Ignored);
    }

    #[tokio::test]
    async fn reconcile_repairs_drift() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = fixed_engine(store.clone());
        store
            .set(&path("posts/p1"), to_fields(json!({"rating": 17, "numOfComments": 9})))
            .await
            .unwrap();
        for raw in [
            "posts/p1/upVoteIds/u1",
            "posts/p1/upVoteIds/u2",
            "posts/p1/downVoteIds/u3",
            "posts/p1/comments/c1",
            "posts/p1/comments/c1/comments/c2",
        ] {
            store.set(&path(raw), Fields::new()).await.unwrap();
        }

        engine.reconcile(&path("posts/p1")).await.unwrap();
        let doc = get(&store, "posts/p1").await;
        assert_eq!(doc["rating"], 1);
        assert_eq!(doc["numOfComments"], 1);
    }
}

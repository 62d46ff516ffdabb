//! crates/threadboard_core/src/policy/ancestors.rs
//!
//! The snapshot of related documents a decision depends on, and the loader
//! that fetches it from a store before the (pure) policy runs.

use crate::domain::{collections, fields, DocPath, Fields, MembershipRole, Resource};
use crate::policy::predicates::string_field;
use crate::policy::{Operation, Request};
use crate::ports::{DocumentStore, PortResult};

/// The caller's membership edges in the governing category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Roles {
    pub subscriber: bool,
    pub moderator: bool,
    pub banned: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Ancestors {
    /// The governing category document.
    pub category: Option<Fields>,
    /// The root post, for comments.
    pub post: Option<Fields>,
    pub caller_roles: Roles,
    /// Whether the user named as the new `ownerId` of a category exists.
    pub new_owner_exists: bool,
    /// Whether the uid a new membership edge names is banned from the category.
    pub target_banned: bool,
}

impl Ancestors {
    pub fn owner_id(&self) -> Option<&str> {
        self.category
            .as_ref()
            .and_then(|c| string_field(c, fields::OWNER_ID))
    }

    pub fn is_owner(&self, uid: &str) -> bool {
        self.owner_id() == Some(uid)
    }

    /// Owner or moderator of the governing category.
    pub fn can_moderate(&self, uid: &str) -> bool {
        self.is_owner(uid) || self.caller_roles.moderator
    }

    /// Subscriber, moderator, or owner of the governing category.
    pub fn is_member(&self, uid: &str) -> bool {
        self.caller_roles.subscriber || self.can_moderate(uid)
    }

    /// Fetches everything `authorize` may consult for `request`.
    ///
    /// Reads need nothing. Writes resolve the governing category from the path,
    /// from the post being written, or from a comment's root post.
    pub async fn load<S>(store: &S, request: &Request) -> PortResult<Self>
    where
        S: DocumentStore + ?Sized,
    {
        let mut ancestors = Ancestors::default();
        if request.op == Operation::Read {
            return Ok(ancestors);
        }

        let resource = request.path.classify();
        let category_id: Option<String> = match &resource {
            Resource::Category { category_id } | Resource::Membership { category_id, .. } => {
                Some(category_id.clone())
            }
            Resource::Post { .. } => {
                let source = match request.op {
                    Operation::Create => request.proposed.as_ref(),
                    _ => request.existing.as_ref(),
                };
                source
                    .and_then(|doc| string_field(doc, fields::CATEGORY_ID))
                    .map(str::to_string)
            }
            Resource::Comment { post_id, .. } => {
                ancestors.post = store.get(&DocPath::doc(collections::POSTS, post_id)).await?;
                ancestors
                    .post
                    .as_ref()
                    .and_then(|doc| string_field(doc, fields::CATEGORY_ID))
                    .map(str::to_string)
            }
            _ => None,
        };

        if let Some(category_id) = category_id {
            let category_path = DocPath::doc(collections::CATEGORIES, &category_id);
            ancestors.category = store.get(&category_path).await?;

            if let Some(uid) = request.caller_uid() {
                let edge = |role: MembershipRole| category_path.child(role.collection(), uid);
                let subscriber_edge = edge(MembershipRole::Subscriber);
                let moderator_edge = edge(MembershipRole::Moderator);
                let banned_edge = edge(MembershipRole::Banned);
                let (subscriber, moderator, banned) = futures::try_join!(
                    store.exists(&subscriber_edge),
                    store.exists(&moderator_edge),
                    store.exists(&banned_edge),
                )?;
                ancestors.caller_roles = Roles {
                    subscriber,
                    moderator,
                    banned,
                };
            }
        }

        if let Resource::Membership { category_id, role, uid } = &resource {
            let grants_membership = matches!(role, MembershipRole::Subscriber | MembershipRole::Moderator);
            if grants_membership && request.op == Operation::Create {
                let banned_edge = DocPath::doc(collections::CATEGORIES, category_id)
                    .child(MembershipRole::Banned.collection(), uid);
                ancestors.target_banned = store.exists(&banned_edge).await?;
            }
        }

        if matches!(resource, Resource::Category { .. }) && request.op == Operation::Update {
            if let Some(owner) = request
                .proposed
                .as_ref()
                .and_then(|doc| string_field(doc, fields::OWNER_ID))
            {
                ancestors.new_owner_exists = store
                    .exists(&DocPath::doc(collections::USERS, owner))
                    .await?;
            }
        }

        Ok(ancestors)
    }
}

//! crates/threadboard_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application: document paths,
//! document bodies, the calling identity, and the classification of a path into
//! one of the resource kinds the platform knows about.
//! These types are independent of any database or transport.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ports::PortError;

/// A document body: a JSON object keyed by field name.
pub type Fields = serde_json::Map<String, Value>;

//=========================================================================================
// Collection and Field Names
//=========================================================================================

pub mod collections {
    pub const USERS: &str = "users";
    pub const CATEGORIES: &str = "categories";
    pub const POSTS: &str = "posts";
    pub const COMMENTS: &str = "comments";
    pub const SUBSCRIBER_IDS: &str = "subscriberIds";
    pub const MODERATOR_IDS: &str = "moderatorIds";
    pub const BANNED_IDS: &str = "bannedIds";
    pub const UP_VOTE_IDS: &str = "upVoteIds";
    pub const DOWN_VOTE_IDS: &str = "downVoteIds";
}

pub mod fields {
    pub const USERNAME: &str = "username";
    pub const OWNER_ID: &str = "ownerId";
    pub const NUM_OF_SUBSCRIBERS: &str = "numOfSubscribers";
    pub const NUM_OF_MODERATORS: &str = "numOfModerators";
    pub const UID: &str = "uid";
    pub const CATEGORY_ID: &str = "categoryId";
    pub const POST_ID: &str = "postId";
    pub const COMMENT_ID: &str = "commentId";
    pub const TITLE: &str = "title";
    pub const BODY: &str = "body";
    pub const AUTHOR_ID: &str = "authorId";
    pub const AUTHOR_USERNAME: &str = "authorUsername";
    pub const RATING: &str = "rating";
    pub const EDITED: &str = "edited";
    pub const NUM_OF_COMMENTS: &str = "numOfComments";
    pub const TIMESTAMP: &str = "timestamp";
    pub const WEEK_BUCKETS: &str = "weekBuckets";
    pub const DELETED: &str = "deleted";
}

//=========================================================================================
// Caller Identity
//=========================================================================================

/// The authenticated identity attached to an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub uid: String,
    pub email_verified: bool,
}

impl Caller {
    pub fn new(uid: impl Into<String>, email_verified: bool) -> Self {
        Self {
            uid: uid.into(),
            email_verified,
        }
    }
}

//=========================================================================================
// Document Paths
//=========================================================================================

/// A slash-separated path of `collection/id` segments.
///
/// An even number of segments addresses a document, an odd number addresses a
/// collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath(Vec<String>);

impl DocPath {
    pub fn parse(raw: &str) -> Result<Self, PortError> {
        let segments: Vec<String> = raw
            .trim_matches('/')
            .split('/')
            .map(str::to_string)
            .collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(PortError::InvalidPath(raw.to_string()));
        }
        Ok(Self(segments))
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_document(&self) -> bool {
        !self.0.is_empty() && self.0.len() % 2 == 0
    }

    /// The last segment: the document id for a document path.
    pub fn id(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// Name of the collection holding this document (or of this collection).
    pub fn collection_name(&self) -> &str {
        let idx = if self.is_document() {
            self.0.len() - 2
        } else {
            self.0.len().saturating_sub(1)
        };
        self.0.get(idx).map(String::as_str).unwrap_or_default()
    }

    /// The document that owns the collection this document lives in.
    pub fn parent_document(&self) -> Option<DocPath> {
        if !self.is_document() || self.0.len() < 4 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 2].to_vec()))
    }

    /// The collection this document lives in.
    pub fn parent_collection(&self) -> Option<DocPath> {
        if !self.is_document() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn child(&self, collection: &str, id: &str) -> DocPath {
        let mut segments = self.0.clone();
        segments.push(collection.to_string());
        segments.push(id.to_string());
        Self(segments)
    }

    pub fn collection(&self, collection: &str) -> DocPath {
        let mut segments = self.0.clone();
        segments.push(collection.to_string());
        Self(segments)
    }

    pub fn doc(collection: &str, id: &str) -> DocPath {
        Self(vec![collection.to_string(), id.to_string()])
    }

    /// Classifies this path into the resource kind it addresses.
    pub fn classify(&self) -> Resource {
        let s: Vec<&str> = self.0.iter().map(String::as_str).collect();
        if !self.is_document() {
            return Resource::Unknown;
        }

        match s.as_slice() {
            [collections::USERS, uid] => Resource::User {
                uid: uid.to_string(),
            },
            [collections::CATEGORIES, category_id] => Resource::Category {
                category_id: category_id.to_string(),
            },
            [collections::CATEGORIES, category_id, role, uid] => match MembershipRole::from_collection(role) {
                Some(role) => Resource::Membership {
                    category_id: category_id.to_string(),
                    role,
                    uid: uid.to_string(),
                },
                None => Resource::Unknown,
            },
            [collections::POSTS, post_id] => Resource::Post {
                post_id: post_id.to_string(),
            },
            [collections::POSTS, post_id, rest @ ..] => {
                let n = rest.len();
                if let Some(direction) = VoteDirection::from_collection(rest[n - 2]) {
                    let target_path = Self(self.0[..self.0.len() - 2].to_vec());
                    let target = match target_path.classify() {
                        Resource::Post { post_id } => VoteTarget::Post { post_id },
                        Resource::Comment {
                            post_id, comment_id, ..
                        } => VoteTarget::Comment {
                            post_id,
                            comment_id,
                        },
                        _ => return Resource::Unknown,
                    };
                    return Resource::Vote {
                        target,
                        target_path,
                        direction,
                        uid: rest[n - 1].to_string(),
                    };
                }
                if rest.iter().step_by(2).all(|c| *c == collections::COMMENTS) {
                    Resource::Comment {
                        post_id: post_id.to_string(),
                        comment_id: rest[n - 1].to_string(),
                        parent: Self(self.0[..self.0.len() - 2].to_vec()),
                    }
                } else {
                    Resource::Unknown
                }
            }
            _ => Resource::Unknown,
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

//=========================================================================================
// Resource Classification
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipRole {
    Subscriber,
    Moderator,
    Banned,
}

impl MembershipRole {
    pub fn collection(self) -> &'static str {
        match self {
            MembershipRole::Subscriber => collections::SUBSCRIBER_IDS,
            MembershipRole::Moderator => collections::MODERATOR_IDS,
            MembershipRole::Banned => collections::BANNED_IDS,
        }
    }

    pub fn from_collection(name: &str) -> Option<Self> {
        match name {
            collections::SUBSCRIBER_IDS => Some(MembershipRole::Subscriber),
            collections::MODERATOR_IDS => Some(MembershipRole::Moderator),
            collections::BANNED_IDS => Some(MembershipRole::Banned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn collection(self) -> &'static str {
        match self {
            VoteDirection::Up => collections::UP_VOTE_IDS,
            VoteDirection::Down => collections::DOWN_VOTE_IDS,
        }
    }

    pub fn from_collection(name: &str) -> Option<Self> {
        match name {
            collections::UP_VOTE_IDS => Some(VoteDirection::Up),
            collections::DOWN_VOTE_IDS => Some(VoteDirection::Down),
            _ => None,
        }
    }

    /// Rating delta contributed by an edge of this direction when it is created.
    pub fn weight(self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteTarget {
    Post { post_id: String },
    Comment { post_id: String, comment_id: String },
}

impl VoteTarget {
    /// Name of the back-reference field a vote edge on this target carries.
    pub fn reference_field(&self) -> &'static str {
        match self {
            VoteTarget::Post { .. } => fields::POST_ID,
            VoteTarget::Comment { .. } => fields::COMMENT_ID,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            VoteTarget::Post { post_id } => post_id,
            VoteTarget::Comment { comment_id, .. } => comment_id,
        }
    }
}

/// The kind of document a path addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    User {
        uid: String,
    },
    Category {
        category_id: String,
    },
    Membership {
        category_id: String,
        role: MembershipRole,
        uid: String,
    },
    Post {
        post_id: String,
    },
    /// A comment at any depth below a post. `parent` is the post or comment
    /// that directly owns the `comments` collection holding it.
    Comment {
        post_id: String,
        comment_id: String,
        parent: DocPath,
    },
    Vote {
        target: VoteTarget,
        target_path: DocPath,
        direction: VoteDirection,
        uid: String,
    },
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> DocPath {
        DocPath::parse(raw).unwrap()
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(DocPath::parse("posts//comments").is_err());
        assert!(DocPath::parse("").is_err());
    }

    #[test]
    fn classifies_top_level_documents() {
        assert_eq!(
            path("users/u1").classify(),
            Resource::User { uid: "u1".into() }
        );
        assert_eq!(
            path("/categories/meditation/").classify(),
            Resource::Category {
                category_id: "meditation".into()
            }
        );
        assert_eq!(path("unknown/x").classify(), Resource::Unknown);
        assert_eq!(path("categories").classify(), Resource::Unknown);
    }

    #[test]
    fn classifies_membership_edges() {
        assert_eq!(
            path("categories/c1/bannedIds/u2").classify(),
            Resource::Membership {
                category_id: "c1".into(),
                role: MembershipRole::Banned,
                uid: "u2".into(),
            }
        );
        assert_eq!(path("categories/c1/fans/u2").classify(), Resource::Unknown);
    }

    #[test]
    fn classifies_comments_at_any_depth() {
        match path("posts/p1/comments/c1/comments/c2/comments/c3").classify() {
            Resource::Comment {
                post_id,
                comment_id,
                parent,
            } => {
                assert_eq!(post_id, "p1");
                assert_eq!(comment_id, "c3");
                assert_eq!(parent, path("posts/p1/comments/c1/comments/c2"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            path("posts/p1/replies/c1").classify(),
            Resource::Unknown
        );
    }

    #[test]
    fn vote_edges_are_not_comments() {
        match path("posts/p1/comments/c1/upVoteIds/u3").classify() {
            Resource::Vote {
                target,
                target_path,
                direction,
                uid,
            } => {
                assert_eq!(
                    target,
                    VoteTarget::Comment {
                        post_id: "p1".into(),
                        comment_id: "c1".into()
                    }
                );
                assert_eq!(target_path, path("posts/p1/comments/c1"));
                assert_eq!(direction, VoteDirection::Up);
                assert_eq!(uid, "u3");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            path("posts/p1/downVoteIds/u3").classify(),
            Resource::Vote {
                target: VoteTarget::Post { .. },
                direction: VoteDirection::Down,
                ..
            }
        ));
    }

    #[test]
    fn parent_document_walks_two_segments_up() {
        let p = path("posts/p1/comments/c1");
        assert_eq!(p.parent_document(), Some(path("posts/p1")));
        assert_eq!(path("posts/p1").parent_document(), None);
        assert_eq!(p.collection_name(), "comments");
        assert_eq!(p.id(), "c1");
    }
}

//! crates/threadboard_core/src/policy/rules.rs
//!
//! Per-resource access rules. Reads never reach this module.

use crate::domain::{fields, Caller, Fields, MembershipRole, VoteTarget};
use crate::policy::predicates::{
    field_equals, fields_exactly, is_string, is_verified, non_empty_string, only_changed,
    string_field, string_longer_than, valid_category_id,
};
use crate::policy::{ensure, Ancestors, DenyReason, Operation, Request, RuleResult};

const POST_CREATE_FIELDS: [&str; 4] = [
    fields::TITLE,
    fields::BODY,
    fields::AUTHOR_ID,
    fields::CATEGORY_ID,
];
const POST_MUTABLE_FIELDS: [&str; 2] = [fields::TITLE, fields::BODY];
const COMMENT_MUTABLE_FIELDS: [&str; 2] = [fields::BODY, fields::DELETED];
const MIN_TITLE_LEN: usize = 3;

//=========================================================================================
// Shared Guards
//=========================================================================================

fn signed_in(request: &Request) -> Result<&Caller, DenyReason> {
    request.caller.as_ref().ok_or(DenyReason::Unauthenticated)
}

fn verified(request: &Request) -> Result<&Caller, DenyReason> {
    let caller = signed_in(request)?;
    ensure(is_verified(Some(caller)), DenyReason::Unverified)?;
    Ok(caller)
}

fn proposed(request: &Request) -> Result<&Fields, DenyReason> {
    request
        .proposed
        .as_ref()
        .ok_or(DenyReason::Invalid("missing document body"))
}

fn existing(request: &Request) -> Result<&Fields, DenyReason> {
    request
        .existing
        .as_ref()
        .ok_or(DenyReason::MissingAncestor("document"))
}

fn not_banned(ancestors: &Ancestors) -> RuleResult {
    ensure(!ancestors.caller_roles.banned, DenyReason::Banned)
}

/// A banned uid never holds a subscriber or moderator edge alongside the ban.
fn target_not_banned(ancestors: &Ancestors) -> RuleResult {
    ensure(!ancestors.target_banned, DenyReason::Banned)
}

//=========================================================================================
// Users
//=========================================================================================

pub(super) fn user(request: &Request, uid: &str) -> RuleResult {
    match request.op {
        Operation::Create | Operation::Update => {
            let caller = signed_in(request)?;
            ensure(caller.uid == uid, DenyReason::Forbidden("users may only write their own profile"))?;
            let doc = proposed(request)?;
            ensure(
                fields_exactly(doc, &[fields::USERNAME]),
                DenyReason::Invalid("user documents hold only a username"),
            )?;
            ensure(
                non_empty_string(doc, fields::USERNAME),
                DenyReason::Invalid("username must be a non-empty string"),
            )
        }
        op => Err(DenyReason::NoRule(op)),
    }
}

//=========================================================================================
// Categories
//=========================================================================================

pub(super) fn category(request: &Request, category_id: &str, ancestors: &Ancestors) -> RuleResult {
    match request.op {
        Operation::Create => {
            let caller = verified(request)?;
            ensure(
                valid_category_id(category_id),
                DenyReason::Invalid("category id must be 3+ lowercase alphanumerics"),
            )?;
            let doc = proposed(request)?;
            ensure(
                fields_exactly(doc, &[fields::OWNER_ID]),
                DenyReason::Invalid("a new category holds only its ownerId"),
            )?;
            ensure(
                field_equals(doc, fields::OWNER_ID, &caller.uid),
                DenyReason::Forbidden("categories are created by their owner"),
            )
        }
        Operation::Update => {
            let caller = verified(request)?;
            let before = existing(request)?;
            ensure(
                field_equals(before, fields::OWNER_ID, &caller.uid),
                DenyReason::Forbidden("only the owner may transfer a category"),
            )?;
            let after = proposed(request)?;
            ensure(
                only_changed(before, after, &[fields::OWNER_ID]),
                DenyReason::Invalid("only ownerId may change"),
            )?;
            ensure(
                is_string(after, fields::OWNER_ID),
                DenyReason::Invalid("ownerId must be a string"),
            )?;
            ensure(
                ancestors.new_owner_exists,
                DenyReason::MissingAncestor("new owner"),
            )
        }
        op => Err(DenyReason::NoRule(op)),
    }
}

//=========================================================================================
// Membership Edges
//=========================================================================================

pub(super) fn membership(
    request: &Request,
    category_id: &str,
    role: MembershipRole,
    uid: &str,
    ancestors: &Ancestors,
) -> RuleResult {
    match request.op {
        Operation::Create => {
            let caller = verified(request)?;
            let doc = proposed(request)?;
            ensure(
                fields_exactly(doc, &[fields::UID, fields::CATEGORY_ID]),
                DenyReason::Invalid("membership edges hold exactly uid and categoryId"),
            )?;
            ensure(
                field_equals(doc, fields::UID, uid),
                DenyReason::Invalid("edge id must equal its uid"),
            )?;
            ensure(
                field_equals(doc, fields::CATEGORY_ID, category_id),
                DenyReason::Invalid("categoryId must match the parent category"),
            )?;
            ensure(
                ancestors.category.is_some(),
                DenyReason::MissingAncestor("category"),
            )?;

            match role {
                MembershipRole::Subscriber => {
                    not_banned(ancestors)?;
                    target_not_banned(ancestors)
                }
                MembershipRole::Moderator => {
                    ensure(
                        ancestors.is_owner(&caller.uid),
                        DenyReason::Forbidden("only the owner appoints moderators"),
                    )?;
                    target_not_banned(ancestors)
                }
                MembershipRole::Banned => {
                    ensure(
                        ancestors.can_moderate(&caller.uid),
                        DenyReason::Forbidden("only the owner or a moderator may ban"),
                    )?;
                    ensure(
                        !ancestors.is_owner(uid),
                        DenyReason::Forbidden("the owner cannot be banned"),
                    )
                }
            }
        }
        Operation::Delete => {
            let caller = verified(request)?;
            let allowed = match role {
                MembershipRole::Subscriber => ancestors.can_moderate(&caller.uid) || caller.uid == uid,
                MembershipRole::Moderator => ancestors.is_owner(&caller.uid) || caller.uid == uid,
                MembershipRole::Banned => ancestors.can_moderate(&caller.uid),
            };
            ensure(allowed, DenyReason::Forbidden("caller may not remove this edge"))
        }
        op => Err(DenyReason::NoRule(op)),
    }
}

//=========================================================================================
// Posts
//=========================================================================================

fn post_content_valid(doc: &Fields) -> RuleResult {
    ensure(
        string_longer_than(doc, fields::TITLE, MIN_TITLE_LEN),
        DenyReason::Invalid("title must be a string longer than 3 characters"),
    )?;
    ensure(
        is_string(doc, fields::BODY),
        DenyReason::Invalid("body must be a string"),
    )
}

pub(super) fn post(request: &Request, ancestors: &Ancestors) -> RuleResult {
    match request.op {
        Operation::Create => {
            let caller = verified(request)?;
            let doc = proposed(request)?;
            ensure(
                fields_exactly(doc, &POST_CREATE_FIELDS),
                DenyReason::Invalid("posts are created with title, body, authorId and categoryId"),
            )?;
            ensure(
                field_equals(doc, fields::AUTHOR_ID, &caller.uid),
                DenyReason::Forbidden("authorId must be the caller"),
            )?;
            post_content_valid(doc)?;
            ensure(
                is_string(doc, fields::CATEGORY_ID),
                DenyReason::Invalid("categoryId must be a string"),
            )?;
            ensure(
                ancestors.category.is_some(),
                DenyReason::MissingAncestor("category"),
            )?;
            ensure(
                ancestors.is_member(&caller.uid),
                DenyReason::Forbidden("only members of the category may post"),
            )?;
            not_banned(ancestors)
        }
        Operation::Update => {
            let caller = verified(request)?;
            let before = existing(request)?;
            let after = proposed(request)?;
            ensure(
                only_changed(before, after, &POST_MUTABLE_FIELDS),
                DenyReason::Invalid("only title and body may change"),
            )?;
            post_content_valid(after)?;
            ensure(
                field_equals(before, fields::AUTHOR_ID, &caller.uid)
                    || ancestors.can_moderate(&caller.uid),
                DenyReason::Forbidden("only the author or a moderator may edit"),
            )?;
            not_banned(ancestors)
        }
        Operation::Delete => {
            let caller = signed_in(request)?;
            let before = existing(request)?;
            ensure(
                field_equals(before, fields::AUTHOR_ID, &caller.uid)
                    || ancestors.can_moderate(&caller.uid),
                DenyReason::Forbidden("only the author or a moderator may delete"),
            )?;
            not_banned(ancestors)
        }
        Operation::Read => Ok(()),
    }
}

//=========================================================================================
// Comments
//=========================================================================================

pub(super) fn comment(request: &Request, ancestors: &Ancestors) -> RuleResult {
    match request.op {
        Operation::Create => {
            let caller = verified(request)?;
            let doc = proposed(request)?;
            ensure(
                fields_exactly(doc, &[fields::BODY]),
                DenyReason::Invalid("comments are created with a body only"),
            )?;
            ensure(
                non_empty_string(doc, fields::BODY),
                DenyReason::Invalid("body must be a non-empty string"),
            )?;
            ensure(ancestors.post.is_some(), DenyReason::MissingAncestor("post"))?;
            ensure(
                ancestors.is_member(&caller.uid),
                DenyReason::Forbidden("only members of the category may comment"),
            )?;
            not_banned(ancestors)
        }
        Operation::Update => {
            let caller = verified(request)?;
            let before = existing(request)?;
            let after = proposed(request)?;
            ensure(
                only_changed(before, after, &COMMENT_MUTABLE_FIELDS),
                DenyReason::Invalid("only body may change"),
            )?;
            ensure(
                non_empty_string(after, fields::BODY),
                DenyReason::Invalid("body must be a non-empty string"),
            )?;
            // soft delete only ever sets the flag
            if before.get(fields::DELETED) != after.get(fields::DELETED) {
                ensure(
                    after.get(fields::DELETED).and_then(|v| v.as_bool()) == Some(true),
                    DenyReason::Invalid("deleted can only be set to true"),
                )?;
            }
            ensure(
                string_field(before, fields::AUTHOR_ID) == Some(caller.uid.as_str())
                    || ancestors.can_moderate(&caller.uid),
                DenyReason::Forbidden("only the author or a moderator may edit"),
            )?;
            not_banned(ancestors)
        }
        // Hard delete stays disabled; comments are soft-deleted through `deleted`.
        Operation::Delete => Err(DenyReason::NoRule(Operation::Delete)),
        Operation::Read => Ok(()),
    }
}

//=========================================================================================
// Vote Edges
//=========================================================================================

pub(super) fn vote(request: &Request, target: &VoteTarget, uid: &str) -> RuleResult {
    match request.op {
        Operation::Create => {
            let caller = verified(request)?;
            let doc = proposed(request)?;
            let reference = target.reference_field();
            ensure(
                fields_exactly(doc, &[fields::UID, reference]),
                DenyReason::Invalid("vote edges hold exactly uid and the target id"),
            )?;
            ensure(
                field_equals(doc, fields::UID, uid),
                DenyReason::Invalid("edge id must equal its uid"),
            )?;
            ensure(
                caller.uid == uid,
                DenyReason::Forbidden("users vote only as themselves"),
            )?;
            ensure(
                field_equals(doc, reference, target.id()),
                DenyReason::Invalid("target id must match the voted document"),
            )
        }
        Operation::Delete => {
            let caller = verified(request)?;
            ensure(
                caller.uid == uid,
                DenyReason::Forbidden("users remove only their own votes"),
            )
        }
        op => Err(DenyReason::NoRule(op)),
    }
}

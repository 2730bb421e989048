//! Membership tools, including direct-message lookup

use super::{
    check_name, clamp_limit, finish, normalize_user, parse_args, unknown_in_category,
    ChatContext, Envelope, ToolCategory, ToolError,
};
use crate::api::{items, ChatApi, ListMembersQuery, ListSpacesQuery};
use crate::protocol::ToolDefinition;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Number, Value};
use tracing::{debug, info};

const MAX_LIMIT: u32 = 100;

/// Filter selecting direct-message spaces in `spaces.list`
pub(crate) const DIRECT_MESSAGE_FILTER: &str = "spaceType = \"DIRECT_MESSAGE\"";

fn default_limit() -> Number {
    Number::from(25)
}

fn default_show_invited() -> bool {
    true
}

fn default_role_mask() -> String {
    "role".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum Role {
    #[default]
    RoleMember,
    RoleManager,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::RoleMember => "ROLE_MEMBER",
            Role::RoleManager => "ROLE_MANAGER",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListMembersArgs {
    #[serde(default)]
    space: Option<String>,
    #[serde(default = "default_limit")]
    limit: Number,
    #[serde(default)]
    show_groups: bool,
    #[serde(default = "default_show_invited")]
    show_invited: bool,
}

#[derive(Debug, Deserialize)]
struct MemberRef {
    member: String,
}

#[derive(Debug, Deserialize)]
struct CreateMembershipArgs {
    #[serde(default)]
    space: Option<String>,
    user: String,
    #[serde(default)]
    role: Role,
}

#[derive(Debug, Deserialize)]
struct UpdateMembershipArgs {
    member: String,
    role: Role,
    #[serde(default = "default_role_mask")]
    update_mask: String,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    user: String,
}

/// Whether a membership list contains `user_id` as a member
fn has_member(memberships: &[Value], user_id: &str) -> bool {
    memberships
        .iter()
        .any(|m| m.pointer("/member/name").and_then(Value::as_str) == Some(user_id))
}

/// First direct-message space whose members include `user_id`.
///
/// Spaces whose member listing fails are skipped.
async fn find_dm_space(client: &dyn ChatApi, user_id: &str) -> Result<Option<Value>, ToolError> {
    let query = ListSpacesQuery {
        page_size: None,
        filter: Some(DIRECT_MESSAGE_FILTER.to_string()),
    };
    let spaces = items(&client.list_spaces(&query).await?, "spaces");

    for space in spaces {
        let Some(name) = space.get("name").and_then(Value::as_str) else {
            continue;
        };
        let members = match client.list_members(name, &ListMembersQuery::default()).await {
            Ok(response) => items(&response, "memberships"),
            Err(e) => {
                debug!("Skipping {} during direct message lookup: {}", name, e);
                continue;
            }
        };
        if has_member(&members, user_id) {
            return Ok(Some(space));
        }
    }

    Ok(None)
}

/// Membership management tools
pub struct MemberTools {
    ctx: ChatContext,
}

impl MemberTools {
    pub fn new(ctx: ChatContext) -> Self {
        Self { ctx }
    }

    async fn list_members(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: ListMembersArgs = parse_args(args)?;
        let space = self.ctx.resolve_space(args.space)?;
        let client = self.ctx.client().await?;

        let query = ListMembersQuery {
            page_size: Some(clamp_limit(&args.limit, MAX_LIMIT)),
            show_groups: Some(args.show_groups),
            show_invited: Some(args.show_invited),
        };
        let members = items(&client.list_members(&space, &query).await?, "memberships");

        info!("Retrieved {} members from {}", members.len(), space);
        Ok(Envelope::success(json!({
            "count": members.len(),
            "members": members,
            "space": space,
        })))
    }

    async fn get_member(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: MemberRef = parse_args(args)?;
        check_name(&args.member, "member")?;
        let client = self.ctx.client().await?;

        let member = client.get_member(&args.member).await?;

        info!("Retrieved member details for {}", args.member);
        Ok(Envelope::success(json!({ "member": member })))
    }

    async fn create_membership(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: CreateMembershipArgs = parse_args(args)?;
        let space = self.ctx.resolve_space(args.space)?;
        let client = self.ctx.client().await?;

        let body = json!({
            "member": {
                "name": normalize_user(&args.user),
                "type": "HUMAN"
            },
            "role": args.role.as_str()
        });
        let membership = client.create_member(&space, &body).await?;

        info!("Added member {} to {}", args.user, space);
        Ok(Envelope::success(json!({
            "member_id": membership.get("name").cloned().unwrap_or(Value::Null),
            "membership": membership,
            "space": space,
        })))
    }

    async fn update_membership(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: UpdateMembershipArgs = parse_args(args)?;
        check_name(&args.member, "member")?;
        let client = self.ctx.client().await?;

        let body = json!({ "role": args.role.as_str() });
        let membership = client
            .patch_member(&args.member, &args.update_mask, &body)
            .await?;

        info!("Updated member {} role to {}", args.member, args.role.as_str());
        Ok(Envelope::success(json!({ "membership": membership })))
    }

    async fn delete_membership(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: MemberRef = parse_args(args)?;
        check_name(&args.member, "member")?;
        let client = self.ctx.client().await?;

        client.delete_member(&args.member).await?;

        info!("Removed member {}", args.member);
        Ok(Envelope::success(json!({
            "message": format!("Member {} removed successfully", args.member),
        })))
    }

    async fn find_direct_message(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: UserRef = parse_args(args)?;
        let user_id = normalize_user(&args.user);
        let client = self.ctx.client().await?;

        match find_dm_space(client.as_ref(), &user_id).await? {
            Some(space) => {
                let space_id = space.get("name").cloned().unwrap_or(Value::Null);
                info!("Found existing DM space with {}: {}", args.user, space_id);
                Ok(Envelope::success(json!({
                    "space": space,
                    "space_id": space_id,
                    "existing": true,
                })))
            }
            None => {
                info!("No existing DM space found with {}", args.user);
                Ok(Envelope::unsuccessful(json!({
                    "message": format!(
                        "No direct message space found with {}. Send a message to create one.",
                        args.user
                    ),
                    "user": user_id,
                })))
            }
        }
    }
}

#[async_trait]
impl ToolCategory for MemberTools {
    fn category(&self) -> &'static str {
        "member"
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        let member_name = json!({
            "type": "string",
            "description": "Full member name (e.g., 'spaces/AAAA1234567/members/xyz')"
        });

        vec![
            ToolDefinition::new(
                "list_members",
                "List members in a Google Chat space",
                json!({
                    "type": "object",
                    "properties": {
                        "space": super::space_property(),
                        "limit": super::limit_property("members", 25, MAX_LIMIT),
                        "show_groups": {
                            "type": "boolean",
                            "description": "Whether to include group memberships",
                            "default": false
                        },
                        "show_invited": {
                            "type": "boolean",
                            "description": "Whether to include invited but not joined members",
                            "default": true
                        }
                    }
                }),
            ),
            ToolDefinition::new(
                "get_member",
                "Get details about a specific member in a space",
                json!({
                    "type": "object",
                    "properties": { "member": member_name },
                    "required": ["member"]
                }),
            ),
            ToolDefinition::new(
                "create_membership",
                "Add a member to a Google Chat space",
                json!({
                    "type": "object",
                    "properties": {
                        "space": super::space_property(),
                        "user": {
                            "type": "string",
                            "description": "User to add (email address or user ID)"
                        },
                        "role": {
                            "type": "string",
                            "description": "Member role in the space",
                            "enum": ["ROLE_MEMBER", "ROLE_MANAGER"],
                            "default": "ROLE_MEMBER"
                        }
                    },
                    "required": ["user"]
                }),
            ),
            ToolDefinition::new(
                "update_membership",
                "Update a member's role in a space",
                json!({
                    "type": "object",
                    "properties": {
                        "member": member_name,
                        "role": {
                            "type": "string",
                            "description": "New role for the member",
                            "enum": ["ROLE_MEMBER", "ROLE_MANAGER"]
                        },
                        "update_mask": {
                            "type": "string",
                            "description": "Fields to update (default: 'role')",
                            "default": "role"
                        }
                    },
                    "required": ["member", "role"]
                }),
            ),
            ToolDefinition::new(
                "delete_membership",
                "Remove a member from a Google Chat space",
                json!({
                    "type": "object",
                    "properties": { "member": member_name },
                    "required": ["member"]
                }),
            ),
            ToolDefinition::new(
                "find_direct_message",
                "Find an existing direct message space with a user",
                json!({
                    "type": "object",
                    "properties": {
                        "user": {
                            "type": "string",
                            "description": "User to find DM with (email address or user ID)"
                        }
                    },
                    "required": ["user"]
                }),
            ),
        ]
    }

    async fn execute(&self, tool: &str, args: Value) -> Envelope {
        let result = match tool {
            "list_members" => self.list_members(args).await,
            "get_member" => self.get_member(args).await,
            "create_membership" => self.create_membership(args).await,
            "update_membership" => self.update_membership(args).await,
            "delete_membership" => self.delete_membership(args).await,
            "find_direct_message" => self.find_direct_message(args).await,
            _ => return unknown_in_category(self.category(), tool),
        };
        finish(tool, result)
    }
}

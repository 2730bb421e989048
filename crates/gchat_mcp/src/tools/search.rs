//! Search tools
//!
//! The Chat API has no server-side full-text search. Message and member
//! search therefore pull bounded pages (from one space, or from the first
//! [`CROSS_SPACE_LIMIT`] spaces) and match case-insensitively on the client.
//! Spaces that refuse a listing are skipped during cross-space scans.
//!
//! Message matches are sorted by creation time across all scanned spaces.
//! "relevance" ordering is accepted but there is no ranking: it falls back to
//! newest first and the response says so in `ranking_note`.

use super::{
    check_name, clamp_limit, finish, parse_args, unknown_in_category, ChatContext, Envelope,
    ToolCategory, ToolError,
};
use crate::api::{items, ChatApi, ListMembersQuery, ListMessagesQuery, ListSpacesQuery};
use crate::protocol::ToolDefinition;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use std::cmp::Ordering;
use tracing::{debug, info};

const MAX_LIMIT: u32 = 100;
const MAX_ACTIVITY_LIMIT: u32 = 200;
const MAX_HOURS: u32 = 168;

/// Spaces scanned when no space is given
const CROSS_SPACE_LIMIT: u32 = 50;
/// Messages fetched per space in a cross-space message search
const MESSAGES_PER_SPACE: u32 = 20;
/// Members fetched per space in a cross-space member search
const MEMBERS_PER_SPACE: u32 = 50;
/// Members fetched for a single-space member search
const MEMBERS_SINGLE_SPACE: u32 = 100;
/// Spaces listed by search_spaces before matching
const SPACES_SCANNED: u32 = 100;
/// Upper bound on messages fetched per space for recent activity
const ACTIVITY_PAGE_LIMIT: u32 = 50;

const NEWEST_FIRST: &str = "createTime desc";
const RANKING_NOTE: &str =
    "Relevance ranking is not implemented; matches are returned in recency order.";

fn default_limit() -> Number {
    Number::from(25)
}

fn default_activity_limit() -> Number {
    Number::from(50)
}

fn default_hours() -> Number {
    Number::from(24)
}

fn default_activity_types() -> Vec<String> {
    vec!["MESSAGE".to_string()]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
enum SearchOrder {
    #[default]
    #[serde(rename = "relevance")]
    Relevance,
    #[serde(rename = "create_time desc")]
    NewestFirst,
    #[serde(rename = "create_time")]
    OldestFirst,
}

impl SearchOrder {
    fn label(self) -> &'static str {
        match self {
            SearchOrder::Relevance => "relevance",
            SearchOrder::NewestFirst => "create_time desc",
            SearchOrder::OldestFirst => "create_time",
        }
    }

    fn as_api(self) -> &'static str {
        match self {
            SearchOrder::Relevance | SearchOrder::NewestFirst => NEWEST_FIRST,
            SearchOrder::OldestFirst => "createTime asc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum SpaceType {
    Space,
    GroupChat,
    DirectMessage,
}

impl SpaceType {
    fn as_str(self) -> &'static str {
        match self {
            SpaceType::Space => "SPACE",
            SpaceType::GroupChat => "GROUP_CHAT",
            SpaceType::DirectMessage => "DIRECT_MESSAGE",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchMessagesArgs {
    query: String,
    #[serde(default)]
    space: Option<String>,
    #[serde(default = "default_limit")]
    limit: Number,
    #[serde(default)]
    order_by: SearchOrder,
}

#[derive(Debug, Deserialize)]
struct SearchSpacesArgs {
    query: String,
    #[serde(default)]
    space_type: Option<SpaceType>,
    #[serde(default = "default_limit")]
    limit: Number,
}

#[derive(Debug, Deserialize)]
struct SearchMembersArgs {
    query: String,
    #[serde(default)]
    space: Option<String>,
    #[serde(default = "default_limit")]
    limit: Number,
}

#[derive(Debug, Deserialize)]
struct RecentActivityArgs {
    #[serde(default)]
    space: Option<String>,
    #[serde(default = "default_hours")]
    hours: Number,
    #[serde(default = "default_activity_limit")]
    limit: Number,
    #[serde(default = "default_activity_types")]
    activity_types: Vec<String>,
}

/// Optional search scope; blank means every accessible space
fn scope(space: Option<String>) -> Result<Option<String>, ToolError> {
    let space = space.filter(|v| !v.trim().is_empty());
    if let Some(ref name) = space {
        check_name(name, "space")?;
    }
    Ok(space)
}

fn str_field<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn message_matches(message: &Value, needle: &str) -> bool {
    contains_folded(str_field(message, "/text"), needle)
}

fn space_matches(space: &Value, needle: &str) -> bool {
    contains_folded(str_field(space, "/displayName"), needle)
        || contains_folded(str_field(space, "/spaceDetails/description"), needle)
        || contains_folded(str_field(space, "/name"), needle)
}

fn member_matches(membership: &Value, needle: &str) -> bool {
    let domain_id = match membership.pointer("/member/domainId") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    contains_folded(str_field(membership, "/member/displayName"), needle)
        || contains_folded(str_field(membership, "/member/name"), needle)
        || contains_folded(&domain_id, needle)
}

fn tag(mut item: Value, key: &str, value: Value) -> Value {
    if let Value::Object(ref mut map) = item {
        map.insert(key.to_string(), value);
    }
    item
}

/// Keep messages created at or after `threshold`, newest first, at most
/// `limit` of them.
///
/// `batches` pairs each space descriptor with the messages fetched from it.
/// Messages without a parseable RFC 3339 `createTime` are dropped.
pub(crate) fn collect_recent(
    batches: Vec<(Value, Vec<Value>)>,
    threshold: DateTime<Utc>,
    limit: usize,
) -> Vec<Value> {
    let mut kept: Vec<(DateTime<Utc>, Value)> = Vec::new();

    for (space_info, messages) in batches {
        let space_name = space_info.get("name").cloned().unwrap_or(Value::Null);
        for message in messages {
            let raw = str_field(&message, "/createTime").to_string();
            let Ok(created) = DateTime::parse_from_rfc3339(&raw) else {
                continue;
            };
            let created = created.with_timezone(&Utc);
            if created < threshold {
                continue;
            }
            kept.push((
                created,
                json!({
                    "type": "MESSAGE",
                    "timestamp": raw,
                    "space": space_name,
                    "space_info": space_info,
                    "data": message,
                }),
            ));
        }
    }

    kept.sort_by(|a, b| b.0.cmp(&a.0));
    kept.into_iter().take(limit).map(|(_, v)| v).collect()
}

/// Order messages by `createTime`, newest first unless `order` asks for
/// oldest first. Messages without a parseable time sort last.
fn sort_by_create_time(messages: &mut [Value], order: SearchOrder) {
    let created = |m: &Value| DateTime::parse_from_rfc3339(str_field(m, "/createTime")).ok();
    messages.sort_by(|a, b| match (created(a), created(b)) {
        (Some(x), Some(y)) if order == SearchOrder::OldestFirst => x.cmp(&y),
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Spaces scanned by the cross-space tools
async fn scan_spaces(client: &dyn ChatApi) -> Result<Vec<Value>, ToolError> {
    let query = ListSpacesQuery {
        page_size: Some(CROSS_SPACE_LIMIT),
        filter: None,
    };
    Ok(items(&client.list_spaces(&query).await?, "spaces"))
}

fn space_name(space: &Value) -> Option<&str> {
    space.get("name").and_then(Value::as_str)
}

/// Search and activity tools
pub struct SearchTools {
    ctx: ChatContext,
}

impl SearchTools {
    pub fn new(ctx: ChatContext) -> Self {
        Self { ctx }
    }

    async fn search_messages(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: SearchMessagesArgs = parse_args(args)?;
        let limit = clamp_limit(&args.limit, MAX_LIMIT);
        let space = scope(args.space)?;
        let needle = args.query.to_lowercase();
        let client = self.ctx.client().await?;

        let mut candidates = match space {
            Some(ref space) => {
                let query = ListMessagesQuery {
                    page_size: Some(limit),
                    order_by: Some(args.order_by.as_api().to_string()),
                };
                items(&client.list_messages(space, &query).await?, "messages")
            }
            None => {
                let mut all = Vec::new();
                for space_info in scan_spaces(client.as_ref()).await? {
                    let Some(name) = space_name(&space_info) else {
                        continue;
                    };
                    let query = ListMessagesQuery {
                        page_size: Some(MESSAGES_PER_SPACE),
                        order_by: Some(args.order_by.as_api().to_string()),
                    };
                    match client.list_messages(name, &query).await {
                        Ok(response) => all.extend(
                            items(&response, "messages")
                                .into_iter()
                                .map(|m| tag(m, "_space_info", space_info.clone())),
                        ),
                        Err(e) => debug!("Skipping {} during message search: {}", name, e),
                    }
                }
                all
            }
        };

        sort_by_create_time(&mut candidates, args.order_by);
        let matches: Vec<Value> = candidates
            .into_iter()
            .filter(|m| message_matches(m, &needle))
            .take(limit as usize)
            .collect();

        info!("Found {} messages matching '{}'", matches.len(), args.query);
        let mut payload = Map::new();
        payload.insert("count".into(), json!(matches.len()));
        payload.insert("messages".into(), Value::Array(matches));
        payload.insert("query".into(), json!(args.query));
        payload.insert("space".into(), json!(space));
        payload.insert("order_by".into(), json!(args.order_by.label()));
        if args.order_by == SearchOrder::Relevance {
            payload.insert("ranking_note".into(), json!(RANKING_NOTE));
        }
        Ok(Envelope::Success(payload))
    }

    async fn search_spaces(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: SearchSpacesArgs = parse_args(args)?;
        let limit = clamp_limit(&args.limit, MAX_LIMIT) as usize;
        let needle = args.query.to_lowercase();
        let client = self.ctx.client().await?;

        let query = ListSpacesQuery {
            page_size: Some(SPACES_SCANNED),
            filter: args
                .space_type
                .map(|t| format!("spaceType = \"{}\"", t.as_str())),
        };
        let matches: Vec<Value> = items(&client.list_spaces(&query).await?, "spaces")
            .into_iter()
            .filter(|s| space_matches(s, &needle))
            .take(limit)
            .collect();

        info!("Found {} spaces matching '{}'", matches.len(), args.query);
        Ok(Envelope::success(json!({
            "count": matches.len(),
            "spaces": matches,
            "query": args.query,
            "space_type": args.space_type.map(SpaceType::as_str),
        })))
    }

    async fn search_members(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: SearchMembersArgs = parse_args(args)?;
        let limit = clamp_limit(&args.limit, MAX_LIMIT) as usize;
        let space = scope(args.space)?;
        let needle = args.query.to_lowercase();
        let client = self.ctx.client().await?;

        let candidates = match space {
            Some(ref space) => {
                let query = ListMembersQuery {
                    page_size: Some(MEMBERS_SINGLE_SPACE),
                    ..Default::default()
                };
                items(&client.list_members(space, &query).await?, "memberships")
                    .into_iter()
                    .map(|m| tag(m, "_space", json!(space)))
                    .collect()
            }
            None => {
                let mut all = Vec::new();
                for space_info in scan_spaces(client.as_ref()).await? {
                    let Some(name) = space_name(&space_info) else {
                        continue;
                    };
                    let query = ListMembersQuery {
                        page_size: Some(MEMBERS_PER_SPACE),
                        ..Default::default()
                    };
                    match client.list_members(name, &query).await {
                        Ok(response) => all.extend(
                            items(&response, "memberships").into_iter().map(|m| {
                                tag(
                                    tag(m, "_space", json!(name)),
                                    "_space_info",
                                    space_info.clone(),
                                )
                            }),
                        ),
                        Err(e) => debug!("Skipping {} during member search: {}", name, e),
                    }
                }
                all
            }
        };

        let matches: Vec<Value> = candidates
            .into_iter()
            .filter(|m| member_matches(m, &needle))
            .take(limit)
            .collect();

        info!("Found {} members matching '{}'", matches.len(), args.query);
        Ok(Envelope::success(json!({
            "count": matches.len(),
            "members": matches,
            "query": args.query,
            "space": space,
        })))
    }

    async fn get_recent_activity(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: RecentActivityArgs = parse_args(args)?;
        let hours = clamp_limit(&args.hours, MAX_HOURS);
        let limit = clamp_limit(&args.limit, MAX_ACTIVITY_LIMIT);
        let space = scope(args.space)?;
        let threshold = Utc::now() - Duration::hours(i64::from(hours));
        let client = self.ctx.client().await?;

        let spaces = match space {
            Some(ref name) => vec![json!({ "name": name })],
            None => scan_spaces(client.as_ref()).await?,
        };

        let mut batches = Vec::new();
        if args.activity_types.iter().any(|t| t == "MESSAGE") {
            let query = ListMessagesQuery {
                page_size: Some(limit.min(ACTIVITY_PAGE_LIMIT)),
                order_by: Some(NEWEST_FIRST.to_string()),
            };
            for space_info in spaces {
                let Some(name) = space_name(&space_info).map(str::to_string) else {
                    continue;
                };
                match client.list_messages(&name, &query).await {
                    Ok(response) => batches.push((space_info, items(&response, "messages"))),
                    Err(e) => debug!("Skipping {} during activity scan: {}", name, e),
                }
            }
        }

        let activities = collect_recent(batches, threshold, limit as usize);

        info!("Found {} recent activities", activities.len());
        Ok(Envelope::success(json!({
            "count": activities.len(),
            "activities": activities,
            "hours": hours,
            "activity_types": args.activity_types,
            "space": space,
        })))
    }
}

#[async_trait]
impl ToolCategory for SearchTools {
    fn category(&self) -> &'static str {
        "search"
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        let scope = json!({
            "type": "string",
            "description": "Space to search in (e.g., 'spaces/AAAA1234567'); omit to search all accessible spaces"
        });

        vec![
            ToolDefinition::new(
                "search_messages",
                "Search for messages containing text, in one space or across accessible spaces",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Text to look for (case-insensitive)"
                        },
                        "space": scope,
                        "limit": super::limit_property("messages", 25, MAX_LIMIT),
                        "order_by": {
                            "type": "string",
                            "description": "Result order; 'relevance' falls back to newest first",
                            "enum": ["create_time desc", "create_time", "relevance"],
                            "default": "relevance"
                        }
                    },
                    "required": ["query"]
                }),
            ),
            ToolDefinition::new(
                "search_spaces",
                "Search for spaces by name or description",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Text to match against space names and descriptions"
                        },
                        "space_type": {
                            "type": "string",
                            "description": "Only return spaces of this type",
                            "enum": ["SPACE", "GROUP_CHAT", "DIRECT_MESSAGE"]
                        },
                        "limit": super::limit_property("spaces", 25, MAX_LIMIT)
                    },
                    "required": ["query"]
                }),
            ),
            ToolDefinition::new(
                "search_members",
                "Search for members by name or user ID",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Text to match against member names and IDs"
                        },
                        "space": scope,
                        "limit": super::limit_property("members", 25, MAX_LIMIT)
                    },
                    "required": ["query"]
                }),
            ),
            ToolDefinition::new(
                "get_recent_activity",
                "Get recent message activity, newest first",
                json!({
                    "type": "object",
                    "properties": {
                        "space": scope,
                        "hours": {
                            "type": "integer",
                            "description": "How many hours back to look (default: 24, max: 168)",
                            "minimum": 1,
                            "maximum": MAX_HOURS,
                            "default": 24
                        },
                        "limit": super::limit_property("activities", 50, MAX_ACTIVITY_LIMIT),
                        "activity_types": {
                            "type": "array",
                            "description": "Activity types to include (only MESSAGE is supported)",
                            "items": {"type": "string", "enum": ["MESSAGE"]},
                            "default": ["MESSAGE"]
                        }
                    }
                }),
            ),
        ]
    }

    async fn execute(&self, tool: &str, args: Value) -> Envelope {
        let result = match tool {
            "search_messages" => self.search_messages(args).await,
            "search_spaces" => self.search_spaces(args).await,
            "search_members" => self.search_members(args).await,
            "get_recent_activity" => self.get_recent_activity(args).await,
            _ => return unknown_in_category(self.category(), tool),
        };
        finish(tool, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{context, FakeChat};
    use std::sync::Arc;

    fn tools(chat: FakeChat) -> (SearchTools, Arc<FakeChat>) {
        let chat = Arc::new(chat);
        (SearchTools::new(context(chat.clone(), Some("spaces/DEF"))), chat)
    }

    fn message(name: &str, text: &str, created: DateTime<Utc>) -> Value {
        json!({
            "name": name,
            "text": text,
            "createTime": created.to_rfc3339(),
        })
    }

    #[test]
    fn test_collect_recent_filters_and_sorts() {
        let now = Utc::now();
        let batches = vec![
            (
                json!({"name": "spaces/B"}),
                vec![
                    message("spaces/B/messages/old", "old", now - Duration::hours(30)),
                    message("spaces/B/messages/2h", "b", now - Duration::hours(2)),
                ],
            ),
            (
                json!({"name": "spaces/A"}),
                vec![
                    message("spaces/A/messages/1h", "a", now - Duration::hours(1)),
                    json!({"name": "spaces/A/messages/bad", "createTime": "yesterday"}),
                    json!({"name": "spaces/A/messages/none"}),
                ],
            ),
        ];

        let kept = collect_recent(batches, now - Duration::hours(24), 10);

        let names: Vec<&str> = kept
            .iter()
            .map(|a| a["data"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["spaces/A/messages/1h", "spaces/B/messages/2h"]);
        assert_eq!(kept[0]["space"], "spaces/A");
        assert_eq!(kept[0]["type"], "MESSAGE");
    }

    #[test]
    fn test_collect_recent_truncates() {
        let now = Utc::now();
        let messages = (0..5)
            .map(|i| message(&format!("m{}", i), "x", now - Duration::minutes(i)))
            .collect();
        let kept = collect_recent(
            vec![(json!({"name": "spaces/A"}), messages)],
            now - Duration::hours(1),
            2,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0]["data"]["name"], "m0");
    }

    fn two_space_chat() -> FakeChat {
        let older = "2024-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let newer = "2025-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        FakeChat::default()
            .with_space(json!({"name": "spaces/A"}))
            .with_space(json!({"name": "spaces/B"}))
            .with_messages("spaces/A", vec![message("a1", "release notes", older)])
            .with_messages("spaces/B", vec![message("b1", "release done", newer)])
    }

    #[tokio::test]
    async fn test_search_messages_across_spaces_orders_by_time() {
        let cases = [
            ("relevance", vec!["b1", "a1"]),
            ("create_time desc", vec!["b1", "a1"]),
            ("create_time", vec!["a1", "b1"]),
        ];
        for (order_by, expected) in cases {
            let (tools, _) = tools(two_space_chat());
            let envelope = tools
                .execute(
                    "search_messages",
                    json!({"query": "release", "order_by": order_by}),
                )
                .await;

            let names: Vec<&str> = envelope
                .get("messages")
                .and_then(Value::as_array)
                .unwrap()
                .iter()
                .map(|m| m["name"].as_str().unwrap())
                .collect();
            assert_eq!(names, expected, "order_by {}", order_by);
        }
    }

    #[tokio::test]
    async fn test_search_messages_truncates_after_ordering() {
        let (tools, _) = tools(two_space_chat());
        let envelope = tools
            .execute("search_messages", json!({"query": "release", "limit": 1}))
            .await;

        assert_eq!(envelope.get("count"), Some(&json!(1)));
        assert_eq!(envelope.get("messages").unwrap()[0]["name"], "b1");
    }

    #[test]
    fn test_member_matching() {
        let member = json!({
            "member": {"name": "users/42", "displayName": "Ada Lovelace", "domainId": 77}
        });
        assert!(member_matches(&member, "lovelace"));
        assert!(member_matches(&member, "users/42"));
        assert!(member_matches(&member, "77"));
        assert!(!member_matches(&member, "babbage"));
    }

    #[tokio::test]
    async fn test_search_messages_across_spaces_skips_failures() {
        let now = Utc::now();
        let chat = FakeChat::default()
            .with_space(json!({"name": "spaces/A", "displayName": "Alpha"}))
            .with_space(json!({"name": "spaces/B", "displayName": "Beta"}))
            .with_space(json!({"name": "spaces/C", "displayName": "Gamma"}))
            .failing("spaces/B", 403)
            .with_messages(
                "spaces/A",
                vec![
                    message("spaces/A/messages/1", "Deploy FAILED", now),
                    message("spaces/A/messages/2", "lunch?", now),
                ],
            )
            .with_messages(
                "spaces/C",
                vec![message("spaces/C/messages/1", "deploy ok", now)],
            );
        let (tools, chat) = tools(chat);

        let envelope = tools
            .execute("search_messages", json!({"query": "deploy"}))
            .await;

        assert_eq!(envelope.get("count"), Some(&json!(2)));
        assert_eq!(envelope.get("space"), Some(&Value::Null));
        assert_eq!(envelope.get("order_by"), Some(&json!("relevance")));
        assert!(envelope.get("ranking_note").is_some());

        let messages = envelope.get("messages").unwrap().as_array().unwrap();
        assert_eq!(messages[0]["_space_info"]["displayName"], "Alpha");

        let calls = chat.calls();
        assert_eq!(calls[0].page_size, Some(CROSS_SPACE_LIMIT));
        assert!(calls
            .iter()
            .filter(|c| c.op == "list_messages")
            .all(|c| c.page_size == Some(MESSAGES_PER_SPACE)));
    }

    #[tokio::test]
    async fn test_search_messages_single_space() {
        let chat = FakeChat::default().with_messages(
            "spaces/A",
            vec![
                message("spaces/A/messages/1", "release notes", Utc::now()),
                message("spaces/A/messages/2", "RELEASE party", Utc::now()),
            ],
        );
        let (tools, chat) = tools(chat);

        let envelope = tools
            .execute(
                "search_messages",
                json!({"query": "Release", "space": "spaces/A", "limit": 1, "order_by": "create_time"}),
            )
            .await;

        assert_eq!(envelope.get("count"), Some(&json!(1)));
        assert!(envelope.get("ranking_note").is_none());
        let call = chat.last_call();
        assert_eq!(call.target, "spaces/A");
        assert_eq!(call.param.as_deref(), Some("createTime asc"));
    }

    #[tokio::test]
    async fn test_search_spaces_filters_type() {
        let chat = FakeChat::default()
            .with_space(json!({"name": "spaces/A", "displayName": "Eng Team", "spaceType": "SPACE"}))
            .with_space(json!({
                "name": "spaces/B",
                "displayName": "Random",
                "spaceType": "SPACE",
                "spaceDetails": {"description": "engineering chatter"}
            }))
            .with_space(json!({"name": "spaces/C", "displayName": "Eng DM", "spaceType": "DIRECT_MESSAGE"}));
        let (tools, chat) = tools(chat);

        let envelope = tools
            .execute(
                "search_spaces",
                json!({"query": "ENG", "space_type": "SPACE"}),
            )
            .await;

        assert_eq!(envelope.get("count"), Some(&json!(2)));
        assert_eq!(envelope.get("space_type"), Some(&json!("SPACE")));
        assert_eq!(
            chat.last_call().param.as_deref(),
            Some("spaceType = \"SPACE\"")
        );
    }

    #[tokio::test]
    async fn test_search_members_tags_space() {
        let chat = FakeChat::default().with_members(
            "spaces/A",
            vec![
                json!({"member": {"name": "users/1", "displayName": "Grace Hopper"}}),
                json!({"member": {"name": "users/2", "displayName": "Alan Turing"}}),
            ],
        );
        let (tools, _chat) = tools(chat);

        let envelope = tools
            .execute("search_members", json!({"query": "grace", "space": "spaces/A"}))
            .await;

        let members = envelope.get("members").unwrap().as_array().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0]["_space"], "spaces/A");
    }

    #[tokio::test]
    async fn test_recent_activity_end_to_end() {
        let now = Utc::now();
        let chat = FakeChat::default()
            .with_space(json!({"name": "spaces/A"}))
            .with_space(json!({"name": "spaces/B"}))
            .with_messages(
                "spaces/A",
                vec![message("spaces/A/messages/old", "x", now - Duration::hours(30))],
            )
            .with_messages(
                "spaces/B",
                vec![message("spaces/B/messages/new", "y", now - Duration::hours(1))],
            );
        let (tools, chat) = tools(chat);

        let envelope = tools
            .execute("get_recent_activity", json!({"hours": 24, "limit": 500}))
            .await;

        assert_eq!(envelope.get("count"), Some(&json!(1)));
        assert_eq!(envelope.get("hours"), Some(&json!(24)));
        let activities = envelope.get("activities").unwrap().as_array().unwrap();
        assert_eq!(activities[0]["space"], "spaces/B");
        assert!(chat
            .calls()
            .iter()
            .filter(|c| c.op == "list_messages")
            .all(|c| c.page_size == Some(ACTIVITY_PAGE_LIMIT)));
    }

    #[tokio::test]
    async fn test_recent_activity_without_message_type_fetches_nothing() {
        let (tools, chat) = tools(FakeChat::default());

        let envelope = tools
            .execute(
                "get_recent_activity",
                json!({"space": "spaces/A", "activity_types": ["MEMBERSHIP_CHANGE"]}),
            )
            .await;

        assert_eq!(envelope.get("count"), Some(&json!(0)));
        assert!(chat.calls().is_empty());
    }
}

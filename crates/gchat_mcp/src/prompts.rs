//! MCP Prompts
//!
//! Static help text describing the tool catalog. Each prompt is a fixed
//! user question followed by the assistant's answer.

use crate::protocol::{ContentBlock, PromptDefinition, PromptMessage, PromptsGetResult};

/// All available prompts
pub const PROMPTS: &[(&str, &str)] = &[
    ("google-chat-help", "Get help with Google Chat MCP server"),
    ("google-chat-examples", "See examples of Google Chat operations"),
];

/// Get a prompt by name
pub fn get_prompt(name: &str) -> Option<PromptsGetResult> {
    match name {
        "google-chat-help" => Some(conversation(
            "Get help with Google Chat MCP server",
            "Show me how to use the Google Chat MCP server",
            HELP,
        )),
        "google-chat-examples" => Some(conversation(
            "See examples of Google Chat operations",
            "Show me examples of using Google Chat tools",
            EXAMPLES,
        )),
        _ => None,
    }
}

/// List all available prompts
pub fn list_prompts() -> Vec<PromptDefinition> {
    PROMPTS
        .iter()
        .map(|(name, desc)| PromptDefinition {
            name: name.to_string(),
            description: desc.to_string(),
        })
        .collect()
}

fn conversation(description: &str, question: &str, answer: &str) -> PromptsGetResult {
    PromptsGetResult {
        description: Some(description.into()),
        messages: vec![
            PromptMessage {
                role: "user".into(),
                content: ContentBlock::text(question),
            },
            PromptMessage {
                role: "assistant".into(),
                content: ContentBlock::text(answer),
            },
        ],
    }
}

// =============================================================================
// Prompt Content
// =============================================================================

const HELP: &str = r#"# Google Chat MCP Server Help

Spaces are addressed by resource name (`spaces/AAAA1234567`). Tools that take an
optional `space` fall back to the configured default space; search tools search
every accessible space when `space` is omitted.

**Message Tools:**
- `send_message`: Send a message to a space
- `list_messages`: List recent messages
- `get_message`: Get a specific message
- `update_message`: Update a message
- `delete_message`: Delete a message

**Space Tools:**
- `list_spaces`: List your spaces
- `get_space`: Get space details
- `create_space`: Create a new space
- `update_space`: Update space settings
- `delete_space`: Delete a space

**Member Tools:**
- `list_members`: List space members
- `get_member`: Get member details
- `create_membership`: Add someone to a space
- `update_membership`: Change a member's role
- `delete_membership`: Remove someone from a space
- `find_direct_message`: Find an existing direct message space with a user

**Search Tools:**
- `search_messages`: Find messages containing text
- `search_spaces`: Find spaces by name or description
- `search_members`: Find members by name or ID
- `get_recent_activity`: Recent messages, newest first

**Webhook Tools:**
- `send_webhook_message`: Post through an incoming webhook
- `create_card_message`: Build a card for `send_message`
- `create_interactive_card`: Build a card with action buttons
- `parse_webhook_event`: Extract the useful fields of a Chat event
- `validate_webhook_signature`: Check a signed webhook request

Example usage:
```
send_message(space="spaces/AAAA1234567", text="Hello!")
```"#;

const EXAMPLES: &str = r#"# Google Chat Examples

## Send a simple message
```
send_message(
    space="spaces/AAAA1234567",
    text="Hello team!"
)
```

## Send a card message
```
card = create_card_message(
    title="Project Update",
    subtitle="Q4",
    text="Great progress on all fronts!"
)

send_message(
    space="spaces/AAAA1234567",
    text="Weekly update",
    cards=card["cards"]
)
```

## Create a space and invite a teammate
```
space = create_space(
    display_name="Project Alpha",
    space_type="SPACE"
)

create_membership(
    space=space["space_id"],
    user="teammate@company.com"
)
```

## Search for messages
```
search_messages(
    query="budget proposal",
    space="spaces/AAAA1234567",
    limit=10
)
```

## What happened today?
```
get_recent_activity(hours=8, limit=20)
```"#;

//! Messages request to chat-completions request translation.
//!
//! [`transform`] is a pure function over JSON. It accepts bodies that are
//! already in the outbound shape and leaves them unchanged, so applying it
//! twice gives the same result as applying it once.

use crate::error::{GatewayError, GatewayResult};
use serde_json::{json, Map, Value};

/// Fields copied verbatim when present
const PASSTHROUGH_FIELDS: &[&str] = &["max_tokens", "temperature", "top_p", "stream", "stream_options"];

/// Translate an inbound Messages body into a chat-completions body for
/// `target_model`.
///
/// # Errors
/// Returns a transform error for bodies that are not objects, missing or
/// ill-typed `messages`, messages without a string `role`, malformed blocks
/// and block types with no outbound equivalent.
pub fn transform(inbound: &Value, target_model: &str) -> GatewayResult<Value> {
    let body = inbound
        .as_object()
        .ok_or_else(|| GatewayError::transform("request body must be a JSON object", None))?;

    let mut out = Map::new();
    out.insert("model".to_string(), Value::String(target_model.to_string()));

    let mut messages = Vec::new();
    if let Some(text) = body.get("system").map(|s| system_text(s, "system")).transpose()?.flatten() {
        if !text.is_empty() {
            messages.push(json!({"role": "system", "content": text}));
        }
    }

    let inbound_messages = match body.get("messages") {
        Some(Value::Array(m)) => m,
        Some(_) => return Err(GatewayError::transform("messages must be an array", Some("messages"))),
        None => return Err(GatewayError::transform("messages is required", Some("messages"))),
    };
    for (i, message) in inbound_messages.iter().enumerate() {
        translate_message(message, &format!("messages[{i}]"), &mut messages)?;
    }
    out.insert("messages".to_string(), Value::Array(messages));

    for field in PASSTHROUGH_FIELDS {
        if let Some(value) = body.get(*field).filter(|v| !v.is_null()) {
            out.insert((*field).to_string(), value.clone());
        }
    }

    if let Some(stop) = body
        .get("stop_sequences")
        .or_else(|| body.get("stop"))
        .filter(|v| !v.is_null())
    {
        out.insert("stop".to_string(), stop.clone());
    }

    match body.get("tools") {
        None | Some(Value::Null) => {}
        Some(Value::Array(tools)) => {
            let tools = tools
                .iter()
                .enumerate()
                .map(|(i, tool)| translate_tool(tool, &format!("tools[{i}]")))
                .collect::<GatewayResult<Vec<_>>>()?;
            out.insert("tools".to_string(), Value::Array(tools));
        }
        Some(_) => return Err(GatewayError::transform("tools must be an array", Some("tools"))),
    }

    if let Some(choice) = body.get("tool_choice").filter(|v| !v.is_null()) {
        out.insert("tool_choice".to_string(), translate_tool_choice(choice)?);
    }

    Ok(Value::Object(out))
}

/// Flatten a system prompt (string or text blocks) into one string
fn system_text(system: &Value, field: &str) -> GatewayResult<Option<String>> {
    match system {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        Value::Array(blocks) => {
            let texts = blocks
                .iter()
                .enumerate()
                .map(|(i, block)| match block {
                    Value::String(text) => Ok(text.as_str()),
                    _ => block.get("text").and_then(Value::as_str).ok_or_else(|| {
                        GatewayError::transform(
                            "system block must carry a text field",
                            Some(&format!("{field}[{i}]")),
                        )
                    }),
                })
                .collect::<GatewayResult<Vec<_>>>()?;
            Ok(Some(texts.join("\n")))
        }
        _ => Err(GatewayError::transform(
            "system must be a string or an array of text blocks",
            Some(field),
        )),
    }
}

fn translate_message(message: &Value, field: &str, out: &mut Vec<Value>) -> GatewayResult<()> {
    let obj = message
        .as_object()
        .ok_or_else(|| GatewayError::transform("message must be an object", Some(field)))?;
    let role = obj.get("role").and_then(Value::as_str).ok_or_else(|| {
        GatewayError::transform("message role must be a string", Some(&format!("{field}.role")))
    })?;

    match role {
        "user" | "assistant" => {}
        "system" => {
            let content_field = format!("{field}.content");
            let text = obj
                .get("content")
                .map(|c| system_text(c, &content_field))
                .transpose()?
                .flatten()
                .unwrap_or_default();
            out.push(json!({"role": "system", "content": text}));
            return Ok(());
        }
        "tool" => {
            let id = obj.get("tool_call_id").and_then(Value::as_str).ok_or_else(|| {
                GatewayError::transform(
                    "tool message requires a tool_call_id",
                    Some(&format!("{field}.tool_call_id")),
                )
            })?;
            out.push(json!({
                "role": "tool",
                "tool_call_id": id,
                "content": tool_result_text(obj.get("content")),
            }));
            return Ok(());
        }
        other => {
            return Err(GatewayError::transform(
                format!("unsupported message role '{other}'"),
                Some(&format!("{field}.role")),
            ))
        }
    }

    let mut parts: Vec<Value> = Vec::new();
    let mut tool_calls: Vec<Value> = match obj.get("tool_calls") {
        Some(Value::Array(calls)) => calls.clone(),
        _ => Vec::new(),
    };
    let mut flushed = false;

    match obj.get("content") {
        Some(Value::String(text)) => parts.push(text_part(text)),
        Some(Value::Array(blocks)) => {
            for (j, block) in blocks.iter().enumerate() {
                let block_field = format!("{field}.content[{j}]");
                let kind = block.get("type").and_then(Value::as_str).ok_or_else(|| {
                    GatewayError::transform("content block type must be a string", Some(&block_field))
                })?;

                match kind {
                    "text" => {
                        let text = required_str(block, "text", &block_field)?;
                        parts.push(text_part(text));
                    }
                    "image" => parts.push(image_part(block.get("source"), &block_field)?),
                    "image_url" => {
                        let url = block
                            .get("image_url")
                            .and_then(|i| i.get("url"))
                            .and_then(Value::as_str)
                            .ok_or_else(|| {
                                GatewayError::transform("image_url part requires a url", Some(&block_field))
                            })?;
                        parts.push(json!({"type": "image_url", "image_url": {"url": url}}));
                    }
                    "tool_use" => {
                        let id = required_str(block, "id", &block_field)?;
                        let name = required_str(block, "name", &block_field)?;
                        let arguments = match block.get("input") {
                            None | Some(Value::Null) => "{}".to_string(),
                            Some(input) => serde_json::to_string(input)?,
                        };
                        tool_calls.push(json!({
                            "id": id,
                            "type": "function",
                            "function": {"name": name, "arguments": arguments},
                        }));
                    }
                    "tool_result" => {
                        let id = required_str(block, "tool_use_id", &block_field)?;
                        if !parts.is_empty() {
                            out.push(json!({"role": role, "content": collapse_parts(std::mem::take(&mut parts))}));
                        }
                        out.push(json!({
                            "role": "tool",
                            "tool_call_id": id,
                            "content": tool_result_text(block.get("content")),
                        }));
                        flushed = true;
                    }
                    // reasoning artefacts have no outbound equivalent
                    "thinking" | "redacted_thinking" => {}
                    other => {
                        return Err(GatewayError::transform(
                            format!("unsupported content block type '{other}'"),
                            Some(&block_field),
                        ))
                    }
                }
            }
        }
        None | Some(Value::Null) if !tool_calls.is_empty() => {}
        None | Some(Value::Null) => {
            return Err(GatewayError::transform(
                "message content is required",
                Some(&format!("{field}.content")),
            ))
        }
        Some(_) => {
            return Err(GatewayError::transform(
                "message content must be a string or an array of blocks",
                Some(&format!("{field}.content")),
            ))
        }
    }

    let content = if !parts.is_empty() {
        collapse_parts(parts)
    } else if !tool_calls.is_empty() {
        Value::Null
    } else if flushed {
        return Ok(());
    } else {
        Value::String(String::new())
    };

    let mut translated = Map::new();
    translated.insert("role".to_string(), Value::String(role.to_string()));
    translated.insert("content".to_string(), content);
    if !tool_calls.is_empty() {
        translated.insert("tool_calls".to_string(), Value::Array(tool_calls));
    }
    out.push(Value::Object(translated));

    Ok(())
}

fn required_str<'a>(block: &'a Value, key: &str, field: &str) -> GatewayResult<&'a str> {
    block.get(key).and_then(Value::as_str).ok_or_else(|| {
        GatewayError::transform(format!("block requires a string '{key}'"), Some(field))
    })
}

fn text_part(text: &str) -> Value {
    json!({"type": "text", "text": text})
}

/// A single text part becomes a plain string; anything else stays a part array
fn collapse_parts(mut parts: Vec<Value>) -> Value {
    if parts.len() == 1 && parts[0].get("type").and_then(Value::as_str) == Some("text") {
        if let Some(Value::String(text)) = parts[0].get_mut("text").map(Value::take) {
            return Value::String(text);
        }
    }
    Value::Array(parts)
}

fn image_part(source: Option<&Value>, field: &str) -> GatewayResult<Value> {
    let source = source
        .ok_or_else(|| GatewayError::transform("image block requires a source", Some(field)))?;

    let url = match source.get("type").and_then(Value::as_str) {
        Some("base64") => {
            let media_type = required_str(source, "media_type", field)?;
            let data = required_str(source, "data", field)?;
            format!("data:{media_type};base64,{data}")
        }
        Some("url") => required_str(source, "url", field)?.to_string(),
        _ => {
            return Err(GatewayError::transform(
                "image source type must be 'base64' or 'url'",
                Some(field),
            ))
        }
    };

    Ok(json!({"type": "image_url", "image_url": {"url": url}}))
}

/// Tool results are sent as text; non-text parts are kept as JSON
fn tool_result_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                _ => match (item.get("type").and_then(Value::as_str), item.get("text")) {
                    (Some("text"), Some(Value::String(text))) => text.clone(),
                    _ => item.to_string(),
                },
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}

fn translate_tool(tool: &Value, field: &str) -> GatewayResult<Value> {
    if tool.get("type").and_then(Value::as_str) == Some("function") && tool.get("function").is_some() {
        return Ok(tool.clone());
    }

    let name = required_str(tool, "name", field)?;
    let mut function = Map::new();
    function.insert("name".to_string(), Value::String(name.to_string()));
    if let Some(description) = tool.get("description").filter(|d| d.is_string()) {
        function.insert("description".to_string(), description.clone());
    }
    if let Some(schema) = tool.get("input_schema").filter(|s| !s.is_null()) {
        function.insert("parameters".to_string(), schema.clone());
    }

    Ok(json!({"type": "function", "function": function}))
}

fn translate_tool_choice(choice: &Value) -> GatewayResult<Value> {
    if choice.is_string() {
        return Ok(choice.clone());
    }

    match choice.get("type").and_then(Value::as_str) {
        Some("auto") => Ok(json!("auto")),
        Some("any") => Ok(json!("required")),
        Some("none") => Ok(json!("none")),
        Some("tool") => {
            let name = required_str(choice, "name", "tool_choice")?;
            Ok(json!({"type": "function", "function": {"name": name}}))
        }
        Some("function") => Ok(choice.clone()),
        _ => Err(GatewayError::transform(
            "tool_choice type must be one of auto, any, none, tool",
            Some("tool_choice"),
        )),
    }
}

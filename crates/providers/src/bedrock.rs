//! AWS Bedrock handler.
//!
//! Uses the Bedrock Runtime Converse APIs through `aws-sdk-bedrockruntime`.
//! The SDK client needs an async credential/region load, so it is built
//! inside the returned stream on first poll; constructing the handler never
//! touches the network.
//!
//! Credentials come from `awsAccessKey`/`awsSecretKey` (plus an optional
//! session token) when both are configured, otherwise from the default AWS
//! provider chain (environment, profile, IMDS).

use crate::traits::{ApiHandler, MessageOptions};
use crate::util::Reply;
use aws_sdk_bedrockruntime::config::{Credentials, Region};
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::types::{
    ContentBlock as BedrockBlock, ContentBlockDelta, ConversationRole, ConverseOutput,
    ConverseStreamOutput, InferenceConfiguration, Message as BedrockMessage, SystemContentBlock, TokenUsage,
};
use mr_domain::config::{ApiHandlerOptions, ApiProvider};
use mr_domain::error::{Error, Result};
use mr_domain::message::{Message, Role};
use mr_domain::models::{self, ModelSelection};
use mr_domain::stream::{ApiStream, StreamEvent};

const DEFAULT_REGION: &str = "us-east-1";
const CREDENTIALS_PROVIDER_NAME: &str = "modelrelay-config";

/// Used when a model descriptor carries no output ceiling.
const FALLBACK_MAX_TOKENS: u32 = 8_192;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct AwsBedrockHandler {
    region: String,
    credentials: Option<Credentials>,
    use_cross_region_inference: bool,
    model: ModelSelection,
}

impl AwsBedrockHandler {
    pub fn new(options: &ApiHandlerOptions) -> Self {
        let credentials = match (&options.aws_access_key, &options.aws_secret_key) {
            (Some(access), Some(secret)) if !access.is_empty() && !secret.is_empty() => {
                Some(Credentials::new(
                    access.clone(),
                    secret.clone(),
                    options.aws_session_token.clone(),
                    None,
                    CREDENTIALS_PROVIDER_NAME,
                ))
            }
            _ => None,
        };

        Self {
            region: options
                .aws_region
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            credentials,
            use_cross_region_inference: options.aws_use_cross_region_inference,
            model: models::resolve(
                models::BEDROCK_MODELS,
                options.api_model_id.as_deref(),
                models::BEDROCK_DEFAULT_MODEL_ID,
            ),
        }
    }

    /// The id sent to Bedrock, with the cross-region inference prefix
    /// applied when enabled.
    fn invocation_model_id(&self) -> String {
        inference_model_id(&self.model.id, &self.region, self.use_cross_region_inference)
    }

    fn prepare(&self, system_prompt: &str, messages: &[Message]) -> Result<ConverseCall> {
        let max_tokens = self.model.info.max_tokens.unwrap_or(FALLBACK_MAX_TOKENS);
        let (system, messages) = to_bedrock_messages(system_prompt, messages)?;
        Ok(ConverseCall {
            region: self.region.clone(),
            credentials: self.credentials.clone(),
            model_id: self.invocation_model_id(),
            system,
            messages,
            inference: InferenceConfiguration::builder()
                .max_tokens(max_tokens.min(i32::MAX as u32) as i32)
                .temperature(0.0)
                .build(),
        })
    }
}

/// Prefix a model id with the inference-profile geography of `region`.
///
/// Regions outside the US, EU and Asia Pacific have no cross-region
/// profiles, so the id is left as is.
pub(crate) fn inference_model_id(model_id: &str, region: &str, cross_region: bool) -> String {
    if !cross_region {
        return model_id.to_string();
    }
    let prefix = match region.split('-').next() {
        Some("us") => "us.",
        Some("eu") => "eu.",
        Some("ap") => "apac.",
        _ => return model_id.to_string(),
    };
    format!("{prefix}{model_id}")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request preparation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything one Converse call needs, detached from the handler so it can
/// move into the stream.
struct ConverseCall {
    region: String,
    credentials: Option<Credentials>,
    model_id: String,
    system: Option<String>,
    messages: Vec<BedrockMessage>,
    inference: InferenceConfiguration,
}

impl ConverseCall {
    async fn client(&self) -> aws_sdk_bedrockruntime::Client {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(self.region.clone()));
        if let Some(credentials) = &self.credentials {
            loader = loader.credentials_provider(credentials.clone());
        }
        let sdk_config = loader.load().await;
        aws_sdk_bedrockruntime::Client::new(&sdk_config)
    }

    fn system_blocks(&self) -> Option<Vec<SystemContentBlock>> {
        self.system
            .clone()
            .map(|text| vec![SystemContentBlock::Text(text)])
    }
}

/// Bedrock messages are text-only here; images and tool blocks are reduced
/// to their text content. System turns join the system prompt.
///
/// Converse requires alternating roles, so turns left empty by the
/// reduction are dropped and consecutive same-role turns are merged.
fn to_bedrock_messages(
    system_prompt: &str,
    messages: &[Message],
) -> Result<(Option<String>, Vec<BedrockMessage>)> {
    let mut system_parts: Vec<String> = Vec::new();
    if !system_prompt.is_empty() {
        system_parts.push(system_prompt.to_string());
    }

    let mut turns: Vec<(ConversationRole, String)> = Vec::with_capacity(messages.len());
    for msg in messages {
        let role = match msg.role {
            Role::System => {
                system_parts.push(msg.content.extract_all_text());
                continue;
            }
            Role::User => ConversationRole::User,
            Role::Assistant => ConversationRole::Assistant,
        };
        let text = msg.content.extract_all_text();
        if text.is_empty() {
            continue;
        }
        match turns.last_mut() {
            Some((last_role, last_text)) if *last_role == role => {
                last_text.push_str("\n\n");
                last_text.push_str(&text);
            }
            _ => turns.push((role, text)),
        }
    }

    let out = turns
        .into_iter()
        .map(|(role, text)| {
            BedrockMessage::builder()
                .role(role)
                .content(BedrockBlock::Text(text))
                .build()
                .map_err(|e| Error::Other(format!("bedrock message: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
    Ok((system, out))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn sdk_error<E: std::error::Error>(e: E) -> Error {
    Error::Provider {
        provider: "bedrock".into(),
        message: DisplayErrorContext(e).to_string(),
    }
}

fn usage_event(usage: &TokenUsage) -> StreamEvent {
    StreamEvent::Usage {
        input_tokens: usage.input_tokens().max(0) as u32,
        output_tokens: usage.output_tokens().max(0) as u32,
    }
}

/// Map one ConverseStream event to a normalized event. Empty text deltas,
/// tool-use deltas and lifecycle events map to nothing.
fn stream_output_event(output: ConverseStreamOutput) -> Option<StreamEvent> {
    match output {
        ConverseStreamOutput::ContentBlockDelta(event) => delta_event(event.delta),
        ConverseStreamOutput::Metadata(event) => event.usage().map(usage_event),
        _ => None,
    }
}

fn delta_event(delta: Option<ContentBlockDelta>) -> Option<StreamEvent> {
    match delta {
        Some(ContentBlockDelta::Text(text)) if !text.is_empty() => Some(StreamEvent::Text { text }),
        _ => None,
    }
}

/// Text blocks of a Converse reply, concatenated, plus reported usage.
fn converse_reply(output: &ConverseOutput) -> Reply {
    let text = match output {
        ConverseOutput::Message(message) => message
            .content()
            .iter()
            .filter_map(|block| block.as_text().ok())
            .map(String::as_str)
            .collect(),
        _ => String::new(),
    };
    Reply { text, usage: None }
}

fn converse_stream(call: Result<ConverseCall>) -> ApiStream {
    Box::pin(async_stream::stream! {
        let call = match call {
            Ok(call) => call,
            Err(e) => {
                yield Err(e);
                return;
            }
        };
        tracing::debug!(provider = "bedrock", model = %call.model_id, region = %call.region, "bedrock stream request");

        let client = call.client().await;
        let output = client
            .converse_stream()
            .model_id(&call.model_id)
            .set_system(call.system_blocks())
            .set_messages(Some(call.messages.clone()))
            .inference_config(call.inference.clone())
            .send()
            .await;
        let mut events = match output {
            Ok(output) => output.stream,
            Err(e) => {
                yield Err(sdk_error(e));
                return;
            }
        };

        loop {
            match events.recv().await {
                Ok(Some(output)) => {
                    if let Some(event) = stream_output_event(output) {
                        yield Ok(event);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    yield Err(sdk_error(e));
                    return;
                }
            }
        }

        tracing::trace!(provider = "bedrock", "bedrock stream finished");
    })
}

fn converse_once(call: Result<ConverseCall>) -> ApiStream {
    Box::pin(async_stream::stream! {
        let call = match call {
            Ok(call) => call,
            Err(e) => {
                yield Err(e);
                return;
            }
        };
        tracing::debug!(provider = "bedrock", model = %call.model_id, region = %call.region, "bedrock request");

        let client = call.client().await;
        let output = client
            .converse()
            .model_id(&call.model_id)
            .set_system(call.system_blocks())
            .set_messages(Some(call.messages.clone()))
            .inference_config(call.inference.clone())
            .send()
            .await;
        let output = match output {
            Ok(output) => output,
            Err(e) => {
                yield Err(sdk_error(e));
                return;
            }
        };

        let reply = Reply {
            usage: output.usage().map(usage_event),
            ..output.output().map(converse_reply).unwrap_or_default()
        };
        if !reply.text.is_empty() {
            yield Ok(StreamEvent::Text { text: reply.text });
        }
        if let Some(usage) = reply.usage {
            yield Ok(usage);
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ApiHandler for AwsBedrockHandler {
    fn create_message(
        &self,
        system_prompt: &str,
        messages: &[Message],
        options: &MessageOptions,
    ) -> ApiStream {
        let call = self.prepare(system_prompt, messages);
        if options.json_output {
            converse_once(call)
        } else {
            converse_stream(call)
        }
    }

    fn get_model(&self) -> ModelSelection {
        self.model.clone()
    }

    fn provider(&self) -> ApiProvider {
        ApiProvider::Bedrock
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_region_prefix_follows_region_geography() {
        let id = "anthropic.claude-3-5-sonnet-20241022-v2:0";
        assert_eq!(inference_model_id(id, "us-west-2", true), format!("us.{id}"));
        assert_eq!(inference_model_id(id, "eu-central-1", true), format!("eu.{id}"));
        assert_eq!(inference_model_id(id, "ap-northeast-1", true), format!("apac.{id}"));
        assert_eq!(inference_model_id(id, "sa-east-1", true), id);
        assert_eq!(inference_model_id(id, "us-west-2", false), id);
    }

    #[test]
    fn region_defaults_when_unset() {
        let handler = AwsBedrockHandler::new(&ApiHandlerOptions::default());
        assert_eq!(handler.region, DEFAULT_REGION);
        assert!(handler.credentials.is_none());
        assert_eq!(handler.get_model().id, models::BEDROCK_DEFAULT_MODEL_ID);
    }

    #[test]
    fn static_credentials_need_both_keys() {
        let options = ApiHandlerOptions {
            aws_access_key: Some("AKIA".into()),
            ..Default::default()
        };
        assert!(AwsBedrockHandler::new(&options).credentials.is_none());

        let options = ApiHandlerOptions {
            aws_access_key: Some("AKIA".into()),
            aws_secret_key: Some("secret".into()),
            aws_region: Some("eu-west-1".into()),
            aws_use_cross_region_inference: true,
            ..Default::default()
        };
        let handler = AwsBedrockHandler::new(&options);
        assert!(handler.credentials.is_some());
        assert!(handler.invocation_model_id().starts_with("eu."));
    }

    #[test]
    fn system_turns_join_the_system_prompt() {
        let (system, messages) = to_bedrock_messages(
            "base",
            &[
                Message::system("more"),
                Message::user("hi"),
                Message::assistant(""),
            ],
        )
        .unwrap();
        assert_eq!(system.as_deref(), Some("base\n\nmore"));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role(), &ConversationRole::User);
    }

    #[test]
    fn tool_only_turns_do_not_break_role_alternation() {
        use mr_domain::message::{ContentBlock, MessageContent};

        let tool_call = Message {
            role: Role::Assistant,
            content: MessageContent::Blocks(vec![ContentBlock::ToolUse {
                id: "call_1".into(),
                name: "lookup".into(),
                input: serde_json::json!({}),
            }]),
        };
        let (_, messages) =
            to_bedrock_messages("", &[Message::user("q"), tool_call, Message::user("a")]).unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role(), &ConversationRole::User);
        assert_eq!(messages[0].content()[0].as_text().unwrap(), "q\n\na");
    }

    #[test]
    fn alternating_turns_are_kept_in_order() {
        let (_, messages) = to_bedrock_messages(
            "",
            &[Message::user("q"), Message::assistant("r"), Message::user("s")],
        )
        .unwrap();
        let roles: Vec<_> = messages.iter().map(|m| m.role().clone()).collect();
        assert_eq!(
            roles,
            vec![ConversationRole::User, ConversationRole::Assistant, ConversationRole::User]
        );
    }

    #[test]
    fn text_deltas_map_one_to_one() {
        let events: Vec<StreamEvent> = ["Hel", "lo", " world"]
            .into_iter()
            .filter_map(|t| delta_event(Some(ContentBlockDelta::Text(t.to_string()))))
            .collect();
        assert_eq!(events.len(), 3);
        let joined: String = events.iter().filter_map(StreamEvent::as_text).collect();
        assert_eq!(joined, "Hello world");
    }

    #[test]
    fn empty_or_missing_deltas_map_to_nothing() {
        assert!(delta_event(Some(ContentBlockDelta::Text(String::new()))).is_none());
        assert!(delta_event(None).is_none());
    }

    #[test]
    fn usage_counts_are_reported() {
        let usage = TokenUsage::builder()
            .input_tokens(12)
            .output_tokens(5)
            .total_tokens(17)
            .build()
            .unwrap();
        assert_eq!(usage_event(&usage), StreamEvent::Usage { input_tokens: 12, output_tokens: 5 });
    }

    #[test]
    fn converse_reply_joins_text_blocks() {
        let message = BedrockMessage::builder()
            .role(ConversationRole::Assistant)
            .content(BedrockBlock::Text("{\"a\":".into()))
            .content(BedrockBlock::Text("1}".into()))
            .build()
            .unwrap();
        let reply = converse_reply(&ConverseOutput::Message(message));
        assert_eq!(reply.text, r#"{"a":1}"#);
    }
}

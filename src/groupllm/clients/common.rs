use crate::groupllm::client_wrapper::{ClientError, Message, TokenUsage};
use openai_rust::chat;
use openai_rust2 as openai_rust;
use std::sync::Mutex;

/// Convert prompt messages into the wire format expected by openai_rust.
pub fn format_messages(messages: &[Message]) -> Vec<chat::Message> {
    messages
        .iter()
        .map(|msg| chat::Message {
            role: msg.role.as_str().to_owned(),
            content: msg.content.to_string(),
        })
        .collect()
}

/// Send a chat request, record its usage, and return the assistant's content along
/// with the usage reported for this request.
pub async fn send_and_track(
    api: &openai_rust::Client,
    model: &str,
    formatted_msgs: Vec<chat::Message>,
    url_path: Option<String>,
    usage_slot: &Mutex<Option<TokenUsage>>,
) -> Result<(String, TokenUsage), ClientError> {
    let chat_arguments = chat::ChatArguments::new(model, formatted_msgs);

    let response = match api.create_chat(chat_arguments, url_path).await {
        Ok(response) => response,
        Err(err) => {
            log::error!(
                "groupllm::clients::common::send_and_track(...): API error for model '{}': {}",
                model,
                err
            );
            return Err(format!("chat completion failed: {}", err).into());
        }
    };

    let usage = TokenUsage {
        input_tokens: response.usage.prompt_tokens as usize,
        output_tokens: response.usage.completion_tokens as usize,
        total_tokens: response.usage.total_tokens as usize,
    };
    // Store it for get_last_usage()
    if let Ok(mut slot) = usage_slot.lock() {
        *slot = Some(usage.clone());
    }

    match response.choices.first() {
        Some(choice) => Ok((choice.message.content.clone(), usage)),
        None => Err("chat completion returned no choices".into()),
    }
}

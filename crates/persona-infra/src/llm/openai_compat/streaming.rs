//! OpenAI SSE stream to [`StreamEvent`] adapter.
//!
//! Maps `async-openai`'s [`ChatCompletionResponseStream`] events to the
//! provider-agnostic [`StreamEvent`] enum defined in `persona-types`.

use futures_util::StreamExt;

use async_openai::types::chat::{
    ChatCompletionResponseStream, CreateChatCompletionStreamResponse, FinishReason,
};

use persona_core::llm::provider::LlmEventStream;
use persona_types::llm::{LlmError, StopReason, StreamEvent, Usage};

/// Map an OpenAI finish reason onto the provider-agnostic stop reason.
pub(crate) fn stop_reason(reason: &FinishReason) -> StopReason {
    match reason {
        FinishReason::Stop => StopReason::EndTurn,
        FinishReason::Length => StopReason::MaxTokens,
        FinishReason::ContentFilter => StopReason::ContentFilter,
        // Tools are never offered, so these only appear from misbehaving endpoints.
        FinishReason::ToolCalls | FinishReason::FunctionCall => StopReason::EndTurn,
    }
}

/// Events carried by one streamed chunk, in emission order.
pub(crate) fn chunk_events(chunk: &CreateChatCompletionStreamResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    // The final chunk carries usage with an empty choices array.
    if let Some(usage) = &chunk.usage {
        events.push(StreamEvent::Usage(Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }));
    }

    for choice in &chunk.choices {
        if let Some(text) = choice.delta.content.as_ref().filter(|t| !t.is_empty()) {
            events.push(StreamEvent::TextDelta { text: text.clone() });
        }
        if let Some(reason) = &choice.finish_reason {
            events.push(StreamEvent::MessageDelta {
                stop_reason: stop_reason(reason),
            });
        }
    }

    events
}

/// Map an async-openai [`ChatCompletionResponseStream`] to a stream of [`StreamEvent`]s.
///
/// The returned stream emits `Connected`, then `TextDelta`s, a `MessageDelta`
/// with the stop reason, `Usage` when the endpoint reports it, and finally
/// `Done`.
pub fn map_openai_stream(stream: ChatCompletionResponseStream) -> LlmEventStream {
    Box::pin(async_stream::try_stream! {
        yield StreamEvent::Connected;

        let mut stream = stream;
        while let Some(result) = stream.next().await {
            let chunk = result.map_err(|e| LlmError::Stream(e.to_string()))?;
            for event in chunk_events(&chunk) {
                yield event;
            }
        }

        yield StreamEvent::Done;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(json: serde_json::Value) -> CreateChatCompletionStreamResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(stop_reason(&FinishReason::Stop), StopReason::EndTurn);
        assert_eq!(stop_reason(&FinishReason::Length), StopReason::MaxTokens);
        assert_eq!(
            stop_reason(&FinishReason::ContentFilter),
            StopReason::ContentFilter
        );
    }

    #[test]
    fn test_text_chunk() {
        let events = chunk_events(&chunk(serde_json::json!({
            "id": "gen-1",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": "openai/gpt-3.5-turbo",
            "choices": [{
                "index": 0,
                "delta": { "role": "assistant", "content": "Hello" },
                "finish_reason": null
            }]
        })));
        assert_eq!(
            events,
            vec![StreamEvent::TextDelta {
                text: "Hello".to_string()
            }]
        );
    }

    #[test]
    fn test_final_chunks() {
        let events = chunk_events(&chunk(serde_json::json!({
            "id": "gen-1",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": "openai/gpt-3.5-turbo",
            "choices": [{
                "index": 0,
                "delta": { "content": "" },
                "finish_reason": "stop"
            }]
        })));
        assert_eq!(
            events,
            vec![StreamEvent::MessageDelta {
                stop_reason: StopReason::EndTurn
            }]
        );

        let events = chunk_events(&chunk(serde_json::json!({
            "id": "gen-1",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": "openai/gpt-3.5-turbo",
            "choices": [],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15 }
        })));
        assert_eq!(
            events,
            vec![StreamEvent::Usage(Usage {
                input_tokens: 12,
                output_tokens: 3
            })]
        );
    }
}

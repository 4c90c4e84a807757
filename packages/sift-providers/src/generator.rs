use std::{collections::VecDeque, time::Duration};

use color_eyre::{Result, eyre};
use futures::{
	StreamExt,
	stream::{self, BoxStream},
};
use reqwest::Client;
use serde_json::Value;

pub type TokenStream = BoxStream<'static, Result<String>>;

/// Starts a streaming chat completion and yields content deltas as they arrive.
///
/// `timeout_ms` bounds connecting and each silent gap between reads, never the whole answer.
pub async fn generate(
	cfg: &sift_config::LlmProviderConfig,
	prompt: &str,
	max_tokens: u32,
) -> Result<TokenStream> {
	let timeout = Duration::from_millis(cfg.timeout_ms);
	let client = Client::builder().connect_timeout(timeout).read_timeout(timeout).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"max_tokens": max_tokens,
		"stream": true,
		"messages": [{ "role": "user", "content": prompt }],
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?
		.error_for_status()?;
	let bytes = res.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec()).map_err(Into::into));

	Ok(sse_tokens(bytes.boxed()))
}

enum SseEvent {
	Token(String),
	Done,
	Skip,
}

struct SseState {
	inner: BoxStream<'static, Result<Vec<u8>>>,
	buffer: Vec<u8>,
	pending: VecDeque<String>,
	finished: bool,
}

/// Decodes a server-sent-event byte stream into content tokens.
pub fn sse_tokens(inner: BoxStream<'static, Result<Vec<u8>>>) -> TokenStream {
	let state = SseState { inner, buffer: Vec::new(), pending: VecDeque::new(), finished: false };

	stream::unfold(state, |mut state| async move {
		loop {
			if let Some(token) = state.pending.pop_front() {
				return Some((Ok(token), state));
			}
			if state.finished {
				return None;
			}

			match state.inner.next().await {
				Some(Ok(bytes)) => {
					state.buffer.extend_from_slice(&bytes);

					drain_events(&mut state, false);
				},
				Some(Err(err)) => {
					state.finished = true;

					return Some((Err(err), state));
				},
				None => drain_events(&mut state, true),
			}
		}
	})
	.boxed()
}

fn drain_events(state: &mut SseState, eof: bool) {
	while let Some(pos) = find_event_end(&state.buffer) {
		let raw: Vec<u8> = state.buffer.drain(..pos.end).collect();
		let text = String::from_utf8_lossy(&raw[..pos.start]);

		if push_event(state, &text) {
			return;
		}
	}

	if eof {
		let rest = std::mem::take(&mut state.buffer);
		let text = String::from_utf8_lossy(&rest);

		push_event(state, &text);

		state.finished = true;
	}
}

/// Pushes the event's token, returning true once the stream is done.
fn push_event(state: &mut SseState, text: &str) -> bool {
	match parse_event(text) {
		Ok(SseEvent::Token(token)) => state.pending.push_back(token),
		Ok(SseEvent::Done) => {
			state.finished = true;
			state.buffer.clear();

			return true;
		},
		Ok(SseEvent::Skip) => {},
		Err(err) => tracing::warn!(error = %err, "Skipping malformed generator event."),
	}

	false
}

fn find_event_end(buffer: &[u8]) -> Option<std::ops::Range<usize>> {
	let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| i..i + 2);
	let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i..i + 4);

	match (lf, crlf) {
		(Some(a), Some(b)) => Some(if a.start <= b.start { a } else { b }),
		(a, b) => a.or(b),
	}
}

fn parse_event(text: &str) -> Result<SseEvent> {
	let mut data = String::new();

	for line in text.lines() {
		let Some(payload) = line.strip_prefix("data:") else { continue };

		if !data.is_empty() {
			data.push('\n');
		}

		data.push_str(payload.trim_start());
	}

	let data = data.trim();

	if data.is_empty() {
		return Ok(SseEvent::Skip);
	}
	if data == "[DONE]" {
		return Ok(SseEvent::Done);
	}

	let json: Value = serde_json::from_str(data)?;
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.ok_or_else(|| eyre::eyre!("Generator event is missing choices."))?
		.get("delta")
		.and_then(|delta| delta.get("content"))
		.and_then(|c| c.as_str());

	match content {
		Some(token) if !token.is_empty() => Ok(SseEvent::Token(token.to_string())),
		_ => Ok(SseEvent::Skip),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chunks(parts: &[&str]) -> BoxStream<'static, Result<Vec<u8>>> {
		let owned: Vec<Result<Vec<u8>>> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();

		stream::iter(owned).boxed()
	}

	#[tokio::test]
	async fn decodes_tokens_split_across_chunks() {
		let stream = sse_tokens(chunks(&[
			"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
			"\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
			"data: [DONE]\n\n",
			"data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
		]));
		let tokens: Vec<String> =
			stream.map(|item| item.expect("token failed")).collect::<Vec<_>>().await;

		assert_eq!(tokens, vec!["Hel".to_string(), "lo".to_string()]);
	}

	#[tokio::test]
	async fn flushes_trailing_event_without_blank_line() {
		let stream = sse_tokens(chunks(&["data: {\"choices\":[{\"delta\":{\"content\":\"end\"}}]}"]));
		let tokens: Vec<String> =
			stream.map(|item| item.expect("token failed")).collect::<Vec<_>>().await;

		assert_eq!(tokens, vec!["end".to_string()]);
	}

	#[test]
	fn role_only_deltas_are_skipped() {
		let event = parse_event("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}")
			.expect("parse failed");

		assert!(matches!(event, SseEvent::Skip));
	}
}

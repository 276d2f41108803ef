use std::collections::VecDeque;
use std::fmt;

use futures_util::{Stream, StreamExt};
use memchr::memchr;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::chat::ChatClient;
use crate::api::ChatResponse;
use crate::core::error::ChatError;
use crate::core::request::RequestConfig;

const DONE_SENTINEL: &str = "[DONE]";

/// A classified SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Content(String),
    Done,
    Error(String),
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

pub(crate) fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn classify_payload(payload: &str) -> Option<SseFrame> {
    if payload.trim_end() == DONE_SENTINEL {
        return Some(SseFrame::Done);
    }

    let value = match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => value,
        Err(err) => {
            // Usually a frame that was cut at a read boundary upstream.
            debug!(error = %err, len = payload.len(), "Skipping unparseable SSE payload");
            return None;
        }
    };

    if value.get("error").is_some_and(|error| !error.is_null()) {
        let summary =
            extract_error_summary(&value).unwrap_or_else(|| "stream reported an error".to_string());
        return Some(SseFrame::Error(summary));
    }

    let chunk = serde_json::from_value::<ChatResponse>(value).ok()?;
    chunk
        .first_content()
        .filter(|content| !content.is_empty())
        .map(|content| SseFrame::Content(content.to_string()))
}

fn classify_line(line: &[u8]) -> Option<SseFrame> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let text = String::from_utf8_lossy(line);
    extract_data_payload(&text).and_then(classify_payload)
}

/// Incremental SSE line decoder.
///
/// Bytes are buffered and split on `\n` before any UTF-8 decoding happens, so
/// a multi-byte character split across two reads is carried over intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read and return the frames it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = memchr(b'\n', &self.buffer[start..]) {
            let end = start + offset;
            let frame = classify_line(&self.buffer[start..end]);
            start = end + 1;

            if let Some(frame) = frame {
                let is_done = frame == SseFrame::Done;
                frames.push(frame);
                if is_done {
                    self.done = true;
                    self.buffer.clear();
                    return frames;
                }
            }
        }
        self.buffer.drain(..start);
        frames
    }

    /// Classify whatever is left once the body has ended without a trailing
    /// newline.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if self.done || self.buffer.is_empty() {
            return None;
        }
        self.done = true;
        let rest = std::mem::take(&mut self.buffer);
        classify_line(&rest)
    }

    /// Bytes waiting for a line break.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Pull-based sequence of completion text fragments over a response body.
///
/// The consumer drives reads: nothing is fetched until
/// [`FragmentStream::next_fragment`] is awaited. Dropping the stream or
/// calling [`FragmentStream::close`] releases the body.
pub struct FragmentStream<S> {
    body: Option<S>,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
    finished: bool,
}

impl<S, B, E> FragmentStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    pub fn new(body: Option<S>) -> Result<Self, ChatError> {
        let body = body.ok_or(ChatError::StreamUnavailable)?;
        Ok(Self {
            body: Some(body),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        })
    }

    pub fn has_more(&self) -> bool {
        !self.finished || !self.pending.is_empty()
    }

    /// Next fragment, `Ok(None)` at the end. After an error the stream is
    /// finished; fragments already returned are unaffected.
    pub async fn next_fragment(&mut self) -> Result<Option<String>, ChatError> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                match frame {
                    SseFrame::Content(text) => return Ok(Some(text)),
                    SseFrame::Done => {
                        self.close();
                        return Ok(None);
                    }
                    SseFrame::Error(message) => {
                        self.close();
                        return Err(ChatError::upstream(None, message));
                    }
                }
            }

            if self.finished {
                return Ok(None);
            }
            let Some(body) = self.body.as_mut() else {
                self.finished = true;
                return Ok(None);
            };

            match body.next().await {
                Some(Ok(chunk)) => {
                    let frames = self.decoder.push(chunk.as_ref());
                    self.pending.extend(frames);
                }
                Some(Err(err)) => {
                    self.close();
                    return Err(ChatError::NetworkFailure(err.to_string()));
                }
                None => {
                    self.body = None;
                    self.finished = true;
                    if let Some(frame) = self.decoder.finish() {
                        self.pending.push_back(frame);
                    }
                }
            }
        }
    }

    /// Stop reading and drop the body reader.
    pub fn close(&mut self) {
        self.body = None;
        self.pending.clear();
        self.finished = true;
    }

    /// Adapt into a `futures` stream that ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<String, ChatError>> {
        futures_util::stream::unfold(self, |mut fragments| async move {
            match fragments.next_fragment().await {
                Ok(Some(text)) => Some((Ok(text), fragments)),
                Ok(None) => None,
                Err(err) => Some((Err(err), fragments)),
            }
        })
    }

    /// Drain the stream. The text gathered before an error is returned next to
    /// it rather than discarded.
    pub async fn collect_text(mut self) -> (String, Option<ChatError>) {
        let mut text = String::new();
        loop {
            match self.next_fragment().await {
                Ok(Some(fragment)) => text.push_str(&fragment),
                Ok(None) => return (text, None),
                Err(err) => return (text, Some(err)),
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Chunk(String),
    Error(ChatError),
    End,
}

pub struct StreamParams {
    pub client: ChatClient,
    pub config: RequestConfig,
    pub cancel_token: tokio_util::sync::CancellationToken,
    pub stream_id: u64,
}

/// Push adapter for front ends: runs a [`FragmentStream`] on a task and
/// forwards what it yields over a channel, tagged with the stream id.
#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) -> tokio::task::JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                client,
                config,
                cancel_token,
                stream_id,
            } = params;

            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "Chat stream cancelled");
                }
                _ = async {
                    match client.stream(&config).await {
                        Ok(mut fragments) => loop {
                            match fragments.next_fragment().await {
                                Ok(Some(text)) => {
                                    let _ = tx.send((StreamMessage::Chunk(text), stream_id));
                                }
                                Ok(None) => break,
                                Err(err) => {
                                    let _ = tx.send((StreamMessage::Error(err), stream_id));
                                    break;
                                }
                            }
                        },
                        Err(err) => {
                            let _ = tx.send((StreamMessage::Error(err), stream_id));
                        }
                    }
                    let _ = tx.send((StreamMessage::End, stream_id));
                } => {}
            }
        })
    }

    #[cfg(test)]
    pub fn send_for_test(&self, message: StreamMessage, stream_id: u64) {
        let _ = self.tx.send((message, stream_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{chunked_body, sse_response, spawn_http_server};
    use futures_util::stream;

    fn frame(content: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    async fn decode_all(chunks: Vec<Vec<u8>>) -> (Vec<String>, Option<ChatError>) {
        let mut fragments = FragmentStream::new(Some(chunked_body(chunks))).unwrap();
        let mut out = Vec::new();
        loop {
            match fragments.next_fragment().await {
                Ok(Some(text)) => out.push(text),
                Ok(None) => return (out, None),
                Err(err) => return (out, Some(err)),
            }
        }
    }

    #[test]
    fn single_frame_yields_its_content() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n");
        assert_eq!(frames, vec![SseFrame::Content("Hi".into())]);
    }

    #[test]
    fn accepts_prefix_without_space_and_crlf() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(
            b"data:{\"choices\":[{\"delta\":{\"content\":\"World\"}}]}\r\n: OPENROUTER PROCESSING\r\ndata:[DONE]\r\n",
        );
        assert_eq!(
            frames,
            vec![SseFrame::Content("World".into()), SseFrame::Done]
        );
    }

    #[test]
    fn truncated_frame_waits_for_its_completion() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"choices\":[{\"del").is_empty());
        assert!(decoder.pending_len() > 0);
        let frames = decoder.push(b"ta\":{\"content\":\"Hi\"}}]}\n");
        assert_eq!(frames, vec![SseFrame::Content("Hi".into())]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn malformed_complete_lines_are_skipped() {
        let mut decoder = SseDecoder::new();
        let mut input = b"data: {\"choices\":[{\"del\n".to_vec();
        input.extend_from_slice(frame("after").as_bytes());
        assert_eq!(decoder.push(&input), vec![SseFrame::Content("after".into())]);
    }

    #[test]
    fn empty_and_role_only_deltas_are_ignored() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(
            b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\ndata: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n",
        );
        assert!(frames.is_empty());
    }

    #[test]
    fn error_frames_are_reported() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: {\"error\":{\"message\":\"internal server error\"}}\n");
        assert_eq!(
            frames,
            vec![SseFrame::Error("internal server error".into())]
        );
    }

    #[test]
    fn null_error_field_does_not_end_the_stream() {
        let mut decoder = SseDecoder::new();
        let frames =
            decoder.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}],\"error\":null}\n");
        assert_eq!(frames, vec![SseFrame::Content("Hi".into())]);
        assert_eq!(
            decoder.push(frame("there").as_bytes()),
            vec![SseFrame::Content("there".into())]
        );
    }

    #[test]
    fn nothing_is_decoded_after_done() {
        let mut decoder = SseDecoder::new();
        let mut input = frame("a").into_bytes();
        input.extend_from_slice(b"data: [DONE]\n");
        input.extend_from_slice(frame("b").as_bytes());
        assert_eq!(
            decoder.push(&input),
            vec![SseFrame::Content("a".into()), SseFrame::Done]
        );
        assert!(decoder.push(frame("c").as_bytes()).is_empty());
        assert_eq!(decoder.finish(), None);
    }

    #[tokio::test]
    async fn arbitrary_splits_decode_identically() {
        let mut logical = String::new();
        for piece in ["Hello", ", ", "こんにちは", " 🙂", "\n\"quoted\""] {
            logical.push_str(&frame(piece));
        }
        logical.push_str(": keep-alive\n\n");
        logical.push_str("data: [DONE]\n");
        let bytes = logical.into_bytes();

        let (expected, err) = decode_all(vec![bytes.clone()]).await;
        assert!(err.is_none());
        assert_eq!(
            expected,
            vec!["Hello", ", ", "こんにちは", " 🙂", "\n\"quoted\""]
        );

        for split in 1..bytes.len() {
            let (got, err) =
                decode_all(vec![bytes[..split].to_vec(), bytes[split..].to_vec()]).await;
            assert!(err.is_none());
            assert_eq!(got, expected, "split at byte {split}");
        }

        let single_bytes: Vec<Vec<u8>> = bytes.iter().map(|b| vec![*b]).collect();
        let (got, _) = decode_all(single_bytes).await;
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn body_without_data_lines_is_empty() {
        let (got, err) = decode_all(vec![b": ping\n\nevent: noop\n".to_vec()]).await;
        assert!(got.is_empty());
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn end_of_body_without_done_is_normal() {
        let mut body = frame("one");
        body.push_str("data: {\"choices\":[{\"delta\":{\"content\":\"two\"}}]}");
        let (got, err) = decode_all(vec![body.into_bytes()]).await;
        assert_eq!(got, vec!["one", "two"]);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn missing_body_is_stream_unavailable() {
        let body: Option<stream::Iter<std::vec::IntoIter<Result<Vec<u8>, String>>>> = None;
        assert!(matches!(
            FragmentStream::new(body),
            Err(ChatError::StreamUnavailable)
        ));
    }

    #[tokio::test]
    async fn transport_error_keeps_earlier_fragments() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(frame("partial").into_bytes()),
            Err("connection reset".to_string()),
            Ok(frame("never").into_bytes()),
        ];
        let fragments = FragmentStream::new(Some(stream::iter(chunks))).unwrap();
        let (text, err) = fragments.collect_text().await;
        assert_eq!(text, "partial");
        assert_eq!(
            err,
            Some(ChatError::NetworkFailure("connection reset".into()))
        );
    }

    #[tokio::test]
    async fn upstream_error_frame_ends_the_stream() {
        let mut body = frame("so far");
        body.push_str("data: {\"error\":{\"message\":\"boom\",\"code\":502}}\n");
        body.push_str(&frame("ignored"));
        let chunks = vec![body.into_bytes()];

        let collected: Vec<Result<String, ChatError>> =
            FragmentStream::new(Some(chunked_body(chunks)))
                .unwrap()
                .into_stream()
                .collect()
                .await;
        assert_eq!(
            collected,
            vec![
                Ok("so far".to_string()),
                Err(ChatError::upstream(None, "boom"))
            ]
        );
    }

    #[tokio::test]
    async fn close_releases_the_body() {
        let chunks = vec![frame("a").into_bytes(), frame("b").into_bytes()];
        let mut fragments = FragmentStream::new(Some(chunked_body(chunks))).unwrap();
        assert_eq!(fragments.next_fragment().await, Ok(Some("a".into())));
        assert!(fragments.has_more());
        fragments.close();
        assert!(!fragments.has_more());
        assert_eq!(fragments.next_fragment().await, Ok(None));
    }

    #[tokio::test]
    async fn service_forwards_chunks_then_end() {
        let mut body = frame("Hel");
        body.push_str(&frame("lo"));
        body.push_str("data: [DONE]\n");
        let base_url = spawn_http_server(vec![sse_response(&body)]).await;

        let (service, mut rx) = ChatStreamService::new();
        let config = crate::core::request::build_request(crate::core::request::RequestOptions {
            credential: "sk-or-v1-test".into(),
            model: "openai/gpt-4o".into(),
            messages: crate::core::wire::to_wire_format(
                &[crate::core::message::NewMessage::user("hi").into_message()],
                true,
            ),
            ..Default::default()
        })
        .unwrap();

        service
            .spawn_stream(StreamParams {
                client: ChatClient::new(reqwest::Client::new(), base_url),
                config,
                cancel_token: tokio_util::sync::CancellationToken::new(),
                stream_id: 7,
            })
            .await
            .unwrap();

        let mut received = Vec::new();
        while let Ok((message, id)) = rx.try_recv() {
            assert_eq!(id, 7);
            received.push(message);
        }
        assert_eq!(
            received,
            vec![
                StreamMessage::Chunk("Hel".into()),
                StreamMessage::Chunk("lo".into()),
                StreamMessage::End
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_service_sends_nothing_more() {
        let (service, mut rx) = ChatStreamService::new();
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();

        let config = crate::core::request::build_request(crate::core::request::RequestOptions {
            credential: "sk-or-v1-test".into(),
            model: "openai/gpt-4o".into(),
            messages: crate::core::wire::to_wire_format(&[], true),
            ..Default::default()
        })
        .unwrap();

        // Unroutable address: only cancellation can finish this task quickly.
        service
            .spawn_stream(StreamParams {
                client: ChatClient::new(reqwest::Client::new(), "http://10.255.255.1:9".into()),
                config,
                cancel_token: token,
                stream_id: 1,
            })
            .await
            .unwrap();

        service.send_for_test(StreamMessage::End, 2);
        let (message, id) = rx.try_recv().unwrap();
        assert_eq!((message, id), (StreamMessage::End, 2));
        assert!(rx.try_recv().is_err());
    }
}

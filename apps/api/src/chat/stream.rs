//! Streaming frame parser — turns the model's raw fragment sequence into
//! discrete client-visible frames.
//!
//! The model is instructed (see `prompts.rs`) to wrap each human-readable
//! paragraph in `<PARA>…</PARA>` and to finish with exactly one
//! `<JSON>…</JSON>` payload. Fragment boundaries are arbitrary: a marker may
//! arrive split across two fragments, so extraction runs over an
//! accumulating buffer rather than per-fragment.
//!
//! Markers appearing literally inside model-generated content are not
//! escaped by the protocol; extraction then truncates at the embedded
//! marker. Known limitation of the wire format.

use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::llm_client::FragmentStream;

pub const PARA_OPEN: &str = "<PARA>";
pub const PARA_CLOSE: &str = "</PARA>";
pub const FINAL_OPEN: &str = "<JSON>";
pub const FINAL_CLOSE: &str = "</JSON>";

/// Fixed user-facing text for an upstream failure mid-stream.
pub const STREAM_ERROR_TEXT: &str = "The AI stream encountered an error. Please try again.";

/// One extracted unit of model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Paragraph(String),
    Final(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Accumulating,
    FinalEmitted,
}

/// Incremental extractor over the stream buffer. One parser instance is
/// owned by exactly one in-flight response and discarded at stream end.
#[derive(Debug)]
pub struct FrameParser {
    buffer: String,
    state: ParserState,
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            state: ParserState::Accumulating,
        }
    }

    /// True once the final payload has been emitted; the caller must stop
    /// feeding fragments (remaining upstream output is not consumed).
    pub fn is_done(&self) -> bool {
        self.state == ParserState::FinalEmitted
    }

    /// Appends one fragment and drains every frame it completes, in source
    /// order. After the final payload is extracted any trailing buffer
    /// content is discarded and further pushes return nothing.
    pub fn push(&mut self, fragment: &str) -> Vec<Frame> {
        if self.is_done() {
            return Vec::new();
        }
        self.buffer.push_str(fragment);

        let mut frames = Vec::new();

        // Drain complete paragraph units one at a time: first start marker to
        // the first end marker after it. Everything up to and including the
        // end marker (leading junk included) leaves the buffer.
        while let Some((start, end)) = self.find_unit(PARA_OPEN, PARA_CLOSE) {
            let para = self.buffer[start + PARA_OPEN.len()..end].trim().to_string();
            self.buffer.drain(..end + PARA_CLOSE.len());
            frames.push(Frame::Paragraph(para));
        }

        // A complete final unit consumes the rest of the stream.
        if let Some((start, end)) = self.find_unit(FINAL_OPEN, FINAL_CLOSE) {
            let payload = self.buffer[start + FINAL_OPEN.len()..end].trim().to_string();
            self.buffer.clear();
            self.state = ParserState::FinalEmitted;
            frames.push(Frame::Final(payload));
        }

        frames
    }

    /// Signals end of the upstream fragment sequence. Leftover non-whitespace
    /// content with no final payload becomes one last paragraph.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.is_done() {
            return None;
        }
        let leftover = self.buffer.trim();
        if leftover.is_empty() {
            return None;
        }
        let frame = Frame::Paragraph(leftover.to_string());
        self.buffer.clear();
        Some(frame)
    }

    fn find_unit(&self, open: &str, close: &str) -> Option<(usize, usize)> {
        let start = self.buffer.find(open)?;
        let end = self.buffer[start + open.len()..]
            .find(close)
            .map(|i| i + start + open.len())?;
        Some((start, end))
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SSE frame assembly
// ────────────────────────────────────────────────────────────────────────────

/// Payload of one server-pushed frame: `{"sender": "bot"|"final", "text": …}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FramePayload {
    pub sender: &'static str,
    pub text: String,
}

/// One outbound frame: either a JSON payload or the terminal `[DONE]` sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Payload(FramePayload),
    Done,
}

impl StreamFrame {
    pub fn bot(text: String) -> Self {
        StreamFrame::Payload(FramePayload {
            sender: "bot",
            text,
        })
    }

    pub fn final_payload(text: String) -> Self {
        StreamFrame::Payload(FramePayload {
            sender: "final",
            text,
        })
    }

    fn from_frame(frame: Frame) -> Self {
        match frame {
            Frame::Paragraph(text) => StreamFrame::bot(text),
            Frame::Final(text) => StreamFrame::final_payload(text),
        }
    }
}

/// Drives the full streaming contract over a fragment sequence: paragraphs in
/// source order, then the final payload if one arrives, an error frame on
/// upstream failure, and the `[DONE]` sentinel exactly once as the absolute
/// last frame on every path.
pub fn frame_stream(fragments: FragmentStream) -> impl Stream<Item = StreamFrame> {
    async_stream::stream! {
        let mut fragments = fragments;
        let mut parser = FrameParser::new();

        loop {
            match fragments.next().await {
                Some(Ok(fragment)) => {
                    for frame in parser.push(&fragment) {
                        debug!("emitting {:?} frame", frame_kind(&frame));
                        yield StreamFrame::from_frame(frame);
                    }
                    // Early termination: the final payload ends the response
                    // even if the upstream has more to say.
                    if parser.is_done() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!("model stream failed mid-response: {e}");
                    yield StreamFrame::bot(STREAM_ERROR_TEXT.to_string());
                    yield StreamFrame::Done;
                    return;
                }
                None => break,
            }
        }

        if let Some(frame) = parser.finish() {
            yield StreamFrame::from_frame(frame);
        }
        yield StreamFrame::Done;
    }
}

fn frame_kind(frame: &Frame) -> &'static str {
    match frame {
        Frame::Paragraph(_) => "paragraph",
        Frame::Final(_) => "final",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::ModelError;
    use futures::stream;

    fn collect_push(parser: &mut FrameParser, fragments: &[&str]) -> Vec<Frame> {
        let mut out = Vec::new();
        for fragment in fragments {
            out.extend(parser.push(fragment));
            if parser.is_done() {
                break;
            }
        }
        out
    }

    async fn run_stream(fragments: Vec<Result<String, ModelError>>) -> Vec<StreamFrame> {
        let upstream: FragmentStream = Box::pin(stream::iter(fragments));
        frame_stream(upstream).collect().await
    }

    fn ok(s: &str) -> Result<String, ModelError> {
        Ok(s.to_string())
    }

    #[test]
    fn paragraph_and_final_across_fragment_boundaries() {
        let mut parser = FrameParser::new();
        let frames = collect_push(
            &mut parser,
            &[
                "<PARA>Hello",
                " world</PARA><JSON>{\"reply\":\"hi\"",
                ",\"action\":null}</JSON>",
            ],
        );
        assert_eq!(
            frames,
            vec![
                Frame::Paragraph("Hello world".to_string()),
                Frame::Final("{\"reply\":\"hi\",\"action\":null}".to_string()),
            ]
        );
        assert!(parser.is_done());
    }

    #[test]
    fn marker_split_mid_marker() {
        let mut parser = FrameParser::new();
        let frames = collect_push(&mut parser, &["<PA", "RA>one</P", "ARA><PAR", "A>two</PARA>"]);
        assert_eq!(
            frames,
            vec![
                Frame::Paragraph("one".to_string()),
                Frame::Paragraph("two".to_string()),
            ]
        );
    }

    #[test]
    fn chunking_invariance_byte_by_byte() {
        let text = "<PARA>alpha</PARA><PARA>beta</PARA><JSON>{\"reply\":\"ok\",\"action\":null}</JSON>";

        // One fragment per byte is the worst-case chunking; the frame
        // sequence must match the single-fragment parse exactly.
        let mut whole = FrameParser::new();
        let expected = whole.push(text);

        let mut parser = FrameParser::new();
        let mut frames = Vec::new();
        for i in 0..text.len() {
            frames.extend(parser.push(&text[i..i + 1]));
            if parser.is_done() {
                break;
            }
        }
        assert_eq!(frames, expected);
        assert_eq!(
            frames.last(),
            Some(&Frame::Final(
                "{\"reply\":\"ok\",\"action\":null}".to_string()
            ))
        );
    }

    #[test]
    fn paragraphs_emitted_one_at_a_time_in_order() {
        let mut parser = FrameParser::new();
        let frames = parser.push("<PARA>a</PARA><PARA>b</PARA><PARA>c</PARA>");
        assert_eq!(
            frames,
            vec![
                Frame::Paragraph("a".to_string()),
                Frame::Paragraph("b".to_string()),
                Frame::Paragraph("c".to_string()),
            ]
        );
    }

    #[test]
    fn final_discards_trailing_buffer_content() {
        let mut parser = FrameParser::new();
        let frames = parser.push("<JSON>{\"reply\":\"x\",\"action\":null}</JSON>trailing noise");
        assert_eq!(frames.len(), 1);
        assert!(parser.is_done());
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn pushes_after_final_are_ignored() {
        let mut parser = FrameParser::new();
        parser.push("<JSON>{}</JSON>");
        assert!(parser.is_done());
        assert_eq!(parser.push("<PARA>late</PARA>"), Vec::new());
    }

    #[test]
    fn leftover_without_final_becomes_last_paragraph() {
        let mut parser = FrameParser::new();
        let frames = parser.push("<PARA>done</PARA>and then it just stopped");
        assert_eq!(frames, vec![Frame::Paragraph("done".to_string())]);
        assert_eq!(
            parser.finish(),
            Some(Frame::Paragraph("and then it just stopped".to_string()))
        );
    }

    #[test]
    fn whitespace_only_leftover_is_dropped() {
        let mut parser = FrameParser::new();
        parser.push("<PARA>all</PARA>  \n ");
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn no_markers_at_all() {
        let mut parser = FrameParser::new();
        assert_eq!(parser.push("no markers here"), Vec::new());
        assert_eq!(
            parser.finish(),
            Some(Frame::Paragraph("no markers here".to_string()))
        );
    }

    #[test]
    fn close_marker_before_open_is_not_a_unit() {
        let mut parser = FrameParser::new();
        // The end marker must come after the start marker; a stray closer
        // ahead of the first opener is treated as plain content.
        let frames = parser.push("</PARA>junk<PARA>real</PARA>");
        assert_eq!(frames, vec![Frame::Paragraph("real".to_string())]);
    }

    #[tokio::test]
    async fn stream_happy_path_ends_with_single_sentinel() {
        let frames = run_stream(vec![
            ok("<PARA>Hello"),
            ok(" world</PARA><JSON>{\"reply\":\"hi\""),
            ok(",\"action\":null}</JSON>"),
        ])
        .await;

        assert_eq!(
            frames,
            vec![
                StreamFrame::bot("Hello world".to_string()),
                StreamFrame::final_payload("{\"reply\":\"hi\",\"action\":null}".to_string()),
                StreamFrame::Done,
            ]
        );
    }

    #[tokio::test]
    async fn stream_early_termination_skips_remaining_fragments() {
        let frames = run_stream(vec![
            ok("<JSON>{\"reply\":\"bye\",\"action\":null}</JSON>"),
            ok("<PARA>never read</PARA>"),
        ])
        .await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames.last(), Some(&StreamFrame::Done));
    }

    #[tokio::test]
    async fn stream_without_markers_flushes_leftover() {
        let frames = run_stream(vec![ok("no markers here")]).await;
        assert_eq!(
            frames,
            vec![
                StreamFrame::bot("no markers here".to_string()),
                StreamFrame::Done,
            ]
        );
    }

    #[tokio::test]
    async fn stream_error_yields_error_frame_then_sentinel() {
        let frames = run_stream(vec![
            ok("<PARA>so far so good</PARA>"),
            Err(ModelError::Stream("connection reset".to_string())),
        ])
        .await;

        assert_eq!(
            frames,
            vec![
                StreamFrame::bot("so far so good".to_string()),
                StreamFrame::bot(STREAM_ERROR_TEXT.to_string()),
                StreamFrame::Done,
            ]
        );
    }

    #[tokio::test]
    async fn sentinel_is_exactly_once_on_empty_stream() {
        let frames = run_stream(vec![]).await;
        assert_eq!(frames, vec![StreamFrame::Done]);
    }
}

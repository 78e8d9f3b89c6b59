//! Response consumers.
//!
//! Each request names the consumer its body is routed to: a bounded
//! accumulator for documents small enough to decode whole, or the streaming
//! array decoder for paged listings.

use crate::error::DecodeError;
use crate::json::{ArrayOutcome, ObjectSink, Phase, StreamingArrayDecoder};

/// Fixed-capacity body buffer. A chunk that does not fit is dropped and the
/// body is marked truncated.
#[derive(Debug)]
pub struct BodyAccumulator {
    buffer: Vec<u8>,
    capacity: usize,
    truncated: bool,
}

impl BodyAccumulator {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::new(),
            capacity,
            truncated: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if self.buffer.len() + chunk.len() > self.capacity {
            if !self.truncated {
                tracing::error!(
                    held = self.buffer.len(),
                    chunk = chunk.len(),
                    capacity = self.capacity,
                    "Response body exceeds buffer, discarding"
                );
            }
            self.truncated = true;
            return;
        }
        self.buffer.extend_from_slice(chunk);
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.truncated = false;
    }

    pub fn contents(&self) -> Result<&[u8], DecodeError> {
        if self.truncated {
            return Err(DecodeError::Capacity {
                capacity: self.capacity,
            });
        }
        Ok(&self.buffer)
    }
}

/// Destination of the response body of the request in flight.
pub enum ResponseConsumer<'a> {
    Accumulate(BodyAccumulator),
    StreamArray {
        decoder: StreamingArrayDecoder,
        sink: &'a mut dyn ObjectSink,
    },
}

impl<'a> ResponseConsumer<'a> {
    pub fn accumulate(capacity: usize) -> Self {
        ResponseConsumer::Accumulate(BodyAccumulator::new(capacity))
    }

    pub fn stream_array(decoder: StreamingArrayDecoder, sink: &'a mut dyn ObjectSink) -> Self {
        ResponseConsumer::StreamArray { decoder, sink }
    }

    /// Called by the transport for every body chunk, in order.
    pub fn on_data(&mut self, chunk: &[u8]) {
        match self {
            ResponseConsumer::Accumulate(body) => body.push(chunk),
            ResponseConsumer::StreamArray { decoder, sink } => {
                // A failed decoder keeps its error; the rest of the body is ignored.
                if decoder.phase() != Phase::Failed {
                    let _ = decoder.feed(chunk, &mut **sink);
                }
            }
        }
    }

    /// Forget a previous attempt before the request is sent again.
    pub fn reset(&mut self) {
        match self {
            ResponseConsumer::Accumulate(body) => body.clear(),
            ResponseConsumer::StreamArray { decoder, sink } => {
                decoder.reset();
                sink.clear();
            }
        }
    }

    /// The accumulated body. Streamed responses have none.
    pub fn body(&self) -> Result<&[u8], DecodeError> {
        match self {
            ResponseConsumer::Accumulate(body) => body.contents(),
            ResponseConsumer::StreamArray { .. } => Err(DecodeError::Malformed(
                "streamed response has no buffered body".to_string(),
            )),
        }
    }

    /// End of stream for a streamed response.
    pub fn array_outcome(&mut self) -> Result<ArrayOutcome, DecodeError> {
        match self {
            ResponseConsumer::StreamArray { decoder, .. } => decoder.finish(),
            ResponseConsumer::Accumulate(_) => Err(DecodeError::Malformed(
                "response was not streamed".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NameUriList;

    #[test]
    fn accumulator_flags_overflow() {
        let mut consumer = ResponseConsumer::accumulate(8);
        consumer.on_data(b"{\"a\":");
        consumer.on_data(b"1234}");

        assert_eq!(consumer.body(), Err(DecodeError::Capacity { capacity: 8 }));

        consumer.reset();
        consumer.on_data(b"{}");
        assert_eq!(consumer.body().unwrap(), b"{}");
    }

    #[test]
    fn stream_consumer_feeds_the_sink() {
        let mut list = NameUriList::default();
        {
            let mut consumer = ResponseConsumer::stream_array(StreamingArrayDecoder::items(256), &mut list);
            consumer.on_data(br#"{"href":"x","items":[{"name":"A","uri":"u:1"},"#);
            consumer.on_data(br#"{"name":"B","uri":"u:2"}],"total":2}"#);
            let outcome = consumer.array_outcome().unwrap();
            assert_eq!(outcome.objects, 2);
            assert!(!outcome.empty);
        }
        assert_eq!(list.display(), "A\nB");
    }

    #[test]
    fn reset_clears_a_partial_listing() {
        let mut list = NameUriList::default();
        {
            let mut consumer = ResponseConsumer::stream_array(StreamingArrayDecoder::items(256), &mut list);
            consumer.on_data(br#"{"items":[{"name":"A","uri":"u:1"},{"na"#);
            consumer.reset();
            consumer.on_data(br#"{"items":[]}"#);
            assert!(consumer.array_outcome().unwrap().empty);
        }
        assert!(list.is_empty());
    }
}

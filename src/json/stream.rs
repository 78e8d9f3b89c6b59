//! Incremental extraction of the objects of one named JSON array.
//!
//! The playlists document is far larger than the RAM budget, so it is never
//! buffered whole. The decoder scans the byte stream for the array key, then
//! copies one array element at a time into a fixed buffer and hands each
//! complete element to an [`ObjectSink`]. Every phase is resumable: a chunk
//! may end anywhere and the next chunk continues at exactly the same byte.

use crate::error::DecodeError;

/// Key of the array holding the records of a paged Web API response.
pub const ITEMS_KEY: &str = "items";

/// Where the decoder is within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SeekKey,
    MatchColon,
    MatchOpenBracket,
    /// Just past `[`; a `]` here means the array is empty.
    PeekFirst,
    AwaitObjectStart,
    Accumulate,
    AwaitSeparator,
    Finished,
    Failed,
}

/// Receives each complete array element.
pub trait ObjectSink: Send {
    /// Called once per element, in document order. An error aborts the
    /// whole array.
    fn accept(&mut self, object: &[u8]) -> Result<(), DecodeError>;

    /// Drop everything accepted so far (the request is being retried).
    fn clear(&mut self);
}

/// Result of a successfully terminated array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayOutcome {
    pub objects: usize,
    pub empty: bool,
}

/// Result of one [`StreamingArrayDecoder::step`].
#[derive(Debug)]
pub struct Step<'a> {
    /// Bytes of the input that were used. The caller resumes after them.
    pub consumed: usize,
    /// Set when an element was completed by this step.
    pub object: Option<&'a [u8]>,
}

pub struct StreamingArrayDecoder {
    pattern: Vec<u8>,
    fallback: Vec<usize>,
    matched: usize,
    phase: Phase,
    depth: u32,
    in_string: bool,
    escaped: bool,
    buffer: Vec<u8>,
    capacity: usize,
    high_water: usize,
    consumed: u64,
    emitted: usize,
    empty: bool,
    error: Option<DecodeError>,
}

impl StreamingArrayDecoder {
    /// Decoder for the array stored under `key`, holding at most `capacity`
    /// bytes of any single element.
    pub fn new(key: &str, capacity: usize) -> Self {
        let pattern = format!("\"{key}\"").into_bytes();
        let fallback = failure_table(&pattern);
        let capacity = capacity.max(2);
        Self {
            pattern,
            fallback,
            matched: 0,
            phase: Phase::SeekKey,
            depth: 0,
            in_string: false,
            escaped: false,
            buffer: Vec::with_capacity(capacity),
            capacity,
            high_water: 0,
            consumed: 0,
            emitted: 0,
            empty: false,
            error: None,
        }
    }

    pub fn items(capacity: usize) -> Self {
        Self::new(ITEMS_KEY, capacity)
    }

    /// Back to `SeekKey` for a fresh response. The high-water mark survives.
    pub fn reset(&mut self) {
        self.matched = 0;
        self.phase = Phase::SeekKey;
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
        self.buffer.clear();
        self.consumed = 0;
        self.emitted = 0;
        self.empty = false;
        self.error = None;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Finished | Phase::Failed)
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Largest element buffered so far.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Advance over `input` until it is exhausted, an element completes, or
    /// the decoder reaches a terminal phase.
    pub fn step(&mut self, input: &[u8]) -> Result<Step<'_>, DecodeError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        let mut pos = 0;
        while pos < input.len() {
            let byte = input[pos];
            let offset = self.consumed + pos as u64;

            match self.phase {
                Phase::SeekKey => {
                    pos += 1;
                    if self.advance_key(byte) {
                        self.phase = Phase::MatchColon;
                    }
                }
                Phase::MatchColon => {
                    pos += 1;
                    if is_blank(byte) {
                        continue;
                    }
                    if byte != b':' {
                        return Err(self.unexpected("':'", byte, offset));
                    }
                    self.phase = Phase::MatchOpenBracket;
                }
                Phase::MatchOpenBracket => {
                    pos += 1;
                    if is_blank(byte) {
                        continue;
                    }
                    if byte != b'[' {
                        return Err(self.unexpected("'['", byte, offset));
                    }
                    self.phase = Phase::PeekFirst;
                }
                Phase::PeekFirst => {
                    if is_blank(byte) {
                        pos += 1;
                        continue;
                    }
                    if byte == b']' {
                        pos += 1;
                        self.empty = true;
                        self.phase = Phase::Finished;
                    } else {
                        // Not consumed: AwaitObjectStart validates it.
                        self.phase = Phase::AwaitObjectStart;
                    }
                }
                Phase::AwaitObjectStart => {
                    pos += 1;
                    if is_blank(byte) {
                        continue;
                    }
                    if byte != b'{' {
                        return Err(self.unexpected("'{'", byte, offset));
                    }
                    self.buffer.clear();
                    self.buffer.push(byte);
                    self.depth = 1;
                    self.in_string = false;
                    self.escaped = false;
                    self.phase = Phase::Accumulate;
                }
                Phase::Accumulate => {
                    if self.buffer.len() == self.capacity {
                        self.consumed += pos as u64;
                        let capacity = self.capacity;
                        return Err(self.fail(DecodeError::Capacity { capacity }));
                    }
                    self.buffer.push(byte);
                    self.high_water = self.high_water.max(self.buffer.len());
                    pos += 1;
                    self.track_nesting(byte);

                    if self.depth == 0 {
                        self.phase = Phase::AwaitSeparator;
                        self.emitted += 1;
                        self.consumed += pos as u64;
                        return Ok(Step {
                            consumed: pos,
                            object: Some(&self.buffer),
                        });
                    }
                }
                Phase::AwaitSeparator => {
                    pos += 1;
                    if is_blank(byte) {
                        continue;
                    }
                    match byte {
                        b',' => self.phase = Phase::AwaitObjectStart,
                        b']' => self.phase = Phase::Finished,
                        _ => return Err(self.unexpected("',' or ']'", byte, offset)),
                    }
                }
                // Bytes after the array are left to the caller.
                Phase::Finished | Phase::Failed => break,
            }
        }

        self.consumed += pos as u64;
        Ok(Step {
            consumed: pos,
            object: None,
        })
    }

    /// Run a whole chunk through the decoder, handing every completed
    /// element to `sink`.
    pub fn feed(&mut self, chunk: &[u8], sink: &mut dyn ObjectSink) -> Result<(), DecodeError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        let mut rest = chunk;
        while !rest.is_empty() && !self.is_terminal() {
            let step = self.step(rest)?;
            rest = &rest[step.consumed..];
            if let Some(object) = step.object {
                if let Err(err) = sink.accept(object) {
                    return Err(self.fail(err));
                }
            }
        }
        Ok(())
    }

    /// The producer signalled end of stream.
    pub fn finish(&mut self) -> Result<ArrayOutcome, DecodeError> {
        match self.phase {
            Phase::Finished => {
                tracing::debug!(
                    objects = self.emitted,
                    bytes = self.bytes_consumed(),
                    high_water = self.high_water(),
                    "Array decoded"
                );
                Ok(ArrayOutcome {
                    objects: self.emitted,
                    empty: self.empty,
                })
            }
            Phase::Failed => Err(self
                .error
                .clone()
                .unwrap_or(DecodeError::Incomplete { phase: Phase::Failed })),
            phase => Err(self.fail(DecodeError::Incomplete { phase })),
        }
    }

    fn advance_key(&mut self, byte: u8) -> bool {
        while self.matched > 0 && self.pattern[self.matched] != byte {
            self.matched = self.fallback[self.matched - 1];
        }
        if self.pattern[self.matched] == byte {
            self.matched += 1;
        }
        if self.matched == self.pattern.len() {
            self.matched = 0;
            return true;
        }
        false
    }

    fn track_nesting(&mut self, byte: u8) {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            return;
        }
        match byte {
            b'"' => self.in_string = true,
            b'{' => self.depth += 1,
            b'}' => self.depth -= 1,
            _ => {}
        }
    }

    fn unexpected(&mut self, expected: &'static str, found: u8, offset: u64) -> DecodeError {
        tracing::error!(expected, found = %(found as char), offset, "Unexpected byte in array stream");
        self.fail(DecodeError::Unexpected {
            expected,
            found: found as char,
            offset,
        })
    }

    fn fail(&mut self, err: DecodeError) -> DecodeError {
        self.phase = Phase::Failed;
        self.error = Some(err.clone());
        err
    }
}

fn is_blank(byte: u8) -> bool {
    byte.is_ascii_whitespace()
}

/// Longest proper prefix that is also a suffix, for every prefix of `pattern`.
fn failure_table(pattern: &[u8]) -> Vec<usize> {
    let mut table = vec![0; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = table[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        table[i] = k;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct VecSink {
        objects: Vec<Vec<u8>>,
        reject_after: Option<usize>,
    }

    impl ObjectSink for VecSink {
        fn accept(&mut self, object: &[u8]) -> Result<(), DecodeError> {
            if self.reject_after == Some(self.objects.len()) {
                return Err(DecodeError::MissingField("uri".to_string()));
            }
            self.objects.push(object.to_vec());
            Ok(())
        }

        fn clear(&mut self) {
            self.objects.clear();
        }
    }

    fn run(chunks: &[&[u8]], capacity: usize) -> (VecSink, Result<ArrayOutcome, DecodeError>) {
        let mut decoder = StreamingArrayDecoder::items(capacity);
        let mut sink = VecSink::default();
        for chunk in chunks {
            if decoder.feed(chunk, &mut sink).is_err() {
                break;
            }
        }
        let outcome = decoder.finish();
        (sink, outcome)
    }

    const OBJ1: &str = r#"{"name":"Road trip","uri":"spotify:playlist:1"}"#;
    const OBJ2: &str = r#"{"name":"Focus","owner":{"id":"me"},"uri":"spotify:playlist:2"}"#;
    const OBJ3: &str = r#"{"name":"Late }{ night","uri":"spotify:playlist:3"}"#;

    fn payload() -> String {
        format!(
            "{{\"href\":\"https://api.spotify.com/v1/me/playlists\",\"items\" : [ {OBJ1},\n  {OBJ2} ,{OBJ3}],\"limit\":50,\"total\":3}}"
        )
    }

    #[test]
    fn every_two_way_split_yields_the_same_objects() {
        let doc = payload();
        let bytes = doc.as_bytes();
        for split in 0..=bytes.len() {
            let (head, tail) = bytes.split_at(split);
            let (sink, outcome) = run(&[head, tail], 256);

            let outcome = outcome.unwrap_or_else(|e| panic!("split at {split}: {e}"));
            assert_eq!(outcome, ArrayOutcome { objects: 3, empty: false }, "split at {split}");
            assert_eq!(sink.objects, vec![OBJ1.as_bytes(), OBJ2.as_bytes(), OBJ3.as_bytes()], "split at {split}");
        }
    }

    #[test]
    fn single_byte_chunks_yield_the_same_objects() {
        let doc = payload();
        let chunks: Vec<&[u8]> = doc.as_bytes().chunks(1).collect();
        let (sink, outcome) = run(&chunks, 256);

        assert_eq!(outcome.unwrap(), ArrayOutcome { objects: 3, empty: false });
        assert_eq!(sink.objects.len(), 3);
        assert_eq!(sink.objects[2], OBJ3.as_bytes());
    }

    #[test]
    fn empty_array_in_any_chunking() {
        let doc = br#"{"items" :	[
            ] ,"total":0}"#;
        for split in 0..=doc.len() {
            let (head, tail) = doc.split_at(split);
            let (sink, outcome) = run(&[head, tail], 64);
            assert_eq!(outcome.unwrap(), ArrayOutcome { objects: 0, empty: true }, "split at {split}");
            assert!(sink.objects.is_empty());
        }
    }

    #[test]
    fn truncated_inside_object_never_emits_partial_object() {
        let doc = format!("{{\"items\":[{OBJ1},{{\"name\":\"Foc");
        let (sink, outcome) = run(&[doc.as_bytes()], 256);

        assert_eq!(outcome, Err(DecodeError::Incomplete { phase: Phase::Accumulate }));
        assert_eq!(sink.objects, vec![OBJ1.as_bytes()]);
    }

    #[test]
    fn truncated_before_closing_bracket_is_incomplete() {
        let doc = format!("{{\"items\":[{OBJ1}, ");
        let (sink, outcome) = run(&[doc.as_bytes()], 256);

        assert_eq!(outcome, Err(DecodeError::Incomplete { phase: Phase::AwaitObjectStart }));
        assert_eq!(sink.objects.len(), 1);
    }

    #[test]
    fn missing_key_fails_only_at_end_of_stream() {
        let mut decoder = StreamingArrayDecoder::items(64);
        let mut sink = VecSink::default();

        decoder.feed(br#"{"error":{"status":500,"#, &mut sink).unwrap();
        assert_eq!(decoder.phase(), Phase::SeekKey);

        assert_eq!(decoder.finish(), Err(DecodeError::Incomplete { phase: Phase::SeekKey }));
    }

    #[test]
    fn key_prefix_false_start_is_recovered() {
        let doc = br#"{"itemsTotal":1,"items":[{"a":1}]}"#;
        let (sink, outcome) = run(&[&doc[..4], &doc[4..]], 64);

        assert_eq!(outcome.unwrap().objects, 1);
        assert_eq!(sink.objects, vec![br#"{"a":1}"#.to_vec()]);
    }

    #[test]
    fn wrong_delimiter_after_key_is_a_hard_failure() {
        let (_, outcome) = run(&[br#"{"items": {"a":1}}"#], 64);
        assert!(matches!(
            outcome,
            Err(DecodeError::Unexpected { expected: "'['", found: '{', .. })
        ));

        let (_, outcome) = run(&[br#"{"items" = []}"#], 64);
        assert!(matches!(outcome, Err(DecodeError::Unexpected { expected: "':'", .. })));
    }

    #[test]
    fn garbage_between_objects_is_a_hard_failure() {
        let doc = format!("{{\"items\":[{OBJ1};{OBJ2}]}}");
        let (sink, outcome) = run(&[doc.as_bytes()], 256);

        assert!(matches!(outcome, Err(DecodeError::Unexpected { found: ';', .. })));
        assert_eq!(sink.objects.len(), 1);
    }

    #[test]
    fn oversized_object_is_a_capacity_error() {
        let doc = format!("{{\"items\":[{OBJ1}]}}");
        let (sink, outcome) = run(&[doc.as_bytes()], 16);

        assert_eq!(outcome, Err(DecodeError::Capacity { capacity: 16 }));
        assert!(sink.objects.is_empty());
    }

    #[test]
    fn rejected_element_aborts_the_rest_of_the_page() {
        let doc = payload();
        let mut decoder = StreamingArrayDecoder::items(256);
        let mut sink = VecSink {
            reject_after: Some(1),
            ..Default::default()
        };

        let result = decoder.feed(doc.as_bytes(), &mut sink);

        assert_eq!(result, Err(DecodeError::MissingField("uri".to_string())));
        assert_eq!(sink.objects.len(), 1);
        assert_eq!(decoder.finish(), Err(DecodeError::MissingField("uri".to_string())));
    }

    #[test]
    fn buffer_is_bounded_by_the_largest_object() {
        let doc = payload();
        let mut decoder = StreamingArrayDecoder::items(256);
        let mut sink = VecSink::default();
        decoder.feed(doc.as_bytes(), &mut sink).unwrap();

        assert_eq!(decoder.high_water(), OBJ2.len());
        // Everything after the closing bracket is left untouched.
        let closing = doc.find("],\"limit\"").unwrap() + 1;
        assert_eq!(decoder.bytes_consumed(), closing as u64);
    }

    #[test]
    fn step_stops_at_the_closing_bracket() {
        let doc = br#"{"items":[ ],"total":0}"#;
        let mut decoder = StreamingArrayDecoder::items(64);

        let step = decoder.step(doc).unwrap();
        assert!(step.object.is_none());
        assert_eq!(&doc[..step.consumed], br#"{"items":[ ]"#);
        assert_eq!(decoder.phase(), Phase::Finished);

        // Further input is not touched once the array is done.
        let step = decoder.step(b",\"more\":1}").unwrap();
        assert_eq!(step.consumed, 0);
        assert_eq!(decoder.bytes_consumed(), br#"{"items":[ ]"#.len() as u64);
    }

    #[test]
    fn object_filling_the_buffer_exactly_is_accepted() {
        let doc = format!("{{\"items\":[{OBJ1}]}}");

        let (sink, outcome) = run(&[doc.as_bytes()], OBJ1.len());
        assert_eq!(outcome.unwrap().objects, 1);
        assert_eq!(sink.objects, vec![OBJ1.as_bytes()]);

        let (sink, outcome) = run(&[doc.as_bytes()], OBJ1.len() - 1);
        assert_eq!(outcome, Err(DecodeError::Capacity { capacity: OBJ1.len() - 1 }));
        assert!(sink.objects.is_empty());
    }

    #[test]
    fn step_returns_after_each_object() {
        let doc = format!("{{\"items\":[{OBJ1},{OBJ2}]}}");
        let mut decoder = StreamingArrayDecoder::items(256);

        let step = decoder.step(doc.as_bytes()).unwrap();
        assert_eq!(step.object, Some(OBJ1.as_bytes()));
        let consumed = step.consumed;
        assert_eq!(&doc.as_bytes()[..consumed], format!("{{\"items\":[{OBJ1}").as_bytes());

        let step = decoder.step(&doc.as_bytes()[consumed..]).unwrap();
        assert_eq!(step.object, Some(OBJ2.as_bytes()));
    }

    #[test]
    fn reset_allows_reuse_after_failure() {
        let mut decoder = StreamingArrayDecoder::items(64);
        let mut sink = VecSink::default();
        assert!(decoder.feed(br#"{"items":x"#, &mut sink).is_err());

        decoder.reset();
        decoder.feed(br#"{"items":[]}"#, &mut sink).unwrap();
        assert_eq!(decoder.finish().unwrap(), ArrayOutcome { objects: 0, empty: true });
    }
}

//! JSON decoding for Web API responses.
//!
//! - `stream`: pulls the elements of one named array out of a chunked body
//!   without holding the whole document
//! - `fields`: required-field lookups over a single complete buffer

mod fields;
mod stream;

pub use fields::{TokenGrant, device_list, playlist_entry, token_grant, track_snapshot};
pub use stream::{ArrayOutcome, ObjectSink, Phase, StreamingArrayDecoder};

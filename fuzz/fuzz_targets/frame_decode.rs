//! Feed arbitrary bytes through the framing codec in uneven chunks.

#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;
use touchline_proto::PayloadCodec;

fuzz_target!(|data: &[u8]| {
    let mut codec = PayloadCodec::with_max_frame_size(64 * 1024);
    let mut buf = BytesMut::new();

    for chunk in data.chunks(7) {
        buf.extend_from_slice(chunk);
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => break,
            }
        }
    }
    let _ = codec.decode_eof(&mut buf);
});

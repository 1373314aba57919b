//! Newline framing of a streamed response body
//!
//! A record is released only once its terminating `\n` has arrived; a
//! partial trailing fragment stays buffered inside the codec until more
//! bytes come in. At end of stream a non-empty unterminated remainder is
//! released as the last record.

use crate::backend::BodyStream;
use crate::error::LaimError;
use bytes::Bytes;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

/// Pull-based stream of complete records (`Stream<Item = Result<String, LinesCodecError>>`)
pub type RecordStream = FramedRead<StreamReader<BodyStream, Bytes>, LinesCodec>;

/// Frame `body` into records no longer than `max_record_bytes`
pub fn records(body: BodyStream, max_record_bytes: usize) -> RecordStream {
    FramedRead::new(
        StreamReader::new(body),
        LinesCodec::new_with_max_length(max_record_bytes),
    )
}

/// Classify a framing failure
pub fn read_error(err: LinesCodecError) -> LaimError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => {
            LaimError::BackendProtocol("streamed record exceeds the maximum length".to_string())
        }
        LinesCodecError::Io(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            LaimError::BackendProtocol(format!("streamed record is not valid UTF-8: {}", e))
        }
        LinesCodecError::Io(e) => {
            LaimError::BackendUnavailable(format!("backend stream interrupted: {}", e))
        }
    }
}

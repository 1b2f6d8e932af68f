use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Number of ASCII digits in front of every payload
pub const HEADER_LEN: usize = 4;

/// The biggest payload a 4 digit header can describe
pub const MAX_PAYLOAD_LEN: usize = 9999;

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("{0}")]
    Io(#[from] tokio::io::Error),

    #[error("connection closed after {read} of {expected} bytes")]
    ShortRead { read: usize, expected: usize },

    #[error("invalid length header: {0:?}")]
    BadHeader(String),

    #[error("a payload of {0} bytes does not fit in a single frame")]
    TooLong(usize),

    #[error("the connection stopped accepting bytes")]
    BrokenConnection,
}

/// Reads a single frame from the reader and returns its payload.
///
/// returns None if the peer closed the stream before sending anything,
/// and an error if it closed in the middle of a frame.
/// a payload that is not valid utf-8 is decoded one char per byte instead of
/// being rejected, the frame boundaries are always decided by the raw byte count.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<Option<String>, FrameError> {
    let mut header = [0u8; HEADER_LEN];
    let rcount = read_full(reader, &mut header).await?;
    if rcount == 0 {
        return Ok(None);
    }

    if rcount < HEADER_LEN {
        return Err(FrameError::ShortRead {
            read: rcount,
            expected: HEADER_LEN,
        });
    }

    let length = parse_header(&header)?;
    let mut payload = vec![0u8; length];
    let rcount = read_full(reader, &mut payload).await?;
    if rcount < length {
        return Err(FrameError::ShortRead {
            read: rcount,
            expected: length,
        });
    }

    let payload = match String::from_utf8(payload) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!("payload is not valid utf-8, decoding it as raw bytes");
            err.into_bytes().into_iter().map(char::from).collect()
        }
    };

    Ok(Some(payload))
}

/// Writes the payload, prefixed with its length, into the writer.
///
/// keeps writing until the whole frame went through,
/// nothing is written if the payload is too long to be framed.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &str,
) -> Result<(), FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::TooLong(payload.len()));
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(format!("{:0width$}", payload.len(), width = HEADER_LEN).as_bytes());
    frame.extend_from_slice(payload.as_bytes());

    let mut wcount = 0;
    while wcount < frame.len() {
        let written = writer.write(&frame[wcount..]).await?;
        if written == 0 {
            return Err(FrameError::BrokenConnection);
        }

        wcount += written;
    }

    writer.flush().await?;

    Ok(())
}

// fill the buffer, stops early only if the peer closes the stream.
// returns the number of bytes that were read
async fn read_full<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    buffer: &mut [u8],
) -> tokio::io::Result<usize> {
    let mut position = 0;
    while position < buffer.len() {
        let rcount = reader.read(&mut buffer[position..]).await?;
        if rcount == 0 {
            break;
        }

        position += rcount;
    }

    Ok(position)
}

fn parse_header(header: &[u8; HEADER_LEN]) -> Result<usize, FrameError> {
    if !header.iter().all(u8::is_ascii_digit) {
        return Err(FrameError::BadHeader(
            String::from_utf8_lossy(header).into_owned(),
        ));
    }

    Ok(header
        .iter()
        .fold(0, |length, digit| length * 10 + (digit - b'0') as usize))
}

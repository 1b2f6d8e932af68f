use tokio::io::{AsyncRead, AsyncWrite, BufReader};

use super::{
    frame::{self, FrameError},
    message::{Request, RequestErr, Response, ResponseErr},
};

/// Exchanges typed messages over a stream, one message per frame
pub struct Connection<S> {
    stream: BufReader<S>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConnectionErr {
    #[error("{0}")]
    Frame(#[from] FrameError),

    #[error("{0}")]
    Response(#[from] ResponseErr),

    #[error("connection closed while waiting for a response")]
    Eof,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Reads a single request sent by an agency
    ///
    /// distinguishes between 2 types of errors:
    /// - a framing error, the stream can't be trusted anymore
    /// - a malformed request, the frame was consumed and the client can be told about it
    ///
    /// returns None once the agency closes the connection
    pub async fn read_request(
        &mut self,
    ) -> Result<Option<Result<Request, RequestErr>>, FrameError> {
        let Some(payload) = frame::read_frame(&mut self.stream).await? else {
            return Ok(None);
        };

        tracing::trace!("received raw: {:?}", payload);

        Ok(Some(payload.parse()))
    }

    /// Writes the given response to the agency
    pub async fn send_response(&mut self, response: &Response) -> Result<(), FrameError> {
        frame::write_frame(self.stream.get_mut(), &response.to_string()).await
    }

    /// Writes the given request to the server
    pub async fn send_request(&mut self, request: &Request) -> Result<(), FrameError> {
        frame::write_frame(self.stream.get_mut(), &request.to_string()).await
    }

    /// Reads the response to a previously sent request
    pub async fn read_response(&mut self) -> Result<Response, ConnectionErr> {
        let payload = frame::read_frame(&mut self.stream)
            .await?
            .ok_or(ConnectionErr::Eof)?;

        Ok(payload.parse()?)
    }

    /// Sends a request and waits for its response
    pub async fn request(&mut self, request: &Request) -> Result<Response, ConnectionErr> {
        self.send_request(request).await?;
        self.read_response().await
    }
}

#[cfg(test)]
use std::collections::VecDeque;
use std::fmt::{self, Display};

use bytes::Bytes;
use reqwest::Response;

/// Failure while reading the response body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error(pub String);

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to read response body: {}", self.0)
    }
}

/// An adapter for streaming byte chunks.
pub enum Chunks {
    Response(Response),
    #[cfg(test)]
    Scripted(VecDeque<Result<Bytes, Error>>),
}

impl Chunks {
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    #[cfg(test)]
    pub fn from_vec_deque(vec: VecDeque<Bytes>) -> Self {
        Chunks::Scripted(vec.into_iter().map(Ok).collect())
    }

    /// Yields the given chunks and then fails, like a connection that
    /// drops in the middle of a response.
    #[cfg(test)]
    pub fn failing_after(vec: VecDeque<Bytes>) -> Self {
        let mut scripted: VecDeque<_> = vec.into_iter().map(Ok).collect();
        scripted.push_back(Err(Error("connection reset".to_owned())));
        Chunks::Scripted(scripted)
    }

    #[inline]
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response(response) => {
                response.chunk().await.map_err(|err| Error(err.to_string()))
            }
            #[cfg(test)]
            Chunks::Scripted(vec) => vec.pop_front().transpose(),
        }
    }
}

use std::{fmt, str::FromStr};

use super::batch::{self, Batch, BatchErr, DELIMITER};

pub mod kind {
    pub const FINISHED: &str = "FINISHED";
    pub const QUERY_WINNERS: &str = "QUERY_WINNERS";

    pub const BATCH_ACK: &str = "BATCH_ACK";
    pub const LAST: &str = "LAST";
    pub const FINISHED_ACK: &str = "FINISHED_ACK";
    pub const WINNERS: &str = "WINNERS";
    pub const FORMAT_ERROR: &str = "ERROR_400";
    pub const NOT_READY: &str = "ERROR_403";
    pub const INTERNAL_ERROR: &str = "ERROR_500";
}

/// Messages sent by an agency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Batch(Batch),
    Finished { agency: u32 },
    QueryWinners { agency: u32 },
}

/// Messages sent by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    BatchAck { count: usize, is_last: bool },
    FinishedAck,
    Winners { agency: u32, documents: Vec<String> },
    FormatError,
    NotReady,
    // still tells whether the failed batch was the last one
    InternalError { is_last: bool },
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RequestErr {
    #[error("{0}")]
    Batch(#[from] BatchErr),

    #[error("usage: {0}/<agency>")]
    BadUsage(&'static str),

    #[error("invalid agency: {0:?}")]
    BadAgency(String),
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("unknown response: {0:?}")]
pub struct ResponseErr(pub String);

impl FromStr for Request {
    type Err = RequestErr;

    /// Dispatches on the first part of the payload,
    /// anything that isn't a control message is a batch
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut parts = trimmed.split(DELIMITER);

        match parts.next() {
            Some(kind::FINISHED) => Ok(Self::Finished {
                agency: parse_agency(kind::FINISHED, parts)?,
            }),
            Some(kind::QUERY_WINNERS) => Ok(Self::QueryWinners {
                agency: parse_agency(kind::QUERY_WINNERS, parts)?,
            }),
            _ => Ok(Self::Batch(batch::parse_batch(s)?)),
        }
    }
}

// the remaining parts of a control message must be exactly one agency id
fn parse_agency<'a>(
    kind: &'static str,
    mut parts: impl Iterator<Item = &'a str>,
) -> Result<u32, RequestErr> {
    let (Some(agency), None) = (parts.next(), parts.next()) else {
        return Err(RequestErr::BadUsage(kind));
    };

    agency
        .parse()
        .map_err(|_| RequestErr::BadAgency(agency.into()))
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch(batch) => write!(f, "{}", batch),
            Self::Finished { agency } => write!(f, "{}{}{}", kind::FINISHED, DELIMITER, agency),
            Self::QueryWinners { agency } => {
                write!(f, "{}{}{}", kind::QUERY_WINNERS, DELIMITER, agency)
            }
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BatchAck { count, is_last } => {
                write!(f, "{}{}{}", kind::BATCH_ACK, DELIMITER, count)?;
                if *is_last {
                    write!(f, "{}{}", DELIMITER, kind::LAST)?;
                }
                Ok(())
            }
            Self::FinishedAck => f.write_str(kind::FINISHED_ACK),
            Self::Winners { agency, documents } => write!(
                f,
                "{}{sep}{}{sep}{}{sep}{}",
                kind::WINNERS,
                agency,
                documents.len(),
                documents.join(","),
                sep = DELIMITER
            ),
            Self::FormatError => f.write_str(kind::FORMAT_ERROR),
            Self::NotReady => f.write_str(kind::NOT_READY),
            Self::InternalError { is_last } => {
                f.write_str(kind::INTERNAL_ERROR)?;
                if *is_last {
                    write!(f, "{}{}", DELIMITER, kind::LAST)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Response {
    type Err = ResponseErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ResponseErr(s.into());
        let parts: Vec<&str> = s.trim().split(DELIMITER).collect();

        let response = match parts[..] {
            [kind::BATCH_ACK, count] => Self::BatchAck {
                count: count.parse().map_err(|_| unknown())?,
                is_last: false,
            },
            [kind::BATCH_ACK, count, kind::LAST] => Self::BatchAck {
                count: count.parse().map_err(|_| unknown())?,
                is_last: true,
            },
            [kind::FINISHED_ACK] => Self::FinishedAck,
            [kind::WINNERS, agency, count, documents] => {
                let agency = agency.parse().map_err(|_| unknown())?;
                let count: usize = count.parse().map_err(|_| unknown())?;
                let documents: Vec<String> = documents
                    .split(',')
                    .filter(|document| !document.is_empty())
                    .map(String::from)
                    .collect();

                if documents.len() != count {
                    return Err(unknown());
                }

                Self::Winners { agency, documents }
            }
            [kind::FORMAT_ERROR] => Self::FormatError,
            [kind::NOT_READY] => Self::NotReady,
            [kind::INTERNAL_ERROR] => Self::InternalError { is_last: false },
            [kind::INTERNAL_ERROR, kind::LAST] => Self::InternalError { is_last: true },
            _ => return Err(unknown()),
        };

        Ok(response)
    }
}

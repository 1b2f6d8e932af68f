use std::fmt;

use crate::lottery::bet::{Bet, BetError};

/// Separates the fields of a bet, and the parts of control messages
pub const DELIMITER: char = '/';

/// Marks the last batch an agency is going to send
pub const EOF_MARKER: &str = "|EOF";

/// agency, first name, last name, document, birthdate, number
pub const BET_FIELD_COUNT: usize = 6;

/// A group of bets sent in a single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub bets: Vec<Bet>,
    pub is_last: bool,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum BatchErr {
    #[error("empty batch")]
    Empty,

    #[error("invalid batch header: {0:?}")]
    BadHeader(String),

    #[error("batch declared {declared} bets but carried {actual}")]
    CountMismatch { declared: usize, actual: usize },

    #[error("expected {expected} fields but found {actual}")]
    FieldCount { expected: usize, actual: usize },

    #[error("bet #{index} is invalid: {source}")]
    InvalidBet {
        index: usize,
        #[source]
        source: BetError,
    },
}

/// Parses a batch payload: a `<count>[|EOF]` header line followed by `count` bet lines
///
/// either every bet of the batch is valid or none is returned
pub fn parse_batch(payload: &str) -> Result<Batch, BatchErr> {
    let mut lines = payload.lines();

    let header = lines.next().map(str::trim).ok_or(BatchErr::Empty)?;
    let (count, is_last) = match header.strip_suffix(EOF_MARKER) {
        Some(count) => (count, true),
        None => (header, false),
    };
    if count.is_empty() || !count.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(BatchErr::BadHeader(header.into()));
    }
    let declared: usize = count
        .parse()
        .map_err(|_| BatchErr::BadHeader(header.into()))?;

    let lines: Vec<&str> = lines.filter(|line| !line.trim().is_empty()).collect();
    if lines.len() != declared {
        return Err(BatchErr::CountMismatch {
            declared,
            actual: lines.len(),
        });
    }

    let bets = lines
        .into_iter()
        .enumerate()
        .map(|(index, line)| match parse_single(line) {
            Err(BatchErr::InvalidBet { source, .. }) => Err(BatchErr::InvalidBet {
                index: index + 1,
                source,
            }),
            result => result,
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Batch { bets, is_last })
}

/// Parses a single bet line, made of exactly `BET_FIELD_COUNT` fields
pub fn parse_single(line: &str) -> Result<Bet, BatchErr> {
    let fields: Vec<&str> = line.trim().split(DELIMITER).collect();
    let [agency, first_name, last_name, document, birthdate, number] = fields[..] else {
        return Err(BatchErr::FieldCount {
            expected: BET_FIELD_COUNT,
            actual: fields.len(),
        });
    };

    Bet::new(agency, first_name, last_name, document, birthdate, number)
        .map_err(|source| BatchErr::InvalidBet { index: 1, source })
}

// the wire representation of a batch
impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bets.len())?;
        if self.is_last {
            f.write_str(EOF_MARKER)?;
        }
        writeln!(f)?;

        for bet in &self.bets {
            writeln!(f, "{}", bet)?;
        }

        Ok(())
    }
}

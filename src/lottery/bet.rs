use std::fmt;

use time::{macros::format_description, Date};

/// A single bet placed by an agency, immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bet {
    agency: u32,
    first_name: String,
    last_name: String,
    document: String,
    birthdate: Date,
    number: u32,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum BetError {
    #[error("invalid agency: {0:?}")]
    Agency(String),

    #[error("invalid name: {0:?}")]
    Name(String),

    #[error("invalid document: {0:?}")]
    Document(String),

    #[error("invalid birthdate: {0:?}")]
    Birthdate(String),

    #[error("invalid number: {0:?}")]
    Number(String),
}

impl Bet {
    /// Validates the raw fields and builds a bet out of them
    pub fn new(
        agency: &str,
        first_name: &str,
        last_name: &str,
        document: &str,
        birthdate: &str,
        number: &str,
    ) -> Result<Self, BetError> {
        let agency = agency
            .trim()
            .parse()
            .map_err(|_| BetError::Agency(agency.into()))?;

        let first_name = validate_name(first_name)?;
        let last_name = validate_name(last_name)?;

        let document = document.trim();
        if document.is_empty() || !document.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(BetError::Document(document.into()));
        }

        let birthdate = Date::parse(
            birthdate.trim(),
            format_description!("[year]-[month]-[day]"),
        )
        .map_err(|_| BetError::Birthdate(birthdate.into()))?;

        let number = number
            .trim()
            .parse()
            .map_err(|_| BetError::Number(number.into()))?;

        Ok(Self {
            agency,
            first_name,
            last_name,
            document: document.into(),
            birthdate,
            number,
        })
    }

    pub fn agency(&self) -> u32 {
        self.agency
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn birthdate(&self) -> Date {
        self.birthdate
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// The birthdate in its `YYYY-MM-DD` form
    pub fn birthdate_iso(&self) -> String {
        format!(
            "{:04}-{:02}-{:02}",
            self.birthdate.year(),
            u8::from(self.birthdate.month()),
            self.birthdate.day()
        )
    }
}

// names end up both on the wire and in the storage file,
// so they can't contain any of the delimiters used by them
fn validate_name(name: &str) -> Result<String, BetError> {
    let name = name.trim();
    if name.is_empty() || name.contains(['/', ',', '\n', '\r']) {
        return Err(BetError::Name(name.into()));
    }

    Ok(name.into())
}

// the wire representation of a bet, fields in protocol order
impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}/{}",
            self.agency,
            self.first_name,
            self.last_name,
            self.document,
            self.birthdate_iso(),
            self.number
        )
    }
}

#[cfg(test)]
mod tests {
    use time::Month;

    use super::{Bet, BetError};

    #[test]
    fn build_valid_bet() {
        let bet = Bet::new("1", "Ana", "Lopez", "30111222", "1990-01-01", "17").unwrap();

        assert_eq!(bet.agency(), 1);
        assert_eq!(bet.first_name(), "Ana");
        assert_eq!(bet.last_name(), "Lopez");
        assert_eq!(bet.document(), "30111222");
        assert_eq!(bet.birthdate().year(), 1990);
        assert_eq!(bet.birthdate().month(), Month::January);
        assert_eq!(bet.number(), 17);
        assert_eq!(bet.to_string(), "1/Ana/Lopez/30111222/1990-01-01/17");
    }

    #[test]
    fn reject_malformed_fields() {
        let cases = [
            (
                Bet::new("one", "Ana", "Lopez", "30111222", "1990-01-01", "17"),
                BetError::Agency("one".into()),
            ),
            (
                Bet::new("1", "", "Lopez", "30111222", "1990-01-01", "17"),
                BetError::Name("".into()),
            ),
            (
                Bet::new("1", "Ana", "Lo,pez", "30111222", "1990-01-01", "17"),
                BetError::Name("Lo,pez".into()),
            ),
            (
                Bet::new("1", "Ana", "Lopez", "30.111.222", "1990-01-01", "17"),
                BetError::Document("30.111.222".into()),
            ),
            (
                Bet::new("1", "Ana", "Lopez", "30111222", "1990-13-01", "17"),
                BetError::Birthdate("1990-13-01".into()),
            ),
            (
                Bet::new("1", "Ana", "Lopez", "30111222", "01/01/1990", "17"),
                BetError::Birthdate("01/01/1990".into()),
            ),
            (
                Bet::new("1", "Ana", "Lopez", "30111222", "1990-01-01", "-3"),
                BetError::Number("-3".into()),
            ),
        ];

        for (result, expected) in cases {
            assert_eq!(result.unwrap_err(), expected);
        }
    }
}

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::{
    fs::OpenOptions,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};

use super::bet::{Bet, BetError};

const FIELD_SEPARATOR: char = ',';

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Io(#[from] tokio::io::Error),

    #[error("corrupted record at line {line}: {reason}")]
    Corrupted { line: usize, reason: String },

    #[error("{0}")]
    Bet(#[from] BetError),
}

/// Persistence for the bets received from all agencies
#[async_trait]
pub trait BetStore: Send + Sync {
    async fn store(&self, bet: &Bet) -> Result<(), StoreError>;

    /// stores the bets in order, stops at the first failure
    async fn store_many(&self, bets: &[Bet]) -> Result<(), StoreError> {
        for bet in bets {
            self.store(bet).await?;
        }

        Ok(())
    }

    /// returns all the stored bets, in the order they were stored
    async fn load_all(&self) -> Result<Vec<Bet>, StoreError>;
}

#[async_trait]
impl<T: BetStore + ?Sized> BetStore for Arc<T> {
    async fn store(&self, bet: &Bet) -> Result<(), StoreError> {
        (**self).store(bet).await
    }

    async fn store_many(&self, bets: &[Bet]) -> Result<(), StoreError> {
        (**self).store_many(bets).await
    }

    async fn load_all(&self) -> Result<Vec<Bet>, StoreError> {
        (**self).load_all().await
    }
}

/// Keeps bets in a file, one comma separated record per line
#[derive(Debug, Clone)]
pub struct CsvFileStore {
    path: PathBuf,
}

impl CsvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, records: String) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(records.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

#[async_trait]
impl BetStore for CsvFileStore {
    async fn store(&self, bet: &Bet) -> Result<(), StoreError> {
        self.append(to_record(bet)).await
    }

    // a single write for the entire batch
    async fn store_many(&self, bets: &[Bet]) -> Result<(), StoreError> {
        if bets.is_empty() {
            return Ok(());
        }

        self.append(bets.iter().map(to_record).collect()).await
    }

    async fn load_all(&self) -> Result<Vec<Bet>, StoreError> {
        let file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            // nothing was stored yet
            Err(err) if err.kind() == tokio::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(err.into()),
        };

        let mut lines = BufReader::new(file).lines();
        let mut bets = vec![];
        let mut line_number = 0;
        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            bets.push(from_record(&line, line_number)?);
        }

        Ok(bets)
    }
}

fn to_record(bet: &Bet) -> String {
    format!(
        "{agency}{sep}{first}{sep}{last}{sep}{document}{sep}{birthdate}{sep}{number}\n",
        sep = FIELD_SEPARATOR,
        agency = bet.agency(),
        first = bet.first_name(),
        last = bet.last_name(),
        document = bet.document(),
        birthdate = bet.birthdate_iso(),
        number = bet.number(),
    )
}

fn from_record(line: &str, line_number: usize) -> Result<Bet, StoreError> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    let [agency, first_name, last_name, document, birthdate, number] = fields[..] else {
        return Err(StoreError::Corrupted {
            line: line_number,
            reason: format!("expected 6 fields, found {}", fields.len()),
        });
    };

    Ok(Bet::new(
        agency, first_name, last_name, document, birthdate, number,
    )?)
}

/// Keeps bets in memory, nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    bets: Mutex<Vec<Bet>>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // a poisoned lock still holds a consistent list of bets
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Bet>> {
        self.bets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BetStore for MemoryStore {
    async fn store(&self, bet: &Bet) -> Result<(), StoreError> {
        self.lock().push(bet.clone());
        Ok(())
    }

    async fn store_many(&self, bets: &[Bet]) -> Result<(), StoreError> {
        self.lock().extend_from_slice(bets);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Bet>, StoreError> {
        Ok(self.lock().clone())
    }
}

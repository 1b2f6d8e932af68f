use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tokio::sync::Mutex;

use self::{
    bet::Bet,
    rule::WinningRule,
    store::{BetStore, StoreError},
};

pub mod bet;
pub mod rule;
pub mod store;

pub type SharedLottery = Arc<Lottery>;

// everything that is observed together lives behind a single lock
#[derive(Debug, Default)]
struct DrawState {
    // agencies that are done submitting bets
    notified: HashSet<u32>,

    // maps agency -> documents of its winning bets, in storage order.
    // stays None until the draw has run
    winners: Option<HashMap<u32, Vec<String>>>,
}

/// What happened after an agency reported it has finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finished {
    /// some agencies are still submitting bets
    Waiting { remaining: usize },

    /// this notification completed the set and the draw has just run
    Drawn,

    /// the draw had already run before this notification
    AlreadyDrawn,
}

/// Coordinates the agencies and runs the draw once all of them are done.
///
/// bet storage, completion bookkeeping, the draw itself and winner lookups
/// are all serialized through the same lock, so once a query can see
/// that the draw has run it also sees all of its winners.
pub struct Lottery {
    state: Mutex<DrawState>,
    store: Box<dyn BetStore>,
    rule: Box<dyn WinningRule>,
    agencies: usize,
}

impl Lottery {
    /// Creates a lottery waiting for `agencies` agencies to finish
    pub fn new(
        store: impl BetStore + 'static,
        rule: impl WinningRule + 'static,
        agencies: usize,
    ) -> Self {
        Self {
            state: Mutex::default(),
            store: Box::new(store),
            rule: Box::new(rule),
            agencies,
        }
    }

    pub fn shared(self) -> SharedLottery {
        Arc::new(self)
    }

    pub fn agencies(&self) -> usize {
        self.agencies
    }

    /// Stores an entire batch of bets
    ///
    /// the lock is held for the whole batch, so a batch can't interleave with
    /// another one, or with a draw triggered by a different agency.
    /// returns the number of stored bets
    pub async fn store_batch(&self, bets: &[Bet]) -> Result<usize, StoreError> {
        let _state = self.state.lock().await;

        self.store.store_many(bets).await?;
        for bet in bets {
            tracing::debug!(
                action = "bet_stored",
                result = "success",
                document = bet.document(),
                number = bet.number()
            );
        }

        Ok(bets.len())
    }

    /// Marks an agency as finished, running the draw if it was the last one missing
    ///
    /// the draw runs inside the lock, no query can observe it half-way.
    /// if the bets can't be loaded the draw stays pending,
    /// and the next notification will try it again.
    pub async fn notify_finished(&self, agency: u32) -> Result<Finished, StoreError> {
        let mut state = self.state.lock().await;

        if !state.notified.insert(agency) {
            tracing::debug!("agency {} has already notified", agency);
        }

        if state.winners.is_some() {
            return Ok(Finished::AlreadyDrawn);
        }

        let notified = state.notified.len();
        if notified < self.agencies {
            return Ok(Finished::Waiting {
                remaining: self.agencies - notified,
            });
        }

        state.winners = Some(self.draw().await?);

        Ok(Finished::Drawn)
    }

    /// Returns the documents of the winning bets of an agency
    ///
    /// returns None as long as the draw hasn't run yet
    pub async fn winners(&self, agency: u32) -> Option<Vec<String>> {
        let state = self.state.lock().await;

        state
            .winners
            .as_ref()
            .map(|winners| winners.get(&agency).cloned().unwrap_or_default())
    }

    pub async fn is_drawn(&self) -> bool {
        self.state.lock().await.winners.is_some()
    }

    // must only be called while holding the state lock
    async fn draw(&self) -> Result<HashMap<u32, Vec<String>>, StoreError> {
        let bets = self.store.load_all().await?;

        let mut winners: HashMap<u32, Vec<String>> = HashMap::new();
        for bet in bets.iter().filter(|bet| self.rule.is_winner(bet)) {
            winners
                .entry(bet.agency())
                .or_default()
                .push(bet.document().to_owned());
        }

        tracing::info!(
            action = "draw",
            result = "success",
            bets = bets.len(),
            winners = winners.values().map(Vec::len).sum::<usize>()
        );

        Ok(winners)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::{
        bet::Bet,
        rule::WinningNumber,
        store::{BetStore, MemoryStore, StoreError},
        Finished, Lottery,
    };

    /// A memory store that counts how many times the draw loaded the bets
    #[derive(Debug, Default)]
    pub(crate) struct CountingStore {
        pub(crate) inner: MemoryStore,
        pub(crate) loads: AtomicUsize,
    }

    #[async_trait]
    impl BetStore for CountingStore {
        async fn store(&self, bet: &Bet) -> Result<(), StoreError> {
            self.inner.store(bet).await
        }

        async fn load_all(&self) -> Result<Vec<Bet>, StoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_all().await
        }
    }

    // fails every load until it is told otherwise
    #[derive(Debug, Default)]
    struct FlakyStore {
        healthy: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl BetStore for FlakyStore {
        async fn store(&self, _bet: &Bet) -> Result<(), StoreError> {
            Ok(())
        }

        async fn load_all(&self) -> Result<Vec<Bet>, StoreError> {
            if self.healthy.load(Ordering::SeqCst) {
                return Ok(vec![]);
            }

            Err(tokio::io::Error::new(tokio::io::ErrorKind::Other, "disk unavailable").into())
        }
    }

    pub(crate) fn bet(agency: u32, document: &str, number: u32) -> Bet {
        Bet::new(
            &agency.to_string(),
            "Ana",
            "Lopez",
            document,
            "1990-01-01",
            &number.to_string(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn draw_runs_once_all_agencies_finished() {
        let lottery = Lottery::new(MemoryStore::default(), WinningNumber(7), 2);
        lottery
            .store_batch(&[bet(1, "100", 7), bet(1, "101", 8), bet(2, "200", 7)])
            .await
            .unwrap();
        lottery.store_batch(&[bet(1, "102", 7)]).await.unwrap();

        assert_eq!(
            lottery.notify_finished(1).await.unwrap(),
            Finished::Waiting { remaining: 1 }
        );
        assert_eq!(lottery.winners(1).await, None);

        assert_eq!(lottery.notify_finished(2).await.unwrap(), Finished::Drawn);
        assert_eq!(
            lottery.winners(1).await,
            Some(vec!["100".to_string(), "102".to_string()])
        );
        assert_eq!(lottery.winners(2).await, Some(vec!["200".to_string()]));
        assert_eq!(lottery.winners(3).await, Some(vec![]));
    }

    #[tokio::test]
    async fn duplicate_notifications_do_not_redraw() {
        let store = std::sync::Arc::new(CountingStore::default());
        let lottery = Lottery::new(store.clone(), WinningNumber(7), 2);
        lottery.store_batch(&[bet(2, "200", 7)]).await.unwrap();

        // the same agency twice does not complete the set
        lottery.notify_finished(1).await.unwrap();
        assert_eq!(
            lottery.notify_finished(1).await.unwrap(),
            Finished::Waiting { remaining: 1 }
        );
        assert_eq!(store.loads.load(Ordering::SeqCst), 0);

        assert_eq!(lottery.notify_finished(2).await.unwrap(), Finished::Drawn);
        assert_eq!(
            lottery.notify_finished(2).await.unwrap(),
            Finished::AlreadyDrawn
        );
        assert_eq!(
            lottery.notify_finished(1).await.unwrap(),
            Finished::AlreadyDrawn
        );

        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        assert_eq!(lottery.winners(2).await, Some(vec!["200".to_string()]));
    }

    #[tokio::test]
    async fn queries_before_the_draw_are_never_answered() {
        let lottery = Lottery::new(MemoryStore::default(), WinningNumber(7), 3);
        assert_eq!(lottery.agencies(), 3);
        for agency in 1..=3 {
            lottery
                .store_batch(&[bet(agency, "100", 7), bet(agency, "101", 7)])
                .await
                .unwrap();
        }

        lottery.notify_finished(1).await.unwrap();
        lottery.notify_finished(2).await.unwrap();

        for agency in 1..=3 {
            assert_eq!(lottery.winners(agency).await, None);
        }
        assert!(!lottery.is_drawn().await);
    }

    #[tokio::test]
    async fn failed_draw_is_retried() {
        let store = std::sync::Arc::new(FlakyStore::default());
        let lottery = Lottery::new(store.clone(), WinningNumber(7), 1);

        assert!(lottery.notify_finished(1).await.is_err());
        assert!(!lottery.is_drawn().await);

        store.healthy.store(true, Ordering::SeqCst);
        assert_eq!(lottery.notify_finished(1).await.unwrap(), Finished::Drawn);
        assert_eq!(lottery.winners(1).await, Some(vec![]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_agencies_trigger_a_single_draw() {
        const AGENCIES: u32 = 16;

        let store = std::sync::Arc::new(CountingStore::default());
        let lottery = Lottery::new(store.clone(), WinningNumber(7), AGENCIES as usize).shared();

        let mut tasks = tokio::task::JoinSet::new();
        for agency in 1..=AGENCIES {
            let lottery = lottery.clone();
            tasks.spawn(async move {
                for round in 0..4 {
                    let document = format!("{}{:02}", agency, round);
                    lottery
                        .store_batch(&[bet(agency, &document, 7 + round)])
                        .await
                        .unwrap();
                }

                // notify twice, as a client retrying would
                let first = lottery.notify_finished(agency).await.unwrap();
                let second = lottery.notify_finished(agency).await.unwrap();
                (first, second)
            });
        }

        let mut drawn = 0;
        while let Some(result) = tasks.join_next().await {
            let (first, second) = result.unwrap();
            drawn += [first, second]
                .iter()
                .filter(|finished| **finished == Finished::Drawn)
                .count();
        }

        assert_eq!(drawn, 1);
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        assert_eq!(store.inner.len(), (AGENCIES * 4) as usize);

        for agency in 1..=AGENCIES {
            let winners = lottery.winners(agency).await.unwrap();
            assert_eq!(winners, vec![format!("{}00", agency)]);
        }
    }
}

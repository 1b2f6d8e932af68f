use super::bet::Bet;

/// The number drawn when no other number is configured
pub const DEFAULT_WINNING_NUMBER: u32 = 7574;

/// Decides which bets win the draw
pub trait WinningRule: Send + Sync {
    fn is_winner(&self, bet: &Bet) -> bool;
}

/// A bet wins when it chose exactly this number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinningNumber(pub u32);

impl Default for WinningNumber {
    fn default() -> Self {
        Self(DEFAULT_WINNING_NUMBER)
    }
}

impl WinningRule for WinningNumber {
    fn is_winner(&self, bet: &Bet) -> bool {
        bet.number() == self.0
    }
}

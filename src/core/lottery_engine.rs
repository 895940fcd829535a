//! Lottery engine
//!
//! A daily draw over five-digit tickets. The singleton [`LotteryState`] sits
//! behind one mutex; resolving a closed day, paying its winners, resetting
//! the jackpot and advancing `last_run_date` all happen under that lock, so
//! concurrent triggers draw a day at most once.
//!
//! Callers that cannot get the lock within the configured timeout receive
//! `ConcurrentDrawConflict` and may retry.

use crate::config::LotteryPolicy;
use crate::core::clock::Clock;
use crate::core::government_fund::GovernmentFund;
use crate::core::ledger_store::LedgerStore;
use crate::core::numbers::NumberSource;
use crate::types::{
    AccountId, DrawOutcome, EconomyError, LotteryState, LotteryTicket, LotteryView, Movement,
    OwnerId, TicketNumber, TicketPurchase, TransactionKind,
};
use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct LotteryEngine {
    ledger: Arc<LedgerStore>,
    fund: Arc<GovernmentFund>,
    clock: Arc<dyn Clock>,
    numbers: Arc<dyn NumberSource>,
    policy: LotteryPolicy,
    state: Mutex<LotteryState>,
    /// Tickets by the day they were bought for
    tickets: DashMap<NaiveDate, Vec<LotteryTicket>>,
    next_ticket: AtomicU64,
}

impl LotteryEngine {
    pub fn new(
        ledger: Arc<LedgerStore>,
        fund: Arc<GovernmentFund>,
        clock: Arc<dyn Clock>,
        numbers: Arc<dyn NumberSource>,
        policy: LotteryPolicy,
    ) -> Self {
        let state = LotteryState {
            current_jackpot: policy.base_jackpot,
            last_run_date: clock.today(),
            last_winning_number: None,
        };
        LotteryEngine {
            ledger,
            fund,
            clock,
            numbers,
            policy,
            state: Mutex::new(state),
            tickets: DashMap::new(),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Resolve the last open day if the calendar has moved past it
    ///
    /// # Returns
    ///
    /// The draw performed, or `None` when today has already been reached
    pub fn ensure_drawn(&self) -> Result<Option<DrawOutcome>, EconomyError> {
        let mut state = self.lock_state()?;
        self.draw_locked(&mut state)
    }

    /// Buy a ticket for today
    ///
    /// Any pending draw is resolved first. The ticket price is split between
    /// the jackpot and the government fund.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `numbers` is not exactly five decimal digits (nothing is charged)
    /// - The account holds less than the ticket price
    /// - The draw lock could not be acquired in time
    pub fn buy_ticket(
        &self,
        account: AccountId,
        owner: OwnerId,
        numbers: &str,
    ) -> Result<TicketPurchase, EconomyError> {
        let numbers = TicketNumber::parse(numbers)?;

        let mut state = self.lock_state()?;
        let draw = self.draw_locked(&mut state)?;

        let jackpot = state
            .current_jackpot
            .checked_add(self.policy.jackpot_share)
            .ok_or_else(|| EconomyError::arithmetic_overflow("lottery jackpot"))?;

        let id = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let mut fund = self.fund.begin();
        if !self.policy.fund_share.is_zero() {
            fund.credit(self.policy.fund_share, &format!("Lottery ticket {}", id))?;
        }
        self.ledger.apply_movement(Movement::covered_debit(
            account,
            self.policy.ticket_price,
            TransactionKind::LotteryTicket,
            format!("Lottery ticket {}", numbers),
        ))?;
        fund.commit();
        state.current_jackpot = jackpot;

        let ticket = LotteryTicket {
            id,
            account,
            owner,
            numbers,
            date: state.last_run_date,
        };
        self.tickets
            .entry(ticket.date)
            .or_default()
            .push(ticket.clone());

        tracing::info!(
            ticket = id,
            account,
            numbers = %ticket.numbers,
            jackpot = %jackpot,
            "Sold lottery ticket"
        );
        Ok(TicketPurchase {
            ticket,
            draw,
            jackpot,
        })
    }

    /// Lottery page for one account, after resolving any pending draw
    pub fn view(
        &self,
        account: AccountId,
    ) -> Result<(LotteryView, Option<DrawOutcome>), EconomyError> {
        let mut state = self.lock_state()?;
        let draw = self.draw_locked(&mut state)?;
        let tickets_today = self
            .tickets_on(state.last_run_date)
            .into_iter()
            .filter(|ticket| ticket.account == account)
            .collect();
        let view = LotteryView {
            state: state.clone(),
            tickets_today,
        };
        Ok((view, draw))
    }

    pub fn state(&self) -> Result<LotteryState, EconomyError> {
        Ok(self.lock_state()?.clone())
    }

    pub fn tickets_on(&self, date: NaiveDate) -> Vec<LotteryTicket> {
        self.tickets
            .get(&date)
            .map(|tickets| tickets.value().clone())
            .unwrap_or_default()
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, LotteryState>, EconomyError> {
        self.state
            .try_lock_for(self.policy.draw_lock_timeout())
            .ok_or(EconomyError::ConcurrentDrawConflict)
    }

    /// Draw for `state.last_run_date` if today is later; caller holds the state lock
    fn draw_locked(&self, state: &mut LotteryState) -> Result<Option<DrawOutcome>, EconomyError> {
        let today = self.clock.today();
        if today <= state.last_run_date {
            return Ok(None);
        }

        let closed_date = state.last_run_date;
        let winning_number = TicketNumber::parse(&self.numbers.digits(TicketNumber::WIDTH))?;
        let mut winners: Vec<LotteryTicket> = self
            .tickets_on(closed_date)
            .into_iter()
            .filter(|ticket| ticket.numbers == winning_number)
            .collect();

        // Accounts removed since the purchase forfeit their share.
        winners.retain(|ticket| {
            let present = self.ledger.contains(ticket.account);
            if !present {
                tracing::warn!(
                    ticket = ticket.id,
                    account = ticket.account,
                    "Winning ticket has no account, skipping"
                );
            }
            present
        });

        let jackpot = state.current_jackpot;
        let prize_per_winner = if winners.is_empty() {
            Decimal::ZERO
        } else {
            jackpot
                .checked_div(Decimal::from(winners.len()))
                .ok_or_else(|| EconomyError::arithmetic_overflow("jackpot split"))?
                .round_dp_with_strategy(2, RoundingStrategy::ToZero)
        };

        if !prize_per_winner.is_zero() {
            let legs = winners
                .iter()
                .map(|ticket| {
                    Movement::credit(
                        ticket.account,
                        prize_per_winner,
                        TransactionKind::LotteryWin,
                        format!("Lottery win {} ({})", winning_number, closed_date),
                    )
                })
                .collect();
            self.ledger.apply_movements(legs)?;
        }

        state.current_jackpot = self.policy.base_jackpot;
        state.last_run_date = today;
        state.last_winning_number = Some(winning_number.clone());

        tracing::info!(
            closed = %closed_date,
            winning_number = %winning_number,
            winners = winners.len(),
            prize = %prize_per_winner,
            "Resolved lottery draw"
        );
        Ok(Some(DrawOutcome {
            closed_date,
            run_date: today,
            winning_number,
            winners,
            prize_per_winner,
            jackpot,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::numbers::ScriptedDigits;
    use crate::types::{Account, AccountNumber};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::thread;

    struct Fixture {
        clock: Arc<ManualClock>,
        ledger: Arc<LedgerStore>,
        fund: Arc<GovernmentFund>,
        lottery: LotteryEngine,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 10, 18, 0, 0).unwrap()
    }

    fn fixture(policy: LotteryPolicy, winning: &[&str]) -> Fixture {
        let clock = Arc::new(ManualClock::new(start()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let ledger = Arc::new(LedgerStore::new(Arc::clone(&dyn_clock)));
        let fund = Arc::new(GovernmentFund::new(Decimal::ZERO, Arc::clone(&dyn_clock)));
        for id in 1..=3 {
            let number = AccountNumber::parse(&format!("{:010}", id)).unwrap();
            ledger.open(Account::new(id, number, id as u32, start())).unwrap();
            ledger
                .apply_movement(Movement::credit(
                    id,
                    Decimal::new(1000, 0),
                    TransactionKind::Deposit,
                    "cash",
                ))
                .unwrap();
        }
        let numbers = Arc::new(ScriptedDigits::new(winning.iter().copied()));
        let lottery = LotteryEngine::new(
            Arc::clone(&ledger),
            Arc::clone(&fund),
            dyn_clock,
            numbers,
            policy,
        );
        Fixture {
            clock,
            ledger,
            fund,
            lottery,
        }
    }

    fn rake_only_policy() -> LotteryPolicy {
        LotteryPolicy {
            jackpot_share: Decimal::ZERO,
            fund_share: Decimal::new(500, 0),
            ..LotteryPolicy::default()
        }
    }

    #[test]
    fn test_two_winners_split_jackpot() {
        let f = fixture(rake_only_policy(), &["12345"]);
        f.lottery.buy_ticket(1, 1, "12345").unwrap();
        f.lottery.buy_ticket(2, 2, "12345").unwrap();
        f.lottery.buy_ticket(3, 3, "54321").unwrap();

        f.clock.advance(Duration::days(1));
        let outcome = f.lottery.ensure_drawn().unwrap().unwrap();

        assert_eq!(outcome.closed_date, start().date_naive());
        assert_eq!(outcome.run_date, start().date_naive() + Duration::days(1));
        assert_eq!(outcome.winners.len(), 2);
        assert_eq!(outcome.prize_per_winner, Decimal::new(25000, 0));
        assert_eq!(f.ledger.balance(1).unwrap(), Decimal::new(25500, 0));
        assert_eq!(f.ledger.balance(2).unwrap(), Decimal::new(25500, 0));
        assert_eq!(f.ledger.balance(3).unwrap(), Decimal::new(500, 0));

        let state = f.lottery.state().unwrap();
        assert_eq!(state.current_jackpot, Decimal::new(50000, 0));
        assert_eq!(state.last_run_date, start().date_naive() + Duration::days(1));
        assert_eq!(state.last_winning_number.unwrap().as_str(), "12345");
    }

    #[test]
    fn test_repeated_triggers_draw_once() {
        let f = fixture(LotteryPolicy::default(), &["00001", "00002"]);
        assert!(f.lottery.ensure_drawn().unwrap().is_none());

        f.clock.advance(Duration::days(1));
        assert!(f.lottery.ensure_drawn().unwrap().is_some());
        assert!(f.lottery.ensure_drawn().unwrap().is_none());
        assert!(f.lottery.ensure_drawn().unwrap().is_none());
        assert_eq!(f.lottery.state().unwrap().last_winning_number.unwrap().as_str(), "00001");
    }

    #[test]
    fn test_concurrent_triggers_draw_once() {
        let f = Arc::new(fixture(LotteryPolicy::default(), &[]));
        f.clock.advance(Duration::days(1));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let f = Arc::clone(&f);
                thread::spawn(move || f.lottery.ensure_drawn())
            })
            .collect();
        let draws = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|result| matches!(result, Ok(Some(_))))
            .count();
        assert_eq!(draws, 1);
    }

    #[test]
    fn test_jackpot_grows_and_resets_without_winners() {
        let f = fixture(LotteryPolicy::default(), &["99999"]);
        let purchase = f.lottery.buy_ticket(1, 1, "11111").unwrap();
        assert_eq!(purchase.jackpot, Decimal::new(50250, 0));
        assert_eq!(f.fund.balance(), Decimal::new(250, 0));
        assert_eq!(f.ledger.balance(1).unwrap(), Decimal::new(500, 0));

        f.clock.advance(Duration::days(1));
        let next = f.lottery.buy_ticket(2, 2, "22222").unwrap();
        let draw = next.draw.unwrap();
        assert!(draw.winners.is_empty());
        assert_eq!(draw.jackpot, Decimal::new(50250, 0));
        assert_eq!(next.jackpot, Decimal::new(50250, 0));
        assert_eq!(next.ticket.date, start().date_naive() + Duration::days(1));
    }

    #[test]
    fn test_split_truncates_to_cents() {
        let policy = LotteryPolicy {
            base_jackpot: Decimal::new(100, 0),
            jackpot_share: Decimal::ZERO,
            fund_share: Decimal::new(500, 0),
            ..LotteryPolicy::default()
        };
        let f = fixture(policy, &["77777"]);
        for id in 1..=3 {
            f.lottery.buy_ticket(id, id as u32, "77777").unwrap();
        }
        f.clock.advance(Duration::days(1));
        let outcome = f.lottery.ensure_drawn().unwrap().unwrap();
        assert_eq!(outcome.prize_per_winner, Decimal::new(3333, 2));
    }

    #[test]
    fn test_rejected_purchases_change_nothing() {
        let f = fixture(LotteryPolicy::default(), &[]);

        assert!(matches!(
            f.lottery.buy_ticket(1, 1, "12a45"),
            Err(EconomyError::InvalidTicketFormat { .. })
        ));
        f.ledger.set_balance(2, Decimal::new(499, 0), "spent").unwrap();
        assert!(matches!(
            f.lottery.buy_ticket(2, 2, "12345"),
            Err(EconomyError::InsufficientFunds { .. })
        ));

        assert_eq!(f.ledger.balance(1).unwrap(), Decimal::new(1000, 0));
        assert_eq!(f.fund.balance(), Decimal::ZERO);
        assert_eq!(f.lottery.state().unwrap().current_jackpot, Decimal::new(50000, 0));
        assert!(f.lottery.tickets_on(start().date_naive()).is_empty());
    }

    #[test]
    fn test_winner_without_account_is_skipped() {
        let f = fixture(rake_only_policy(), &["12345"]);
        f.lottery.buy_ticket(1, 1, "12345").unwrap();
        f.lottery.buy_ticket(2, 2, "12345").unwrap();
        f.ledger.close(2).unwrap();

        f.clock.advance(Duration::days(1));
        let outcome = f.lottery.ensure_drawn().unwrap().unwrap();
        assert_eq!(outcome.winners.len(), 1);
        assert_eq!(outcome.prize_per_winner, Decimal::new(50000, 0));
        assert_eq!(f.ledger.balance(1).unwrap(), Decimal::new(50500, 0));
    }

    #[test]
    fn test_held_draw_lock_reports_conflict() {
        let f = fixture(
            LotteryPolicy {
                draw_lock_timeout_ms: 5,
                ..LotteryPolicy::default()
            },
            &[],
        );
        let _held = f.lottery.state.lock();
        assert_eq!(f.lottery.ensure_drawn().unwrap_err(), EconomyError::ConcurrentDrawConflict);
    }

    #[test]
    fn test_view_lists_own_tickets_today() {
        let f = fixture(LotteryPolicy::default(), &[]);
        f.lottery.buy_ticket(1, 1, "11111").unwrap();
        f.lottery.buy_ticket(1, 1, "22222").unwrap();
        f.lottery.buy_ticket(2, 2, "33333").unwrap();

        let (view, draw) = f.lottery.view(1).unwrap();
        assert!(draw.is_none());
        assert_eq!(view.tickets_today.len(), 2);
        assert_eq!(view.state.current_jackpot, Decimal::new(50750, 0));
    }
}

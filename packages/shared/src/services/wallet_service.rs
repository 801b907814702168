use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::models::session::{Session, Transaction, TransactionKind};
use crate::repositories::session_repository::SessionRepository;
use crate::services::errors::wallet_errors::WalletError;
use crate::services::history_service::HistoryService;

pub const TEST_OPERATOR: &str = "TestOp";

/// Payout for the winner of a match, in minor units.
pub fn calculate_win_amount(bet_minor: i64, win_factor: f64) -> i64 {
    (bet_minor as f64 * 2.0 * win_factor).floor() as i64
}

/// One operator's wallet API. Amounts are minor units.
#[async_trait]
pub trait OperatorWallet: Send + Sync {
    /// Returns the new balance.
    async fn post_bet(
        &self,
        session: &Session,
        amount: i64,
        round_id: &str,
    ) -> Result<i64, WalletError>;

    /// Returns `(new balance, winnings)`.
    async fn post_win(
        &self,
        session: &Session,
        amount: i64,
        round_id: &str,
    ) -> Result<(i64, i64), WalletError>;

    async fn fetch_balance(&self, session: &Session) -> Result<i64, WalletError>;
}

pub fn validate_request(session: &Session, amount: i64, round_id: &str) -> Result<(), WalletError> {
    if session.id.is_empty() {
        return Err(WalletError::MissingSession);
    }
    if amount <= 0 {
        return Err(WalletError::InvalidAmount(amount));
    }
    if round_id.is_empty() {
        return Err(WalletError::MissingRoundId);
    }
    Ok(())
}

/// Built-in operator with fixed answers, for local runs and tests.
pub struct TestOperatorWallet;

#[async_trait]
impl OperatorWallet for TestOperatorWallet {
    async fn post_bet(
        &self,
        session: &Session,
        amount: i64,
        round_id: &str,
    ) -> Result<i64, WalletError> {
        validate_request(session, amount, round_id)?;
        Ok(100)
    }

    async fn post_win(
        &self,
        session: &Session,
        amount: i64,
        round_id: &str,
    ) -> Result<(i64, i64), WalletError> {
        validate_request(session, amount, round_id)?;
        Ok((199, 99))
    }

    async fn fetch_balance(&self, session: &Session) -> Result<i64, WalletError> {
        if session.id.is_empty() {
            return Err(WalletError::MissingSession);
        }
        Ok(10000)
    }
}

#[derive(Clone, Default)]
pub struct WalletRegistry {
    wallets: HashMap<String, Arc<dyn OperatorWallet>>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in operator.
    pub fn with_builtin() -> Self {
        Self::new().register(TEST_OPERATOR, Arc::new(TestOperatorWallet))
    }

    pub fn register(mut self, operator_name: &str, wallet: Arc<dyn OperatorWallet>) -> Self {
        self.wallets.insert(operator_name.to_string(), wallet);
        self
    }

    pub fn get(&self, operator_name: &str) -> Result<Arc<dyn OperatorWallet>, WalletError> {
        self.wallets
            .get(operator_name)
            .cloned()
            .ok_or_else(|| WalletError::UnknownOperator(operator_name.to_string()))
    }
}

/// Session-aware wallet access: picks the operator, keeps the session
/// balance current and archives a transaction for every movement.
#[derive(Clone)]
pub struct WalletService {
    registry: WalletRegistry,
    sessions: SessionRepository,
    history: HistoryService,
}

impl WalletService {
    pub fn new(registry: WalletRegistry, sessions: SessionRepository, history: HistoryService) -> Self {
        Self {
            registry,
            sessions,
            history,
        }
    }

    async fn session(&self, session_id: &str) -> Result<Session, WalletError> {
        if session_id.is_empty() {
            return Err(WalletError::MissingSession);
        }
        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| WalletError::SessionNotFound(session_id.to_string()))
    }

    async fn store_balance(&self, session: &Session, balance: i64) -> Result<(), WalletError> {
        self.sessions.update_balance(&session.id, balance).await?;
        Ok(())
    }

    pub async fn place_bet(
        &self,
        session_id: &str,
        amount: i64,
        round_id: &str,
    ) -> Result<i64, WalletError> {
        let session = self.session(session_id).await?;
        let wallet = self.registry.get(&session.operator_name)?;

        let balance = wallet.post_bet(&session, amount, round_id).await?;
        self.store_balance(&session, balance).await?;
        self.history.record_transaction(Transaction::new(
            &session,
            TransactionKind::Bet,
            amount,
            round_id,
        ));

        info!(session_id = %session_id, round_id = %round_id, amount, balance, "Bet placed");
        Ok(balance)
    }

    pub async fn pay_win(
        &self,
        session_id: &str,
        amount: i64,
        round_id: &str,
    ) -> Result<(i64, i64), WalletError> {
        let session = self.session(session_id).await?;
        let wallet = self.registry.get(&session.operator_name)?;

        let (balance, winnings) = wallet.post_win(&session, amount, round_id).await?;
        self.store_balance(&session, balance).await?;
        self.history.record_transaction(Transaction::new(
            &session,
            TransactionKind::Win,
            amount,
            round_id,
        ));

        info!(session_id = %session_id, round_id = %round_id, amount, balance, "Win paid");
        Ok((balance, winnings))
    }

    /// Returns a stake that was taken for a round that never started.
    pub async fn refund(
        &self,
        session_id: &str,
        amount: i64,
        round_id: &str,
    ) -> Result<i64, WalletError> {
        let session = self.session(session_id).await?;
        let wallet = self.registry.get(&session.operator_name)?;

        let (balance, _) = wallet.post_win(&session, amount, round_id).await?;
        self.store_balance(&session, balance).await?;
        self.history.record_transaction(
            Transaction::new(&session, TransactionKind::Refund, amount, round_id)
                .with_description("stake returned after failed bet collection"),
        );

        info!(session_id = %session_id, round_id = %round_id, amount, balance, "Stake refunded");
        Ok(balance)
    }

    pub async fn balance(&self, session_id: &str) -> Result<i64, WalletError> {
        let session = self.session(session_id).await?;
        let wallet = self.registry.get(&session.operator_name)?;
        let balance = wallet.fetch_balance(&session).await?;
        self.store_balance(&session, balance).await?;
        Ok(balance)
    }
}

//! Asynchronous transaction submission.
//!
//! `Sdex` owns the source account's sequence number. Each call to `submit_ops`
//! consumes one sequence number, builds the transaction and hands it to a
//! spawned task that signs, submits and reports back. Reports are drained at
//! the start of the next submission, so a rejected sequence number is reloaded
//! from the ledger before it is used again.

use std::sync::Arc;
use std::time::Duration;

use reef_core::{ManageOffer, Number};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::client::{LedgerClient, SignedTransaction, Transaction};
use crate::error::{LedgerError, LedgerResult, SubmitError};
use crate::sequence::SequenceState;
use crate::signer::TxSigner;

/// Most operations a ledger transaction may carry.
pub const MAX_OPS_PER_TRANSACTION: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdexConfig {
    #[serde(default = "default_max_ops")]
    pub max_ops_per_transaction: usize,
    /// Build and log transactions without sending them.
    #[serde(default)]
    pub simulate: bool,
    #[serde(default = "default_backoff_ms")]
    pub rate_limit_backoff_ms: u64,
    #[serde(default = "default_attempts")]
    pub max_submit_attempts: u32,
}

fn default_max_ops() -> usize {
    MAX_OPS_PER_TRANSACTION
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_attempts() -> u32 {
    3
}

impl Default for SdexConfig {
    fn default() -> Self {
        Self {
            max_ops_per_transaction: default_max_ops(),
            simulate: false,
            rate_limit_backoff_ms: default_backoff_ms(),
            max_submit_attempts: default_attempts(),
        }
    }
}

/// Invoked once the submission finishes, with the hash or the failure.
/// In simulation mode the hash is empty.
pub type SubmitCallback = Box<dyn FnOnce(Result<String, SubmitError>) + Send + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted { hash: String },
    Simulated,
    Failed(SubmitError),
}

/// Awaitable completion of one submission. Dropping it does not cancel anything.
#[derive(Debug)]
pub struct SubmitHandle {
    rx: oneshot::Receiver<SubmitOutcome>,
}

impl SubmitHandle {
    fn ready(outcome: SubmitOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }

    pub async fn wait(self) -> SubmitOutcome {
        self.rx.await.unwrap_or_else(|_| {
            SubmitOutcome::Failed(SubmitError::Transport("submission task dropped".to_string()))
        })
    }
}

#[derive(Debug)]
struct SubmitReport {
    sequence: i64,
    error: Option<SubmitError>,
}

pub struct Sdex {
    client: Arc<dyn LedgerClient>,
    signer: Arc<TxSigner>,
    base_fee: Decimal,
    config: SdexConfig,
    source_account: String,
    sequence: SequenceState,
    reports_tx: mpsc::UnboundedSender<SubmitReport>,
    reports_rx: mpsc::UnboundedReceiver<SubmitReport>,
}

impl Sdex {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        signer: TxSigner,
        base_fee: Decimal,
        config: SdexConfig,
    ) -> Self {
        Self::with_source_account(client, signer.source_account(), signer, base_fee, config)
    }

    /// Use an explicit source account id instead of the one derived from the key.
    pub fn with_source_account(
        client: Arc<dyn LedgerClient>,
        source_account: impl Into<String>,
        signer: TxSigner,
        base_fee: Decimal,
        config: SdexConfig,
    ) -> Self {
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        Self {
            client,
            signer: Arc::new(signer),
            base_fee,
            config,
            source_account: source_account.into(),
            sequence: SequenceState::Uninitialized,
            reports_tx,
            reports_rx,
        }
    }

    pub fn source_account(&self) -> &str {
        &self.source_account
    }

    pub fn sequence_state(&self) -> SequenceState {
        self.sequence
    }

    pub fn is_simulated(&self) -> bool {
        self.config.simulate
    }

    /// Apply outcomes of earlier submissions to the sequence state.
    fn drain_reports(&mut self) {
        while let Ok(report) = self.reports_rx.try_recv() {
            match report.error {
                None => {}
                Some(SubmitError::BadSequence) => {
                    warn!(sequence = report.sequence, "Stale sequence number, reloading before next submission");
                    self.sequence.mark_stale();
                }
                Some(e) => {
                    debug!(sequence = report.sequence, error = %e, "Submission failed, reloading sequence");
                    self.sequence.request_reload();
                }
            }
        }
    }

    async fn next_sequence(&mut self) -> LedgerResult<i64> {
        if self.sequence.needs_reload() {
            let loaded = match self.client.sequence_for_account(&self.source_account).await {
                Ok(n) => n,
                Err(e) => {
                    self.sequence.request_reload();
                    return Err(e);
                }
            };
            debug!(previous = ?self.sequence, loaded, "Loaded sequence number");
            self.sequence.load(loaded);
        }
        self.sequence
            .next()
            .ok_or_else(|| LedgerError::Sequence(format!("{:?}", self.sequence)))
    }

    /// Submit `ops` as one transaction.
    ///
    /// Returns `None` for an empty batch. The returned handle may be awaited or
    /// dropped; the callback runs either way.
    pub async fn submit_ops(
        &mut self,
        ops: Vec<ManageOffer>,
        callback: Option<SubmitCallback>,
    ) -> LedgerResult<Option<SubmitHandle>> {
        if ops.is_empty() {
            debug!("No operations to submit");
            return Ok(None);
        }
        if ops.len() > self.config.max_ops_per_transaction {
            return Err(LedgerError::TooManyOperations {
                count: ops.len(),
                max: self.config.max_ops_per_transaction,
            });
        }

        if self.config.simulate {
            for op in &ops {
                info!(%op, "Simulation mode, operation not submitted");
            }
            if let Some(cb) = callback {
                cb(Ok(String::new()));
            }
            return Ok(Some(SubmitHandle::ready(SubmitOutcome::Simulated)));
        }

        self.drain_reports();
        let sequence = self.next_sequence().await?;
        let fee = Number::from_decimal(self.base_fee * Decimal::from(ops.len() as u64), 7)?;
        let tx = Transaction {
            source_account: self.source_account.clone(),
            sequence,
            fee,
            operations: ops,
        };
        info!(sequence, ops = tx.operations.len(), fee = %tx.fee, "Submitting transaction");

        let client = Arc::clone(&self.client);
        let signer = Arc::clone(&self.signer);
        let reports = self.reports_tx.clone();
        let backoff = Duration::from_millis(self.config.rate_limit_backoff_ms);
        let attempts = self.config.max_submit_attempts.max(1);
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(async move {
            let result = match signer.sign(tx).await {
                Ok(signed) => submit_with_retry(client.as_ref(), &signed, backoff, attempts).await,
                Err(e) => Err(SubmitError::Rejected(format!("signing failed: {e}"))),
            };

            let outcome = match &result {
                Ok(hash) => {
                    info!(sequence, hash = %hash, "Transaction accepted");
                    SubmitOutcome::Accepted { hash: hash.clone() }
                }
                Err(e) => {
                    warn!(sequence, error = %e, "Transaction failed");
                    SubmitOutcome::Failed(e.clone())
                }
            };
            let _ = reports.send(SubmitReport {
                sequence,
                error: result.as_ref().err().cloned(),
            });
            if let Some(cb) = callback {
                cb(result);
            }
            let _ = done_tx.send(outcome);
        });

        Ok(Some(SubmitHandle { rx: done_rx }))
    }
}

async fn submit_with_retry(
    client: &dyn LedgerClient,
    signed: &SignedTransaction,
    backoff: Duration,
    attempts: u32,
) -> Result<String, SubmitError> {
    let mut attempt = 1;
    loop {
        match client.submit_transaction(signed).await {
            Err(SubmitError::RateLimited) if attempt < attempts => {
                warn!(attempt, backoff_ms = backoff.as_millis() as u64, "Rate limited, retrying");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AccountSnapshot;
    use alloy::signers::local::PrivateKeySigner;
    use parking_lot::Mutex;
    use reef_core::{Asset, OrderBook, TradingPair};
    use reef_exchange::BoxFuture;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[derive(Default)]
    struct MockLedger {
        sequence: Mutex<i64>,
        responses: Mutex<VecDeque<Result<String, SubmitError>>>,
        submitted: Mutex<Vec<SignedTransaction>>,
        loads: AtomicUsize,
    }

    impl LedgerClient for MockLedger {
        fn load_account<'a>(&'a self, _account: &'a str) -> BoxFuture<'a, LedgerResult<AccountSnapshot>> {
            Box::pin(async { Ok(AccountSnapshot::default()) })
        }

        fn sequence_for_account<'a>(&'a self, _account: &'a str) -> BoxFuture<'a, LedgerResult<i64>> {
            Box::pin(async move {
                self.loads.fetch_add(1, Ordering::SeqCst);
                Ok(*self.sequence.lock())
            })
        }

        fn order_book<'a>(&'a self, _pair: &'a TradingPair) -> BoxFuture<'a, LedgerResult<OrderBook>> {
            Box::pin(async { Ok(OrderBook::default()) })
        }

        fn submit_transaction<'a>(
            &'a self,
            tx: &'a SignedTransaction,
        ) -> BoxFuture<'a, Result<String, SubmitError>> {
            Box::pin(async move {
                self.submitted.lock().push(tx.clone());
                self.responses
                    .lock()
                    .pop_front()
                    .unwrap_or_else(|| Ok(tx.hash.clone()))
            })
        }
    }

    fn op() -> ManageOffer {
        ManageOffer {
            offer_id: 0,
            selling: Asset::Native,
            buying: Asset::credit("USD", "GISSUER"),
            price: "0.2".parse().unwrap(),
            amount: "10".parse().unwrap(),
            source_account: None,
        }
    }

    fn sdex(ledger: Arc<MockLedger>, config: SdexConfig) -> Sdex {
        let key = PrivateKeySigner::from_slice(&hex::decode(KEY).unwrap()).unwrap();
        Sdex::with_source_account(ledger, "GME", TxSigner::single(key, "test"), dec!(0.00001), config)
    }

    fn fast_config() -> SdexConfig {
        SdexConfig {
            rate_limit_backoff_ms: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let ledger = Arc::new(MockLedger::default());
        let mut s = sdex(ledger.clone(), fast_config());
        assert!(s.submit_ops(vec![], None).await.unwrap().is_none());
        assert_eq!(ledger.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_too_many_ops() {
        let ledger = Arc::new(MockLedger::default());
        let config = SdexConfig {
            max_ops_per_transaction: 2,
            ..fast_config()
        };
        let mut s = sdex(ledger, config);
        let result = s.submit_ops(vec![op(), op(), op()], None).await;
        assert!(matches!(
            result,
            Err(LedgerError::TooManyOperations { count: 3, max: 2 })
        ));
    }

    #[tokio::test]
    async fn test_one_increment_per_transaction() {
        let ledger = Arc::new(MockLedger::default());
        *ledger.sequence.lock() = 100;
        let mut s = sdex(ledger.clone(), fast_config());

        let first = s.submit_ops(vec![op(), op()], None).await.unwrap().unwrap();
        assert!(matches!(first.wait().await, SubmitOutcome::Accepted { .. }));
        let second = s.submit_ops(vec![op()], None).await.unwrap().unwrap();
        second.wait().await;

        let submitted = ledger.submitted.lock().clone();
        let sequences: Vec<i64> = submitted.iter().map(|t| t.transaction.sequence).collect();
        assert_eq!(sequences, vec![101, 102]);
        assert_eq!(submitted[0].transaction.fee, "0.00002".parse().unwrap());
        assert_eq!(ledger.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reloads_after_bad_sequence() {
        let ledger = Arc::new(MockLedger::default());
        *ledger.sequence.lock() = 100;
        ledger.responses.lock().push_back(Err(SubmitError::BadSequence));
        let mut s = sdex(ledger.clone(), fast_config());

        let handle = s.submit_ops(vec![op()], None).await.unwrap().unwrap();
        assert_eq!(handle.wait().await, SubmitOutcome::Failed(SubmitError::BadSequence));

        *ledger.sequence.lock() = 200;
        let handle = s.submit_ops(vec![op()], None).await.unwrap().unwrap();
        assert!(matches!(handle.wait().await, SubmitOutcome::Accepted { .. }));

        let sequences: Vec<i64> = ledger
            .submitted
            .lock()
            .iter()
            .map(|t| t.transaction.sequence)
            .collect();
        assert_eq!(sequences, vec![101, 201]);
        assert_eq!(ledger.loads.load(Ordering::SeqCst), 2);
        assert_eq!(s.sequence_state(), SequenceState::Loaded(201));
    }

    #[tokio::test]
    async fn test_rate_limit_retries_same_transaction() {
        let ledger = Arc::new(MockLedger::default());
        {
            let mut responses = ledger.responses.lock();
            responses.push_back(Err(SubmitError::RateLimited));
            responses.push_back(Err(SubmitError::RateLimited));
            responses.push_back(Ok("abc".to_string()));
        }
        let mut s = sdex(ledger.clone(), fast_config());

        let handle = s.submit_ops(vec![op()], None).await.unwrap().unwrap();
        assert_eq!(
            handle.wait().await,
            SubmitOutcome::Accepted {
                hash: "abc".to_string()
            }
        );
        let submitted = ledger.submitted.lock().clone();
        assert_eq!(submitted.len(), 3);
        assert!(submitted.iter().all(|t| t.transaction.sequence == 1));
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_max_attempts() {
        let ledger = Arc::new(MockLedger::default());
        for _ in 0..5 {
            ledger.responses.lock().push_back(Err(SubmitError::RateLimited));
        }
        let mut s = sdex(ledger.clone(), fast_config());

        let handle = s.submit_ops(vec![op()], None).await.unwrap().unwrap();
        assert_eq!(handle.wait().await, SubmitOutcome::Failed(SubmitError::RateLimited));
        assert_eq!(ledger.submitted.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_simulation_calls_back_with_empty_hash() {
        let ledger = Arc::new(MockLedger::default());
        let config = SdexConfig {
            simulate: true,
            ..fast_config()
        };
        let mut s = sdex(ledger.clone(), config);

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let callback: SubmitCallback = Box::new(move |result| {
            *sink.lock() = Some(result);
        });
        let handle = s.submit_ops(vec![op()], Some(callback)).await.unwrap().unwrap();

        assert_eq!(handle.wait().await, SubmitOutcome::Simulated);
        assert_eq!(seen.lock().clone(), Some(Ok(String::new())));
        assert!(ledger.submitted.lock().is_empty());
        assert_eq!(ledger.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_callback_receives_hash() {
        let ledger = Arc::new(MockLedger::default());
        ledger.responses.lock().push_back(Ok("deadbeef".to_string()));
        let mut s = sdex(ledger, fast_config());

        let (tx, rx) = oneshot::channel();
        let callback: SubmitCallback = Box::new(move |result| {
            let _ = tx.send(result);
        });
        s.submit_ops(vec![op()], Some(callback)).await.unwrap();
        assert_eq!(rx.await.unwrap(), Ok("deadbeef".to_string()));
    }
}

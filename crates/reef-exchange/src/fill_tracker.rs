//! Fill polling and dispatch.
//!
//! `FillTracker` polls a `TradeFetcher` for new trades on one pair and hands
//! every trade to every registered `FillHandler`. Handlers for a batch run as
//! separate tasks; the cursor only advances once the whole batch is done.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use reef_core::{Trade, TradingPair};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{BoxFuture, FillHandler, TradeFetcher};
use crate::error::{ExchangeError, ExchangeResult};

pub struct FillTracker {
    pair: TradingPair,
    fetcher: Arc<dyn TradeFetcher>,
    handlers: Vec<Arc<dyn FillHandler>>,
    interval: Duration,
    cursor: Option<String>,
}

impl FillTracker {
    pub fn new(pair: TradingPair, fetcher: Arc<dyn TradeFetcher>, interval: Duration) -> Self {
        Self {
            pair,
            fetcher,
            handlers: Vec::new(),
            interval,
            cursor: None,
        }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn FillHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Skip everything that happened before now.
    pub async fn seek_to_latest(&mut self) -> ExchangeResult<()> {
        self.cursor = self.fetcher.latest_trade_cursor().await?;
        debug!(cursor = ?self.cursor, pair = %self.pair, "Fill tracker positioned at latest trade");
        Ok(())
    }

    /// Fetch new trades once and dispatch them. Returns the number of trades seen.
    pub async fn poll_once(&mut self) -> ExchangeResult<usize> {
        let history = self
            .fetcher
            .trade_history(&self.pair, self.cursor.clone(), None)
            .await?;
        let count = history.trades.len();
        if count == 0 {
            return Ok(0);
        }

        let mut tasks = Vec::with_capacity(count * self.handlers.len());
        for trade in history.trades {
            let trade = Arc::new(trade);
            for handler in &self.handlers {
                let handler = Arc::clone(handler);
                let trade = Arc::clone(&trade);
                tasks.push(tokio::spawn(async move { handler.handle_fill(&trade).await }));
            }
        }

        let mut failures = 0usize;
        for joined in join_all(tasks).await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    warn!(error = %e, "Fill handler returned an error");
                }
                Err(e) => {
                    failures += 1;
                    error!(error = %e, "Fill handler task panicked");
                }
            }
        }

        if let Some(cursor) = history.cursor {
            self.cursor = Some(cursor);
        }
        info!(
            pair = %self.pair,
            trades = count,
            failures,
            cursor = ?self.cursor,
            "Dispatched fills"
        );
        Ok(count)
    }

    /// Run the polling loop until `shutdown` flips to true.
    pub fn spawn(mut self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.seek_to_latest().await {
                warn!(error = %e, "Could not fetch latest trade cursor, starting from the beginning");
            }
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.poll_once().await {
                            warn!(error = %e, pair = %self.pair, "Fill poll failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!(pair = %self.pair, "Fill tracker stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}

/// Logs every fill.
#[derive(Debug, Default)]
pub struct FillLogger;

impl FillHandler for FillLogger {
    fn handle_fill<'a>(&'a self, trade: &'a Trade) -> BoxFuture<'a, ExchangeResult<()>> {
        Box::pin(async move {
            info!(
                tx = %trade.transaction_id,
                pair = %trade.order.pair,
                side = %trade.order.side,
                price = %trade.order.price,
                volume = %trade.order.volume,
                cost = %trade.cost,
                fee = %trade.fee,
                "Fill"
            );
            Ok(())
        })
    }
}

/// Adapts a closure into a fill handler. Mostly useful in tests and wiring.
pub struct FnFillHandler<F>(pub F);

impl<F> FillHandler for FnFillHandler<F>
where
    F: Fn(&Trade) -> Result<(), String> + Send + Sync,
{
    fn handle_fill<'a>(&'a self, trade: &'a Trade) -> BoxFuture<'a, ExchangeResult<()>> {
        Box::pin(async move { (self.0)(trade).map_err(ExchangeError::Handler) })
    }
}

//! Application wiring and main loop.

use std::sync::Arc;
use std::time::Duration;

use reef_core::{Offer, OrderConstraints, Trade, TradingPair, LEDGER_PRECISION};
use reef_exchange::{
    DailyVolumeSource, DailyVolumeTracker, FillLogger, FillTracker, FnFillHandler, OrderBookSource,
    TradeFetcher,
};
use reef_filter::{
    ConstraintsFilter, DailyVolumeFilter, DedupeFilter, MakerModeFilter, PriceBoundsFilter,
    SubmitFilter,
};
use reef_ledger::{LedgerBook, LedgerClient, OfferBuilder, PaperLedger, Sdex, TxSigner};
use reef_strategy::{ComposeStrategy, FixedLevelProvider, SellSideStrategy, SideStrategy, Strategy};
use reef_telemetry::Metrics;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, FilterConfig, StrategyMode};
use crate::error::AppResult;
use crate::timing::IntervalTimeController;
use crate::trader::{CycleOutcome, Trader};

pub struct Application {
    ledger: Arc<PaperLedger>,
    trader: Trader,
    fill_tracker: Option<FillTracker>,
    timer: IntervalTimeController,
}

impl Application {
    /// Load keys and build the application on a paper ledger.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let source = config.source_key.to_source()?;
        let trading = config
            .trading_key
            .as_ref()
            .map(|k| k.to_source())
            .transpose()?;
        let signer = TxSigner::load(&source, trading.as_ref(), config.network_id.clone())?;
        Self::with_signer(config, signer)
    }

    pub fn with_signer(config: AppConfig, signer: TxSigner) -> AppResult<Self> {
        config.validate()?;
        let pair = config.pair();
        let source_account = signer.source_account();
        let trading_account = signer.trading_account();
        info!(
            pair = %pair,
            source = %source_account,
            trading = %trading_account,
            mode = ?config.mode,
            simulate = config.sdex.simulate,
            "Building trader"
        );

        let ledger = Arc::new(PaperLedger::new());
        seed_paper(&ledger, &config, &source_account, &trading_account)?;
        let client: Arc<dyn LedgerClient> = ledger.clone();

        let builder = OfferBuilder::new(
            config.ledger.clone(),
            source_account.clone(),
            trading_account.clone(),
        );
        let op_source = (source_account != trading_account).then(|| trading_account.clone());

        let volume = Arc::new(DailyVolumeTracker::new(pair.clone()));
        let strategy = build_strategy(&config)?;
        let filters = build_filters(&config, &pair, &client, volume.clone(), op_source)?;

        let fetcher: Arc<dyn TradeFetcher> = ledger.clone();
        let mut fill_tracker = FillTracker::new(
            pair.clone(),
            fetcher,
            Duration::from_millis(config.fill_tracker_interval_ms),
        );
        fill_tracker.register_handler(Arc::new(FillLogger));
        fill_tracker.register_handler(volume);
        fill_tracker.register_handler(Arc::new(FnFillHandler(
            |trade: &Trade| -> Result<(), String> {
                Metrics::fill(&trade.order.side.to_string());
                Ok(())
            },
        )));
        for handler in strategy.fill_handlers() {
            fill_tracker.register_handler(handler);
        }
        debug!(handlers = fill_tracker.handler_count(), "Fill handlers registered");

        let sdex = Sdex::new(
            client.clone(),
            signer,
            config.ledger.base_fee,
            config.sdex.clone(),
        );
        let trader = Trader::new(
            pair,
            client,
            strategy,
            builder,
            sdex,
            filters,
            config.delete_cycles_threshold,
        );

        Ok(Self {
            ledger,
            trader,
            fill_tracker: Some(fill_tracker),
            timer: IntervalTimeController::from_millis(
                config.tick_interval_ms,
                config.max_tick_delay_ms,
            ),
        })
    }

    pub fn ledger(&self) -> &Arc<PaperLedger> {
        &self.ledger
    }

    pub fn trader_mut(&mut self) -> &mut Trader {
        &mut self.trader
    }

    /// Run cycles until ctrl-c.
    pub async fn run(mut self) -> AppResult<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let fills = self.fill_tracker.take().map(|t| t.spawn(shutdown_rx));

        info!(pair = %self.trader.pair(), "Entering update loop");
        let mut cycles = 0u64;
        loop {
            if self.timer.should_update() {
                cycles += 1;
                if let CycleOutcome::Failed { delete_all, .. } = self.trader.update().await {
                    if delete_all.is_some() {
                        warn!(cycles, "Offers deleted after repeated failures");
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.timer.sleep_time()) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!(cycles, "Shutting down");
        let _ = shutdown_tx.send(true);
        if let Some(handle) = fills {
            if let Err(e) = handle.await {
                warn!(error = %e, "Fill tracker task ended abnormally");
            }
        }
        match Metrics::render() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => warn!(error = %e, "Could not render metrics"),
        }
        Ok(())
    }
}

fn seed_paper(
    ledger: &PaperLedger,
    config: &AppConfig,
    source_account: &str,
    trading_account: &str,
) -> AppResult<()> {
    ledger.create_account(source_account, config.paper.sequence);
    if trading_account != source_account {
        ledger.create_account(trading_account, 0);
    }
    for line in &config.paper.balances {
        ledger.set_balance(trading_account, &line.asset, line.balance, line.limit)?;
        // a separate source account pays the fees
        if trading_account != source_account && line.asset.is_native() {
            ledger.set_balance(source_account, &line.asset, line.balance, None)?;
        }
    }
    for offer in &config.paper.resting_offers {
        let id = ledger.place_offer(Offer {
            id: 0,
            seller: offer.seller.clone(),
            selling: offer.selling.clone(),
            buying: offer.buying.clone(),
            price: offer.price,
            amount: offer.amount,
        });
        debug!(id, seller = %offer.seller, "Seeded resting offer");
    }
    Ok(())
}

/// Two-sided strategy for the configured mode.
pub fn build_strategy(config: &AppConfig) -> AppResult<Box<dyn Strategy>> {
    let (base, quote) = (config.base.clone(), config.quote.clone());
    if config.mode == StrategyMode::Delete {
        return Ok(Box::new(ComposeStrategy::delete(base, quote)));
    }

    let buy: Box<dyn SideStrategy> = Box::new(SellSideStrategy::new(
        "buy",
        quote.clone(),
        base.clone(),
        Box::new(FixedLevelProvider::for_buy_side(
            &config.buy.levels,
            LEDGER_PRECISION,
        )?),
        config.buy.price_tolerance,
        config.buy.amount_tolerance,
        config.buy.divide_amount_by_price,
    )?);
    let sell: Box<dyn SideStrategy> = Box::new(SellSideStrategy::new(
        "sell",
        base.clone(),
        quote.clone(),
        Box::new(FixedLevelProvider::new(config.sell.levels.clone())),
        config.sell.price_tolerance,
        config.sell.amount_tolerance,
        config.sell.divide_amount_by_price,
    )?);
    Ok(Box::new(ComposeStrategy::new(base, quote, buy, sell)))
}

/// Filters in configuration order.
pub fn build_filters(
    config: &AppConfig,
    pair: &TradingPair,
    client: &Arc<dyn LedgerClient>,
    volume: Arc<dyn DailyVolumeSource>,
    op_source: Option<String>,
) -> AppResult<Vec<SubmitFilter>> {
    config
        .filters
        .iter()
        .map(|filter| -> AppResult<SubmitFilter> {
            Ok(match filter {
                FilterConfig::OrderConstraints { overrides } => {
                    SubmitFilter::OrderConstraints(ConstraintsFilter::new(
                        pair.clone(),
                        OrderConstraints::ledger().with_override(overrides),
                    ))
                }
                FilterConfig::PriceBounds {
                    min_price,
                    max_price,
                } => SubmitFilter::PriceBounds(PriceBoundsFilter::new(
                    pair.clone(),
                    *min_price,
                    *max_price,
                )?),
                FilterConfig::DailyVolume {
                    action,
                    base_cap,
                    quote_cap,
                    mode,
                } => SubmitFilter::DailyVolume(DailyVolumeFilter::new(
                    pair.clone(),
                    *action,
                    *base_cap,
                    *quote_cap,
                    *mode,
                    volume.clone(),
                )?),
                FilterConfig::MakerMode => {
                    let book: Arc<dyn OrderBookSource> = Arc::new(LedgerBook(client.clone()));
                    SubmitFilter::MakerMode(
                        MakerModeFilter::new(pair.clone(), book)
                            .with_source_account(op_source.clone()),
                    )
                }
                FilterConfig::Dedupe => SubmitFilter::Dedupe(DedupeFilter),
            })
        })
        .collect()
}

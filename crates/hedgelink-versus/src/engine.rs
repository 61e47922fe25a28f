//! The two-step Versus engine.
//!
//! Congelar opens a protected straddle (one BUY, one SELL) on account A.
//! Transferir collapses the straddle to the configured side, re-points A's
//! stops at levels economically linked to account B's thresholds, and
//! mirrors the exposure on B with two half-lot legs in the opposite
//! direction.
//!
//! Every outbound call returns a result sum. The only compensating action
//! is the close of A's BUY when the straddle's SELL leg is refused; no
//! rollback happens past that point. Failures after owner resolution mark
//! the record `error`; the engine never retries.

use std::sync::Arc;

use tracing::{error, info, warn};

use hedgelink_aggregator::Aggregator;
use hedgelink_agent::{AgentClient, ModifyRequest, OpenRequest, Quote};
use hedgelink_cache::SmartCache;
use hedgelink_core::symbol::{resolve_pip_size, round_lots, round_pips, round_price, usd_per_pip};
use hedgelink_core::{
    AccountId, HedgeError, Side, Ticket, VersusId, VersusRecord, VersusStatus,
};
use hedgelink_store::{NewVersus, VersusStore};
use chrono::{DateTime, Utc};

// ── Inputs ───────────────────────────────────────────────────────────────────

/// Operator-supplied parameters for a new Versus.
#[derive(Clone, Debug)]
pub struct VersusSpec {
    pub account_a: AccountId,
    pub account_b: AccountId,
    pub symbol: String,
    pub lots: f64,
    pub side: Side,
    pub tp_usd_a: f64,
    pub sl_usd_a: f64,
    pub tp_usd_b: f64,
    pub sl_usd_b: f64,
    pub scheduled_congelar: Option<DateTime<Utc>>,
    pub scheduled_transferir: Option<DateTime<Utc>>,
}

// ── Validated quote ──────────────────────────────────────────────────────────

/// An agent quote with every field the math needs present and positive.
#[derive(Clone, Copy, Debug)]
struct PricedQuote {
    bid: f64,
    ask: f64,
    point: f64,
    /// Pip size in price units; agent-reported when present, else the
    /// symbol-class fallback.
    pip_size: f64,
    trade_tick_value: f64,
    spread_pips: f64,
}

fn validate_quote(agent: &str, symbol: &str, quote: &Quote) -> Result<PricedQuote, HedgeError> {
    let bad = |reason: &str| HedgeError::BadQuote {
        agent: agent.to_string(),
        symbol: symbol.to_string(),
        reason: reason.to_string(),
    };

    let bid = quote.bid.filter(|v| *v > 0.0).ok_or_else(|| bad("missing or non-positive bid"))?;
    let ask = quote.ask.filter(|v| *v > 0.0).ok_or_else(|| bad("missing or non-positive ask"))?;
    let point = quote
        .point
        .filter(|v| *v > 0.0)
        .ok_or_else(|| bad("missing or non-positive point"))?;
    let trade_tick_value = quote
        .trade_tick_value
        .filter(|v| *v > 0.0)
        .ok_or_else(|| bad("missing or non-positive trade_tick_value"))?;
    let spread_pips = quote
        .spread_pips
        .filter(|v| *v >= 0.0)
        .ok_or_else(|| bad("missing spread"))?;

    if matches!(quote.pip_value, Some(v) if v <= 0.0) {
        return Err(bad("non-positive pip_value"));
    }
    let pip_size = resolve_pip_size(symbol, quote.pip_value);

    Ok(PricedQuote {
        bid,
        ask,
        point,
        pip_size,
        trade_tick_value,
        spread_pips,
    })
}

// ── Transfer plan (pure math) ────────────────────────────────────────────────

/// Everything Transferir sends out, computed up front from one quote so a
/// slow agent call cannot skew half the numbers.
#[derive(Clone, Debug, PartialEq)]
struct TransferPlan {
    /// Index into `tickets_a` (ordered `[buy, sell]`) of the leg to close.
    close_index: usize,
    keep_index: usize,
    b_side: Side,
    tp_price_a: f64,
    sl_price_a: f64,
    tp_pips_b: f64,
    sl_pips_b: f64,
    half_lots: f64,
}

fn transfer_plan(
    side: Side,
    lots: f64,
    symbol: &str,
    quote: &PricedQuote,
    tp_usd_b: f64,
    sl_usd_b: f64,
    commission_per_lot: f64,
) -> Result<TransferPlan, HedgeError> {
    let upp = usd_per_pip(quote.trade_tick_value, quote.pip_size, quote.point, lots)?;

    let tp_pips_b = tp_usd_b / upp;
    let sl_pips_b = sl_usd_b / upp;
    // Forward commission for the two B legs, folded into the stop distances.
    let commission_pips = (commission_per_lot * lots * 2.0) / upp;
    let spread = quote.spread_pips;

    let plan = match side {
        Side::Buy => {
            let current = quote.bid;
            let new_tp_a = round_pips(sl_pips_b - spread - commission_pips);
            let new_sl_a = round_pips(tp_pips_b - spread - commission_pips);
            TransferPlan {
                close_index: 1, // the SELL leg
                keep_index: 0,
                b_side: Side::Sell,
                tp_price_a: round_price(current + new_tp_a * quote.pip_size, symbol),
                sl_price_a: round_price(current - new_sl_a * quote.pip_size, symbol),
                tp_pips_b: round_pips(tp_pips_b - spread - commission_pips),
                sl_pips_b: round_pips(sl_pips_b - spread - commission_pips),
                half_lots: round_lots(lots / 2.0),
            }
        }
        Side::Sell => {
            let current = quote.ask;
            let new_tp_a = round_pips(sl_pips_b + spread - commission_pips);
            let new_sl_a = round_pips(tp_pips_b + spread - commission_pips);
            TransferPlan {
                close_index: 0, // the BUY leg
                keep_index: 1,
                b_side: Side::Buy,
                tp_price_a: round_price(current - new_tp_a * quote.pip_size, symbol),
                sl_price_a: round_price(current + new_sl_a * quote.pip_size, symbol),
                tp_pips_b: round_pips(tp_pips_b + spread - commission_pips),
                sl_pips_b: round_pips(sl_pips_b + spread - commission_pips),
                half_lots: round_lots(lots / 2.0),
            }
        }
    };
    Ok(plan)
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct VersusEngine {
    client: Arc<AgentClient>,
    store: Arc<VersusStore>,
    cache: Arc<SmartCache>,
    aggregator: Arc<Aggregator>,
}

impl VersusEngine {
    pub fn new(
        client: Arc<AgentClient>,
        store: Arc<VersusStore>,
        cache: Arc<SmartCache>,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        Self {
            client,
            store,
            cache,
            aggregator,
        }
    }

    // ── Create / delete ──────────────────────────────────────────────────────

    /// Validate and persist a new `pending` record. No agent is contacted:
    /// holder metadata comes from cached snapshots when available.
    pub fn create(&self, spec: VersusSpec) -> Result<VersusRecord, HedgeError> {
        if spec.account_a == spec.account_b {
            return Err(HedgeError::SameAccountPair);
        }
        if !(spec.lots > 0.0) {
            return Err(HedgeError::NonPositiveLots);
        }

        let meta = |account: AccountId| match self.cache.get_account(account) {
            Some(snap) => (snap.holder, snap.prop_firm),
            None => ("Unknown".to_string(), "N/A".to_string()),
        };
        let (holder_a, prop_firm_a) = meta(spec.account_a);
        let (holder_b, prop_firm_b) = meta(spec.account_b);

        self.store.create(NewVersus {
            account_a: spec.account_a,
            account_b: spec.account_b,
            symbol: spec.symbol,
            lots: spec.lots,
            side: spec.side,
            tp_usd_a: spec.tp_usd_a,
            sl_usd_a: spec.sl_usd_a,
            tp_usd_b: spec.tp_usd_b,
            sl_usd_b: spec.sl_usd_b,
            scheduled_congelar: spec.scheduled_congelar,
            scheduled_transferir: spec.scheduled_transferir,
            holder_a,
            prop_firm_a,
            holder_b,
            prop_firm_b,
        })
    }

    /// Delete a record in any state. Open legs are an operator concern.
    pub fn delete(&self, id: &VersusId) -> Result<(), HedgeError> {
        if self.store.delete(id)? {
            Ok(())
        } else {
            Err(HedgeError::VersusNotFound(id.as_str().to_string()))
        }
    }

    // ── Error bookkeeping ────────────────────────────────────────────────────

    /// Park the record in `error` with ticket lists reflecting reality,
    /// then hand the original failure back.
    fn fail(
        &self,
        id: &VersusId,
        tickets_a: Option<Vec<Ticket>>,
        tickets_b: Option<Vec<Ticket>>,
        err: HedgeError,
    ) -> HedgeError {
        error!(id = %id, error = %err, "versus step failed");
        if let Err(persist_err) = self.store.update_status(
            id,
            VersusStatus::Error,
            tickets_a,
            tickets_b,
            Some(err.to_string()),
        ) {
            error!(id = %id, error = %persist_err, "could not persist error status");
        }
        err
    }

    // ── Congelar ─────────────────────────────────────────────────────────────

    /// Step 1: open the straddle on account A.
    pub async fn congelar(&self, id: &VersusId) -> Result<VersusRecord, HedgeError> {
        let record = self
            .store
            .get(id)
            .ok_or_else(|| HedgeError::VersusNotFound(id.as_str().to_string()))?;
        if record.status != VersusStatus::Pending {
            return Err(HedgeError::VersusStatusMismatch {
                id: id.as_str().to_string(),
                expected: VersusStatus::Pending.as_str(),
                actual: record.status.to_string(),
            });
        }

        info!(id = %id, account = record.account_a, symbol = %record.symbol, "executing congelar");
        let agent_a = self.aggregator.resolve_owner(record.account_a).await?;

        let quote = match self.client.quote(&agent_a, &record.symbol).await {
            Ok(q) => q,
            Err(e) => {
                return Err(self.fail(
                    id,
                    None,
                    None,
                    HedgeError::BadQuote {
                        agent: agent_a,
                        symbol: record.symbol.clone(),
                        reason: e.to_string(),
                    },
                ))
            }
        };
        let quote = match validate_quote(&agent_a, &record.symbol, &quote) {
            Ok(q) => q,
            Err(e) => return Err(self.fail(id, None, None, e)),
        };

        let upp = match usd_per_pip(
            quote.trade_tick_value,
            quote.pip_size,
            quote.point,
            record.lots,
        ) {
            Ok(v) => v,
            Err(e) => return Err(self.fail(id, None, None, e)),
        };
        // Both straddle legs share the same pip distances; the agent applies
        // the direction sign.
        let tp_pips = record.tp_usd_a / upp;
        let sl_pips = record.sl_usd_a / upp;

        let buy_ticket = match self
            .client
            .open_position(
                &agent_a,
                &OpenRequest {
                    symbol: record.symbol.clone(),
                    lot: record.lots,
                    order_type: Side::Buy,
                    tp_pips: Some(tp_pips),
                    sl_pips: Some(sl_pips),
                    comment: Some(format!("Versus-{id}-BUY")),
                },
            )
            .await
        {
            Ok(t) => t,
            Err(e) => {
                return Err(self.fail(
                    id,
                    None,
                    None,
                    HedgeError::OpenFailed {
                        account: record.account_a,
                        side: "BUY",
                        message: e.to_string(),
                    },
                ))
            }
        };
        info!(id = %id, ticket = buy_ticket, "straddle BUY opened");

        let sell_ticket = match self
            .client
            .open_position(
                &agent_a,
                &OpenRequest {
                    symbol: record.symbol.clone(),
                    lot: record.lots,
                    order_type: Side::Sell,
                    tp_pips: Some(tp_pips),
                    sl_pips: Some(sl_pips),
                    comment: Some(format!("Versus-{id}-SELL")),
                },
            )
            .await
        {
            Ok(t) => t,
            Err(open_err) => {
                error!(id = %id, ticket = buy_ticket, "SELL refused; rolling back BUY");
                if let Err(rollback_err) =
                    self.client.close_position(&agent_a, buy_ticket).await
                {
                    error!(id = %id, ticket = buy_ticket, error = %rollback_err, "rollback close failed");
                }
                return Err(self.fail(
                    id,
                    Some(Vec::new()),
                    None,
                    HedgeError::OpenFailed {
                        account: record.account_a,
                        side: "SELL",
                        message: open_err.to_string(),
                    },
                ));
            }
        };
        info!(id = %id, ticket = sell_ticket, "straddle SELL opened");

        let updated = self.store.update_status(
            id,
            VersusStatus::Congelado,
            Some(vec![buy_ticket, sell_ticket]),
            None,
            None,
        )?;
        self.cache.invalidate_account(record.account_a);
        Ok(updated)
    }

    // ── Transferir ───────────────────────────────────────────────────────────

    /// Step 2: collapse A's straddle to the configured side and mirror on B.
    pub async fn transferir(&self, id: &VersusId) -> Result<VersusRecord, HedgeError> {
        let record = self
            .store
            .get(id)
            .ok_or_else(|| HedgeError::VersusNotFound(id.as_str().to_string()))?;
        if record.status != VersusStatus::Congelado {
            return Err(HedgeError::VersusStatusMismatch {
                id: id.as_str().to_string(),
                expected: VersusStatus::Congelado.as_str(),
                actual: record.status.to_string(),
            });
        }
        if record.tickets_a.len() != 2 {
            return Err(HedgeError::TicketCountMismatch {
                id: id.as_str().to_string(),
                expected: 2,
                got: record.tickets_a.len(),
            });
        }

        info!(
            id = %id, account_a = record.account_a, account_b = record.account_b,
            side = %record.side, "executing transferir"
        );
        let agent_a = self.aggregator.resolve_owner(record.account_a).await?;
        let agent_b = self.aggregator.resolve_owner(record.account_b).await?;

        // Positions on A are read only for the per-lot commission; a failed
        // lookup is not fatal and the commission falls back to zero.
        let commission_per_lot = match self.client.positions(&agent_a).await {
            Ok(positions) => positions
                .iter()
                .find(|p| p.commission != 0.0)
                .map(|p| {
                    if p.volume > 0.0 {
                        p.commission.abs() / p.volume
                    } else {
                        p.commission.abs()
                    }
                })
                .unwrap_or(0.0),
            Err(e) => {
                warn!(id = %id, error = %e, "positions lookup failed; assuming zero commission");
                0.0
            }
        };

        let quote = match self.client.quote(&agent_a, &record.symbol).await {
            Ok(q) => q,
            Err(e) => {
                return Err(self.fail(
                    id,
                    None,
                    None,
                    HedgeError::BadQuote {
                        agent: agent_a,
                        symbol: record.symbol.clone(),
                        reason: e.to_string(),
                    },
                ))
            }
        };
        let quote = match validate_quote(&agent_a, &record.symbol, &quote) {
            Ok(q) => q,
            Err(e) => return Err(self.fail(id, None, None, e)),
        };

        let plan = match transfer_plan(
            record.side,
            record.lots,
            &record.symbol,
            &quote,
            record.tp_usd_b,
            record.sl_usd_b,
            commission_per_lot,
        ) {
            Ok(p) => p,
            Err(e) => return Err(self.fail(id, None, None, e)),
        };

        let ticket_to_close = record.tickets_a[plan.close_index];
        let remaining = record.tickets_a[plan.keep_index];
        info!(
            id = %id, close = ticket_to_close, keep = remaining,
            tp_a = plan.tp_price_a, sl_a = plan.sl_price_a,
            b_side = %plan.b_side, half_lots = plan.half_lots,
            "transfer plan computed"
        );

        // Close the counter-direction leg on A.
        if let Err(e) = self.client.close_position(&agent_a, ticket_to_close).await {
            return Err(self.fail(
                id,
                None,
                None,
                HedgeError::CloseFailed {
                    account: record.account_a,
                    ticket: ticket_to_close,
                    message: e.to_string(),
                },
            ));
        }

        // Re-point the surviving leg's stops. Non-fatal; the leg stays open
        // without new stops on a refusal.
        if let Err(e) = self
            .client
            .modify_position(
                &agent_a,
                &ModifyRequest {
                    ticket: remaining,
                    tp: plan.tp_price_a,
                    sl: plan.sl_price_a,
                },
            )
            .await
        {
            warn!(id = %id, ticket = remaining, error = %e, "modify failed; leg left without new stops");
        }

        // Mirror on B: two half-lot legs, opposite direction, pip stops.
        let mut tickets_b: Vec<Ticket> = Vec::with_capacity(2);
        for leg in 1..=2u8 {
            match self
                .client
                .open_position(
                    &agent_b,
                    &OpenRequest {
                        symbol: record.symbol.clone(),
                        lot: plan.half_lots,
                        order_type: plan.b_side,
                        tp_pips: Some(plan.tp_pips_b),
                        sl_pips: Some(plan.sl_pips_b),
                        comment: Some(format!("Versus-{id}-B{leg}")),
                    },
                )
                .await
            {
                Ok(t) => {
                    info!(id = %id, ticket = t, leg, "B leg opened");
                    tickets_b.push(t);
                }
                Err(e) => {
                    // Partial B state is tolerated; the operator remedies it.
                    return Err(self.fail(
                        id,
                        Some(vec![remaining]),
                        Some(tickets_b),
                        HedgeError::OpenFailed {
                            account: record.account_b,
                            side: plan.b_side.as_str(),
                            message: format!("leg {leg}: {e}"),
                        },
                    ));
                }
            }
        }

        let updated = self.store.update_status(
            id,
            VersusStatus::Transferido,
            Some(vec![remaining]),
            Some(tickets_b),
            None,
        )?;
        self.cache.invalidate_account(record.account_a);
        self.cache.invalidate_account(record.account_b);
        Ok(updated)
    }
}

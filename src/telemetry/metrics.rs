//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Free capital
    Capital,
    /// Signed position size
    PositionSize,
    /// Cumulative realized P&L
    RealizedPnl,
    /// 1 while the risk lock is engaged
    RiskLocked,
    /// Losing closes in a row
    ConsecutiveLosses,
    /// Latest ATR estimate
    Atr,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Orders filled by the ledger
    OrdersFilled,
    /// Orders refused by the ledger or risk gates
    OrdersRejected,
    /// Ticks that failed or panicked
    TickErrors,
    /// Store writes that failed
    PersistenceErrors,
}

impl GaugeMetric {
    fn name(&self) -> &'static str {
        match self {
            GaugeMetric::Capital => "guardrail_capital",
            GaugeMetric::PositionSize => "guardrail_position_size",
            GaugeMetric::RealizedPnl => "guardrail_realized_pnl",
            GaugeMetric::RiskLocked => "guardrail_risk_locked",
            GaugeMetric::ConsecutiveLosses => "guardrail_consecutive_losses",
            GaugeMetric::Atr => "guardrail_atr",
        }
    }
}

impl CounterMetric {
    fn name(&self) -> &'static str {
        match self {
            CounterMetric::OrdersFilled => "guardrail_orders_filled_total",
            CounterMetric::OrdersRejected => "guardrail_orders_rejected_total",
            CounterMetric::TickErrors => "guardrail_tick_errors_total",
            CounterMetric::PersistenceErrors => "guardrail_persistence_errors_total",
        }
    }
}

/// Record how long a tick took
pub fn record_tick_latency(duration: Duration) {
    metrics::histogram!("guardrail_tick_duration_seconds").record(duration.as_secs_f64());
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Set a gauge from a decimal value
pub fn set_decimal_gauge(metric: GaugeMetric, value: Decimal) {
    set_gauge(metric, value.to_f64().unwrap_or_default());
}

/// Increment a counter by one
pub fn increment_counter(metric: CounterMetric) {
    metrics::counter!(metric.name()).increment(1);
}

/// Install the Prometheus recorder and serve `/metrics` on `port`
pub fn init_metrics_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    // Business metrics
    pub static ref ORDERS_CREATED: IntCounter = IntCounter::new(
        "orders_created_total",
        "Total orders created through checkout"
    ).expect("metric can be created");

    pub static ref PAYMENTS_CONFIRMED: IntCounter = IntCounter::new(
        "payments_confirmed_total",
        "Total payments confirmed"
    ).expect("metric can be created");

    pub static ref CHECKOUTS_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("checkouts_rejected_total", "Checkouts rejected by validation"),
        &["reason"]
    ).expect("metric can be created");

    pub static ref ESCROWS_RELEASED: IntCounter = IntCounter::new(
        "escrows_released_total",
        "Total escrows released to counterparties"
    ).expect("metric can be created");

    pub static ref ESCROWS_REFUNDED: IntCounter = IntCounter::new(
        "escrows_refunded_total",
        "Total escrows refunded to buyers"
    ).expect("metric can be created");

    pub static ref ESCROWS_EXPIRED: IntCounter = IntCounter::new(
        "escrows_expired_total",
        "Total escrows refunded by the expiry sweep"
    ).expect("metric can be created");

    pub static ref ORDER_VALUE: Histogram = Histogram::with_opts(
        HistogramOpts::new("order_value_distribution", "Distribution of order totals")
            .buckets(vec![1000.0, 5000.0, 10000.0, 50000.0, 100000.0, 500000.0])
    ).expect("metric can be created");
}

/// Register all metrics with the given registry
pub fn register_metrics(registry: &Registry) -> Result<(), Box<dyn std::error::Error>> {
    registry.register(Box::new(ORDERS_CREATED.clone()))?;
    registry.register(Box::new(PAYMENTS_CONFIRMED.clone()))?;
    registry.register(Box::new(CHECKOUTS_REJECTED.clone()))?;
    registry.register(Box::new(ESCROWS_RELEASED.clone()))?;
    registry.register(Box::new(ESCROWS_REFUNDED.clone()))?;
    registry.register(Box::new(ESCROWS_EXPIRED.clone()))?;
    registry.register(Box::new(ORDER_VALUE.clone()))?;

    Ok(())
}

/// Generate metrics output in Prometheus text format
pub fn metrics_handler() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let registry = Registry::new();
        let result = register_metrics(&registry);
        assert!(result.is_ok());
    }

    #[test]
    fn test_metrics_handler() {
        let _ = register_metrics(prometheus::default_registry());
        ORDERS_CREATED.inc();
        let result = metrics_handler();
        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.contains("orders_created_total"));
    }
}

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    pub static ref SALES_COMPLETED: IntCounter = register_int_counter!(
        "sales_completed_total",
        "Total number of completed sale transactions"
    )
    .expect("metric can be created");
    pub static ref SALES_REJECTED: IntCounterVec = register_int_counter_vec!(
        "sales_rejected_total",
        "Total number of rejected sale attempts",
        &["reason"]
    )
    .expect("metric can be created");
    pub static ref STOCK_MOVEMENTS: IntCounterVec = register_int_counter_vec!(
        "stock_movements_total",
        "Total number of stock movements posted",
        &["movement_type"]
    )
    .expect("metric can be created");
    pub static ref RETURNS_PROCESSED: IntCounter = register_int_counter!(
        "returns_processed_total",
        "Total number of processed product returns"
    )
    .expect("metric can be created");
}

/// Renders the default registry in Prometheus text exposition format.
pub fn render() -> Result<String, prometheus::Error> {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

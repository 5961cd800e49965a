use shared::metrics_defs::{MetricDef, MetricType};

pub const UPSTREAM_LOGINS: MetricDef = MetricDef {
    name: "upstream.logins",
    metric_type: MetricType::Counter,
    description: "Number of logins performed against the gradebook. Tagged with result.",
};

pub const UPSTREAM_RETRIES: MetricDef = MetricDef {
    name: "upstream.retries",
    metric_type: MetricType::Counter,
    description: "Operations retried after re-authentication. Tagged with operation, result.",
};

pub const ALL_METRICS: &[MetricDef] = &[UPSTREAM_LOGINS, UPSTREAM_RETRIES];

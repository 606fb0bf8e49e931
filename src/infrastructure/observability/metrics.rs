// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::describe_counter;

/// 注册应用使用的监控指标说明
///
/// 不安装导出器；调用方可以在此之前安装任意 `metrics` recorder
pub fn describe_metrics() {
    describe_counter!(
        "robots_fetch_total",
        "Total number of robots.txt fetches, labelled by outcome"
    );
    describe_counter!(
        "robots_denied_total",
        "Total number of paths denied by robots.txt"
    );
    describe_counter!("fetch_attempts_total", "Total number of page fetch attempts");
    describe_counter!(
        "fetch_failures_total",
        "Total number of failed page fetches, labelled by kind"
    );
    describe_counter!(
        "rate_limit_backoff_total",
        "Total number of failures that increased a domain backoff multiplier"
    );
    describe_counter!(
        "rate_limit_exceeded_total",
        "Total number of acquire calls rejected by the hourly cap"
    );
    describe_counter!("leads_scored_total", "Total number of score records produced");
    describe_counter!(
        "change_events_total",
        "Total number of change events detected, labelled by kind"
    );
}

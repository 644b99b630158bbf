// Monitoring handlers: the raw cluster state and the per-pass scheduler
// logs, optionally windowed by `from` and an ISO-8601 `duration`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::types::{
    ApiError, ApiResult, ApiState, ClusterStateResponse, SchedulerLogListResponse,
};

pub async fn cluster_state(
    State(state): State<Arc<ApiState>>,
) -> ApiResult<Json<ClusterStateResponse>> {
    Ok(Json(ClusterStateResponse {
        status: "OK",
        services: state.repository.list_services().await?,
        service_instances: state.repository.list_instances().await?,
        nodes: state.repository.list_nodes().await?,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct MetricsQuery {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: Option<String>,
}

pub async fn scheduler_metrics(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<MetricsQuery>,
) -> ApiResult<Json<SchedulerLogListResponse>> {
    let window = match (query.from, query.duration.as_deref()) {
        (from, Some(text)) => {
            let duration = parse_iso8601_duration(text).ok_or_else(|| {
                ApiError::validation(format!("invalid ISO-8601 duration: {text}"))
            })?;
            match from {
                Some(from) => (Some(from), Some(from + duration)),
                None => (Some(Utc::now() - duration), None),
            }
        }
        (from, None) => (from, None),
    };

    let logs = state
        .repository
        .list_scheduler_logs()
        .await?
        .into_iter()
        .filter(|log| window.0.is_none_or(|from| log.timestamp > from))
        .filter(|log| window.1.is_none_or(|until| log.timestamp <= until))
        .collect();
    Ok(Json(SchedulerLogListResponse::ok(logs)))
}

/// Parses durations of the form `PnDTnHnMnS` (each part optional, "P1D",
/// "PT30M", "P1DT2H" and the like). Weeks, months and years are not
/// accepted.
fn parse_iso8601_duration(text: &str) -> Option<Duration> {
    let rest = text.strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) if !time.is_empty() => (date, time),
        Some(_) => return None,
        None => (rest, ""),
    };

    fn take_number<'a>(input: &'a str, unit: char) -> Option<(i64, &'a str)> {
        let end = input.find(|c: char| !c.is_ascii_digit())?;
        if input[end..].starts_with(unit) {
            let value: i64 = input[..end].parse().ok()?;
            Some((value, &input[end + 1..]))
        } else {
            None
        }
    }

    let mut total = Duration::zero();
    let mut rest = date_part;
    if let Some((days, after)) = take_number(rest, 'D') {
        total += Duration::days(days);
        rest = after;
    }
    if !rest.is_empty() {
        return None;
    }

    let mut rest = time_part;
    if let Some((hours, after)) = take_number(rest, 'H') {
        total += Duration::hours(hours);
        rest = after;
    }
    if let Some((minutes, after)) = take_number(rest, 'M') {
        total += Duration::minutes(minutes);
        rest = after;
    }
    if let Some((seconds, after)) = take_number(rest, 'S') {
        total += Duration::seconds(seconds);
        rest = after;
    }
    if !rest.is_empty() {
        return None;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso8601_duration() {
        assert_eq!(parse_iso8601_duration("PT1H"), Some(Duration::hours(1)));
        assert_eq!(parse_iso8601_duration("PT30M"), Some(Duration::minutes(30)));
        assert_eq!(parse_iso8601_duration("P1D"), Some(Duration::days(1)));
        assert_eq!(
            parse_iso8601_duration("P1DT2H30M15S"),
            Some(Duration::days(1) + Duration::hours(2) + Duration::minutes(30) + Duration::seconds(15))
        );
        assert_eq!(parse_iso8601_duration("PT"), None);
        assert_eq!(parse_iso8601_duration(""), None);
        assert_eq!(parse_iso8601_duration("1H"), None);
        assert_eq!(parse_iso8601_duration("P1W"), None);
    }
}

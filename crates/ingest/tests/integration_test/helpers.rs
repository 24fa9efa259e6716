use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use lakeshore_core::config::{ApiIngestionConfig, EndpointConfig};

/// Write an events CSV with `rows` well-formed records, plus one record with a
/// missing field after `malformed_after` rows when given.
pub fn write_events_csv(dir: &Path, rows: usize, malformed_after: Option<usize>) -> PathBuf {
    let mut body = String::from("timestamp,visitorid,event,itemid,transactionid\n");
    for i in 0..rows {
        if malformed_after == Some(i) {
            body.push_str("1433221332117,broken,view\n");
        }
        body.push_str(&format!("{},{},view,{},\n", 1433221332117u64 + i as u64, 1000 + i, i % 7));
    }
    let path = dir.join("events.csv");
    std::fs::write(&path, body).unwrap();
    path
}

pub fn endpoint(url: String, paginate: bool, page_size: Option<usize>) -> EndpointConfig {
    EndpointConfig {
        url,
        method: "GET".into(),
        params: IndexMap::new(),
        headers: IndexMap::new(),
        page_size,
        paginate,
    }
}

/// API config with no delays, pointing only at `endpoints`.
pub fn api_config(endpoints: Vec<(&str, EndpointConfig)>) -> ApiIngestionConfig {
    ApiIngestionConfig {
        retry_attempts: 3,
        retry_delay_secs: 0,
        timeout_secs: 5,
        rate_limit_delay_secs: 0,
        endpoints: endpoints
            .into_iter()
            .map(|(name, ep)| (name.to_string(), ep))
            .collect(),
        ..ApiIngestionConfig::default()
    }
}

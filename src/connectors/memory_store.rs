// @file: chart_gateway/src/connectors/memory_store.rs
// @description: In-process counter store for single-instance deployments without Redis.
// @author: LAS.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use crate::core::error::GatewayResult;
use crate::core::interfaces::{CounterStore, WindowOutcome};
use crate::core::rate_limit::{weighted_previous, window_bucket, window_ms};


type Slots = [(i64, i64); 2];

#[derive(Debug, Default)]
struct WindowTable {
    // key -> (bucket index, hits in that bucket) for the last two buckets
    slots: HashMap<String, Slots>,
    // Highest bucket an idle-key sweep has run for
    swept_bucket: Option<i64>,
}

impl WindowTable {
    /// Drops keys idle for more than a full window, at most once per bucket.
    fn sweep(&mut self, bucket: i64) {
        if self.swept_bucket.is_some_and(|swept| swept >= bucket) {
            return;
        }
        self.swept_bucket = Some(bucket);
        self.slots.retain(|_, slots| slots.iter().any(|(b, _)| *b >= bucket - 1));
    }
}

/// Same two-bucket weighted window as the Upstash script, kept in a map.
#[derive(Debug, Default)]
pub struct LocalWindowStore {
    table: Mutex<WindowTable>,
}

impl LocalWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.table.lock().await.slots.len()
    }

    /// Bucket index of the most recent idle-key sweep, if any ran.
    pub async fn last_sweep(&self) -> Option<i64> {
        self.table.lock().await.swept_bucket
    }
}

fn hits_in(slots: &Slots, wanted: i64) -> i64 {
    slots.iter().filter(|(b, _)| *b == wanted).map(|(_, n)| *n).sum()
}

#[async_trait]
impl CounterStore for LocalWindowStore {
    async fn sliding_window(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        now_ms: i64,
    ) -> GatewayResult<WindowOutcome> {
        let win = window_ms(window);
        let bucket = window_bucket(now_ms, win);
        let reset_at = (bucket + 1) * win;

        let mut table = self.table.lock().await;

        // #1. Evict idle keys once the bucket index moves on
        table.sweep(bucket);

        let slots = table.slots.entry(key.to_string()).or_insert([(bucket, 0), (bucket - 1, 0)]);

        // #2. Count hits in the current and previous bucket
        let current = hits_in(slots, bucket);
        let previous_raw = hits_in(slots, bucket - 1);
        let previous = weighted_previous(previous_raw, now_ms, win);

        let limit_i = limit as i64;
        if previous + current >= limit_i {
            return Ok(WindowOutcome { success: false, limit, remaining: 0, reset_at });
        }

        // #3. Record the hit
        *slots = [(bucket, current + 1), (bucket - 1, previous_raw)];

        Ok(WindowOutcome {
            success: true,
            limit,
            remaining: (limit_i - (current + 1 + previous)).max(0),
            reset_at,
        })
    }
}

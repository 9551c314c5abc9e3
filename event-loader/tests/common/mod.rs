//! Shared fixtures for the event-loader integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use common_blob::BlobSource;
use event_loader::event::{decode, Event};
use event_loader::loader::BatchLoader;
use event_loader::pipeline::IngestionPipeline;
use event_loader::tokenizer::Tokenizer;
use event_loader::warehouse::Warehouse;

pub const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Two records back to back, the first with a null message and the second with a null
/// environment.
pub const TWO_RECORDS: &str = concat!(
    r#"{"request_id":"r1","cookie_id":"c1","topic":"t1","request_timestamp":1700000000000,"#,
    r#""message":null,"environment":"prod","website_id":"w1","user_account_id":"u1","#,
    r#""location":"US","user_agent":"ua1"}"#,
    r#"{"request_id":"r2","cookie_id":"c2","topic":"t2","request_timestamp":1700000001000,"#,
    r#""message":"hi","environment":null,"website_id":"w2","user_account_id":"u2","#,
    r#""location":"UK","user_agent":"ua2"}"#,
);

pub fn event(request_id: &str) -> Event {
    let token = format!(
        r#"{{"request_id":"{request_id}","cookie_id":"c","topic":"t","request_timestamp":1700000000000}}"#
    );
    decode(&token).expect("fixture event decodes")
}

pub fn pipeline(source: Arc<dyn BlobSource>, warehouse: Arc<dyn Warehouse>) -> IngestionPipeline {
    IngestionPipeline::new(
        source,
        Tokenizer::default(),
        BatchLoader::new(warehouse, LOAD_TIMEOUT),
    )
}

use chrono::Utc;
use log::error;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::backtrace::Backtrace;
use std::io::Write;
use std::sync::Arc;

use crate::core::{Context, Extension, ItemData};
use crate::SpiderError;

struct ErrorLog {
    spider: String,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ErrorLog {
    fn send(&self, ctx: &Context, err: &SpiderError, kind: &str) {
        let mut record = Map::new();
        record.insert("level".to_string(), json!("error"));
        record.insert("time".to_string(), json!(Utc::now().to_rfc3339()));
        record.insert("spider".to_string(), json!(self.spider));
        record.insert("type".to_string(), json!(kind));
        record.insert("error".to_string(), json!(err.to_string()));
        record.insert("ctx".to_string(), json!(ctx.to_string()));
        if let Some(request) = ctx.request() {
            record.insert("url".to_string(), json!(request.raw_url()));
            if let Some(req_err) = request.error() {
                record.insert("req_err".to_string(), json!(req_err.to_string()));
            }
        }
        if let Some(response) = ctx.response() {
            record.insert("resp_code".to_string(), json!(response.status));
            if !response.body.is_empty() {
                record.insert("text".to_string(), json!(response.body));
            }
        }
        record.insert(
            "stack".to_string(),
            json!(Backtrace::force_capture().to_string()),
        );

        let line = Value::Object(record).to_string();
        let mut writer = self.writer.lock();
        if let Err(err) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            error!("with_error_log failed to write record: {}", err);
        }
    }
}

/// Writes one JSON line per fault to `writer`: recovered handler faults,
/// request and response errors, and items carrying an error.
///
/// Each record is written and flushed synchronously inside the hook, so a slow
/// `writer` stalls the runtime worker that reported the fault.
pub fn with_error_log<W: Write + Send + 'static>(writer: W) -> Extension {
    Extension::hooks(move |spider| {
        let log = Arc::new(ErrorLog {
            spider: spider.name().to_string(),
            writer: Mutex::new(Box::new(writer)),
        });

        let sink = Arc::clone(&log);
        spider.on_item(move |ctx, data| {
            if let ItemData::Error(err) = &data {
                sink.send(ctx, err, "item");
            }
            Ok(Some(data))
        });
        let sink = Arc::clone(&log);
        spider.on_recover(move |ctx, err| sink.send(ctx, err, "OnRecover"));
        let sink = Arc::clone(&log);
        spider.on_req_error(move |ctx, err| sink.send(ctx, err, "OnReqError"));
        spider.on_resp_error(move |ctx, err| log.send(ctx, err, "OnRespError"));
        Ok(())
    })
}

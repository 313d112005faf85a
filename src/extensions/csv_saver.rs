use log::error;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

use crate::core::{Extension, ItemData};
use crate::SpiderError;

/// Writes every [`ItemData::Row`] item as one CSV record, flushing after each
/// one. Other items pass through untouched.
///
/// Writes happen synchronously on the runtime worker running the item chain,
/// so a slow `writer` stalls that worker.
pub fn with_csv_item_saver<W: Write + Send + 'static>(writer: W) -> Extension {
    let writer = Arc::new(Mutex::new(csv::Writer::from_writer(writer)));
    Extension::hooks(move |spider| {
        spider.on_item(move |_ctx, data| {
            if let ItemData::Row(row) = &data {
                let mut writer = writer.lock();
                let written = writer
                    .write_record(row.iter())
                    .map_err(SpiderError::from)
                    .and_then(|_| writer.flush().map_err(SpiderError::from));
                if let Err(err) = written {
                    error!("with_csv_item_saver error: {}", err);
                }
            }
            Ok(Some(data))
        });
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::{MockResponse, MockScraper};
    use crate::test_util::SharedBuffer;
    use crate::{handler, CsvItem, Request, Spider, SpiderConfig};
    use serde_json::json;

    #[tokio::test]
    async fn test_row_round_trips_through_csv_reader() {
        let scraper = MockScraper::new().with_route("http://example.com/", MockResponse::new(200, ""));
        let spider = Spider::with_scraper(SpiderConfig::default(), scraper).unwrap();
        let buffer = SharedBuffer::default();
        spider.use_extensions([with_csv_item_saver(buffer.clone())]).unwrap();

        let passed = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&passed);
        spider.on_item(move |_ctx, data| {
            seen.lock().push(matches!(data, ItemData::Record(_)));
            Ok(Some(data))
        });

        spider.seed_task(
            Request::get("http://example.com/"),
            vec![handler(|ctx| {
                ctx.add_item(["a", "b,c", "d"].into_iter().collect::<CsvItem>());
                ctx.add_item(json!({"kind": "record"}));
                Ok(())
            })],
        );
        spider.wait().await;

        let written = buffer.contents();
        assert_eq!(written, "a,\"b,c\",d\n");

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(written.as_bytes());
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].iter().collect::<Vec<_>>(), vec!["a", "b,c", "d"]);

        let mut passed = passed.lock().clone();
        passed.sort();
        assert_eq!(passed, vec![false, true]);
    }
}

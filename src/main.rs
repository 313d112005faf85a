use log::{info, warn};
use scraper::Selector;
use std::fs::File;
use std::io;

use taskspider::extensions::{
    with_csv_item_saver, with_deduplicate, with_depth_limit, with_error_log, with_max_req_limit,
};
use taskspider::{handler, CsvItem, Handler, Request, Spider, SpiderConfig, SpiderError, SpiderResult};

fn select_text(document: &scraper::Html, selector: &str) -> SpiderResult<String> {
    let selector = Selector::parse(selector)
        .map_err(|e| SpiderError::SelectorError(format!("{}: {}", selector, e)))?;
    Ok(document
        .select(&selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .unwrap_or_default())
}

fn parse_book() -> Handler {
    handler(|ctx| {
        let Some(response) = ctx.response() else {
            return Ok(());
        };
        if !response.is_success() {
            ctx.add_item(SpiderError::StatusError(response.status));
            return Ok(());
        }
        let document = response.html();
        let row = CsvItem(vec![
            response.url.to_string(),
            select_text(&document, "div.product_main h1")?,
            select_text(&document, "p.price_color")?,
            select_text(&document, "p.availability")?,
        ]);
        ctx.add_item(row);
        Ok(())
    })
}

#[tokio::main]
async fn main() -> SpiderResult<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .filter_module("selectors", log::LevelFilter::Warn)
        .filter_module("html5ever", log::LevelFilter::Error)
        .init();

    let config = SpiderConfig::default()
        .with_name("books")
        .with_concurrency(16);
    let spider = Spider::new(config)?;

    spider.use_extensions([
        with_deduplicate(),
        with_depth_limit(3),
        with_max_req_limit(500),
        with_error_log(io::stderr()),
        with_csv_item_saver(File::create("books.csv")?),
    ])?;

    spider.on_html("article.product_pod h3 a", |ctx, element| {
        if let (Some(request), Some(href)) = (ctx.request(), element.value().attr("href")) {
            ctx.add_task(request.join(href), vec![parse_book()]);
        }
        Ok(())
    })?;
    spider.on_html("li.next a", |ctx, element| {
        if let (Some(request), Some(href)) = (ctx.request(), element.value().attr("href")) {
            ctx.add_task(request.join(href), vec![]);
        }
        Ok(())
    })?;

    let stopper = spider.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, dropping pending tasks");
            stopper.shutdown();
        }
    });

    spider.seed_task(Request::get("https://books.toscrape.com/"), vec![]);
    spider.wait().await;

    spider.status().print_signal_line(spider.name());
    info!("Emitted {} items to books.csv", spider.status().total_item());
    spider.shutdown();
    Ok(())
}

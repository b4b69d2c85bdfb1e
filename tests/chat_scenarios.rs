use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use catalog_relay::chat::{server, ChatRouter, InboundEvent, Reply};
use catalog_relay::crawler::fetcher::{Fetch, FetchError};
use catalog_relay::crawler::models::{Category, DetailRecord, ProductDetail, ProductStub};
use catalog_relay::crawler::parser::{DetailExtractor, DetailSelectors};
use catalog_relay::storage::{DetailStore, RecordStore};

#[derive(Default)]
struct PageFake {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl PageFake {
    fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl Fetch for PageFake {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().ok_or(FetchError::Status {
            url: url.to_string(),
            status: 503,
        })
    }
}

fn stub(category: Category, url: &str, name: &str) -> ProductStub {
    ProductStub::new(category, url, Some(name.to_string()))
}

fn chat(dir: &Path, fetcher: Arc<PageFake>) -> ChatRouter {
    let extractor = DetailExtractor::new(fetcher, &DetailSelectors::default()).unwrap();
    ChatRouter::new(
        RecordStore::new(dir.join("links")),
        DetailStore::new(dir.join("details")),
        extractor,
    )
}

fn seed_notebooks(dir: &Path) {
    RecordStore::new(dir.join("links"))
        .append(
            Category::Notebook,
            &[
                stub(Category::Notebook, "https://www.bnn.in.th/th/p/asus-vivobook-15", "ASUS Vivobook 15"),
                stub(Category::Notebook, "https://www.bnn.in.th/th/p/acer-swift-go-14", "Acer Swift Go 14"),
                stub(Category::Notebook, "https://www.bnn.in.th/th/p/hp-victus-16", "HP Victus 16"),
            ],
        )
        .unwrap();
}

#[tokio::test]
async fn index_reference_fetches_that_row_and_replies_with_its_title() {
    let dir = tempfile::tempdir().unwrap();
    seed_notebooks(dir.path());
    let fetcher = Arc::new(PageFake::default().page(
        "https://www.bnn.in.th/th/p/acer-swift-go-14",
        r#"<div class="product-detail-summary">
             <h1 class="product-name">Acer Swift Go 14 SFG14-73-57FZ</h1>
             <div class="brand-value">ACER</div>
           </div>
           <div class="product-price-container"><span class="selling-price">฿27,990</span></div>"#,
    ));
    let chat = chat(dir.path(), fetcher.clone());

    let reply = chat.handle(&InboundEvent::new("U1", "1|notebook")).await;

    let text = reply.as_text().expect("detail replies are text");
    assert!(text.contains("Acer Swift Go 14 SFG14-73-57FZ"));
    assert!(text.contains("Price: ฿27,990"));
    assert_eq!(
        *fetcher.requested.lock().unwrap(),
        ["https://www.bnn.in.th/th/p/acer-swift-go-14"]
    );
}

#[tokio::test]
async fn free_text_without_context_searches_notebooks() {
    let dir = tempfile::tempdir().unwrap();
    let records = RecordStore::new(dir.path().join("links"));
    let mut notebooks: Vec<ProductStub> = (0..12)
        .map(|i| stub(Category::Notebook, &format!("https://s.test/nb/{i}"), &format!("ACER Aspire {i}")))
        .collect();
    notebooks.insert(3, stub(Category::Notebook, "https://s.test/nb/lenovo", "Lenovo LOQ 15"));
    records.append(Category::Notebook, &notebooks).unwrap();
    records
        .append(
            Category::Smartphone,
            &[stub(Category::Smartphone, "https://s.test/sp/0", "Acer Liquid Phone")],
        )
        .unwrap();
    let chat = chat(dir.path(), Arc::new(PageFake::default()));

    let reply = chat.handle(&InboundEvent::new("new-user", "acer")).await;

    let tiles = reply.tiles();
    assert_eq!(tiles.len(), 10);
    assert!(tiles.iter().all(|t| t.title.to_lowercase().contains("acer")));
    assert!(tiles.iter().all(|t| t.action.text.ends_with("|notebook")));
    assert_eq!(tiles[3].action.text, "4|notebook");
    assert_eq!(chat.context("new-user"), Category::Notebook);
}

#[tokio::test]
async fn listing_tiles_use_persisted_images() {
    let dir = tempfile::tempdir().unwrap();
    seed_notebooks(dir.path());
    DetailStore::new(dir.path().join("details"))
        .save(
            Category::Notebook,
            &[DetailRecord {
                source_name: "HP Victus 16".into(),
                url: "https://www.bnn.in.th/th/p/hp-victus-16".into(),
                fetched_at: Utc::now(),
                detail: ProductDetail {
                    images: vec!["https://cdn.test/victus.jpg".into()],
                    ..ProductDetail::default()
                },
            }],
        )
        .unwrap();
    let chat = chat(dir.path(), Arc::new(PageFake::default()));

    let reply = chat.handle(&InboundEvent::new("U1", "Notebook")).await;

    let images: Vec<&str> = reply.tiles().iter().map(|t| t.image_url.as_str()).collect();
    assert_eq!(
        images,
        [
            "https://via.placeholder.com/1024x1024?text=Notebook",
            "https://via.placeholder.com/1024x1024?text=Notebook",
            "https://cdn.test/victus.jpg",
        ]
    );
}

#[tokio::test]
async fn greeting_returns_the_menu_without_touching_context() {
    let dir = tempfile::tempdir().unwrap();
    let chat = chat(dir.path(), Arc::new(PageFake::default()));
    chat.handle(&InboundEvent::new("U1", "smartphone")).await;

    let reply = chat.handle(&InboundEvent::new("U1", "Hello")).await;

    assert!(matches!(reply, Reply::Carousel { .. }));
    assert_eq!(reply.tiles().len(), 3);
    assert_eq!(chat.context("U1"), Category::Smartphone);
}

#[tokio::test]
async fn malformed_index_reference_gets_the_menu_hint() {
    let dir = tempfile::tempdir().unwrap();
    seed_notebooks(dir.path());
    let fetcher = Arc::new(PageFake::default());
    let chat = chat(dir.path(), fetcher.clone());

    let reply = chat.handle(&InboundEvent::new("U1", "first|notebook")).await;

    assert!(reply.as_text().unwrap().contains("'menu'"));
    assert!(fetcher.requested.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_detail_fetch_apologizes() {
    let dir = tempfile::tempdir().unwrap();
    seed_notebooks(dir.path());
    let chat = chat(dir.path(), Arc::new(PageFake::default()));

    let reply = chat.handle(&InboundEvent::new("U1", "2|notebook")).await;

    let text = reply.as_text().unwrap();
    assert!(text.starts_with("Sorry"));
    assert!(!text.contains("503"));
}

#[tokio::test]
async fn webhook_answers_json_events() {
    let dir = tempfile::tempdir().unwrap();
    seed_notebooks(dir.path());
    let chat = Arc::new(chat(dir.path(), Arc::new(PageFake::default())));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::router(chat)).await.unwrap();
    });

    let client = reqwest::Client::new();
    let health: serde_json::Value = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let reply: serde_json::Value = client
        .post(format!("http://{addr}/webhook"))
        .json(&serde_json::json!({ "userId": "U9", "body": "notebook hp" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply["type"], "carousel");
    assert_eq!(reply["tiles"][0]["title"], "HP Victus 16");
    assert_eq!(reply["tiles"][0]["action"]["text"], "2|notebook");
}

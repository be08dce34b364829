/// JSON file store round trips in a temporary directory
use chrono::{DateTime, Duration, TimeZone, Utc};
use crm_intel::assembler::assemble;
use crm_intel::models::{AiFacts, ComparisonRecord, EntryPrice, Mined, MinedFacts, RawDocument};
use crm_intel::store::{JsonFileStore, RecordStore};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn record_at(vendor: &str, price: Option<f64>, at: DateTime<Utc>) -> ComparisonRecord {
    let mut doc = RawDocument::success(
        vendor,
        format!("https://{}.test/pricing", vendor.to_lowercase()),
        200,
        None,
        String::new(),
        1,
    );
    doc.retrieved_at = at;
    let mined = MinedFacts {
        entry_price: price.map(Mined::High).unwrap_or_default(),
        ..MinedFacts::default()
    };
    assemble(&doc, &mined, &AiFacts::Skipped, Vec::new())
}

fn record(vendor: &str, price: f64) -> ComparisonRecord {
    record_at(vendor, Some(price), base_time())
}

#[tokio::test]
async fn test_missing_file_loads_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = JsonFileStore::new(dir.path().join("records.json"));

    assert!(store.load_all().await?.is_empty());
    assert!(store.find("Acme").await?.is_none());
    assert_eq!(store.stats().await?.vendors, 0);
    Ok(())
}

#[tokio::test]
async fn test_save_and_find_case_insensitive() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = JsonFileStore::new(dir.path().join("nested").join("records.json"));

    store
        .save(&[record("Acme", 25.0), record("Globex", 40.0)])
        .await?;

    let found = store.find("  acme ").await?.expect("record should exist");
    assert_eq!(found.entry_price(), EntryPrice::Amount(25.0));
    assert_eq!(store.load_all().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_history_is_kept_and_find_returns_latest() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("records.json");
    let store = JsonFileStore::new(&path);

    let later = base_time() + Duration::days(7);
    store.save(&[record_at("Acme", Some(30.0), later)]).await?;
    store.save(&[record_at("ACME", Some(25.0), base_time())]).await?;

    let all = store.load_all().await?;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].last_updated(), base_time());
    assert_eq!(all[1].last_updated(), later);

    let latest = store.find("acme").await?.expect("record should exist");
    assert_eq!(latest.entry_price(), EntryPrice::Amount(30.0));

    // Pretty-printed JSON array, no temp file left behind
    let raw = std::fs::read_to_string(&path)?;
    assert!(raw.starts_with("[\n"));
    assert!(!dir.path().join("records.json.tmp").exists());
    Ok(())
}

#[tokio::test]
async fn test_same_vendor_and_timestamp_is_replaced() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = JsonFileStore::new(dir.path().join("records.json"));

    store.save(&[record("Acme", 25.0)]).await?;
    store.save(&[record("acme", 27.0)]).await?;

    let all = store.load_all().await?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].entry_price(), EntryPrice::Amount(27.0));
    Ok(())
}

#[tokio::test]
async fn test_recent_since_is_newest_first() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = JsonFileStore::new(dir.path().join("records.json"));

    store
        .save(&[
            record_at("Acme", Some(25.0), base_time()),
            record_at("Globex", Some(40.0), base_time() + Duration::days(2)),
            record_at("Initech", Some(15.0), base_time() + Duration::days(5)),
        ])
        .await?;

    let recent = store.recent(base_time() + Duration::days(1)).await?;
    let vendors: Vec<&str> = recent.iter().map(|r| r.vendor()).collect();
    assert_eq!(vendors, vec!["Initech", "Globex"]);

    assert!(store
        .recent(base_time() + Duration::days(30))
        .await?
        .is_empty());
    Ok(())
}

#[tokio::test]
async fn test_remove_and_clear() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = JsonFileStore::new(dir.path().join("records.json"));

    store
        .save(&[
            record_at("Acme", Some(25.0), base_time()),
            record_at("Acme", Some(30.0), base_time() + Duration::days(1)),
            record("Globex", 40.0),
        ])
        .await?;

    assert_eq!(store.remove(" ACME ").await?, 2);
    assert_eq!(store.remove("Acme").await?, 0);
    assert!(store.find("Acme").await?.is_none());
    assert_eq!(store.load_all().await?.len(), 1);

    assert_eq!(store.clear().await?, 1);
    assert!(store.load_all().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_stats_use_latest_record_per_vendor() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = JsonFileStore::new(dir.path().join("records.json"));

    let last = base_time() + Duration::days(3);
    store
        .save(&[
            record_at("Acme", Some(100.0), base_time()),
            record_at("Acme", Some(20.0), base_time() + Duration::days(1)),
            record_at("Globex", Some(40.0), base_time()),
            record_at("Initech", None, last),
        ])
        .await?;

    let stats = store.stats().await?;
    assert_eq!(stats.vendors, 3);
    assert_eq!(stats.records, 4);
    assert_eq!(stats.priced_vendors, 2);
    assert_eq!(stats.min_price, Some(20.0));
    assert_eq!(stats.avg_price, Some(30.0));
    assert_eq!(stats.max_price, Some(40.0));
    assert_eq!(stats.last_updated, Some(last));
    Ok(())
}

#[tokio::test]
async fn test_corrupt_file_is_an_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("records.json");
    std::fs::write(&path, "{ not json")?;

    let store = JsonFileStore::new(&path);
    let err = store.load_all().await.unwrap_err();
    assert!(err.to_string().contains("parsing"));
    Ok(())
}

//! Integration tests for the `files` asset repository and search index.
//!
//! Requires PostgreSQL with pgvector. Run with `cargo test -- --ignored`.

use thinkbank_db::test_fixtures::{one_hot_embedding, TestDatabase};
use thinkbank_db::{
    AssetRepository, AssetSearchIndex, AssetStage, AssetType, CaptureMetadata, Error, NewAsset,
};

#[tokio::test]
#[ignore]
async fn test_two_phase_creation_and_stage_updates() {
    let test_db = TestDatabase::new().await;
    let assets = &test_db.db.assets;

    let id = assets
        .insert(NewAsset::from_file_name("IMG_0001.HEIC"))
        .await
        .unwrap();
    let created = assets.fetch(id).await.unwrap();
    assert_eq!(created.asset_type, AssetType::Image);
    assert_eq!(created.stage(), AssetStage::Created);

    assets
        .set_original_path(id, "http://localhost/original/2025/01/02/1.heic")
        .await
        .unwrap();

    let capture = CaptureMetadata {
        latitude: Some(48.85),
        longitude: Some(2.35),
        captured_at: None,
    };
    assets
        .set_normalized(id, "http://localhost/normalized/2025/01/02/1.jpg", Some(&capture))
        .await
        .unwrap();

    assets
        .set_analysis(id, "a tower at dusk", &one_hot_embedding(3))
        .await
        .unwrap();

    let ready = assets.fetch(id).await.unwrap();
    assert_eq!(ready.stage(), AssetStage::Ready);
    assert_eq!(ready.metadata["latitude"], 48.85);
    assert_eq!(ready.embedding.unwrap().len(), 512);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_set_analysis_rejects_wrong_dimension() {
    let test_db = TestDatabase::new().await;
    let assets = &test_db.db.assets;
    let id = assets.insert(NewAsset::from_file_name("a.png")).await.unwrap();

    let err = assets.set_analysis(id, "x", &[0.1, 0.2]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_update_missing_asset_is_not_found() {
    let test_db = TestDatabase::new().await;
    let err = test_db
        .db
        .assets
        .set_original_path(999_999, "/nowhere")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AssetNotFound(999_999)));
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_fetch_many_skips_missing_and_list_is_newest_first() {
    let test_db = TestDatabase::new().await;
    let assets = &test_db.db.assets;

    let a = assets.insert(NewAsset::from_file_name("a.jpg")).await.unwrap();
    let b = assets.insert(NewAsset::from_file_name("b.pdf")).await.unwrap();

    let fetched = assets.fetch_many(&[a, b, 424242]).await.unwrap();
    assert_eq!(fetched.len(), 2);

    let listed = assets.list(10, 0).await.unwrap();
    assert_eq!(listed.first().map(|x| x.id), Some(b));

    assets.delete(a).await.unwrap();
    assert!(matches!(assets.fetch(a).await, Err(Error::AssetNotFound(_))));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_lexical_and_vector_ranking() {
    let test_db = TestDatabase::new().await;
    let assets = &test_db.db.assets;
    let search = &test_db.db.search;

    let cat = assets.insert(NewAsset::from_file_name("cat.jpg")).await.unwrap();
    assets
        .set_analysis(cat, "a grey cat sleeping on a sofa", &one_hot_embedding(0))
        .await
        .unwrap();
    let dog = assets.insert(NewAsset::from_file_name("dog.jpg")).await.unwrap();
    assets
        .set_analysis(dog, "a dog running on the beach", &one_hot_embedding(1))
        .await
        .unwrap();

    let lexical = search.lexical_top_k("cat", 10).await.unwrap();
    assert_eq!(lexical.len(), 1);
    assert_eq!(lexical[0].asset_id, cat);
    assert!(lexical[0].score > 0.0);

    let vector = search.vector_top_k(&one_hot_embedding(1), 10).await.unwrap();
    assert_eq!(vector[0].asset_id, dog);
    assert!(vector[0].distance.abs() < 1e-6);
    assert!(vector[1].distance > vector[0].distance);

    assert!(search.lexical_top_k("   ", 10).await.unwrap().is_empty());

    test_db.cleanup().await;
}

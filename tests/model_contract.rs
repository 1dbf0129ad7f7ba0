// Contract tests against the real all-MiniLM-L6-v2 ONNX model.
//
// The model-backed tests are #[ignore]d so a plain `cargo test` needs no
// model files. Fetch the model (embeddings::download::download_model), point
// CUBERTOPIC_MODEL_DIR at its base directory if it isn't the default, then
// run `cargo test --test model_contract -- --ignored`. They fail, not skip,
// when the files are missing. Error-path tests that need no model always run.

use std::path::PathBuf;

use cubertopic::config::Config;
use cubertopic::embeddings::download::{model_dir_for, model_files_present};
use cubertopic::embeddings::{EmbedderOptions, EmbeddingModel, Pooling};
use cubertopic::{EmbeddingError, ErrorKind, SentenceEmbedder};

fn model_dir() -> PathBuf {
    Config::load_dotenv();
    cubertopic::telemetry::init();
    let config = Config::load().expect("invalid CUBERTOPIC_* configuration");
    let dir = model_dir_for(&config.model_dir, EmbeddingModel::AllMiniLmL6V2);
    assert!(
        model_files_present(&dir),
        "all-MiniLM-L6-v2 not found in {} (set CUBERTOPIC_MODEL_DIR)",
        dir.display()
    );
    dir
}

fn load(options: EmbedderOptions) -> SentenceEmbedder {
    SentenceEmbedder::load(&model_dir(), options).expect("model present but failed to load")
}

fn assert_close(a: &[f32], b: &[f32], tol: f32) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert!((x - y).abs() <= tol, "component {i}: {x} vs {y}");
    }
}

// ============================================================
// Shape and bounds
// ============================================================

#[test]
#[ignore = "needs all-MiniLM-L6-v2 on disk; run with --ignored"]
fn extract_embeddings_single_and_multiple() {
    let embedder = load(EmbedderOptions::default());

    let single = embedder.create_embeddings(&["a document"]).unwrap();
    assert_eq!(single.rows(), 1);
    assert_eq!(single.dim(), 384);
    assert!(single.min().unwrap() > -5.0);
    assert!(single.max().unwrap() < 5.0);
    assert!(single.all_finite());

    let multiple = embedder
        .create_embeddings(&["a document", "another document"])
        .unwrap();
    assert_eq!(multiple.rows(), 2);
    assert_eq!(multiple.dim(), 384);
    assert!(multiple.min().unwrap() > -5.0);
    assert!(multiple.max().unwrap() < 5.0);
    assert!(multiple.all_finite());
}

#[test]
#[ignore = "needs all-MiniLM-L6-v2 on disk; run with --ignored"]
fn bounds_hold_without_normalization() {
    let options = EmbedderOptions {
        normalize: false,
        ..EmbedderOptions::default()
    };
    let embedder = load(options);

    let m = embedder
        .create_embeddings(&["a document", "another document"])
        .unwrap();
    assert!(m.min().unwrap() > -5.0);
    assert!(m.max().unwrap() < 5.0);
    assert!(m.all_finite());
}

#[test]
#[ignore = "needs all-MiniLM-L6-v2 on disk; run with --ignored"]
fn empty_batch_and_empty_string() {
    let embedder = load(EmbedderOptions::default());

    let none: [&str; 0] = [];
    assert_eq!(embedder.create_embeddings(&none).unwrap().shape(), (0, 384));

    let blank = embedder.create_embeddings(&[""]).unwrap();
    assert_eq!(blank.shape(), (1, 384));
    assert!(blank.all_finite());
}

#[test]
#[ignore = "needs all-MiniLM-L6-v2 on disk; run with --ignored"]
fn long_document_is_truncated_not_rejected() {
    let embedder = load(EmbedderOptions::default());

    let long = "topic modeling with sentence embeddings ".repeat(500);
    let m = embedder.create_embeddings(&[long.as_str()]).unwrap();
    assert_eq!(m.shape(), (1, 384));
}

#[test]
#[ignore = "needs all-MiniLM-L6-v2 on disk; run with --ignored"]
fn normalized_rows_have_unit_length() {
    let embedder = load(EmbedderOptions::default());

    let m = embedder.create_embeddings(&["a document"]).unwrap();
    let row = m.row(0).unwrap();
    let norm = row.dot(&row).sqrt();
    assert!((norm - 1.0).abs() < 1e-4, "norm was {norm}");
}

// ============================================================
// Order, determinism, batching
// ============================================================

#[test]
#[ignore = "needs all-MiniLM-L6-v2 on disk; run with --ignored"]
fn repeated_calls_are_deterministic() {
    let embedder = load(EmbedderOptions::default());

    let first = embedder.create_embeddings(&["a document"]).unwrap();
    let second = embedder.create_embeddings(&["a document"]).unwrap();
    assert_close(first.as_slice(), second.as_slice(), 1e-5);
}

#[test]
#[ignore = "needs all-MiniLM-L6-v2 on disk; run with --ignored"]
fn rows_follow_input_order() {
    let embedder = load(EmbedderOptions::default());

    let forward = embedder
        .create_embeddings(&["a document", "another document"])
        .unwrap();
    let reversed = embedder
        .create_embeddings(&["another document", "a document"])
        .unwrap();

    let (f0, f1) = (forward.row(0).unwrap().to_vec(), forward.row(1).unwrap().to_vec());
    assert!(
        f0.iter().zip(&f1).any(|(a, b)| (a - b).abs() > 1e-3),
        "distinct documents should embed differently"
    );
    assert_close(&f0, &reversed.row(1).unwrap().to_vec(), 1e-4);
    assert_close(&f1, &reversed.row(0).unwrap().to_vec(), 1e-4);
}

#[test]
#[ignore = "needs all-MiniLM-L6-v2 on disk; run with --ignored"]
fn batch_size_does_not_change_output() {
    let dir = model_dir();
    let docs = [
        "a document",
        "another document",
        "gpu accelerated clustering of news articles",
        "",
        "short",
    ];

    let one_at_a_time = SentenceEmbedder::load(
        &dir,
        EmbedderOptions {
            batch_size: 1,
            ..EmbedderOptions::default()
        },
    )
    .unwrap();
    let all_at_once = SentenceEmbedder::load(&dir, EmbedderOptions::default()).unwrap();

    let a = one_at_a_time.create_embeddings(&docs).unwrap();
    let b = all_at_once.create_embeddings(&docs).unwrap();
    assert_eq!(a.shape(), (5, 384));
    assert_close(a.as_slice(), b.as_slice(), 1e-4);
}

#[test]
#[ignore = "needs all-MiniLM-L6-v2 on disk; run with --ignored"]
fn related_documents_are_closer_than_unrelated() {
    let embedder = load(EmbedderOptions::default());

    let m = embedder
        .create_embeddings(&[
            "The goalkeeper saved a penalty in the final minute",
            "A late penalty save won the football match",
            "Quarterly earnings beat analyst expectations",
        ])
        .unwrap();
    let related = m.cosine_similarity(0, 1).unwrap();
    let unrelated = m.cosine_similarity(0, 2).unwrap();
    assert!(related > unrelated, "related {related} vs unrelated {unrelated}");
}

#[test]
#[ignore = "needs all-MiniLM-L6-v2 on disk; run with --ignored"]
fn cls_pooling_keeps_shape() {
    let options = EmbedderOptions {
        pooling: Pooling::Cls,
        ..EmbedderOptions::default()
    };
    let embedder = load(options);

    let m = embedder
        .create_embeddings(&["a document", "another document"])
        .unwrap();
    assert_eq!(m.shape(), (2, 384));
}

#[tokio::test]
#[ignore = "needs all-MiniLM-L6-v2 on disk; run with --ignored"]
async fn async_wrapper_matches_sync() {
    let embedder = load(EmbedderOptions::default());

    let docs = vec!["a document".to_string(), "another document".to_string()];
    let sync = embedder.create_embeddings(&docs).unwrap();
    let from_async = embedder.create_embeddings_async(&docs).await.unwrap();
    assert_close(sync.as_slice(), from_async.as_slice(), 1e-5);
}

#[test]
#[ignore = "needs all-MiniLM-L6-v2 on disk; run with --ignored"]
fn clones_share_the_model_across_threads() {
    let embedder = load(EmbedderOptions::default());

    let expected = embedder.create_embeddings(&["a document"]).unwrap();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let e = embedder.clone();
            std::thread::spawn(move || e.create_embeddings(&["a document"]).unwrap())
        })
        .collect();

    for handle in handles {
        let got = handle.join().unwrap();
        assert_close(got.as_slice(), expected.as_slice(), 1e-5);
    }
}

// ============================================================
// Error paths
// ============================================================

#[test]
fn missing_model_is_a_resource_error() {
    let dir = std::env::temp_dir().join("cubertopic-no-model-here");
    let err = SentenceEmbedder::load(&dir, EmbedderOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(matches!(err, EmbeddingError::ModelNotFound(_)));
}

#[test]
fn zero_batch_size_is_rejected() {
    let dir = std::env::temp_dir().join("cubertopic-no-model-here");
    let options = EmbedderOptions {
        batch_size: 0,
        ..EmbedderOptions::default()
    };
    let err = SentenceEmbedder::load(&dir, options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[cfg(not(feature = "cuda"))]
#[test]
#[ignore = "needs all-MiniLM-L6-v2 on disk; run with --ignored"]
fn cuda_without_feature_is_a_resource_error() {
    let dir = model_dir();
    let options = EmbedderOptions {
        device: cubertopic::embeddings::Device::Cuda { device_id: 0 },
        ..EmbedderOptions::default()
    };
    let err = SentenceEmbedder::load(&dir, options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(err.to_string().contains("cuda"), "got: {err}");
}

#[tokio::test]
async fn elapsed_deadline_maps_to_resource_error() {
    let deadline = std::time::Duration::from_millis(1);
    let result = tokio::time::timeout(deadline, std::future::pending::<()>()).await;
    let err = result
        .map_err(|_| EmbeddingError::timeout(deadline))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
}

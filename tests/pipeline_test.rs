mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use complexity_analyzer::llm::pricing::context_window_for;
use complexity_analyzer::llm::provider::MAX_RESPONSE_TOKENS;
use complexity_analyzer::llm::{system_prompt_with_schema, AnalysisRequest, RawResult};
use complexity_analyzer::models::{
    Chunk, ComplexityReport, ComplexityWeights, Dimension, FileUnit,
};
use complexity_analyzer::{
    AnalysisConfig, AnalysisPipeline, Credentials, Error, ErrorCategory, TokenEstimator,
};
use tokio_util::sync::CancellationToken;

use common::{
    file_with_lines, part_of, path_of, pipeline, reply, test_config, InMemorySource,
    ScriptedProvider,
};

#[tokio::test]
async fn analyzes_small_and_chunked_files() {
    let provider = Arc::new(ScriptedProvider::scoring(vec![
        ("src/a.rs", [20.0, 30.0, 10.0]),
        ("src/b.rs", [80.0, 60.0, 70.0]),
    ]));
    let files = vec![
        file_with_lines("src/a.rs", 50),  // 500 tokens
        file_with_lines("src/b.rs", 500), // 5000 tokens
    ];

    let report = pipeline(files, provider.clone(), test_config())
        .analyze("octo/demo")
        .await
        .unwrap();

    assert_eq!(report.repository, "octo/demo");
    assert_eq!(report.analyzed_files.len(), 2);
    assert!(report.skipped.is_empty());

    let a = report.file("src/a.rs").unwrap();
    let b = report.file("src/b.rs").unwrap();
    assert_eq!(a.chunk_count, 1);
    assert_eq!(b.chunk_count, 3);
    assert_eq!(b.score(Dimension::Cyclomatic), Some(80.0));

    assert_eq!(report.top_file.as_deref(), Some("src/b.rs"));
    assert!(b.aggregate > a.aggregate);
    assert_eq!(report.metadata.chunk_count, 4);
    assert_eq!(provider.calls(), 4);
    assert_eq!(report.metadata.usage.requests, 4);
    assert_eq!(report.metadata.usage.input_tokens, 400);
    assert_eq!(report.metadata.provider, "scripted");
    assert_eq!(report.metadata.analyzed_count, 2);
    assert_eq!(report.metadata.total_files, 2);
}

#[tokio::test]
async fn excluded_and_non_code_files_are_not_sent() {
    let provider = Arc::new(ScriptedProvider::scoring(vec![]));
    let files = vec![
        file_with_lines("src/lib.rs", 5),
        file_with_lines("tests/integration.rs", 5),
        FileUnit::new("README.md", "# Demo\n"),
        FileUnit::new("assets/logo.svg", "<svg/>"),
    ];

    let report = pipeline(files, provider.clone(), test_config())
        .analyze("octo/demo")
        .await
        .unwrap();

    let paths: Vec<_> = report.analyzed_files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["src/lib.rs"]);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn malformed_reply_is_asked_again_once() {
    let provider = Arc::new(ScriptedProvider::new(|prompt, call| {
        if call == 0 {
            assert!(!prompt.contains("previous reply was rejected"));
            Ok(RawResult::from_text("This code looks moderately complex."))
        } else {
            assert!(prompt.contains("previous reply was rejected"));
            Ok(reply([40.0, 40.0, 40.0]))
        }
    }));

    let report = pipeline(vec![file_with_lines("src/a.rs", 5)], provider.clone(), test_config())
        .analyze("octo/demo")
        .await
        .unwrap();

    assert_eq!(provider.calls(), 2);
    assert!((report.file("src/a.rs").unwrap().aggregate - 40.0).abs() < 1e-9);
}

#[tokio::test]
async fn repeated_malformed_reply_skips_only_that_file() {
    let provider = Arc::new(ScriptedProvider::new(|prompt, _| {
        if path_of(prompt) == "src/broken.rs" {
            Ok(RawResult::from_text(
                r#"{"scores": [{"dimension": "cyclomatic", "value": 150, "rationale": "x"}]}"#,
            ))
        } else {
            Ok(reply([10.0, 20.0, 30.0]))
        }
    }));
    let files = vec![
        file_with_lines("src/broken.rs", 5),
        file_with_lines("src/fine.rs", 5),
    ];

    let report = pipeline(files, provider.clone(), test_config())
        .analyze("octo/demo")
        .await
        .unwrap();

    assert_eq!(provider.calls(), 3);
    assert_eq!(report.analyzed_files.len(), 1);
    assert_eq!(report.top_file.as_deref(), Some("src/fine.rs"));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, "src/broken.rs");
    assert_eq!(report.skipped[0].category, ErrorCategory::MalformedResponse);
    assert!(report.has_warnings());
}

#[tokio::test]
async fn transient_failures_are_retried_with_backoff() {
    let provider = Arc::new(ScriptedProvider::new(|_, call| {
        if call < 2 {
            Err(Error::TransientProvider("503 Service Unavailable".into()))
        } else {
            Ok(reply([30.0, 30.0, 30.0]))
        }
    }));

    let start = std::time::Instant::now();
    let report = pipeline(vec![file_with_lines("src/a.rs", 5)], provider.clone(), test_config())
        .analyze("octo/demo")
        .await
        .unwrap();

    // base * 2^0 + base * 2^1 with a 20ms base
    assert!(start.elapsed() >= Duration::from_millis(60));
    assert_eq!(provider.calls(), 3);
    assert_eq!(report.analyzed_files.len(), 1);
    assert_eq!(report.metadata.usage.requests, 1);
}

#[tokio::test]
async fn exhausted_retries_skip_the_file() {
    let provider = Arc::new(ScriptedProvider::new(|_, _| {
        Err(Error::RateLimitExceeded("429 Too Many Requests".into()))
    }));
    let config = AnalysisConfig {
        max_retries: 1,
        ..test_config()
    };

    let report = pipeline(vec![file_with_lines("src/a.rs", 5)], provider.clone(), config)
        .analyze("octo/demo")
        .await
        .unwrap();

    assert_eq!(provider.calls(), 2);
    assert!(report.analyzed_files.is_empty());
    assert_eq!(report.score, 0.0);
    assert!(report.top_file.is_none());
    assert_eq!(report.skipped[0].category, ErrorCategory::RateLimit);
}

#[tokio::test]
async fn provider_rejection_is_not_retried() {
    let provider = Arc::new(ScriptedProvider::new(|_, _| {
        Err(Error::LLMApi("OpenAI API rejected credentials (401 Unauthorized)".into()))
    }));

    let report = pipeline(vec![file_with_lines("src/a.rs", 5)], provider.clone(), test_config())
        .analyze("octo/demo")
        .await
        .unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(report.skipped[0].category, ErrorCategory::Provider);
}

#[tokio::test]
async fn oversized_line_skips_file() {
    let provider = Arc::new(ScriptedProvider::scoring(vec![]));
    let minified = FileUnit::new("dist/app.js", format!("{}\n", "x".repeat(10_000)));
    let files = vec![minified, file_with_lines("src/main.rs", 5)];

    let report = pipeline(files, provider.clone(), test_config())
        .analyze("octo/demo")
        .await
        .unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, "dist/app.js");
    assert_eq!(report.skipped[0].category, ErrorCategory::OversizedUnit);
    assert_eq!(report.metadata.total_files, 2);
}

#[tokio::test]
async fn dimension_subset_scores_only_requested_dimensions() {
    let provider = Arc::new(ScriptedProvider::scoring(vec![("src/a.rs", [25.0, 90.0, 90.0])]));
    let config = AnalysisConfig {
        dimensions: vec![Dimension::Cyclomatic],
        ..test_config()
    };

    let report = pipeline(vec![file_with_lines("src/a.rs", 5)], provider, config)
        .analyze("octo/demo")
        .await
        .unwrap();

    let file = report.file("src/a.rs").unwrap();
    assert_eq!(file.scores.len(), 1);
    assert!((file.aggregate - 25.0).abs() < 1e-9);
}

#[tokio::test]
async fn missing_repository_is_fatal() {
    let provider = Arc::new(ScriptedProvider::scoring(vec![]));

    let err = pipeline(vec![], provider.clone(), test_config())
        .analyze("octo/missing")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RepoNotFound(_)));
    assert!(err.is_fatal());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_returns_no_report() {
    let provider = Arc::new(
        ScriptedProvider::scoring(vec![]).with_latency(Duration::from_secs(30)),
    );
    let pipeline = pipeline(vec![file_with_lines("src/a.rs", 5)], provider, test_config());

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = pipeline
        .analyze_with_cancel("octo/demo", token)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn run_timeout_cancels() {
    let provider = Arc::new(
        ScriptedProvider::scoring(vec![]).with_latency(Duration::from_secs(30)),
    );
    let config = AnalysisConfig {
        run_timeout: Some(Duration::from_secs(1)),
        ..test_config()
    };

    let err = pipeline(vec![file_with_lines("src/a.rs", 5)], provider, config)
        .analyze("octo/demo")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn report_round_trips_through_json() {
    let provider = Arc::new(ScriptedProvider::new(|prompt, _| {
        let values = match (path_of(prompt).as_str(), part_of(prompt)) {
            ("src/a.rs", 1) => [37.3, 61.9, 12.7],
            ("src/a.rs", 2) => [83.1, 44.4, 29.6],
            ("src/a.rs", _) => [5.9, 97.2, 58.3],
            _ => [33.3, 66.7, 14.2],
        };
        Ok(reply(values))
    }));
    let config = AnalysisConfig {
        complexity_weights: ComplexityWeights::new(0.37, 0.41, 0.22),
        ..test_config()
    };
    // 2000 + 2000 + 300 tokens
    let files = vec![file_with_lines("src/a.rs", 430), file_with_lines("src/b.rs", 70)];

    let report = pipeline(files, provider, config)
        .analyze("octo/demo")
        .await
        .unwrap();
    assert_eq!(report.file("src/a.rs").unwrap().chunk_count, 3);

    let json = serde_json::to_string(&report).unwrap();
    let restored: ComplexityReport = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, report);
    assert_eq!(restored.score.to_bits(), report.score.to_bits());
    for (before, after) in report.analyzed_files.iter().zip(&restored.analyzed_files) {
        assert_eq!(before.aggregate.to_bits(), after.aggregate.to_bits());
        for (a, b) in before.scores.iter().zip(&after.scores) {
            assert_eq!(a.value.to_bits(), b.value.to_bits());
        }
    }
}

#[tokio::test]
async fn full_requests_fit_the_provider_window() {
    let estimator = TokenEstimator::for_model("gpt-4");
    let largest_prompt = Arc::new(AtomicUsize::new(0));
    let seen = largest_prompt.clone();
    let provider = Arc::new(
        ScriptedProvider::new(move |prompt, _| {
            seen.fetch_max(estimator.estimate(prompt), Ordering::SeqCst);
            Ok(reply([40.0, 40.0, 40.0]))
        })
        .with_model("gpt-4", context_window_for("gpt-4")),
    );
    let config = AnalysisConfig {
        llm_provider: "openai".to_string(),
        model: Some("gpt-4".to_string()),
        ..AnalysisConfig::default()
    };
    let source = InMemorySource::new(vec![file_with_lines("src/big.rs", 2_000)]);

    let report = AnalysisPipeline::new(Arc::new(source), provider, config)
        .unwrap()
        .analyze("octo/demo")
        .await
        .unwrap();

    assert!(report.skipped.is_empty());
    assert!(report.file("src/big.rs").unwrap().chunk_count > 1);

    let scaffold = AnalysisRequest::new(
        Chunk {
            source_path: "src/big.rs".to_string(),
            sequence_index: 0,
            text: String::new(),
            estimated_tokens: 0,
        },
        Dimension::ALL.to_vec(),
    );
    let system = estimator.estimate(&system_prompt_with_schema(&scaffold.response_schema()));
    let request = system + largest_prompt.load(Ordering::SeqCst) + MAX_RESPONSE_TOKENS as usize;
    assert!(
        request <= context_window_for("gpt-4"),
        "request needs {} tokens",
        request
    );
}

#[tokio::test]
async fn patterns_and_line_counts_reach_the_report() {
    let provider = Arc::new(ScriptedProvider::new(|prompt, _| {
        let patterns = match (path_of(prompt).as_str(), part_of(prompt)) {
            ("src/a.rs", 1) => r#"["Factory", "Strategy"]"#,
            ("src/a.rs", _) => r#"["strategy", "Observer"]"#,
            _ => r#"["Strategy"]"#,
        };
        Ok(RawResult::from_text(format!(
            r#"{{"scores": [
                {{"dimension": "cyclomatic", "value": 20, "rationale": "branching"}},
                {{"dimension": "architectural", "value": 30, "rationale": "layering"}},
                {{"dimension": "algorithmic", "value": 40, "rationale": "sorting"}}
            ], "patterns": {}, "functions": 2, "classes": 1}}"#,
            patterns
        )))
    }));
    let files = vec![file_with_lines("src/a.rs", 300), file_with_lines("src/b.rs", 20)];

    let report = pipeline(files, provider, test_config())
        .analyze("octo/demo")
        .await
        .unwrap();

    let a = report.file("src/a.rs").unwrap();
    assert_eq!(a.chunk_count, 2);
    assert_eq!(a.patterns, vec!["Factory", "Observer", "Strategy"]);
    assert_eq!(a.line_count, 300);
    assert_eq!(a.function_count, Some(4));
    assert_eq!(a.class_count, Some(2));
    assert_eq!(report.file("src/b.rs").unwrap().line_count, 20);

    assert_eq!(
        report.pattern_distribution(),
        vec![
            ("Strategy".to_string(), 2),
            ("Factory".to_string(), 1),
            ("Observer".to_string(), 1),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn in_flight_requests_respect_the_concurrency_limit() {
    let provider = Arc::new(
        ScriptedProvider::scoring(vec![]).with_latency(Duration::from_secs(1)),
    );
    let config = AnalysisConfig {
        concurrency_limit: 2,
        ..test_config()
    };
    let files: Vec<_> = (0..6)
        .map(|i| file_with_lines(&format!("src/module_{}.rs", i), 5))
        .collect();

    let report = pipeline(files, provider.clone(), config)
        .analyze("octo/demo")
        .await
        .unwrap();

    assert_eq!(report.analyzed_files.len(), 6);
    assert_eq!(provider.calls(), 6);
    assert_eq!(provider.max_in_flight(), 2);
}

#[tokio::test]
async fn unknown_provider_fails_before_any_request() {
    let config = AnalysisConfig {
        llm_provider: "unknown".to_string(),
        ..Default::default()
    };

    let err = complexity_analyzer::analyze("octo/demo", &config, &Credentials::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnknownProvider(ref name) if name == "unknown"));
}

#[tokio::test]
async fn invalid_weights_fail_before_any_request() {
    let config = AnalysisConfig {
        complexity_weights: ComplexityWeights::new(0.0, 0.0, 0.0),
        ..Default::default()
    };

    let err = complexity_analyzer::analyze("octo/demo", &config, &Credentials::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidWeights(_)));
}

#[tokio::test]
async fn missing_api_key_fails_before_any_request() {
    let err = complexity_analyzer::analyze("octo/demo", &AnalysisConfig::default(), &Credentials::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(err.is_fatal());
}

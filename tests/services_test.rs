//! Integration tests for services wired through `AppState`

use bfi_signals::config::Config;
use bfi_signals::services::pipeline;
use bfi_signals::services::scheduler::JobTracker;
use bfi_signals::types::{
    Bias, FormatOptions, JournalEntryInput, LoginRequest, NewsArticle, OhlcBar, RegisterRequest,
    RiskLevel, SentimentLabel, SentimentModel, SignalOutcome, TradeOutcome,
};
use bfi_signals::AppState;
use chrono::{TimeZone, Utc};

fn test_state() -> AppState {
    let mut config = Config::for_tests();
    config.upload_dir = std::env::temp_dir()
        .join(format!("bfi-services-test-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();
    AppState::for_tests(config).unwrap()
}

fn long_bars() -> Vec<OhlcBar> {
    vec![
        OhlcBar::new(0, 100.0, 105.0, 95.0, 100.0),
        OhlcBar::new(1, 100.0, 112.0, 98.0, 110.0),
    ]
}

// =============================================================================
// Sentiment
// =============================================================================

#[test]
fn test_keyword_sentiment_without_llm_keys() {
    let state = test_state();
    let articles = vec![
        NewsArticle::new(
            "Nasdaq surges on strong tech earnings",
            "Growth stocks extend the uptrend",
            "Reuters",
        ),
        NewsArticle::new("Investors see momentum building", "", "CNBC"),
    ];

    let result = tokio_test::block_on(state.sentiment.analyze_articles(&articles, "^NDX"));

    assert_eq!(result.model, SentimentModel::Keyword);
    assert_eq!(result.label, SentimentLabel::Bullish);
    assert_eq!(result.bearish_count, 0);
    assert!(result.confidence > 50.0 && result.confidence <= 95.0);
    assert_eq!(result.article_count, 2);
    assert!(result.news_hash.is_some());
}

#[test]
fn test_empty_news_is_neutral() {
    let state = test_state();
    let result = tokio_test::block_on(state.sentiment.analyze_articles(&[], "^NDX"));
    assert_eq!(result.label, SentimentLabel::Neutral);
    assert_eq!(result.confidence, 50.0);
    assert_eq!(result.model, SentimentModel::None);
}

// =============================================================================
// Pipeline and learning
// =============================================================================

#[test]
fn test_losing_history_lowers_probability() {
    let state = test_state();
    let options = FormatOptions::default();

    tokio_test::block_on(async {
        for _ in 0..5 {
            let processed = pipeline::process_bars(&state, "^NDX", &long_bars(), &options, false)
                .await
                .unwrap();
            let now = Utc::now().timestamp_millis();
            state
                .learning
                .learn_from_outcome(processed.record_id, SignalOutcome::Loss, Some(-50.0), now)
                .unwrap();
        }

        let next = pipeline::process_bars(&state, "^NDX", &long_bars(), &options, false)
            .await
            .unwrap();
        // Base 80 near highs, -5 after five losses
        assert_eq!(next.signal.probability_percentage, 75);
        assert_eq!(next.signal.bias, Bias::Long);

        let record = state.store.get_signal(next.record_id).unwrap().unwrap();
        assert_ne!(record.risk_level, RiskLevel::Low);
    });

    let summary = state
        .learning
        .performance_summary(30, Utc::now().timestamp_millis())
        .unwrap();
    assert_eq!(summary.total_signals, 6);
    assert_eq!(summary.losses, 5);
    assert_eq!(summary.wins, 0);
    assert_eq!(summary.total_profit_loss, -250.0);
}

#[test]
fn test_outcome_for_missing_signal() {
    let state = test_state();
    let err = state
        .learning
        .learn_from_outcome(404, SignalOutcome::Win, None, 0)
        .unwrap_err();
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_generate_with_no_symbols() {
    let state = test_state();
    let report = pipeline::generate_signals(&state, &[]).await;
    assert!(report.signals.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.average_probability, 0.0);
}

// =============================================================================
// Auth and journal
// =============================================================================

#[test]
fn test_password_reset_ends_sessions() {
    let state = test_state();
    state.auth.ensure_default_admin().unwrap();

    let login = state
        .auth
        .login(&LoginRequest {
            username: "admin".to_string(),
            password: "admin123".to_string(),
        })
        .unwrap();
    assert!(state.auth.validate_session(&login.session_token).is_ok());

    let (user, token) = state.auth.request_password_reset("admin").unwrap().unwrap();
    assert_eq!(user.username, "admin");

    state.auth.confirm_password_reset(&token, "new-secret").unwrap();
    assert!(state.auth.validate_session(&login.session_token).is_err());

    // Single use
    assert!(state.auth.confirm_password_reset(&token, "another1").is_err());

    state
        .auth
        .login(&LoginRequest {
            username: "admin".to_string(),
            password: "new-secret".to_string(),
        })
        .unwrap();
}

#[test]
fn test_login_by_email() {
    let state = test_state();
    state.auth.ensure_default_admin().unwrap();
    let admin = state.store.get_user_by_username("admin").unwrap().unwrap();

    let user = state
        .auth
        .register(&RegisterRequest {
            username: "henry".to_string(),
            email: "Henry@Example.com".to_string(),
            password: "secret123".to_string(),
        })
        .unwrap();
    state.auth.approve_user(&admin.id, &user.id).unwrap();

    let response = state
        .auth
        .login(&LoginRequest {
            username: "henry@example.com".to_string(),
            password: "secret123".to_string(),
        })
        .unwrap();
    assert_eq!(response.user.id, user.id);
    assert_eq!(response.session_token.len(), 64);
}

#[test]
fn test_journal_update_keeps_owner_scope() {
    let state = test_state();

    let input = JournalEntryInput {
        symbol: "nas100".to_string(),
        trade_type: "long".to_string(),
        entry_price: 20000.0,
        ..Default::default()
    };
    let entry = state.journal.create("user-1", &input).unwrap();
    assert_eq!(entry.outcome, TradeOutcome::Pending);
    assert_eq!(entry.quantity, 1);

    let update = JournalEntryInput {
        exit_price: Some(20100.0),
        outcome: Some(TradeOutcome::Win),
        profit_loss: Some(100.0),
        ..input.clone()
    };
    assert!(state.journal.update("user-2", entry.id, &update).is_err());

    let updated = state.journal.update("user-1", entry.id, &update).unwrap();
    assert_eq!(updated.outcome, TradeOutcome::Win);
    assert_eq!(updated.created_at, entry.created_at);

    let stats = state.journal.stats("user-1").unwrap();
    assert_eq!(stats.overall.wins, 1);
    assert_eq!(stats.overall.win_rate, 100.0);
    assert_eq!(stats.by_symbol[0].key, "NAS100");
}

#[tokio::test]
async fn test_chart_upload_rejects_mismatched_content() {
    let state = test_state();
    assert!(state.journal.save_chart("fake.png", b"not an image").await.is_err());
    assert!(state.journal.save_chart("script.exe", b"MZ").await.is_err());
    assert!(state.journal.save_chart("empty.gif", b"").await.is_err());

    let name = state
        .journal
        .save_chart("ok.gif", b"GIF89a\x01\x00\x01\x00")
        .await
        .unwrap();
    assert!(state.journal.chart_path(&name).unwrap().exists());
}

#[test]
fn test_delete_never_touches_files_outside_uploads() {
    let state = test_state();
    let victim = std::env::temp_dir().join(format!("bfi-victim-{}.db", uuid::Uuid::new_v4()));
    std::fs::write(&victim, b"sqlite").unwrap();

    let input = JournalEntryInput {
        symbol: "US30".to_string(),
        trade_type: "buy".to_string(),
        entry_price: 44000.0,
        chart_image_path: Some(format!(
            "{}/../{}",
            state.journal.upload_dir().display(),
            victim.file_name().unwrap().to_string_lossy()
        )),
        ..Default::default()
    };
    assert!(state.journal.create("user-1", &input).is_err());

    let entry = state
        .journal
        .create("user-1", &JournalEntryInput { chart_image_path: None, ..input.clone() })
        .unwrap();
    assert!(state.journal.update("user-1", entry.id, &input).is_err());
    state.journal.delete("user-1", entry.id).unwrap();

    assert!(victim.exists());
    let _ = std::fs::remove_file(&victim);
}

// =============================================================================
// Scheduler
// =============================================================================

#[test]
fn test_scheduler_fires_each_job_once() {
    let state = test_state();
    let mut tracker = JobTracker::default();
    let config = &state.config.scheduler;

    let monday = |h, m| Utc.with_ymd_and_hms(2025, 7, 14, h, m, 0).unwrap();

    let due = tracker.due(config, monday(13, 0));
    assert!(due.signals && !due.capture);

    let due = tracker.due(config, monday(21, 5));
    assert!(due.capture && !due.signals);

    let due = tracker.due(config, monday(23, 59));
    assert!(!due.capture && !due.signals);
}

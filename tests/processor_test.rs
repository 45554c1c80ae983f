//! Command pipeline tests
//!
//! Run with: cargo test --test processor_test

use outpost::context::ProcessContext;
use outpost::filter::{
    CommandFilter, LintText, PinAndShortcuts, ResultFilter, TranslateSequences,
};
use outpost::processor::CommandProcessor;
use outpost::toolbox::{CmdError, Command, FeatureSet, RunShell};
use std::sync::Arc;
use std::time::Duration;

fn shell_features() -> FeatureSet {
    let mut features = FeatureSet::new();
    features.install(Box::new(RunShell::default())).unwrap();
    features
}

fn processor_with_lint(
    ctx: Arc<ProcessContext>,
    lint: LintText,
    max_cmd_per_sec: u64,
) -> CommandProcessor {
    let pin = PinAndShortcuts {
        pin: "mypin".to_string(),
        shortcuts: Default::default(),
    };
    let translate = TranslateSequences {
        sequences: vec![vec!["alpha".to_string(), "beta".to_string()]],
    };
    CommandProcessor::new(
        ctx,
        shell_features(),
        vec![
            CommandFilter::PinAndShortcuts(pin),
            CommandFilter::TranslateSequences(translate),
        ],
        vec![
            ResultFilter::ResetCombinedText,
            ResultFilter::LintText(lint),
            ResultFilter::SayEmptyOutput,
        ],
        max_cmd_per_sec,
    )
}

fn tight_lint() -> LintText {
    LintText {
        trim_spaces: true,
        max_length: 2,
        ..LintText::default()
    }
}

// =============================================================================
// END TO END SCENARIOS
// =============================================================================

#[tokio::test]
async fn good_password_runs_the_shell_feature() {
    let ctx = ProcessContext::new();
    let processor = processor_with_lint(ctx.clone(), tight_lint(), 0);
    let result = processor
        .process(Command::new("mypin.secho alpha", 5), true)
        .await;
    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.command.content, ".secho beta");
    assert_eq!(result.combined_output, "be");
    assert_eq!(ctx.cmd_duration.count(), 1);
}

#[tokio::test]
async fn bad_password_is_an_authentication_failure() {
    let ctx = ProcessContext::new();
    let processor = processor_with_lint(ctx, tight_lint(), 0);
    let result = processor
        .process(Command::new("badpin.secho alpha", 5), true)
        .await;
    assert_eq!(result.error, Some(CmdError::AuthenticationFailed));
    assert_eq!(result.output, "");
    let message = CmdError::AuthenticationFailed.to_string();
    assert_eq!(result.combined_output, &message[..2]);
}

#[tokio::test]
async fn unknown_trigger_is_a_bad_prefix() {
    let ctx = ProcessContext::new();
    let processor = processor_with_lint(ctx, tight_lint(), 0);
    let result = processor.process(Command::new("mypin.tz", 5), true).await;
    assert_eq!(result.error, Some(CmdError::BadPrefix));
}

#[tokio::test]
async fn plt_overrides_window_and_timeout() {
    let ctx = ProcessContext::new();
    let lint = LintText {
        trim_spaces: true,
        max_length: 35,
        ..LintText::default()
    };
    let processor = processor_with_lint(ctx, lint, 0);
    let result = processor
        .process(
            Command::new("mypin  .plt  2, 5. 4  .s  sleep 2 ; echo 0123456789", 1),
            true,
        )
        .await;
    // The one second timeout of the command would have killed the sleep;
    // the in-band override raises it to four.
    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.combined_output, "23456");
}

#[tokio::test]
async fn plt_without_a_lint_filter_is_rejected() {
    let ctx = ProcessContext::new();
    let pin = PinAndShortcuts {
        pin: "mypin".to_string(),
        shortcuts: Default::default(),
    };
    let processor = CommandProcessor::new(
        ctx,
        shell_features(),
        vec![CommandFilter::PinAndShortcuts(pin)],
        vec![ResultFilter::ResetCombinedText],
        0,
    );
    let result = processor
        .process(Command::new("mypin .plt 1 2 3 .s echo hi", 5), true)
        .await;
    assert_eq!(result.error, Some(CmdError::BadPlt));
}

#[tokio::test]
async fn emergency_lock_down_refuses_all_work() {
    let ctx = ProcessContext::new();
    let processor = processor_with_lint(ctx.clone(), tight_lint(), 0);
    ctx.trigger_emergency_lock_down();
    let result = processor
        .process(Command::new("mypin.secho alpha", 5), true)
        .await;
    assert_eq!(result.error, Some(CmdError::EmergencyLockDown));
}

#[tokio::test]
async fn per_processor_rate_limit_applies() {
    let ctx = ProcessContext::new();
    let lint = LintText {
        trim_spaces: true,
        max_length: 120,
        ..LintText::default()
    };
    let processor = processor_with_lint(ctx, lint, 2);
    let mut succeeded = 0;
    let mut limited = 0;
    for _ in 0..30 {
        let result = processor
            .process(Command::new("mypin.secho hi", 5), true)
            .await;
        match result.error {
            None => succeeded += 1,
            Some(CmdError::RateLimitExceeded) => limited += 1,
            Some(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(succeeded >= 2, "only {succeeded} commands were admitted");
    assert!(limited > 0, "the limiter never kicked in");

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let result = processor
        .process(Command::new("mypin.secho hi", 5), true)
        .await;
    assert!(result.error.is_none(), "window did not reset: {:?}", result.error);
}

// =============================================================================
// UNIVERSAL INVARIANTS
// =============================================================================

#[tokio::test]
async fn bare_processor_reports_bad_syntax_and_echoes_content() {
    let ctx = ProcessContext::new();
    let processor = CommandProcessor::new(ctx, FeatureSet::new(), Vec::new(), Vec::new(), 0);
    let result = processor.process(Command::new("echo hi", 5), true).await;
    assert_eq!(result.error, Some(CmdError::BadPrefix));
    assert_eq!(result.command.content, "echo hi");

    let result = processor.process(Command::new("   ", 5), true).await;
    assert_eq!(result.error, Some(CmdError::EmptyCommand));
}

#[tokio::test]
async fn lint_bounds_every_combined_output() {
    let ctx = ProcessContext::new();
    let lint = LintText {
        max_length: 40,
        ..LintText::default()
    };
    let processor = processor_with_lint(ctx, lint, 0);
    for content in [
        "mypin.secho alpha",
        "mypin.sseq 1 200",
        "badpin.s whatever",
        "mypin.tz",
    ] {
        let result = processor.process(Command::new(content, 5), true).await;
        assert!(
            result.combined_output.chars().count() <= 40,
            "output of {content} exceeds the lint bound"
        );
    }
}

#[tokio::test]
async fn secret_bearing_triggers_are_hidden_from_the_echo() {
    use outpost::toolbox::{SENSITIVE_CONTENT_PLACEHOLDER, TwoFACodes};

    let ctx = ProcessContext::new();
    let mut features = FeatureSet::new();
    let mut secrets = std::collections::HashMap::new();
    secrets.insert("bank".to_string(), "s3cr3t".to_string());
    features.install(Box::new(TwoFACodes { secrets })).unwrap();
    let pin = PinAndShortcuts {
        pin: "mypin".to_string(),
        shortcuts: Default::default(),
    };
    let processor = CommandProcessor::new(
        ctx,
        features,
        vec![CommandFilter::PinAndShortcuts(pin)],
        vec![ResultFilter::ResetCombinedText],
        0,
    );
    let result = processor.process(Command::new("mypin.2bank", 5), true).await;
    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.command.content, SENSITIVE_CONTENT_PLACEHOLDER);
}

#[tokio::test]
async fn shortcut_expansion_feeds_dispatch() {
    let ctx = ProcessContext::new();
    let mut shortcuts = std::collections::HashMap::new();
    shortcuts.insert("greet".to_string(), ".secho greetings".to_string());
    let pin = PinAndShortcuts {
        pin: "mypin".to_string(),
        shortcuts,
    };
    let lint = LintText {
        trim_spaces: true,
        max_length: 120,
        ..LintText::default()
    };
    let processor = CommandProcessor::new(
        ctx,
        shell_features(),
        vec![CommandFilter::PinAndShortcuts(pin)],
        vec![
            ResultFilter::ResetCombinedText,
            ResultFilter::LintText(lint),
            ResultFilter::SayEmptyOutput,
        ],
        0,
    );
    let result = processor.process(Command::new("greet", 5), true).await;
    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.combined_output, "greetings");
}

#[tokio::test]
async fn whitespace_only_output_reads_empty_output() {
    let ctx = ProcessContext::new();
    let lint = LintText {
        max_length: 120,
        ..LintText::default()
    };
    let processor = processor_with_lint(ctx, lint, 0);
    let result = processor
        .process(Command::new("mypin.sprintf '   '", 5), true)
        .await;
    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.combined_output, "EMPTY OUTPUT");
}

#[tokio::test]
async fn result_filters_can_be_bypassed() {
    let ctx = ProcessContext::new();
    let processor = processor_with_lint(ctx, tight_lint(), 0);
    let result = processor
        .process(Command::new("mypin.secho a longer line", 5), false)
        .await;
    assert!(result.error.is_none());
    // No lint: the raw output including its newline survives.
    assert_eq!(result.combined_output, "a longer line\n");
}

#[tokio::test]
async fn notifications_are_sent_on_a_detached_task() {
    use outpost::filter::NotifyViaEmail;
    use outpost::mailer::{MailError, Mailer};
    use tokio::sync::mpsc;

    struct ChannelMailer(mpsc::UnboundedSender<(String, String)>);

    #[async_trait::async_trait]
    impl Mailer for ChannelMailer {
        async fn send(
            &self,
            subject: &str,
            body: &str,
            _recipients: &[String],
        ) -> Result<(), MailError> {
            self.0.send((subject.to_string(), body.to_string())).ok();
            Ok(())
        }
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut notify = NotifyViaEmail::default();
    notify.recipients = vec!["ops@example.com".to_string()];
    notify.set_mailer(Arc::new(ChannelMailer(tx)));

    let ctx = ProcessContext::new();
    let pin = PinAndShortcuts {
        pin: "mypin".to_string(),
        shortcuts: Default::default(),
    };
    let processor = CommandProcessor::new(
        ctx,
        shell_features(),
        vec![CommandFilter::PinAndShortcuts(pin)],
        vec![
            ResultFilter::ResetCombinedText,
            ResultFilter::NotifyViaEmail(notify),
        ],
        0,
    );
    let result = processor
        .process(Command::new("mypin.secho ping", 5), true)
        .await;
    assert!(result.error.is_none());

    let (_, body) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("notification never arrived")
        .unwrap();
    assert!(body.contains("ping"));
}

// =============================================================================
// SANITY CHECKS
// =============================================================================

#[test]
fn internet_sanity_rejects_weak_pipelines() {
    let ctx = ProcessContext::new();
    let weak = CommandProcessor::new(ctx.clone(), FeatureSet::new(), Vec::new(), Vec::new(), 0);
    assert!(weak.is_empty());
    assert_eq!(weak.is_sane_for_internet().len(), 3);

    let pin = PinAndShortcuts {
        pin: "mypin".to_string(), // shorter than the minimum
        shortcuts: Default::default(),
    };
    let lint = LintText {
        max_length: 2, // below the floor
        ..LintText::default()
    };
    let fishy = CommandProcessor::new(
        ctx.clone(),
        shell_features(),
        vec![CommandFilter::PinAndShortcuts(pin)],
        vec![ResultFilter::LintText(lint)],
        0,
    );
    assert!(!fishy.is_empty());
    assert_eq!(fishy.is_sane_for_internet().len(), 2);

    let sound = processor_with_lint(
        ctx,
        LintText {
            max_length: 120,
            ..LintText::default()
        },
        0,
    );
    // Password "mypin" is short, so this pipeline is still not sane.
    assert_eq!(sound.is_sane_for_internet().len(), 1);
}

// tests/integration/dispatch_test.rs

//! End-to-end tests for the dispatcher against recording services.

use super::test_helpers::{Call, TestContext, test_config};
use nexron::core::DispatchOutcome;
use nexron::core::dispatch::ActionKind;
use nexron::core::dispatch::dispatcher::{
    ERROR_SPEECH, EXECUTED_SPEECH, MUSIC_FALLBACK_CONFIRMATION, NOT_EXECUTED_SPEECH,
};
use nexron::core::services::PowerAction;

#[tokio::test]
async fn test_notepad_is_launched_and_acknowledged() {
    let ctx = TestContext::new();
    let notepad = test_config().actions.apps.notepad.program;

    let ack = ctx.dispatch("notepad").await;

    assert_eq!(ack.text(), "Command processed: notepad");
    assert_eq!(ack.outcome(), &DispatchOutcome::Matched(ActionKind::OpenNotepad));
    assert_eq!(
        ctx.recorder.calls(),
        vec![Call::Launch(notepad), Call::Speak("Opening notepad".into())]
    );
}

#[tokio::test]
async fn test_acknowledgement_preserves_original_case() {
    let ctx = TestContext::new();

    let ack = ctx.dispatch("  Open NOTEPAD please  ").await;

    assert_eq!(ack.text(), "Command processed: Open NOTEPAD please");
    assert_eq!(ack.outcome(), &DispatchOutcome::Matched(ActionKind::OpenNotepad));
}

#[tokio::test]
async fn test_volume_up_increases_once_with_configured_steps() {
    let ctx = TestContext::new();

    let ack = ctx.dispatch("volume up").await;

    assert_eq!(ack.outcome(), &DispatchOutcome::Matched(ActionKind::VolumeUp));
    assert_eq!(
        ctx.recorder.calls(),
        vec![Call::VolumeUp(5), Call::Speak("Volume increased".into())]
    );
}

#[tokio::test]
async fn test_turkish_trigger_matches_after_lowercasing() {
    let ctx = TestContext::new();

    let ack = ctx.dispatch("SES AÇ").await;

    assert_eq!(ack.outcome(), &DispatchOutcome::Matched(ActionKind::VolumeUp));
    assert_eq!(ack.text(), "Command processed: SES AÇ");
}

#[tokio::test]
async fn test_first_matching_rule_wins() {
    let cases = [
        ("close the notepad", ActionKind::OpenNotepad),
        ("notepad and calculator", ActionKind::OpenNotepad),
        ("shutdown the browser", ActionKind::OpenBrowser),
        ("restart the music", ActionKind::OpenMusicPlayer),
        ("volume up in file explorer", ActionKind::OpenFileExplorer),
        ("close and shutdown", ActionKind::CloseWindow),
    ];

    for (command, expected) in cases {
        let ctx = TestContext::new();
        let ack = ctx.dispatch(command).await;
        assert_eq!(
            ack.outcome(),
            &DispatchOutcome::Matched(expected),
            "command {command:?}"
        );
    }
}

#[tokio::test]
async fn test_kapat_closes_window_and_never_shuts_down() {
    let ctx = TestContext::new();

    let ack = ctx.dispatch("kapat").await;

    assert_eq!(ack.outcome(), &DispatchOutcome::Matched(ActionKind::CloseWindow));
    let actions = ctx.recorder.actions();
    assert_eq!(actions, vec![Call::CloseWindow]);
    assert!(!actions.iter().any(|c| matches!(c, Call::Power(_))));
}

#[tokio::test]
async fn test_power_actions_announce_before_acting() {
    let ctx = TestContext::new();

    let ack = ctx.dispatch("shutdown").await;
    assert_eq!(ack.outcome(), &DispatchOutcome::Matched(ActionKind::Shutdown));
    assert_eq!(
        ctx.recorder.calls(),
        vec![
            Call::Speak("Shutting down the system".into()),
            Call::Power(PowerAction::Shutdown),
        ]
    );

    let ctx = TestContext::new();
    ctx.dispatch("yeniden başlat").await;
    assert_eq!(
        ctx.recorder.calls(),
        vec![
            Call::Speak("Restarting the system".into()),
            Call::Power(PowerAction::Restart),
        ]
    );
}

#[tokio::test]
async fn test_screenshot_logs_saved_path() {
    let mut ctx = TestContext::new();

    let ack = ctx.dispatch("take a screenshot").await;

    assert_eq!(ack.outcome(), &DispatchOutcome::Matched(ActionKind::Screenshot));
    assert_eq!(ctx.recorder.spoken(), vec!["Screenshot taken".to_string()]);
    let logs = ctx.logs().await;
    assert!(
        logs.iter()
            .any(|l| l == "Screenshot saved: /tmp/Screenshot_test.png")
    );
}

#[tokio::test]
async fn test_unknown_command_falls_back_to_shell_exactly_once() {
    let mut ctx = TestContext::new();

    let ack = ctx.dispatch("xyzzy123").await;

    assert_eq!(ack.text(), "Command processed: xyzzy123");
    assert_eq!(ack.outcome(), &DispatchOutcome::Fallback { executed: true });
    assert_eq!(ctx.recorder.shell_calls(), vec!["xyzzy123".to_string()]);
    assert_eq!(
        ctx.recorder.spoken(),
        vec![
            "Unknown command: xyzzy123".to_string(),
            EXECUTED_SPEECH.to_string()
        ]
    );
    assert_eq!(ctx.stats.get_unmatched_commands(), 1);

    let logs = ctx.logs().await;
    assert!(logs.iter().any(|l| l == "Unknown command: xyzzy123"));
    assert!(logs.iter().any(|l| l == "Command processed: xyzzy123"));
}

#[tokio::test]
async fn test_shell_receives_trimmed_command_with_case() {
    let ctx = TestContext::new();

    ctx.dispatch("  Echo Hello  ").await;

    assert_eq!(ctx.recorder.shell_calls(), vec!["Echo Hello".to_string()]);
}

#[tokio::test]
async fn test_failing_shell_is_reported_but_acknowledged() {
    let mut ctx = TestContext::new();
    ctx.recorder.set_fail_shell(true);

    let ack = ctx.dispatch("definitely-not-a-program").await;

    assert_eq!(ack.text(), "Command processed: definitely-not-a-program");
    assert_eq!(ack.outcome(), &DispatchOutcome::Fallback { executed: false });
    assert_eq!(ctx.recorder.shell_calls().len(), 1);
    assert_eq!(
        ctx.recorder.spoken().last().map(String::as_str),
        Some(NOT_EXECUTED_SPEECH)
    );
    let logs = ctx.logs().await;
    assert!(logs.iter().any(|l| l.starts_with("Shell execution failed:")));
}

#[tokio::test]
async fn test_disabled_shell_fallback_never_executes() {
    let mut config = test_config();
    config.dispatch.shell_fallback = false;
    let mut ctx = TestContext::with_config(config);

    let ack = ctx.dispatch("rm -rf /tmp/nothing").await;

    assert_eq!(ack.outcome(), &DispatchOutcome::Fallback { executed: false });
    assert!(ctx.recorder.shell_calls().is_empty());
    let logs = ctx.logs().await;
    assert!(
        logs.iter()
            .any(|l| l == "Shell fallback disabled, not executing: rm -rf /tmp/nothing")
    );
}

#[tokio::test]
async fn test_music_falls_back_to_secondary_player() {
    let mut ctx = TestContext::new();
    let apps = test_config().actions.apps;
    ctx.recorder.set_missing_program(&apps.music.program);

    let ack = ctx.dispatch("play some music").await;

    assert_eq!(ack.outcome(), &DispatchOutcome::Matched(ActionKind::OpenMusicPlayer));
    assert_eq!(
        ctx.recorder.calls(),
        vec![
            Call::Launch(apps.music_fallback.program),
            Call::Speak(MUSIC_FALLBACK_CONFIRMATION.into()),
        ]
    );
    let logs = ctx.logs().await;
    assert!(
        logs.iter()
            .any(|l| l.starts_with("Primary music player unavailable:"))
    );
}

#[tokio::test]
async fn test_failed_action_speaks_error_and_still_acknowledges() {
    let mut ctx = TestContext::new();
    ctx.recorder.set_fail_window(true);

    let ack = ctx.dispatch("close").await;

    assert_eq!(ack.text(), "Command processed: close");
    assert_eq!(ack.outcome(), &DispatchOutcome::Failed(ActionKind::CloseWindow));
    assert_eq!(ctx.recorder.spoken(), vec![ERROR_SPEECH.to_string()]);
    assert_eq!(ctx.stats.get_failed_actions(), 1);
    let logs = ctx.logs().await;
    assert!(
        logs.iter()
            .any(|l| l.starts_with("Command processing error:"))
    );
}

#[tokio::test]
async fn test_missing_application_is_a_failed_action() {
    let ctx = TestContext::new();
    let calculator = test_config().actions.apps.calculator.program;
    ctx.recorder.set_missing_program(&calculator);

    let ack = ctx.dispatch("calculator").await;

    assert_eq!(ack.outcome(), &DispatchOutcome::Failed(ActionKind::OpenCalculator));
    assert!(ctx.recorder.shell_calls().is_empty());
}

#[tokio::test]
async fn test_panicking_action_is_contained() {
    let mut ctx = TestContext::new();
    ctx.recorder.set_panic_on_screenshot(true);

    let ack = ctx.dispatch("screenshot").await;

    assert_eq!(ack.outcome(), &DispatchOutcome::Failed(ActionKind::Screenshot));
    let logs = ctx.logs().await;
    assert!(logs.iter().any(|l| l.contains("screen capture exploded")));

    // The dispatcher stays usable afterwards.
    let ack = ctx.dispatch("volume down").await;
    assert_eq!(ack.outcome(), &DispatchOutcome::Matched(ActionKind::VolumeDown));
}

#[tokio::test]
async fn test_every_dispatch_is_counted() {
    let ctx = TestContext::new();

    ctx.dispatch("notepad").await;
    ctx.dispatch("xyzzy").await;
    ctx.dispatch("kapat").await;

    assert_eq!(ctx.stats.get_total_commands(), 3);
    assert_eq!(ctx.stats.get_unmatched_commands(), 1);
}

//! Router tests: allowlist, menus, the command prompt and guarded entries.

use std::time::Duration;

use hostwarden::auth::AdminAllowlist;
use hostwarden::catalog::{Catalog, PredefinedCommand};
use hostwarden::format::TRUNCATION_SUFFIX;
use hostwarden::inspector::ServiceTargets;
use hostwarden::router::ACCESS_DENIED;
use hostwarden::{Inspector, Reply, Router};

const ADMIN: i64 = 1001;
const STRANGER: i64 = 666;

fn router() -> Router {
    router_with_limit(3500)
}

fn router_with_limit(display_limit: usize) -> Router {
    let extra = vec![
        PredefinedCommand {
            id: "greet".into(),
            command: "echo hello".into(),
            description: "Say hello".into(),
            confirm: false,
        },
        PredefinedCommand {
            id: "guarded".into(),
            command: "echo confirmed".into(),
            description: "Guarded echo".into(),
            confirm: true,
        },
    ];
    Router::new(
        AdminAllowlist::new([ADMIN]),
        Catalog::new(extra),
        Inspector::new(ServiceTargets::default(), 10),
        Duration::from_secs(10),
        display_limit,
    )
}

fn callbacks(reply: &Reply) -> Vec<String> {
    reply
        .keyboard
        .iter()
        .flat_map(|kb| kb.buttons())
        .map(|b| b.callback_data.clone())
        .collect()
}

mod access {
    use super::*;

    #[tokio::test]
    async fn test_stranger_commands_denied() {
        let reply = router().handle_text(STRANGER, "/cmd id").await.unwrap();
        assert_eq!(reply.text, ACCESS_DENIED);
    }

    #[tokio::test]
    async fn test_stranger_plain_text_ignored() {
        assert!(router().handle_text(STRANGER, "hello").await.is_none());
    }

    #[tokio::test]
    async fn test_stranger_buttons_denied() {
        let reply = router().handle_callback(STRANGER, "quick_greet").await;
        assert_eq!(reply.text, ACCESS_DENIED);
        assert!(reply.keyboard.is_none());
    }
}

mod menus {
    use super::*;

    #[tokio::test]
    async fn test_start_shows_main_menu() {
        let reply = router().handle_text(ADMIN, "/start").await.unwrap();
        assert_eq!(
            callbacks(&reply),
            vec!["monitoring", "quick_cmds", "terminal", "management", "help_menu"]
        );
    }

    #[tokio::test]
    async fn test_quick_menu_lists_catalog() {
        let reply = router().handle_callback(ADMIN, "quick_cmds").await;
        let ids = callbacks(&reply);
        assert!(ids.contains(&"quick_greet".to_string()));
        assert!(ids.contains(&"quick_uptime".to_string()));
        assert!(!ids.contains(&"quick_reboot".to_string()));
        assert_eq!(ids.last().map(String::as_str), Some("main_menu"));
    }

    #[tokio::test]
    async fn test_management_menu() {
        let reply = router().handle_callback(ADMIN, "management").await;
        assert_eq!(
            callbacks(&reply),
            vec!["quick_reboot", "quick_shutdown", "quick_system_logs", "main_menu"]
        );
    }

    #[tokio::test]
    async fn test_reports_cut_to_display_limit() {
        let router = router_with_limit(40);
        for data in ["memory_status", "network_status", "processes_status"] {
            let reply = router.handle_callback(ADMIN, data).await;
            assert!(reply.text.ends_with(TRUNCATION_SUFFIX), "{}: {}", data, reply.text);
            assert!(reply.text.chars().count() <= 40 + TRUNCATION_SUFFIX.chars().count());
        }

        let status = router.handle_text(ADMIN, "/status").await.unwrap();
        assert!(status.text.ends_with(TRUNCATION_SUFFIX));
    }

    #[tokio::test]
    async fn test_unknown_callback() {
        let reply = router().handle_callback(ADMIN, "no_such_button").await;
        assert!(reply.text.contains("Unknown action"));
        assert_eq!(callbacks(&reply), vec!["main_menu"]);
    }

    #[tokio::test]
    async fn test_report_has_refresh_and_back() {
        let reply = router().handle_callback(ADMIN, "memory_status").await;
        assert!(reply.text.contains("Memory"));
        assert_eq!(callbacks(&reply), vec!["memory_status", "monitoring"]);
    }
}

mod commands {
    use super::*;

    #[tokio::test]
    async fn test_slash_cmd_runs() {
        let reply = router().handle_text(ADMIN, "/cmd echo hi").await.unwrap();
        assert!(reply.text.starts_with("*Command:* `echo hi`"));
        assert!(reply.text.contains("```\nhi\n"));
    }

    #[tokio::test]
    async fn test_slash_cmd_without_argument() {
        let reply = router().handle_text(ADMIN, "/cmd").await.unwrap();
        assert!(reply.text.starts_with("Usage:"));
    }

    #[tokio::test]
    async fn test_prompt_runs_exactly_once() {
        let router = router();
        router.handle_callback(ADMIN, "custom_command").await;
        assert!(router.is_slow_text(ADMIN, "echo first").await);

        let first = router.handle_text(ADMIN, "echo first").await.unwrap();
        assert!(first.text.contains("first"));
        assert!(callbacks(&first).contains(&"custom_command".to_string()));

        let second = router.handle_text(ADMIN, "echo second").await.unwrap();
        assert!(!second.text.contains("*Command:*"));
    }

    #[tokio::test]
    async fn test_prompt_cancel() {
        let router = router();
        router.handle_callback(ADMIN, "custom_command").await;
        assert!(!router.is_slow_text(ADMIN, "Cancel").await);
        let reply = router.handle_text(ADMIN, "Cancel").await.unwrap();
        assert!(reply.text.contains("cancelled"));
        assert!(!router.is_slow_text(ADMIN, "ls").await);
    }

    #[tokio::test]
    async fn test_navigation_abandons_prompt() {
        let router = router();
        router.handle_callback(ADMIN, "custom_command").await;
        router.handle_callback(ADMIN, "main_menu").await;
        assert!(!router.is_slow_text(ADMIN, "ls").await);
    }

    #[tokio::test]
    async fn test_quick_command_runs_with_repeat_button() {
        let reply = router().handle_callback(ADMIN, "quick_greet").await;
        assert!(reply.text.starts_with("*Say hello*"));
        assert!(reply.text.contains("hello\n"));
        assert_eq!(callbacks(&reply), vec!["quick_greet", "quick_cmds"]);
    }

    #[tokio::test]
    async fn test_guarded_entry_asks_first() {
        let router = router();
        let prompt = router.handle_callback(ADMIN, "quick_guarded").await;
        assert!(prompt.text.contains("Are you sure?"));
        assert!(!prompt.text.contains("*Result:*"));
        assert_eq!(callbacks(&prompt), vec!["confirm_guarded", "management"]);

        let done = router.handle_callback(ADMIN, "confirm_guarded").await;
        assert!(done.text.contains("confirmed\n"));
    }

    #[tokio::test]
    async fn test_reboot_never_runs_without_confirmation() {
        let reply = router().handle_callback(ADMIN, "quick_reboot").await;
        assert!(reply.text.contains("sudo reboot"));
        assert!(callbacks(&reply).contains(&"confirm_reboot".to_string()));
    }
}

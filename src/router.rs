//! Maps operator events to runner and inspector calls.
//!
//! Buttons carry a callback id (`monitoring`, `disk_status`, `quick_<id>`,
//! ...); text is either a slash command or, right after the operator pressed
//! "Enter command", a command line to run. The router returns the reply text
//! and keyboard and leaves delivery to the messenger.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use strum::{Display, EnumIter, EnumString};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::auth::AdminAllowlist;
use crate::catalog::{Catalog, PredefinedCommand};
use crate::config::Config;
use crate::format::{command_reply, truncate_for_display};
use crate::inspector::{Inspector, Section};
use crate::messengers::{InlineButton, InlineKeyboard};
use crate::runner;

pub const ACCESS_DENIED: &str = "⛔ Access denied";

/// Lines of the host report shown by `/status`.
const STATUS_PREVIEW_LINES: usize = 15;

/// Fixed screens reachable from a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Screen {
    MainMenu,
    Monitoring,
    QuickCmds,
    Terminal,
    Management,
    HelpMenu,
    SystemStatus,
    DiskStatus,
    DiskDetailed,
    MemoryStatus,
    NetworkStatus,
    ServicesStatus,
    ProcessesStatus,
    CustomCommand,
}

impl Screen {
    /// The inspector report behind a monitoring button.
    pub fn section(self) -> Option<Section> {
        match self {
            Self::SystemStatus => Some(Section::Host),
            Self::DiskStatus => Some(Section::Disk),
            Self::DiskDetailed => Some(Section::DiskDetailed),
            Self::MemoryStatus => Some(Section::Memory),
            Self::NetworkStatus => Some(Section::Network),
            Self::ServicesStatus => Some(Section::Services),
            Self::ProcessesStatus => Some(Section::Processes),
            _ => None,
        }
    }
}

/// A decoded callback id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Screen(Screen),
    /// `quick_<id>`: run a catalog entry, or ask first if it is guarded
    Quick(String),
    /// `confirm_<id>`: run a guarded catalog entry
    Confirm(String),
}

impl Action {
    /// Actions that take long enough to deserve a "working" notice.
    pub fn is_slow(&self) -> bool {
        match self {
            Self::Screen(screen) => screen.section().is_some(),
            Self::Quick(_) | Self::Confirm(_) => true,
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        if let Ok(screen) = Screen::from_str(data) {
            return Ok(Self::Screen(screen));
        }
        if let Some(id) = data.strip_prefix("quick_").filter(|id| !id.is_empty()) {
            return Ok(Self::Quick(id.to_string()));
        }
        if let Some(id) = data.strip_prefix("confirm_").filter(|id| !id.is_empty()) {
            return Ok(Self::Confirm(id.to_string()));
        }
        Err(format!("unknown action: {}", data))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Screen(screen) => write!(f, "{}", screen),
            Self::Quick(id) => write!(f, "quick_{}", id),
            Self::Confirm(id) => write!(f, "confirm_{}", id),
        }
    }
}

/// Text plus the keyboard to show under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: InlineKeyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

fn button(text: &str, action: impl fmt::Display) -> InlineButton {
    InlineButton::new(text, action.to_string())
}

fn back_to(text: &str, screen: Screen) -> InlineKeyboard {
    InlineKeyboard::new().row([button(text, screen)])
}

fn main_menu_keyboard() -> InlineKeyboard {
    InlineKeyboard::column([
        button("📊 Monitoring", Screen::Monitoring),
        button("⚡ Quick commands", Screen::QuickCmds),
        button("🖥️ Terminal", Screen::Terminal),
        button("🔧 Management", Screen::Management),
        button("ℹ️ Help", Screen::HelpMenu),
    ])
}

fn monitoring_keyboard() -> InlineKeyboard {
    InlineKeyboard::column([
        button("📈 System status", Screen::SystemStatus),
        button("💾 Disk space", Screen::DiskStatus),
        button("💽 Block devices", Screen::DiskDetailed),
        button("🧠 Memory", Screen::MemoryStatus),
        button("🌐 Network", Screen::NetworkStatus),
        button("📡 Services", Screen::ServicesStatus),
        button("📈 Top processes", Screen::ProcessesStatus),
        button("🔙 Main menu", Screen::MainMenu),
    ])
}

const HELP_TEXT: &str = "🆘 *Help*\n\n\
*Chat commands:*\n\
`/start` - Main menu\n\
`/menu` - Show the menu\n\
`/status` - Short system status\n\
`/cmd <command>` - Run a command\n\
`/help` - This help\n\n\
*Menu sections:*\n\
• 📊 Monitoring - system reports\n\
• ⚡ Quick commands - ready-made commands\n\
• 🖥️ Terminal - run your own commands\n\
• 🔧 Management - reboot, shutdown and logs\n\n\
*Security:*\n\
• Only administrators have access\n\
• Every command is logged\n\
• Reboot and shutdown ask for confirmation";

/// Routes events for the allowlisted operators. Shared across event tasks.
pub struct Router {
    allowlist: AdminAllowlist,
    catalog: Catalog,
    inspector: Inspector,
    command_timeout: Duration,
    display_limit: usize,
    /// Operators whose next plain-text message is a command line.
    awaiting_command: Mutex<HashSet<i64>>,
}

impl Router {
    pub fn new(
        allowlist: AdminAllowlist,
        catalog: Catalog,
        inspector: Inspector,
        command_timeout: Duration,
        display_limit: usize,
    ) -> Self {
        Self {
            allowlist,
            catalog,
            inspector,
            command_timeout,
            display_limit,
            awaiting_command: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            AdminAllowlist::new(config.admin_ids.iter().copied()),
            Catalog::new(config.commands.clone()),
            Inspector::from_config(config),
            config.command_timeout(),
            config.display_limit,
        )
    }

    pub fn allowlist(&self) -> &AdminAllowlist {
        &self.allowlist
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Whether handling this text will run a command or a report.
    pub async fn is_slow_text(&self, sender_id: i64, text: &str) -> bool {
        let text = text.trim();
        if text.starts_with('/') {
            let name = command_name(text);
            return name == "status" || (name == "cmd" && !command_args(text).is_empty());
        }
        !text.eq_ignore_ascii_case("cancel")
            && self.awaiting_command.lock().await.contains(&sender_id)
    }

    /// Handle a text message. `None` means stay silent.
    pub async fn handle_text(&self, sender_id: i64, text: &str) -> Option<Reply> {
        let text = text.trim();
        if !self.allowlist.is_admin(sender_id) {
            if text.starts_with('/') {
                warn!(operator = sender_id, "Rejected command from non-admin");
                return Some(Reply::text(ACCESS_DENIED));
            }
            return None;
        }

        if text.starts_with('/') {
            return Some(self.handle_slash(sender_id, text).await);
        }

        if !self.awaiting_command.lock().await.remove(&sender_id) {
            return Some(Reply::with_keyboard(
                "Use /menu to open the control panel or /cmd <command> to run a command.",
                back_to("📋 Open menu", Screen::MainMenu),
            ));
        }

        if text.eq_ignore_ascii_case("cancel") {
            return Some(Reply::with_keyboard(
                "❌ Command cancelled",
                back_to("🔙 Terminal", Screen::Terminal),
            ));
        }

        let keyboard = InlineKeyboard::new()
            .row([button("🔄 Another command", Screen::CustomCommand)])
            .row([button("🔙 Terminal", Screen::Terminal)]);
        Some(Reply::with_keyboard(
            self.run_command(sender_id, text).await,
            keyboard,
        ))
    }

    async fn handle_slash(&self, sender_id: i64, text: &str) -> Reply {
        match command_name(text) {
            "start" => Reply::with_keyboard(
                "👋 *Welcome to the server control panel!*\n\nChoose a section:",
                main_menu_keyboard(),
            ),
            "menu" => Reply::with_keyboard(
                "👋 *Main menu*\n\nChoose a section:",
                main_menu_keyboard(),
            ),
            "status" => {
                let report = self.inspector.report(Section::Host).await;
                let preview: Vec<&str> = report.lines().take(STATUS_PREVIEW_LINES).collect();
                Reply::with_keyboard(
                    truncate_for_display(&preview.join("\n"), self.display_limit),
                    back_to("📊 Details", Screen::SystemStatus),
                )
            }
            "help" => Reply::with_keyboard(HELP_TEXT, back_to("📋 Open menu", Screen::MainMenu)),
            "cmd" => {
                let command = command_args(text);
                if command.is_empty() {
                    return Reply::text("Usage: `/cmd <command>`\nExample: `/cmd df -h`");
                }
                Reply::text(self.run_command(sender_id, command).await)
            }
            other => Reply::text(format!("Unknown command `/{}`. Use /help.", other)),
        }
    }

    /// Handle a button press. Always answers, since the pressed message is
    /// edited in place.
    pub async fn handle_callback(&self, sender_id: i64, data: &str) -> Reply {
        if !self.allowlist.is_admin(sender_id) {
            warn!(operator = sender_id, data, "Rejected button press from non-admin");
            return Reply::text(ACCESS_DENIED);
        }

        let action = match Action::from_str(data) {
            Ok(action) => action,
            Err(e) => {
                warn!(operator = sender_id, error = %e, "Unknown callback");
                return Reply::with_keyboard(
                    "❓ Unknown action",
                    back_to("🔙 Main menu", Screen::MainMenu),
                );
            }
        };

        // Navigating anywhere else abandons a pending command prompt.
        {
            let mut awaiting = self.awaiting_command.lock().await;
            if action == Action::Screen(Screen::CustomCommand) {
                awaiting.insert(sender_id);
            } else {
                awaiting.remove(&sender_id);
            }
        }

        match action {
            Action::Screen(screen) => self.show_screen(screen).await,
            Action::Quick(id) => self.quick(sender_id, &id).await,
            Action::Confirm(id) => self.confirm(sender_id, &id).await,
        }
    }

    async fn show_screen(&self, screen: Screen) -> Reply {
        if let Some(section) = screen.section() {
            let report = self.inspector.report(section).await;
            let keyboard = InlineKeyboard::new()
                .row([button("🔄 Refresh", screen)])
                .row([button("🔙 Back", Screen::Monitoring)]);
            return Reply::with_keyboard(
                truncate_for_display(&report, self.display_limit),
                keyboard,
            );
        }

        match screen {
            Screen::MainMenu => Reply::with_keyboard(
                "👋 *Welcome to the server control panel!*\n\nChoose a section:",
                main_menu_keyboard(),
            ),
            Screen::Monitoring => Reply::with_keyboard(
                "📊 *Server monitoring*\n\nWhat would you like to see?",
                monitoring_keyboard(),
            ),
            Screen::QuickCmds => {
                let mut buttons: Vec<InlineButton> = self
                    .catalog
                    .quick()
                    .map(|cmd| button(&cmd.description, Action::Quick(cmd.id.clone())))
                    .collect();
                buttons.push(button("🔙 Main menu", Screen::MainMenu));
                Reply::with_keyboard(
                    "⚡ *Quick commands*\n\nChoose a command to run:",
                    InlineKeyboard::column(buttons),
                )
            }
            Screen::Terminal => Reply::with_keyboard(
                "🖥️ *Server terminal*\n\n\
                 You can run any command on the server.\n\
                 ⚠️ *Careful:* run only commands you have checked!",
                InlineKeyboard::column([
                    button("📝 Enter command", Screen::CustomCommand),
                    button("🔙 Main menu", Screen::MainMenu),
                ]),
            ),
            Screen::Management => {
                let mut buttons: Vec<InlineButton> = ["reboot", "shutdown", "system_logs"]
                    .into_iter()
                    .filter_map(|id| self.catalog.get(id))
                    .map(|cmd| button(&cmd.description, Action::Quick(cmd.id.clone())))
                    .collect();
                buttons.push(button("🔙 Main menu", Screen::MainMenu));
                Reply::with_keyboard(
                    "🔧 *Server management*\n\nChoose an action:",
                    InlineKeyboard::column(buttons),
                )
            }
            Screen::HelpMenu => {
                Reply::with_keyboard(HELP_TEXT, back_to("🔙 Main menu", Screen::MainMenu))
            }
            Screen::CustomCommand => Reply::with_keyboard(
                "📝 *Send the command to run:*\n\n\
                 Examples:\n\
                 • `ls -la`\n\
                 • `df -h`\n\
                 • `systemctl status nginx`\n\n\
                 Send `cancel` to abort.",
                back_to("❌ Cancel", Screen::Terminal),
            ),
            // Report screens are handled above.
            _ => Reply::with_keyboard(
                "📊 *Server monitoring*",
                monitoring_keyboard(),
            ),
        }
    }

    async fn quick(&self, sender_id: i64, id: &str) -> Reply {
        let Some(cmd) = self.catalog.get(id) else {
            return Reply::with_keyboard(
                format!("❓ Unknown command `{}`", id),
                back_to("🔙 Back", Screen::QuickCmds),
            );
        };

        if cmd.confirm {
            let keyboard = InlineKeyboard::new().row([
                button("✅ Yes, run it", Action::Confirm(cmd.id.clone())),
                button("❌ No", Screen::Management),
            ]);
            return Reply::with_keyboard(
                format!(
                    "⚠️ *{}*\n\nThis will run `{}`. Are you sure?",
                    cmd.description, cmd.command
                ),
                keyboard,
            );
        }

        let keyboard = InlineKeyboard::new()
            .row([button("🔄 Repeat", Action::Quick(cmd.id.clone()))])
            .row([button("🔙 Back", Screen::QuickCmds)]);
        Reply::with_keyboard(self.run_catalog(sender_id, cmd).await, keyboard)
    }

    async fn confirm(&self, sender_id: i64, id: &str) -> Reply {
        match self.catalog.get(id) {
            Some(cmd) => Reply::with_keyboard(
                self.run_catalog(sender_id, cmd).await,
                back_to("🔙 Main menu", Screen::MainMenu),
            ),
            None => Reply::with_keyboard(
                format!("❓ Unknown command `{}`", id),
                back_to("🔙 Main menu", Screen::MainMenu),
            ),
        }
    }

    async fn run_catalog(&self, sender_id: i64, cmd: &PredefinedCommand) -> String {
        info!(operator = sender_id, id = %cmd.id, command = %cmd.command, "Running catalog command");
        let result = runner::run(&cmd.command, self.command_timeout).await;
        format!(
            "*{}*\n\n{}",
            cmd.description,
            command_reply(&cmd.command, &result, self.display_limit)
        )
    }

    async fn run_command(&self, sender_id: i64, command: &str) -> String {
        info!(operator = sender_id, command, "Running operator command");
        let result = runner::run(command, self.command_timeout).await;
        command_reply(command, &result, self.display_limit)
    }
}

/// `/cmd@my_bot ls` → `cmd`
fn command_name(text: &str) -> &str {
    let word = text
        .trim_start_matches('/')
        .split_whitespace()
        .next()
        .unwrap_or("");
    word.split('@').next().unwrap_or(word)
}

/// Everything after the command word.
fn command_args(text: &str) -> &str {
    text.trim()
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or("")
}

use std::borrow::Cow::{self, Borrowed, Owned};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use rustyline::Editor;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use tanya_core::auth::{
    AuthSession, IdentityProvider, InMemoryIdentityProvider, RegistrationForm, SignInForm,
};
use tanya_core::chat::{Conversation, MessageRole};
use tanya_core::config::AppConfig;
use tanya_core::guard::{Route, RouteDecision, RouteGuard};
use tanya_core::history::HistoryStore;
use tanya_core::notify::{ChannelNotifier, Notice, NoticeLevel, Notifier};
use tanya_interaction::{QaApiClient, RestIdentityProvider};

const COMMANDS: &[&str] = &[
    "/login", "/register", "/logout", "/new", "/history", "/continue", "/refresh", "/profile",
    "/whoami", "/help",
];

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|command| command.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|command| command.starts_with(line))
                .map(|command| Pair {
                    display: command.clone(),
                    replacement: command.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|command| command.starts_with(line) && command.len() > line.len())
                .map(|command| command[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// The main entry point for the Tanya REPL client.
///
/// Sets up the backend client, the auth session, and the conversation state
/// machine, then drives a rustyline loop: plain text goes to the assistant,
/// slash commands cover login, history, and session switching.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // ===== Backend and auth wiring =====
    let config = AppConfig::load()?;
    let backend: Arc<dyn tanya_core::backend::ChatBackend> =
        Arc::new(QaApiClient::from_settings(&config.backend));

    let provider: Arc<dyn IdentityProvider> = match RestIdentityProvider::try_from_env() {
        Ok(provider) => Arc::new(provider),
        Err(_) => {
            tracing::warn!("TANYA_AUTH_URL not set, using the in-process identity provider");
            Arc::new(InMemoryIdentityProvider::new())
        }
    };
    let auth = Arc::new(AuthSession::new(provider));

    let (notifier, mut notices) = ChannelNotifier::new();
    let notifier = Arc::new(notifier);

    let history = Arc::new(HistoryStore::new(Arc::clone(&backend)));
    let conversation = Arc::new(Conversation::new(
        backend,
        history,
        Arc::clone(&auth),
        config.chat.timing(),
    ));
    let _auth_listener = conversation.spawn_auth_listener();

    // Drain transient notices in the background
    let notice_printer = tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            print_notice(&notice);
        }
    });

    // Resolve the persisted identity before the first prompt; failures fall
    // back to guest mode and have already been logged.
    let _ = auth.resolve().await;

    // ===== Route guard: the landing view =====
    let guard = RouteGuard::new(Arc::clone(&notifier) as Arc<dyn Notifier>);
    match guard.check(&auth.state(), Route::Landing) {
        RouteDecision::Allow => {
            let label = auth
                .state()
                .identity
                .map(|identity| identity.display_label())
                .unwrap_or_default();
            println!("{}", format!("Selamat datang kembali, {label}!").green());
        }
        RouteDecision::RedirectToLogin => {
            // The guard already queued the login notice; guests may still chat
        }
        RouteDecision::Loading => {}
    }

    // ===== REPL setup =====
    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== Tanya ===".bright_magenta().bold());
    println!(
        "{}",
        "Ketik pertanyaan untuk mulai, '/help' untuk daftar perintah, 'quit' untuk keluar."
            .bright_black()
    );
    println!();

    conversation.start_new_chat().await;
    print_reveal(&conversation).await;

    // ===== Main REPL loop =====
    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Sampai jumpa!".bright_green());
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&line);

                if let Some(command) = trimmed.strip_prefix('/') {
                    handle_command(command, &conversation, &auth, notifier.as_ref()).await;
                } else {
                    send_and_render(&conversation, trimmed).await;
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C. Ketik 'quit' untuk keluar.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D. Keluar...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {err:?}").red());
                break;
            }
        }
    }

    // Release every notifier handle so the printer drains and exits
    drop(guard);
    drop(notifier);
    let _ = notice_printer.await;

    Ok(())
}

/// Sends one turn and animates the reply as it reveals.
async fn send_and_render(conversation: &Conversation, text: &str) {
    println!("{}", format!("> {text}").green());
    conversation.send_message(text).await;
    print_reveal(conversation).await;
}

/// Prints the currently revealing message as its characters appear.
async fn print_reveal(conversation: &Conversation) {
    print!("{}", "Tanya: ".bright_magenta());
    let mut printed = 0usize;
    loop {
        let Some(reveal) = conversation.reveal().await else {
            break;
        };
        let visible: Vec<char> = reveal.visible.chars().collect();
        if visible.len() > printed {
            let chunk: String = visible[printed..].iter().collect();
            print!("{}", chunk.bright_blue());
            let _ = std::io::stdout().flush();
            printed = visible.len();
        }
        if reveal.complete {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    println!();
}

async fn handle_command(
    command: &str,
    conversation: &Arc<Conversation>,
    auth: &Arc<AuthSession>,
    notifier: &dyn Notifier,
) {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match name {
        "login" => match args.as_slice() {
            [email, password] => {
                let form = SignInForm::new(*email, *password);
                match auth.sign_in(&form).await {
                    Ok(identity) => notifier.notify(Notice::success(format!(
                        "Login berhasil! Selamat datang kembali, {}.",
                        identity.display_label()
                    ))),
                    Err(err) => {
                        println!("{}", err.to_string().red());
                        notifier.notify(Notice::error(
                            "Login gagal. Periksa email dan password Anda.",
                        ));
                    }
                }
            }
            _ => println!("{}", "Pemakaian: /login <email> <password>".yellow()),
        },
        "register" => match args.as_slice() {
            [email, password, confirm, rest @ ..] => {
                let form = RegistrationForm {
                    email: email.to_string(),
                    password: password.to_string(),
                    confirm_password: confirm.to_string(),
                    display_name: (!rest.is_empty()).then(|| rest.join(" ")),
                };
                match auth.register(&form).await {
                    Ok(identity) => notifier.notify(Notice::success(format!(
                        "Pendaftaran berhasil! Halo, {}.",
                        identity.display_label()
                    ))),
                    Err(err) => println!("{}", err.to_string().red()),
                }
            }
            _ => println!(
                "{}",
                "Pemakaian: /register <email> <password> <konfirmasi> [nama]".yellow()
            ),
        },
        "logout" => {
            if let Err(err) = auth.sign_out().await {
                tracing::warn!(error = %err, "provider sign-out failed");
            }
            notifier.notify(Notice::info("Anda telah logout."));
        }
        "new" => {
            conversation.start_new_chat().await;
            print_reveal(conversation).await;
        }
        "history" => print_history(conversation).await,
        "continue" => match args.as_slice() {
            [chat_id] => {
                conversation.continue_chat(chat_id).await;
                print_transcript(conversation).await;
            }
            _ => println!("{}", "Pemakaian: /continue <chat_id>".yellow()),
        },
        "refresh" => {
            conversation.refresh_history().await;
            print_history(conversation).await;
        }
        "profile" => {
            if args.is_empty() {
                println!("{}", "Pemakaian: /profile <nama>".yellow());
            } else {
                match auth.update_display_name(&args.join(" ")).await {
                    Ok(identity) => notifier.notify(Notice::success(format!(
                        "Nama tampilan diperbarui: {}",
                        identity.display_label()
                    ))),
                    Err(err) => println!("{}", err.to_string().red()),
                }
            }
        }
        "whoami" => match auth.state().identity {
            Some(identity) => println!(
                "{}",
                format!(
                    "{} <{}>",
                    identity.display_label(),
                    identity.email.as_deref().unwrap_or("-")
                )
                .bright_blue()
            ),
            None => println!("{}", "Guest (riwayat chat tidak tersimpan)".bright_black()),
        },
        "help" => {
            for command in COMMANDS {
                println!("  {}", command.bright_cyan());
            }
        }
        _ => println!("{}", "Perintah tidak dikenal".bright_black()),
    }
}

async fn print_history(conversation: &Conversation) {
    let buckets = conversation.history_store().snapshot().await;
    if buckets.is_empty() {
        println!("{}", "Belum ada riwayat chat.".bright_black());
        return;
    }
    for (bucket, entries) in buckets.groups() {
        println!("{}", bucket.label().bright_yellow());
        for entry in entries {
            let count = entry
                .message_count
                .map(|count| format!(" ({count} pesan)"))
                .unwrap_or_default();
            println!("  {}{}", format!("{} - {}", entry.id, entry.title).cyan(), count.bright_black());
        }
    }
}

async fn print_transcript(conversation: &Conversation) {
    for message in conversation.transcript().await {
        let label = match message.role {
            MessageRole::User => format!("[{}] Anda", message.timestamp).green(),
            MessageRole::Bot => format!("[{}] Tanya", message.timestamp).bright_magenta(),
        };
        println!("{label}");
        for line in message.content.lines() {
            println!("  {}", line.bright_blue());
        }
    }
}

fn print_notice(notice: &Notice) {
    let tag = match notice.level {
        NoticeLevel::Info => "info".bright_blue(),
        NoticeLevel::Success => "ok".bright_green(),
        NoticeLevel::Warning => "warn".yellow(),
        NoticeLevel::Error => "error".red(),
    };
    println!("{} {}", format!("[{tag}]").bold(), notice.message);
}

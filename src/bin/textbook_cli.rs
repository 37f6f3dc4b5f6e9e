//!
//! textbook CLI binary
//! -------------------
//! Command-line client for the textbook API. Checks for an existing session on
//! start, then runs either a single command or an interactive interpreter that
//! keeps the session (cookie jar) alive between commands.

use std::env;
use std::fs;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::{fmt, EnvFilter};

use textbook_session::backend::HttpBackend;
use textbook_session::content::ContentService;
use textbook_session::identity::{HardwareExperience, Profile, SignupForm, SoftwareBackground};
use textbook_session::{ClientConfig, SessionManager};

fn print_usage(program: &str) {
    let software: Vec<&str> = SoftwareBackground::ALL.iter().map(|s| s.as_str()).collect();
    let hardware: Vec<&str> = HardwareExperience::ALL.iter().map(|h| h.as_str()).collect();
    eprintln!(
        "Usage:\n  {program} [--api <url>] --repl            # start interactive interpreter\n  {program} [--api <url>] <command> [args...]  # run one command\n\nFlags:\n  --api <url>     Backend base URL (default: $TEXTBOOK_API_URL or http://localhost:8000)\n  --repl          Start interactive mode\n  -h, --help      Show this help\n\nCommands:\n  status                                         show the current session\n  login <email> <password>                       sign in\n  signup <email> <password> <software> <hardware>  create an account with a learning profile\n  logout                                         sign out (local session is always cleared)\n  profile                                        reload and show the learning profile\n  register <software> <hardware>                 (re)register the learning profile\n  revalidate                                     check the remote session is still alive\n  ask <question>                                 ask the textbook assistant\n                                                 (Context: \"<text>\". Question: <q> for selected text)\n  personalize <module> <chapter>                 personalize a chapter for your profile\n  translate <chapter> <file>                     translate a Markdown file to Urdu\n  revert <chapter>                               show the original of a translated chapter\n  help                                           show this help\n  quit | exit                                    leave the interpreter\n\nProfile values:\n  software: {}\n  hardware: {}",
        software.join(", "),
        hardware.join(", ")
    );
}

struct Client {
    session: SessionManager<HttpBackend>,
    content: ContentService<HttpBackend>,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .context("invalid RUST_LOG filter")?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let mut api: Option<String> = None;
    let mut repl = false;
    let mut command: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--api" => {
                if i + 1 >= args.len() { eprintln!("--api requires a URL"); print_usage(&program); std::process::exit(2); }
                api = Some(args[i + 1].clone());
                i += 2; continue;
            }
            "--repl" => { repl = true; i += 1; continue; }
            "-h" | "--help" => { print_usage(&program); return Ok(()); }
            _ => { command = args[i..].to_vec(); break; }
        }
    }

    let mut cfg = ClientConfig::from_env().context("invalid client configuration")?;
    if let Some(url) = api {
        let over = ClientConfig::new(&url).context("invalid --api URL")?;
        cfg.api_base_url = over.api_base_url;
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    let client = rt.block_on(connect(&cfg))?;

    if repl || command.is_empty() {
        return run_repl(&rt, &client);
    }
    let words: Vec<&str> = command.iter().map(|s| s.as_str()).collect();
    if let Err(e) = rt.block_on(run_command(&client, &words)) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn connect(cfg: &ClientConfig) -> Result<Client> {
    let backend = HttpBackend::new(cfg).context("failed to build HTTP client")?;
    let session = SessionManager::start(backend, cfg.stale_policy).await;
    let content = ContentService::new(session.backend().clone(), session.subscribe()).with_top_k(cfg.chat_top_k);
    let snap = session.snapshot();
    match &snap.user {
        Some(u) => println!("signed in as {}", u.display_label()),
        None => match &snap.error {
            Some(e) => println!("not signed in ({})", e),
            None => println!("not signed in"),
        },
    }
    Ok(Client { session, content })
}

fn run_repl(rt: &tokio::runtime::Runtime, client: &Client) -> Result<()> {
    let mut rl = DefaultEditor::new().context("failed to initialise line editor")?;
    println!("textbook-cli interpreter. Type 'help' for commands.");
    loop {
        let line = match rl.readline("> ") {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() { continue; }
        // keep passwords out of the history
        if !line.starts_with("login ") && !line.starts_with("signup ") {
            let _ = rl.add_history_entry(line);
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        match words[0].to_ascii_lowercase().as_str() {
            "quit" | "exit" => break,
            "help" => { print_usage("textbook_cli"); continue; }
            _ => {}
        }
        if let Err(e) = rt.block_on(run_command(client, &words)) {
            eprintln!("error: {}", e);
        }
    }
    Ok(())
}

async fn run_command(client: &Client, words: &[&str]) -> Result<()> {
    let session = &client.session;
    match words {
        ["status"] => print_json(&session.snapshot()),
        ["login", email, password] => {
            let ok = session.login(email, password).await?;
            println!("signed in as {}", ok.user.display_label());
            if ok.profile.is_none() { println!("no learning profile yet; use 'register <software> <hardware>'"); }
            Ok(())
        }
        ["signup", email, password, software, hardware] => {
            let form = SignupForm::parse(email, password, software, hardware)?;
            let ok = session.signup(&form.credentials.email, &form.credentials.password, form.profile).await?;
            println!("account created for {} (id {})", ok.user.display_label(), ok.user.id);
            Ok(())
        }
        ["logout"] => {
            let out = session.logout().await?;
            if out.remote_acknowledged { println!("signed out"); } else { println!("signed out locally (backend did not confirm)"); }
            Ok(())
        }
        ["profile"] => {
            match session.refresh_profile().await? {
                Some(p) => println!("{} / {}", p.software_background.label(), p.hardware_experience.label()),
                None => println!("no profile"),
            }
            Ok(())
        }
        ["register", software, hardware] => {
            let user_id = session.snapshot().user_id().map(str::to_string).context("not signed in")?;
            let profile = Profile::parse(software, hardware)?;
            session.register_profile(&user_id, profile).await?;
            println!("profile saved");
            Ok(())
        }
        ["revalidate"] => {
            let alive = session.revalidate().await?;
            println!("{}", if alive { "session active" } else { "no active session" });
            Ok(())
        }
        ["ask", rest @ ..] if !rest.is_empty() => {
            let reply = client.content.ask(&rest.join(" ")).await?;
            println!("{}", reply.text);
            if !reply.sources.is_empty() { println!("({} sources)", reply.sources.len()); }
            Ok(())
        }
        ["personalize", module, chapter] => {
            let out = client.content.personalize(module, chapter).await?;
            println!("{}", out.personalized_content);
            Ok(())
        }
        ["translate", chapter, file] => {
            let text = fs::read_to_string(file).with_context(|| format!("failed to read {}", file))?;
            let out = client.content.translate(chapter, &text).await?;
            println!("{}", out.translated_content);
            Ok(())
        }
        ["revert", chapter] => {
            match client.content.revert(chapter) {
                Some(original) => println!("{}", original),
                None => println!("nothing to revert for {}", chapter),
            }
            Ok(())
        }
        _ => anyhow::bail!("unknown command '{}'; type 'help'", words.join(" ")),
    }
}

fn print_json<T: serde::Serialize>(val: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}


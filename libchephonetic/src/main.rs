use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use libchephonetic::{
    CinFileLoader, ConfigStore, Configuration, FileConfigStore, ImeProfile, KeyEvent,
    MemoryConfigStore, PhoneticTextService, PreservedKey, TableKind, TableLoadCoordinator,
};

#[derive(Parser)]
#[command(name = "chephonetic")]
#[command(about = "Phonetic (bopomofo) input method driven by cin tables")]
#[command(version)]
struct Cli {
    /// Settings file (.toml or .json); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the cin tables (ignored with --config)
    #[arg(long, global = true, default_value = "cin")]
    cin_dir: PathBuf,

    /// Keyboard layout index: 0 standard, 1 ET, 2 IBM, 3 Gin-yieh (ignored with --config)
    #[arg(short, long, global = true, default_value_t = 0)]
    layout: usize,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive REPL: each line is a key sequence
    Repl,
    /// Type one key sequence and print the resulting state
    Compose {
        /// Keys to type; `{space}`, `{enter}`, `{bs}`, `{esc}`, `{up}`, `{down}`,
        /// `{pgup}`, `{pgdn}`, `{shift}` and `{toggle}` name special keys
        keys: String,
        /// Print the state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load the configured tables and report their status
    Status,
}

/// Host-side view of the session after a key sequence.
#[derive(Debug, Default, Serialize)]
struct Report {
    committed: String,
    passed_through: String,
    preedit: String,
    candidates: Vec<String>,
    auxiliary: String,
    chinese_mode: bool,
    status: Option<String>,
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("libchephonetic=debug,libcin_core=debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn build_service(cli: &Cli) -> PhoneticTextService {
    let store: Arc<dyn ConfigStore> = match &cli.config {
        Some(path) => Arc::new(FileConfigStore::new(path)),
        None => Arc::new(MemoryConfigStore::new(Configuration {
            cin_dir: cli.cin_dir.clone(),
            keyboard_layout: cli.layout,
            ..Configuration::default()
        })),
    };
    let coordinator = TableLoadCoordinator::new(CinFileLoader::new());
    PhoneticTextService::new(ImeProfile::chephonetic(), store, coordinator)
}

enum Input {
    Key(KeyEvent),
    Toggle,
}

fn parse_keys(text: &str) -> Result<Vec<Input>> {
    let mut out = Vec::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '{' {
            out.push(Input::Key(KeyEvent::Char(c)));
            continue;
        }
        let name: String = chars.by_ref().take_while(|&c| c != '}').collect();
        let input = match name.as_str() {
            "" => Input::Key(KeyEvent::Char('{')),
            "space" => Input::Key(KeyEvent::Space),
            "enter" => Input::Key(KeyEvent::Enter),
            "bs" => Input::Key(KeyEvent::Backspace),
            "esc" => Input::Key(KeyEvent::Escape),
            "up" => Input::Key(KeyEvent::Up),
            "down" => Input::Key(KeyEvent::Down),
            "pgup" => Input::Key(KeyEvent::PageUp),
            "pgdn" => Input::Key(KeyEvent::PageDown),
            "shift" => Input::Key(KeyEvent::Shift),
            "toggle" => Input::Toggle,
            other => bail!("unknown key name {{{other}}}"),
        };
        out.push(input);
    }
    Ok(out)
}

/// Deliver keys the way a host would and collect what the application sees.
fn drive(service: &mut PhoneticTextService, inputs: &[Input], report: &mut Report) {
    for input in inputs {
        let key = match input {
            Input::Toggle => {
                service.on_preserved_key(PreservedKey::ToggleMode);
                continue;
            }
            Input::Key(key) => key,
        };

        let handled = service.filter_key_down(key) && service.on_key_down(key).handled();
        if !handled {
            match key {
                KeyEvent::Char(c) => report.passed_through.push(*c),
                KeyEvent::Space => report.passed_through.push(' '),
                _ => {}
            }
        }
        if service.filter_key_up(key) {
            service.on_key_up(key);
        }
        report.committed.push_str(&service.take_commit());
    }

    let ctx = service.context();
    report.preedit = ctx.preedit_text.clone();
    report.candidates = ctx.candidates.clone();
    report.auxiliary = ctx.auxiliary_text.clone();
    report.chinese_mode = service.is_chinese_mode();
    report.status = ctx.status.as_ref().map(ToString::to_string);
}

fn print_report(report: &Report) {
    if !report.committed.is_empty() {
        println!("commit:     {}", report.committed);
    }
    if !report.passed_through.is_empty() {
        println!("passed:     {}", report.passed_through);
    }
    println!("preedit:    {}", report.preedit);
    if !report.candidates.is_empty() {
        let numbered: Vec<String> = report
            .candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}.{}", (i + 1) % 10, c))
            .collect();
        println!("candidates: {}", numbered.join(" "));
    }
    if !report.auxiliary.is_empty() {
        println!("aux:        {}", report.auxiliary);
    }
    if let Some(status) = &report.status {
        println!("status:     {status}");
    }
}

fn run_repl(mut service: PhoneticTextService) -> Result<()> {
    println!("chephonetic: type keys and press Enter to deliver them; Ctrl-D exits.");
    println!("Example (standard layout): 1u3 then a select key such as 1");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let inputs = match parse_keys(line.trim_end_matches(['\r', '\n'])) {
            Ok(inputs) => inputs,
            Err(err) => {
                eprintln!("error: {err}");
                continue;
            }
        };
        let mut report = Report::default();
        drive(&mut service, &inputs, &mut report);
        print_report(&report);
        stdout.flush()?;
    }
    Ok(())
}

fn run_status(service: &PhoneticTextService) -> Result<()> {
    for kind in TableKind::ALL {
        service.tables().get(kind).wait_settled();
        match service.table_status(kind) {
            Ok(content) => println!(
                "{kind:<15} ready   {} ({} codes)",
                if content.cname.is_empty() { &content.ename } else { &content.cname },
                content.code_count()
            ),
            Err(err) => println!("{kind:<15} -       {err}"),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let mut service = build_service(&cli);
    service.on_activate();
    if let Some(path) = &cli.config {
        // surface a bad settings file instead of silently running on defaults
        if service.config().is_none() {
            bail!("could not apply settings from {}", path.display());
        }
    }

    match cli.command {
        Commands::Repl => run_repl(service),
        Commands::Compose { ref keys, json } => {
            let inputs = parse_keys(keys)?;
            let mut report = Report::default();
            drive(&mut service, &inputs, &mut report);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(())
        }
        Commands::Status => run_status(&service),
    }
}

//! DNS filter console CLI
//!
//! Command-line access to the same panels the web console serves: DNS
//! rewrites, alternate upstreams, clients and DDNS scripts.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use comfy_table::Table;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use dnsfilter_console::ddns::{DdnsOs, ScriptRenderer, ScriptRequest, DEFAULT_DOMAIN};
use dnsfilter_console::form::validation::error_message;
use dnsfilter_console::form::{FieldErrors, PostedValues};
use dnsfilter_console::panels::alt_upstream::{AltUpstreamPanel, FIELD_DNS, FIELD_RULESETS};
use dnsfilter_console::panels::clients::ClientsPanel;
use dnsfilter_console::panels::login::{LoginForm, LoginPanel};
use dnsfilter_console::panels::rewrites::RewritesPanel;
use dnsfilter_console::panels::version::version_view;
use dnsfilter_console::panels::{DeleteOutcome, SubmitOutcome};
use dnsfilter_console::store::api::HttpControlApi;
use dnsfilter_console::store::memory::MemoryControlApi;
use dnsfilter_console::store::{Action, ConsoleStore, ControlApi, NotificationLevel, Rewrite};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// DNS filter console CLI - manage the appliance from the command line
#[derive(Parser)]
#[command(name = "dnsfilter-cli")]
#[command(version)]
#[command(about = "DNS filter console command line interface", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Appliance control API endpoint
    #[arg(short = 'H', long, env = "DNSFILTER_HOST", default_value = "http://127.0.0.1:3000")]
    host: String,

    /// Login name, when the appliance requires authentication
    #[arg(short = 'u', long, env = "DNSFILTER_USER")]
    username: Option<String>,

    /// Login password
    #[arg(short = 'p', long, env = "DNSFILTER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Use the built-in in-memory backend
    #[arg(long)]
    demo: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// No color output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone)]
enum OutputFormat {
    Table,
    Json,
    Plain,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage DNS rewrites
    Rewrites {
        #[command(subcommand)]
        action: RewriteCommands,
    },

    /// Manage alternate upstream servers
    Upstream {
        #[command(subcommand)]
        action: UpstreamCommands,
    },

    /// Manage persistent clients
    Clients {
        #[command(subcommand)]
        action: ClientCommands,
    },

    /// Generate a DDNS helper script
    Ddns {
        /// Target operating system (windows, linux, macos)
        os: String,

        /// Domain the script keeps pointed at this machine
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Show the appliance version
    Version,
}

#[derive(Subcommand)]
enum RewriteCommands {
    /// List all rewrites
    List,

    /// Add a rewrite
    Add {
        /// Domain name, optionally `*.` prefixed
        domain: String,

        /// IP address, domain name, A or AAAA
        answer: String,
    },

    /// Replace the answer of an existing rewrite
    Update {
        domain: String,
        answer: String,
        new_answer: String,
    },

    /// Delete a rewrite
    Delete {
        domain: String,
        answer: String,

        /// Force deletion without confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum UpstreamCommands {
    /// Show alternate upstreams and rulesets
    Show,

    /// Replace alternate upstreams and rulesets
    Set {
        /// Upstream server address (repeatable)
        #[arg(short, long = "dns")]
        dns: Vec<String>,

        /// Ruleset URL (repeatable)
        #[arg(short, long = "ruleset")]
        rulesets: Vec<String>,
    },

    /// Check that the configured alternate upstreams answer
    Test,
}

#[derive(Subcommand)]
enum ClientCommands {
    /// List persistent clients
    List,

    /// Delete a client
    Delete {
        name: String,

        /// Force deletion without confirmation
        #[arg(short, long)]
        force: bool,
    },
}

struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    fn new(format: OutputFormat, no_color: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format }
    }

    fn print(&self, data: &Value) -> CliResult<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
            OutputFormat::Table => self.print_table(data),
            OutputFormat::Plain => self.print_plain(data),
        }
        Ok(())
    }

    fn print_table(&self, data: &Value) {
        let mut table = Table::new();

        if let Some(array) = data.as_array() {
            if let Some(first) = array.first().and_then(Value::as_object) {
                let headers: Vec<String> = first.keys().cloned().collect();
                table.set_header(&headers);

                for item in array {
                    if let Some(obj) = item.as_object() {
                        let row: Vec<String> = headers
                            .iter()
                            .map(|h| obj.get(h).map(|v| self.value_to_string(v)).unwrap_or_default())
                            .collect();
                        table.add_row(row);
                    }
                }
            }
        } else if let Some(obj) = data.as_object() {
            table.set_header(vec!["Key", "Value"]);
            for (key, value) in obj {
                table.add_row(vec![key.clone(), self.value_to_string(value)]);
            }
        }

        println!("{}", table);
    }

    fn print_plain(&self, data: &Value) {
        match data.as_array() {
            Some(array) => {
                for item in array {
                    println!("{}", self.value_to_string(item));
                }
            }
            None => println!("{}", self.value_to_string(data)),
        }
    }

    fn value_to_string(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::Array(items) => items
                .iter()
                .map(|v| self.value_to_string(v))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => value.to_string(),
        }
    }

    fn print_success(&self, message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    fn print_error(&self, message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    fn print_warning(&self, message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message);
    }

    fn print_info(&self, message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    fn print_field_errors(&self, errors: &FieldErrors) {
        for (field, key) in errors {
            self.print_error(&format!("{}: {}", field, error_message(key)));
        }
    }

    /// Prints and clears the notifications raised by the last actions.
    fn print_notifications(&self, store: &ConsoleStore) {
        for notification in store.take_notifications() {
            match notification.level {
                NotificationLevel::Success => self.print_success(&notification.message),
                NotificationLevel::Error => self.print_error(&notification.message),
            }
        }
    }
}

/// Confirmation prompt
fn confirm(message: &str) -> bool {
    print!("{} {} [y/N]: ", "?".yellow().bold(), message);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

fn posted(fields: &[(&str, String)]) -> PostedValues {
    fields
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect::<HashMap<_, _>>()
}

fn report_submit(outcome: SubmitOutcome, formatter: &OutputFormatter) {
    match outcome {
        SubmitOutcome::Submitted => {}
        SubmitOutcome::Invalid(errors) => formatter.print_field_errors(&errors),
        SubmitOutcome::Suppressed => formatter.print_warning("Nothing to submit"),
    }
}

/// `host[:port]` part of the backend URL.
fn host_of(url: &str) -> &str {
    let rest = url.split("://").nth(1).unwrap_or(url);
    rest.split('/').next().unwrap_or(rest)
}

fn main() {
    let cli = Cli::parse();
    let formatter = OutputFormatter::new(cli.output.clone(), cli.no_color);

    if let Err(e) = run(cli, &formatter) {
        formatter.print_error(&e.to_string());
        std::process::exit(1);
    }
}

fn run(cli: Cli, formatter: &OutputFormatter) -> CliResult<()> {
    let api: Arc<dyn ControlApi> = if cli.demo {
        Arc::new(MemoryControlApi::demo())
    } else {
        Arc::new(HttpControlApi::new(&cli.host, Duration::from_secs(cli.timeout))?)
    };
    let store = ConsoleStore::new(api);

    if let (Some(username), Some(password)) = (&cli.username, &cli.password) {
        login(&store, &cli.host, username, password, formatter)?;
    }

    let result = match cli.command {
        Commands::Rewrites { action } => handle_rewrite_commands(action, &store, formatter),
        Commands::Upstream { action } => handle_upstream_commands(action, &store, formatter),
        Commands::Clients { action } => handle_client_commands(action, &store, formatter),
        Commands::Ddns { os, domain } => handle_ddns(&os, domain.as_deref(), &cli.host, formatter),
        Commands::Version => handle_version(&store, formatter),
    };

    // Backend failures already reach the user as notifications
    formatter.print_notifications(&store);
    result
}

fn login(
    store: &ConsoleStore,
    host: &str,
    username: &str,
    password: &str,
    formatter: &OutputFormatter,
) -> CliResult<()> {
    let panel = LoginPanel::new(store.clone());
    let mut form = LoginForm::new(host_of(host))?;
    form.apply_posted(&posted(&[
        ("username", username.to_string()),
        ("password", password.to_string()),
    ]));

    report_submit(panel.submit(&mut form)?, formatter);
    Ok(())
}

fn handle_rewrite_commands(
    action: RewriteCommands,
    store: &ConsoleStore,
    formatter: &OutputFormatter,
) -> CliResult<()> {
    let panel = RewritesPanel::new(store.clone());
    panel.mount(false)?;

    match action {
        RewriteCommands::List => {
            let list = store.select(|s| s.rewrites.list.clone());
            if list.is_empty() {
                formatter.print_info("No DNS rewrites configured");
            } else {
                formatter.print(&serde_json::to_value(&list)?)?;
            }
        }
        RewriteCommands::Add { domain, answer } => {
            panel.open_add()?;
            let mut form = panel.form()?;
            form.apply_posted(&posted(&[("domain", domain), ("answer", answer)]));
            report_submit(panel.submit(&mut form)?, formatter);
        }
        RewriteCommands::Update {
            domain,
            answer,
            new_answer,
        } => {
            let current = Rewrite::new(domain.as_str(), answer);
            if !store.select(|s| s.rewrites.list.contains(&current)) {
                formatter.print_error(&format!("No rewrite for {} -> {}", current.domain, current.answer));
                return Ok(());
            }
            panel.open_edit(current)?;
            let mut form = panel.form()?;
            form.apply_posted(&posted(&[("domain", domain), ("answer", new_answer)]));
            report_submit(panel.submit(&mut form)?, formatter);
        }
        RewriteCommands::Delete { domain, answer, force } => {
            let rewrite = Rewrite::new(domain, answer);
            let prompt = |message: &str| force || confirm(message);
            match panel.delete(&rewrite, &prompt)? {
                DeleteOutcome::Declined => formatter.print_info("Deletion cancelled"),
                DeleteOutcome::Suppressed => formatter.print_warning("A delete is already running"),
                DeleteOutcome::Deleted => {}
            }
        }
    }

    Ok(())
}

fn handle_upstream_commands(
    action: UpstreamCommands,
    store: &ConsoleStore,
    formatter: &OutputFormatter,
) -> CliResult<()> {
    let panel = AltUpstreamPanel::new(store.clone());
    panel.mount(false)?;
    let mut form = panel.form()?;

    match action {
        UpstreamCommands::Show => {
            let config = store.select(|s| s.dns_config.config.clone());
            let dns = if config.upstream_dns_file.is_empty() {
                json!(config.upstream_alternate_dns)
            } else {
                json!(format!("(file) {}", config.upstream_dns_file))
            };
            formatter.print(&json!({
                "upstream_alternate_dns": dns,
                "upstream_alternate_rulesets": config.upstream_alternate_rulesets,
            }))?;
        }
        UpstreamCommands::Set { dns, rulesets } => {
            if form.is_file_managed() && !dns.is_empty() {
                formatter.print_warning("Upstreams are managed by a file on the server; --dns is ignored");
            }
            form.apply_posted(&posted(&[
                (FIELD_DNS, dns.join("\n")),
                (FIELD_RULESETS, rulesets.join("\n")),
            ]));
            report_submit(panel.submit(&mut form)?, formatter);
        }
        UpstreamCommands::Test => {
            if form.upstreams().is_empty() {
                formatter.print_info("No alternate upstreams to test");
                return Ok(());
            }
            panel.test_upstreams(&form)?;
            let results = panel.view(&form).test_results;
            formatter.print(&serde_json::to_value(&results)?)?;
        }
    }

    Ok(())
}

fn handle_client_commands(
    action: ClientCommands,
    store: &ConsoleStore,
    formatter: &OutputFormatter,
) -> CliResult<()> {
    let panel = ClientsPanel::new(store.clone());

    match action {
        ClientCommands::List => {
            panel.mount(false)?;
            let rows: Vec<Value> = store.select(|s| {
                s.clients
                    .list
                    .iter()
                    .map(|c| {
                        json!({
                            "name": c.name,
                            "ids": c.ids.join(", "),
                            "use_global_settings": c.use_global_settings,
                            "filtering_enabled": c.filtering_enabled,
                        })
                    })
                    .collect()
            });
            if rows.is_empty() {
                formatter.print_info("No persistent clients configured");
            } else {
                formatter.print(&Value::Array(rows))?;
            }
        }
        ClientCommands::Delete { name, force } => {
            let prompt = |message: &str| force || confirm(message);
            if panel.delete(&name, &prompt)? == DeleteOutcome::Declined {
                formatter.print_info("Deletion cancelled");
            }
        }
    }

    Ok(())
}

fn handle_ddns(os: &str, domain: Option<&str>, host: &str, formatter: &OutputFormatter) -> CliResult<()> {
    let os: DdnsOs = os.parse()?;
    let renderer = ScriptRenderer::new(DEFAULT_DOMAIN);
    let forwarded_proto = if host.starts_with("https://") { Some("https") } else { None };

    let script = renderer.render(
        os,
        &ScriptRequest {
            domain,
            host: host_of(host),
            forwarded_proto,
            cookie_header: None,
        },
    )?;

    formatter.print_info(&format!("{} ({})", script.file_name, script.content_type));
    println!("{}", script.body);
    Ok(())
}

fn handle_version(store: &ConsoleStore, formatter: &OutputFormatter) -> CliResult<()> {
    store.dispatch(Action::FetchStatus)?;
    match version_view(store) {
        Some(view) => formatter.print(&json!({ "version": view.version }))?,
        None => formatter.print_warning("The appliance did not report a version"),
    }
    Ok(())
}

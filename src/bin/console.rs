use std::env;
use std::path::Path;
use std::process;
use std::sync::Arc;

use getopts::Options;

use dnsfilter_console::config::ConsoleConfig;
use dnsfilter_console::store::api::HttpControlApi;
use dnsfilter_console::store::memory::MemoryControlApi;
use dnsfilter_console::store::{ConsoleStore, ControlApi};
use dnsfilter_console::web::server::WebServer;

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

fn fail(message: &str) -> ! {
    log::error!("{}", message);
    process::exit(1);
}

/// Main entry point for the console web server
fn main() {
    if let Err(e) = simple_logger::init_with_level(log::Level::Info) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt("c", "config", "Path to a TOML configuration file", "FILE");
    opts.optopt("p", "port", "Port for the console web server", "PORT");
    opts.optopt(
        "b",
        "backend",
        "Base URL of the appliance control API (e.g. http://192.168.1.1:3000)",
        "URL",
    );
    opts.optflag("", "demo", "Serve a built-in in-memory backend");

    let opt_matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => fail(&f.to_string()),
    };

    if opt_matches.opt_present("h") {
        print_usage(&program, opts);
        return;
    }

    let mut config = match opt_matches.opt_str("c") {
        Some(path) => match ConsoleConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => fail(&e.to_string()),
        },
        None => ConsoleConfig::default(),
    };

    if let Some(port) = opt_matches.opt_str("p") {
        match port.parse() {
            Ok(port) => config.port = port,
            Err(_) => log::info!("Port is not a valid number - keeping {}", config.port),
        }
    }
    if let Some(backend) = opt_matches.opt_str("b") {
        config.backend_url = backend;
    }
    if opt_matches.opt_present("demo") {
        config.demo = true;
    }

    if let Err(e) = config.validate() {
        fail(&e.to_string());
    }

    let api: Arc<dyn ControlApi> = if config.demo {
        log::info!("Demo mode: serving an in-memory backend");
        Arc::new(MemoryControlApi::demo())
    } else {
        match HttpControlApi::new(&config.backend_url, config.request_timeout()) {
            Ok(api) => {
                log::info!("Using control API at {}", config.backend_url);
                Arc::new(api)
            }
            Err(e) => fail(&format!("Failed to create backend client: {}", e)),
        }
    };

    let service_type = match config.service_type() {
        Ok(service_type) => service_type,
        Err(e) => fail(&e.to_string()),
    };
    let store = ConsoleStore::new(api).with_service_type(service_type);

    let webserver = WebServer::new(store, &config.ddns_default_domain);
    webserver.run_webserver(&config.bind_address());
}

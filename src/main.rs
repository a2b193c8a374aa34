//! Interactive router console.
//!
//! Reads commands from stdin: connection management, program loading,
//! and job control are built-in commands; any other input line is
//! translated as G-code and sent as a manual command.

use anyhow::Context;
use routerhost::{
    init_logging, list_ports, ConsoleSink, HostConfig, SerialTransport, Session, SessionConfig,
    Translator, BUILD_DATE, VERSION,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Console sink that prints straight to stdout for interactive use.
struct StdoutConsole;

impl ConsoleSink for StdoutConsole {
    fn append_line(&self, line: &str) {
        println!("{}", line);
    }
}

const DEFAULT_CONFIG_PATH: &str = "routerhost.json";

fn load_config() -> anyhow::Result<HostConfig> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    if std::path::Path::new(&path).exists() {
        let config = HostConfig::load(&path).with_context(|| format!("loading {}", path))?;
        tracing::info!(path, "configuration loaded");
        Ok(config)
    } else {
        tracing::info!("no configuration file, using defaults");
        Ok(HostConfig::default())
    }
}

fn print_help() {
    println!("Commands:");
    println!("  ports              list candidate serial ports");
    println!("  connect            open the serial link and handshake");
    println!("  disconnect         close the serial link");
    println!("  load <file>        translate a G-code program and load it");
    println!("  run                stream the loaded program");
    println!("  stop               stop dispatching further frames");
    println!("  status             connection and job state");
    println!("  quit               exit");
    println!("Any other line is translated as G-code and sent immediately.");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    println!("RouterHost {} ({})", VERSION, BUILD_DATE);

    let config = load_config()?;
    let console: Arc<dyn ConsoleSink> = Arc::new(StdoutConsole);
    let translator = Translator::new(&config);

    let session = Session::new(
        SessionConfig::from_host(&config),
        Box::new(SerialTransport::new()),
        console.clone(),
    );
    session.start()?;

    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };
        match word {
            "" => {}
            "help" => print_help(),
            "ports" => match list_ports() {
                Ok(ports) if ports.is_empty() => println!("No candidate ports found."),
                Ok(ports) => {
                    for p in ports {
                        println!("  {}  {}", p.port_name, p.description);
                    }
                }
                Err(e) => println!("Port enumeration failed: {}", e),
            },
            "connect" => {
                // Rejections are already echoed on the console.
                let _ = session.connect();
            }
            "disconnect" => {
                let _ = session.disconnect();
            }
            "load" => {
                if rest.is_empty() {
                    println!("Usage: load <file>");
                    continue;
                }
                match translator
                    .translate_file(rest, Some(console.as_ref()))
                    .and_then(|output| output.into_commands().map_err(Into::into))
                {
                    Ok(commands) => {
                        let count = commands.len();
                        if session.load(commands).is_ok() {
                            println!("Loaded {} command(s) from {}.", count, rest);
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            "run" => {
                let _ = session.run();
            }
            "stop" => session.stop(),
            "status" => {
                let (sent, total) = session.job_progress();
                println!(
                    "{}, {} ({}/{} frames dispatched)",
                    session.connection_state(),
                    if session.is_running() { "running" } else { "idle" },
                    sent,
                    total
                );
            }
            "quit" | "exit" => break,
            _ => {
                let output = translator.translate(line, Some(console.as_ref()));
                if output.has_errors() {
                    continue;
                }
                let _ = session.send_manual_batch(output.commands);
            }
        }
    }

    session.shutdown();
    Ok(())
}

use std::{
    io::Write,
    time::Duration,
    };
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets};
use log::*;
use tokio::io::{AsyncRead, AsyncWrite};
use uartscope::{
    EngineConfig, Config,
    sim::Demo,
    host::{self, Client, Error, find, format_value},
    };


/// read probes of a design over its uart
#[derive(Parser)]
#[command(name = "uartscope")]
struct Cli {
    /// serial port of the device
    #[arg(required_unless_present = "emulate")]
    port: Option<String>,
    /// talk to a simulated demo design instead of a serial port
    #[arg(long, conflicts_with = "port")]
    emulate: bool,
    /// baud rate of the serial port
    #[arg(long, default_value_t = host::DEFAULT_RATE)]
    baud: u32,
    /// time waited for each answer, in milliseconds
    #[arg(long, default_value_t = 100)]
    timeout_ms: u64,
    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand)]
enum Action {
    /// list probes available on the device
    Inserts,
    /// show current values of single value probes
    Singles,
    /// continuously monitor the value of a single value probe
    Monitor {
        #[arg(value_name = "GROUP")]
        group: String,
        #[arg(value_name = "NAME")]
        name: String,
        /// index in case of multiple matches
        #[arg(short)]
        n: Option<usize>,
    },
    /// show values recorded by a buffering probe
    Buffer {
        #[arg(value_name = "GROUP")]
        group: String,
        #[arg(value_name = "NAME")]
        name: String,
        /// index in case of multiple matches
        #[arg(short)]
        n: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let timeout = Duration::from_millis(cli.timeout_ms);
    let action = cli.action.unwrap_or(Action::Inserts);

    let result = if cli.emulate {
        let (port, device) = tokio::io::duplex(256);
        match Demo::new(EngineConfig::default(), None) {
            Ok(design) => {
                tokio::spawn(async move {
                    if let Err(error) = host::emulate(design, device).await {
                        error!("emulation stopped: {}", error);
                    }
                });
                execute(&mut Client::new(port).with_timeout(timeout), action).await
            },
            Err(error) => Err(error.into()),
        }
    }
    else {
        let path = cli.port.unwrap_or_default();
        match Client::open(&path, cli.baud) {
            Ok(client) => execute(&mut client.with_timeout(timeout), action).await,
            Err(error) => Err(error),
        }
    };
    if let Err(error) = result {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}

async fn execute<P: AsyncRead + AsyncWrite + Unpin>(client: &mut Client<P>, action: Action) -> Result<(), Error> {
    let config = client.get_config().await?;
    match action {
        Action::Inserts => display_inserts(&config),
        Action::Singles => display_singles(client, &config).await?,
        Action::Monitor {group, name, n} => monitor(client, &config, &group, &name, n).await?,
        Action::Buffer {group, name, n} => display_buffer(client, &config, &group, &name, n).await?,
    }
    Ok(())
}

fn group_of<'c>(config: &'c Config, index: usize) -> &'c str {
    config.group_name(&config.inserts[index]).unwrap_or("?")
}

fn display_inserts(config: &Config) {
    println!("{}", inserts_table(config));
}

fn inserts_table(config: &Config) -> Table {
    let mut inserts = table(&["Group", "Name", "Width", "Depth"]);
    for (index, entry) in config.inserts.iter().enumerate() {
        inserts.add_row(vec![
            group_of(config, index).to_string(),
            entry.name.clone(),
            entry.width.to_string(),
            entry.depth.to_string(),
            ]);
    }
    inserts
}

async fn display_singles<P: AsyncRead + AsyncWrite + Unpin>(client: &mut Client<P>, config: &Config) -> Result<(), Error> {
    let mut singles = table(&["Group", "Name", "Value"]);
    for (index, entry) in config.inserts.iter().enumerate() {
        if entry.is_buffer()
            {continue}
        let words = client.capture(index, entry).await?;
        singles.add_row(vec![
            group_of(config, index).to_string(),
            entry.name.clone(),
            format!("0x{}", format_value(words[0], entry.width)),
            ]);
    }
    println!("{}", singles);
    Ok(())
}

async fn monitor<P: AsyncRead + AsyncWrite + Unpin>(client: &mut Client<P>, config: &Config, group: &str, name: &str, n: Option<usize>) -> Result<(), Error> {
    let index = find(config, group, name, n, true)?;
    let entry = &config.inserts[index];
    debug!("monitoring probe {}", index);
    client.select(index).await?;
    for toggle in [false, true].into_iter().cycle() {
        client.arm().await?;
        client.wait().await?;
        let data = client.data(entry.word_bytes()).await?;
        let value = host::words(&data, entry.word_bytes())[0];
        print!("{} {}\r", if toggle {"/"} else {"\\"}, format_value(value, entry.width));
        std::io::stdout().flush()?;
    }
    Ok(())
}

async fn display_buffer<P: AsyncRead + AsyncWrite + Unpin>(client: &mut Client<P>, config: &Config, group: &str, name: &str, n: Option<usize>) -> Result<(), Error> {
    let index = find(config, group, name, n, false)?;
    let entry = &config.inserts[index];
    client.select(index).await?;
    client.arm().await?;
    eprintln!("waiting for trigger...");
    client.wait().await?;
    eprintln!("done");
    let data = client.data(entry.data_bytes()).await?;
    println!("[");
    for word in host::words(&data, entry.word_bytes()) {
        println!("0x{},", format_value(word, entry.width));
    }
    println!("]");
    Ok(())
}

/// table with the given header, drawn with ascii borders
fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::ASCII_FULL).set_header(header.to_vec());
    table
}

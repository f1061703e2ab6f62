use clap::Parser;
use std::{
    error::Error,
    io::{self, Write},
    path::PathBuf,
    sync::atomic::Ordering,
    time::Duration,
};

use chnative::{ClientConfig, Command, Session, cli::print_result, prompt};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML file to load settings from; flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(short, long)]
    user: Option<String>,
    #[arg(long)]
    password: Option<String>,
    #[arg(short, long)]
    database: Option<String>,
    /// lz4, none or disabled
    #[arg(long)]
    compress: Option<String>,
    #[arg(long)]
    ssl: bool,
    #[arg(long)]
    skip_verification: bool,
}

impl Cli {
    fn client_config(&self) -> chnative::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(compress) = &self.compress {
            config.compression = compress.clone();
        }
        config.ssl |= self.ssl;
        config.skip_verification |= self.skip_verification;
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    let mut session = Session::connect(cli.client_config()?)?;
    let interrupted = session.interrupt_flag();
    let handler_flag = session.interrupt_flag();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))?;

    let mut stdio = io::stdin().lock();
    let mut stdout = io::stdout().lock();

    loop {
        let cmd = match prompt(&mut stdio, &mut stdout)? {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };

        // drop a Ctrl-C pressed at the prompt
        interrupted.store(false, Ordering::SeqCst);

        let outcome = match cmd {
            Command::Exit => {
                session.disconnect()?;
                break;
            }
            Command::Ping => {
                let alive = session.ping(Duration::from_secs(5));
                writeln!(stdout, "{}", if alive { "pong" } else { "no response" })?;
                Ok(())
            }
            Command::Insert(sql) => session
                .insert_values(&sql)
                .and_then(|rows| Ok(writeln!(stdout, "inserted {rows} rows")?)),
            Command::Query(sql) => session
                .query(&sql)
                .and_then(|mut result| print_result(&mut stdout, &mut result)),
        };

        if let Err(e) = outcome {
            eprintln!("error: {e}");
            if session.is_closed() {
                break;
            }
        }
    }

    Ok(())
}

//! `printkit` command-line host

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use printkit::{
    controller_config, init_logging_with_level, list_ports, slice_request, slicer_locator,
    ConnectionState, ConsoleLine, FirmwareKind, Material, PrinterController, PrinterListener,
    SettingsManager, SliceEvent, SliceOptions, SlicingJob, StatusSnapshot, StreamEvent,
    StreamObserver,
    StreamOutcome, SupportStyle, VirtualPrinter, BUILD_DATE, VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "printkit")]
#[command(about = "Host for 3D printers: status, SD card, streaming and slicing", long_about = None)]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial port (overrides the config)
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Baud rate (overrides the config)
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Talk to a simulated printer instead of a serial port
    #[arg(long, global = true)]
    simulate: bool,

    /// Log protocol traffic
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List serial ports
    Ports,
    /// Print temperatures and position
    Status,
    /// Watch status and console traffic until Ctrl-C
    Monitor {
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Send commands and print the replies
    Send {
        /// Commands, one per argument
        #[arg(required = true)]
        commands: Vec<String>,
    },
    /// Emergency stop
    Estop,
    /// SD card operations
    Sd {
        #[command(subcommand)]
        action: SdAction,
    },
    /// Stream a G-code file over the connection
    Stream {
        /// G-code file
        file: PathBuf,
    },
    /// Slice a model with the external slicer
    Slice {
        /// Model file (.stl, .obj, .3mf)
        input: PathBuf,
        /// Output file (default: next to the model)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Add a brim
        #[arg(long)]
        brim: bool,
        /// Generate supports
        #[arg(long, value_enum)]
        support: Option<SupportArg>,
        /// Material preset to apply
        #[arg(long)]
        material: Option<Material>,
        /// Export a 3MF project instead of G-code
        #[arg(long = "3mf")]
        export_3mf: bool,
    },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum SdAction {
    /// List files on the card
    List,
    /// Start printing a file from the card
    Print {
        /// File name as listed
        name: String,
    },
    /// Delete a file from the card
    Delete {
        /// File name as listed
        name: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Change settings and save
    Set {
        /// Firmware family (marlin, klipper, reprap)
        #[arg(long)]
        firmware: Option<FirmwareKind>,
        /// Slicer executable
        #[arg(long)]
        slicer: Option<PathBuf>,
        /// Material preset for the slicer profile
        #[arg(long)]
        material: Option<Material>,
        /// Disconnect once an SD print starts
        #[arg(long)]
        disconnect_on_sd_print: Option<bool>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SupportArg {
    Organic,
    Grid,
}

impl From<SupportArg> for SupportStyle {
    fn from(arg: SupportArg) -> Self {
        match arg {
            SupportArg::Organic => SupportStyle::Organic,
            SupportArg::Grid => SupportStyle::Grid,
        }
    }
}

/// Prints what the controller reports while monitoring
struct ConsolePrinter;

#[async_trait]
impl PrinterListener for ConsolePrinter {
    async fn on_connection_changed(&self, state: &ConnectionState) {
        println!("{}", state);
    }

    async fn on_status_updated(&self, snapshot: &StatusSnapshot) {
        println!("{}", snapshot);
    }

    async fn on_console(&self, line: &ConsoleLine) {
        println!("{}", line);
    }

    async fn on_error(&self, message: &str) {
        eprintln!("error: {}", message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    init_logging_with_level(level)?;

    let settings = match &cli.config {
        Some(path) => SettingsManager::load(path.clone())?,
        None => SettingsManager::load_default()?,
    };

    match &cli.command {
        Commands::Ports => {
            for port in list_ports() {
                println!("{}\t{}", port.port_name, port.description);
            }
        }
        Commands::Version => {
            println!("printkit {} (built {})", VERSION, BUILD_DATE);
        }
        Commands::Config { action } => run_config(&settings, action)?,
        Commands::Slice {
            input,
            output,
            brim,
            support,
            material,
            export_3mf,
        } => {
            let config = settings.config();
            let options = SliceOptions {
                brim: *brim,
                support: support.map(SupportStyle::from),
            };
            let mut request =
                slice_request(&config, input, output.clone(), options, *export_3mf);
            if let Some(material) = material {
                request.profile.apply_material(*material);
            }

            let handle = SlicingJob::new(request)
                .with_observer(Arc::new(|event: SliceEvent| {
                    if let SliceEvent::Output(line) = event {
                        println!("{}", line);
                    }
                }))
                .spawn(&slicer_locator(&config))?;
            let sliced = handle.wait().await?;
            println!("Wrote {}", sliced.output.display());
        }
        command => {
            let controller = connect(&cli, &settings).await?;
            let result = run_printer_command(&controller, command).await;
            controller.disconnect().await;
            result?;
        }
    }

    Ok(())
}

async fn connect(cli: &Cli, settings: &SettingsManager) -> Result<PrinterController> {
    let config = settings.config();
    let mut controller_cfg = controller_config(&config);
    let baud = cli.baud.unwrap_or(config.connection.baud_rate);

    let (controller, port) = if cli.simulate {
        controller_cfg.open_settle = Duration::ZERO;
        let port = cli.port.clone().unwrap_or_else(|| "virtual".to_string());
        (
            PrinterController::new(controller_cfg, Arc::new(VirtualPrinter::new())),
            port,
        )
    } else {
        let port = match cli.port.clone() {
            Some(port) => port,
            None if !config.connection.port.is_empty() => config.connection.port.clone(),
            None => bail!("No port given; pass --port or set one with `printkit config`"),
        };
        (PrinterController::serial(controller_cfg), port)
    };

    controller
        .connect(&port, baud)
        .await
        .with_context(|| format!("connecting to {}", port))?;

    if !cli.simulate && cli.port.is_some() {
        let remembered = settings.update(|cfg| {
            cfg.connection.port = port.clone();
            cfg.connection.baud_rate = baud;
        });
        if remembered.is_ok() {
            if let Err(e) = settings.save() {
                tracing::warn!("Could not remember port: {}", e);
            }
        }
    }
    Ok(controller)
}

async fn run_printer_command(controller: &PrinterController, command: &Commands) -> Result<()> {
    match command {
        Commands::Status => {
            let snapshot = controller.refresh_status().await?;
            println!("{}", snapshot);
        }
        Commands::Monitor { seconds } => {
            let handle = controller.register_listener(Arc::new(ConsolePrinter));
            match seconds {
                Some(seconds) => tokio::time::sleep(Duration::from_secs(*seconds)).await,
                None => tokio::signal::ctrl_c().await?,
            }
            controller.unregister_listener(&handle);
        }
        Commands::Send { commands } => {
            for command in commands {
                match controller.send_command(command).await? {
                    Some(reply) => print!("{}", reply),
                    None => println!("(no reply)"),
                }
            }
        }
        Commands::Estop => {
            controller.emergency_stop().await?;
            println!("Emergency stop sent");
        }
        Commands::Sd { action } => {
            let sd = controller.sd_session();
            match action {
                SdAction::List => {
                    for (index, entry) in sd.refresh().await?.iter().enumerate() {
                        println!("{:>3}  {}", index, entry.filename);
                    }
                }
                SdAction::Print { name } => {
                    println!("{}", controller.start_sd_print(name).await?);
                }
                SdAction::Delete { name, yes } => {
                    if sd.entries().is_empty() {
                        sd.refresh().await?;
                    }
                    sd.select(name)?;
                    let remaining = sd.delete_selected(*yes).await?;
                    println!("Deleted {}; {} file(s) left", name, remaining.len());
                }
            }
        }
        Commands::Stream { file } => {
            let observer: StreamObserver = Arc::new(|event: StreamEvent| {
                if let StreamEvent::Progress {
                    lines_sent,
                    total_lines,
                    percent,
                } = event
                {
                    if lines_sent == total_lines || lines_sent % 100 == 0 {
                        println!("{}/{} ({:.0}%)", lines_sent, total_lines, percent);
                    }
                }
            });
            let handle = controller.start_stream(file.clone(), Some(observer))?;

            let cancel = handle.cancel_token();
            let mut finished = Box::pin(handle.wait());
            let outcome = tokio::select! {
                outcome = &mut finished => outcome,
                _ = tokio::signal::ctrl_c() => {
                    cancel.cancel();
                    finished.await
                }
            };
            match outcome {
                StreamOutcome::Completed { lines_sent } => println!("Sent {} line(s)", lines_sent),
                StreamOutcome::Cancelled { .. } => println!("Cancelled"),
                StreamOutcome::Failed { lines_sent, reason } => {
                    bail!("stream failed after {} line(s): {}", lines_sent, reason)
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn run_config(settings: &SettingsManager, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{:#?}", settings.config());
        }
        ConfigAction::Path => {
            println!("{}", settings.path().display());
        }
        ConfigAction::Set {
            firmware,
            slicer,
            material,
            disconnect_on_sd_print,
        } => {
            settings.update(|cfg| {
                if let Some(firmware) = firmware {
                    cfg.firmware.kind = *firmware;
                }
                if let Some(slicer) = slicer {
                    cfg.slicer.executable = Some(slicer.clone());
                }
                if let Some(material) = material {
                    cfg.slicer.profile.apply_material(*material);
                }
                if let Some(flag) = disconnect_on_sd_print {
                    cfg.sd_card.disconnect_on_sd_print = *flag;
                }
            })?;
            settings.save()?;
            println!("Saved {}", settings.path().display());
        }
    }
    Ok(())
}

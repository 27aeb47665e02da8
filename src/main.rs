use apcupsd2mqtt::error::{self, BridgeError};
use apcupsd2mqtt::pid_file::PidFile;
use apcupsd2mqtt::{Apcaccess, Configuration, Control, Daemon, MqttBus, customization};
use time::UtcOffset;

const DEFAULT_CONFIG_PATH: &str = "/etc/apcupsd2mqtt.conf";

/// Usage:
///
/// * `apcupsd2mqtt [CONFIG]` runs the bridge
/// * `apcupsd2mqtt customize [CONFIG] [without-prefix]` prints the Home Assistant customization
fn main() {
    // Reading the local offset is only sound while the process has a single thread
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    start(offset);
}

#[tokio::main]
async fn start(offset: UtcOffset) {
    let args: Vec<String> = std::env::args().collect();

    if args.get(1).map(String::as_str) == Some("customize") {
        let config = load(args.get(2).map(String::as_str));
        let with_prefix = args.get(3).map(String::as_str) != Some("without-prefix");

        match customization::to_yaml(&config, with_prefix) {
            Ok(yaml) => print!("{yaml}"),
            Err(e) => {
                eprintln!("Cannot render customization: {e}");
                std::process::exit(error::ExitCode::Unknown.code());
            }
        }
        return;
    }

    let config = load(args.get(1).map(String::as_str));

    stderrlog::new()
        .module(module_path!())
        .verbosity(config.log_verbosity)
        .init()
        .expect("Failed to initialize logging");

    let error_log = config.error_log.clone();
    if let Err(e) = run(config).await {
        error::report(&e, error_log.as_deref(), offset);
        std::process::exit(e.exit_code().code());
    }
}

/// Loads the configuration, exiting when it is not usable
///
/// Logging is not set up yet, so errors go straight to the console.
fn load(path: Option<&str>) -> Configuration {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

    Configuration::load(path).unwrap_or_else(|e| {
        let e = BridgeError::from(e);
        eprintln!("{e}");
        std::process::exit(e.exit_code().code());
    })
}

async fn run(config: Configuration) -> Result<(), BridgeError> {
    let _pid_file = config
        .pid_file
        .as_deref()
        .map(PidFile::acquire)
        .transpose()?;

    let control = Control::new();
    control.listen_signals()?;

    let bus = MqttBus::connect(&config.mqtt).await?;

    Daemon::new(config, bus, Apcaccess::new(), control)
        .run()
        .await
}

//! solo - single-instance application shell
//!
//! Decides whether this launch is the primary instance. A secondary launch
//! hands its files and URL to the primary and exits; the primary hosts the
//! application until it is asked to quit.

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info};

use solo_shell::cli::Args;
use solo_shell::collaborators::UpdateChecker;
use solo_shell::config::{AppConfig, ConfigLoader, LaunchOptions};
use solo_shell::context::LaunchContext;
use solo_shell::crash::FileCrashReporter;
use solo_shell::headless::HeadlessFactory;
use solo_shell::lifecycle::{Collaborators, GateOptions, LogSetup};
use solo_shell::platform::{LogOnlyActivator, StderrFallbackUi};
use solo_shell::proxy::LoggingProxySink;
use solo_shell::relay::{build_intent, CommandRelay, PrefixUrlPolicy, SecondaryClient};
use solo_shell::update::MarkerUpdateChecker;
use solo_shell::{
    Endpoint, InstanceArbiter, LifecycleGate, NestingTracker, PrimaryLoop, Role, ShutdownHandle,
    StartupOutcome, UnixTransport,
};
use solo_utils::{
    crash_marker_file, init_logging, init_logging_with_config, log_file, runtime_dir,
    update_ready_marker, writer_lock_file, LogConfig, LogHandle, Result, SoloError,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    let config = match ConfigLoader::load_and_validate(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_logging()?;
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let logs = init_logging_with_config(LogConfig::shell(&config.logging.filter))?;
    info!("solo starting");
    debug!("CLI args: {:?}", args);

    let options = LaunchOptions::resolve(&args, &config);
    match run(options, &config, logs).await {
        Ok(()) => {
            info!("solo exiting normally");
            Ok(())
        }
        Err(e) => {
            error!("solo error: {}", e);
            Err(e)
        }
    }
}

async fn run(options: LaunchOptions, config: &AppConfig, logs: LogHandle) -> Result<()> {
    let endpoint = Endpoint::derive(&options.working_dir, options.mode, &runtime_dir());
    let mut arbiter = InstanceArbiter::new(UnixTransport, endpoint.clone());

    match arbiter.arbitrate().await? {
        Role::Secondary(stream) => run_secondary(stream, &options).await,
        Role::Primary(listener) => run_primary(listener, &endpoint, options, config, logs).await,
    }
}

/// Relay this launch to the primary and wait for its answer
async fn run_secondary(stream: UnixStream, options: &LaunchOptions) -> Result<()> {
    let intent = build_intent(&options.send_paths, options.start_url.as_deref());
    SecondaryClient::new(stream, options.response_timeout)
        .run(intent, &LogOnlyActivator)
        .await
        .map(|_| ())
}

/// Host the application and serve later launches
async fn run_primary(
    listener: UnixListener,
    endpoint: &Endpoint,
    options: LaunchOptions,
    config: &AppConfig,
    logs: LogHandle,
) -> Result<()> {
    let crash = FileCrashReporter::new(crash_marker_file(options.mode.is_multi()));
    crash.install_panic_hook();

    let updater = config.update.enabled.then(|| {
        Box::new(MarkerUpdateChecker::new(update_ready_marker())) as Box<dyn UpdateChecker>
    });

    let collaborators = Collaborators {
        factory: Box::new(HeadlessFactory),
        crash: Box::new(crash),
        updater,
        ui: Box::new(StderrFallbackUi::new()),
        proxy_sink: Box::new(LoggingProxySink::new()),
    };
    let log_setup = LogSetup {
        handle: logs,
        log_file: log_file(options.mode.is_multi()),
        lock_file: writer_lock_file(),
    };
    let gate_options = GateOptions {
        mode: options.mode,
        start_update: options.start_update,
        proxy_settings: config.proxy.settings,
        proxy: config.proxy.selected.clone(),
    };

    let gate = LifecycleGate::new(
        LaunchContext::new(options.send_paths, options.start_url),
        NestingTracker::new(),
        collaborators,
        log_setup,
        gate_options,
    );
    let relay = CommandRelay::new(
        u64::from(std::process::id()),
        Box::new(PrefixUrlPolicy::new(config.relay.silent_url_prefixes.clone())),
    );

    let shutdown = ShutdownHandle::new();
    let signal_handle = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_handle.trigger();
        }
    });

    let mut primary = PrimaryLoop::new(
        gate,
        listener,
        endpoint.path().to_path_buf(),
        relay,
        &shutdown,
    );

    match primary.run().await {
        StartupOutcome::Launched | StartupOutcome::Quit => Ok(()),
        StartupOutcome::InstallingUpdate => {
            info!("Exiting to install the pending update");
            Ok(())
        }
        StartupOutcome::NotStarted => Err(SoloError::startup("application could not start")),
    }
}
